//! Music service wire types.
//!
//! Plain JSON bodies, no envelope; only the fields the flows render.

use serde::Deserialize;

/// Current user's profile (`/v1/me`).
#[derive(Clone, Debug, Deserialize)]
pub struct PrivateUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

/// One page of the user's playlists (`/v1/me/playlists`).
#[derive(Clone, Debug, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<Playlist>,
    #[serde(default)]
    pub total: i64,
}

/// Playlist summary.
#[derive(Clone, Debug, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub tracks: TrackCount,
}

/// Track counter nested in a playlist.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrackCount {
    #[serde(default)]
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: a playlist page parses with partial fields.
    #[test]
    fn test_playlist_page() {
        let page: PlaylistPage = serde_json::from_str(
            r#"{
                "items": [
                    {"id": "p1", "name": "Focus", "tracks": {"total": 42}},
                    {"id": "p2", "name": "Gym"}
                ],
                "total": 2
            }"#,
        )
        .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].tracks.total, 42);
        assert_eq!(page.items[1].tracks.total, 0);
    }
}
