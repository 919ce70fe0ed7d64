//! Bearer credentials produced by a completed login flow.
//!
//! A [`Credential`] lives in memory for the lifetime of the screen that
//! owns it: it is created by token extraction or code exchange, cleared
//! on logout or when a new login attempt starts, and never persisted.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use veil::Redact;

/// Access credential for bearer-authenticated API calls.
///
/// The refresh token and expiry are carried when the token endpoint
/// provides them; their absence is not an error. There is no automatic
/// refresh: an expired credential stays expired until the user triggers
/// a new login.
#[derive(Clone, Redact, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Credential {
    /// Bearer token attached to `Authorization` headers.
    #[redact]
    pub access_token: String,

    /// Long-lived token for a manual re-exchange, when the server
    /// issued one.
    #[redact]
    pub refresh_token: Option<String>,

    /// When the access token stops being accepted, when known.
    pub expires_at: Option<SystemTime>,
}

impl Credential {
    /// Creates a credential from a bare access token.
    ///
    /// Used by the implicit grant and identity flows, which return a
    /// token without refresh or expiry metadata.
    #[must_use]
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Time remaining until expiry.
    ///
    /// Returns `Duration::ZERO` when expired and `Duration::MAX` when
    /// the server did not communicate an expiry.
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        match self.expires_at {
            Some(expires_at) => expires_at
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
            None => Duration::MAX,
        }
    }

    /// Whether the access token has expired.
    ///
    /// A credential without expiry metadata never reports expired; the
    /// API call itself is the authority then.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| SystemTime::now() >= expires_at)
    }
}

/// Displays a masked form of the access token.
///
/// The full token is deliberately unreachable through `Display` and
/// `Debug`; API calls read the field directly.
impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = &self.access_token;
        if token.chars().count() <= 8 {
            return f.write_str("***");
        }
        let prefix: String = token.chars().take(6).collect();
        write!(f, "{prefix}…")
    }
}
