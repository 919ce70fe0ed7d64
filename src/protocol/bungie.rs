//! Game platform wire types.
//!
//! Every platform endpoint wraps its payload in the same envelope:
//!
//! ```json
//! {
//!     "Response": { ... },
//!     "ErrorCode": 1,
//!     "ErrorStatus": "Success",
//!     "Message": "Ok"
//! }
//! ```
//!
//! `ErrorCode` 1 means success; anything else carries a platform-level
//! error even when the HTTP status is 200.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Platform error code signalling success.
const ERROR_CODE_SUCCESS: i64 = 1;

/// Envelope around every platform response.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "Response")]
    pub response: Option<T>,

    #[serde(rename = "ErrorCode", default)]
    pub error_code: i64,

    #[serde(rename = "ErrorStatus", default)]
    pub error_status: String,

    #[serde(rename = "Message", default)]
    pub message: String,
}

impl<T> Envelope<T> {
    /// Whether the platform reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_code == ERROR_CODE_SUCCESS
    }

    /// Unwraps the payload, or the platform's error message.
    ///
    /// # Errors
    ///
    /// Returns the `ErrorStatus: Message` pair when the platform
    /// reported an error or omitted the payload.
    pub fn into_response(self) -> Result<T, String> {
        if !self.is_success() {
            return Err(format!("{}: {}", self.error_status, self.message));
        }
        self.response
            .ok_or_else(|| format!("{}: empty response", self.error_status))
    }
}

/// Payload of `User/GetMembershipsForCurrentUser/`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memberships {
    #[serde(default)]
    pub destiny_memberships: Vec<Membership>,
}

/// One game membership on an account.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub membership_id: String,
    pub membership_type: i64,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Payload of a profile lookup with the characters component (200).
#[derive(Clone, Debug, Deserialize)]
pub struct ProfileCharacters {
    pub characters: Component<HashMap<String, Character>>,
}

/// Payload of a character lookup with the inventory component (201).
#[derive(Clone, Debug, Deserialize)]
pub struct CharacterInventory {
    pub inventory: Component<Inventory>,
}

/// Component wrapper: the platform nests each requested component under
/// a `data` key.
#[derive(Clone, Debug, Deserialize)]
pub struct Component<T> {
    pub data: T,
}

/// One playable character.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub character_id: String,
    pub class_type: i64,
    pub race_type: i64,
    pub gender_type: i64,
    pub light: i64,
    #[serde(default)]
    pub emblem_path: Option<String>,
}

impl Character {
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self.class_type {
            0 => "Titan",
            1 => "Hunter",
            2 => "Warlock",
            _ => "Unknown",
        }
    }

    #[must_use]
    pub fn race_name(&self) -> &'static str {
        match self.race_type {
            0 => "Human",
            1 => "Awoken",
            2 => "Exo",
            _ => "Unknown",
        }
    }
}

/// Character inventory listing.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
}

/// One item instance in an inventory.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub item_hash: u64,
    #[serde(default)]
    pub item_instance_id: Option<String>,
}

/// Payload of the manifest lookup.
///
/// The manifest itself carries no definitions, only paths to the
/// definition files that a secondary fetch retrieves.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub json_world_component_content_paths: HashMap<String, HashMap<String, String>>,
}

impl Manifest {
    /// Definition table name for inventory items.
    pub const ITEM_DEFINITIONS: &'static str = "DestinyInventoryItemDefinition";

    /// Path of the item definition file for a language, falling back to
    /// English when the language is not published.
    #[must_use]
    pub fn item_definition_path(&self, lang: &str) -> Option<&str> {
        self.json_world_component_content_paths
            .get(lang)
            .or_else(|| self.json_world_component_content_paths.get("en"))
            .and_then(|tables| tables.get(Self::ITEM_DEFINITIONS))
            .map(String::as_str)
    }
}

/// One entry of the item definition table (secondary manifest fetch).
///
/// The table is a map from stringified item hash to definition.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    #[serde(default)]
    pub display_properties: DisplayProperties,
    #[serde(default)]
    pub item_type: i64,
}

impl ItemDefinition {
    /// Weapon item type.
    pub const ITEM_TYPE_WEAPON: i64 = 2;
    /// Armor item type.
    pub const ITEM_TYPE_ARMOR: i64 = 3;

    /// Whether the item is equippable gear worth showing.
    #[must_use]
    pub fn is_gear(&self) -> bool {
        self.item_type == Self::ITEM_TYPE_WEAPON || self.item_type == Self::ITEM_TYPE_ARMOR
    }
}

/// Display name and icon of a definition.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DisplayProperties {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Body of the create-loadout write endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct CreateLoadout {
    pub name: String,
    pub description: String,
    pub items: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: a platform error inside a 200 response surfaces as an error.
    #[test]
    fn test_envelope_error() {
        let envelope: Envelope<Memberships> = serde_json::from_str(
            r#"{"ErrorCode":99,"ErrorStatus":"WebAuthRequired","Message":"token expired"}"#,
        )
        .unwrap();

        assert!(!envelope.is_success());
        assert_eq!(
            envelope.into_response().unwrap_err(),
            "WebAuthRequired: token expired"
        );
    }

    /// Test: the characters component parses from its nested shape.
    #[test]
    fn test_profile_characters() {
        let envelope: Envelope<ProfileCharacters> = serde_json::from_str(
            r#"{
                "Response": {
                    "characters": {
                        "data": {
                            "2305843009": {
                                "characterId": "2305843009",
                                "classType": 1,
                                "raceType": 2,
                                "genderType": 0,
                                "light": 1810,
                                "emblemPath": "/common/emblem.jpg"
                            }
                        }
                    }
                },
                "ErrorCode": 1,
                "ErrorStatus": "Success",
                "Message": "Ok"
            }"#,
        )
        .unwrap();

        let characters = envelope.into_response().unwrap().characters.data;
        let character = characters.get("2305843009").unwrap();
        assert_eq!(character.class_name(), "Hunter");
        assert_eq!(character.race_name(), "Exo");
        assert_eq!(character.light, 1810);
    }

    /// Test: the manifest falls back to English definition paths.
    #[test]
    fn test_manifest_fallback() {
        let manifest: Manifest = serde_json::from_str(
            r#"{"jsonWorldComponentContentPaths":{
                "en":{"DestinyInventoryItemDefinition":"/common/en/items.json"}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            manifest.item_definition_path("es"),
            Some("/common/en/items.json")
        );
    }
}
