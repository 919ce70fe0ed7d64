//! OAuth token endpoint response types.
//!
//! This module contains types for handling responses from the token
//! endpoints the login flows exchange against. These responses include:
//! * Access tokens for API access
//! * Optional refresh tokens and expiry information
//!
//! # Example Response
//!
//! ```json
//! {
//!     "access_token": "secret_token",
//!     "token_type": "Bearer",
//!     "expires_in": 3600,
//!     "refresh_token": "secret_refresh"
//! }
//! ```

use std::time::{Duration, SystemTime};

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use veil::Redact;

use crate::credential::Credential;

/// Successful token grant from a token endpoint.
///
/// Refresh token and expiry are optional: the implicit grant and some
/// identity backends return a bare access token.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Redact)]
pub struct AccessToken {
    /// OAuth access token for API authentication
    #[redact]
    pub access_token: String,

    /// Long-lived token for a later manual exchange, when issued
    #[redact]
    pub refresh_token: Option<String>,

    /// How long the token remains valid
    #[serde_as(as = "Option<DurationSeconds<u64, Flexible>>")]
    #[serde(default)]
    pub expires_in: Option<Duration>,

    /// Token type, `Bearer` for every supported provider
    pub token_type: Option<String>,
}

impl AccessToken {
    /// Converts the grant into a [`Credential`], anchoring the relative
    /// expiry to the current time.
    #[must_use]
    pub fn into_credential(self) -> Credential {
        let expires_at = self.expires_in.map(|expires_in| SystemTime::now() + expires_in);
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Error body from a token endpoint.
///
/// Either field may be absent; [`message`](Self::message) picks the
/// most descriptive one available.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct TokenError {
    /// Machine-readable error code, e.g. `invalid_grant`
    pub error: Option<String>,

    /// Human-readable description
    pub error_description: Option<String>,
}

impl TokenError {
    /// The most descriptive message the server provided.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.error_description.clone().or_else(|| self.error.clone())
    }
}
