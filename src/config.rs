//! Application configuration and secrets handling.
//!
//! Combines two concerns:
//! * [`Config`] - application identity used to compose the HTTP
//!   `User-Agent`, plus the loopback port the authorization redirect
//!   listener binds to
//! * [`Secrets`] - OAuth client IDs and API keys loaded from a
//!   `secrets.toml` file
//!
//! Secrets are never logged; [`Secrets`] redacts its sensitive fields
//! in debug output.

use std::{fs, io};

use serde::Deserialize;
use veil::Redact;

/// Default loopback port for the authorization redirect listener.
///
/// The redirect URI registered with the authorization servers must
/// match, e.g. `http://127.0.0.1:8085/callback`.
pub const DEFAULT_REDIRECT_PORT: u16 = 8085;

/// OAuth client registrations loaded from the secrets file.
///
/// All providers are optional: a flow that needs a missing registration
/// fails with an explicit error instead of a launch attempt.
#[derive(Clone, Deserialize, Redact)]
pub struct Secrets {
    /// Game-account OAuth client ID (authorization code grant).
    pub bungie_client_id: Option<String>,

    /// Static API key sent as `X-API-Key` on game-platform calls.
    #[redact]
    pub bungie_api_key: Option<String>,

    /// Music-service OAuth client ID (implicit grant).
    pub spotify_client_id: Option<String>,

    /// Hosted sign-in page of the identity provider.
    pub identity_signin: Option<url::Url>,

    /// Auth backend that exchanges identity tokens for session
    /// credentials.
    pub identity_backend: Option<url::Url>,

    /// Loopback port for the redirect listener.
    ///
    /// [default: 8085]
    pub redirect_port: Option<u16>,
}

impl Secrets {
    /// Maximum allowed size of the secrets file.
    ///
    /// Prevents an out-of-memory condition: the file holds a handful of
    /// short strings and should be small.
    const MAX_FILE_SIZE: u64 = 16 * 1024;

    /// Loads secrets from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is larger than
    /// [`Self::MAX_FILE_SIZE`], or does not parse as the expected TOML
    /// structure.
    pub fn from_file(secrets_file: &str) -> io::Result<Self> {
        let attributes = fs::metadata(secrets_file)?;
        if attributes.len() > Self::MAX_FILE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{secrets_file} is too large"),
            ));
        }

        let contents = fs::read_to_string(secrets_file)?;
        toml::from_str(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{secrets_file} format is invalid: {e}"),
            )
        })
    }
}

/// Application configuration.
///
/// Holds the application identity and the composed `User-Agent`, plus
/// the loaded [`Secrets`].
#[derive(Clone, Debug)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub app_lang: String,

    pub user_agent: String,

    pub redirect_port: u16,

    pub secrets: Secrets,
}

impl Config {
    /// Creates a configuration from loaded secrets.
    ///
    /// The `User-Agent` is composed from the crate name and version and
    /// the host OS, in the same shape a desktop client would send.
    ///
    /// # Panics
    ///
    /// Panics if the crate name, version or language contain characters
    /// that are illegal in a `User-Agent` product token.
    #[must_use]
    pub fn with_secrets(secrets: Secrets) -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let app_lang = "en".to_owned();

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
            || app_lang.chars().count() != 2
            || app_lang.contains(illegal_chars)
        {
            panic!(
                "application name, version and/or language invalid (\"{app_name}\"; \"{app_version}\"; \"{app_lang}\")"
            );
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));
        if os_name.is_empty()
            || os_name.contains(illegal_chars)
            || os_version.is_empty()
            || os_version.contains(illegal_chars)
        {
            panic!("os name and/or version invalid (\"{os_name}\"; \"{os_version}\")");
        }

        let user_agent =
            format!("{app_name}/{app_version} (Rust; {os_name}/{os_version}; Desktop; {app_lang})");
        trace!("user agent: {user_agent}");

        let redirect_port = secrets.redirect_port.unwrap_or(DEFAULT_REDIRECT_PORT);

        Self {
            app_name,
            app_version,
            app_lang,

            user_agent,

            redirect_port,

            secrets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: secrets parse with all fields present.
    #[test]
    fn test_secrets_full() {
        let secrets: Secrets = toml::from_str(
            r#"
            bungie_client_id = "37130"
            bungie_api_key = "key"
            spotify_client_id = "9a5ca2db"
            identity_backend = "https://auth.example.com/session"
            redirect_port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(secrets.bungie_client_id.as_deref(), Some("37130"));
        assert_eq!(secrets.redirect_port, Some(9000));
    }

    /// Test: every provider is optional.
    #[test]
    fn test_secrets_empty() {
        let secrets: Secrets = toml::from_str("").unwrap();
        assert!(secrets.bungie_client_id.is_none());
        assert!(secrets.identity_backend.is_none());
        assert!(secrets.redirect_port.is_none());
    }

    /// Test: API key does not appear in debug output.
    #[test]
    fn test_secrets_redacted() {
        let secrets: Secrets = toml::from_str(r#"bungie_api_key = "super-secret""#).unwrap();
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("super-secret"));
    }
}
