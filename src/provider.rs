//! Provider presets for the supported login flows.
//!
//! A [`Provider`] is an explicit, passed-in description of one
//! authorization server: where to send the user, where the redirect
//! lands, where the token lives in that redirect, and what exchange
//! step (if any) turns it into a credential. Screens hold their own
//! provider and session; nothing is shared through globals.
//!
//! Three presets exist, mirroring the services the application talks
//! to: the game platform (authorization code grant), the music service
//! (implicit grant) and a generic identity provider whose tokens an
//! auth backend converts into session credentials.

use url::Url;
use uuid::Uuid;

use crate::{
    auth::AuthorizationRequest,
    config::Config,
    error::{Error, Result},
    extract::TokenSource,
};

/// Game platform endpoints.
pub mod bungie {
    use url::Url;

    /// OAuth authorization endpoint (authorization code grant).
    pub const AUTHORIZE_URL: &str = "https://www.bungie.net/en/OAuth/Authorize";

    /// OAuth token endpoint.
    pub const TOKEN_URL: &str = "https://www.bungie.net/platform/app/oauth/token";

    /// Platform API base.
    pub const PLATFORM_BASE: &str = "https://www.bungie.net/Platform";

    /// Web origin for relative content paths (emblems, definition files).
    pub const WEB_BASE: &str = "https://www.bungie.net";

    /// Parses a known-good endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the compiled-in URL is invalid.
    fn endpoint(url: String) -> Url {
        url.parse().expect("invalid platform endpoint")
    }

    #[must_use]
    pub fn memberships_url() -> Url {
        endpoint(format!("{PLATFORM_BASE}/User/GetMembershipsForCurrentUser/"))
    }

    /// Profile lookup with the characters component.
    #[must_use]
    pub fn profile_url(membership_type: i64, membership_id: &str) -> Url {
        endpoint(format!(
            "{PLATFORM_BASE}/Destiny2/{membership_type}/Profile/{membership_id}/?components=200"
        ))
    }

    /// Character lookup with the inventory component.
    #[must_use]
    pub fn character_url(membership_type: i64, membership_id: &str, character_id: &str) -> Url {
        endpoint(format!(
            "{PLATFORM_BASE}/Destiny2/{membership_type}/Profile/{membership_id}/Character/{character_id}/?components=201"
        ))
    }

    #[must_use]
    pub fn manifest_url() -> Url {
        endpoint(format!("{PLATFORM_BASE}/Destiny2/Manifest/"))
    }

    /// Resolves a relative content path from the manifest.
    #[must_use]
    pub fn content_url(path: &str) -> Url {
        endpoint(format!("{WEB_BASE}{path}"))
    }

    #[must_use]
    pub fn create_loadout_url() -> Url {
        endpoint(format!(
            "{PLATFORM_BASE}/Destiny2/Actions/Loadouts/CreateLoadout/"
        ))
    }
}

/// Music service endpoints.
pub mod spotify {
    use url::Url;

    /// OAuth authorization endpoint (implicit grant).
    pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

    /// Web API base.
    pub const API_BASE: &str = "https://api.spotify.com/v1";

    /// Scopes requested on login.
    pub const SCOPES: &str = "user-read-private user-read-email playlist-read-private playlist-read-collaborative user-library-read";

    /// Parses a known-good endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the compiled-in URL is invalid.
    fn endpoint(url: String) -> Url {
        url.parse().expect("invalid API endpoint")
    }

    #[must_use]
    pub fn me_url() -> Url {
        endpoint(format!("{API_BASE}/me"))
    }

    #[must_use]
    pub fn playlists_url(limit: u8) -> Url {
        endpoint(format!("{API_BASE}/me/playlists?limit={limit}"))
    }
}

/// How a raw token becomes a credential.
///
/// Deliberately not `Debug`: the exchange configuration carries the
/// API key.
#[derive(Clone)]
pub enum TokenStep {
    /// The token in the redirect is the credential (implicit grant).
    Direct,

    /// The code is exchanged at the provider's token endpoint.
    CodeExchange {
        token_url: Url,
        client_id: String,
        api_key: Option<String>,
    },

    /// The identity token is exchanged at the auth backend.
    IdentityExchange { backend_url: Url },
}

/// One authorization server, described explicitly.
#[derive(Clone)]
pub struct Provider {
    /// Short name for log lines and error messages.
    pub name: &'static str,

    /// Authorization endpoint with all static parameters attached.
    authorize_base: Url,

    /// Where the server sends the user agent back to.
    pub redirect_uri: Url,

    /// Where the token lives in that redirect.
    pub token_source: TokenSource,

    /// How the token becomes a credential.
    pub token_step: TokenStep,
}

impl Provider {
    /// Path component of the loopback redirect URI.
    const REDIRECT_PATH: &'static str = "/callback";

    /// Loopback redirect URI for the configured port.
    fn redirect_uri(config: &Config) -> Result<Url> {
        let uri = format!(
            "http://127.0.0.1:{}{}",
            config.redirect_port,
            Self::REDIRECT_PATH
        );
        uri.parse().map_err(|e: url::ParseError| e.into())
    }

    /// Game platform preset: authorization code grant with an API key.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` when the client ID or API key is
    /// missing from the secrets file.
    pub fn bungie(config: &Config) -> Result<Self> {
        let client_id = config
            .secrets
            .bungie_client_id
            .clone()
            .ok_or_else(|| Error::failed_precondition("bungie_client_id missing from secrets"))?;
        let api_key = config
            .secrets
            .bungie_api_key
            .clone()
            .ok_or_else(|| Error::failed_precondition("bungie_api_key missing from secrets"))?;

        let redirect_uri = Self::redirect_uri(config)?;
        let mut authorize_base = Url::parse(bungie::AUTHORIZE_URL)?;
        authorize_base
            .query_pairs_mut()
            .append_pair("client_id", &client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri.as_str());

        Ok(Self {
            name: "bungie",
            authorize_base,
            redirect_uri,
            token_source: TokenSource::QueryCode,
            token_step: TokenStep::CodeExchange {
                token_url: Url::parse(bungie::TOKEN_URL)?,
                client_id,
                api_key: Some(api_key),
            },
        })
    }

    /// Music service preset: implicit grant, token in the fragment.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` when the client ID is missing from
    /// the secrets file.
    pub fn spotify(config: &Config) -> Result<Self> {
        let client_id = config
            .secrets
            .spotify_client_id
            .clone()
            .ok_or_else(|| Error::failed_precondition("spotify_client_id missing from secrets"))?;

        let redirect_uri = Self::redirect_uri(config)?;
        let mut authorize_base = Url::parse(spotify::AUTHORIZE_URL)?;
        authorize_base
            .query_pairs_mut()
            .append_pair("client_id", &client_id)
            .append_pair("response_type", "token")
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("scope", spotify::SCOPES)
            .append_pair("show_dialog", "true");

        Ok(Self {
            name: "spotify",
            authorize_base,
            redirect_uri,
            token_source: TokenSource::FragmentToken,
            token_step: TokenStep::Direct,
        })
    }

    /// Identity provider preset: hosted sign-in, token exchanged at the
    /// auth backend.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` when the sign-in page or backend is
    /// missing from the secrets file.
    pub fn identity(config: &Config) -> Result<Self> {
        let signin = config
            .secrets
            .identity_signin
            .clone()
            .ok_or_else(|| Error::failed_precondition("identity_signin missing from secrets"))?;
        let backend_url = config
            .secrets
            .identity_backend
            .clone()
            .ok_or_else(|| Error::failed_precondition("identity_backend missing from secrets"))?;

        let redirect_uri = Self::redirect_uri(config)?;
        let mut authorize_base = signin;
        authorize_base
            .query_pairs_mut()
            .append_pair("redirect_uri", redirect_uri.as_str());

        Ok(Self {
            name: "identity",
            authorize_base,
            redirect_uri,
            token_source: TokenSource::NativeIdentityToken,
            token_step: TokenStep::IdentityExchange { backend_url },
        })
    }

    /// Fully explicit provider, for authorization servers not covered
    /// by a preset.
    #[must_use]
    pub fn custom(
        name: &'static str,
        authorize_base: Url,
        redirect_uri: Url,
        token_source: TokenSource,
        token_step: TokenStep,
    ) -> Self {
        Self {
            name,
            authorize_base,
            redirect_uri,
            token_source,
            token_step,
        }
    }

    /// Builds the authorization request for one attempt.
    ///
    /// Each attempt gets a fresh `state` nonce; extraction ignores it,
    /// it only ties the redirect to this attempt in server logs.
    #[must_use]
    pub fn authorization_request(&self) -> AuthorizationRequest {
        let mut authorization_url = self.authorize_base.clone();
        authorization_url
            .query_pairs_mut()
            .append_pair("state", &Uuid::new_v4().to_string());

        AuthorizationRequest {
            authorization_url,
            redirect_uri: self.redirect_uri.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secrets;

    fn config() -> Config {
        let secrets: Secrets = toml::from_str(
            r#"
            bungie_client_id = "37130"
            bungie_api_key = "key"
            spotify_client_id = "9a5ca2db"
            identity_signin = "https://id.example.com/signin"
            identity_backend = "https://auth.example.com/session"
            "#,
        )
        .unwrap();
        Config::with_secrets(secrets)
    }

    /// Test: the game preset composes a code-grant authorization URL.
    #[test]
    fn test_bungie_request() {
        let provider = Provider::bungie(&config()).unwrap();
        let request = provider.authorization_request();

        let url = request.authorization_url.as_str();
        assert!(url.starts_with(bungie::AUTHORIZE_URL));
        assert!(url.contains("client_id=37130"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state="));
        assert_eq!(request.redirect_uri.path(), "/callback");
        assert_eq!(provider.token_source, TokenSource::QueryCode);
    }

    /// Test: the music preset requests the implicit grant.
    #[test]
    fn test_spotify_request() {
        let provider = Provider::spotify(&config()).unwrap();
        let request = provider.authorization_request();

        let url = request.authorization_url.as_str();
        assert!(url.contains("response_type=token"));
        assert!(url.contains("show_dialog=true"));
        assert!(matches!(provider.token_step, TokenStep::Direct));
    }

    /// Test: each attempt gets its own state nonce.
    #[test]
    fn test_fresh_state() {
        let provider = Provider::spotify(&config()).unwrap();
        let first = provider.authorization_request();
        let second = provider.authorization_request();
        assert_ne!(first.authorization_url, second.authorization_url);
    }

    /// Test: a missing registration is an explicit error, not a launch.
    #[test]
    fn test_missing_secrets() {
        let secrets: Secrets = toml::from_str("").unwrap();
        let config = Config::with_secrets(secrets);
        assert!(Provider::bungie(&config).is_err());
        assert!(Provider::spotify(&config).is_err());
        assert!(Provider::identity(&config).is_err());
    }
}
