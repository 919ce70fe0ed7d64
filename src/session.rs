//! Per-screen login sessions.
//!
//! A [`LoginSession`] owns one provider, one launcher and at most one
//! credential, and moves through a fixed set of states:
//!
//! ```text
//! Idle → Launching → Exchanging → Authenticated
//!                  ↘ Authenticated (direct token)
//!                  ↘ Cancelled
//!                  ↘ Failed
//! ```
//!
//! `Authenticated` is terminal until a new login attempt or an explicit
//! [`logout`](LoginSession::logout) clears the credential back to
//! `Idle`. There is no automatic refresh transition.
//!
//! # Overlap and stale completions
//!
//! Only one attempt may be in flight per session: starting a login
//! while `Launching` or `Exchanging` is rejected. Every attempt carries
//! a sequence stamp; a completion whose stamp is no longer current is
//! discarded without touching state or credential, so a dismissed or
//! superseded attempt can never finish late and overwrite a newer one.

use tokio_util::sync::CancellationToken;

use crate::{
    auth::SessionLauncher,
    credential::Credential,
    error::{Error, Result},
    exchange::{self, ExchangeError},
    extract::{self, ExtractError, RawToken},
    http::Client as HttpClient,
    provider::{Provider, TokenStep},
};

/// Observable state of a login session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginState {
    /// No attempt made, or logged out.
    Idle,

    /// An authorization session is open in the user agent.
    Launching,

    /// The redirect arrived; the token endpoint is being called.
    Exchanging,

    /// A credential is held.
    Authenticated,

    /// The user ended the last attempt; neutral, not an error.
    Cancelled,

    /// The last attempt failed; carries the user-visible reason.
    Failed(String),
}

impl LoginState {
    /// Whether an attempt is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Launching | Self::Exchanging)
    }
}

/// Sequence stamp of one login attempt.
///
/// Handed out by [`LoginSession::begin`] and required to complete the
/// attempt; a stale stamp is discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attempt(u64);

/// Terminal failure of a login attempt, tagged by the phase it
/// happened in.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoginError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Maps login failures onto the unified error kinds.
///
/// Cancellation keeps its own kind so callers can render it neutrally.
impl From<LoginError> for Error {
    fn from(e: LoginError) -> Self {
        match &e {
            LoginError::Extract(ExtractError::Cancelled) => Self::cancelled(e.to_string()),
            LoginError::Extract(ExtractError::Launch(_))
            | LoginError::Exchange(ExchangeError::Network(_)) => Self::unavailable(e.to_string()),
            LoginError::Extract(ExtractError::MissingCode | ExtractError::MissingToken)
            | LoginError::Exchange(ExchangeError::Rejected(_)) => {
                Self::unauthenticated(e.to_string())
            }
            LoginError::Exchange(ExchangeError::MalformedResponse) => {
                Self::invalid_argument(e.to_string())
            }
        }
    }
}

/// One screen's login flow and credential.
pub struct LoginSession {
    provider: Provider,
    launcher: Box<dyn SessionLauncher + Send + Sync>,
    state: LoginState,
    credential: Option<Credential>,

    /// Stamp of the newest attempt; completions must match.
    sequence: u64,
}

impl LoginSession {
    /// Creates an idle session for a provider.
    #[must_use]
    pub fn new(provider: Provider, launcher: Box<dyn SessionLauncher + Send + Sync>) -> Self {
        Self {
            provider,
            launcher,
            state: LoginState::Idle,
            credential: None,
            sequence: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &LoginState {
        &self.state
    }

    #[must_use]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The held credential, only while `Authenticated`.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Clears the credential and returns to `Idle`.
    ///
    /// Also invalidates any in-flight attempt: its completion will
    /// carry a stale stamp.
    pub fn logout(&mut self) {
        self.sequence += 1;
        self.credential = None;
        self.state = LoginState::Idle;
        info!("{}: logged out", self.provider.name);
    }

    /// Starts a new attempt.
    ///
    /// The previous credential is cleared: it is only valid between a
    /// successful extraction and the next login or logout.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` when an attempt is already in
    /// flight; the caller must disable its login trigger while busy.
    pub fn begin(&mut self) -> Result<Attempt> {
        if self.state.is_busy() {
            return Err(Error::failed_precondition(format!(
                "{}: login already in progress",
                self.provider.name
            )));
        }

        self.sequence += 1;
        self.credential = None;
        self.state = LoginState::Launching;
        debug!("{}: attempt {} launching", self.provider.name, self.sequence);

        Ok(Attempt(self.sequence))
    }

    /// Marks the attempt as exchanging its code or identity token.
    ///
    /// Returns `false` and does nothing when the stamp is stale.
    pub fn exchanging(&mut self, attempt: Attempt) -> bool {
        if attempt.0 != self.sequence {
            return false;
        }

        self.state = LoginState::Exchanging;
        true
    }

    /// Applies a terminal result to the session.
    ///
    /// Returns `false` and does nothing when the stamp is stale: only
    /// the most recently started attempt may mutate the session.
    pub fn complete(
        &mut self,
        attempt: Attempt,
        result: std::result::Result<Credential, LoginError>,
    ) -> bool {
        if attempt.0 != self.sequence {
            debug!(
                "{}: discarding stale completion of attempt {}",
                self.provider.name, attempt.0
            );
            return false;
        }

        match result {
            Ok(credential) => {
                info!("{}: authenticated", self.provider.name);
                self.credential = Some(credential);
                self.state = LoginState::Authenticated;
            }
            Err(LoginError::Extract(ExtractError::Cancelled)) => {
                info!("{}: login cancelled", self.provider.name);
                self.credential = None;
                self.state = LoginState::Cancelled;
            }
            Err(e) => {
                warn!("{}: login failed: {e}", self.provider.name);
                self.credential = None;
                self.state = LoginState::Failed(e.to_string());
            }
        }

        true
    }

    /// Runs one complete login attempt: launch, extract, exchange.
    ///
    /// Holding the session mutably for the whole attempt is what makes
    /// overlap impossible from safe code; the stamp guard covers
    /// drivers that split [`begin`](Self::begin) and
    /// [`complete`](Self::complete) across tasks.
    ///
    /// # Errors
    ///
    /// Any phase failure, converted onto the unified error kinds with
    /// the phase named in the message. Cancellation surfaces as the
    /// `Cancelled` kind.
    pub async fn login(
        &mut self,
        http: &HttpClient,
        cancel: CancellationToken,
    ) -> Result<Credential> {
        let attempt = self.begin()?;
        let request = self.provider.authorization_request();

        let outcome = self.launcher.launch(&request, cancel).await;

        let result = match extract::extract(&outcome, self.provider.token_source) {
            Err(e) => Err(LoginError::from(e)),
            Ok(RawToken::Access(token)) => Ok(Credential::from_access_token(token)),
            Ok(RawToken::Code(code)) => {
                self.exchanging(attempt);
                match &self.provider.token_step {
                    TokenStep::CodeExchange {
                        token_url,
                        client_id,
                        api_key,
                    } => exchange::exchange(
                        http,
                        token_url,
                        &code,
                        client_id,
                        &self.provider.redirect_uri,
                        api_key.as_deref(),
                    )
                    .await
                    .map_err(LoginError::from),
                    _ => {
                        return Err(self.misconfigured("no exchange configured for authorization codes"))
                    }
                }
            }
            Ok(RawToken::Identity(id_token)) => {
                self.exchanging(attempt);
                match &self.provider.token_step {
                    TokenStep::IdentityExchange { backend_url } => {
                        exchange::exchange_identity(http, backend_url, &id_token)
                            .await
                            .map_err(LoginError::from)
                    }
                    _ => {
                        return Err(self.misconfigured("no backend configured for identity tokens"))
                    }
                }
            }
        };

        self.complete(attempt, result.clone());

        let credential = result?;
        Ok(credential)
    }

    /// Fails the attempt over a token step that cannot handle the
    /// extracted token. Unreachable through the presets.
    fn misconfigured(&mut self, detail: &str) -> Error {
        let reason = format!("{}: {detail}", self.provider.name);
        self.state = LoginState::Failed(reason.clone());
        Error::internal(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthorizationOutcome, AuthorizationRequest, BrowserSession};
    use crate::config::{Config, Secrets};
    use async_trait::async_trait;
    use url::Url;

    /// Launcher that returns a fixed outcome without opening anything.
    struct ScriptedLauncher(AuthorizationOutcome);

    #[async_trait]
    impl SessionLauncher for ScriptedLauncher {
        async fn launch(
            &self,
            _request: &AuthorizationRequest,
            _cancel: CancellationToken,
        ) -> AuthorizationOutcome {
            self.0.clone()
        }
    }

    fn config() -> Config {
        let secrets: Secrets = toml::from_str(r#"spotify_client_id = "9a5ca2db""#).unwrap();
        Config::with_secrets(secrets)
    }

    fn spotify_session(outcome: AuthorizationOutcome) -> LoginSession {
        let provider = Provider::spotify(&config()).unwrap();
        LoginSession::new(provider, Box::new(ScriptedLauncher(outcome)))
    }

    fn credential(token: &str) -> Credential {
        Credential::from_access_token(token)
    }

    /// Test: a second begin while in flight is rejected.
    #[test]
    fn test_overlap_guard() {
        let mut session = spotify_session(AuthorizationOutcome::Cancelled);

        let attempt = session.begin().unwrap();
        assert!(session.state().is_busy());
        assert!(session.begin().is_err());

        session.exchanging(attempt);
        assert!(session.begin().is_err());
    }

    /// Test: only the newest attempt's completion mutates the session.
    #[test]
    fn test_stale_completion_discarded() {
        let mut session = spotify_session(AuthorizationOutcome::Cancelled);

        let first = session.begin().unwrap();
        assert!(session.complete(first, Err(ExtractError::Cancelled.into())));
        assert_eq!(*session.state(), LoginState::Cancelled);

        let second = session.begin().unwrap();

        // The first attempt finishes late; it must not be applied.
        assert!(!session.complete(first, Ok(credential("stale"))));
        assert_eq!(*session.state(), LoginState::Launching);
        assert!(session.credential().is_none());
        assert!(!session.exchanging(first));

        assert!(session.complete(second, Ok(credential("fresh"))));
        assert_eq!(*session.state(), LoginState::Authenticated);
        assert_eq!(session.credential().unwrap().access_token, "fresh");
    }

    /// Test: logout clears the credential and invalidates in-flight
    /// attempts.
    #[test]
    fn test_logout() {
        let mut session = spotify_session(AuthorizationOutcome::Cancelled);

        let attempt = session.begin().unwrap();
        session.logout();
        assert_eq!(*session.state(), LoginState::Idle);

        assert!(!session.complete(attempt, Ok(credential("late"))));
        assert!(session.credential().is_none());
    }

    /// Test: a direct-token login completes without an exchange step.
    #[tokio::test]
    async fn test_direct_token_login() {
        let redirect =
            Url::parse("http://127.0.0.1:8085/callback#access_token=TOK&token_type=Bearer")
                .unwrap();
        let mut session = spotify_session(AuthorizationOutcome::Success(redirect));
        let http = HttpClient::new(&config()).unwrap();

        let credential = session
            .login(&http, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(credential.access_token, "TOK");
        assert_eq!(*session.state(), LoginState::Authenticated);
        assert_eq!(session.credential().unwrap().access_token, "TOK");
    }

    /// Test: cancellation ends in the neutral state, not a failure.
    #[tokio::test]
    async fn test_cancelled_login() {
        let mut session = spotify_session(AuthorizationOutcome::Cancelled);
        let http = HttpClient::new(&config()).unwrap();

        let error = session
            .login(&http, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(error.kind, crate::error::ErrorKind::Cancelled);
        assert_eq!(*session.state(), LoginState::Cancelled);
        assert!(session.credential().is_none());
    }

    /// Test: a launch failure names the launch phase.
    #[tokio::test]
    async fn test_failed_launch() {
        let mut session =
            spotify_session(AuthorizationOutcome::Failed("browser exploded".to_string()));
        let http = HttpClient::new(&config()).unwrap();

        let error = session
            .login(&http, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(error.to_string().contains("authorization session failed"));
        assert!(matches!(session.state(), LoginState::Failed(_)));
    }

    /// Test: a token-less redirect fails extraction, not the launch.
    #[tokio::test]
    async fn test_missing_token() {
        let redirect = Url::parse("http://127.0.0.1:8085/callback?no_fragment=1").unwrap();
        let mut session = spotify_session(AuthorizationOutcome::Success(redirect));
        let http = HttpClient::new(&config()).unwrap();

        let error = session
            .login(&http, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(error.kind, crate::error::ErrorKind::Unauthenticated);
        assert!(matches!(session.state(), LoginState::Failed(_)));
    }

    /// Test: the default launcher is what sessions are built with in
    /// the binary; make sure the trait object composes.
    #[test]
    fn test_browser_launcher_composes() {
        let provider = Provider::spotify(&config()).unwrap();
        let session = LoginSession::new(provider, Box::new(BrowserSession));
        assert_eq!(*session.state(), LoginState::Idle);
    }
}
