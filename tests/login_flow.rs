//! End-to-end login flows with a scripted authorization session and a
//! canned token endpoint.

mod common;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;
use vaulture::{
    auth::{AuthorizationOutcome, AuthorizationRequest, SessionLauncher},
    extract::TokenSource,
    provider::{Provider, TokenStep},
    session::{LoginSession, LoginState},
};

/// Launcher that skips the browser and returns a fixed outcome.
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

fn redirect_uri() -> Url {
    Url::parse("http://127.0.0.1:8085/callback").unwrap()
}

fn code_provider(token_url: Url) -> Provider {
    Provider::custom(
        "game-test",
        Url::parse("https://auth.example.com/authorize").unwrap(),
        redirect_uri(),
        TokenSource::QueryCode,
        TokenStep::CodeExchange {
            token_url,
            client_id: "37130".to_string(),
            api_key: Some("key".to_string()),
        },
    )
}

/// Authorize, redirect with a code, exchange, hold the credential.
#[tokio::test]
async fn code_grant_end_to_end() {
    let (token_url, server) = common::serve_once(common::http_response(
        "200 OK",
        r#"{"access_token":"t1","refresh_token":"r1","expires_in":3600}"#,
    ))
    .await;

    let redirect = Url::parse("http://127.0.0.1:8085/callback?code=XYZ&state=xyz").unwrap();
    let mut session = LoginSession::new(
        code_provider(token_url),
        Box::new(ScriptedLauncher(AuthorizationOutcome::Success(redirect))),
    );

    let http = common::http_client();
    let credential = session.login(&http, CancellationToken::new()).await.unwrap();

    assert_eq!(credential.access_token, "t1");
    assert_eq!(credential.refresh_token.as_deref(), Some("r1"));
    assert_eq!(*session.state(), LoginState::Authenticated);
    assert_eq!(session.credential().unwrap().access_token, "t1");

    let request = server.await.unwrap();
    assert!(request.contains("code=XYZ"));

    // Logout clears the credential back to idle.
    session.logout();
    assert_eq!(*session.state(), LoginState::Idle);
    assert!(session.credential().is_none());
}

/// A rejected exchange ends the attempt as failed, with the server's
/// message in the state.
#[tokio::test]
async fn rejected_exchange_fails_attempt() {
    let (token_url, _server) = common::serve_once(common::http_response(
        "400 Bad Request",
        r#"{"error_description":"invalid_grant"}"#,
    ))
    .await;

    let redirect = Url::parse("http://127.0.0.1:8085/callback?code=STALE").unwrap();
    let mut session = LoginSession::new(
        code_provider(token_url),
        Box::new(ScriptedLauncher(AuthorizationOutcome::Success(redirect))),
    );

    let http = common::http_client();
    let error = session
        .login(&http, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(error.to_string().contains("invalid_grant"));
    match session.state() {
        LoginState::Failed(reason) => assert!(reason.contains("invalid_grant")),
        state => panic!("unexpected state {state:?}"),
    }
    assert!(session.credential().is_none());
}

/// A redirect without the code never reaches the token endpoint.
#[tokio::test]
async fn missing_code_short_circuits_exchange() {
    // No server behind this URL; reaching it would fail the test with
    // a network error instead of the extraction error.
    let token_url = Url::parse("http://127.0.0.1:1/token").unwrap();

    let redirect = Url::parse("http://127.0.0.1:8085/callback?state=xyz").unwrap();
    let mut session = LoginSession::new(
        code_provider(token_url),
        Box::new(ScriptedLauncher(AuthorizationOutcome::Success(redirect))),
    );

    let http = common::http_client();
    let error = session
        .login(&http, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(error.to_string().contains("no authorization code"));
    assert!(matches!(session.state(), LoginState::Failed(_)));
}

/// Starting a new attempt clears the previous credential; it is only
/// valid between extraction and the next login or logout.
#[tokio::test]
async fn new_attempt_clears_credential() {
    let redirect = Url::parse("http://127.0.0.1:8085/callback#access_token=FIRST").unwrap();
    let provider = Provider::custom(
        "music-test",
        Url::parse("https://accounts.example.com/authorize").unwrap(),
        redirect_uri(),
        TokenSource::FragmentToken,
        TokenStep::Direct,
    );
    let mut session = LoginSession::new(
        provider,
        Box::new(ScriptedLauncher(AuthorizationOutcome::Success(redirect))),
    );

    let http = common::http_client();
    session.login(&http, CancellationToken::new()).await.unwrap();
    assert_eq!(session.credential().unwrap().access_token, "FIRST");

    let _attempt = session.begin().unwrap();
    assert_eq!(*session.state(), LoginState::Launching);
    assert!(session.credential().is_none());
}
