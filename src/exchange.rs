//! Token exchange against OAuth token endpoints.
//!
//! Two shapes of exchange exist:
//! * [`exchange`] - the authorization code grant: one POST with an
//!   URL-form-encoded body and, where the provider requires it, a
//!   static API-key header
//! * [`exchange_identity`] - the simpler identity-provider flow: the
//!   identity token from a native sign-in is posted to the auth
//!   backend, which answers with a session credential
//!
//! Neither retries. A rejection carries the server's own message where
//! one is given, so the user can tell why the exchange failed.

use http::header::CONTENT_TYPE;
use reqwest::{
    header::{HeaderName, HeaderValue},
    StatusCode,
};
use thiserror::Error;
use url::Url;

use crate::{
    credential::Credential,
    http::Client as HttpClient,
    protocol::token::{AccessToken, TokenError},
};

/// Static API-key header some providers require on token calls.
#[must_use]
pub fn api_key_header() -> HeaderName {
    HeaderName::from_static("x-api-key")
}

/// Content type of the authorization code grant body.
const FORM_CONTENT: HeaderValue = HeaderValue::from_static("application/x-www-form-urlencoded");

/// Why a token exchange produced no credential.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    /// The server answered and said no: non-2xx status, or a well-formed
    /// body without an access token. Carries the server's message.
    #[error("exchange rejected: {0}")]
    Rejected(String),

    /// The response body is not structured data.
    #[error("exchange response is malformed")]
    MalformedResponse,

    /// The request never completed.
    #[error("exchange network error: {0}")]
    Network(String),
}

/// Exchanges an authorization code for a credential.
///
/// Issues one POST with `grant_type=authorization_code`, `code`,
/// `client_id` and `redirect_uri` form-encoded, plus the API-key header
/// when the provider has one.
///
/// # Errors
///
/// * [`ExchangeError::Rejected`] when the server refuses the code or
///   omits the access token
/// * [`ExchangeError::MalformedResponse`] when the body isn't JSON
/// * [`ExchangeError::Network`] when the request doesn't complete
pub async fn exchange(
    http: &HttpClient,
    token_url: &Url,
    code: &str,
    client_id: &str,
    redirect_uri: &Url,
    api_key: Option<&str>,
) -> Result<Credential, ExchangeError> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", code)
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri.as_str())
        .finish();

    let mut request = http.post(token_url.clone(), body);
    let headers = request.headers_mut();
    headers.insert(CONTENT_TYPE, FORM_CONTENT);
    if let Some(api_key) = api_key {
        let value = HeaderValue::from_str(api_key)
            .map_err(|e| ExchangeError::Network(format!("composing request failed: {e}")))?;
        headers.insert(api_key_header(), value);
    }

    let response = http
        .execute(request)
        .await
        .map_err(|e| ExchangeError::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::Network(e.to_string()))?;

    classify(status, &body)
}

/// Exchanges a native identity token for a session credential.
///
/// The backend takes the identity token as JSON; there is no grant
/// type and no API key. Classification matches [`exchange`].
///
/// # Errors
///
/// Same as [`exchange`].
pub async fn exchange_identity(
    http: &HttpClient,
    backend_url: &Url,
    id_token: &str,
) -> Result<Credential, ExchangeError> {
    let body = serde_json::json!({ "id_token": id_token }).to_string();

    let mut request = http.post(backend_url.clone(), body);
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let response = http
        .execute(request)
        .await
        .map_err(|e| ExchangeError::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::Network(e.to_string()))?;

    classify(status, &body)
}

/// Classifies a token endpoint response.
///
/// Order matters: a non-2xx status is a rejection even when the body is
/// garbage, with the rawest message available; a 2xx body must be JSON
/// and must contain an access token.
fn classify(status: StatusCode, body: &str) -> Result<Credential, ExchangeError> {
    if !status.is_success() {
        let message = serde_json::from_str::<TokenError>(body)
            .ok()
            .and_then(|error| error.message())
            .unwrap_or_else(|| format!("HTTP {status}: {body}"));
        return Err(ExchangeError::Rejected(message));
    }

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| ExchangeError::MalformedResponse)?;

    match AccessToken::deserialize_from(&value) {
        Some(grant) => Ok(grant.into_credential()),
        None => {
            let message = serde_json::from_value::<TokenError>(value)
                .ok()
                .and_then(|error| error.message())
                .unwrap_or_else(|| "response lacks an access token".to_string());
            Err(ExchangeError::Rejected(message))
        }
    }
}

impl AccessToken {
    /// Deserializes a grant from an already-parsed body, `None` when
    /// the access token field is absent or mistyped.
    fn deserialize_from(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
