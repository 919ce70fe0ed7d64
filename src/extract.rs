//! Token extraction from authorization redirect URLs.
//!
//! Each provider puts its token somewhere else: the authorization code
//! grant appends `?code=` to the redirect, the implicit grant puts
//! `access_token` in the fragment, and native identity sign-in carries
//! an `id_token`. [`extract`] turns a terminal
//! [`AuthorizationOutcome`] plus a [`TokenSource`] into the raw token,
//! using structured URL-parameter parsing throughout.
//!
//! Only successful outcomes are inspected: `Cancelled` and `Failed`
//! short-circuit to the corresponding error without touching the URL.

use thiserror::Error;
use url::Url;

use crate::auth::AuthorizationOutcome;

/// Where a provider places its token in the redirect URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSource {
    /// Query parameter named `code`, to be exchanged at the token
    /// endpoint (authorization code grant).
    QueryCode,

    /// `access_token` parameter, usable directly (implicit grant).
    ///
    /// Looked up in the fragment and the query: servers put it in the
    /// fragment, but the loopback relay rewrites it into the query.
    FragmentToken,

    /// `id_token` parameter from a native identity-provider sign-in,
    /// to be exchanged with the auth backend for a session credential.
    NativeIdentityToken,
}

/// Raw token pulled out of a redirect URL.
///
/// Mirrors [`TokenSource`]: a code still needs the exchange step, an
/// access token is a credential as-is, an identity token goes to the
/// auth backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawToken {
    Code(String),
    Access(String),
    Identity(String),
}

/// Why extraction produced no token.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The authorization session never produced a redirect.
    #[error("authorization session failed: {0}")]
    Launch(String),

    /// The user ended the session; neutral, not an error banner.
    #[error("login cancelled by the user")]
    Cancelled,

    /// The redirect URL has no `code` query parameter.
    #[error("redirect carries no authorization code")]
    MissingCode,

    /// The redirect URL has no token parameter.
    #[error("redirect carries no access token")]
    MissingToken,
}

/// Extracts the raw token for `source` from a terminal outcome.
///
/// # Errors
///
/// * [`ExtractError::Cancelled`] / [`ExtractError::Launch`] for
///   non-success outcomes, without inspecting any URL
/// * [`ExtractError::MissingCode`] / [`ExtractError::MissingToken`]
///   when the redirect lacks the expected parameter
pub fn extract(outcome: &AuthorizationOutcome, source: TokenSource) -> Result<RawToken, ExtractError> {
    let redirect_url = match outcome {
        AuthorizationOutcome::Success(url) => url,
        AuthorizationOutcome::Cancelled => return Err(ExtractError::Cancelled),
        AuthorizationOutcome::Failed(reason) => return Err(ExtractError::Launch(reason.clone())),
    };

    match source {
        TokenSource::QueryCode => query_param(redirect_url, "code")
            .map(RawToken::Code)
            .ok_or(ExtractError::MissingCode),
        TokenSource::FragmentToken => param_anywhere(redirect_url, "access_token")
            .map(RawToken::Access)
            .ok_or(ExtractError::MissingToken),
        TokenSource::NativeIdentityToken => param_anywhere(redirect_url, "id_token")
            .map(RawToken::Identity)
            .ok_or(ExtractError::MissingToken),
    }
}

/// Looks up a non-empty query parameter.
fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Looks up a non-empty parameter in the fragment or the query.
///
/// The fragment is parsed as a URL-encoded parameter list, the same
/// format the query uses.
fn param_anywhere(url: &Url, name: &str) -> Option<String> {
    let fragment = url.fragment().and_then(|fragment| {
        url::form_urlencoded::parse(fragment.as_bytes())
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    });

    fragment.or_else(|| query_param(url, name))
}
