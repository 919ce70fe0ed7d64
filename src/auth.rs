//! Browser-based authorization sessions.
//!
//! A login attempt starts with an [`AuthorizationRequest`] and ends in
//! exactly one [`AuthorizationOutcome`]: the redirect URL the
//! authorization server sent the user agent back to, a cancellation, or
//! a failure. There is no partial result.
//!
//! The default launcher, [`BrowserSession`], opens the authorization
//! URL in the system browser and receives the redirect on a loopback
//! HTTP listener. Because browsers never transmit URL fragments to a
//! server, the listener answers fragment-carrying redirects (implicit
//! grant) with a small relay page that re-requests with the fragment
//! rewritten into the query string; extraction then finds the token in
//! either place.

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;
use url::Url;

/// One authorization attempt against an external authorization server.
///
/// Immutable; construct a fresh request per attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Fully-composed authorization endpoint URL, including client ID,
    /// response type, scopes and state.
    pub authorization_url: Url,

    /// Where the authorization server sends the user agent back to.
    pub redirect_uri: Url,
}

/// Terminal result of an authorization session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The flow reached the redirect URI; carries the full redirect URL
    /// with whatever parameters the server attached.
    Success(Url),

    /// The user dismissed the session or declined consent.
    ///
    /// Deliberately distinct from [`Failed`](Self::Failed): this is a
    /// neutral end state, not an error.
    Cancelled,

    /// The session could not be launched or did not complete.
    Failed(String),
}

/// Opens an authorization session and waits for its terminal outcome.
///
/// Implementations must report every launch-mechanism error as
/// [`AuthorizationOutcome::Failed`] and map user dismissal to
/// [`AuthorizationOutcome::Cancelled`]; they must not panic or drop the
/// attempt silently.
#[async_trait]
pub trait SessionLauncher {
    /// Runs one authorization session to completion.
    ///
    /// Firing `cancel` ends the session with
    /// [`AuthorizationOutcome::Cancelled`].
    async fn launch(
        &self,
        request: &AuthorizationRequest,
        cancel: CancellationToken,
    ) -> AuthorizationOutcome;
}

/// Authorization session in the system browser with a loopback
/// redirect listener.
///
/// Only loopback HTTP redirect URIs are supported; the registered
/// redirect URI must match what the listener binds to.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserSession;

/// Response served once the redirect has been captured.
const LANDING_PAGE: &str = "<!DOCTYPE html><html><body>\
    <p>Login complete. You can close this window and return to the application.</p>\
    </body></html>";

/// Relay page that rewrites a URL fragment into the query string.
///
/// Served when the redirect arrives without query parameters; the
/// implicit grant puts the token in the fragment, which the browser
/// keeps to itself. `no_fragment` marks a redirect that carried
/// neither, so extraction can report the token as missing.
const RELAY_PAGE: &str = "<!DOCTYPE html><html><body><script>\
    var h = window.location.hash;\
    window.location.replace(window.location.pathname + '?' + \
        (h ? h.substring(1) : 'no_fragment=1'));\
    </script></body></html>";

impl BrowserSession {
    /// Checks that the redirect URI is something the loopback listener
    /// can actually receive.
    fn loopback_address(redirect_uri: &Url) -> Result<(String, u16), String> {
        if redirect_uri.scheme() != "http" {
            return Err(format!(
                "redirect URI {redirect_uri} is not a loopback HTTP address"
            ));
        }

        let host = match redirect_uri.host_str() {
            Some(host @ ("127.0.0.1" | "localhost")) => host.to_string(),
            // Bind addresses take the bare IPv6 form, without brackets.
            Some("[::1]") => "::1".to_string(),
            _ => {
                return Err(format!(
                    "redirect URI {redirect_uri} is not a loopback HTTP address"
                ))
            }
        };

        let port = redirect_uri
            .port()
            .ok_or_else(|| format!("redirect URI {redirect_uri} has no port"))?;

        Ok((host, port))
    }

    /// Handles one inbound connection on the listener.
    ///
    /// Returns the captured redirect URL once a request for the
    /// redirect path with query parameters arrives; `None` keeps the
    /// session waiting.
    async fn handle_connection(
        stream: TcpStream,
        redirect_uri: &Url,
    ) -> Result<Option<Url>, String> {
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .await
            .map_err(|e| format!("reading redirect request failed: {e}"))?;

        // Request line: `GET /callback?code=... HTTP/1.1`
        let target = request_line.split_whitespace().nth(1).unwrap_or_default();
        let requested = match redirect_uri.join(target) {
            Ok(url) => url,
            Err(e) => return Err(format!("redirect target invalid: {e}")),
        };

        let mut stream = reader.into_inner();
        if requested.path() != redirect_uri.path() {
            // Browsers probe for favicons and the like; ignore.
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await;
            return Ok(None);
        }

        if requested.query().is_none() {
            // Fragment-only redirect: have the browser resend the
            // parameters where we can see them.
            Self::respond(&mut stream, RELAY_PAGE).await;
            return Ok(None);
        }

        Self::respond(&mut stream, LANDING_PAGE).await;
        Ok(Some(requested))
    }

    async fn respond(stream: &mut TcpStream, body: &str) {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        // The outcome is already decided; a write failure here only
        // costs the user a nicer page.
        if let Err(e) = stream.write_all(response.as_bytes()).await {
            debug!("writing callback response failed: {e}");
        }
    }

    /// Classifies a captured redirect URL into an outcome.
    ///
    /// An `error=access_denied` parameter is the server-side spelling
    /// of the user declining consent and maps to `Cancelled`; any other
    /// `error` parameter is a failure.
    fn classify(redirect_url: Url) -> AuthorizationOutcome {
        let mut error = None;
        let mut description = None;
        for (key, value) in redirect_url.query_pairs() {
            match key.as_ref() {
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        match error {
            Some(error) if error == "access_denied" => AuthorizationOutcome::Cancelled,
            Some(error) => AuthorizationOutcome::Failed(description.unwrap_or(error)),
            None => AuthorizationOutcome::Success(redirect_url),
        }
    }
}

#[async_trait]
impl SessionLauncher for BrowserSession {
    async fn launch(
        &self,
        request: &AuthorizationRequest,
        cancel: CancellationToken,
    ) -> AuthorizationOutcome {
        let (host, port) = match Self::loopback_address(&request.redirect_uri) {
            Ok(address) => address,
            Err(reason) => return AuthorizationOutcome::Failed(reason),
        };

        // Bind before opening the browser so the redirect cannot race
        // the listener.
        let listener = match TcpListener::bind((host.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                return AuthorizationOutcome::Failed(format!(
                    "binding redirect listener on port {port} failed: {e}"
                ))
            }
        };

        info!("opening authorization page in browser");
        debug!("authorization URL: {}", request.authorization_url);
        if let Err(e) = open::that(request.authorization_url.as_str()) {
            return AuthorizationOutcome::Failed(format!("opening browser failed: {e}"));
        }

        loop {
            let stream = tokio::select! {
                // Prioritize cancellation over a racing redirect.
                biased;

                () = cancel.cancelled() => return AuthorizationOutcome::Cancelled,

                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        return AuthorizationOutcome::Failed(format!(
                            "redirect listener failed: {e}"
                        ))
                    }
                },
            };

            match Self::handle_connection(stream, &request.redirect_uri).await {
                Ok(Some(redirect_url)) => return Self::classify(redirect_url),
                Ok(None) => {}
                Err(reason) => return AuthorizationOutcome::Failed(reason),
            }
        }
    }
}
