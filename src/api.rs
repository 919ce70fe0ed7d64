//! Bearer-authenticated API client.
//!
//! Every resource call in the crate goes through [`Api::call`]: it
//! attaches the `Authorization: Bearer` header plus whatever headers
//! the caller supplies (typically a static API key), performs the
//! request once, and classifies the result. Classification order is
//! fixed:
//!
//! 1. transport failure (DNS, TLS, connection reset) → [`ApiError::Network`]
//! 2. HTTP status outside 200-299 → [`ApiError::Http`]
//! 3. body not parseable as JSON → [`ApiError::Parse`]
//! 4. otherwise → parsed JSON
//!
//! There is no retry, no backoff and no timeout beyond the HTTP
//! client's defaults; screens decide what to do with a failure.

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Method,
};
use thiserror::Error;
use url::Url;

use crate::{
    config::Config, credential::Credential, error::Result, http::Client as HttpClient, protocol,
};

/// One resource API call, constructed per request and not retained.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl ApiRequest {
    /// Builds a GET request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Builds a POST request with a JSON body.
    #[must_use]
    pub fn post(url: Url, body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            url,
            method: Method::POST,
            headers,
            body: Some(body),
        }
    }

    /// Adds a header, replacing any previous value for the name.
    #[must_use]
    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Classified failure of a resource API call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never completed: DNS, TLS, connection reset.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered outside 200-299; carries the body as text.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The body was delivered but does not parse as JSON.
    #[error("parsing response failed: {0}")]
    Parse(String),
}

/// Authenticated API client over the rate-limited HTTP client.
pub struct Api {
    http: HttpClient,
}

impl Api {
    /// Creates a client from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    /// The underlying HTTP client, shared with the token exchange.
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Performs the request and classifies transport and status.
    ///
    /// Returns the body text of a 2xx answer; parsing it is the
    /// caller's concern so each body is only parsed once.
    async fn dispatch(
        &self,
        request: &ApiRequest,
        credential: &Credential,
    ) -> std::result::Result<String, ApiError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.access_token))
            .map_err(|e| ApiError::Network(format!("composing request failed: {e}")))?;

        let mut raw = self.http.request(
            request.method.clone(),
            request.url.clone(),
            request.body.clone().unwrap_or_default(),
        );
        let headers = raw.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.extend(request.headers.clone());

        let response = self
            .http
            .execute(raw)
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    /// Performs one call and returns the parsed JSON body.
    ///
    /// # Errors
    ///
    /// Classified per the module rules; see [`ApiError`].
    pub async fn call(
        &self,
        request: &ApiRequest,
        credential: &Credential,
    ) -> std::result::Result<serde_json::Value, ApiError> {
        let body = self.dispatch(request, credential).await?;
        protocol::json(&body, request.url.path()).map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Performs one call and deserializes the body straight into `T`,
    /// in a single parse.
    ///
    /// A body that is valid JSON but doesn't match `T` is a
    /// [`ApiError::Parse`] as well.
    ///
    /// # Errors
    ///
    /// Classified per the module rules; see [`ApiError`].
    pub async fn fetch<T>(
        &self,
        request: &ApiRequest,
        credential: &Credential,
    ) -> std::result::Result<T, ApiError>
    where
        T: for<'de> serde::Deserialize<'de> + std::fmt::Debug,
    {
        let body = self.dispatch(request, credential).await?;
        protocol::json(&body, request.url.path()).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: request builders set method, content type and headers.
    #[test]
    fn test_request_builders() {
        let url = Url::parse("https://example.com/resource").unwrap();

        let get = ApiRequest::get(url.clone());
        assert_eq!(get.method, Method::GET);
        assert!(get.body.is_none());

        let post = ApiRequest::post(url, "{}".to_string()).with_header(
            crate::exchange::api_key_header(),
            HeaderValue::from_static("k"),
        );
        assert_eq!(post.method, Method::POST);
        assert_eq!(post.body.as_deref(), Some("{}"));
        assert_eq!(
            post.headers.get(crate::exchange::api_key_header()).unwrap(),
            "k"
        );
        assert_eq!(
            post.headers.get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
