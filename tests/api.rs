//! Authenticated API calls against a canned resource endpoint.

mod common;

use reqwest::header::HeaderValue;
use vaulture::{
    api::{Api, ApiError, ApiRequest},
    credential::Credential,
    exchange::api_key_header,
};

fn api() -> Api {
    Api::new(&common::test_config()).unwrap()
}

fn credential() -> Credential {
    Credential::from_access_token("TOK")
}

/// The bearer token and caller headers ride along on the request.
#[tokio::test]
async fn call_attaches_bearer_and_headers() {
    let (url, server) =
        common::serve_once(common::http_response("200 OK", r#"{"ok":true}"#)).await;

    let request =
        ApiRequest::get(url).with_header(api_key_header(), HeaderValue::from_static("key"));
    let value = api().call(&request, &credential()).await.unwrap();

    assert_eq!(value["ok"], serde_json::Value::Bool(true));

    let raw = server.await.unwrap().to_lowercase();
    assert!(raw.contains("authorization: bearer tok"));
    assert!(raw.contains("x-api-key: key"));
}

/// A 200 with a body that is not JSON is a parse error, not a success.
#[tokio::test]
async fn unparseable_success_body_is_parse_error() {
    let (url, _server) = common::serve_once(common::http_response("200 OK", "not json")).await;

    let result = api().call(&ApiRequest::get(url), &credential()).await;

    assert!(matches!(result.unwrap_err(), ApiError::Parse(_)));
}

/// A non-2xx answer carries status and body text.
#[tokio::test]
async fn error_status_carries_body() {
    let (url, _server) =
        common::serve_once(common::http_response("403 Forbidden", "denied")).await;

    let result = api().call(&ApiRequest::get(url), &credential()).await;

    assert_eq!(
        result.unwrap_err(),
        ApiError::Http {
            status: 403,
            body: "denied".to_string()
        }
    );
}

/// Transport failures classify as network errors, checked before any
/// status or body handling.
#[tokio::test]
async fn unreachable_host_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let url = url::Url::parse(&format!("http://127.0.0.1:{port}/resource")).unwrap();

    let result = api().call(&ApiRequest::get(url), &credential()).await;

    assert!(matches!(result.unwrap_err(), ApiError::Network(_)));
}

/// The typed fetch treats a shape mismatch as a parse error too.
#[tokio::test]
async fn typed_fetch_classifies_shape_mismatch() {
    #[derive(Debug, serde::Deserialize)]
    struct Expected {
        #[allow(dead_code)]
        name: String,
    }

    let (url, _server) =
        common::serve_once(common::http_response("200 OK", r#"{"other":1}"#)).await;

    let result: Result<Expected, ApiError> = api().fetch(&ApiRequest::get(url), &credential()).await;

    assert!(matches!(result.unwrap_err(), ApiError::Parse(_)));
}
