#![allow(dead_code)] // not every test crate uses every helper

//! Shared helpers for the integration tests.
//!
//! The canned responder is a one-shot loopback HTTP server: it accepts
//! a single connection, captures the raw request, answers with a fixed
//! response and returns the captured request for assertions. The same
//! raw-socket mechanism the redirect listener uses, pointed the other
//! way.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};
use url::Url;
use vaulture::config::{Config, Secrets};
use vaulture::http::Client as HttpClient;

/// Configuration with empty secrets, enough for HTTP client creation.
pub fn test_config() -> Config {
    let secrets: Secrets = toml::from_str("").unwrap();
    Config::with_secrets(secrets)
}

pub fn http_client() -> HttpClient {
    HttpClient::new(&test_config()).unwrap()
}

/// Composes a minimal HTTP/1.1 response.
pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serves exactly one request with a fixed response.
///
/// Returns the URL to call and a handle resolving to the raw request
/// that arrived.
pub async fn serve_once(response: String) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut buffer = [0u8; 16 * 1024];
        let mut request = Vec::new();
        loop {
            let n = stream.read(&mut buffer).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..n]);
            if request_complete(&request) {
                break;
            }
        }

        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        String::from_utf8_lossy(&request).into_owned()
    });

    let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
    (url, handle)
}

/// Whether the buffered request carries its full body yet.
fn request_complete(raw: &[u8]) -> bool {
    let Some(pos) = raw.windows(4).position(|window| window == b"\r\n\r\n") else {
        return false;
    };

    let head = String::from_utf8_lossy(&raw[..pos]);
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    raw.len() >= pos + 4 + content_length
}
