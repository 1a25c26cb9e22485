//! HTTP plumbing shared by all providers.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::GeocodeError;

/// Build the HTTP client used by every provider
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, GeocodeError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| GeocodeError::Client(e.to_string()))
}

/// Join `path` onto `base` and append the query parameters
pub(crate) fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, GeocodeError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse_with_params(&raw, params).map_err(|e| GeocodeError::Client(e.to_string()))
}

/// GET a URL and return the body of a successful response
pub(crate) async fn get_text(client: &Client, url: Url) -> Result<String, GeocodeError> {
    debug!("GET {}", redact(&url));

    let response = client
        .get(url)
        .send()
        .await
        .map_err(GeocodeError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GeocodeError::from_status(status.as_u16(), &body));
    }

    response.text().await.map_err(GeocodeError::from_reqwest)
}

/// URL with API keys masked, for logging
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "key" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_and_encodes() {
        let url = endpoint(
            "https://nominatim.openstreetmap.org/",
            "/search",
            &[("q", "Rua A, Guarujá"), ("format", "json")],
        )
        .unwrap();
        assert_eq!(url.path(), "/search");
        let q: Vec<_> = url.query_pairs().collect();
        assert_eq!(q[0].1, "Rua A, Guarujá");
        assert!(url.as_str().contains("Rua+A%2C+Guaruj%C3%A1"));
    }

    /// Serve one connection: read the request, write `reply`, then close
    async fn serve_once(reply: &'static [u8]) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(reply).await;
            let _ = socket.shutdown().await;
        });
        endpoint(&format!("http://{}", addr), "search", &[("q", "x")]).unwrap()
    }

    #[tokio::test]
    async fn test_closed_connection_is_transient() {
        let url = serve_once(b"").await;
        let client = build_client("geobatch-test", Duration::from_secs(5)).unwrap();
        let err = get_text(&client, url).await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }

    #[tokio::test]
    async fn test_truncated_body_is_transient() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n[{\"lat\"").await;
        let client = build_client("geobatch-test", Duration::from_secs(5)).unwrap();
        let err = get_text(&client, url).await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }

    #[test]
    fn test_redact_hides_key() {
        let url = endpoint("https://example.com", "json", &[("address", "x"), ("key", "secret")])
            .unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("address=x"));
    }
}
