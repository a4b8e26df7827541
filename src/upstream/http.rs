use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use super::{Upstream, UpstreamError, UpstreamResponse};

/// Forwards JSON-RPC bodies to an HTTP upstream with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpUpstream {
    /// Create a client for the given upstream URL.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(HttpUpstream {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, body: Bytes) -> Result<UpstreamResponse, UpstreamError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                UpstreamError::Timeout(self.timeout)
            } else {
                UpstreamError::Transport(e.to_string())
            }
        };

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_err)?;

        Ok(UpstreamResponse { status, body })
    }

    fn target(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};

    async fn spawn_echo() -> String {
        let app = Router::new().route(
            "/",
            post(|body: Bytes| async move { (axum::http::StatusCode::ACCEPTED, body) }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_forward_relays_status_and_body() {
        let url = spawn_echo().await;
        let upstream = HttpUpstream::new(url, Duration::from_secs(5)).unwrap();

        let body = Bytes::from_static(br#"{"jsonrpc":"2.0","method":"ping","id":1}"#);
        let response = upstream.forward(body.clone()).await.unwrap();

        assert_eq!(response.status, 202);
        assert_eq!(response.body, body);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let upstream = HttpUpstream::new(format!("http://{}/", addr), Duration::from_secs(2)).unwrap();
        let result = upstream.forward(Bytes::from_static(b"{}")).await;

        assert!(matches!(result, Err(UpstreamError::Transport(_))));
    }
}
