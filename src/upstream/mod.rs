pub mod http;

pub use http::HttpUpstream;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors from forwarding a request to the upstream server.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("no upstream configured")]
    NotConfigured,

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Transport(String),
}

/// Response relayed back to the caller byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        UpstreamResponse {
            status,
            body: body.into(),
        }
    }
}

/// Backend tool-execution server: send bytes, receive bytes or an error.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Forward a request body unmodified.
    async fn forward(&self, body: Bytes) -> Result<UpstreamResponse, UpstreamError>;

    /// Where requests go, for logs.
    fn target(&self) -> &str;
}
