//! HTTP transport used by the probe executor

use std::time::Duration;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::Method;
use thiserror::Error;
use url::Url;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connect, DNS, TLS or timeout failure before a response arrived.
    #[error("{0}")]
    Request(String),

    /// A response arrived but its body could not be read in full.
    #[error("{message}")]
    Body {
        status: u16,
        content_type: String,
        message: String,
    },
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch(&self, method: Method, url: &Url) -> std::result::Result<HttpResponse, TransportError>;
}

/// Production transport: a shared `reqwest` client with a whole-request
/// timeout and a cap on how much of a body is read.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("statuswatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, method: Method, url: &Url) -> std::result::Result<HttpResponse, TransportError> {
        let mut response = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > self.max_body_bytes {
                        return Err(TransportError::Body {
                            status,
                            content_type,
                            message: format!(
                                "response body exceeds {} bytes",
                                self.max_body_bytes
                            ),
                        });
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(TransportError::Body {
                        status,
                        content_type,
                        message: e.to_string(),
                    })
                }
            }
        }

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
