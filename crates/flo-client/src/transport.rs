//! HTTP transport boundary
//!
//! The client never talks to the network directly; it hands a
//! [`SignedRequest`] to a [`Transport`] and gets back a status and body text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::{debug, error, instrument};

#[cfg(test)]
use mockall::automock;

use crate::config::Endpoint;
use crate::error::{FloError, FloResult};
use crate::request::{HttpMethod, SignedRequest};

/// Raw response handed back by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends signed requests to the flo API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &SignedRequest) -> FloResult<TransportResponse>;
}

/// reqwest-backed transport bound to one endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Endpoint,
    client: Client,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint, timeout_secs: u64) -> FloResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(FloError::from_http)?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.base_url(), path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &SignedRequest) -> FloResult<TransportResponse> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };

        let mut builder = self.client.request(method, self.url(&request.path));
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if request.method == HttpMethod::Post {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            error!("Request to {} failed: {}", request.path, e);
            FloError::from_http(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(FloError::from_http)?;
        debug!(status, bytes = body.len(), "Received response");

        Ok(TransportResponse { status, body })
    }
}
