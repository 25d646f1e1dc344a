//! A minimal transport-agnostic request/response pair and the boundary the
//! interception pipeline wraps, per spec.md §5 and the supplemented
//! `RoundTripper` described in SPEC_FULL.md §11.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The boundary the interception pipeline wraps. Implementations perform
/// the actual network call; the pipeline never sees past this trait, so
/// swapping it is how a host plugs in its own HTTP client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoundTripper: Send + Sync {
    async fn round_trip(&self, request: Request) -> Result<Response, TransportError>;
}

/// The production implementation, backed by a single shared `reqwest::Client`.
pub struct ReqwestRoundTripper {
    client: reqwest::Client,
}

impl ReqwestRoundTripper {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestRoundTripper {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl RoundTripper for ReqwestRoundTripper {
    async fn round_trip(&self, request: Request) -> Result<Response, TransportError> {
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_round_tripper_returns_configured_response() {
        let mut mock = MockRoundTripper::new();
        mock.expect_round_trip().returning(|_| {
            Ok(Response {
                status: 200,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"{}"),
            })
        });

        let request = Request {
            method: Method::GET,
            url: Url::parse("https://api.example.com/").unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let response = mock.round_trip(request).await.unwrap();
        assert_eq!(response.status, 200);
    }
}
