//! Transport boundary and the rate-limited decorators.
//!
//! The decorators only need a request they can put a header on and a response they can
//! read a status and header from. [`RequestParts`] and [`ResponseParts`] capture that.
//! [`Transport`] is the base that actually moves bytes.

mod auth;
mod http;
mod rate_limited;

pub use auth::{AuthenticatedRateLimitedTransport, BearerToken};
pub use http::HttpTransport;
pub use rate_limited::RateLimitedTransport;

use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};

/// Outgoing request that accepts header assignment.
pub trait RequestParts {
    /// Set `name` to `value`, replacing any existing value.
    fn set_header(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Completed response exposing what the limiter inspects.
pub trait ResponseParts {
    fn status(&self) -> u16;

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    fn header(&self, name: &str) -> Option<&str>;
}

/// Request executor being decorated.
#[async_trait]
pub trait Transport: Send + Sync {
    type Request: RequestParts + Send;
    type Response: ResponseParts + Send + Sync;

    async fn execute(&self, request: Self::Request) -> Result<Self::Response>;
}

impl RequestParts for reqwest::Request {
    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        if name == AUTHORIZATION {
            value.set_sensitive(true);
        }
        self.headers_mut().insert(name, value);
        Ok(())
    }
}

impl ResponseParts for reqwest::Response {
    fn status(&self) -> u16 {
        reqwest::Response::status(self).as_u16()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

#[async_trait]
impl Transport for reqwest::Client {
    type Request = reqwest::Request;
    type Response = reqwest::Response;

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Other(String),
}
