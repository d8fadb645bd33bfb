use super::{Transport, TransportError};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, Proxy};
use std::env;
use std::time::Duration;
use url::Url;

/// `reqwest::Client` bound to an API base URL, with production-friendly defaults.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a client for `base_url`.
    ///
    /// Env-overridable knobs:
    /// - `PACER_HTTP_TIMEOUT_SECS` (default 30)
    /// - `PACER_HTTP_POOL_MAX_IDLE_PER_HOST` (default 32)
    /// - `PACER_PROXY_URL`
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(TransportError::InvalidUrl)?;

        let timeout_secs = env::var("PACER_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(
                env::var("PACER_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("PACER_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        Ok(Self { client, base_url })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Start a request for `path`, resolved against the base URL.
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.base_url.join(path).map_err(TransportError::InvalidUrl)?;
        Ok(self.client.request(method, url))
    }

    /// Build a ready-to-execute GET request for `path`.
    pub fn get(&self, path: &str) -> Result<reqwest::Request> {
        self.request(Method::GET, path)?
            .build()
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    type Request = reqwest::Request;
    type Response = reqwest::Response;

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        self.client
            .execute(request)
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }
}
