use super::{RateLimitedTransport, RequestParts, Transport};
use crate::context::RequestContext;
use crate::resilience::Pacer;
use crate::{Error, ErrorContext, Result};
use keyring::Entry;
use std::env;
use std::sync::Arc;

/// Static API credential sent as `Authorization: Bearer <token>`.
///
/// `Debug` output never includes the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the token from environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        match env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self(token.trim().to_string())),
            _ => Err(Error::configuration_with_context(
                "API token not set",
                ErrorContext::new()
                    .with_field_path(var)
                    .with_source("bearer_token"),
            )),
        }
    }

    /// Read the token from the OS keyring.
    pub fn from_keyring(service: &str, user: &str) -> Result<Self> {
        let lookup_failed = |e: keyring::Error| {
            Error::configuration_with_context(
                "API token not found in keyring",
                ErrorContext::new()
                    .with_field_path(format!("{}/{}", service, user))
                    .with_details(e.to_string())
                    .with_source("bearer_token"),
            )
        };
        let entry = Entry::new(service, user).map_err(lookup_failed)?;
        let token = entry.get_password().map_err(lookup_failed)?;
        Ok(Self(token))
    }

    /// Keyring first, then the environment variable.
    pub fn resolve(service: &str, user: &str, env_var: &str) -> Result<Self> {
        Self::from_keyring(service, user).or_else(|_| Self::from_env(env_var))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// [`RateLimitedTransport`] that also attaches a bearer token.
///
/// The header is set only after pacing clearance, so a call cancelled while waiting
/// never leaves with credentials attached.
pub struct AuthenticatedRateLimitedTransport<T> {
    inner: RateLimitedTransport<T>,
    token: BearerToken,
}

impl<T: Transport> AuthenticatedRateLimitedTransport<T> {
    pub fn new(base: T, limiter: Arc<dyn Pacer>, token: BearerToken) -> Self {
        Self {
            inner: RateLimitedTransport::new(base, limiter),
            token,
        }
    }

    pub fn base(&self) -> &T {
        self.inner.base()
    }

    pub fn limiter(&self) -> &Arc<dyn Pacer> {
        self.inner.limiter()
    }

    pub async fn execute(&self, ctx: &RequestContext, request: T::Request) -> Result<T::Response> {
        let value = self.token.header_value();
        self.inner
            .execute_with(ctx, request, move |req| req.set_header("authorization", &value))
            .await
    }
}

impl<T: Clone> Clone for AuthenticatedRateLimitedTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for AuthenticatedRateLimitedTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedRateLimitedTransport")
            .field("inner", &self.inner)
            .field("token", &self.token)
            .finish()
    }
}
