//! Integration tests with mock HTTP server

pub mod auth;
pub mod concurrency;
pub mod throttling;
