//! HTTP client module
//!
//! Provides the HTTP client shared by the provider, secret store, queue and
//! warehouse clients.
//!
//! # Features
//!
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Authentication**: Integration with auth module
//! - **Error Classification**: Non-2xx responses become `Error::RemoteRequest`
//!   carrying the remote error message
//!
//! Requests are never retried here. A failed run is redelivered by the task
//! queue instead.

mod client;
mod rate_limit;

pub use client::{remote_error_message, HttpClient, HttpClientConfig, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
