//! Authentication module
//!
//! Supports: query parameter token (Graph API), static bearer, Google service
//! account JWT assertion, and the provider's OAuth authorization-code flow.
//!
//! The `Authenticator` manages token caching for service account auth.

mod authenticator;
mod oauth;
mod types;

pub use authenticator::Authenticator;
pub use oauth::{OAuthConfig, OAuthFlow, UserToken, DEFAULT_SCOPES};
pub use types::{AuthConfig, CachedToken, ServiceAccountKey, CLOUD_PLATFORM_SCOPE};

#[cfg(test)]
mod tests;
