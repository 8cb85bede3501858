//! Secret storage
//!
//! The provider access token and the OAuth client secret live in a secret
//! store. Runs read the token fresh each time; the OAuth callback writes a new
//! version after a code exchange.

mod stores;

pub use stores::{EnvSecretStore, GcpSecretManager, InMemorySecretStore, SECRET_MANAGER_URL};

use crate::error::Result;
use async_trait::async_trait;

/// Read and write named secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Latest value of a secret
    async fn get(&self, name: &str) -> Result<String>;

    /// Store a new value, superseding the previous one
    async fn set(&self, name: &str, value: &str) -> Result<()>;
}

#[cfg(test)]
mod tests;
