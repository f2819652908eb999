//! Share store interface
//!
//! Shares and wallet secrets persist in an external encrypted key-value
//! store; encryption at rest and authentication are the store's concern.
//! The interface is deliberately narrow: `put` is create-if-absent so a
//! retried key generation can never silently rewrite a share, and there is
//! no delete or overwrite at all.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::PartyId;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    /// The name is already taken; existing values are never overwritten
    #[error("secret already exists: {0}")]
    AlreadyExists(String),

    /// No secret under this name
    #[error("secret not found: {0}")]
    NotFound(String),

    /// The store is unreachable or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent map from secret names to opaque string values
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Create a secret. Fails with [`StoreError::AlreadyExists`] if the name
    /// is taken.
    async fn put(&self, name: &str, value: &str) -> Result<()>;

    /// Fetch a secret by exact name.
    async fn get(&self, name: &str) -> Result<String>;
}

/// Store name of a threshold share (value: 64-char lowercase hex scalar)
pub fn tss_share_key(wallet_id: &str, party_id: PartyId) -> String {
    format!("hyperliquid/tss-shares/{wallet_id}/share-{party_id}")
}

/// Store name of a single-mode wallet secret (value: base64 keypair bytes)
pub fn wallet_secret_key(wallet_id: &str) -> String {
    format!("hyperliquid/mpc-wallets/{wallet_id}")
}

mod memory;

pub use memory::MemoryShareStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_the_store_convention() {
        assert_eq!(
            tss_share_key("w1", 2),
            "hyperliquid/tss-shares/w1/share-2"
        );
        assert_eq!(wallet_secret_key("w1"), "hyperliquid/mpc-wallets/w1");
    }
}
