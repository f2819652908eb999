//! Baseline single-key Ed25519 signer
//!
//! The simple operational mode: one Ed25519 keypair per wallet, stored
//! opaquely in the share store under its own namespace. The secret is
//! fetched, used, and wiped on every call; nothing holds key material
//! between requests.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use tracing::{info, instrument};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::store::{wallet_secret_key, ShareStore};

/// Per-wallet Ed25519 signer over the share store
pub struct Ed25519Signer {
    store: Arc<dyn ShareStore>,
}

impl Ed25519Signer {
    pub fn new(store: Arc<dyn ShareStore>) -> Self {
        Self { store }
    }

    /// Generate a keypair for a new wallet and return the 32-byte public key.
    /// A wallet id that already holds a secret is a conflict.
    #[instrument(skip(self))]
    pub async fn generate(&self, wallet_id: &str) -> Result<[u8; 32]> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let keypair = Zeroizing::new(signing_key.to_keypair_bytes());
        let encoded = Zeroizing::new(STANDARD.encode(keypair.as_slice()));

        self.store
            .put(&wallet_secret_key(wallet_id), &encoded)
            .await?;

        let public_key = signing_key.verifying_key().to_bytes();
        info!(
            wallet_id,
            public_key = hex::encode(public_key),
            "ed25519 wallet generated"
        );
        Ok(public_key)
    }

    /// Sign raw message bytes; returns the 64-byte signature.
    #[instrument(skip(self, message))]
    pub async fn sign(&self, wallet_id: &str, message: &[u8]) -> Result<[u8; 64]> {
        let signing_key = self.load(wallet_id).await?;
        Ok(signing_key.sign(message).to_bytes())
    }

    /// Sign a JSON payload.
    ///
    /// The signed bytes are the UTF-8 serialization of the payload with
    /// object keys in the order they arrived, so a downstream verifier that
    /// re-serializes the same document checks the same bytes.
    pub async fn sign_payload(&self, wallet_id: &str, payload: &serde_json::Value) -> Result<[u8; 64]> {
        let bytes = serde_json::to_vec(payload)?;
        self.sign(wallet_id, &bytes).await
    }

    /// The wallet's 32-byte public key.
    pub async fn public_key(&self, wallet_id: &str) -> Result<[u8; 32]> {
        let signing_key = self.load(wallet_id).await?;
        Ok(signing_key.verifying_key().to_bytes())
    }

    /// Fetch and decode the stored keypair. The decoded buffers are wiped on
    /// drop, and `SigningKey` zeroizes itself.
    async fn load(&self, wallet_id: &str) -> Result<SigningKey> {
        let stored = self.store.get(&wallet_secret_key(wallet_id)).await?;

        let decoded = Zeroizing::new(
            STANDARD
                .decode(&stored)
                .map_err(|_| Error::Crypto("stored wallet secret is not valid base64".into()))?,
        );
        if decoded.len() != 64 {
            return Err(Error::Crypto(
                "stored wallet secret has the wrong length".into(),
            ));
        }

        let mut keypair = Zeroizing::new([0u8; 64]);
        keypair.copy_from_slice(&decoded);
        SigningKey::from_keypair_bytes(&keypair)
            .map_err(|_| Error::Crypto("stored wallet secret is not a valid keypair".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryShareStore;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn signer() -> Ed25519Signer {
        Ed25519Signer::new(Arc::new(MemoryShareStore::new()))
    }

    #[tokio::test]
    async fn generate_and_sign_round_trips() {
        let signer = signer();
        let public_key = signer.generate("w1").await.unwrap();

        let signature = signer.sign("w1", b"hello").await.unwrap();
        assert_eq!(signature.len(), 64);

        let verifying_key = VerifyingKey::from_bytes(&public_key).unwrap();
        verifying_key
            .verify(b"hello", &Signature::from_bytes(&signature))
            .unwrap();

        // a different message must not verify under the same signature
        assert!(verifying_key
            .verify(b"goodbye", &Signature::from_bytes(&signature))
            .is_err());
    }

    #[tokio::test]
    async fn regenerating_a_wallet_is_a_conflict() {
        let signer = signer();
        signer.generate("w1").await.unwrap();
        let err = signer.generate("w1").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_wallet_is_not_found() {
        let signer = signer();
        assert!(matches!(
            signer.sign("nope", b"hello").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            signer.public_key("nope").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn payload_signature_covers_the_serialized_json() {
        let signer = signer();
        let public_key = signer.generate("w1").await.unwrap();

        let payload = serde_json::json!({"coin": "ETH", "is_buy": true, "sz": 1.5});
        let signature = signer.sign_payload("w1", &payload).await.unwrap();

        let bytes = serde_json::to_vec(&payload).unwrap();
        let verifying_key = VerifyingKey::from_bytes(&public_key).unwrap();
        verifying_key
            .verify(&bytes, &Signature::from_bytes(&signature))
            .unwrap();
    }

    #[tokio::test]
    async fn stored_public_key_matches_generated_one() {
        let signer = signer();
        let generated = signer.generate("w1").await.unwrap();
        let loaded = signer.public_key("w1").await.unwrap();
        assert_eq!(generated, loaded);
    }
}
