//! # TSS Core
//!
//! Core cryptographic primitives for the threshold signing service.
//!
//! This crate provides the building blocks for:
//! - Distributed Key Generation (DKG) via Feldman verifiable secret sharing
//! - Four-round threshold signing over secp256k1
//! - A baseline single-key Ed25519 signer
//! - Persistence of shares to an external encrypted key-value store
//!
//! ## Protocol Overview
//!
//! Key generation draws a random degree-(t-1) polynomial over the secp256k1
//! scalar field, commits to its coefficients (`C_i = a_i * G`), and hands each
//! party one evaluation of the polynomial. The constant-term commitment `C_0`
//! is the master public key; the constant term itself is wiped immediately and
//! never reconstructed anywhere.
//!
//! Signing runs four coordinator-driven rounds: nonce commitment, decommit and
//! nonce aggregation, partial signatures, aggregation and verification. Every
//! party only ever touches its own share and its own ephemeral nonce, and both
//! are zeroized when a session ends, whichever way it ends.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_core::{Coordinator, store::MemoryShareStore};
//!
//! let coordinator = Coordinator::new(Arc::new(MemoryShareStore::new()));
//! let wallet = coordinator.perform_dkg("w1", 2, 3).await?;
//! coordinator.initialize_parties("w1", 3).await?;
//! let signature = coordinator.sign("w1", b"order-1", &[1, 2])?;
//! ```

pub mod coordinator;
pub mod curve;
pub mod ed25519;
pub mod error;
pub mod party;
pub mod store;
pub mod types;
pub mod vss;

pub use coordinator::Coordinator;
pub use ed25519::Ed25519Signer;
pub use error::{Error, Result};
pub use types::{DkgOutcome, PartyId, ThresholdSignature};

/// Crate version, surfaced by the service status endpoints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of share-holding parties.
pub const DEFAULT_NODES: usize = 3;

/// Default signing threshold for the default 3-party setup.
pub const DEFAULT_THRESHOLD: usize = 2;
