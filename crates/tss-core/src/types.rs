//! Shared types for the threshold signing core

use serde::{Deserialize, Serialize};

/// Identifier of a share-holding party.
///
/// Party ids are the x-coordinates at which the DKG polynomial is evaluated,
/// so they are 1-based and zero is rejected everywhere one is accepted.
pub type PartyId = u32;

/// Aggregated threshold signature (rX, s)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSignature {
    /// x-coordinate of the aggregated nonce point, reduced mod n
    pub r: [u8; 32],
    /// Aggregated signature scalar
    pub s: [u8; 32],
    /// Whether the pair also passed standard ECDSA verification against the
    /// master public key. The aggregate combine is Schnorr-style, so this is
    /// surfaced rather than assumed.
    pub ecdsa_valid: bool,
}

impl ThresholdSignature {
    /// Convert to bytes (r || s)
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Wire encoding: `0x` followed by r and s as big-endian hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Outcome of a completed distributed key generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgOutcome {
    /// Master public key, SEC1 compressed (33 bytes)
    pub public_key: Vec<u8>,
    /// Ids of the parties that received a share
    pub share_ids: Vec<PartyId>,
    /// Signing threshold the wallet was generated with
    pub threshold: usize,
}

impl DkgOutcome {
    /// Wire encoding of the master public key: `0x`-prefixed compressed hex
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_bytes_concatenate_r_then_s() {
        let sig = ThresholdSignature {
            r: [0x11; 32],
            s: [0x22; 32],
            ecdsa_valid: false,
        };
        let bytes = sig.to_bytes();
        assert_eq!(&bytes[..32], &[0x11; 32]);
        assert_eq!(&bytes[32..], &[0x22; 32]);
        assert!(sig.to_hex().starts_with("0x1111"));
        assert_eq!(sig.to_hex().len(), 2 + 128);
    }
}
