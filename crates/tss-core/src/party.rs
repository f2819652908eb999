//! Share-holding signing party
//!
//! A [`Party`] is the exclusive owner of one secret share. Nothing it exposes
//! (methods, `Debug` output, errors) carries share or nonce bytes; the
//! coordinator only ever sees commitments, public nonce points, and partial
//! signature scalars.

use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::curve::{hash_to_scalar, sha256, Point, Scalar, SecretScalar};
use crate::error::{Error, Result};
use crate::types::PartyId;

/// Per-session ephemeral state, wiped when the session ends
#[derive(Zeroize, ZeroizeOnDrop)]
struct Ephemeral {
    /// Deterministic nonce k
    k: SecretScalar,
    /// SHA-256 of this party's public nonce point, held for the decommit
    /// cross-check
    commitment: [u8; 32],
}

/// One party's contribution to a signature
#[derive(Debug, Clone, Copy)]
pub struct PartialSignature {
    pub party_id: PartyId,
    /// s_i = k_i + e * x_i mod n
    pub s: Scalar,
    /// x-coordinate of the aggregated nonce point, reduced mod n
    pub r_x: Scalar,
}

/// Stateful holder of one secret share
pub struct Party {
    party_id: PartyId,
    share: SecretScalar,
    ephemeral: Option<Ephemeral>,
}

impl Party {
    /// Party ids are polynomial x-coordinates, so zero is rejected.
    pub fn new(party_id: PartyId, share: SecretScalar) -> Result<Self> {
        if party_id == 0 {
            return Err(Error::InvalidInput("party id 0 is reserved".into()));
        }
        Ok(Self {
            party_id,
            share,
            ephemeral: None,
        })
    }

    pub fn id(&self) -> PartyId {
        self.party_id
    }

    /// Whether a signing session left ephemeral state behind
    pub fn has_active_session(&self) -> bool {
        self.ephemeral.is_some()
    }

    /// Round 1: derive the session nonce and commit to its public point.
    ///
    /// The nonce is `sha256(share || message) mod n` (1 substituted for the
    /// astronomically unlikely zero), so retrying the same message cannot
    /// produce two different nonces for one share. Returns the commitment
    /// hash and the public nonce point `R_i = k_i * G`.
    pub fn round1_commit(&mut self, message: &[u8]) -> Result<([u8; 32], Point)> {
        let digest = {
            let mut preimage = Zeroizing::new(Vec::with_capacity(32 + message.len()));
            preimage.extend_from_slice(self.share.to_bytes().as_ref());
            preimage.extend_from_slice(message);
            Zeroizing::new(sha256(&preimage))
        };

        let mut k = Scalar::reduce_bytes(&digest);
        if k.is_zero() {
            k = Scalar::ONE;
        }
        let k = SecretScalar::new(k)?;

        let public_nonce = k.public_point();
        let commitment = sha256(&public_nonce.encode(true));
        self.ephemeral = Some(Ephemeral { k, commitment });

        trace!(party_id = self.party_id, "round 1 commitment produced");
        Ok((commitment, public_nonce))
    }

    /// Round 2: check a public nonce encoding against the stored commitment
    pub fn verify_commitment(&self, public_nonce: &[u8]) -> Result<bool> {
        let ephemeral = self.ephemeral.as_ref().ok_or_else(|| {
            Error::Crypto("commitment check requested outside a signing session".into())
        })?;
        Ok(sha256(public_nonce) == ephemeral.commitment)
    }

    /// Round 3: produce this party's partial signature under the aggregated
    /// nonce point. Fails unless [`Party::round1_commit`] ran this session.
    pub fn round3_partial_sign(
        &self,
        message: &[u8],
        aggregated_nonce: &Point,
    ) -> Result<PartialSignature> {
        let ephemeral = self
            .ephemeral
            .as_ref()
            .ok_or_else(|| Error::Crypto("partial signature requested before round 1".into()))?;

        let e = hash_to_scalar(message);
        let s = ephemeral.k.expose() + e * self.share.expose();
        let r_x = aggregated_nonce.x_scalar()?;

        trace!(party_id = self.party_id, "partial signature produced");
        Ok(PartialSignature {
            party_id: self.party_id,
            s,
            r_x,
        })
    }

    /// Wipe ephemeral session state. Safe to call on any exit path,
    /// including sessions that never reached round 1.
    pub fn clear_session(&mut self) {
        // Option::take drops the block, which zeroizes both fields.
        drop(self.ephemeral.take());
    }
}

impl std::fmt::Debug for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Party")
            .field("party_id", &self.party_id)
            .field("share", &"[redacted]")
            .field("active_session", &self.has_active_session())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn test_party(party_id: PartyId) -> Party {
        Party::new(party_id, SecretScalar::random(&mut OsRng)).unwrap()
    }

    #[test]
    fn party_id_zero_is_rejected() {
        let share = SecretScalar::random(&mut OsRng);
        assert!(matches!(Party::new(0, share), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn commitment_matches_public_nonce() {
        let mut party = test_party(1);
        let (commitment, public_nonce) = party.round1_commit(b"order-1").unwrap();

        assert!(party.verify_commitment(&public_nonce.encode(true)).unwrap());
        assert_eq!(commitment, sha256(&public_nonce.encode(true)));

        let other = Point::GENERATOR.encode(true);
        assert!(!party.verify_commitment(&other).unwrap());
    }

    #[test]
    fn nonce_is_deterministic_per_share_and_message() {
        let share = SecretScalar::random(&mut OsRng);
        let clone = SecretScalar::from_hex(&share.to_hex()).unwrap();
        let mut a = Party::new(1, share).unwrap();
        let mut b = Party::new(1, clone).unwrap();

        let (_, nonce_a) = a.round1_commit(b"same message").unwrap();
        let (_, nonce_b) = b.round1_commit(b"same message").unwrap();
        assert_eq!(nonce_a, nonce_b);

        let (_, nonce_c) = b.round1_commit(b"different message").unwrap();
        assert_ne!(nonce_a, nonce_c);
    }

    #[test]
    fn partial_sign_requires_round_one() {
        let party = test_party(1);
        let result = party.round3_partial_sign(b"msg", &Point::GENERATOR);
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn partial_signature_satisfies_its_own_equation() {
        let mut party = test_party(3);
        let message = b"order-7";
        let (_, public_nonce) = party.round1_commit(message).unwrap();
        let partial = party.round3_partial_sign(message, &public_nonce).unwrap();

        // s_i * G == R_i + e * X_i
        let e = hash_to_scalar(message);
        let expected = public_nonce + party.share.public_point() * e;
        assert_eq!(Point::mul_generator(&partial.s), expected);
        assert_eq!(partial.party_id, 3);
    }

    #[test]
    fn clear_session_wipes_ephemeral_state() {
        let mut party = test_party(2);
        party.round1_commit(b"msg").unwrap();
        assert!(party.has_active_session());

        party.clear_session();
        assert!(!party.has_active_session());
        assert!(party.verify_commitment(b"anything").is_err());
        assert!(party
            .round3_partial_sign(b"msg", &Point::GENERATOR)
            .is_err());

        // idempotent on an already-clean party
        party.clear_session();
        assert!(!party.has_active_session());
    }
}
