//! Threshold signing coordinator
//!
//! The [`Coordinator`] owns the wallet registry and drives the two protocols:
//! distributed key generation and the four-round signing session. It holds
//! [`Party`] handles but has no way to read share bytes; everything it
//! aggregates is public (commitments, nonce points) or a partial signature
//! scalar that never leaves this module.
//!
//! Sessions for one wallet serialize on the registry entry's exclusive guard;
//! sessions for distinct wallets are independent.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::curve::{hash_to_scalar, verify_ecdsa, Point, Scalar, SecretScalar};
use crate::error::{Error, Result};
use crate::party::{PartialSignature, Party};
use crate::store::{tss_share_key, ShareStore};
use crate::types::{DkgOutcome, PartyId, ThresholdSignature};
use crate::vss;

/// Signing session phases; transitions are forward-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SessionState {
    Init,
    Round1,
    Round2,
    Round3,
    Round4,
    Done,
    Aborted,
}

struct SigningSession {
    id: Uuid,
    state: SessionState,
}

impl SigningSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Init,
        }
    }

    fn advance(&mut self, next: SessionState) -> Result<()> {
        if self.state == SessionState::Aborted || next <= self.state {
            return Err(Error::Internal(format!(
                "illegal session transition {:?} -> {next:?}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }

    fn abort(&mut self) {
        self.state = SessionState::Aborted;
    }
}

/// Registry entry for a threshold wallet
pub(crate) struct ThresholdWallet {
    pub(crate) master_public_key: Point,
    pub(crate) commitments: Vec<Point>,
    pub(crate) share_ids: Vec<PartyId>,
    /// Empty until [`Coordinator::initialize_parties`] runs
    pub(crate) parties: Vec<Party>,
}

/// Orchestrates DKG and threshold signing over a share store
pub struct Coordinator {
    store: Arc<dyn ShareStore>,
    wallets: DashMap<String, ThresholdWallet>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn ShareStore>) -> Self {
        Self {
            store,
            wallets: DashMap::new(),
        }
    }

    /// Run distributed key generation for a new wallet.
    ///
    /// Shares are generated, verified against the commitment vector, and
    /// persisted with create-if-absent puts, in that order; nothing is
    /// written unless the whole share set verified. A put hitting an
    /// existing key surfaces as [`Error::Conflict`] and the caller retries
    /// under a fresh wallet id. An I/O failure after a partial write leaves
    /// the id unusable; there is deliberately no rollback because the store
    /// interface has no delete.
    #[instrument(skip(self))]
    pub async fn perform_dkg(
        &self,
        wallet_id: &str,
        threshold: usize,
        n_parties: usize,
    ) -> Result<DkgOutcome> {
        if self.wallets.contains_key(wallet_id) {
            return Err(Error::Conflict(format!(
                "wallet already exists: {wallet_id}"
            )));
        }

        let (commitments, shares) =
            vss::generate_shares(threshold, n_parties, &mut rand::rngs::OsRng)?;

        for (party_id, share) in &shares {
            if !vss::verify_share(*party_id, share, &commitments) {
                return Err(Error::Crypto(format!(
                    "share for party {party_id} failed commitment verification"
                )));
            }
        }

        let mut share_ids = Vec::with_capacity(shares.len());
        for (party_id, share) in &shares {
            self.store
                .put(&tss_share_key(wallet_id, *party_id), &share.to_hex())
                .await?;
            share_ids.push(*party_id);
        }

        let master_public_key = commitments[0];
        self.wallets.insert(
            wallet_id.to_string(),
            ThresholdWallet {
                master_public_key,
                commitments,
                share_ids: share_ids.clone(),
                parties: Vec::new(),
            },
        );

        info!(
            wallet_id,
            threshold,
            n_parties,
            public_key = hex::encode(master_public_key.encode(true)),
            "distributed key generation completed"
        );

        Ok(DkgOutcome {
            public_key: master_public_key.encode(true),
            share_ids,
            threshold,
        })
    }

    /// Load every share from the store, re-verify it against the wallet's
    /// commitments, and construct the party set. Requires a completed DKG
    /// for this wallet id in this process.
    #[instrument(skip(self))]
    pub async fn initialize_parties(&self, wallet_id: &str, n_parties: usize) -> Result<()> {
        let (commitments, share_ids) = {
            let wallet = self
                .wallets
                .get(wallet_id)
                .ok_or_else(|| Error::NotFound(format!("unknown wallet: {wallet_id}")))?;
            if wallet.share_ids.len() != n_parties {
                return Err(Error::InvalidInput(format!(
                    "wallet {wallet_id} was generated with {} parties, not {n_parties}",
                    wallet.share_ids.len()
                )));
            }
            (wallet.commitments.clone(), wallet.share_ids.clone())
        };

        let mut parties = Vec::with_capacity(share_ids.len());
        for party_id in share_ids {
            let stored = self.store.get(&tss_share_key(wallet_id, party_id)).await?;
            let share = SecretScalar::from_hex(&stored)?;
            if !vss::verify_share(party_id, &share, &commitments) {
                return Err(Error::Crypto(format!(
                    "stored share for party {party_id} does not match the wallet commitments"
                )));
            }
            parties.push(Party::new(party_id, share)?);
        }

        let mut wallet = self
            .wallets
            .get_mut(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("unknown wallet: {wallet_id}")))?;
        wallet.parties = parties;

        debug!(wallet_id, "parties initialized from store");
        Ok(())
    }

    /// Run a four-round signing session over a quorum of initialized parties.
    ///
    /// Ephemeral party state is wiped on every exit path, success and abort
    /// alike. The returned signature carries the outcome of an attempted
    /// standard ECDSA verification against the master public key; the
    /// aggregate equation itself (`s*G = R + e*P_Q` over the quorum's
    /// Feldman-derived public shares) must hold or the session aborts.
    #[instrument(skip(self, message))]
    pub fn sign(
        &self,
        wallet_id: &str,
        message: &[u8],
        signing_party_ids: &[PartyId],
    ) -> Result<ThresholdSignature> {
        let mut entry = self
            .wallets
            .get_mut(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("unknown wallet: {wallet_id}")))?;
        let wallet = entry.value_mut();

        if wallet.parties.is_empty() {
            return Err(Error::InvalidInput(format!(
                "parties are not initialized for wallet {wallet_id}"
            )));
        }

        let threshold = wallet.commitments.len();
        if signing_party_ids.len() < threshold {
            return Err(Error::ThresholdNotMet {
                required: threshold,
                actual: signing_party_ids.len(),
            });
        }

        let mut indices = Vec::with_capacity(signing_party_ids.len());
        for party_id in signing_party_ids {
            let index = wallet
                .parties
                .iter()
                .position(|p| p.id() == *party_id)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("party {party_id} does not hold a share"))
                })?;
            if indices.contains(&index) {
                return Err(Error::InvalidInput(format!(
                    "party {party_id} listed more than once"
                )));
            }
            indices.push(index);
        }

        let commitments = wallet.commitments.clone();
        let master_public_key = wallet.master_public_key;
        let mut session = SigningSession::new();

        let result = run_rounds(
            &mut session,
            &mut wallet.parties,
            &indices,
            message,
            &commitments,
            &master_public_key,
        );

        // Wipe ephemeral state no matter how the rounds ended.
        for &index in &indices {
            wallet.parties[index].clear_session();
        }

        match result {
            Ok(signature) => {
                info!(
                    wallet_id,
                    session_id = %session.id,
                    ecdsa_valid = signature.ecdsa_valid,
                    "signing session completed"
                );
                Ok(signature)
            }
            Err(e) => {
                session.abort();
                warn!(wallet_id, session_id = %session.id, error = %e, "signing session aborted");
                Err(e)
            }
        }
    }

    /// Whether [`Coordinator::initialize_parties`] has run for this wallet
    pub fn parties_ready(&self, wallet_id: &str) -> Result<bool> {
        let wallet = self
            .wallets
            .get(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("unknown wallet: {wallet_id}")))?;
        Ok(!wallet.parties.is_empty())
    }

    /// Party ids holding shares of this wallet
    pub fn share_ids(&self, wallet_id: &str) -> Result<Vec<PartyId>> {
        let wallet = self
            .wallets
            .get(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("unknown wallet: {wallet_id}")))?;
        Ok(wallet.share_ids.clone())
    }

    /// Master public key, SEC1 compressed
    pub fn master_public_key(&self, wallet_id: &str) -> Result<Vec<u8>> {
        let wallet = self
            .wallets
            .get(wallet_id)
            .ok_or_else(|| Error::NotFound(format!("unknown wallet: {wallet_id}")))?;
        Ok(wallet.master_public_key.encode(true))
    }
}

fn run_rounds(
    session: &mut SigningSession,
    parties: &mut [Party],
    indices: &[usize],
    message: &[u8],
    commitments: &[Point],
    master_public_key: &Point,
) -> Result<ThresholdSignature> {
    // Round 1: every party commits to its nonce and broadcasts the public
    // nonce point.
    session.advance(SessionState::Round1)?;
    let mut public_nonces = Vec::with_capacity(indices.len());
    for &index in indices {
        let (_, public_nonce) = parties[index].round1_commit(message)?;
        public_nonces.push((index, public_nonce));
    }

    // Round 2: decommit check, then aggregate R by point addition.
    session.advance(SessionState::Round2)?;
    let mut aggregated_nonce = Point::IDENTITY;
    for (index, public_nonce) in &public_nonces {
        if !parties[*index].verify_commitment(&public_nonce.encode(true))? {
            return Err(Error::Crypto(format!(
                "party {} decommitment does not match its round 1 commitment",
                parties[*index].id()
            )));
        }
        aggregated_nonce = aggregated_nonce + *public_nonce;
    }
    if aggregated_nonce.is_identity() {
        return Err(Error::Crypto("aggregated nonce is the identity".into()));
    }
    let r_x = aggregated_nonce.x_scalar()?;
    if r_x.is_zero() {
        return Err(Error::Crypto("aggregated nonce has x = 0".into()));
    }

    // Round 3: collect partial signatures under the shared aggregated nonce.
    session.advance(SessionState::Round3)?;
    let mut partials: Vec<PartialSignature> = Vec::with_capacity(indices.len());
    for &index in indices {
        let partial = parties[index].round3_partial_sign(message, &aggregated_nonce)?;
        if partial.r_x != r_x {
            return Err(Error::Internal(
                "parties disagree on the aggregated nonce x-coordinate".into(),
            ));
        }
        partials.push(partial);
    }

    // Round 4: aggregate and verify.
    session.advance(SessionState::Round4)?;
    let s = partials
        .iter()
        .fold(Scalar::ZERO, |acc, partial| acc + partial.s);
    if s.is_zero() {
        return Err(Error::Crypto("aggregated signature scalar is zero".into()));
    }

    // The combine is linear, so the signature must satisfy
    // s*G = R + e * sum(public shares of the quorum).
    let e = hash_to_scalar(message);
    let quorum_key = indices
        .iter()
        .fold(Point::IDENTITY, |acc, &index| {
            acc + vss::public_share(parties[index].id(), commitments)
        });
    if Point::mul_generator(&s) != aggregated_nonce + quorum_key * e {
        return Err(Error::Crypto(
            "aggregated signature failed verification against the quorum key".into(),
        ));
    }

    // Attempted standard ECDSA verification against the master public key.
    // The additive combine is Schnorr-style, so this is expected to miss;
    // the outcome is surfaced on the signature rather than hidden.
    let prehash = crate::curve::sha256(message);
    let ecdsa_valid = verify_ecdsa(master_public_key, &prehash, &r_x, &s);
    if !ecdsa_valid {
        warn!(
            session_id = %session.id,
            "signature does not verify as standard ECDSA against the master key"
        );
    }

    session.advance(SessionState::Done)?;
    Ok(ThresholdSignature {
        r: r_x.to_bytes(),
        s: s.to_bytes(),
        ecdsa_valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::sha256;
    use crate::store::{MemoryShareStore, ShareStore};

    fn coordinator_with_store() -> (Coordinator, Arc<MemoryShareStore>) {
        let store = Arc::new(MemoryShareStore::new());
        (Coordinator::new(store.clone()), store)
    }

    #[tokio::test]
    async fn dkg_produces_verifiable_shares_and_a_valid_public_key() {
        let (coordinator, store) = coordinator_with_store();
        let outcome = coordinator.perform_dkg("w2", 2, 3).await.unwrap();

        assert_eq!(outcome.share_ids, vec![1, 2, 3]);
        assert_eq!(outcome.public_key.len(), 33);
        assert!(matches!(outcome.public_key[0], 0x02 | 0x03));
        assert!(outcome.public_key_hex().starts_with("0x0"));

        let wallet = coordinator.wallets.get("w2").unwrap();
        for party_id in 1..=3 {
            let stored = store.get(&tss_share_key("w2", party_id)).await.unwrap();
            let share = SecretScalar::from_hex(&stored).unwrap();
            assert!(vss::verify_share(party_id, &share, &wallet.commitments));
        }
    }

    #[tokio::test]
    async fn dkg_with_a_used_wallet_id_is_a_conflict() {
        let (coordinator, store) = coordinator_with_store();
        coordinator.perform_dkg("w2", 2, 3).await.unwrap();
        let before = store.get(&tss_share_key("w2", 1)).await.unwrap();

        let err = coordinator.perform_dkg("w2", 2, 3).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // a fresh coordinator over the same store hits the create-if-absent put
        let other = Coordinator::new(store.clone());
        let err = other.perform_dkg("w2", 2, 3).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // the original shares were not rewritten
        assert_eq!(store.get(&tss_share_key("w2", 1)).await.unwrap(), before);
    }

    #[tokio::test]
    async fn signing_session_produces_a_verifiable_aggregate() {
        let (coordinator, _) = coordinator_with_store();
        coordinator.perform_dkg("w2", 2, 3).await.unwrap();
        coordinator.initialize_parties("w2", 3).await.unwrap();

        let message = sha256(b"order-1");
        let signature = coordinator.sign("w2", &message, &[1, 2]).unwrap();

        assert_ne!(signature.r, [0u8; 32]);
        assert_ne!(signature.s, [0u8; 32]);
        // the additive combine is not expected to satisfy ECDSA
        assert!(!signature.ecdsa_valid);

        // ephemeral state is wiped after the session
        let wallet = coordinator.wallets.get("w2").unwrap();
        for party in &wallet.parties {
            assert!(!party.has_active_session());
        }
    }

    #[tokio::test]
    async fn full_quorum_also_signs() {
        let (coordinator, _) = coordinator_with_store();
        coordinator.perform_dkg("w3", 3, 4).await.unwrap();
        coordinator.initialize_parties("w3", 4).await.unwrap();
        let signature = coordinator
            .sign("w3", &sha256(b"order-9"), &[1, 2, 3, 4])
            .unwrap();
        assert_ne!(signature.s, [0u8; 32]);
    }

    #[tokio::test]
    async fn insufficient_quorum_is_rejected() {
        let (coordinator, _) = coordinator_with_store();
        coordinator.perform_dkg("w2", 2, 3).await.unwrap();
        coordinator.initialize_parties("w2", 3).await.unwrap();

        let err = coordinator.sign("w2", b"msg", &[1]).unwrap_err();
        assert!(matches!(
            err,
            Error::ThresholdNotMet {
                required: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn duplicate_and_unknown_signers_are_rejected() {
        let (coordinator, _) = coordinator_with_store();
        coordinator.perform_dkg("w2", 2, 3).await.unwrap();
        coordinator.initialize_parties("w2", 3).await.unwrap();

        assert!(matches!(
            coordinator.sign("w2", b"msg", &[1, 1]).unwrap_err(),
            Error::InvalidInput(_)
        ));
        assert!(matches!(
            coordinator.sign("w2", b"msg", &[1, 9]).unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn signing_before_initialization_is_rejected() {
        let (coordinator, _) = coordinator_with_store();
        coordinator.perform_dkg("w2", 2, 3).await.unwrap();

        let err = coordinator.sign("w2", b"msg", &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!coordinator.parties_ready("w2").unwrap());
    }

    #[tokio::test]
    async fn unknown_wallet_is_not_found() {
        let (coordinator, _) = coordinator_with_store();
        assert!(matches!(
            coordinator.sign("nope", b"msg", &[1, 2]).unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            coordinator.initialize_parties("nope", 3).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            coordinator.master_public_key("nope").unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn tampered_stored_share_aborts_initialization() {
        let (coordinator, store) = coordinator_with_store();
        coordinator.perform_dkg("w2", 2, 3).await.unwrap();

        // overwrite one stored share with a different valid scalar
        let tampered = SecretScalar::random(&mut rand::rngs::OsRng);
        store.overwrite(&tss_share_key("w2", 2), &tampered.to_hex());

        let err = coordinator.initialize_parties("w2", 3).await.unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[tokio::test]
    async fn wallet_mismatched_party_count_is_rejected() {
        let (coordinator, _) = coordinator_with_store();
        coordinator.perform_dkg("w2", 2, 3).await.unwrap();
        let err = coordinator.initialize_parties("w2", 5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
