//! Feldman verifiable secret sharing
//!
//! Key generation draws a random polynomial `f(x) = a_0 + a_1 x + ... +
//! a_{t-1} x^{t-1}` over the secp256k1 scalar field, publishes coefficient
//! commitments `C_i = a_i * G`, and hands party `p` the evaluation `f(p)`.
//! Any holder can then check its share against the commitments without
//! learning anything about the other shares. The constant term `a_0` is the
//! master secret; it exists only inside [`generate_shares`] and is wiped
//! before the function returns.

use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::curve::{Point, Scalar, SecretScalar};
use crate::error::{Error, Result};
use crate::types::PartyId;

/// Generate a fresh commitment vector and one share per party.
///
/// `threshold` is the minimum quorum size t; `n_parties` shares are produced
/// for party ids `1..=n_parties`. Every returned share has been checked
/// against the commitments; a verification miss aborts the whole operation.
pub fn generate_shares<R: RngCore + CryptoRng>(
    threshold: usize,
    n_parties: usize,
    rng: &mut R,
) -> Result<(Vec<Point>, Vec<(PartyId, SecretScalar)>)> {
    if threshold < 2 {
        return Err(Error::InvalidInput("threshold must be at least 2".into()));
    }
    if threshold > n_parties {
        return Err(Error::InvalidInput(
            "threshold cannot exceed the number of parties".into(),
        ));
    }

    let coefficients: Vec<SecretScalar> = (0..threshold)
        .map(|_| SecretScalar::random(&mut *rng))
        .collect();
    let commitments: Vec<Point> = coefficients.iter().map(|c| c.public_point()).collect();

    let mut shares = Vec::with_capacity(n_parties);
    for party_id in 1..=n_parties as PartyId {
        let share = SecretScalar::new(evaluate(&coefficients, party_id))?;
        shares.push((party_id, share));
    }

    // The coefficient array, a_0 included, must not outlive share generation.
    drop(coefficients);

    for (party_id, share) in &shares {
        if !verify_share(*party_id, share, &commitments) {
            return Err(Error::Crypto(format!(
                "freshly generated share for party {party_id} failed verification"
            )));
        }
    }

    debug!(threshold, n_parties, "generated and verified share set");
    Ok((commitments, shares))
}

/// Check `share * G == sum_j C_j * p^j` for party id `p`
pub fn verify_share(party_id: PartyId, share: &SecretScalar, commitments: &[Point]) -> bool {
    if party_id == 0 || commitments.is_empty() {
        return false;
    }
    share.public_point() == public_share(party_id, commitments)
}

/// The public counterpart of party `p`'s share, derived from the commitment
/// vector alone: `sum_j C_j * p^j`
pub fn public_share(party_id: PartyId, commitments: &[Point]) -> Point {
    let x = Scalar::from_u64(party_id as u64);
    commitments
        .iter()
        .enumerate()
        .fold(Point::IDENTITY, |acc, (j, commitment)| {
            acc + *commitment * x.pow(j as u32)
        })
}

/// Evaluate the polynomial at `x` in plain power form; degrees here are
/// bounded by the threshold, so there is no need for Horner's rule.
fn evaluate(coefficients: &[SecretScalar], x: PartyId) -> Scalar {
    let x_scalar = Scalar::from_u64(x as u64);
    let mut result = Scalar::ZERO;
    let mut x_power = Scalar::ONE;

    for coefficient in coefficients {
        result = result + coefficient.expose() * x_power;
        x_power = x_power * x_scalar;
    }

    result
}
