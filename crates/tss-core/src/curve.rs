//! secp256k1 scalar and point arithmetic
//!
//! Thin nominal wrappers over `k256` so the rest of the crate works with
//! exactly two curve types and a narrow operations surface. Hex and byte
//! decoding is canonical: scalars at or above the group order and off-curve
//! or identity point encodings are rejected at the boundary.

use k256::{
    elliptic_curve::{
        bigint::U256,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Field, Group, PrimeField,
    },
    AffinePoint, EncodedPoint, ProjectivePoint,
};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};

/// A scalar in [0, n) where n is the secp256k1 group order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scalar(k256::Scalar);

impl Scalar {
    pub const ZERO: Self = Self(k256::Scalar::ZERO);
    pub const ONE: Self = Self(k256::Scalar::ONE);

    /// Sample a uniformly random scalar
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(k256::Scalar::random(rng))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(k256::Scalar::from(value))
    }

    /// Interpret 32 big-endian bytes, reducing mod n
    pub fn reduce_bytes(bytes: &[u8; 32]) -> Self {
        Self(<k256::Scalar as Reduce<U256>>::reduce_bytes(&(*bytes).into()))
    }

    /// Interpret 32 big-endian bytes, rejecting values >= n
    pub fn from_canonical_bytes(bytes: &[u8; 32]) -> Result<Self> {
        Option::<k256::Scalar>::from(k256::Scalar::from_repr((*bytes).into()))
            .map(Self)
            .ok_or_else(|| Error::Crypto("scalar encoding is not canonical".into()))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero().into()
    }

    /// Raise to a small power by repeated multiplication.
    ///
    /// Exponents here are party-id powers bounded by the threshold, so there
    /// is nothing to gain from square-and-multiply.
    pub fn pow(&self, exp: u32) -> Self {
        let mut acc = k256::Scalar::ONE;
        for _ in 0..exp {
            acc *= self.0;
        }
        Self(acc)
    }
}

impl std::ops::Add for Scalar {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Mul for Scalar {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

/// A secret scalar that is wiped when dropped.
///
/// Construction rejects zero, so a value of this type is always usable as a
/// share or nonce. `k256::Scalar` has no `Zeroize` impl to lean on, so wiping
/// overwrites the inner value with zero directly.
pub struct SecretScalar(k256::Scalar);

impl SecretScalar {
    pub fn new(scalar: Scalar) -> Result<Self> {
        if scalar.is_zero() {
            return Err(Error::Crypto("zero is not a valid secret scalar".into()));
        }
        Ok(Self(scalar.0))
    }

    /// Sample a uniformly random non-zero scalar
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let candidate = k256::Scalar::random(&mut *rng);
            if !bool::from(candidate.is_zero()) {
                return Self(candidate);
            }
        }
    }

    /// The curve point corresponding to this secret
    pub fn public_point(&self) -> Point {
        Point(ProjectivePoint::GENERATOR * self.0)
    }

    pub(crate) fn expose(&self) -> Scalar {
        Scalar(self.0)
    }

    pub(crate) fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes().into())
    }

    /// 64-char lowercase big-endian hex, the share store value format
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.to_bytes().as_ref()))
    }

    /// Parse the share store value format, rejecting non-canonical or zero
    /// scalars
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(encoded, &mut bytes)
            .map_err(|_| Error::Crypto("secret scalar hex must be 64 hex chars".into()))?;
        let scalar = Scalar::from_canonical_bytes(&bytes);
        bytes.zeroize();
        Self::new(scalar?)
    }
}

impl Zeroize for SecretScalar {
    fn zeroize(&mut self) {
        self.0 = k256::Scalar::ZERO;
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretScalar([redacted])")
    }
}

/// A secp256k1 curve point, including the identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point(ProjectivePoint);

impl Point {
    pub const IDENTITY: Self = Self(ProjectivePoint::IDENTITY);
    pub const GENERATOR: Self = Self(ProjectivePoint::GENERATOR);

    pub fn mul_generator(scalar: &Scalar) -> Self {
        Self(ProjectivePoint::GENERATOR * scalar.0)
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_identity().into()
    }

    /// SEC1 encoding, 33 bytes compressed or 65 uncompressed
    pub fn encode(&self, compressed: bool) -> Vec<u8> {
        self.0.to_affine().to_encoded_point(compressed).as_bytes().to_vec()
    }

    /// Decode a SEC1 point, rejecting off-curve encodings and the identity
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let encoded = EncodedPoint::from_bytes(bytes)
            .map_err(|e| Error::Crypto(format!("malformed point encoding: {e}")))?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| Error::Crypto("point is not on the curve".into()))?;
        let point = Self(ProjectivePoint::from(affine));
        if point.is_identity() {
            return Err(Error::Crypto("point at infinity is not accepted here".into()));
        }
        Ok(point)
    }

    /// x-coordinate reduced into the scalar domain; fails on the identity
    pub fn x_scalar(&self) -> Result<Scalar> {
        if self.is_identity() {
            return Err(Error::Crypto("identity point has no x-coordinate".into()));
        }
        let encoded = self.0.to_affine().to_encoded_point(false);
        let x: [u8; 32] = encoded.as_bytes()[1..33]
            .try_into()
            .map_err(|_| Error::Internal("unexpected uncompressed point length".into()))?;
        Ok(Scalar::reduce_bytes(&x))
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Mul<Scalar> for Point {
    type Output = Self;

    fn mul(self, rhs: Scalar) -> Self {
        Self(self.0 * rhs.0)
    }
}

/// SHA-256 digest
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// The protocol challenge scalar: SHA-256 of the message reduced mod n
pub fn hash_to_scalar(message: &[u8]) -> Scalar {
    Scalar::reduce_bytes(&sha256(message))
}

/// Attempt standard ECDSA verification of (r, s) over a 32-byte prehash.
///
/// Returns false rather than erroring: callers only want to know whether the
/// pair happens to satisfy the ECDSA equation for this key.
pub fn verify_ecdsa(public_key: &Point, prehash: &[u8; 32], r: &Scalar, s: &Scalar) -> bool {
    use k256::ecdsa::signature::hazmat::PrehashVerifier;

    let Ok(signature) = k256::ecdsa::Signature::from_scalars(r.0.to_bytes(), s.0.to_bytes())
    else {
        return false;
    };
    let encoded = public_key.0.to_affine().to_encoded_point(false);
    let Ok(verifying_key) = k256::ecdsa::VerifyingKey::from_encoded_point(&encoded) else {
        return false;
    };
    verifying_key.verify_prehash(prehash, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn point_codec_round_trips() {
        let secret = SecretScalar::random(&mut OsRng);
        let point = secret.public_point();

        for compressed in [true, false] {
            let bytes = point.encode(compressed);
            assert_eq!(bytes.len(), if compressed { 33 } else { 65 });
            assert_eq!(Point::decode(&bytes).unwrap(), point);
        }
    }

    #[test]
    fn decode_rejects_garbage_and_identity() {
        assert!(Point::decode(&[0u8; 33]).is_err());
        assert!(Point::decode(&[]).is_err());
        // valid-looking prefix but x not on the curve
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&[0xff; 32]);
        assert!(Point::decode(&bytes).is_err());
        // the identity encodes as a single zero byte
        assert!(Point::decode(&Point::IDENTITY.encode(true)).is_err());
    }

    #[test]
    fn reduce_is_idempotent() {
        let raw = [0xffu8; 32];
        let once = Scalar::reduce_bytes(&raw);
        let twice = Scalar::reduce_bytes(&once.to_bytes());
        assert_eq!(once, twice);
    }

    #[test]
    fn canonical_decoding_rejects_group_order() {
        // n, the secp256k1 group order, is out of range
        let order =
            hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141")
                .unwrap();
        let bytes: [u8; 32] = order.try_into().unwrap();
        assert!(Scalar::from_canonical_bytes(&bytes).is_err());
        // n - 1 is fine
        let mut below = bytes;
        below[31] -= 1;
        assert!(Scalar::from_canonical_bytes(&below).is_ok());
    }

    #[test]
    fn secret_scalar_rejects_zero() {
        assert!(SecretScalar::new(Scalar::ZERO).is_err());
        assert!(SecretScalar::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn secret_scalar_hex_round_trips() {
        let secret = SecretScalar::random(&mut OsRng);
        let restored = SecretScalar::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(restored.public_point(), secret.public_point());
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        let x = Scalar::from_u64(7);
        assert_eq!(x.pow(0), Scalar::ONE);
        assert_eq!(x.pow(1), x);
        assert_eq!(x.pow(3), x * x * x);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let secret = SecretScalar::random(&mut OsRng);
        assert_eq!(format!("{secret:?}"), "SecretScalar([redacted])");
    }
}
