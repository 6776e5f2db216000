//! G1 / G2 point and GT element wire encoding.
//!
//! Sizes match the Neo N3 wire format: G1 is 48 bytes compressed / 96
//! uncompressed, G2 is 96 / 192, GT is 576 (the raw `Fp12` encoding of the
//! pairing target group).

use crate::error::{Bls12381Error, Bls12381Result};
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{G1Affine, G1Projective, G2Affine, Gt};
use group::{Curve, GroupEncoding, UncompressedEncoding};

pub const G1_COMPRESSED_SIZE: usize = 48;
pub const G1_UNCOMPRESSED_SIZE: usize = 96;
pub const G2_COMPRESSED_SIZE: usize = 96;
pub const G2_UNCOMPRESSED_SIZE: usize = 192;
pub const GT_SIZE: usize = 576;

/// A point on the G1 curve, the short-term (signature/public-key) group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G1Point(pub(crate) G1Affine);

impl G1Point {
    pub fn identity() -> Self {
        Self(G1Affine::identity())
    }

    pub fn generator() -> Self {
        Self(G1Affine::generator())
    }

    pub fn to_compressed(&self) -> [u8; G1_COMPRESSED_SIZE] {
        self.0.to_compressed()
    }

    pub fn from_compressed(bytes: &[u8]) -> Bls12381Result<Self> {
        let arr: [u8; G1_COMPRESSED_SIZE] =
            bytes
                .try_into()
                .map_err(|_| Bls12381Error::InvalidG1Length {
                    expected: G1_COMPRESSED_SIZE,
                    actual: bytes.len(),
                })?;
        Option::<G1Affine>::from(G1Affine::from_compressed(&arr))
            .map(Self)
            .ok_or(Bls12381Error::NotOnCurve)
    }

    pub fn to_uncompressed(&self) -> [u8; G1_UNCOMPRESSED_SIZE] {
        self.0.to_uncompressed()
    }

    pub fn from_uncompressed(bytes: &[u8]) -> Bls12381Result<Self> {
        let arr: [u8; G1_UNCOMPRESSED_SIZE] =
            bytes
                .try_into()
                .map_err(|_| Bls12381Error::InvalidG1Length {
                    expected: G1_UNCOMPRESSED_SIZE,
                    actual: bytes.len(),
                })?;
        Option::<G1Affine>::from(G1Affine::from_uncompressed(&arr))
            .map(Self)
            .ok_or(Bls12381Error::NotOnCurve)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self((G1Projective::from(self.0) + G1Projective::from(other.0)).to_affine())
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    pub fn double(&self) -> Self {
        Self(G1Projective::from(self.0).double().to_affine())
    }

    pub fn mul(&self, scalar: &bls12_381::Scalar) -> Self {
        Self((G1Projective::from(self.0) * scalar).to_affine())
    }

    /// Hashes `message` onto G1 using the given domain-separation tag
    /// (RFC 9380 `hash_to_curve` with `expand_message_xmd` over SHA-256).
    pub fn hash_to_curve(message: &[u8], dst: &[u8]) -> Self {
        let point = <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(
            message, dst,
        );
        Self(point.to_affine())
    }
}

/// A point on the G2 curve, the extension-field group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G2Point(pub(crate) G2Affine);

impl G2Point {
    pub fn identity() -> Self {
        Self(G2Affine::identity())
    }

    pub fn generator() -> Self {
        Self(G2Affine::generator())
    }

    pub fn to_compressed(&self) -> [u8; G2_COMPRESSED_SIZE] {
        self.0.to_compressed()
    }

    pub fn from_compressed(bytes: &[u8]) -> Bls12381Result<Self> {
        let arr: [u8; G2_COMPRESSED_SIZE] =
            bytes
                .try_into()
                .map_err(|_| Bls12381Error::InvalidG2Length {
                    expected: G2_COMPRESSED_SIZE,
                    actual: bytes.len(),
                })?;
        Option::<G2Affine>::from(G2Affine::from_compressed(&arr))
            .map(Self)
            .ok_or(Bls12381Error::NotOnCurve)
    }

    pub fn to_uncompressed(&self) -> [u8; G2_UNCOMPRESSED_SIZE] {
        self.0.to_uncompressed()
    }

    pub fn from_uncompressed(bytes: &[u8]) -> Bls12381Result<Self> {
        let arr: [u8; G2_UNCOMPRESSED_SIZE] =
            bytes
                .try_into()
                .map_err(|_| Bls12381Error::InvalidG2Length {
                    expected: G2_UNCOMPRESSED_SIZE,
                    actual: bytes.len(),
                })?;
        Option::<G2Affine>::from(G2Affine::from_uncompressed(&arr))
            .map(Self)
            .ok_or(Bls12381Error::NotOnCurve)
    }

    pub fn add(&self, other: &Self) -> Self {
        use bls12_381::G2Projective;
        Self((G2Projective::from(self.0) + G2Projective::from(other.0)).to_affine())
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    pub fn double(&self) -> Self {
        use bls12_381::G2Projective;
        Self(G2Projective::from(self.0).double().to_affine())
    }

    pub fn mul(&self, scalar: &bls12_381::Scalar) -> Self {
        use bls12_381::G2Projective;
        Self((G2Projective::from(self.0) * scalar).to_affine())
    }
}

/// An element of the pairing target group GT (the multiplicative group of
/// `Fp12`, written additively by this crate to match `group::Group`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GtElement(pub(crate) Gt);

impl GtElement {
    pub fn identity() -> Self {
        Self(Gt::identity())
    }

    pub fn to_bytes(&self) -> [u8; GT_SIZE] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Bls12381Result<Self> {
        let arr: [u8; GT_SIZE] = bytes
            .try_into()
            .map_err(|_| Bls12381Error::InvalidGtLength {
                expected: GT_SIZE,
                actual: bytes.len(),
            })?;
        Option::<Gt>::from(Gt::from_bytes(&arr))
            .map(Self)
            .ok_or(Bls12381Error::NotOnCurve)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self(self.0 + other.0)
    }

    pub fn mul(&self, scalar: &bls12_381::Scalar) -> Self {
        Self(self.0 * scalar)
    }
}
