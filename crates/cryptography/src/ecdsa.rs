//! ECDSA signing and verification over secp256r1 (Neo's default curve) and
//! secp256k1 (used by the Keccak-based verification path).

use crate::error::{CryptoError, CryptoResult};
use k256::ecdsa::{
    Signature as K1Signature, SigningKey as K1SigningKey, VerifyingKey as K1VerifyingKey,
};
use p256::ecdsa::{
    signature::{Signer as _, Verifier as _},
    Signature as R1Signature, SigningKey as R1SigningKey, VerifyingKey as R1VerifyingKey,
};

/// The curve a public key or signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// secp256r1 / NIST P-256, the default curve for Neo N3 account keys.
    Secp256r1,
    /// secp256k1, used for Ethereum-compatible verification scripts.
    Secp256k1,
}

/// Signs a 32-byte message digest, returning the raw `(r, s)` signature.
pub fn sign(curve: Curve, private_key: &[u8; 32], digest: &[u8; 32]) -> CryptoResult<Vec<u8>> {
    match curve {
        Curve::Secp256r1 => {
            let key = R1SigningKey::from_bytes(private_key.into())
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: 32,
                    actual: private_key.len(),
                })?;
            let sig: R1Signature = key.sign(digest);
            Ok(sig.to_bytes().to_vec())
        }
        Curve::Secp256k1 => {
            let key = K1SigningKey::from_bytes(private_key.into())
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: 32,
                    actual: private_key.len(),
                })?;
            let sig: K1Signature = key.sign(digest);
            Ok(sig.to_bytes().to_vec())
        }
    }
}

/// Verifies a signature over a 32-byte message digest against a SEC1
/// public key (33-byte compressed or 65-byte uncompressed).
pub fn verify(curve: Curve, public_key: &[u8], digest: &[u8; 32], signature: &[u8]) -> bool {
    match curve {
        Curve::Secp256r1 => {
            let Ok(key) = R1VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(sig) = R1Signature::from_slice(signature) else {
                return false;
            };
            key.verify(digest, &sig).is_ok()
        }
        Curve::Secp256k1 => {
            let Ok(key) = K1VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(sig) = K1Signature::from_slice(signature) else {
                return false;
            };
            key.verify(digest, &sig).is_ok()
        }
    }
}

/// Derives the SEC1-compressed (33-byte) public key for a private key.
pub fn public_key_compressed(curve: Curve, private_key: &[u8; 32]) -> CryptoResult<[u8; 33]> {
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    let bytes = match curve {
        Curve::Secp256r1 => {
            let key = R1SigningKey::from_bytes(private_key.into())
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: 32,
                    actual: private_key.len(),
                })?;
            key.verifying_key().to_encoded_point(true).as_bytes().to_vec()
        }
        Curve::Secp256k1 => {
            let key = K1SigningKey::from_bytes(private_key.into())
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: 32,
                    actual: private_key.len(),
                })?;
            key.verifying_key().to_encoded_point(true).as_bytes().to_vec()
        }
    };

    bytes.try_into().map_err(|_| CryptoError::InvalidPoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn secp256r1_sign_then_verify_round_trips() {
        let private_key = [7u8; 32];
        let digest = sha256(b"neo transaction");
        let signature = sign(Curve::Secp256r1, &private_key, &digest).unwrap();
        let public_key = public_key_compressed(Curve::Secp256r1, &private_key).unwrap();
        assert!(verify(Curve::Secp256r1, &public_key, &digest, &signature));
    }

    #[test]
    fn tampered_digest_fails_verification() {
        let private_key = [9u8; 32];
        let digest = sha256(b"original");
        let signature = sign(Curve::Secp256r1, &private_key, &digest).unwrap();
        let public_key = public_key_compressed(Curve::Secp256r1, &private_key).unwrap();
        let other_digest = sha256(b"tampered");
        assert!(!verify(Curve::Secp256r1, &public_key, &other_digest, &signature));
    }

    #[test]
    fn secp256k1_sign_then_verify_round_trips() {
        let private_key = [3u8; 32];
        let digest = sha256(b"keccak path");
        let signature = sign(Curve::Secp256k1, &private_key, &digest).unwrap();
        let public_key = public_key_compressed(Curve::Secp256k1, &private_key).unwrap();
        assert!(verify(Curve::Secp256k1, &public_key, &digest, &signature));
    }
}
