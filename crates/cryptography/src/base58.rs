//! Base58Check encoding used for Neo N3 addresses.

use crate::error::{CryptoError, CryptoResult};
use crate::hash::hash256;

/// Encodes `payload` (already including its version byte) as
/// `Base58(payload ∥ checksum)` where `checksum` is the first four bytes of
/// `Hash256(payload)`.
pub fn encode_check(payload: &[u8]) -> String {
    let checksum = hash256(payload);
    let mut buf = Vec::with_capacity(payload.len() + 4);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum[0..4]);
    bs58::encode(buf).into_string()
}

/// Decodes and verifies a Base58Check string, returning the payload
/// (without its trailing checksum).
pub fn decode_check(encoded: &str) -> CryptoResult<Vec<u8>> {
    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| CryptoError::Compression("invalid base58".into()))?;
    if decoded.len() < 4 {
        return Err(CryptoError::Compression("base58check too short".into()));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    let expected = hash256(payload);
    if checksum != &expected[0..4] {
        return Err(CryptoError::Compression("base58check checksum mismatch".into()));
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let payload = vec![0x35u8; 21];
        let encoded = encode_check(&payload);
        let decoded = decode_check(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let payload = vec![0x35u8; 21];
        let mut encoded = encode_check(&payload);
        encoded.push('1');
        assert!(decode_check(&encoded).is_err());
    }
}
