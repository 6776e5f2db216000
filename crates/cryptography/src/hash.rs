//! Hash functions used across the Neo N3 protocol.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// `SHA-256(data)`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// `RIPEMD-160(data)`.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// `Hash160(data) = RIPEMD160(SHA256(data))`, used for script hashes.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// `Hash256(data) = SHA256(SHA256(data))`, used for transaction and block
/// hashes and for Merkle tree nodes.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// `Keccak256(data)`, used by the secp256k1 signature path.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Computes the Merkle root over a list of leaf hashes.
///
/// Pairwise SHA-256 of concatenated children; for odd counts the last hash
/// is duplicated. An empty list returns the all-zero hash.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level: Vec<[u8; 32]> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            let mut buf = Vec::with_capacity(64);
            buf.extend_from_slice(&pair[0]);
            buf.extend_from_slice(&pair[1]);
            next.push(hash256(&buf));
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_merkle_root_is_zero() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn single_leaf_merkle_root_is_itself() {
        let leaf = sha256(b"one transaction");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn odd_count_duplicates_last_leaf() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        let c = sha256(b"c");

        let with_three = merkle_root(&[a, b, c]);
        let with_duplicate = merkle_root(&[a, b, c, c]);
        assert_eq!(with_three, with_duplicate);
    }

    #[test]
    fn hash160_matches_sha256_then_ripemd160() {
        let data = b"Hello, Neo!";
        let expected = ripemd160(&sha256(data));
        assert_eq!(hash160(data), expected);
    }
}
