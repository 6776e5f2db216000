//! Cryptographic primitives for the Neo N3 blockchain: hashing, ECDSA over
//! secp256r1/secp256k1, Base58Check, Merkle trees, and LZ4 block
//! compression. BLS12-381 lives in the sibling `neo-bls12-381` crate.

pub mod base58;
pub mod compression;
pub mod ecdsa;
pub mod error;
pub mod hash;

pub use base58::{decode_check, encode_check};
pub use compression::{lz4_compress, lz4_decompress};
pub use ecdsa::{public_key_compressed, sign, verify, Curve};
pub use error::{CryptoError, CryptoResult};
pub use hash::{hash160, hash256, keccak256, merkle_root, ripemd160, sha256};
