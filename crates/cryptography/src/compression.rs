//! LZ4 block compression used for P2P payloads.

use crate::error::{CryptoError, CryptoResult};

/// Compresses `data` as an LZ4 block, returning the compressed bytes. The
/// caller is responsible for recording the original (uncompressed) size
/// alongside the result, as required to decompress it again.
pub fn lz4_compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(data)
}

/// Decompresses an LZ4 block previously produced by [`lz4_compress`].
/// `original_size` must be the exact uncompressed length; `max_size` bounds
/// the output to defend against a maliciously inflated size field.
pub fn lz4_decompress(data: &[u8], original_size: usize, max_size: usize) -> CryptoResult<Vec<u8>> {
    if original_size > max_size {
        return Err(CryptoError::Compression(format!(
            "declared size {original_size} exceeds maximum {max_size}"
        )));
    }
    lz4_flex::block::decompress(data, original_size)
        .map_err(|e| CryptoError::Compression(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(16);
        let compressed = lz4_compress(&original);
        let decompressed = lz4_decompress(&compressed, original.len(), original.len() * 2).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn rejects_size_above_max() {
        let original = b"small payload".to_vec();
        let compressed = lz4_compress(&original);
        assert!(lz4_decompress(&compressed, original.len(), 4).is_err());
    }
}
