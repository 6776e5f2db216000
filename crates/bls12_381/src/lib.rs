//! BLS12-381 curve operations backing the `CryptoLib` native contract's
//! `bls12381*` interop methods: point (de)serialization, arithmetic, and
//! pairing.

pub mod error;
pub mod pairing;
pub mod point;

pub use error::{Bls12381Error, Bls12381Result};
pub use pairing::{multi_pairing, pairing_product_is_identity, pairing_single};
pub use point::{
    G1Point, G2Point, GtElement, G1_COMPRESSED_SIZE, G1_UNCOMPRESSED_SIZE, G2_COMPRESSED_SIZE,
    G2_UNCOMPRESSED_SIZE, GT_SIZE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn g1_generator_round_trips_compressed() {
        let g = G1Point::generator();
        let bytes = g.to_compressed();
        assert_eq!(bytes.len(), G1_COMPRESSED_SIZE);
        assert_eq!(G1Point::from_compressed(&bytes).unwrap(), g);
    }

    #[test]
    fn g1_generator_round_trips_uncompressed() {
        let g = G1Point::generator();
        let bytes = g.to_uncompressed();
        assert_eq!(bytes.len(), G1_UNCOMPRESSED_SIZE);
        assert_eq!(G1Point::from_uncompressed(&bytes).unwrap(), g);
    }

    #[test]
    fn g2_generator_round_trips_compressed() {
        let g = G2Point::generator();
        let bytes = g.to_compressed();
        assert_eq!(bytes.len(), G2_COMPRESSED_SIZE);
        assert_eq!(G2Point::from_compressed(&bytes).unwrap(), g);
    }

    #[test]
    fn rejects_wrong_length_g1() {
        let bytes = vec![0u8; 10];
        assert!(G1Point::from_compressed(&bytes).is_err());
    }

    #[test]
    fn g1_addition_matches_doubling() {
        let g = G1Point::generator();
        assert_eq!(g.add(&g), g.double());
    }

    #[test]
    fn g1_point_plus_its_negation_is_identity() {
        let g = G1Point::generator();
        assert_eq!(g.add(&g.negate()), G1Point::identity());
    }

    #[test]
    fn hash_to_curve_is_deterministic() {
        let dst = b"NEO_BLS12381_G1_TEST_DST";
        let a = G1Point::hash_to_curve(b"hello neo", dst);
        let b = G1Point::hash_to_curve(b"hello neo", dst);
        assert_eq!(a, b);
        let c = G1Point::hash_to_curve(b"different message", dst);
        assert_ne!(a, c);
    }
}
