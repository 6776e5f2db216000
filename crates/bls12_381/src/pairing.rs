//! Optimal ate pairing and batched multi-pairing over BLS12-381.

use crate::error::{Bls12381Error, Bls12381Result};
use crate::point::{G1Point, G2Point, GtElement};
use bls12_381::{multi_miller_loop, pairing, G2Prepared};

/// Computes `e(p, q)`.
pub fn pairing_single(p: &G1Point, q: &G2Point) -> GtElement {
    GtElement(pairing(&p.0, &q.0))
}

/// Computes the product `e(p_0, q_0) * e(p_1, q_1) * ...` via a single
/// combined Miller loop followed by one final exponentiation, which is
/// considerably cheaper than pairing each pair independently.
pub fn multi_pairing(pairs: &[(G1Point, G2Point)]) -> Bls12381Result<GtElement> {
    if pairs.is_empty() {
        return Err(Bls12381Error::EmptyPairingInput);
    }
    let prepared: Vec<G2Prepared> = pairs.iter().map(|(_, q)| G2Prepared::from(q.0)).collect();
    let terms: Vec<(&bls12_381::G1Affine, &G2Prepared)> = pairs
        .iter()
        .zip(prepared.iter())
        .map(|((p, _), prep)| (&p.0, prep))
        .collect();
    let result = multi_miller_loop(&terms).final_exponentiation();
    Ok(GtElement(result))
}

/// Checks `e(p_0, q_0) * e(p_1, q_1) * ... == 1` without materializing the
/// intermediate GT element, the form used by the `CryptoLib.bls12381Pairing`
/// membership check and by BLS signature verification (`e(sig, G2gen) ==
/// e(H(m), pk)` rearranges to a product-equals-identity check).
pub fn pairing_product_is_identity(pairs: &[(G1Point, G2Point)]) -> Bls12381Result<bool> {
    let product = multi_pairing(pairs)?;
    Ok(product == GtElement::identity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls12_381::Scalar;

    #[test]
    fn pairing_is_bilinear_in_scalar_multiples() {
        let a = Scalar::from(7u64);
        let b = Scalar::from(11u64);
        let p = G1Point::generator().mul(&a);
        let q = G2Point::generator().mul(&b);

        let lhs = pairing_single(&p, &q);
        let rhs = pairing_single(&G1Point::generator(), &G2Point::generator()).mul(&(a * b));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn multi_pairing_of_inverse_pair_is_identity() {
        let p = G1Point::generator();
        let q = G2Point::generator();
        let neg_p = p.negate();
        let product = pairing_product_is_identity(&[(p, q), (neg_p, q)]).unwrap();
        assert!(product);
    }

    #[test]
    fn empty_multi_pairing_is_rejected() {
        assert!(multi_pairing(&[]).is_err());
    }
}
