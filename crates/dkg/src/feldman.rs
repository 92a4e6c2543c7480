//! Feldman Verifiable Secret Sharing.
//!
//! Extends Shamir's secret sharing with commitments that allow
//! verification of shares without revealing the secret. Share index `i`
//! is the evaluation of the polynomial at `x = i + 1`.

use bls12_381::{G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Curve;
use rand::{CryptoRng, RngCore};

use randnet_crypto::{eval_point, random_scalar, CryptoError, PubPoly};

/// Generate a random polynomial of degree `threshold - 1`.
///
/// Returns coefficients [a_0, a_1, ..., a_{t-1}] where a_0 is the dealer's
/// secret contribution.
pub fn generate_polynomial<R: RngCore + CryptoRng>(threshold: usize, rng: &mut R) -> Vec<Scalar> {
    (0..threshold).map(|_| random_scalar(rng)).collect()
}

/// Evaluate polynomial at a point.
///
/// f(x) = a_0 + a_1*x + a_2*x^2 + ... using Horner's method
pub fn evaluate_polynomial(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    let mut result = Scalar::ZERO;
    for coeff in coefficients.iter().rev() {
        result = result * x + coeff;
    }
    result
}

/// Share of participant `index`.
pub fn share_for(coefficients: &[Scalar], index: u32) -> Scalar {
    evaluate_polynomial(coefficients, &eval_point(index))
}

/// Feldman commitments C_k = a_k·G2 for each coefficient.
pub fn generate_commitments(coefficients: &[Scalar]) -> Vec<G2Affine> {
    coefficients
        .iter()
        .map(|coeff| (G2Projective::generator() * coeff).to_affine())
        .collect()
}

/// Check g^{share} against the committed polynomial at `index`.
pub fn verify_share(share: &Scalar, index: u32, poly: &PubPoly) -> bool {
    (G2Projective::generator() * share).to_affine() == poly.eval(index)
}

/// Coefficient-wise sum of public polynomials of equal degree.
pub fn sum_polynomials<'a, I>(polys: I) -> Result<PubPoly, CryptoError>
where
    I: IntoIterator<Item = &'a PubPoly>,
{
    let mut acc: Vec<G2Projective> = Vec::new();
    for poly in polys {
        if acc.is_empty() {
            acc = vec![G2Projective::identity(); poly.threshold()];
        }
        for (sum, commit) in acc.iter_mut().zip(poly.commits()) {
            *sum += G2Projective::from(*commit);
        }
    }
    PubPoly::from_points(acc.iter().map(|p| p.to_affine()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use randnet_crypto::{recover_secret, PriShare};
    use rand::rngs::OsRng;

    #[test]
    fn test_polynomial_evaluation() {
        // f(x) = 5 + 3x + 2x^2
        let coeffs = vec![Scalar::from(5u64), Scalar::from(3u64), Scalar::from(2u64)];

        assert_eq!(evaluate_polynomial(&coeffs, &Scalar::ZERO), Scalar::from(5u64));
        assert_eq!(evaluate_polynomial(&coeffs, &Scalar::ONE), Scalar::from(10u64));
        assert_eq!(
            evaluate_polynomial(&coeffs, &Scalar::from(2u64)),
            Scalar::from(19u64)
        );

        // index 0 evaluates at x = 1
        assert_eq!(share_for(&coeffs, 0), Scalar::from(10u64));
    }

    #[test]
    fn test_share_verification() {
        let coeffs = generate_polynomial(3, &mut OsRng);
        let poly = PubPoly::from_points(generate_commitments(&coeffs)).unwrap();

        for i in 0..5 {
            let share = share_for(&coeffs, i);
            assert!(verify_share(&share, i, &poly));
            assert!(!verify_share(&(share + Scalar::ONE), i, &poly));
        }
    }

    #[test]
    fn test_share_reconstruction() {
        let coeffs = generate_polynomial(3, &mut OsRng);
        let shares: Vec<PriShare> = (0..5)
            .map(|index| PriShare {
                index,
                value: share_for(&coeffs, index),
            })
            .collect();

        assert_eq!(recover_secret(&shares[..3], 3).unwrap(), coeffs[0]);
        assert_eq!(recover_secret(&shares[2..], 3).unwrap(), coeffs[0]);
    }

    #[test]
    fn test_sum_polynomials() {
        let a = generate_polynomial(2, &mut OsRng);
        let b = generate_polynomial(2, &mut OsRng);
        let pa = PubPoly::from_points(generate_commitments(&a)).unwrap();
        let pb = PubPoly::from_points(generate_commitments(&b)).unwrap();

        let sum = sum_polynomials([&pa, &pb]).unwrap();
        let share = share_for(&a, 4) + share_for(&b, 4);
        assert!(verify_share(&share, 4, &sum));
    }

    #[test]
    fn test_sum_of_nothing_is_rejected() {
        assert_eq!(
            sum_polynomials(std::iter::empty()),
            Err(CryptoError::EmptyCommitments)
        );
    }
}
