use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, Mul};

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::curve::{Point, Scalar};
use crate::errors::Error;
use crate::tools::hashing::Chain;

const EXPONENT_DOMAIN: &[u8] = b"Exponent";

fn evaluate_polynomial<T>(coeffs: &[T], x: &Scalar) -> T
where
    T: Copy + Add<T, Output = T> + for<'a> Mul<&'a Scalar, Output = T>,
{
    // Evaluate in reverse to save on multiplications.
    // Basically: a0 + a1 x + a2 x^2 + a3 x^3 == (((a3 x) + a2) x + a1) x + a0
    let mut res = coeffs[coeffs.len() - 1];
    for i in (0..(coeffs.len() - 1)).rev() {
        res = res * x + coeffs[i];
    }
    res
}

/// A polynomial in the scalar field with the shared secret as the constant term.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Polynomial(Vec<Scalar>);

impl Polynomial {
    /// Creates `f(X) = s + a_1 X + ... + a_t X^t` of the given degree `t`
    /// with uniformly random non-constant coefficients.
    pub fn random(rng: &mut impl CryptoRngCore, secret: &Scalar, degree: usize) -> Self {
        let mut coeffs = Vec::with_capacity(degree + 1);
        coeffs.push(*secret);
        for _ in 0..degree {
            coeffs.push(Scalar::random(rng));
        }
        Self(coeffs)
    }

    pub fn degree(&self) -> usize {
        self.0.len() - 1
    }

    pub fn evaluate(&self, x: &Scalar) -> Scalar {
        evaluate_polynomial(&self.0, x)
    }

    /// The image of the polynomial on the curve, `F(X) = f(X) * G`.
    pub fn exponent(&self) -> ExponentPolynomial {
        let is_constant = self.0[0].is_zero();
        let coefficients = self
            .0
            .iter()
            .skip(usize::from(is_constant))
            .map(|coeff| coeff.mul_by_generator())
            .collect();
        ExponentPolynomial { is_constant, coefficients }
    }
}

impl std::fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Polynomial(degree={}, coefficients: <...>)", self.degree())
    }
}

/// A polynomial with coefficients "in the exponent", that is on the curve.
///
/// When the constant coefficient is the identity, it is not stored
/// (`is_constant` is set instead), so that an encoded identity point
/// never appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ExponentPolynomial {
    pub(crate) is_constant: bool,
    pub(crate) coefficients: Vec<Point>,
}

impl ExponentPolynomial {
    pub fn degree(&self) -> usize {
        if self.is_constant {
            self.coefficients.len()
        } else {
            self.coefficients.len() - 1
        }
    }

    /// The constant coefficient `F(0)`.
    pub fn constant(&self) -> Point {
        if self.is_constant {
            Point::IDENTITY
        } else {
            self.coefficients[0]
        }
    }

    /// Evaluates `F(x)` by the Horner scheme. When the constant coefficient
    /// is implicit, one extra multiplication by `x` reconstructs its
    /// contribution at the correct power.
    pub fn evaluate(&self, x: &Scalar) -> Point {
        let mut result = Point::IDENTITY;
        for coeff in self.coefficients.iter().rev() {
            result = result * x + coeff;
        }
        if self.is_constant {
            result = result * x;
        }
        result
    }

    /// Componentwise sum; the operands must agree on length and on whether
    /// the constant coefficient is implicit.
    pub fn add(&self, other: &Self) -> Result<Self, Error> {
        if self.coefficients.len() != other.coefficients.len() {
            return Err(Error::ProtocolAbort(
                "cannot sum exponent polynomials of different lengths".into(),
            ));
        }
        if self.is_constant != other.is_constant {
            return Err(Error::ProtocolAbort(
                "cannot sum exponent polynomials with differing constant flags".into(),
            ));
        }
        let coefficients = self
            .coefficients
            .iter()
            .zip(other.coefficients.iter())
            .map(|(lhs, rhs)| *lhs + rhs)
            .collect();
        Ok(Self {
            is_constant: self.is_constant,
            coefficients,
        })
    }

    pub fn sum(polynomials: &[Self]) -> Result<Self, Error> {
        let mut result = polynomials
            .first()
            .cloned()
            .ok_or_else(|| Error::ProtocolAbort("cannot sum zero exponent polynomials".into()))?;
        for poly in &polynomials[1..] {
            result = result.add(poly)?;
        }
        Ok(result)
    }

    /// Binary encoding: 4 big-endian bytes of the degree followed by
    /// the CBOR-encoded coefficient map.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = (self.degree() as u32).to_be_bytes().to_vec();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|err| Error::InvalidEncoding(format!("{err}")))?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 4 {
            return Err(Error::InvalidEncoding("missing exponent polynomial degree".into()));
        }
        let degree_bytes: [u8; 4] = bytes[..4].try_into().expect("slice length checked above");
        let degree = u32::from_be_bytes(degree_bytes) as usize;
        let poly: Self = ciborium::de::from_reader(&bytes[4..])
            .map_err(|err| Error::InvalidEncoding(format!("{err}")))?;
        if poly.coefficients.is_empty() || poly.degree() != degree {
            return Err(Error::InvalidEncoding(
                "exponent polynomial degree does not match its coefficients".into(),
            ));
        }
        Ok(poly)
    }

    /// Feeds the polynomial into a transcript hash under its domain tag.
    pub fn chain_to<C: Chain>(&self, digest: C) -> C {
        digest.chain_bytes(EXPONENT_DOMAIN).chain(self)
    }
}

/// The Lagrange coefficient at zero for the evaluation point `point`
/// within the set `points`.
pub(crate) fn interpolation_coeff(points: &BTreeSet<Scalar>, point: &Scalar) -> Scalar {
    points
        .iter()
        .filter(|x| x != &point)
        .map(|x| {
            *x * (*x - *point)
                .invert()
                .expect("all evaluation points are distinct as enforced by BTreeSet")
        })
        .product()
}

/// Recombines points evaluated on a polynomial in the exponent
/// into its constant coefficient.
pub(crate) fn shamir_join_points(pairs: &BTreeMap<Scalar, Point>) -> Point {
    let points = pairs.keys().cloned().collect::<BTreeSet<_>>();
    pairs
        .iter()
        .map(|(x, val)| val * &interpolation_coeff(&points, x))
        .sum()
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::{evaluate_polynomial, shamir_join_points, ExponentPolynomial, Polynomial};
    use crate::curve::Scalar;
    use crate::tools::hashing::FofHasher;

    #[test]
    fn evaluate() {
        let x = Scalar::random(&mut OsRng);
        let coeffs = (0..4).map(|_| Scalar::random(&mut OsRng)).collect::<Vec<_>>();

        let actual = evaluate_polynomial(&coeffs, &x);
        let expected = coeffs[0] + coeffs[1] * x + coeffs[2] * x * x + coeffs[3] * x * x * x;

        assert_eq!(actual, expected);
    }

    #[test]
    fn exponent_agrees_with_scalar_evaluation() {
        let f = Polynomial::random(&mut OsRng, &Scalar::random(&mut OsRng), 3);
        let cap_f = f.exponent();
        assert_eq!(cap_f.degree(), 3);

        for _ in 0..5 {
            let x = Scalar::random(&mut OsRng);
            assert_eq!(cap_f.evaluate(&x), f.evaluate(&x).mul_by_generator());
        }
    }

    #[test]
    fn exponent_of_zero_secret_skips_the_identity() {
        let f = Polynomial::random(&mut OsRng, &Scalar::ZERO, 2);
        let cap_f = f.exponent();
        assert!(cap_f.is_constant);
        assert_eq!(cap_f.coefficients.len(), 2);
        assert_eq!(cap_f.degree(), 2);
        assert!(cap_f.constant().is_identity());

        let x = Scalar::random(&mut OsRng);
        assert_eq!(cap_f.evaluate(&x), f.evaluate(&x).mul_by_generator());
    }

    #[test]
    fn sum_of_exponents() {
        let polys = (0..3)
            .map(|_| Polynomial::random(&mut OsRng, &Scalar::random(&mut OsRng), 2))
            .collect::<Vec<_>>();
        let exponents = polys.iter().map(Polynomial::exponent).collect::<Vec<_>>();
        let summed = ExponentPolynomial::sum(&exponents).unwrap();

        let x = Scalar::random(&mut OsRng);
        let scalar_sum: Scalar = polys.iter().map(|f| f.evaluate(&x)).sum();
        assert_eq!(summed.evaluate(&x), scalar_sum.mul_by_generator());
    }

    #[test]
    fn sum_requires_matching_shapes() {
        let f1 = Polynomial::random(&mut OsRng, &Scalar::random(&mut OsRng), 2).exponent();
        let f2 = Polynomial::random(&mut OsRng, &Scalar::random(&mut OsRng), 3).exponent();
        assert!(f1.add(&f2).is_err());

        let f3 = Polynomial::random(&mut OsRng, &Scalar::ZERO, 2).exponent();
        assert!(f1.add(&f3).is_err());
    }

    #[test]
    fn encoding_roundtrip() {
        for secret in [Scalar::random(&mut OsRng), Scalar::ZERO] {
            let cap_f = Polynomial::random(&mut OsRng, &secret, 3).exponent();
            let bytes = cap_f.to_bytes().unwrap();
            let back = ExponentPolynomial::from_bytes(&bytes).unwrap();
            assert_eq!(back, cap_f);
            assert_eq!(back.is_constant, cap_f.is_constant);
            assert_eq!(back.degree(), 3);
        }
    }

    #[test]
    fn encoding_rejects_degree_mismatch() {
        let cap_f = Polynomial::random(&mut OsRng, &Scalar::random(&mut OsRng), 2).exponent();
        let mut bytes = cap_f.to_bytes().unwrap();
        bytes[3] ^= 1;
        assert!(ExponentPolynomial::from_bytes(&bytes).is_err());
    }

    #[test]
    fn split_and_join_in_the_exponent() {
        let threshold = 2;
        let secret = Scalar::random(&mut OsRng);
        let f = Polynomial::random(&mut OsRng, &secret, threshold);
        let cap_f = f.exponent();

        let mut shares = (1..=5u64)
            .map(Scalar::from)
            .map(|x| (x, cap_f.evaluate(&x)))
            .collect::<std::collections::BTreeMap<_, _>>();

        // Any `threshold + 1` shares are enough.
        shares.remove(&Scalar::from(1u64));
        shares.remove(&Scalar::from(4u64));

        assert_eq!(shamir_join_points(&shares), secret.mul_by_generator());
    }

    #[test]
    fn transcript_binding_is_domain_separated() {
        let cap_f = Polynomial::random(&mut OsRng, &Scalar::random(&mut OsRng), 2).exponent();
        let bound = cap_f.chain_to(FofHasher::new_with_dst(b"test")).finalize();
        let unbound = FofHasher::new_with_dst(b"test").finalize();
        assert_ne!(bound, unbound);
    }
}
