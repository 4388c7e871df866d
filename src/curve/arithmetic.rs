use core::iter;
use core::ops::{Add, Mul, Neg, Sub};

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::{
    bigint::U256,
    generic_array::GenericArray,
    ops::Reduce,
    point::AffineCoordinates,
    sec1::{EncodedPoint, FromEncodedPoint, ToEncodedPoint},
    subtle::{Choice, ConditionallySelectable, CtOption},
    Curve, Field, Group, NonZeroScalar, PrimeField, ScalarPrimitive,
};
use k256::Secp256k1;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::tools::hashing::BackendDigest;
use crate::tools::serde_bytes;

/// The order of the secp256k1 group, as a raw big-endian integer.
pub(crate) const ORDER: U256 = Secp256k1::ORDER;

type BackendScalar = k256::Scalar;
type BackendPoint = k256::ProjectivePoint;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PartialOrd, Ord, Zeroize)]
pub struct Scalar(BackendScalar);

impl Scalar {
    pub const ZERO: Self = Self(BackendScalar::ZERO);
    pub const ONE: Self = Self(BackendScalar::ONE);

    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        Self(ScalarPrimitive::<Secp256k1>::random(rng).into())
    }

    pub fn random_nonzero(rng: &mut impl CryptoRngCore) -> Self {
        Self(*NonZeroScalar::<Secp256k1>::random(rng).as_ref())
    }

    pub fn mul_by_generator(&self) -> Point {
        Point::GENERATOR * self
    }

    /// Invert the [`Scalar`]. Returns [`None`] if the scalar is zero.
    pub fn invert(&self) -> CtOption<Self> {
        self.0.invert().map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero().into()
    }

    /// Reduce a 32-byte digest into a scalar as per SEC1
    /// (<https://www.secg.org/sec1-v2.pdf>, Section 4.1.3, steps 5-6).
    pub fn from_digest(digest: BackendDigest) -> Self {
        use digest::Digest;
        Self(<BackendScalar as Reduce<U256>>::reduce_bytes(&digest.finalize()))
    }

    /// Reduce 32 big-endian bytes modulo the group order.
    pub fn from_reduced_bytes(bytes: &[u8; 32]) -> Self {
        Self(<BackendScalar as Reduce<U256>>::reduce_bytes(GenericArray::from_slice(bytes)))
    }

    /// Returns the SEC1 encoding of this scalar (big endian order).
    pub fn to_be_bytes(self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    /// Attempts to instantiate a `Scalar` from a slice of bytes.
    /// Assumes big-endian order, rejects values above the group order.
    pub fn try_from_be_bytes(bytes: &[u8]) -> Result<Self, String> {
        let arr = GenericArray::from_exact_iter(bytes.iter().cloned())
            .ok_or("Invalid length of a curve scalar")?;
        BackendScalar::from_repr_vartime(arr)
            .map(Self)
            .ok_or_else(|| "Invalid curve scalar representation".into())
    }

    pub(crate) fn to_backend(self) -> BackendScalar {
        self.0
    }
}

impl From<u64> for Scalar {
    fn from(val: u64) -> Self {
        Self(BackendScalar::from(val))
    }
}

impl From<&NonZeroScalar<Secp256k1>> for Scalar {
    fn from(val: &NonZeroScalar<Secp256k1>) -> Self {
        Self(*val.as_ref())
    }
}

impl<'a> TryFrom<&'a [u8]> for Scalar {
    type Error = String;
    fn try_from(val: &'a [u8]) -> Result<Self, Self::Error> {
        Self::try_from_be_bytes(val)
    }
}

impl ConditionallySelectable for Scalar {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        Self(BackendScalar::conditional_select(&a.0, &b.0, choice))
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_bytes::as_hex::serialize(&self.to_be_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_bytes::as_hex::deserialize(deserializer)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point(BackendPoint);

impl Point {
    pub const GENERATOR: Self = Self(BackendPoint::GENERATOR);
    pub const IDENTITY: Self = Self(BackendPoint::IDENTITY);

    pub fn is_identity(&self) -> bool {
        self.0.is_identity().into()
    }

    /// The x-coordinate of the affine representation, reduced modulo the group order.
    pub fn x_coordinate(&self) -> Scalar {
        let bytes = self.0.to_affine().x();
        Scalar(<BackendScalar as Reduce<U256>>::reduce_bytes(&bytes))
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self((*key.as_affine()).into())
    }

    /// Convert a [`Point`] to a [`VerifyingKey`] wrapped in an [`Option`].
    /// Returns [`None`] if the `Point` is the point at infinity.
    pub fn to_verifying_key(self) -> Option<VerifyingKey> {
        VerifyingKey::from_affine(self.0.to_affine()).ok()
    }

    /// Parses a point from its 33-byte compressed SEC1 encoding.
    /// The identity is not representable on the wire.
    pub(crate) fn try_from_compressed_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != 33 {
            return Err("Invalid length of a compressed curve point".into());
        }
        let ep = EncodedPoint::<Secp256k1>::from_bytes(bytes).map_err(|err| format!("{err}"))?;

        // Unwrap CtOption into Option
        let cp_opt: Option<_> = BackendPoint::from_encoded_point(&ep).into();
        cp_opt
            .map(Self)
            .ok_or_else(|| "Invalid curve point representation".into())
    }

    /// The 33-byte compressed SEC1 encoding (`0x02`/`0x03` plus the x-coordinate).
    /// Serializing the identity is an error.
    pub(crate) fn to_compressed_bytes(self) -> Result<[u8; 33], String> {
        let ep = self.0.to_affine().to_encoded_point(true);
        ep.as_bytes()
            .try_into()
            .map_err(|_| "Cannot serialize the identity point".into())
    }

    pub(crate) fn to_backend(self) -> BackendPoint {
        self.0
    }
}

impl<'a> TryFrom<&'a [u8]> for Point {
    type Error = String;
    fn try_from(val: &'a [u8]) -> Result<Self, Self::Error> {
        Self::try_from_compressed_bytes(val)
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = self.to_compressed_bytes().map_err(serde::ser::Error::custom)?;
        serde_bytes::as_hex::serialize(&bytes, serializer)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_bytes::as_hex::deserialize(deserializer)
    }
}

impl Neg for Scalar {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Neg for &Scalar {
    type Output = Scalar;
    fn neg(self) -> Self::Output {
        Scalar(-self.0)
    }
}

impl Add<Scalar> for Scalar {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.add(&rhs.0))
    }
}

impl Add<&Scalar> for &Scalar {
    type Output = Scalar;
    fn add(self, rhs: &Scalar) -> Scalar {
        Scalar(self.0.add(&rhs.0))
    }
}

impl Add<&Scalar> for Scalar {
    type Output = Self;
    fn add(self, rhs: &Self) -> Self {
        Self(self.0.add(&rhs.0))
    }
}

impl Sub<Scalar> for Scalar {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.sub(&rhs.0))
    }
}

impl Mul<Scalar> for Scalar {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(self.0.mul(&rhs.0))
    }
}

impl Mul<&Scalar> for Scalar {
    type Output = Self;
    fn mul(self, rhs: &Self) -> Self {
        Self(self.0.mul(&rhs.0))
    }
}

impl Mul<&Scalar> for &Scalar {
    type Output = Scalar;
    fn mul(self, rhs: &Scalar) -> Scalar {
        Scalar(self.0.mul(&rhs.0))
    }
}

impl Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.add(&rhs.0))
    }
}

impl Add<&Point> for Point {
    type Output = Self;
    fn add(self, rhs: &Self) -> Self {
        Self(self.0.add(&rhs.0))
    }
}

impl Neg for Point {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<Scalar> for Point {
    type Output = Self;
    fn mul(self, rhs: Scalar) -> Self {
        Self(self.0.mul(&rhs.0))
    }
}

impl Mul<&Scalar> for Point {
    type Output = Self;
    fn mul(self, rhs: &Scalar) -> Self {
        Self(self.0.mul(&rhs.0))
    }
}

impl Mul<&Scalar> for &Point {
    type Output = Point;
    fn mul(self, rhs: &Scalar) -> Point {
        Point(self.0.mul(&rhs.0))
    }
}

impl iter::Sum for Scalar {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.reduce(Add::add).unwrap_or(Self::ZERO)
    }
}

impl<'a> iter::Sum<&'a Self> for Scalar {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.cloned().sum()
    }
}

impl iter::Product for Scalar {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.reduce(Mul::mul).unwrap_or(Self::ONE)
    }
}

impl iter::Sum for Point {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.reduce(Add::add).unwrap_or(Self::IDENTITY)
    }
}

impl<'a> iter::Sum<&'a Self> for Point {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.cloned().sum()
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::{Point, Scalar};

    #[test]
    fn scalar_roundtrip() {
        let s = Scalar::random(&mut OsRng);
        let bytes = s.to_be_bytes();
        assert_eq!(s, Scalar::try_from_be_bytes(&bytes).unwrap());
    }

    #[test]
    fn scalar_rejects_overflow() {
        // The group order itself is not a valid scalar encoding.
        let order_bytes =
            hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141").unwrap();
        assert!(Scalar::try_from_be_bytes(&order_bytes).is_err());
    }

    #[test]
    fn point_roundtrip() {
        let p = Scalar::random(&mut OsRng).mul_by_generator();
        let bytes = p.to_compressed_bytes().unwrap();
        assert_eq!(bytes.len(), 33);
        assert!(bytes[0] == 0x02 || bytes[0] == 0x03);
        assert_eq!(p, Point::try_from_compressed_bytes(&bytes).unwrap());
    }

    #[test]
    fn identity_is_not_serializable() {
        assert!(Point::IDENTITY.to_compressed_bytes().is_err());
    }

    #[test]
    fn x_coordinate_of_generator() {
        assert!(!Point::GENERATOR.x_coordinate().is_zero());
    }
}
