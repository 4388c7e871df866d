use core::ops::{Add, Mul, Neg, Sub};

use crypto_bigint::{
    modular::{
        runtime_mod::{DynResidue, DynResidueParams},
        Retrieve,
    },
    nlimbs,
    subtle::{self, ConditionallySelectable, ConstantTimeLess, CtOption},
    Encoding, Integer, Invert, NonZero, PowBoundedExp, Random, RandomMod, Uint, Zero, U1024, U2048,
    U4096, U512,
};
use crypto_primes::RandomPrimeWithRng;
use digest::XofReader;

use super::bounded::Bounded;
use super::signed::Signed;
use crate::curve::{Scalar, ORDER};

pub(crate) const fn upcast_uint<const N1: usize, const N2: usize>(value: Uint<N1>) -> Uint<N2> {
    debug_assert!(N2 >= N1);
    let mut result_words = [0; N2];
    let mut i = 0;
    while i < N1 {
        result_words[i] = value.as_words()[i];
        i += 1;
    }
    Uint::from_words(result_words)
}

pub trait UintLike:
    Integer + Encoding + RandomPrimeWithRng + RandomMod + Random + subtle::ConditionallySelectable
{
    type ModUint: UintModLike<RawUint = Self>;

    /// Reads a uniform value below `modulus` from an extendable hash output.
    fn from_xof(reader: &mut impl XofReader, modulus: &NonZero<Self>) -> Self;
    fn wrapping_sub(&self, other: &Self) -> Self;
    fn wrapping_add(&self, other: &Self) -> Self;
    fn bits(&self) -> usize;
    fn bits_vartime(&self) -> usize;
    fn bit_vartime(&self, index: usize) -> bool;
    fn neg(&self) -> Self;
    fn shl_vartime(&self, shift: usize) -> Self;
    fn shr_vartime(&self, shift: usize) -> Self;
    fn to_mod(&self, precomputed: &<Self::ModUint as UintModLike>::Precomputed) -> Self::ModUint {
        Self::ModUint::new(self, precomputed)
    }
}

pub trait HasWide: Sized + Zero {
    type Wide: UintLike;
    fn mul_wide(&self, other: &Self) -> Self::Wide;
    fn square_wide(&self) -> Self::Wide;
    fn into_wide(self) -> Self::Wide;
    fn from_wide(value: Self::Wide) -> (Self, Self);
    fn try_from_wide(value: Self::Wide) -> Option<Self> {
        let (hi, lo) = Self::from_wide(value);
        if hi.is_zero().into() {
            return Some(lo);
        }
        None
    }
}

impl<const L: usize> UintLike for Uint<L>
where
    Uint<L>: Encoding,
{
    type ModUint = DynResidue<L>;

    fn from_xof(reader: &mut impl XofReader, modulus: &NonZero<Self>) -> Self {
        let backend_modulus = modulus.as_ref();

        let n_bits = backend_modulus.bits_vartime();
        let n_bytes = (n_bits + 7) / 8; // ceiling division by 8

        // If the number of bits is not a multiple of 8,
        // use a mask to zeroize the high bits in the generated random bytestring,
        // so that we don't have to reject too much.
        let mask = if n_bits & 7 != 0 {
            (1 << (n_bits & 7)) - 1
        } else {
            u8::MAX
        };

        let mut bytes = Uint::<L>::ZERO.to_le_bytes();

        loop {
            reader.read(&mut (bytes.as_mut()[0..n_bytes]));
            bytes.as_mut()[n_bytes - 1] &= mask;
            let n = Uint::<L>::from_le_bytes(bytes);

            if n.ct_lt(backend_modulus).into() {
                return n;
            }
        }
    }

    fn wrapping_sub(&self, other: &Self) -> Self {
        self.wrapping_sub(other)
    }

    fn wrapping_add(&self, other: &Self) -> Self {
        self.wrapping_add(other)
    }

    fn bits(&self) -> usize {
        self.bits()
    }

    fn bits_vartime(&self) -> usize {
        self.bits_vartime()
    }

    fn bit_vartime(&self, index: usize) -> bool {
        self.bit_vartime(index)
    }

    fn neg(&self) -> Self {
        Self::ZERO.wrapping_sub(self)
    }

    fn shl_vartime(&self, shift: usize) -> Self {
        self.shl_vartime(shift)
    }

    fn shr_vartime(&self, shift: usize) -> Self {
        self.shr_vartime(shift)
    }
}

/// Conversions between curve scalars and the integer types used
/// for Paillier plaintexts.
pub trait FromScalar {
    fn from_scalar(value: &Scalar) -> Self;
    fn to_scalar(&self) -> Scalar;
}

macro_rules! impl_from_scalar {
    ($uint:ident) => {
        impl FromScalar for $uint {
            fn from_scalar(value: &Scalar) -> Self {
                let mut repr = Self::ZERO.to_be_bytes();
                let scalar_bytes = value.to_be_bytes();
                let uint_len = repr.as_ref().len();
                repr.as_mut()[uint_len - scalar_bytes.len()..].copy_from_slice(&scalar_bytes);
                Self::from_be_bytes(repr)
            }

            fn to_scalar(&self) -> Scalar {
                const ORDER_WIDE: $uint = upcast_uint(ORDER);
                let reduced = *self % NonZero::new(ORDER_WIDE).expect("the group order is non-zero");
                let repr = reduced.to_be_bytes();
                let uint_len = repr.as_ref().len();
                Scalar::try_from_be_bytes(&repr.as_ref()[uint_len - 32..])
                    .expect("the value was reduced modulo the group order")
            }
        }
    };
}

impl_from_scalar!(U1024);
impl_from_scalar!(U2048);

impl<T: UintLike + FromScalar> FromScalar for Signed<T> {
    fn from_scalar(value: &Scalar) -> Self {
        Signed::new_positive(T::from_scalar(value), 256).expect("a curve scalar fits into 256 bits")
    }

    fn to_scalar(&self) -> Scalar {
        let abs_value = self.abs().to_scalar();
        Scalar::conditional_select(&abs_value, &-abs_value, self.is_negative())
    }
}

/// Integers in an efficient representation for modulo operations.
pub trait UintModLike:
    PowBoundedExp<Self::RawUint>
    + Send
    + Sync
    + core::fmt::Debug
    + Add<Output = Self>
    + Neg<Output = Self>
    + Copy
    + Clone
    + PartialEq
    + Eq
    + Retrieve<Output = Self::RawUint>
    + Invert<Output = CtOption<Self>>
    + Mul<Output = Self>
    + Sub<Output = Self>
    + for<'a> Mul<&'a Self, Output = Self>
    + subtle::ConditionallySelectable
{
    /// The corresponding regular integer type.
    type RawUint: UintLike<ModUint = Self>;

    /// Precomputed data for converting a regular integer to the modulo representation.
    type Precomputed: Clone + Copy + core::fmt::Debug + PartialEq + Eq + Send + Sync;

    fn new_precomputed(modulus: &NonZero<Self::RawUint>) -> Self::Precomputed;
    fn new(value: &Self::RawUint, precomputed: &Self::Precomputed) -> Self;
    fn one(precomputed: &Self::Precomputed) -> Self;
    fn square(&self) -> Self;

    fn pow_bounded(&self, exponent: &Bounded<Self::RawUint>) -> Self {
        self.pow_bounded_exp(exponent.as_ref(), exponent.bound_usize())
    }

    fn pow_signed_vartime(&self, exponent: &Signed<Self::RawUint>) -> Self {
        let abs_exponent = exponent.abs();
        let abs_result = self.pow_bounded_exp(&abs_exponent, exponent.bound());
        if exponent.is_negative().into() {
            abs_result
                .invert()
                .expect("the base is invertible by construction")
        } else {
            abs_result
        }
    }

    /// Constant-time counterpart of [`Self::pow_signed_vartime`]
    /// for secret exponents.
    fn pow_signed(&self, exponent: &Signed<Self::RawUint>) -> Self {
        let abs_exponent = exponent.abs();
        let abs_result = self.pow_bounded_exp(&abs_exponent, exponent.bound());
        let inv_result = abs_result
            .invert()
            .expect("the base is invertible by construction");
        Self::conditional_select(&abs_result, &inv_result, exponent.is_negative())
    }

    fn pow_wide(&self, exponent: &<Self::RawUint as HasWide>::Wide, bound: usize) -> Self
    where
        Self::RawUint: HasWide,
    {
        let bits = <Self::RawUint as Integer>::BITS;
        let bound = bound % (2 * bits + 1);

        let (hi, lo) = Self::RawUint::from_wide(*exponent);
        let lo_res = self.pow_bounded_exp(&lo, core::cmp::min(bits, bound));

        if bound > bits {
            self.pow_bounded_exp(&hi, bound - bits).pow_2k(bits) * lo_res
        } else {
            lo_res
        }
    }

    fn pow_signed_wide(&self, exponent: &Signed<<Self::RawUint as HasWide>::Wide>) -> Self
    where
        Self::RawUint: HasWide,
    {
        let abs_exponent = exponent.abs();
        let abs_result = self.pow_wide(&abs_exponent, exponent.bound());
        let inv_result = abs_result
            .invert()
            .expect("the base is invertible by construction");
        Self::conditional_select(&abs_result, &inv_result, exponent.is_negative())
    }

    /// Calculates `self^{2^k}`
    fn pow_2k(&self, k: usize) -> Self {
        let mut result = *self;
        for _ in 0..k {
            result = result.square();
        }
        result
    }
}

impl<const L: usize> UintModLike for DynResidue<L>
where
    Uint<L>: Encoding,
{
    type RawUint = Uint<L>;
    type Precomputed = DynResidueParams<L>;

    fn new_precomputed(modulus: &NonZero<Self::RawUint>) -> Self::Precomputed {
        DynResidueParams::<L>::new(modulus)
    }
    fn new(value: &Self::RawUint, precomputed: &Self::Precomputed) -> Self {
        Self::new(value, *precomputed)
    }
    fn one(precomputed: &Self::Precomputed) -> Self {
        Self::one(*precomputed)
    }
    fn square(&self) -> Self {
        self.square()
    }
}

macro_rules! impl_has_wide {
    ($uint:ident, $wide:ident) => {
        impl HasWide for $uint {
            type Wide = $wide;
            fn mul_wide(&self, other: &Self) -> Self::Wide {
                self.mul_wide(other).into()
            }
            fn square_wide(&self) -> Self::Wide {
                self.square_wide().into()
            }
            fn into_wide(self) -> Self::Wide {
                (self, Self::ZERO).into()
            }
            fn from_wide(value: Self::Wide) -> (Self, Self) {
                value.into()
            }
        }
    };
}

impl_has_wide!(U512, U1024);
impl_has_wide!(U1024, U2048);
impl_has_wide!(U2048, U4096);

pub(crate) type U512Mod = DynResidue<{ nlimbs!(512) }>;
pub(crate) type U1024Mod = DynResidue<{ nlimbs!(1024) }>;
pub(crate) type U2048Mod = DynResidue<{ nlimbs!(2048) }>;
pub(crate) type U4096Mod = DynResidue<{ nlimbs!(4096) }>;

#[cfg(test)]
mod tests {
    use crypto_bigint::{U1024, U256};
    use rand_core::OsRng;

    use super::{upcast_uint, FromScalar};
    use crate::curve::Scalar;

    #[test]
    fn upcast_pads_with_zeros() {
        let small = U256::from_u64(42);
        let big: U1024 = upcast_uint(small);
        assert_eq!(big, U1024::from_u64(42));
    }

    #[test]
    fn scalar_conversion_roundtrip() {
        let scalar = Scalar::random(&mut OsRng);
        let uint = U1024::from_scalar(&scalar);
        assert_eq!(uint.to_scalar(), scalar);
    }
}
