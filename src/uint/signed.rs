use core::fmt;
use core::marker::PhantomData;
use core::ops::{Add, Mul, Neg, Not, Sub};

use digest::XofReader;
use rand_core::CryptoRngCore;
use serde::{de, ser::SerializeTupleStruct, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use super::{
    subtle::{Choice, ConditionallyNegatable, ConditionallySelectable, ConstantTimeEq, CtOption},
    CheckedAdd, CheckedMul, HasWide, Integer, NonZero, UintLike,
};

/// A wrapper over unsigned integers that treats two's complement numbers as negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signed<T: UintLike> {
    /// bound on the bit size of the absolute value
    bound: u32,
    value: T,
}

impl<T: UintLike> Signed<T> {
    pub fn bound(&self) -> usize {
        self.bound as usize
    }

    pub fn is_negative(&self) -> Choice {
        Choice::from(self.value.bit_vartime(<T as Integer>::BITS - 1) as u8)
    }

    pub fn abs(&self) -> T {
        T::conditional_select(&self.value, &self.value.neg(), self.is_negative())
    }

    /// Creates a signed value from an unsigned one,
    /// treating it as if the sign is encoded in the MSB.
    pub fn new_from_unsigned(value: T, bound: u32) -> Option<Self> {
        let result = Self { value, bound };
        if bound >= <T as Integer>::BITS as u32 || result.abs().bits_vartime() as u32 > bound {
            return None;
        }
        Some(result)
    }

    /// Creates a signed value from an unsigned one,
    /// treating it as if it is the absolute value.
    fn new_from_abs(abs_value: T, bound: usize, is_negative: Choice) -> Option<Self> {
        Self::new_positive(abs_value, bound).map(|x| {
            let mut x = x;
            x.conditional_negate(is_negative);
            x
        })
    }

    /// Creates a signed value from an unsigned one,
    /// assuming that it encodes a positive value.
    pub fn new_positive(value: T, bound: usize) -> Option<Self> {
        // Reserving one bit as the sign bit
        if bound >= <T as Integer>::BITS || value.bits_vartime() > bound {
            return None;
        }
        let result = Self {
            value,
            bound: bound as u32,
        };
        if result.is_negative().into() {
            return None;
        }
        Some(result)
    }

    /// Returns a random value in range `[-bound, bound]`.
    ///
    /// Note: variable time in bit size of `bound`.
    pub fn random_bounded(rng: &mut impl CryptoRngCore, bound: &NonZero<T>) -> Self {
        let bound_bits = bound.as_ref().bits_vartime();
        assert!(bound_bits < <T as Integer>::BITS);
        // Will not overflow because of the assertion above
        let positive_bound = bound
            .as_ref()
            .shl_vartime(1)
            .wrapping_add(&T::ONE);
        let positive_result = T::random_mod(
            rng,
            &NonZero::new(positive_bound).expect("the positive bound is nonzero by construction"),
        );
        // Will not panic because of the assertion above
        Self::new_from_unsigned(positive_result.wrapping_sub(bound.as_ref()), bound_bits as u32)
            .expect("the value fits the bound by construction")
    }

    /// Returns a value in range `[-bound, bound]` derived from an extendable hash output.
    ///
    /// Used for non-interactive challenges; same distribution as [`Self::random_bounded`].
    pub fn from_xof_reader_bounded(reader: &mut impl XofReader, bound: &NonZero<T>) -> Self {
        let bound_bits = bound.as_ref().bits_vartime();
        assert!(bound_bits < <T as Integer>::BITS);
        let positive_bound = bound
            .as_ref()
            .shl_vartime(1)
            .wrapping_add(&T::ONE);
        let positive_result = T::from_xof(
            reader,
            &NonZero::new(positive_bound).expect("the positive bound is nonzero by construction"),
        );
        Self::new_from_unsigned(positive_result.wrapping_sub(bound.as_ref()), bound_bits as u32)
            .expect("the value fits the bound by construction")
    }

    /// Returns a random value in range `[-2^bound_bits, 2^bound_bits]`.
    ///
    /// Note: variable time in `bound_bits`.
    pub fn random_bounded_bits(rng: &mut impl CryptoRngCore, bound_bits: usize) -> Self {
        assert!(bound_bits < <T as Integer>::BITS - 1);
        let bound = NonZero::new(T::ONE.shl_vartime(bound_bits))
            .expect("the bound is nonzero by construction");
        Self::random_bounded(rng, &bound)
    }

    /// Returns `true` if the value is within `[-2^bound_bits, 2^bound_bits]`.
    pub fn in_range_bits(&self, bound_bits: usize) -> bool {
        self.abs() <= T::ONE.shl_vartime(bound_bits + 1)
    }
}

impl<T: UintLike + HasWide> Signed<T> {
    /// Returns a random value in range `[-2^bound_bits * scale, 2^bound_bits * scale]`.
    ///
    /// Note: variable time in `bound_bits` and bit size of `scale`.
    pub fn random_bounded_bits_scaled(
        rng: &mut impl CryptoRngCore,
        bound_bits: usize,
        scale: &NonZero<T>,
    ) -> Signed<T::Wide> {
        assert!(bound_bits < <T as Integer>::BITS - 1);
        let bound = T::ONE.shl_vartime(bound_bits);
        let positive_bound = bound.shl_vartime(1).wrapping_add(&T::ONE);
        let positive_result = T::random_mod(
            rng,
            &NonZero::new(positive_bound).expect("the positive bound is nonzero by construction"),
        );

        let scaled_positive_result = positive_result.mul_wide(scale.as_ref());
        let scaled_bound = scale.as_ref().into_wide().shl_vartime(bound_bits);

        Signed {
            bound: (bound_bits + scale.as_ref().bits_vartime()) as u32,
            value: scaled_positive_result.wrapping_sub(&scaled_bound),
        }
    }

    pub fn into_wide(self) -> Signed<T::Wide> {
        let abs_result = self.abs().into_wide();
        Signed::new_from_abs(abs_result, self.bound(), self.is_negative())
            .expect("the value was within bounds in the narrower type")
    }
}

impl<T: UintLike> Default for Signed<T> {
    fn default() -> Self {
        Self {
            bound: 0,
            value: T::default(),
        }
    }
}

impl<T: UintLike> ConditionallySelectable for Signed<T> {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        Self {
            bound: u32::conditional_select(&a.bound, &b.bound, choice),
            value: T::conditional_select(&a.value, &b.value, choice),
        }
    }
}

impl<T: UintLike + Zeroize> Zeroize for Signed<T> {
    fn zeroize(&mut self) {
        self.value.zeroize();
        self.bound = 0;
    }
}

impl<T: UintLike> Neg for Signed<T> {
    type Output = Signed<T>;
    fn neg(self) -> Self::Output {
        Signed {
            bound: self.bound,
            value: self.value.neg(),
        }
    }
}

impl<T: UintLike> Neg for &Signed<T> {
    type Output = Signed<T>;
    fn neg(self) -> Self::Output {
        Signed {
            bound: self.bound,
            value: self.value.neg(),
        }
    }
}

impl<T: UintLike> CheckedAdd for Signed<T> {
    type Output = Self;
    fn checked_add(&self, rhs: Self) -> CtOption<Self> {
        let bound = core::cmp::max(self.bound, rhs.bound) + 1;
        let in_range = Choice::from((bound < <T as Integer>::BITS as u32) as u8);

        let result = Self {
            bound,
            value: self.value.wrapping_add(&rhs.value),
        };
        let lhs_neg = self.is_negative();
        let rhs_neg = rhs.is_negative();
        let res_neg = result.is_negative();

        // Cannot get overflow from adding values of different signs,
        // and if for two values of the same sign the sign of the result remains the same
        // it means there was no overflow.
        CtOption::new(
            result,
            in_range & !(lhs_neg.ct_eq(&rhs_neg) & !lhs_neg.ct_eq(&res_neg)),
        )
    }
}

impl<T: UintLike> CheckedMul for Signed<T> {
    type Output = Self;
    fn checked_mul(&self, rhs: Self) -> CtOption<Self> {
        let bound = self.bound + rhs.bound;
        let lhs_neg = self.is_negative();
        let rhs_neg = rhs.is_negative();
        let lhs = T::conditional_select(&self.value, &self.value.neg(), lhs_neg);
        let rhs_abs = T::conditional_select(&rhs.value, &rhs.value.neg(), rhs_neg);
        let result = lhs.checked_mul(&rhs_abs);
        let result_neg = lhs_neg ^ rhs_neg;
        result.and_then(|val| {
            let out_of_range = Choice::from((bound as usize >= <T as Integer>::BITS - 1) as u8);
            let signed_val = T::conditional_select(&val, &val.neg(), result_neg);
            CtOption::new(
                Self {
                    bound,
                    value: signed_val,
                },
                out_of_range.not(),
            )
        })
    }
}

impl<T: UintLike> Add<Signed<T>> for Signed<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        self.checked_add(rhs)
            .expect("the accumulated bound fits the integer type")
    }
}

impl<T: UintLike> Sub<Signed<T>> for Signed<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self.checked_add(-rhs)
            .expect("the accumulated bound fits the integer type")
    }
}

impl<T: UintLike> Mul<Signed<T>> for Signed<T> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.checked_mul(rhs)
            .expect("the accumulated bound fits the integer type")
    }
}

impl<T: UintLike> core::iter::Sum for Signed<T> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.reduce(|x, y| x + y).unwrap_or_default()
    }
}

impl<'de, T: UintLike + Deserialize<'de>> Deserialize<'de> for Signed<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SignedVisitor<T: UintLike>(PhantomData<T>);

        impl<'de, T: UintLike + Deserialize<'de>> de::Visitor<'de> for SignedVisitor<T> {
            type Value = Signed<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a tuple struct Signed")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Signed<T>, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let bound: u32 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let value: T = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;

                Signed::new_from_unsigned(value, bound)
                    .ok_or_else(|| de::Error::custom("The integer is over the declared bound"))
            }
        }

        deserializer.deserialize_tuple_struct("Signed", 2, SignedVisitor::<T>(PhantomData))
    }
}

impl<T: UintLike + Serialize> Serialize for Signed<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ts = serializer.serialize_tuple_struct("Signed", 2)?;
        ts.serialize_field(&self.bound)?;
        ts.serialize_field(&self.value)?;
        ts.end()
    }
}
