use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::keys::{PublicKeyPaillierPrecomputed, SecretKeyPaillierPrecomputed};
use super::params::PaillierParams;
use crate::uint::{
    subtle::Choice, CheckedSub, HasWide, Integer, Invert, NonZero, PowBoundedExp, Retrieve, Signed,
    UintLike, UintModLike,
};

/// Paillier ciphertext, an element of $\mathbb{Z}_{N^2}$.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Ciphertext<P: PaillierParams> {
    ciphertext: P::WideUint,
}

impl<P: PaillierParams> Ciphertext<P> {
    /// Creates a suitable randomizer for encryption.
    pub(crate) fn randomizer(
        rng: &mut impl CryptoRngCore,
        pk: &PublicKeyPaillierPrecomputed<P>,
    ) -> P::Uint {
        pk.random_invertible_group_elem(rng).retrieve()
    }

    /// Encrypts the absolute value of the plaintext with the provided randomizer,
    /// negating the result in the group when the plaintext is negative.
    fn new_with_randomizer_inner(
        pk: &PublicKeyPaillierPrecomputed<P>,
        abs_plaintext: &P::Uint,
        randomizer: &P::Uint,
        plaintext_is_negative: Choice,
    ) -> Self {
        // Calculate the ciphertext `C = (N + 1)^m * rho^N mod N^2`
        // where `N` is the Paillier composite modulus, `m` is the plaintext,
        // and `rho` is the randomizer.

        // Simplify `(N + 1)^m mod N^2 == 1 + m * N mod N^2`.
        // Since `m` can be negative, we calculate `m * N +- 1` (never overflows since `m < N`),
        // then conditionally negate modulo N^2.
        let prod = abs_plaintext.mul_wide(pk.modulus());
        let mut prod_mod = prod.to_mod(pk.precomputed_modulus_squared());
        if plaintext_is_negative.into() {
            prod_mod = -prod_mod;
        }

        let factor1 = prod_mod + P::WideUintMod::one(pk.precomputed_modulus_squared());

        let randomizer_wide = randomizer.into_wide();
        let modulus_wide = pk.modulus().into_wide();
        let factor2 = randomizer_wide
            .to_mod(pk.precomputed_modulus_squared())
            .pow_bounded_exp(&modulus_wide, P::MODULUS_BITS);

        let ciphertext = (factor1 * factor2).retrieve();

        Self { ciphertext }
    }

    /// Encrypts the plaintext with the provided randomizer.
    pub fn new_with_randomizer(
        pk: &PublicKeyPaillierPrecomputed<P>,
        plaintext: &P::Uint,
        randomizer: &P::Uint,
    ) -> Self {
        Self::new_with_randomizer_inner(pk, plaintext, randomizer, Choice::from(0))
    }

    pub fn new_with_randomizer_signed(
        pk: &PublicKeyPaillierPrecomputed<P>,
        plaintext: &Signed<P::Uint>,
        randomizer: &P::Uint,
    ) -> Self {
        Self::new_with_randomizer_inner(pk, &plaintext.abs(), randomizer, plaintext.is_negative())
    }

    /// Encrypts the plaintext with a fresh random randomizer.
    #[cfg(test)]
    pub fn new(
        rng: &mut impl CryptoRngCore,
        pk: &PublicKeyPaillierPrecomputed<P>,
        plaintext: &P::Uint,
    ) -> Self {
        let randomizer = Self::randomizer(rng, pk);
        Self::new_with_randomizer(pk, plaintext, &randomizer)
    }

    /// Returns true if the ciphertext is a unit modulo `N^2`.
    ///
    /// Honest ciphertexts always are; a non-unit from the wire would
    /// otherwise break the homomorphic exponentiations with negative
    /// exponents used during proof verification.
    pub fn is_invertible(&self, pk: &PublicKeyPaillierPrecomputed<P>) -> bool {
        self.ciphertext
            .to_mod(pk.precomputed_modulus_squared())
            .invert()
            .is_some()
            .into()
    }

    /// Decrypts this ciphertext to a residue in `[0, N)`.
    pub fn decrypt(&self, sk: &SecretKeyPaillierPrecomputed<P>) -> P::Uint {
        let pk = sk.public_key();
        let totient_wide = sk.totient().as_ref().into_wide();
        let modulus_wide =
            NonZero::new(pk.modulus().into_wide()).expect("a Paillier modulus is never zero");

        // Calculate the plaintext `m = ((C^phi mod N^2 - 1) / N) * mu mod N`,
        // where `phi` is the Euler totient of `N`, and `mu = phi^(-1) mod N`.
        let x = P::Uint::try_from_wide(
            (self
                .ciphertext
                .to_mod(pk.precomputed_modulus_squared())
                .pow_bounded_exp(&totient_wide, P::MODULUS_BITS)
                .retrieve()
                .checked_sub(&P::WideUint::ONE)
                .expect("C^phi is nonzero modulo N^2"))
                / modulus_wide,
        )
        .expect("the quotient is within [0, N)");

        (x.to_mod(pk.precomputed_modulus()) * *sk.inv_totient()).retrieve()
    }

    /// Decrypts this ciphertext into the centered representative of the plaintext,
    /// mapping residues above `N/2` to negative values.
    pub fn decrypt_signed(&self, sk: &SecretKeyPaillierPrecomputed<P>) -> Signed<P::Uint> {
        let pk = sk.public_key();
        let positive = self.decrypt(sk);

        let half_modulus = pk.modulus().shr_vartime(1);
        let negative = positive.wrapping_sub(pk.modulus());
        let value = if positive > half_modulus { negative } else { positive };

        Signed::new_from_unsigned(value, (P::MODULUS_BITS - 1) as u32)
            .expect("the centered representative is within +-N/2")
    }

    fn homomorphic_mul_inner(
        &self,
        pk: &PublicKeyPaillierPrecomputed<P>,
        abs_rhs: &P::Uint,
        is_negative: Choice,
    ) -> Self {
        let mut ciphertext_mod = self.ciphertext.to_mod(pk.precomputed_modulus_squared());

        if is_negative.into() {
            // Will not panic as long as the randomizer was chosen to be invertible.
            ciphertext_mod = ciphertext_mod
                .invert()
                .expect("the ciphertext is invertible modulo N^2");
        }

        let rhs_wide = abs_rhs.into_wide();
        let ciphertext = ciphertext_mod
            .pow_bounded_exp(&rhs_wide, <P::Uint as Integer>::BITS)
            .retrieve();
        Self { ciphertext }
    }

    /// The homomorphic scalar multiplication `enc(m) -> enc(m * rhs mod N)`.
    pub fn homomorphic_mul(&self, pk: &PublicKeyPaillierPrecomputed<P>, rhs: &Signed<P::Uint>) -> Self {
        self.homomorphic_mul_inner(pk, &rhs.abs(), rhs.is_negative())
    }

    /// The homomorphic addition `enc(m1) (+) enc(m2) -> enc(m1 + m2 mod N)`.
    pub fn homomorphic_add(&self, pk: &PublicKeyPaillierPrecomputed<P>, rhs: &Self) -> Self {
        let lhs_mod = self.ciphertext.to_mod(pk.precomputed_modulus_squared());
        let rhs_mod = rhs.ciphertext.to_mod(pk.precomputed_modulus_squared());
        Self {
            ciphertext: (lhs_mod * rhs_mod).retrieve(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::Ciphertext;
    use crate::paillier::{PaillierParams, PaillierTest, SecretKeyPaillier};
    use crate::uint::{FromScalar, HasWide, NonZero, RandomMod, Signed, UintLike};

    type Uint = <PaillierTest as PaillierParams>::Uint;

    fn mul_mod(lhs: &Uint, rhs: &Uint, modulus: &NonZero<Uint>) -> Uint {
        // Note that the modulus may be even, so we can't use the Montgomery representation here.
        let wide_product = HasWide::mul_wide(lhs, rhs);
        let wide_modulus = modulus.as_ref().into_wide();
        Uint::try_from_wide(
            wide_product % NonZero::new(wide_modulus).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn roundtrip() {
        let sk = SecretKeyPaillier::<PaillierTest>::random(&mut OsRng).to_precomputed();
        let pk = sk.public_key();
        let plaintext = Uint::random_mod(&mut OsRng, &pk.modulus_nonzero());
        let ciphertext = Ciphertext::new(&mut OsRng, pk, &plaintext);
        assert_eq!(ciphertext.decrypt(&sk), plaintext);
    }

    #[test]
    fn signed_roundtrip_is_centered() {
        let sk = SecretKeyPaillier::<PaillierTest>::random(&mut OsRng).to_precomputed();
        let pk = sk.public_key();

        let plaintext = Signed::random_bounded_bits(&mut OsRng, 300);
        let randomizer = Ciphertext::randomizer(&mut OsRng, pk);
        let ciphertext = Ciphertext::new_with_randomizer_signed(pk, &plaintext, &randomizer);

        assert_eq!(ciphertext.decrypt_signed(&sk), plaintext);
    }

    #[test]
    fn homomorphic_add() {
        let sk = SecretKeyPaillier::<PaillierTest>::random(&mut OsRng).to_precomputed();
        let pk = sk.public_key();

        let plaintext1 = Uint::random_mod(&mut OsRng, &pk.modulus_nonzero());
        let plaintext2 = Uint::random_mod(&mut OsRng, &pk.modulus_nonzero());

        let ciphertext1 = Ciphertext::new(&mut OsRng, pk, &plaintext1);
        let ciphertext2 = Ciphertext::new(&mut OsRng, pk, &plaintext2);

        let sum = ciphertext1.homomorphic_add(pk, &ciphertext2);
        assert_eq!(sum.decrypt(&sk), plaintext1.add_mod(&plaintext2, &pk.modulus_nonzero()));
    }

    #[test]
    fn affine_transform() {
        let sk = SecretKeyPaillier::<PaillierTest>::random(&mut OsRng).to_precomputed();
        let pk = sk.public_key();

        let plaintext1 = Uint::random_mod(&mut OsRng, &pk.modulus_nonzero());
        let coeff_scalar = crate::curve::Scalar::random(&mut OsRng);
        let coeff = Signed::<Uint>::from_scalar(&coeff_scalar);
        let plaintext3 = Uint::random_mod(&mut OsRng, &pk.modulus_nonzero());

        let ciphertext1 = Ciphertext::new(&mut OsRng, pk, &plaintext1);
        let ciphertext3 = Ciphertext::new(&mut OsRng, pk, &plaintext3);
        let result = ciphertext1
            .homomorphic_mul(pk, &coeff)
            .homomorphic_add(pk, &ciphertext3);

        let expected = mul_mod(&plaintext1, &coeff.abs(), &pk.modulus_nonzero())
            .add_mod(&plaintext3, &pk.modulus_nonzero());
        assert_eq!(result.decrypt(&sk), expected);
    }
}
