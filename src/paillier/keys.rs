use rand_core::{CryptoRngCore, OsRng};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::params::PaillierParams;
use crate::errors::Error;
use crate::uint::{
    Bounded, CheckedSub, HasWide, Integer, Invert, NonZero, RandomMod, RandomPrimeWithRng,
    UintLike, UintModLike,
};

/// Checks that a number can serve as a Paillier prime for this protocol:
/// correct size, `3 mod 4`, and a safe prime.
pub(crate) fn validate_paillier_prime<P: PaillierParams>(p: &P::HalfUint) -> Result<(), Error> {
    if p.bits_vartime() != P::PRIME_BITS {
        return Err(Error::ConfigInvalid(format!(
            "Paillier prime has {} bits, expected {}",
            p.bits_vartime(),
            P::PRIME_BITS
        )));
    }
    if !(p.bit_vartime(0) && p.bit_vartime(1)) {
        return Err(Error::ConfigInvalid("Paillier prime is not 3 mod 4".into()));
    }
    if !p.is_safe_prime_with_rng(&mut OsRng) {
        return Err(Error::ConfigInvalid("Paillier prime is not a safe prime".into()));
    }
    Ok(())
}

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct SecretKeyPaillier<P: PaillierParams> {
    p: P::HalfUint,
    q: P::HalfUint,
}

impl<P: PaillierParams> Zeroize for SecretKeyPaillier<P> {
    fn zeroize(&mut self) {
        self.p.zeroize();
        self.q.zeroize();
    }
}

impl<P: PaillierParams> SecretKeyPaillier<P> {
    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        let p = P::HalfUint::safe_prime_with_rng(rng, P::PRIME_BITS);
        let q = P::HalfUint::safe_prime_with_rng(rng, P::PRIME_BITS);

        Self { p, q }
    }

    /// Reassembles the key from stored primes, validating their form.
    pub fn from_primes(p: P::HalfUint, q: P::HalfUint) -> Result<Self, Error> {
        validate_paillier_prime::<P>(&p)?;
        validate_paillier_prime::<P>(&q)?;
        Ok(Self { p, q })
    }

    pub fn primes(&self) -> (P::HalfUint, P::HalfUint) {
        (self.p, self.q)
    }

    pub fn to_precomputed(&self) -> SecretKeyPaillierPrecomputed<P> {
        // Euler's totient function of $p q$ - the number of positive integers up to $p q$
        // that are relatively prime to it.
        // Since $p$ and $q$ are primes, $\phi(p q) = (p - 1) (q - 1)$.
        let one = P::HalfUint::ONE;
        let p_minus_one = self
            .p
            .checked_sub(&one)
            .expect("a prime is greater than one");
        let q_minus_one = self
            .q
            .checked_sub(&one)
            .expect("a prime is greater than one");
        let totient = Bounded::new(p_minus_one.mul_wide(&q_minus_one), P::MODULUS_BITS as u32)
            .expect("the totient fits the modulus size");

        let public_key = PublicKeyPaillier {
            modulus: self.p.mul_wide(&self.q),
        }
        .to_precomputed();

        let inv_totient = totient
            .as_ref()
            .to_mod(public_key.precomputed_modulus())
            .invert()
            .expect("the totient is invertible since N is coprime with it");

        SecretKeyPaillierPrecomputed {
            totient,
            inv_totient,
            public_key,
        }
    }
}

impl<P: PaillierParams> core::fmt::Debug for SecretKeyPaillier<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SecretKeyPaillier {{ <...> }}")
    }
}

#[derive(Clone)]
pub(crate) struct SecretKeyPaillierPrecomputed<P: PaillierParams> {
    totient: Bounded<P::Uint>,
    /// $\phi(N)^{-1} \mod N$
    inv_totient: P::UintMod,
    public_key: PublicKeyPaillierPrecomputed<P>,
}

impl<P: PaillierParams> SecretKeyPaillierPrecomputed<P> {
    pub fn totient(&self) -> &Bounded<P::Uint> {
        &self.totient
    }

    pub fn totient_nonzero(&self) -> NonZero<P::Uint> {
        NonZero::new(*self.totient.as_ref()).expect("the totient of a valid modulus is non-zero")
    }

    /// Returns $\phi(N)^{-1} \mod N$.
    pub fn inv_totient(&self) -> &P::UintMod {
        &self.inv_totient
    }

    pub fn public_key(&self) -> &PublicKeyPaillierPrecomputed<P> {
        &self.public_key
    }

    /// A uniformly random value modulo the totient, used as a ring-Pedersen exponent.
    pub fn random_field_elem(&self, rng: &mut impl CryptoRngCore) -> Bounded<P::Uint> {
        Bounded::new(
            P::Uint::random_mod(rng, &self.totient_nonzero()),
            P::MODULUS_BITS as u32,
        )
        .expect("the sampled value is below the totient")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PublicKeyPaillier<P: PaillierParams> {
    modulus: P::Uint, // $N$
}

impl<P: PaillierParams> PublicKeyPaillier<P> {
    pub fn modulus(&self) -> &P::Uint {
        &self.modulus
    }

    pub fn to_precomputed(&self) -> PublicKeyPaillierPrecomputed<P> {
        let modulus_nonzero =
            NonZero::new(self.modulus).expect("a Paillier modulus is never zero");
        let precomputed_modulus = P::UintMod::new_precomputed(&modulus_nonzero);
        let precomputed_modulus_squared = P::WideUintMod::new_precomputed(
            &NonZero::new(self.modulus.square_wide()).expect("a squared modulus is never zero"),
        );
        PublicKeyPaillierPrecomputed {
            pk: *self,
            precomputed_modulus,
            precomputed_modulus_squared,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PublicKeyPaillierPrecomputed<P: PaillierParams> {
    pk: PublicKeyPaillier<P>,
    precomputed_modulus: <P::UintMod as UintModLike>::Precomputed,
    precomputed_modulus_squared: <P::WideUintMod as UintModLike>::Precomputed,
}

impl<P: PaillierParams> PublicKeyPaillierPrecomputed<P> {
    pub fn to_minimal(&self) -> PublicKeyPaillier<P> {
        self.pk
    }

    pub fn modulus(&self) -> &P::Uint {
        self.pk.modulus()
    }

    pub fn modulus_nonzero(&self) -> NonZero<P::Uint> {
        NonZero::new(*self.modulus()).expect("a Paillier modulus is never zero")
    }

    /// Returns precomputed parameters for integers modulo N.
    pub fn precomputed_modulus(&self) -> &<P::UintMod as UintModLike>::Precomputed {
        &self.precomputed_modulus
    }

    /// Returns precomputed parameters for integers modulo N^2.
    pub fn precomputed_modulus_squared(&self) -> &<P::WideUintMod as UintModLike>::Precomputed {
        &self.precomputed_modulus_squared
    }

    pub fn random_invertible_group_elem(&self, rng: &mut impl CryptoRngCore) -> P::UintMod {
        // Almost certainly succeeds on the first iteration for a valid modulus.
        loop {
            let r = P::Uint::random_mod(rng, &self.modulus_nonzero());
            let r_m = r.to_mod(self.precomputed_modulus());
            if r_m.invert().is_some().into() {
                return r_m;
            }
        }
    }
}
