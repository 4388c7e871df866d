use core::ops::Mul;

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::keys::{PublicKeyPaillierPrecomputed, SecretKeyPaillierPrecomputed};
use super::params::PaillierParams;
use crate::errors::Error;
use crate::uint::{Bounded, Integer, Invert, Retrieve, Signed, UintLike, UintModLike};

/// The ring-Pedersen exponent $\lambda$ with $t = s^\lambda \mod N$.
pub(crate) struct RPSecret<P: PaillierParams>(Bounded<P::Uint>);

impl<P: PaillierParams> RPSecret<P> {
    pub fn random(rng: &mut impl CryptoRngCore, sk: &SecretKeyPaillierPrecomputed<P>) -> Self {
        Self(sk.random_field_elem(rng))
    }
}

impl<P: PaillierParams> AsRef<Bounded<P::Uint>> for RPSecret<P> {
    fn as_ref(&self) -> &Bounded<P::Uint> {
        &self.0
    }
}

/// Ring-Pedersen commitment parameters in the Montgomery representation.
#[derive(Debug, Clone)]
pub(crate) struct RPParamsMod<P: PaillierParams> {
    pub(crate) pk: PublicKeyPaillierPrecomputed<P>,
    /// The base for committed values, $s = r^2 \mod N$.
    pub(crate) s: P::UintMod,
    /// The base for randomizers, $t = s^\lambda \mod N$.
    pub(crate) t: P::UintMod,
}

impl<P: PaillierParams> RPParamsMod<P> {
    pub fn random(rng: &mut impl CryptoRngCore, sk: &SecretKeyPaillierPrecomputed<P>) -> Self {
        let secret = RPSecret::random(rng, sk);
        Self::random_with_secret(rng, &secret, sk.public_key())
    }

    pub fn random_with_secret(
        rng: &mut impl CryptoRngCore,
        secret: &RPSecret<P>,
        pk: &PublicKeyPaillierPrecomputed<P>,
    ) -> Self {
        let r = pk.random_invertible_group_elem(rng);

        let s = r.square();
        let t = s.pow_bounded(secret.as_ref());

        Self { pk: pk.clone(), s, t }
    }

    pub fn public_key(&self) -> &PublicKeyPaillierPrecomputed<P> {
        &self.pk
    }

    /// Creates a commitment `s^secret t^randomizer mod N`.
    ///
    /// Both exponents are effectively reduced modulo `totient(N)`
    /// (that is, commitments produced for `x` and `x + totient(N)` are equal).
    pub fn commit(
        &self,
        secret: &Signed<P::Uint>,
        randomizer: &Signed<P::WideUint>,
    ) -> RPCommitmentMod<P> {
        RPCommitmentMod(self.s.pow_signed(secret) * self.t.pow_signed_wide(randomizer))
    }

    /// Same as [`Self::commit`], but for a secret as wide as the randomizer.
    pub fn commit_wide(
        &self,
        secret: &Signed<P::WideUint>,
        randomizer: &Signed<P::WideUint>,
    ) -> RPCommitmentMod<P> {
        RPCommitmentMod(self.s.pow_signed_wide(secret) * self.t.pow_signed_wide(randomizer))
    }

    pub fn retrieve(&self) -> RPParams<P> {
        RPParams {
            s: self.s.retrieve(),
            t: self.t.retrieve(),
        }
    }
}

/// Ring-Pedersen parameters as they are transferred and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RPParams<P: PaillierParams> {
    /// The base for committed values, $s = r^2 \mod N$.
    pub(crate) s: P::Uint,
    /// The base for randomizers, $t = s^\lambda \mod N$.
    pub(crate) t: P::Uint,
}

impl<P: PaillierParams> RPParams<P> {
    pub fn to_mod(&self, pk: &PublicKeyPaillierPrecomputed<P>) -> RPParamsMod<P> {
        RPParamsMod {
            pk: pk.clone(),
            s: self.s.to_mod(pk.precomputed_modulus()),
            t: self.t.to_mod(pk.precomputed_modulus()),
        }
    }

    /// Checks that the parameters are well-formed with respect to the modulus:
    /// in range, distinct, and in the multiplicative group.
    pub fn validate(&self, pk: &PublicKeyPaillierPrecomputed<P>) -> Result<(), Error> {
        let one = P::Uint::ONE;
        for (name, value) in [("s", &self.s), ("t", &self.t)] {
            if value <= &one || value >= pk.modulus() {
                return Err(Error::ConfigInvalid(format!(
                    "Pedersen parameter {name} is out of range"
                )));
            }
            if bool::from(value.to_mod(pk.precomputed_modulus()).invert().is_none()) {
                return Err(Error::ConfigInvalid(format!(
                    "Pedersen parameter {name} is not invertible modulo N"
                )));
            }
        }
        if self.s == self.t {
            return Err(Error::ConfigInvalid("Pedersen parameters s and t coincide".into()));
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RPCommitmentMod<P: PaillierParams>(P::UintMod);

impl<P: PaillierParams> RPCommitmentMod<P> {
    pub fn retrieve(&self) -> RPCommitment<P> {
        RPCommitment(self.0.retrieve())
    }

    /// Returns true if the commitment is a unit modulo `N`.
    /// A commitment from the wire must be checked before it is raised
    /// to a possibly negative challenge.
    pub fn is_invertible(&self) -> bool {
        self.0.invert().is_some().into()
    }

    /// Raise to the power of `exponent`.
    ///
    /// `exponent` is effectively reduced modulo `totient(N)`.
    pub fn pow_signed_vartime(&self, exponent: &Signed<P::Uint>) -> Self {
        Self(self.0.pow_signed_vartime(exponent))
    }
}

impl<'a, P: PaillierParams> Mul<&'a RPCommitmentMod<P>> for &'a RPCommitmentMod<P> {
    type Output = RPCommitmentMod<P>;
    fn mul(self, rhs: &RPCommitmentMod<P>) -> Self::Output {
        RPCommitmentMod(self.0 * rhs.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RPCommitment<P: PaillierParams>(P::Uint);

impl<P: PaillierParams> RPCommitment<P> {
    pub fn to_mod(&self, pk: &PublicKeyPaillierPrecomputed<P>) -> RPCommitmentMod<P> {
        RPCommitmentMod(self.0.to_mod(pk.precomputed_modulus()))
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::RPParamsMod;
    use crate::paillier::{PaillierTest, SecretKeyPaillier};
    use crate::uint::Signed;

    #[test]
    fn commitments_are_homomorphic_in_the_exponents() {
        let sk = SecretKeyPaillier::<PaillierTest>::random(&mut OsRng).to_precomputed();
        let setup = RPParamsMod::random(&mut OsRng, &sk);

        let secret1 = Signed::random_bounded_bits(&mut OsRng, 256);
        let secret2 = Signed::random_bounded_bits(&mut OsRng, 256);
        let randomizer1 = Signed::random_bounded_bits(&mut OsRng, 256);
        let randomizer2 = Signed::random_bounded_bits(&mut OsRng, 256);

        let lhs = &setup.commit(&secret1, &randomizer1) * &setup.commit(&secret2, &randomizer2);
        let rhs = setup.commit(&(secret1 + secret2), &(randomizer1 + randomizer2));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn retrieved_parameters_validate() {
        let sk = SecretKeyPaillier::<PaillierTest>::random(&mut OsRng).to_precomputed();
        let setup = RPParamsMod::random(&mut OsRng, &sk).retrieve();
        setup.validate(sk.public_key()).unwrap();
    }
}
