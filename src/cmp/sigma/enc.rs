//! Paillier encryption in range ($\Pi^{enc}$, Section 6.1, Fig. 14)

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::super::params::SchemeParams;
use crate::paillier::{
    Ciphertext, PaillierParams, PublicKeyPaillierPrecomputed, RPCommitment, RPParamsMod,
};
use crate::tools::hashing::{Chain, Hashable, XofHasher};
use crate::uint::{NonZero, Retrieve, Signed, UintLike, UintModLike};

const HASH_TAG: &[u8] = b"P_enc";

/// Proves that the plaintext of a Paillier ciphertext lies in a tight range,
/// against the verifier-supplied ring-Pedersen parameters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "Ciphertext<P::Paillier>: Serialize,
    RPCommitment<P::Paillier>: Serialize"))]
#[serde(bound(deserialize = "Ciphertext<P::Paillier>: for<'x> Deserialize<'x>,
    RPCommitment<P::Paillier>: for<'x> Deserialize<'x>"))]
pub(crate) struct EncProof<P: SchemeParams> {
    cap_s: RPCommitment<P::Paillier>,
    cap_a: Ciphertext<P::Paillier>,
    cap_c: RPCommitment<P::Paillier>,
    z1: Signed<<P::Paillier as PaillierParams>::Uint>,
    z2: <P::Paillier as PaillierParams>::Uint,
    z3: Signed<<P::Paillier as PaillierParams>::WideUint>,
}

impl<P: SchemeParams> EncProof<P> {
    pub fn new(
        rng: &mut impl CryptoRngCore,
        secret: &Signed<<P::Paillier as PaillierParams>::Uint>, // $k$
        randomizer: &<P::Paillier as PaillierParams>::Uint,     // $\rho$
        pk: &PublicKeyPaillierPrecomputed<P::Paillier>,         // $N_0$
        aux_rp: &RPParamsMod<P::Paillier>,                      // $\hat{N}$, $s$, $t$
        aux: &impl Hashable,
    ) -> Self {
        let mut reader = XofHasher::new_with_dst(HASH_TAG).chain(aux).finalize_to_reader();

        // Non-interactive challenge ($e$)
        let challenge = Signed::from_xof_reader_bounded(
            &mut reader,
            &NonZero::new(P::CURVE_ORDER).expect("the curve order is non-zero"),
        );

        let hat_cap_n = &aux_rp.public_key().modulus_nonzero(); // $\hat{N}$

        // \alpha <-- +- 2^{\ell + \eps}
        let alpha = Signed::random_bounded_bits(rng, P::L_BOUND + P::EPS_BOUND);

        // \mu <-- (+- 2^\ell) * \hat{N}
        let mu = Signed::random_bounded_bits_scaled(rng, P::L_BOUND, hat_cap_n);

        // r <-- Z^*_N (N is the modulus of `pk`)
        let r = pk.random_invertible_group_elem(rng);

        // \gamma <-- (+- 2^{\ell + \eps}) * \hat{N}
        let gamma = Signed::random_bounded_bits_scaled(rng, P::L_BOUND + P::EPS_BOUND, hat_cap_n);

        // S = s^k t^\mu \mod \hat{N}
        let cap_s = aux_rp.commit(secret, &mu).retrieve();

        // A = (1 + N_0)^\alpha r^{N_0} == encrypt(\alpha, r)
        let cap_a = Ciphertext::new_with_randomizer_signed(pk, &alpha, &r.retrieve());

        // C = s^\alpha t^\gamma \mod \hat{N}
        let cap_c = aux_rp.commit(&alpha, &gamma).retrieve();

        // z_1 = \alpha + e k
        // The verifier checks that $z1 \in +- 2^{\ell + \eps}$, so it fits the `Uint`.
        let z1 = alpha + challenge * *secret;

        // z_2 = r \rho^e mod N_0
        let rho = randomizer.to_mod(pk.precomputed_modulus());
        let z2 = (r * rho.pow_signed_vartime(&challenge)).retrieve();

        // z_3 = \gamma + e \mu
        let z3 = gamma + mu * challenge.into_wide();

        Self {
            cap_s,
            cap_a,
            cap_c,
            z1,
            z2,
            z3,
        }
    }

    pub fn verify(
        &self,
        pk: &PublicKeyPaillierPrecomputed<P::Paillier>, // $N_0$
        ciphertext: &Ciphertext<P::Paillier>,           // $K$
        aux_rp: &RPParamsMod<P::Paillier>,              // $\hat{N}$, $s$, $t$
        aux: &impl Hashable,
    ) -> bool {
        let mut reader = XofHasher::new_with_dst(HASH_TAG).chain(aux).finalize_to_reader();

        // Non-interactive challenge ($e$)
        let challenge = Signed::from_xof_reader_bounded(
            &mut reader,
            &NonZero::new(P::CURVE_ORDER).expect("the curve order is non-zero"),
        );

        // Range check: z_1 \in +- 2^{\ell + \eps}
        if !self.z1.in_range_bits(P::L_BOUND + P::EPS_BOUND) {
            return false;
        }

        // The ciphertext and the commitment get raised to the (possibly
        // negative) challenge below; reject non-units outright.
        if !ciphertext.is_invertible(pk) {
            return false;
        }
        let cap_s_mod = self.cap_s.to_mod(aux_rp.public_key());
        if !cap_s_mod.is_invertible() {
            return false;
        }

        // encrypt_{N_0}(z1, z2) == A (+) K (*) e
        let c = Ciphertext::new_with_randomizer_signed(pk, &self.z1, &self.z2);
        if c != self
            .cap_a
            .homomorphic_add(pk, &ciphertext.homomorphic_mul(pk, &challenge))
        {
            return false;
        }

        // s^{z_1} t^{z_3} == C S^e \mod \hat{N}
        let cap_c_mod = self.cap_c.to_mod(aux_rp.public_key());
        if aux_rp.commit(&self.z1, &self.z3) != &cap_c_mod * &cap_s_mod.pow_signed_vartime(&challenge) {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::EncProof;
    use crate::cmp::{SchemeParams, TestParams};
    use crate::paillier::{Ciphertext, RPParamsMod, SecretKeyPaillier};
    use crate::uint::Signed;

    #[test]
    fn prove_and_verify() {
        type Params = TestParams;
        type Paillier = <Params as SchemeParams>::Paillier;

        let sk = SecretKeyPaillier::<Paillier>::random(&mut OsRng).to_precomputed();
        let pk = sk.public_key();

        let aux_sk = SecretKeyPaillier::<Paillier>::random(&mut OsRng).to_precomputed();
        let aux_rp = RPParamsMod::random(&mut OsRng, &aux_sk);

        let aux: &[u8] = b"abcde";

        let secret = Signed::random_bounded_bits(&mut OsRng, Params::L_BOUND);
        let randomizer = Ciphertext::<Paillier>::randomizer(&mut OsRng, pk);
        let ciphertext = Ciphertext::new_with_randomizer_signed(pk, &secret, &randomizer);

        let proof = EncProof::<Params>::new(&mut OsRng, &secret, &randomizer, pk, &aux_rp, &aux);
        assert!(proof.verify(pk, &ciphertext, &aux_rp, &aux));
    }

    #[test]
    fn wrong_statement_fails() {
        type Params = TestParams;
        type Paillier = <Params as SchemeParams>::Paillier;

        let sk = SecretKeyPaillier::<Paillier>::random(&mut OsRng).to_precomputed();
        let pk = sk.public_key();

        let aux_sk = SecretKeyPaillier::<Paillier>::random(&mut OsRng).to_precomputed();
        let aux_rp = RPParamsMod::random(&mut OsRng, &aux_sk);

        let secret = Signed::random_bounded_bits(&mut OsRng, Params::L_BOUND);
        let randomizer = Ciphertext::<Paillier>::randomizer(&mut OsRng, pk);
        let ciphertext = Ciphertext::new_with_randomizer_signed(pk, &secret, &randomizer);

        let proof =
            EncProof::<Params>::new(&mut OsRng, &secret, &randomizer, pk, &aux_rp, &b"abcde".as_slice());

        // A different transcript binding changes the challenge.
        assert!(!proof.verify(pk, &ciphertext, &aux_rp, &b"edcba".as_slice()));

        // A different ciphertext does not match the proof.
        let other = Ciphertext::new_with_randomizer_signed(
            pk,
            &Signed::random_bounded_bits(&mut OsRng, Params::L_BOUND),
            &randomizer,
        );
        assert!(!proof.verify(pk, &other, &aux_rp, &b"abcde".as_slice()));
    }
}
