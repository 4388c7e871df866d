//! Paillier Affine Operation with Group Commitment in Range ($\Pi^{aff-g}$, Section 6.2, Fig. 15)

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::super::params::SchemeParams;
use crate::curve::Point;
use crate::paillier::{
    Ciphertext, PaillierParams, PublicKeyPaillierPrecomputed, RPCommitment, RPParamsMod,
};
use crate::tools::hashing::{Chain, Hashable, XofHasher};
use crate::uint::{FromScalar, NonZero, Retrieve, Signed, UintLike, UintModLike};

const HASH_TAG: &[u8] = b"P_aff_g";

/// Authenticates the homomorphic affine operation of the MtA conversion.
///
/// Note a deviation from the paper: the proof assumes
/// $D = C (*) x (+) enc_0(y, \rho)$, but the way the conversion uses it,
/// $D$ is actually $C (*) x (+) enc_0(-y, \rho)$, so several variables
/// are negated when constructing and verifying the proof.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "Ciphertext<P::Paillier>: Serialize,
    RPCommitment<P::Paillier>: Serialize"))]
#[serde(bound(deserialize = "Ciphertext<P::Paillier>: for<'x> Deserialize<'x>,
    RPCommitment<P::Paillier>: for<'x> Deserialize<'x>"))]
pub(crate) struct AffGProof<P: SchemeParams> {
    cap_a: Ciphertext<P::Paillier>,   // $A$
    cap_b_x: Point,                   // $B_x$
    cap_b_y: Ciphertext<P::Paillier>, // $B_y$
    cap_e: RPCommitment<P::Paillier>, // $E$
    cap_s: RPCommitment<P::Paillier>, // $S$
    cap_f: RPCommitment<P::Paillier>, // $F$
    cap_t: RPCommitment<P::Paillier>, // $T$
    z1: Signed<<P::Paillier as PaillierParams>::Uint>,
    z2: Signed<<P::Paillier as PaillierParams>::Uint>,
    z3: Signed<<P::Paillier as PaillierParams>::WideUint>,
    z4: Signed<<P::Paillier as PaillierParams>::WideUint>,
    omega: <P::Paillier as PaillierParams>::Uint,
    omega_y: <P::Paillier as PaillierParams>::Uint,
}

impl<P: SchemeParams> AffGProof<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rng: &mut impl CryptoRngCore,
        x: &Signed<<P::Paillier as PaillierParams>::Uint>, // $x \in +- 2^\ell$
        y: &Signed<<P::Paillier as PaillierParams>::Uint>, // $y \in +- 2^{\ell^\prime}$
        rho: &<P::Paillier as PaillierParams>::Uint,       // randomizer of $D$ over $N_0$
        rho_y: &<P::Paillier as PaillierParams>::Uint,     // randomizer of $Y$ over $N_1$
        pk0: &PublicKeyPaillierPrecomputed<P::Paillier>,   // $N_0$
        pk1: &PublicKeyPaillierPrecomputed<P::Paillier>,   // $N_1$
        cap_c: &Ciphertext<P::Paillier>,                   // encrypted with $N_0$
        aux_rp: &RPParamsMod<P::Paillier>,                 // $\hat{N}$, $s$, $t$
        aux: &impl Hashable,
    ) -> Self {
        let mut reader = XofHasher::new_with_dst(HASH_TAG).chain(aux).finalize_to_reader();

        // Non-interactive challenge ($e$)
        let challenge = Signed::from_xof_reader_bounded(
            &mut reader,
            &NonZero::new(P::CURVE_ORDER).expect("the curve order is non-zero"),
        );
        let challenge_wide: Signed<<P::Paillier as PaillierParams>::WideUint> =
            challenge.into_wide();

        let hat_cap_n = &aux_rp.public_key().modulus_nonzero(); // $\hat{N}$

        // \alpha <-- +- 2^{\ell + \eps}
        let alpha = Signed::random_bounded_bits(rng, P::L_BOUND + P::EPS_BOUND);
        // \beta <-- +- 2^{\ell^\prime + \eps}
        let beta = Signed::random_bounded_bits(rng, P::LP_BOUND + P::EPS_BOUND);

        // r <-- Z^*_{N_0}
        let r = pk0.random_invertible_group_elem(rng);
        // r_y <-- Z^*_{N_1}
        let r_y = pk1.random_invertible_group_elem(rng);

        // \gamma <-- (+- 2^{\ell + \eps}) \hat{N}
        let gamma = Signed::random_bounded_bits_scaled(rng, P::L_BOUND + P::EPS_BOUND, hat_cap_n);
        // m <-- (+- 2^\ell) \hat{N}
        let m = Signed::random_bounded_bits_scaled(rng, P::L_BOUND, hat_cap_n);
        // \delta <-- (+- 2^{\ell + \eps}) \hat{N}
        let delta = Signed::random_bounded_bits_scaled(rng, P::L_BOUND + P::EPS_BOUND, hat_cap_n);
        // \mu <-- (+- 2^\ell) \hat{N}
        let mu = Signed::random_bounded_bits_scaled(rng, P::L_BOUND, hat_cap_n);

        // A = C^\alpha (1 + N_0)^\beta r^{N_0} == C (*) \alpha (+) encrypt_0(\beta, r)
        let cap_a = cap_c.homomorphic_mul(pk0, &alpha).homomorphic_add(
            pk0,
            &Ciphertext::new_with_randomizer_signed(pk0, &beta, &r.retrieve()),
        );

        // B_x = g^\alpha
        let cap_b_x = alpha.to_scalar().mul_by_generator();
        // B_y = encrypt_1(\beta, r_y)
        let cap_b_y = Ciphertext::new_with_randomizer_signed(pk1, &beta, &r_y.retrieve());

        // E = s^\alpha t^\gamma \mod \hat{N}
        let cap_e = aux_rp.commit(&alpha, &gamma).retrieve();
        // S = s^x t^m \mod \hat{N}
        let cap_s = aux_rp.commit(x, &m).retrieve();
        // F = s^\beta t^\delta \mod \hat{N}
        let cap_f = aux_rp.commit(&beta, &delta).retrieve();

        // Original: `s^y`. Modified: `s^{-y}`.
        // T = s^{-y} t^\mu \mod \hat{N}
        let cap_t = aux_rp.commit(&(-y), &mu).retrieve();

        // z_1 = \alpha + e x
        let z1 = alpha + challenge * *x;

        // Original: z_2 = \beta + e y. Modified: z_2 = \beta - e y.
        let z2 = beta + challenge * (-y);

        // z_3 = \gamma + e m
        let z3 = gamma + challenge_wide * m;
        // z_4 = \delta + e \mu
        let z4 = delta + challenge_wide * mu;

        // \omega = r \rho^e \mod N_0
        let rho_mod = rho.to_mod(pk0.precomputed_modulus());
        let omega = (r * rho_mod.pow_signed_vartime(&challenge)).retrieve();

        // Original: `\rho_y^e`. Modified: `\rho_y^{-e}`.
        // \omega_y = r_y \rho_y^{-e} \mod N_1
        let rho_y_mod = rho_y.to_mod(pk1.precomputed_modulus());
        let omega_y = (r_y * rho_y_mod.pow_signed_vartime(&-challenge)).retrieve();

        Self {
            cap_a,
            cap_b_x,
            cap_b_y,
            cap_e,
            cap_s,
            cap_f,
            cap_t,
            z1,
            z2,
            z3,
            z4,
            omega,
            omega_y,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn verify(
        &self,
        pk0: &PublicKeyPaillierPrecomputed<P::Paillier>, // $N_0$
        pk1: &PublicKeyPaillierPrecomputed<P::Paillier>, // $N_1$
        cap_c: &Ciphertext<P::Paillier>,                 // encrypted with $N_0$
        cap_d: &Ciphertext<P::Paillier>,                 // $D = C (*) x (+) enc_0(-y, \rho)$
        cap_y: &Ciphertext<P::Paillier>,                 // $Y = enc_1(y, \rho_y)$
        cap_x: &Point,                                   // $X = g * x$
        aux_rp: &RPParamsMod<P::Paillier>,               // $\hat{N}$, $s$, $t$
        aux: &impl Hashable,
    ) -> bool {
        let mut reader = XofHasher::new_with_dst(HASH_TAG).chain(aux).finalize_to_reader();

        // Non-interactive challenge ($e$)
        let challenge = Signed::from_xof_reader_bounded(
            &mut reader,
            &NonZero::new(P::CURVE_ORDER).expect("the curve order is non-zero"),
        );

        let aux_pk = aux_rp.public_key();

        // Range checks: z_1 \in +- 2^{\ell + \eps}, z_2 \in +- 2^{\ell^\prime + \eps}
        if !self.z1.in_range_bits(P::L_BOUND + P::EPS_BOUND)
            || !self.z2.in_range_bits(P::LP_BOUND + P::EPS_BOUND)
        {
            return false;
        }

        // These values from the wire get raised to the (possibly negative)
        // challenge below; reject non-units outright.
        if !cap_d.is_invertible(pk0) || !cap_y.is_invertible(pk1) {
            return false;
        }
        let cap_s_mod = self.cap_s.to_mod(aux_pk);
        let cap_t_mod = self.cap_t.to_mod(aux_pk);
        if !cap_s_mod.is_invertible() || !cap_t_mod.is_invertible() {
            return false;
        }

        // C (*) z_1 (+) encrypt_0(z_2, \omega) == A (+) D (*) e
        if cap_c.homomorphic_mul(pk0, &self.z1).homomorphic_add(
            pk0,
            &Ciphertext::new_with_randomizer_signed(pk0, &self.z2, &self.omega),
        ) != cap_d
            .homomorphic_mul(pk0, &challenge)
            .homomorphic_add(pk0, &self.cap_a)
        {
            return false;
        }

        // g^{z_1} == B_x X^e
        if self.z1.to_scalar().mul_by_generator()
            != self.cap_b_x + cap_x * &challenge.to_scalar()
        {
            return false;
        }

        // Original: `Y^e`. Modified: `Y^{-e}`.
        // encrypt_1(z_2, \omega_y) == B_y (+) Y (*) (-e)
        if Ciphertext::new_with_randomizer_signed(pk1, &self.z2, &self.omega_y)
            != cap_y
                .homomorphic_mul(pk1, &-challenge)
                .homomorphic_add(pk1, &self.cap_b_y)
        {
            return false;
        }

        // s^{z_1} t^{z_3} == E S^e \mod \hat{N}
        if aux_rp.commit(&self.z1, &self.z3)
            != &self.cap_e.to_mod(aux_pk) * &cap_s_mod.pow_signed_vartime(&challenge)
        {
            return false;
        }

        // s^{z_2} t^{z_4} == F T^e \mod \hat{N}
        if aux_rp.commit(&self.z2, &self.z4)
            != &self.cap_f.to_mod(aux_pk) * &cap_t_mod.pow_signed_vartime(&challenge)
        {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::AffGProof;
    use crate::cmp::{SchemeParams, TestParams};
    use crate::paillier::{Ciphertext, RPParamsMod, SecretKeyPaillier};
    use crate::uint::{FromScalar, Signed};

    #[test]
    fn prove_and_verify() {
        type Params = TestParams;
        type Paillier = <Params as SchemeParams>::Paillier;

        let sk0 = SecretKeyPaillier::<Paillier>::random(&mut OsRng).to_precomputed();
        let pk0 = sk0.public_key();

        let sk1 = SecretKeyPaillier::<Paillier>::random(&mut OsRng).to_precomputed();
        let pk1 = sk1.public_key();

        let aux_sk = SecretKeyPaillier::<Paillier>::random(&mut OsRng).to_precomputed();
        let aux_rp = RPParamsMod::random(&mut OsRng, &aux_sk);

        let aux: &[u8] = b"abcde";

        let x = Signed::random_bounded_bits(&mut OsRng, Params::L_BOUND);
        let y = Signed::random_bounded_bits(&mut OsRng, Params::LP_BOUND);

        let rho = Ciphertext::<Paillier>::randomizer(&mut OsRng, pk0);
        let rho_y = Ciphertext::<Paillier>::randomizer(&mut OsRng, pk1);
        let secret = Signed::random_bounded_bits(&mut OsRng, Params::L_BOUND);
        let cap_c = Ciphertext::new_with_randomizer_signed(
            pk0,
            &secret,
            &Ciphertext::<Paillier>::randomizer(&mut OsRng, pk0),
        );

        let cap_d = cap_c
            .homomorphic_mul(pk0, &x)
            .homomorphic_add(pk0, &Ciphertext::new_with_randomizer_signed(pk0, &(-y), &rho));
        let cap_y = Ciphertext::new_with_randomizer_signed(pk1, &y, &rho_y);
        let cap_x = x.to_scalar().mul_by_generator();

        let proof = AffGProof::<Params>::new(
            &mut OsRng, &x, &y, &rho, &rho_y, pk0, pk1, &cap_c, &aux_rp, &aux,
        );
        assert!(proof.verify(pk0, pk1, &cap_c, &cap_d, &cap_y, &cap_x, &aux_rp, &aux));
    }
}
