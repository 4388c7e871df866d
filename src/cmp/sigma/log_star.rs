//! Knowledge of Exponent vs Paillier Encryption ($\Pi^{log*}$, Section C.2, Fig. 25)

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::super::params::SchemeParams;
use crate::curve::Point;
use crate::paillier::{
    Ciphertext, PaillierParams, PublicKeyPaillierPrecomputed, RPCommitment, RPParamsMod,
};
use crate::tools::hashing::{Chain, Hashable, XofHasher};
use crate::uint::{FromScalar, NonZero, Retrieve, Signed, UintLike, UintModLike};

const HASH_TAG: &[u8] = b"P_log*";

/// Proves knowledge of `x` such that `C = enc(x, rho)` and `X = x * B`
/// for a public base point `B`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "Ciphertext<P::Paillier>: Serialize,
    RPCommitment<P::Paillier>: Serialize"))]
#[serde(bound(deserialize = "Ciphertext<P::Paillier>: for<'x> Deserialize<'x>,
    RPCommitment<P::Paillier>: for<'x> Deserialize<'x>"))]
pub(crate) struct LogStarProof<P: SchemeParams> {
    cap_s: RPCommitment<P::Paillier>,
    cap_a: Ciphertext<P::Paillier>,
    cap_y: Point,
    cap_d: RPCommitment<P::Paillier>,
    z1: Signed<<P::Paillier as PaillierParams>::Uint>,
    z2: <P::Paillier as PaillierParams>::Uint,
    z3: Signed<<P::Paillier as PaillierParams>::WideUint>,
}

impl<P: SchemeParams> LogStarProof<P> {
    pub fn new(
        rng: &mut impl CryptoRngCore,
        secret: &Signed<<P::Paillier as PaillierParams>::Uint>, // $x$
        randomizer: &<P::Paillier as PaillierParams>::Uint,     // $\rho$
        pk: &PublicKeyPaillierPrecomputed<P::Paillier>,         // $N_0$
        base: &Point,                                           // $B$
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

        let alpha = Signed::random_bounded_bits(rng, P::L_BOUND + P::EPS_BOUND);
        let mu = Signed::random_bounded_bits_scaled(rng, P::L_BOUND, hat_cap_n);
        let r = pk.random_invertible_group_elem(rng);
        let gamma = Signed::random_bounded_bits_scaled(rng, P::L_BOUND + P::EPS_BOUND, hat_cap_n);

        // S = s^x t^\mu \mod \hat{N}
        let cap_s = aux_rp.commit(secret, &mu).retrieve();
        // A = encrypt(\alpha, r)
        let cap_a = Ciphertext::new_with_randomizer_signed(pk, &alpha, &r.retrieve());
        // Y = B^\alpha
        let cap_y = base * &alpha.to_scalar();
        // D = s^\alpha t^\gamma \mod \hat{N}
        let cap_d = aux_rp.commit(&alpha, &gamma).retrieve();

        // z_1 = \alpha + e x
        let z1 = alpha + challenge * *secret;
        // z_2 = r \rho^e mod N_0
        let rho = randomizer.to_mod(pk.precomputed_modulus());
        let z2 = (r * rho.pow_signed_vartime(&challenge)).retrieve();
        // z_3 = \gamma + e \mu
        let z3 = gamma + mu * challenge.into_wide();

        Self {
            cap_s,
            cap_a,
            cap_y,
            cap_d,
            z1,
            z2,
            z3,
        }
    }

    pub fn verify(
        &self,
        pk: &PublicKeyPaillierPrecomputed<P::Paillier>, // $N_0$
        ciphertext: &Ciphertext<P::Paillier>,           // $C = encrypt(x, \rho)$
        base: &Point,                                   // $B$
        cap_x: &Point,                                  // $X = x * B$
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

        // encrypt(z1, z2) == A (+) C (*) e
        let c = Ciphertext::new_with_randomizer_signed(pk, &self.z1, &self.z2);
        if c != self
            .cap_a
            .homomorphic_add(pk, &ciphertext.homomorphic_mul(pk, &challenge))
        {
            return false;
        }

        // B^{z_1} == Y X^e
        if base * &self.z1.to_scalar() != self.cap_y + cap_x * &challenge.to_scalar() {
            return false;
        }

        // s^{z_1} t^{z_3} == D S^e \mod \hat{N}
        let cap_d_mod = self.cap_d.to_mod(aux_rp.public_key());
        if aux_rp.commit(&self.z1, &self.z3) != &cap_d_mod * &cap_s_mod.pow_signed_vartime(&challenge) {
            return false;
        }

        true
    }
}
