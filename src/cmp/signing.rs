//! The five-round signing protocol: nonce commitment, two MtA conversions
//! per peer pair, share recombination, and signature assembly.
//!
//! Following [LN18], all messages are point-to-point and failures abort the
//! session without identifying the misbehaving party.

use std::collections::{BTreeMap, BTreeSet};

use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::config::Config;
use super::params::SchemeParams;
use super::party::{lagrange_coefficients, PartyId};
use super::session::Helper;
use super::sigma::{AffGProof, EncProof, LogStarProof};
use crate::curve::{Point, RecoverableSignature, Scalar};
use crate::errors::Error;
use crate::paillier::{
    Ciphertext, PaillierParams, PublicKeyPaillierPrecomputed, RPParamsMod,
    SecretKeyPaillierPrecomputed,
};
use crate::tools::hashing::{Chain, FofHasher, HashOutput};
use crate::uint::{FromScalar, Signed};

type Ct<P> = Ciphertext<<P as SchemeParams>::Paillier>;
type PaillierUint<P> = <<P as SchemeParams>::Paillier as PaillierParams>::Uint;
type SignedUint<P> = Signed<PaillierUint<P>>;

const ECHO_DST: &[u8] = b"CMP echo";

/// The hash of every party's round-1 ciphertexts, in party-ID order.
///
/// The round-1 messages are point-to-point, so an equivocating party could
/// show different `{K_j, G_j}` to different peers. Per [LN18], each party
/// sends this hash with its round-2 message, and the hashes are compared
/// when those messages are processed; a mismatch aborts the session.
fn echo_hash<P: SchemeParams>(
    helper: &Helper,
    all_cap_k: &BTreeMap<PartyId, Ct<P>>,
    all_cap_g: &BTreeMap<PartyId, Ct<P>>,
) -> HashOutput {
    FofHasher::new_with_dst(ECHO_DST)
        .chain(&helper.sid)
        .chain(all_cap_k)
        .chain(all_cap_g)
        .finalize()
}

/// The state shared by all rounds of one signing session.
///
/// Holds the additively-scaled key material, the precomputed Paillier and
/// ring-Pedersen parameters of every signer, and the session ephemerals.
pub(crate) struct Context<P: SchemeParams> {
    pub(crate) helper: Helper,
    /// The message digest reduced to the scalar field.
    pub(crate) message: Scalar,
    /// This party's additive share of the secret key
    /// (the Shamir share scaled by the Lagrange coefficient).
    pub(crate) secret_share: Scalar,
    /// Additive public shares of all signers.
    pub(crate) public_shares: BTreeMap<PartyId, Point>,
    /// The group public key.
    pub(crate) vkey: Point,
    pub(crate) paillier_sk: SecretKeyPaillierPrecomputed<P::Paillier>,
    pub(crate) paillier_pks: BTreeMap<PartyId, PublicKeyPaillierPrecomputed<P::Paillier>>,
    pub(crate) rp_params: BTreeMap<PartyId, RPParamsMod<P::Paillier>>,

    // Session ephemerals; released when the context is dropped.
    pub(crate) k: Scalar,
    pub(crate) gamma: Scalar,
    pub(crate) rho: PaillierUint<P>,
    pub(crate) nu: PaillierUint<P>,
    pub(crate) betas: BTreeMap<PartyId, SignedUint<P>>,
    pub(crate) hat_betas: BTreeMap<PartyId, SignedUint<P>>,
    pub(crate) chi: Scalar,
}

impl<P: SchemeParams> Context<P> {
    fn my_pk(&self) -> &PublicKeyPaillierPrecomputed<P::Paillier> {
        &self.paillier_pks[&self.helper.my_id]
    }

    fn my_rp(&self) -> &RPParamsMod<P::Paillier> {
        &self.rp_params[&self.helper.my_id]
    }

    fn k_signed(&self) -> SignedUint<P> {
        SignedUint::<P>::from_scalar(&self.k)
    }

    /// Seeds for the per-peer worker RNGs; a `CryptoRngCore` cannot be
    /// shared across pool workers.
    fn peer_seeds(&self, rng: &mut impl CryptoRngCore) -> Vec<(PartyId, [u8; 32])> {
        self.helper
            .other_ids
            .iter()
            .map(|id| {
                let mut seed = [0u8; 32];
                rng.fill_bytes(&mut seed);
                (id.clone(), seed)
            })
            .collect()
    }
}

impl<P: SchemeParams> Drop for Context<P> {
    fn drop(&mut self) {
        self.secret_share.zeroize();
        self.k.zeroize();
        self.gamma.zeroize();
        self.chi.zeroize();
        self.rho.zeroize();
        self.nu.zeroize();
        for beta in self.betas.values_mut() {
            beta.zeroize();
        }
        for beta in self.hat_betas.values_mut() {
            beta.zeroize();
        }
    }
}

/// The output of round 1: the nonce ciphertexts with a range proof
/// for `K` bound to the recipient's Pedersen parameters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "EncProof<P>: Serialize, Ct<P>: Serialize"))]
#[serde(bound(deserialize = "EncProof<P>: for<'x> Deserialize<'x>, Ct<P>: for<'x> Deserialize<'x>"))]
pub struct Round1Message<P: SchemeParams> {
    pub(crate) enc_proof: EncProof<P>,
    pub(crate) cap_k: Ct<P>,
    pub(crate) cap_g: Ct<P>,
}

/// The output of round 2: the MtA ciphertext pairs with their proofs,
/// the nonce commitment point, and the round-1 echo hash.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "AffGProof<P>: Serialize, LogStarProof<P>: Serialize, Ct<P>: Serialize"))]
#[serde(bound(deserialize = "AffGProof<P>: for<'x> Deserialize<'x>,
    LogStarProof<P>: for<'x> Deserialize<'x>, Ct<P>: for<'x> Deserialize<'x>"))]
pub struct Round2Message<P: SchemeParams> {
    pub(crate) echo_hash: HashOutput,
    pub(crate) cap_gamma: Point,
    pub(crate) cap_d: Ct<P>,
    pub(crate) cap_f: Ct<P>,
    pub(crate) hat_cap_d: Ct<P>,
    pub(crate) hat_cap_f: Ct<P>,
    pub(crate) psi: AffGProof<P>,
    pub(crate) hat_psi: AffGProof<P>,
    pub(crate) psi_prime: LogStarProof<P>,
}

/// The output of round 3: the partial nonce share and its consistency proof.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "LogStarProof<P>: Serialize"))]
#[serde(bound(deserialize = "LogStarProof<P>: for<'x> Deserialize<'x>"))]
pub struct Round3Message<P: SchemeParams> {
    pub(crate) delta: Scalar,
    pub(crate) big_delta: Point,
    pub(crate) psi_pprime: LogStarProof<P>,
}

/// The round-5 exchange: the partial signature and the final re-binding proof.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "LogStarProof<P>: Serialize"))]
#[serde(bound(deserialize = "LogStarProof<P>: for<'x> Deserialize<'x>"))]
pub struct Round5Message<P: SchemeParams> {
    pub(crate) sigma: Scalar,
    pub(crate) psi_final: LogStarProof<P>,
}

/// Round 1: sample the nonce shares, encrypt them, and prove the range
/// of the `k` ciphertext to every peer.
pub(crate) struct Round1<P: SchemeParams> {
    pub(crate) context: Context<P>,
    cap_k: Ct<P>,
    cap_g: Ct<P>,
}

impl<P: SchemeParams> Round1<P> {
    pub fn new(
        rng: &mut impl CryptoRngCore,
        config: &Config<P>,
        signers: &[PartyId],
        prehashed_message: &[u8; 32],
    ) -> Result<Self, Error> {
        config.validate()?;
        if !config.can_sign(signers) {
            return Err(Error::ConfigInvalid(
                "the signer set is not a valid quorum for this config".into(),
            ));
        }

        let signer_set = signers.iter().cloned().collect::<BTreeSet<_>>();
        let other_ids = signer_set
            .iter()
            .filter(|id| *id != config.owner())
            .cloned()
            .collect::<BTreeSet<_>>();

        // Convert the Shamir shares to additive shares over the signer set.
        let coeffs = lagrange_coefficients(&signer_set);
        let secret_share = config.secret_share * coeffs[config.owner()];
        let public_shares = signer_set
            .iter()
            .map(|id| Ok((id.clone(), config.public_data(id)?.ecdsa_share * &coeffs[id])))
            .collect::<Result<BTreeMap<_, _>, Error>>()?;
        let vkey = public_shares.values().sum();

        let paillier_pks = signer_set
            .iter()
            .map(|id| {
                Ok((
                    id.clone(),
                    config.public_data(id)?.paillier_pk.to_precomputed(),
                ))
            })
            .collect::<Result<BTreeMap<_, _>, Error>>()?;
        let rp_params = signer_set
            .iter()
            .map(|id| {
                Ok((
                    id.clone(),
                    config.public_data(id)?.rp_params.to_mod(&paillier_pks[id]),
                ))
            })
            .collect::<Result<BTreeMap<_, _>, Error>>()?;

        let helper = Helper::new(config, &signer_set, prehashed_message);

        let k = Scalar::random(rng);
        let gamma = Scalar::random(rng);

        let my_pk = &paillier_pks[config.owner()];
        let rho = Ct::<P>::randomizer(rng, my_pk);
        let nu = Ct::<P>::randomizer(rng, my_pk);

        let cap_k = Ct::<P>::new_with_randomizer(my_pk, &PaillierUint::<P>::from_scalar(&k), &rho);
        let cap_g =
            Ct::<P>::new_with_randomizer(my_pk, &PaillierUint::<P>::from_scalar(&gamma), &nu);

        Ok(Self {
            context: Context {
                helper,
                message: Scalar::from_reduced_bytes(prehashed_message),
                secret_share,
                public_shares,
                vkey,
                paillier_sk: config.paillier_sk(),
                paillier_pks,
                rp_params,
                k,
                gamma,
                rho,
                nu,
                betas: BTreeMap::new(),
                hat_betas: BTreeMap::new(),
                chi: Scalar::ZERO,
            },
            cap_k,
            cap_g,
        })
    }

    /// Emits the per-peer range proofs and transitions to round 2.
    /// This round consumes no peer messages.
    pub fn finalize(
        self,
        rng: &mut impl CryptoRngCore,
    ) -> (Round2<P>, Vec<(PartyId, Round1Message<P>)>) {
        let context = &self.context;
        let aux = context.helper.aux_for(&context.helper.my_id);
        let k_signed = context.k_signed();

        let seeds = self.context.peer_seeds(rng);
        let messages = context.helper.pool.map(&seeds, |_idx, (id, seed)| {
            let mut rng = ChaCha20Rng::from_seed(*seed);
            let enc_proof = EncProof::<P>::new(
                &mut rng,
                &k_signed,
                &context.rho,
                context.my_pk(),
                &context.rp_params[id],
                &aux,
            );
            (
                id.clone(),
                Round1Message {
                    enc_proof,
                    cap_k: self.cap_k.clone(),
                    cap_g: self.cap_g.clone(),
                },
            )
        });

        let round2 = Round2 {
            context: self.context,
            cap_k: self.cap_k,
            cap_g: self.cap_g,
        };
        (round2, messages)
    }
}

/// Round 2: check the peers' range proofs, then run the two MtA
/// conversions towards every peer.
pub(crate) struct Round2<P: SchemeParams> {
    pub(crate) context: Context<P>,
    cap_k: Ct<P>,
    cap_g: Ct<P>,
}

pub(crate) struct Round2Payload<P: SchemeParams> {
    cap_k: Ct<P>,
    cap_g: Ct<P>,
}

impl<P: SchemeParams> Round2<P> {
    pub fn verify_message(
        &self,
        from: &PartyId,
        msg: Round1Message<P>,
    ) -> Result<Round2Payload<P>, Error> {
        let context = &self.context;
        let aux = context.helper.aux_for(from);
        if !msg.enc_proof.verify(
            &context.paillier_pks[from],
            &msg.cap_k,
            context.my_rp(),
            &aux,
        ) {
            return Err(Error::ProofFailure(format!(
                "the nonce range proof from {from} failed to verify"
            )));
        }
        Ok(Round2Payload {
            cap_k: msg.cap_k,
            cap_g: msg.cap_g,
        })
    }

    pub fn finalize(
        self,
        rng: &mut impl CryptoRngCore,
        payloads: BTreeMap<PartyId, Round2Payload<P>>,
    ) -> Result<(Round3<P>, Vec<(PartyId, Round2Message<P>)>), Error> {
        let mut context = self.context;
        let my_id = context.helper.my_id.clone();

        let mut all_cap_k = BTreeMap::new();
        let mut all_cap_g = BTreeMap::new();
        all_cap_k.insert(my_id.clone(), self.cap_k);
        all_cap_g.insert(my_id.clone(), self.cap_g);
        for (id, payload) in payloads {
            all_cap_k.insert(id.clone(), payload.cap_k);
            all_cap_g.insert(id, payload.cap_g);
        }

        // Binds this party's view of all the round-1 ciphertexts;
        // every peer compares it against its own view in the next round.
        let echo_hash = echo_hash::<P>(&context.helper, &all_cap_k, &all_cap_g);

        let cap_gamma = context.gamma.mul_by_generator();
        let aux = context.helper.aux_for(&my_id);

        let gamma_signed = SignedUint::<P>::from_scalar(&context.gamma);
        let x_signed = SignedUint::<P>::from_scalar(&context.secret_share);

        let seeds = context.peer_seeds(rng);
        let results = {
            let context = &context;
            let all_cap_k = &all_cap_k;
            context.helper.pool.map(&seeds, |_idx, (id, seed)| {
                let mut rng = ChaCha20Rng::from_seed(*seed);

                let target_pk = &context.paillier_pks[id];
                let target_rp = &context.rp_params[id];
                let pk = context.my_pk();
                let cap_k_j = &all_cap_k[id];

                // The MtA masks for this peer, kept as our own summands.
                let beta = SignedUint::<P>::random_bounded_bits(&mut rng, P::LP_BOUND);
                let hat_beta = SignedUint::<P>::random_bounded_bits(&mut rng, P::LP_BOUND);

                let s = Ct::<P>::randomizer(&mut rng, target_pk);
                let r = Ct::<P>::randomizer(&mut rng, pk);
                let hat_s = Ct::<P>::randomizer(&mut rng, target_pk);
                let hat_r = Ct::<P>::randomizer(&mut rng, pk);

                // D_{j,i} = K_j (*) gamma_i (+) enc_j(-beta, s)
                let cap_d = cap_k_j.homomorphic_mul(target_pk, &gamma_signed).homomorphic_add(
                    target_pk,
                    &Ct::<P>::new_with_randomizer_signed(target_pk, &-beta, &s),
                );
                let cap_f = Ct::<P>::new_with_randomizer_signed(pk, &beta, &r);

                // \hat{D}_{j,i} = K_j (*) x_i (+) enc_j(-\hat{beta}, \hat{s})
                let hat_cap_d = cap_k_j.homomorphic_mul(target_pk, &x_signed).homomorphic_add(
                    target_pk,
                    &Ct::<P>::new_with_randomizer_signed(target_pk, &-hat_beta, &hat_s),
                );
                let hat_cap_f = Ct::<P>::new_with_randomizer_signed(pk, &hat_beta, &hat_r);

                let psi = AffGProof::<P>::new(
                    &mut rng,
                    &gamma_signed,
                    &beta,
                    &s,
                    &r,
                    target_pk,
                    pk,
                    cap_k_j,
                    target_rp,
                    &aux,
                );

                let hat_psi = AffGProof::<P>::new(
                    &mut rng,
                    &x_signed,
                    &hat_beta,
                    &hat_s,
                    &hat_r,
                    target_pk,
                    pk,
                    cap_k_j,
                    target_rp,
                    &aux,
                );

                let psi_prime = LogStarProof::<P>::new(
                    &mut rng,
                    &gamma_signed,
                    &context.nu,
                    pk,
                    &Point::GENERATOR,
                    target_rp,
                    &aux,
                );

                let msg = Round2Message {
                    echo_hash,
                    cap_gamma,
                    cap_d,
                    cap_f,
                    hat_cap_d,
                    hat_cap_f,
                    psi,
                    hat_psi,
                    psi_prime,
                };
                (id.clone(), msg, beta, hat_beta)
            })
        };

        let mut messages = Vec::with_capacity(results.len());
        for (id, msg, beta, hat_beta) in results {
            context.betas.insert(id.clone(), beta);
            context.hat_betas.insert(id.clone(), hat_beta);
            messages.push((id, msg));
        }

        let round3 = Round3 {
            context,
            all_cap_k,
            all_cap_g,
            cap_gamma,
            echo_hash,
        };
        Ok((round3, messages))
    }
}

/// Round 3: compare the round-1 echo hashes, check the MtA proofs,
/// decrypt the additive shares, and publish the nonce recombination shares.
pub(crate) struct Round3<P: SchemeParams> {
    pub(crate) context: Context<P>,
    all_cap_k: BTreeMap<PartyId, Ct<P>>,
    all_cap_g: BTreeMap<PartyId, Ct<P>>,
    cap_gamma: Point,
    echo_hash: HashOutput,
}

pub(crate) struct Round3Payload {
    cap_gamma: Point,
    alpha: Scalar,
    hat_alpha: Scalar,
}

impl<P: SchemeParams> Round3<P> {
    pub fn verify_message(
        &self,
        from: &PartyId,
        msg: Round2Message<P>,
    ) -> Result<Round3Payload, Error> {
        let context = &self.context;

        // The round-1 messages were point-to-point; equivocation shows up
        // as peers hashing different views of the `{K_j, G_j}` sets.
        if msg.echo_hash != self.echo_hash {
            return Err(Error::ProtocolAbort(format!(
                "{from} reports a different view of the round 1 ciphertexts"
            )));
        }

        let aux = context.helper.aux_for(from);

        let pk = context.my_pk();
        let from_pk = &context.paillier_pks[from];
        let cap_k_i = &self.all_cap_k[&context.helper.my_id];

        if !msg.psi.verify(
            pk,
            from_pk,
            cap_k_i,
            &msg.cap_d,
            &msg.cap_f,
            &msg.cap_gamma,
            context.my_rp(),
            &aux,
        ) {
            return Err(Error::ProofFailure(format!(
                "the gamma MtA proof from {from} failed to verify"
            )));
        }

        if !msg.hat_psi.verify(
            pk,
            from_pk,
            cap_k_i,
            &msg.hat_cap_d,
            &msg.hat_cap_f,
            &context.public_shares[from],
            context.my_rp(),
            &aux,
        ) {
            return Err(Error::ProofFailure(format!(
                "the key share MtA proof from {from} failed to verify"
            )));
        }

        if !msg.psi_prime.verify(
            from_pk,
            &self.all_cap_g[from],
            &Point::GENERATOR,
            &msg.cap_gamma,
            context.my_rp(),
            &aux,
        ) {
            return Err(Error::ProofFailure(format!(
                "the nonce commitment proof from {from} failed to verify"
            )));
        }

        let alpha = msg.cap_d.decrypt_signed(&context.paillier_sk).to_scalar();
        let hat_alpha = msg.hat_cap_d.decrypt_signed(&context.paillier_sk).to_scalar();

        Ok(Round3Payload {
            cap_gamma: msg.cap_gamma,
            alpha,
            hat_alpha,
        })
    }

    pub fn finalize(
        self,
        rng: &mut impl CryptoRngCore,
        payloads: BTreeMap<PartyId, Round3Payload>,
    ) -> Result<(Round4<P>, Vec<(PartyId, Round3Message<P>)>), Error> {
        let mut context = self.context;
        let my_id = context.helper.my_id.clone();

        // Gamma = sum_j Gamma_j
        let big_gamma = self.cap_gamma
            + payloads
                .values()
                .map(|payload| payload.cap_gamma)
                .sum::<Point>();

        // Delta_i = k_i * Gamma
        let big_delta = big_gamma * context.k;

        // delta_i = gamma_i k_i + sum_{j != i} (alpha_{i,j} + beta_{i,j})
        //
        // Note that the mask terms do not cancel within a single share:
        // alpha_{i,j} carries -beta_{j,i} (peer j's mask), while the sum adds
        // back beta_{i,j} (our own). A single delta_i is not a meaningful
        // share of gamma * k; the masks only telescope in the sum over all
        // parties, which is what the `delta * G == Delta` check in round 4
        // operates on.
        let delta = context.gamma * context.k
            + payloads
                .iter()
                .map(|(id, payload)| payload.alpha + context.betas[id].to_scalar())
                .sum::<Scalar>();

        // chi_i = x_i k_i + sum_{j != i} (hat_alpha_{i,j} + hat_beta_{i,j})
        // with the same aggregate-only cancellation as delta_i.
        context.chi = context.secret_share * context.k
            + payloads
                .iter()
                .map(|(id, payload)| payload.hat_alpha + context.hat_betas[id].to_scalar())
                .sum::<Scalar>();

        let aux = context.helper.aux_for(&my_id);
        let k_signed = context.k_signed();

        let seeds = context.peer_seeds(rng);
        let messages = {
            let context = &context;
            context.helper.pool.map(&seeds, |_idx, (id, seed)| {
                let mut rng = ChaCha20Rng::from_seed(*seed);
                let psi_pprime = LogStarProof::<P>::new(
                    &mut rng,
                    &k_signed,
                    &context.rho,
                    context.my_pk(),
                    &big_gamma,
                    &context.rp_params[id],
                    &aux,
                );
                (
                    id.clone(),
                    Round3Message {
                        delta,
                        big_delta,
                        psi_pprime,
                    },
                )
            })
        };

        let round4 = Round4 {
            context,
            all_cap_k: self.all_cap_k,
            big_gamma,
            delta,
            big_delta,
        };
        Ok((round4, messages))
    }
}

/// Round 4: check the recombination proofs and the `delta * G == Delta`
/// consistency equation, then derive `r` and the partial signature.
pub(crate) struct Round4<P: SchemeParams> {
    pub(crate) context: Context<P>,
    all_cap_k: BTreeMap<PartyId, Ct<P>>,
    big_gamma: Point,
    delta: Scalar,
    big_delta: Point,
}

pub(crate) struct Round4Payload {
    delta: Scalar,
    big_delta: Point,
}

impl<P: SchemeParams> Round4<P> {
    pub fn verify_message(
        &self,
        from: &PartyId,
        msg: Round3Message<P>,
    ) -> Result<Round4Payload, Error> {
        let context = &self.context;
        let aux = context.helper.aux_for(from);

        if !msg.psi_pprime.verify(
            &context.paillier_pks[from],
            &self.all_cap_k[from],
            &self.big_gamma,
            &msg.big_delta,
            context.my_rp(),
            &aux,
        ) {
            return Err(Error::ProofFailure(format!(
                "the recombination proof from {from} failed to verify"
            )));
        }
        Ok(Round4Payload {
            delta: msg.delta,
            big_delta: msg.big_delta,
        })
    }

    pub fn finalize(
        self,
        rng: &mut impl CryptoRngCore,
        payloads: BTreeMap<PartyId, Round4Payload>,
    ) -> Result<(Round5<P>, Vec<(PartyId, Round5Message<P>)>), Error> {
        let context = self.context;
        let my_id = context.helper.my_id.clone();

        let delta = self.delta + payloads.values().map(|payload| payload.delta).sum::<Scalar>();
        let big_delta =
            self.big_delta + payloads.values().map(|payload| payload.big_delta).sum::<Point>();

        // The recombined nonce must match its image on the curve.
        if delta.mul_by_generator() != big_delta {
            return Err(Error::ProtocolAbort(
                "the sum of delta shares is inconsistent with the sum of Delta points".into(),
            ));
        }

        let delta_inv: Option<Scalar> = delta.invert().into();
        let nonce_point = self.big_gamma
            * delta_inv.ok_or_else(|| {
                Error::ProtocolAbort("the recombined nonce denominator is zero".into())
            })?;

        let r = nonce_point.x_coordinate();
        if r.is_zero() {
            return Err(Error::ProtocolAbort(
                "the nonce x-coordinate is zero; restart the signing session".into(),
            ));
        }

        let mut all_big_delta = BTreeMap::new();
        all_big_delta.insert(my_id.clone(), self.big_delta);
        for (id, payload) in payloads {
            all_big_delta.insert(id, payload.big_delta);
        }

        // sigma_i = k_i m + r chi_i
        let sigma = context.k * context.message + r * context.chi;

        let aux = context.helper.aux_for(&my_id);
        let k_signed = context.k_signed();
        let big_gamma = self.big_gamma;

        let seeds = context.peer_seeds(rng);
        let messages = {
            let context = &context;
            context.helper.pool.map(&seeds, |_idx, (id, seed)| {
                let mut rng = ChaCha20Rng::from_seed(*seed);
                let psi_final = LogStarProof::<P>::new(
                    &mut rng,
                    &k_signed,
                    &context.rho,
                    context.my_pk(),
                    &big_gamma,
                    &context.rp_params[id],
                    &aux,
                );
                (
                    id.clone(),
                    Round5Message {
                        sigma,
                        psi_final,
                    },
                )
            })
        };

        let round5 = Round5 {
            context,
            all_cap_k: self.all_cap_k,
            all_big_delta,
            big_gamma,
            r,
            sigma,
        };
        Ok((round5, messages))
    }
}

/// Round 5: collect the partial signatures and assemble `(r, s)`,
/// verifying it against the group key.
pub(crate) struct Round5<P: SchemeParams> {
    pub(crate) context: Context<P>,
    all_cap_k: BTreeMap<PartyId, Ct<P>>,
    all_big_delta: BTreeMap<PartyId, Point>,
    big_gamma: Point,
    r: Scalar,
    sigma: Scalar,
}

pub(crate) struct Round5Payload {
    sigma: Scalar,
}

impl<P: SchemeParams> Round5<P> {
    pub fn verify_message(
        &self,
        from: &PartyId,
        msg: Round5Message<P>,
    ) -> Result<Round5Payload, Error> {
        let context = &self.context;
        let aux = context.helper.aux_for(from);

        if !msg.psi_final.verify(
            &context.paillier_pks[from],
            &self.all_cap_k[from],
            &self.big_gamma,
            &self.all_big_delta[from],
            context.my_rp(),
            &aux,
        ) {
            return Err(Error::ProofFailure(format!(
                "the final consistency proof from {from} failed to verify"
            )));
        }
        Ok(Round5Payload { sigma: msg.sigma })
    }

    pub fn finalize(
        self,
        payloads: BTreeMap<PartyId, Round5Payload>,
    ) -> Result<RecoverableSignature, Error> {
        let s = self.sigma + payloads.values().map(|payload| payload.sigma).sum::<Scalar>();

        // Verifies under the group key and normalizes `s` to the low half
        // of the scalar range; a failure here means some party contributed
        // a bad partial signature.
        RecoverableSignature::from_scalars(&self.r, &s, &self.context.vkey, &self.context.message)
            .ok_or_else(|| {
                Error::ProtocolAbort("the assembled signature failed ECDSA verification".into())
            })
    }
}
