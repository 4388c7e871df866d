use std::collections::{BTreeMap, BTreeSet};

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::params::SchemeParams;
use super::party::PartyId;
use crate::curve::{derive_tweak, ChainCode, Point, Scalar};
use crate::errors::Error;
use crate::paillier::{
    PaillierParams, PublicKeyPaillier, RPParams, RPParamsMod, SecretKeyPaillier,
    SecretKeyPaillierPrecomputed,
};
use crate::tools::hashing::{Chain, FofHasher};
use crate::tools::serde_bytes;
use crate::tools::sss::{shamir_join_points, Polynomial};
use crate::uint::{Encoding, UintLike};

const CONFIG_DOMAIN: &[u8] = b"CMP Config";
const PUBLIC_DATA_DOMAIN: &[u8] = b"Public Data";

/// The public information associated with a single party.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "PublicKeyPaillier<P::Paillier>: Serialize,
    RPParams<P::Paillier>: Serialize"))]
#[serde(bound(deserialize = "PublicKeyPaillier<P::Paillier>: for<'x> Deserialize<'x>,
    RPParams<P::Paillier>: for<'x> Deserialize<'x>"))]
pub struct PublicData<P: SchemeParams> {
    /// The ECDSA public key share $X_j$.
    pub(crate) ecdsa_share: Point,
    /// The Paillier modulus $N_j = p_j q_j$ with $p_j \equiv q_j \equiv 3 \mod 4$.
    pub(crate) paillier_pk: PublicKeyPaillier<P::Paillier>,
    /// The ring-Pedersen commitment parameters $(s_j, t_j)$ over $N_j$.
    pub(crate) rp_params: RPParams<P::Paillier>,
}

impl<P: SchemeParams> PublicData<P> {
    fn validate(&self) -> Result<(), Error> {
        if self.ecdsa_share.is_identity() {
            return Err(Error::ConfigInvalid("ECDSA public key share is the identity".into()));
        }

        let modulus = self.paillier_pk.modulus();
        if modulus.bits_vartime() != <P::Paillier as PaillierParams>::MODULUS_BITS {
            return Err(Error::ConfigInvalid(format!(
                "Paillier modulus has {} bits, expected {}",
                modulus.bits_vartime(),
                <P::Paillier as PaillierParams>::MODULUS_BITS
            )));
        }
        if !modulus.bit_vartime(0) {
            return Err(Error::ConfigInvalid("Paillier modulus is even".into()));
        }

        self.rp_params.validate(&self.paillier_pk.to_precomputed())
    }

    fn chain<C: Chain>(&self, digest: C) -> C {
        let x_bytes = self
            .ecdsa_share
            .to_compressed_bytes()
            .expect("validated public shares are not the identity");
        digest
            .chain_bytes(PUBLIC_DATA_DOMAIN)
            .chain_constant_sized_bytes(&x_bytes)
            .chain_constant_sized_bytes(&self.paillier_pk.modulus().to_be_bytes())
            .chain_constant_sized_bytes(&self.rp_params.s.to_be_bytes())
            .chain_constant_sized_bytes(&self.rp_params.t.to_be_bytes())
    }
}

/// The per-party artifact of key generation / refresh that seeds signing sessions.
///
/// Logically this is the session identifier
/// `ssid = (sid, (N_1, s_1, t_1), ..., (N_n, s_n, t_n))`
/// where `sid = (G, t, n, P_1, ..., P_n)`, together with this party's secrets.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "PublicData<P>: Serialize,
    SecretKeyPaillier<P::Paillier>: Serialize"))]
#[serde(bound(deserialize = "PublicData<P>: for<'x> Deserialize<'x>,
    SecretKeyPaillier<P::Paillier>: for<'x> Deserialize<'x>"))]
pub struct Config<P: SchemeParams> {
    pub(crate) owner: PartyId,

    /// The maximum number of corruptions tolerated.
    /// `threshold + 1` shares are required to produce a signature.
    pub(crate) threshold: u32,

    /// This party's share $x_i$ of the secret ECDSA key.
    pub(crate) secret_share: Scalar,

    /// The Paillier primes $(P, Q)$ backing this party's modulus.
    pub(crate) paillier_sk: SecretKeyPaillier<P::Paillier>,

    /// All parties' public records, including this party's.
    pub(crate) public: BTreeMap<PartyId, PublicData<P>>,

    /// The 32-byte random identifier generated for this config.
    #[serde(with = "serde_bytes::as_hex")]
    pub(crate) rid: [u8; 32],

    /// The BIP32 chaining key associated with the group public key.
    #[serde(with = "serde_bytes::as_hex")]
    pub(crate) chain_key: ChainCode,
}

impl<P: SchemeParams> Config<P> {
    /// Ensures that the config is consistent:
    /// the threshold is achievable, all public data is present and valid,
    /// and the secrets correspond to this party's public record.
    pub fn validate(&self) -> Result<(), Error> {
        let num_parties = self.public.len();
        if num_parties == 0 || self.threshold as usize > num_parties - 1 {
            return Err(Error::ConfigInvalid(format!(
                "threshold {} is invalid for {} parties",
                self.threshold, num_parties
            )));
        }

        if self.secret_share.is_zero() {
            return Err(Error::ConfigInvalid("ECDSA secret key share is zero".into()));
        }

        let (p, q) = self.paillier_sk.primes();
        SecretKeyPaillier::<P::Paillier>::from_primes(p, q)?;

        for (id, public) in self.public.iter() {
            public
                .validate()
                .map_err(|err| Error::ConfigInvalid(format!("party {id}: {err}")))?;
        }

        let own_public = self
            .public
            .get(&self.owner)
            .ok_or_else(|| Error::ConfigInvalid("no public data for the own secret".into()))?;

        if self.secret_share.mul_by_generator() != own_public.ecdsa_share {
            return Err(Error::ConfigInvalid(
                "ECDSA secret key share does not correspond to the public share".into(),
            ));
        }

        // Reject the config if the stored primes do not produce the advertised modulus.
        let product = self.paillier_sk.to_precomputed().public_key().to_minimal();
        if product.modulus() != own_public.paillier_pk.modulus() {
            return Err(Error::ConfigInvalid("P * Q differs from the recorded modulus N".into()));
        }

        Ok(())
    }

    pub fn owner(&self) -> &PartyId {
        &self.owner
    }

    pub fn threshold(&self) -> usize {
        self.threshold as usize
    }

    /// The BIP32 chaining key bound to the group public key.
    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_key
    }

    /// A sorted set of all party IDs in this config.
    pub fn party_ids(&self) -> BTreeSet<PartyId> {
        self.public.keys().cloned().collect()
    }

    pub(crate) fn public_data(&self, id: &PartyId) -> Result<&PublicData<P>, Error> {
        self.public
            .get(id)
            .ok_or_else(|| Error::MalformedMessage(format!("unknown party {id}")))
    }

    /// The secret Paillier key associated with this party.
    pub(crate) fn paillier_sk(&self) -> SecretKeyPaillierPrecomputed<P::Paillier> {
        self.paillier_sk.to_precomputed()
    }

    /// The group's public point, reconstructed by Lagrange interpolation
    /// over the full party set.
    pub(crate) fn public_point(&self) -> Point {
        shamir_join_points(
            &self
                .public
                .iter()
                .map(|(id, public)| (id.scalar(), public.ecdsa_share))
                .collect(),
        )
    }

    /// The group's public ECDSA key.
    pub fn verifying_key(&self) -> Result<VerifyingKey, Error> {
        self.public_point()
            .to_verifying_key()
            .ok_or_else(|| Error::ConfigInvalid("the group public key is the identity".into()))
    }

    /// Returns true if the given sorted list of signers is a valid subset
    /// of the original parties of size greater than the threshold,
    /// and includes this party.
    pub fn can_sign(&self, signers: &[PartyId]) -> bool {
        if signers.len() <= self.threshold as usize {
            return false;
        }
        if !signers.windows(2).all(|pair| pair[0] < pair[1]) {
            return false;
        }
        if !signers.contains(&self.owner) {
            return false;
        }
        signers.iter().all(|id| self.public.contains_key(id))
    }

    /// Feeds the byte sequence binding this config into a transcript hash:
    /// the threshold, the sorted party IDs, the RID,
    /// then every party's public record.
    pub(crate) fn chain_sid<C: Chain>(&self, digest: C) -> C {
        let mut digest = digest
            .chain_bytes(CONFIG_DOMAIN)
            .chain_constant_sized_bytes(&self.threshold.to_be_bytes());
        for id in self.public.keys() {
            digest = digest.chain_bytes(id.as_str());
        }
        digest = digest.chain_constant_sized_bytes(&self.rid);
        for public in self.public.values() {
            digest = public.chain(digest);
        }
        digest
    }

    /// Derives a sharing of the `index`-th child of the group signing key,
    /// per the BIP32 unhardened scheme.
    ///
    /// Panics if `index` denotes a hardened child (`index >= 2^31`).
    /// Returns [`Error::InvalidChild`] when the standard says to skip this index;
    /// the caller then retries with the next one.
    pub fn derive_child(&self, index: u32) -> Result<Self, Error> {
        let (tweak, chain_key) = derive_tweak(&self.public_point(), &self.chain_key, index)?;

        // Adding the derived scalar to the underlying secret is achieved
        // by adding it to each share, which shifts every verification share
        // by `tweak * G`.
        let tweak_point = tweak.mul_by_generator();

        let public = self
            .public
            .iter()
            .map(|(id, data)| {
                (
                    id.clone(),
                    PublicData {
                        ecdsa_share: data.ecdsa_share + tweak_point,
                        paillier_pk: data.paillier_pk,
                        rp_params: data.rp_params,
                    },
                )
            })
            .collect();

        Ok(Self {
            owner: self.owner.clone(),
            threshold: self.threshold,
            secret_share: self.secret_share + tweak,
            paillier_sk: self.paillier_sk.clone(),
            public,
            rid: self.rid,
            chain_key,
        })
    }

    /// Returns a self-consistent set of configs for the given parties
    /// (which in the decentralized case would be the output of the key
    /// generation and auxiliary info protocols).
    pub fn new_centralized(
        rng: &mut impl CryptoRngCore,
        ids: &BTreeSet<PartyId>,
        threshold: usize,
        signing_key: Option<&SigningKey>,
    ) -> BTreeMap<PartyId, Self> {
        debug_assert!(threshold < ids.len());

        let secret = match signing_key {
            None => Scalar::random(rng),
            Some(sk) => Scalar::from(sk.as_nonzero_scalar()),
        };

        let polynomial = Polynomial::random(rng, &secret, threshold);
        let exponent = polynomial.exponent();

        let secret_shares = ids
            .iter()
            .map(|id| (id.clone(), polynomial.evaluate(&id.scalar())))
            .collect::<BTreeMap<_, _>>();

        let paillier_sks = ids
            .iter()
            .map(|id| (id.clone(), SecretKeyPaillier::<P::Paillier>::random(rng)))
            .collect::<BTreeMap<_, _>>();

        let public = ids
            .iter()
            .map(|id| {
                let sk = paillier_sks[id].to_precomputed();
                (
                    id.clone(),
                    PublicData {
                        ecdsa_share: exponent.evaluate(&id.scalar()),
                        paillier_pk: sk.public_key().to_minimal(),
                        rp_params: RPParamsMod::random(rng, &sk).retrieve(),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();

        // The RID is bound to the key commitment, the way the decentralized
        // key generation binds it into every transcript.
        let mut rid_seed = [0u8; 32];
        rng.fill_bytes(&mut rid_seed);
        let rid = exponent
            .chain_to(FofHasher::new_with_dst(b"CMP RID"))
            .chain_constant_sized_bytes(&rid_seed)
            .finalize()
            .0;

        let mut chain_key = [0u8; 32];
        rng.fill_bytes(&mut chain_key);

        ids.iter()
            .map(|id| {
                (
                    id.clone(),
                    Self {
                        owner: id.clone(),
                        threshold: threshold as u32,
                        secret_share: secret_shares[id],
                        paillier_sk: paillier_sks[id].clone(),
                        public: public.clone(),
                        rid,
                        chain_key,
                    },
                )
            })
            .collect()
    }
}

impl<P: SchemeParams> Drop for Config<P> {
    fn drop(&mut self) {
        self.secret_share.zeroize();
        self.paillier_sk.zeroize();
    }
}

// A custom Debug impl that skips the secret values
impl<P: SchemeParams> core::fmt::Debug for Config<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Config {{ owner: {:?}, threshold: {}, secret_share: <...>, paillier_sk: <...>, public: {:?} }}",
            self.owner, self.threshold, self.public,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use k256::ecdsa::SigningKey;
    use rand_core::OsRng;

    use super::Config;
    use crate::cmp::{PartyId, TestParams};
    use crate::curve::Scalar;

    fn test_ids() -> BTreeSet<PartyId> {
        ["alice", "bob", "charlie"].into_iter().map(PartyId::from).collect()
    }

    #[test]
    fn centralized_configs_validate() {
        let sk = SigningKey::random(&mut OsRng);
        let configs = Config::<TestParams>::new_centralized(&mut OsRng, &test_ids(), 1, Some(&sk));

        for config in configs.values() {
            config.validate().unwrap();
            assert_eq!(&config.verifying_key().unwrap(), sk.verifying_key());
        }
    }

    #[test]
    fn zeroed_secret_fails_validation() {
        let mut configs = Config::<TestParams>::new_centralized(&mut OsRng, &test_ids(), 1, None);
        let mut config = configs.remove(&PartyId::new("alice")).unwrap();
        config.secret_share = Scalar::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn wrong_modulus_fails_validation() {
        let mut configs = Config::<TestParams>::new_centralized(&mut OsRng, &test_ids(), 1, None);
        let mut config = configs.remove(&PartyId::new("alice")).unwrap();
        // Swap in the primes of another party; P * Q no longer matches N.
        let other = configs.remove(&PartyId::new("bob")).unwrap();
        config.paillier_sk = other.paillier_sk.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn mismatched_share_fails_validation() {
        let mut configs = Config::<TestParams>::new_centralized(&mut OsRng, &test_ids(), 1, None);
        let mut config = configs.remove(&PartyId::new("alice")).unwrap();
        config.secret_share = Scalar::random(&mut OsRng);
        assert!(config.validate().is_err());
    }

    #[test]
    fn can_sign_enforces_the_signer_set_shape() {
        let configs = Config::<TestParams>::new_centralized(&mut OsRng, &test_ids(), 1, None);
        let config = &configs[&PartyId::new("alice")];

        let alice = PartyId::new("alice");
        let bob = PartyId::new("bob");
        let mallory = PartyId::new("mallory");

        assert!(config.can_sign(&[alice.clone(), bob.clone()]));
        // Too few signers.
        assert!(!config.can_sign(&[alice.clone()]));
        // Not sorted.
        assert!(!config.can_sign(&[bob.clone(), alice.clone()]));
        // Duplicates.
        assert!(!config.can_sign(&[alice.clone(), alice.clone()]));
        // Self missing.
        assert!(!config.can_sign(&[bob.clone(), PartyId::new("charlie")]));
        // Not a subset.
        assert!(!config.can_sign(&[alice, mallory]));
    }

    #[test]
    fn derive_child_shifts_every_share_consistently() {
        let configs = Config::<TestParams>::new_centralized(&mut OsRng, &test_ids(), 1, None);

        let children = configs
            .values()
            .map(|config| config.derive_child(0).unwrap())
            .collect::<Vec<_>>();

        for child in &children {
            child.validate().unwrap();
            assert_eq!(child.verifying_key().unwrap(), children[0].verifying_key().unwrap());
        }

        // The child key is a shift of the parent key, not a rerandomization.
        let parent_key = configs.values().next().unwrap().public_point();
        assert_ne!(children[0].public_point(), parent_key);
    }

    #[test]
    #[should_panic]
    fn hardened_child_panics() {
        let configs = Config::<TestParams>::new_centralized(&mut OsRng, &test_ids(), 1, None);
        let _ = configs.values().next().unwrap().derive_child(1 << 31);
    }
}
