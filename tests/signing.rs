use std::collections::{BTreeMap, BTreeSet};

use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use sha2::{Digest, Sha256};

use cmp_ecdsa::ecdsa::signature::hazmat::PrehashVerifier;
use cmp_ecdsa::ecdsa::VerifyingKey;
use cmp_ecdsa::{Config, Message, PartyId, RecoverableSignature, SigningSession, Step, TestParams};

/// Runs one signing flow for every signer in lockstep, delivering messages
/// between the sessions, and returns each party's signature.
fn run_signing(
    rng: &mut ChaCha20Rng,
    configs: &BTreeMap<PartyId, Config<TestParams>>,
    signers: &[PartyId],
    prehashed_message: &[u8; 32],
) -> BTreeMap<PartyId, RecoverableSignature> {
    let mut sessions = signers
        .iter()
        .map(|id| {
            let session =
                SigningSession::new(rng, &configs[id], signers, prehashed_message).unwrap();
            (id.clone(), session)
        })
        .collect::<BTreeMap<_, _>>();

    let mut signatures = BTreeMap::new();

    while signatures.len() < signers.len() {
        let mut batch = Vec::<Message<TestParams>>::new();

        for (id, session) in sessions.iter_mut() {
            if signatures.contains_key(id) || !session.can_proceed() {
                continue;
            }
            match session.proceed(rng).unwrap() {
                Step::Send(messages) => batch.extend(messages),
                Step::Done(signature) => {
                    signatures.insert(id.clone(), signature);
                }
            }
        }

        for message in batch {
            sessions
                .get_mut(&message.to)
                .unwrap()
                .handle_message(message)
                .unwrap();
        }
    }

    signatures
}

fn party_ids(names: &[&str]) -> BTreeSet<PartyId> {
    names.iter().copied().map(PartyId::from).collect()
}

#[test]
fn sign_with_three_parties() {
    let mut rng = ChaCha20Rng::from_seed([0x01; 32]);
    let ids = party_ids(&["alice", "bob", "charlie"]);
    let configs = Config::<TestParams>::new_centralized(&mut rng, &ids, 1, None);

    let vkey = configs.values().next().unwrap().verifying_key().unwrap();
    let message: [u8; 32] = Sha256::digest(b"hello").into();

    let signers = ids.into_iter().collect::<Vec<_>>();
    let signatures = run_signing(&mut rng, &configs, &signers, &message);

    for signature in signatures.into_values() {
        let (sig, rec_id) = signature.to_backend();

        // The signature verifies under the group key.
        vkey.verify_prehash(&message, &sig).unwrap();

        // The group key can be recovered from the signature.
        let recovered = VerifyingKey::recover_from_prehash(&message, &sig, rec_id).unwrap();
        assert_eq!(recovered, vkey);

        // `s` is normalized to the low half of the scalar range.
        assert!(sig.normalize_s().is_none());
    }
}

#[test]
fn sign_with_a_minimal_quorum() {
    let mut rng = ChaCha20Rng::from_seed([0x02; 32]);
    let ids = party_ids(&["alice", "bob", "charlie", "dave", "eve"]);
    let threshold = 2;
    let configs = Config::<TestParams>::new_centralized(&mut rng, &ids, threshold, None);

    // The group key is recovered by interpolation over all five shares;
    // exactly `threshold + 1` parties then sign.
    let vkey = configs.values().next().unwrap().verifying_key().unwrap();
    let signers = ids.into_iter().take(threshold + 1).collect::<Vec<_>>();
    assert!(configs[&signers[0]].can_sign(&signers));

    let message: [u8; 32] = Sha256::digest(b"threshold quorum").into();
    let signatures = run_signing(&mut rng, &configs, &signers, &message);

    for signature in signatures.into_values() {
        let (sig, _rec_id) = signature.to_backend();
        vkey.verify_prehash(&message, &sig).unwrap();
    }
}

#[test]
fn sign_under_a_derived_child_key() {
    use bip32::{ChildNumber, PublicKey as _};

    let mut rng = ChaCha20Rng::from_seed([0x03; 32]);
    let ids = party_ids(&["alice", "bob", "charlie"]);
    let configs = Config::<TestParams>::new_centralized(&mut rng, &ids, 1, None);

    let parent = configs.values().next().unwrap();
    let parent_vkey = parent.verifying_key().unwrap();

    let children = configs
        .iter()
        .map(|(id, config)| (id.clone(), config.derive_child(0).unwrap()))
        .collect::<BTreeMap<_, _>>();

    // The derived group key matches the public-only BIP32 derivation.
    let (tweak, _chain_code) = parent_vkey
        .derive_tweak(parent.chain_code(), ChildNumber(0))
        .unwrap();
    let expected_child_vkey = parent_vkey.derive_child(tweak).unwrap();
    let child_vkey = children.values().next().unwrap().verifying_key().unwrap();
    assert_eq!(child_vkey, expected_child_vkey);
    assert_ne!(child_vkey, parent_vkey);

    // A signature produced with the child configs verifies under the child key.
    let message: [u8; 32] = Sha256::digest(b"derived child").into();
    let signers = ids.into_iter().collect::<Vec<_>>();
    let signatures = run_signing(&mut rng, &children, &signers, &message);

    for signature in signatures.into_values() {
        let (sig, _rec_id) = signature.to_backend();
        child_vkey.verify_prehash(&message, &sig).unwrap();
    }
}
