use std::collections::{BTreeMap, BTreeSet};

use k256::ecdsa::{signature::hazmat::PrehashVerifier, SigningKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use super::config::Config;
use super::party::PartyId;
use super::session::{Message, MessageBody, SigningSession, Step};
use super::TestParams;
use crate::curve::{RecoverableSignature, Scalar};
use crate::errors::Error;

type Outcome = Result<RecoverableSignature, Error>;

fn make_configs(ids: &BTreeSet<PartyId>, threshold: usize) -> (SigningKey, BTreeMap<PartyId, Config<TestParams>>) {
    let sk = SigningKey::random(&mut OsRng);
    let configs = Config::<TestParams>::new_centralized(&mut OsRng, ids, threshold, Some(&sk));
    (sk, configs)
}

/// Runs all sessions to completion synchronously, applying `tamper`
/// to every message in flight. Parties that fail stop participating;
/// the loop ends when nobody can make progress.
fn run_sessions(
    configs: &BTreeMap<PartyId, Config<TestParams>>,
    signers: &[PartyId],
    prehashed_message: &[u8; 32],
    mut tamper: impl FnMut(Message<TestParams>) -> Message<TestParams>,
) -> BTreeMap<PartyId, Outcome> {
    let mut sessions = signers
        .iter()
        .map(|id| {
            let session =
                SigningSession::new(&mut OsRng, &configs[id], signers, prehashed_message).unwrap();
            (id.clone(), session)
        })
        .collect::<BTreeMap<_, _>>();

    let mut outcomes = BTreeMap::<PartyId, Outcome>::new();

    loop {
        let mut batch = Vec::new();
        let mut progressed = false;

        for (id, session) in sessions.iter_mut() {
            if outcomes.contains_key(id) || !session.can_proceed() {
                continue;
            }
            progressed = true;
            match session.proceed(&mut OsRng) {
                Ok(Step::Send(messages)) => batch.extend(messages.into_iter().map(&mut tamper)),
                Ok(Step::Done(signature)) => {
                    outcomes.insert(id.clone(), Ok(signature));
                }
                Err(err) => {
                    outcomes.insert(id.clone(), Err(err));
                }
            }
        }

        for message in batch {
            let to = message.to.clone();
            if outcomes.contains_key(&to) {
                continue;
            }
            if let Err(err) = sessions.get_mut(&to).unwrap().handle_message(message) {
                outcomes.insert(to, Err(err));
            }
        }

        if !progressed || outcomes.len() == sessions.len() {
            break;
        }
    }

    outcomes
}

fn prehash(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}

fn two_party_setup() -> (SigningKey, BTreeMap<PartyId, Config<TestParams>>, Vec<PartyId>) {
    let ids = ["alice", "bob"].into_iter().map(PartyId::from).collect::<BTreeSet<_>>();
    let (sk, configs) = make_configs(&ids, 1);
    let signers = ids.into_iter().collect::<Vec<_>>();
    (sk, configs, signers)
}

#[test]
fn honest_parties_produce_a_valid_signature() {
    let (sk, configs, signers) = two_party_setup();
    let message = prehash(b"hello");

    let outcomes = run_sessions(&configs, &signers, &message, |message| message);

    for outcome in outcomes.values() {
        let (signature, _rec_id) = outcome.as_ref().unwrap().clone().to_backend();
        sk.verifying_key().verify_prehash(&message, &signature).unwrap();
    }
}

#[test]
fn tampered_round1_proof_aborts_with_proof_failure() {
    let (_sk, configs, signers) = two_party_setup();
    let message = prehash(b"hello");
    let bob = PartyId::new("bob");

    // Bob's range proof no longer matches the `K` ciphertext it is sent with.
    let outcomes = run_sessions(&configs, &signers, &message, |mut message| {
        if message.from == bob {
            if let MessageBody::Round1(msg) = &mut message.body {
                core::mem::swap(&mut msg.cap_k, &mut msg.cap_g);
            }
        }
        message
    });

    assert!(matches!(
        outcomes[&PartyId::new("alice")],
        Err(Error::ProofFailure(_))
    ));
    // Nobody obtained a signature.
    assert!(outcomes.values().all(|outcome| outcome.is_err()));
}

#[test]
fn equivocated_round1_ciphertexts_abort_on_echo_mismatch() {
    let ids = ["alice", "bob", "charlie"].into_iter().map(PartyId::from).collect::<BTreeSet<_>>();
    let (_sk, configs) = make_configs(&ids, 1);
    let signers = ids.into_iter().collect::<Vec<_>>();
    let message = prehash(b"hello");
    let alice = PartyId::new("alice");
    let bob = PartyId::new("bob");

    // Bob shows alice a different `G` ciphertext than everyone else.
    // The range proof only covers `K`, so the equivocation is caught by the
    // echo hash comparison, not by round 2.
    let outcomes = run_sessions(&configs, &signers, &message, |mut message| {
        if message.from == bob && message.to == alice {
            if let MessageBody::Round1(msg) = &mut message.body {
                msg.cap_g = msg.cap_k.clone();
            }
        }
        message
    });

    assert!(matches!(outcomes[&alice], Err(Error::ProtocolAbort(_))));
    // Alice's own echo hash differs from everyone else's view too.
    assert!(outcomes.values().all(|outcome| outcome.is_err()));
}

#[test]
fn tampered_delta_share_aborts_with_protocol_abort() {
    let ids = ["alice", "bob", "charlie"].into_iter().map(PartyId::from).collect::<BTreeSet<_>>();
    let (_sk, configs) = make_configs(&ids, 1);
    let signers = ids.into_iter().collect::<Vec<_>>();
    let message = prehash(b"hello");
    let charlie = PartyId::new("charlie");

    let outcomes = run_sessions(&configs, &signers, &message, |mut message| {
        if message.from == charlie {
            if let MessageBody::Round3(msg) = &mut message.body {
                msg.delta = msg.delta + Scalar::ONE;
            }
        }
        message
    });

    assert!(matches!(
        outcomes[&PartyId::new("alice")],
        Err(Error::ProtocolAbort(_))
    ));
    assert!(matches!(
        outcomes[&PartyId::new("bob")],
        Err(Error::ProtocolAbort(_))
    ));
}

#[test]
fn duplicate_messages_are_rejected() {
    let (_sk, configs, signers) = two_party_setup();
    let message = prehash(b"hello");
    let alice = PartyId::new("alice");
    let bob = PartyId::new("bob");

    let mut alice_session =
        SigningSession::new(&mut OsRng, &configs[&alice], &signers, &message).unwrap();
    let mut bob_session =
        SigningSession::new(&mut OsRng, &configs[&bob], &signers, &message).unwrap();

    let bob_messages = match bob_session.proceed(&mut OsRng).unwrap() {
        Step::Send(messages) => messages,
        Step::Done(_) => panic!("round 1 does not finish the protocol"),
    };
    let to_alice = bob_messages
        .into_iter()
        .find(|message| message.to == alice)
        .unwrap();

    alice_session.handle_message(to_alice.clone()).unwrap();
    assert!(matches!(
        alice_session.handle_message(to_alice),
        Err(Error::MalformedMessage(_))
    ));
}

#[test]
fn unknown_senders_are_rejected() {
    let (_sk, configs, signers) = two_party_setup();
    let message = prehash(b"hello");
    let alice = PartyId::new("alice");

    let mut alice_session =
        SigningSession::new(&mut OsRng, &configs[&alice], &signers, &message).unwrap();

    // Use alice's own outgoing message, relabeled as coming from a stranger.
    let messages = match alice_session.proceed(&mut OsRng).unwrap() {
        Step::Send(messages) => messages,
        Step::Done(_) => panic!("round 1 does not finish the protocol"),
    };
    let mut forged = messages.into_iter().next().unwrap();
    forged.from = PartyId::new("mallory");
    forged.to = alice.clone();

    assert!(matches!(
        alice_session.handle_message(forged),
        Err(Error::MalformedMessage(_))
    ));
}

#[test]
fn missing_peer_surfaces_as_timeout() {
    let (_sk, configs, signers) = two_party_setup();
    let message = prehash(b"hello");
    let alice = PartyId::new("alice");
    let bob = PartyId::new("bob");

    let mut alice_session =
        SigningSession::new(&mut OsRng, &configs[&alice], &signers, &message).unwrap();
    let _ = alice_session.proceed(&mut OsRng).unwrap();

    // Bob never delivers; the caller decides this is a timeout.
    assert!(!alice_session.can_proceed());
    match alice_session.proceed(&mut OsRng) {
        Err(Error::ProtocolTimeout { missing }) => {
            assert_eq!(missing, BTreeSet::from([bob]))
        }
        _ => panic!("expected a timeout"),
    }
}

#[test]
fn invalid_signer_sets_are_rejected() {
    let (_sk, configs, _signers) = two_party_setup();
    let message = prehash(b"hello");
    let alice = PartyId::new("alice");

    // Below the quorum size.
    assert!(matches!(
        SigningSession::new(&mut OsRng, &configs[&alice], &[alice.clone()], &message),
        Err(Error::ConfigInvalid(_))
    ));
}

#[test]
fn messages_roundtrip_through_cbor() {
    let (_sk, configs, signers) = two_party_setup();
    let message = prehash(b"hello");
    let alice = PartyId::new("alice");

    let mut session = SigningSession::new(&mut OsRng, &configs[&alice], &signers, &message).unwrap();
    let messages = match session.proceed(&mut OsRng).unwrap() {
        Step::Send(messages) => messages,
        Step::Done(_) => panic!("round 1 does not finish the protocol"),
    };

    let bytes = messages[0].to_cbor().unwrap();
    let decoded = Message::<TestParams>::from_cbor(&bytes).unwrap();
    assert_eq!(decoded.from, messages[0].from);
    assert_eq!(decoded.to, messages[0].to);
    assert_eq!(decoded.body.round(), 1);

    assert!(matches!(
        Message::<TestParams>::from_cbor(b"not cbor"),
        Err(Error::InvalidEncoding(_))
    ));
}
