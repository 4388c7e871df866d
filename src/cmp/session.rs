//! Per-session plumbing: the transcript helper shared by all rounds,
//! and the state machine driving them from inbound messages.

use std::collections::{BTreeMap, BTreeSet};

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::Config;
use super::params::SchemeParams;
use super::party::PartyId;
use super::signing::{
    Round1, Round1Message, Round2, Round2Message, Round3, Round3Message, Round4, Round5,
    Round5Message,
};
use crate::curve::RecoverableSignature;
use crate::errors::Error;
use crate::tools::hashing::{Chain, FofHasher, HashOutput};
use crate::tools::pool::Pool;

const SSID_DST: &[u8] = b"CMP-SSID";

/// Session-wide utilities available to every round: the party roster,
/// the session transcript hash, and the worker pool for per-peer
/// proof generation and verification.
pub(crate) struct Helper {
    pub(crate) my_id: PartyId,
    pub(crate) other_ids: BTreeSet<PartyId>,
    pub(crate) sid: HashOutput,
    pub(crate) rid: [u8; 32],
    pub(crate) pool: Pool,
}

impl Helper {
    pub fn new<P: SchemeParams>(
        config: &Config<P>,
        signers: &BTreeSet<PartyId>,
        prehashed_message: &[u8; 32],
    ) -> Self {
        // The session identifier binds the group parameters, the threshold,
        // the party set with all its auxiliary data, the RID,
        // the signer subset and the message.
        let mut digest = config.chain_sid(FofHasher::new_with_dst(SSID_DST));
        for id in signers {
            digest = digest.chain_bytes(id.as_str());
        }
        let sid = digest.chain_constant_sized_bytes(prehashed_message).finalize();

        let my_id = config.owner().clone();
        let other_ids = signers.iter().filter(|id| **id != my_id).cloned().collect();

        Self {
            my_id,
            other_ids,
            sid,
            rid: config.rid,
            pool: Pool::with_default_parallelism(),
        }
    }

    /// A fresh transcript hash pre-bound to the given party:
    /// seeded with the session ID, the RID, and the party ID.
    pub fn hash_for_id(&self, id: &PartyId) -> FofHasher {
        FofHasher::new_with_dst(SSID_DST)
            .chain(&self.sid)
            .chain(&self.rid)
            .chain_bytes(id.as_str())
    }

    /// The Fiat-Shamir transcript binding for proofs produced by `prover`.
    pub fn aux_for(&self, prover: &PartyId) -> HashOutput {
        self.hash_for_id(prover).finalize()
    }
}

/// A signing protocol message with its routing information.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "MessageBody<P>: Serialize"))]
#[serde(bound(deserialize = "MessageBody<P>: for<'x> Deserialize<'x>"))]
pub struct Message<P: SchemeParams> {
    pub from: PartyId,
    pub to: PartyId,
    pub body: MessageBody<P>,
}

/// The round-specific payload of a signing message.
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "Round1Message<P>: Serialize, Round2Message<P>: Serialize,
    Round3Message<P>: Serialize, Round5Message<P>: Serialize"))]
#[serde(bound(deserialize = "Round1Message<P>: for<'x> Deserialize<'x>,
    Round2Message<P>: for<'x> Deserialize<'x>,
    Round3Message<P>: for<'x> Deserialize<'x>,
    Round5Message<P>: for<'x> Deserialize<'x>"))]
pub enum MessageBody<P: SchemeParams> {
    Round1(Round1Message<P>),
    Round2(Round2Message<P>),
    Round3(Round3Message<P>),
    // Round 4 performs only local checks and sends nothing.
    Round5(Round5Message<P>),
}

impl<P: SchemeParams> MessageBody<P> {
    /// The round that emitted this message.
    pub fn round(&self) -> u8 {
        match self {
            Self::Round1(_) => 1,
            Self::Round2(_) => 2,
            Self::Round3(_) => 3,
            Self::Round5(_) => 5,
        }
    }
}

impl<P: SchemeParams> Message<P> {
    /// Encodes the message payload as CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| Error::InvalidEncoding(format!("{err}")))?;
        Ok(bytes)
    }

    /// Decodes a message from its CBOR encoding.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Error> {
        ciborium::de::from_reader(bytes).map_err(|err| Error::InvalidEncoding(format!("{err}")))
    }
}

/// The result of advancing a session by one round.
pub enum Step<P: SchemeParams> {
    /// Messages to deliver to the other signers.
    Send(Vec<Message<P>>),
    /// The protocol is complete.
    Done(RecoverableSignature),
}

enum State<P: SchemeParams> {
    Round1(Round1<P>),
    Round2(Round2<P>),
    Round3(Round3<P>),
    Round4(Round4<P>),
    Round5(Round5<P>),
    Done,
}

impl<P: SchemeParams> State<P> {
    /// The message tag this state needs to collect before it can proceed
    /// (`None` for states that proceed without input).
    fn expects(&self) -> Option<u8> {
        match self {
            Self::Round1(_) => None,
            Self::Round2(_) => Some(1),
            Self::Round3(_) => Some(2),
            Self::Round4(_) => Some(3),
            Self::Round5(_) => Some(5),
            Self::Done => None,
        }
    }
}

/// A single party's view of one signing session.
///
/// The session owns the round state and an inbox of unprocessed messages;
/// the caller is responsible for transport. Messages may arrive in any
/// order; the session buffers the ones for future rounds and processes
/// each batch in party-ID order for deterministic transcripts.
pub struct SigningSession<P: SchemeParams> {
    state: Option<State<P>>,
    inbox: BTreeMap<u8, BTreeMap<PartyId, MessageBody<P>>>,
    my_id: PartyId,
    other_ids: BTreeSet<PartyId>,
}

impl<P: SchemeParams> SigningSession<P> {
    /// Starts a signing session for a previously validated quorum.
    ///
    /// The config is only read; it may be shared by concurrent sessions.
    /// Call [`Self::proceed`] to obtain the initial batch of messages.
    pub fn new(
        rng: &mut impl CryptoRngCore,
        config: &Config<P>,
        signers: &[PartyId],
        prehashed_message: &[u8; 32],
    ) -> Result<Self, Error> {
        let round1 = Round1::new(rng, config, signers, prehashed_message)?;
        let my_id = round1.context.helper.my_id.clone();
        let other_ids = round1.context.helper.other_ids.clone();
        Ok(Self {
            state: Some(State::Round1(round1)),
            inbox: BTreeMap::new(),
            my_id,
            other_ids,
        })
    }

    /// Accepts a message from a peer, buffering it until its round
    /// is processed. Duplicates, unknown senders and stale messages
    /// are rejected.
    pub fn handle_message(&mut self, message: Message<P>) -> Result<(), Error> {
        let tag = message.body.round();

        if message.to != self.my_id {
            return Err(Error::MalformedMessage(format!(
                "message for {} delivered to {}",
                message.to, self.my_id
            )));
        }
        if !self.other_ids.contains(&message.from) {
            return Err(Error::MalformedMessage(format!(
                "sender {} is not part of this session",
                message.from
            )));
        }

        let min_tag = match &self.state {
            Some(State::Round1(_)) | Some(State::Round2(_)) => 1,
            Some(State::Round3(_)) => 2,
            Some(State::Round4(_)) => 3,
            Some(State::Round5(_)) => 5,
            Some(State::Done) | None => {
                return Err(Error::MalformedMessage(
                    "the session is no longer accepting messages".into(),
                ))
            }
        };
        if tag < min_tag {
            return Err(Error::MalformedMessage(format!(
                "message from {} belongs to the already processed round {tag}",
                message.from
            )));
        }

        let slot = self.inbox.entry(tag).or_default();
        if slot.contains_key(&message.from) {
            return Err(Error::MalformedMessage(format!(
                "duplicate round {tag} message from {}",
                message.from
            )));
        }
        slot.insert(message.from, message.body);
        Ok(())
    }

    /// Returns true if the current round has everything it needs to proceed.
    pub fn can_proceed(&self) -> bool {
        match &self.state {
            Some(state) => match state.expects() {
                None => !matches!(state, State::Done),
                Some(tag) => self.missing_for(tag).is_empty(),
            },
            None => false,
        }
    }

    /// The peers whose messages the current round is still waiting for.
    pub fn missing_messages(&self) -> BTreeSet<PartyId> {
        match &self.state {
            Some(state) => match state.expects() {
                Some(tag) => self.missing_for(tag),
                None => BTreeSet::new(),
            },
            None => BTreeSet::new(),
        }
    }

    fn missing_for(&self, tag: u8) -> BTreeSet<PartyId> {
        let received = self.inbox.get(&tag);
        self.other_ids
            .iter()
            .filter(|id| !received.map(|slot| slot.contains_key(id)).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Verifies the buffered messages of the current round (in party-ID
    /// order, in parallel) and finalizes it, producing either the next
    /// batch of outgoing messages or the signature.
    ///
    /// Returns [`Error::ProtocolTimeout`] when called before all expected
    /// messages have arrived; any other error aborts the session.
    pub fn proceed(&mut self, rng: &mut impl CryptoRngCore) -> Result<Step<P>, Error> {
        match &self.state {
            Some(State::Done) => {
                return Err(Error::MalformedMessage("the session has finished".into()))
            }
            None => {
                return Err(Error::ProtocolAbort("the session has already aborted".into()))
            }
            Some(state) => {
                if let Some(tag) = state.expects() {
                    let missing = self.missing_for(tag);
                    if !missing.is_empty() {
                        return Err(Error::ProtocolTimeout { missing });
                    }
                }
            }
        }

        let state = self.state.take().expect("the state presence was checked above");
        let result = self.proceed_inner(rng, state);
        if let Err(err) = &result {
            warn!(party = %self.my_id, %err, "signing session aborted");
        }
        result
    }

    fn proceed_inner(
        &mut self,
        rng: &mut impl CryptoRngCore,
        state: State<P>,
    ) -> Result<Step<P>, Error> {
        match state {
            State::Round1(round) => {
                debug!(party = %self.my_id, "emitting round 1");
                let (round2, messages) = round.finalize(rng);
                self.state = Some(State::Round2(round2));
                Ok(Step::Send(self.wrap(messages, MessageBody::Round1)))
            }
            State::Round2(round) => {
                debug!(party = %self.my_id, "processing round 1, emitting round 2");
                let inbound = self.take_inbox(1, |body| match body {
                    MessageBody::Round1(msg) => msg,
                    _ => unreachable!("the inbox slot holds round 1 messages only"),
                });
                let payloads = verify_batch(
                    &round.context.helper.pool,
                    &inbound,
                    |from, msg| round.verify_message(from, msg),
                )?;
                let (round3, messages) = round.finalize(rng, payloads)?;
                self.state = Some(State::Round3(round3));
                Ok(Step::Send(self.wrap(messages, MessageBody::Round2)))
            }
            State::Round3(round) => {
                debug!(party = %self.my_id, "processing round 2, emitting round 3");
                let inbound = self.take_inbox(2, |body| match body {
                    MessageBody::Round2(msg) => msg,
                    _ => unreachable!("the inbox slot holds round 2 messages only"),
                });
                let payloads = verify_batch(
                    &round.context.helper.pool,
                    &inbound,
                    |from, msg| round.verify_message(from, msg),
                )?;
                let (round4, messages) = round.finalize(rng, payloads)?;
                self.state = Some(State::Round4(round4));
                Ok(Step::Send(self.wrap(messages, MessageBody::Round3)))
            }
            State::Round4(round) => {
                debug!(party = %self.my_id, "processing round 3, emitting round 5");
                let inbound = self.take_inbox(3, |body| match body {
                    MessageBody::Round3(msg) => msg,
                    _ => unreachable!("the inbox slot holds round 3 messages only"),
                });
                let payloads = verify_batch(
                    &round.context.helper.pool,
                    &inbound,
                    |from, msg| round.verify_message(from, msg),
                )?;
                let (round5, messages) = round.finalize(rng, payloads)?;
                self.state = Some(State::Round5(round5));
                Ok(Step::Send(self.wrap(messages, MessageBody::Round5)))
            }
            State::Round5(round) => {
                debug!(party = %self.my_id, "processing round 5");
                let inbound = self.take_inbox(5, |body| match body {
                    MessageBody::Round5(msg) => msg,
                    _ => unreachable!("the inbox slot holds round 5 messages only"),
                });
                let payloads = verify_batch(
                    &round.context.helper.pool,
                    &inbound,
                    |from, msg| round.verify_message(from, msg),
                )?;
                let signature = round.finalize(payloads)?;
                self.state = Some(State::Done);
                debug!(party = %self.my_id, "signing session finished");
                Ok(Step::Done(signature))
            }
            State::Done => unreachable!("handled by the caller"),
        }
    }

    fn take_inbox<M>(
        &mut self,
        tag: u8,
        extract: impl Fn(MessageBody<P>) -> M,
    ) -> Vec<(PartyId, M)> {
        self.inbox
            .remove(&tag)
            .unwrap_or_default()
            .into_iter()
            .map(|(id, body)| (id, extract(body)))
            .collect()
    }

    fn wrap<M>(
        &self,
        messages: Vec<(PartyId, M)>,
        construct: impl Fn(M) -> MessageBody<P>,
    ) -> Vec<Message<P>> {
        messages
            .into_iter()
            .map(|(to, msg)| Message {
                from: self.my_id.clone(),
                to,
                body: construct(msg),
            })
            .collect()
    }
}

/// Verifies a batch of per-peer messages on the worker pool.
/// All verifications run to completion; the first error
/// in party-ID order wins.
fn verify_batch<M, T>(
    pool: &Pool,
    inbound: &[(PartyId, M)],
    verify: impl Fn(&PartyId, M) -> Result<T, Error> + Sync,
) -> Result<BTreeMap<PartyId, T>, Error>
where
    M: Clone + Sync,
    T: Send,
{
    let results = pool.map(inbound, |_idx, (from, msg)| verify(from, msg.clone()));
    results
        .into_iter()
        .zip(inbound.iter())
        .map(|(result, (from, _msg))| result.map(|payload| (from.clone(), payload)))
        .collect()
}
