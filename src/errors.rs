use std::collections::BTreeSet;

use displaydoc::Display;

use crate::cmp::PartyId;

/// Errors produced by the signing protocol and its supporting operations.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Error {
    /// Malformed bytes at the wire layer ({0})
    InvalidEncoding(String),
    /// Message violates round expectations ({0})
    MalformedMessage(String),
    /// A zero-knowledge proof failed to verify ({0})
    ProofFailure(String),
    /// A protocol consistency check failed ({0})
    ProtocolAbort(String),
    /// Invalid configuration ({0})
    ConfigInvalid(String),
    /// BIP32 derivation produced an invalid scalar for this index
    InvalidChild,
    /// Peers failed to deliver a required round message before the deadline
    ProtocolTimeout {
        /// The parties whose messages are missing.
        missing: BTreeSet<PartyId>,
    },
}

impl std::error::Error for Error {}
