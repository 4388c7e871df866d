//! Threshold ECDSA signing over secp256k1, implementing the signing phase
//! of the CMP protocol (Canetti-Gennaro-Goldfeder-Makriyannis-Peled).
//!
//! A committee of `n` parties, each holding a [`Config`] produced by key
//! generation, jointly signs a message digest through a [`SigningSession`];
//! any `threshold + 1` of them suffice, and no smaller coalition learns
//! anything about the key. Configs also support unhardened BIP32 child
//! derivation via [`Config::derive_child`].

mod cmp;
mod curve;
mod errors;
mod paillier;
mod tools;
mod uint;

// Some re-exports to avoid the need for version-matching
pub use k256;
pub use k256::ecdsa;
pub use signature;

pub use cmp::{
    Config, Message, MessageBody, PartyId, ProductionParams, PublicData, Round1Message,
    Round2Message, Round3Message, Round5Message, SchemeParams, SigningSession, Step, TestParams,
};
pub use curve::{ChainCode, RecoverableSignature};
pub use errors::Error;
