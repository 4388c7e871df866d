//! The CMP threshold signing protocol: the per-party [`Config`] artifact,
//! the five signing rounds, and the session state machine driving them.

mod config;
mod params;
mod party;
mod session;
mod sigma;
mod signing;

#[cfg(test)]
mod signing_tests;

pub use config::{Config, PublicData};
pub use params::{ProductionParams, SchemeParams, TestParams};
pub use party::PartyId;
pub use session::{Message, MessageBody, SigningSession, Step};
pub use signing::{Round1Message, Round2Message, Round3Message, Round5Message};
