//! The Sigma-protocols authenticating the signing rounds,
//! made non-interactive by Fiat-Shamir over per-party transcripts.

mod aff_g;
mod enc;
mod log_star;

pub(crate) use aff_g::AffGProof;
pub(crate) use enc::EncProof;
pub(crate) use log_star::LogStarProof;
