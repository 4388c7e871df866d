//! This module is an adapter to the ECC backend.
//! `elliptic_curves` has a somewhat unstable API,
//! and we isolate all the related logic here.

mod arithmetic;
mod bip32;
mod ecdsa;

pub(crate) use arithmetic::{Point, Scalar, ORDER};
pub(crate) use bip32::derive_tweak;

pub use self::bip32::ChainCode;
pub use self::ecdsa::RecoverableSignature;
