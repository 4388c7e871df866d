mod encryption;
mod keys;
mod params;
mod ring_pedersen;

pub(crate) use encryption::Ciphertext;
pub(crate) use keys::{
    PublicKeyPaillier, PublicKeyPaillierPrecomputed, SecretKeyPaillier,
    SecretKeyPaillierPrecomputed,
};
pub(crate) use params::{PaillierParams, PaillierProduction, PaillierTest};
pub(crate) use ring_pedersen::{RPCommitment, RPParams, RPParamsMod};
