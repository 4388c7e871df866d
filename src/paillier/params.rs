use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::uint::{
    FromScalar, HasWide, U1024Mod, U2048Mod, U4096Mod, U512Mod, UintLike, UintModLike, U1024,
    U2048, U4096, U512,
};

pub trait PaillierParams:
    PartialEq + Eq + Clone + Copy + core::fmt::Debug + Send + Sync + 'static
{
    /// The size of one of the pair of RSA primes.
    const PRIME_BITS: usize;
    /// The size of the RSA modulus (a product of two primes).
    const MODULUS_BITS: usize = Self::PRIME_BITS * 2;
    /// An integer that fits a single RSA prime.
    type HalfUint: UintLike<ModUint = Self::HalfUintMod> + HasWide<Wide = Self::Uint> + Zeroize;
    /// A modulo-residue counterpart of `HalfUint`.
    type HalfUintMod: UintModLike<RawUint = Self::HalfUint>;
    /// An integer that fits the RSA modulus.
    type Uint: UintLike<ModUint = Self::UintMod>
        + FromScalar
        + HasWide<Wide = Self::WideUint>
        + Serialize
        + for<'de> Deserialize<'de>
        + Zeroize;
    /// A modulo-residue counterpart of `Uint`.
    type UintMod: UintModLike<RawUint = Self::Uint>;
    /// An integer that fits the squared RSA modulus.
    /// Used for Paillier ciphertexts.
    type WideUint: UintLike<ModUint = Self::WideUintMod> + Serialize + for<'de> Deserialize<'de>;
    /// A modulo-residue counterpart of `WideUint`.
    type WideUintMod: UintModLike<RawUint = Self::WideUint>;
}

/// Paillier parameters for testing purposes only.
///
/// The primes are the smallest for which the MtA plaintexts
/// (`gamma * k + beta` with `gamma`, `k` below the curve order and
/// `beta` in `+-2^LP_BOUND`) stay strictly within `+-N/2`,
/// so the centered decryption in the presigning remains correct.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierTest;

impl PaillierParams for PaillierTest {
    const PRIME_BITS: usize = 260;
    type HalfUint = U512;
    type HalfUintMod = U512Mod;
    type Uint = U1024;
    type UintMod = U1024Mod;
    type WideUint = U2048;
    type WideUintMod = U2048Mod;
}

/// Production-strength Paillier parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierProduction;

impl PaillierParams for PaillierProduction {
    const PRIME_BITS: usize = 1024;
    type HalfUint = U1024;
    type HalfUintMod = U1024Mod;
    type Uint = U2048;
    type UintMod = U2048Mod;
    type WideUint = U4096;
    type WideUintMod = U4096Mod;
}
