mod bounded;
mod signed;
mod traits;

pub(crate) use crypto_bigint::{
    modular::Retrieve, subtle, CheckedAdd, CheckedMul, CheckedSub, Encoding, Integer, Invert,
    NonZero, PowBoundedExp, RandomMod, U1024, U2048, U4096, U512,
};
pub(crate) use crypto_primes::RandomPrimeWithRng;

pub(crate) use bounded::Bounded;
pub(crate) use signed::Signed;
pub(crate) use traits::{
    upcast_uint, FromScalar, HasWide, U1024Mod, U2048Mod, U4096Mod, U512Mod, UintLike, UintModLike,
};
