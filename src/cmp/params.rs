use core::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::curve::ORDER;
use crate::paillier::{PaillierParams, PaillierProduction, PaillierTest};
use crate::uint::upcast_uint;

/// Signing scheme parameters.
pub trait SchemeParams: 'static + Clone + Copy + Debug + PartialEq + Eq + Send + Sync {
    /// The scheme's statistical security parameter, in bits.
    const SECURITY_PARAMETER: usize; // $\kappa$
    /// The bound for the secret values in range proofs.
    const L_BOUND: usize; // $\ell$
    /// The bound for the MtA masks.
    const LP_BOUND: usize; // $\ell^\prime$
    /// The slackness bound for range checks.
    const EPS_BOUND: usize; // $\eps$
    /// The parameters of the Paillier encryption.
    ///
    /// Note: `PaillierParams::Uint` must be able to contain the full range of curve
    /// scalar values plus one bit (so that any curve scalar still represents
    /// a positive value when treated as a 2-complement signed integer).
    type Paillier: PaillierParams;
    /// The order of the curve, as the Paillier plaintext integer type.
    const CURVE_ORDER: <Self::Paillier as PaillierParams>::Uint; // $q$

    /// Returns `true` if the parameters satisfy the inequalities required
    /// for the range proofs and the MtA conversions to be sound and complete.
    fn are_self_consistent() -> bool {
        Self::SECURITY_PARAMETER <= Self::L_BOUND
            && Self::EPS_BOUND >= Self::SECURITY_PARAMETER + Self::L_BOUND
            // An honest MtA plaintext `gamma * k + beta` (with up to 32 summands of each kind)
            // must stay within `+-N/2` for the centered decryption to be correct.
            && <Self::Paillier as PaillierParams>::MODULUS_BITS - 2
                > (2 * Self::L_BOUND).max(Self::LP_BOUND + 2) + 5
            // The widest proof response must fit the plaintext integer type with its sign bit.
            && Self::LP_BOUND + Self::EPS_BOUND + 2
                < <<Self::Paillier as PaillierParams>::Uint as crypto_bigint::Integer>::BITS
    }
}

/// Scheme parameters **for testing purposes only**.
/// Security is weakened to allow for faster execution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestParams;

impl SchemeParams for TestParams {
    const SECURITY_PARAMETER: usize = 64;
    const L_BOUND: usize = 256;
    const LP_BOUND: usize = 256;
    const EPS_BOUND: usize = 320;
    type Paillier = PaillierTest;
    const CURVE_ORDER: <Self::Paillier as PaillierParams>::Uint = upcast_uint(ORDER);
}

/// Production-strength parameters (Table 2 of the paper).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionParams;

impl SchemeParams for ProductionParams {
    const SECURITY_PARAMETER: usize = 256;
    const L_BOUND: usize = 256;
    const LP_BOUND: usize = Self::L_BOUND * 5;
    const EPS_BOUND: usize = Self::L_BOUND * 2;
    type Paillier = PaillierProduction;
    const CURVE_ORDER: <Self::Paillier as PaillierParams>::Uint = upcast_uint(ORDER);
}

#[cfg(test)]
mod tests {
    use super::{ProductionParams, SchemeParams, TestParams};

    #[test]
    fn parameter_consistency() {
        assert!(TestParams::are_self_consistent());
        assert!(ProductionParams::are_self_consistent());
    }
}
