use bip32::{ChildNumber, PublicKey as _};

pub use bip32::ChainCode;

use super::arithmetic::{Point, Scalar};
use crate::errors::Error;

/// Derives the additive tweak and the child chain code for an unhardened
/// child of the given public point, per BIP-0032.
///
/// Panics when called with a hardened index, since deriving those requires
/// the private key. Returns [`Error::InvalidChild`] in the (astronomically
/// rare) case the standard says to skip the index.
pub(crate) fn derive_tweak(
    public: &Point,
    chain_code: &ChainCode,
    index: u32,
) -> Result<(Scalar, ChainCode), Error> {
    let child_number = ChildNumber(index);
    assert!(
        !child_number.is_hardened(),
        "hardened derivation requires the secret key"
    );

    let vkey = public.to_verifying_key().ok_or(Error::InvalidChild)?;
    let (tweak, child_chain_code) = vkey
        .derive_tweak(chain_code, child_number)
        .map_err(|_| Error::InvalidChild)?;
    let scalar = Scalar::try_from_be_bytes(&tweak).map_err(|_| Error::InvalidChild)?;

    Ok((scalar, child_chain_code))
}

#[cfg(test)]
mod tests {
    use rand_core::{OsRng, RngCore};

    use super::super::arithmetic::Scalar;
    use super::derive_tweak;

    #[test]
    fn tweak_commutes_with_the_group_operation() {
        let secret = Scalar::random(&mut OsRng);
        let public = secret.mul_by_generator();
        let mut chain_code = [0u8; 32];
        OsRng.fill_bytes(&mut chain_code);

        let (tweak, child_chain_code) = derive_tweak(&public, &chain_code, 0).unwrap();
        assert_ne!(child_chain_code, chain_code);

        // The child public key can be computed either from the tweaked secret
        // or by shifting the parent public key.
        let child_public = (secret + tweak).mul_by_generator();
        assert_eq!(child_public, public + tweak.mul_by_generator());
    }

    #[test]
    fn derivation_is_deterministic() {
        let public = Scalar::random(&mut OsRng).mul_by_generator();
        let chain_code = [7u8; 32];
        assert_eq!(
            derive_tweak(&public, &chain_code, 5).unwrap(),
            derive_tweak(&public, &chain_code, 5).unwrap()
        );
        assert_ne!(
            derive_tweak(&public, &chain_code, 5).unwrap(),
            derive_tweak(&public, &chain_code, 6).unwrap()
        );
    }

    #[test]
    #[should_panic]
    fn hardened_index_panics() {
        let public = Scalar::random(&mut OsRng).mul_by_generator();
        let _ = derive_tweak(&public, &[0u8; 32], 1 << 31);
    }
}
