use k256::ecdsa::{signature::hazmat::PrehashVerifier, RecoveryId, Signature as BackendSignature, VerifyingKey};

use super::arithmetic::{Point, Scalar};

/// A wrapper for a signature and public key recovery info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    signature: BackendSignature,
    recovery_id: RecoveryId,
}

impl RecoverableSignature {
    /// Assembles a signature from the `r` and `s` scalars, normalizing `s`
    /// to the low half of the group order, and checks it against the given
    /// verifying key and prehashed message. Returns `None` for any (r, s)
    /// that does not pass standard ECDSA verification.
    pub(crate) fn from_scalars(r: &Scalar, s: &Scalar, vkey: &Point, message: &Scalar) -> Option<Self> {
        let signature = BackendSignature::from_scalars(r.to_backend(), s.to_backend()).ok()?;

        // Normalize the `s` component.
        // `BackendSignature`'s constructor does not require `s` to be normalized,
        // but consequent usage of it may fail otherwise.
        let signature = signature.normalize_s().unwrap_or(signature);

        let vkey = vkey.to_verifying_key()?;
        let message_bytes = message.to_be_bytes();

        vkey.verify_prehash(&message_bytes, &signature).ok()?;

        let recovery_id =
            RecoveryId::trial_recovery_from_prehash(&vkey, &message_bytes, &signature).ok()?;

        Some(Self { signature, recovery_id })
    }

    /// Unwraps into the signature and recovery info objects from the backend crate.
    pub fn to_backend(self) -> (BackendSignature, RecoveryId) {
        (self.signature, self.recovery_id)
    }
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
    use rand_core::OsRng;

    use super::super::arithmetic::{Point, Scalar};
    use super::RecoverableSignature;

    #[test]
    fn roundtrip_with_backend_signature() {
        let sk = SigningKey::random(&mut OsRng);
        let message = Scalar::random(&mut OsRng);

        let signature: Signature = sk.sign_prehash(&message.to_be_bytes()).unwrap();
        let (r, s) = signature.split_scalars();
        let r = Scalar::try_from_be_bytes(&r.to_bytes()).unwrap();
        let s = Scalar::try_from_be_bytes(&s.to_bytes()).unwrap();

        let vkey = Point::from_verifying_key(sk.verifying_key());
        let recoverable = RecoverableSignature::from_scalars(&r, &s, &vkey, &message).unwrap();
        let (sig, _rec_id) = recoverable.to_backend();

        // The output is always low-s, whatever the backend produced.
        assert!(sig.normalize_s().is_none());
        assert_eq!(sig.r().to_bytes(), signature.r().to_bytes());
    }

    #[test]
    fn garbage_scalars_are_rejected() {
        let sk = SigningKey::random(&mut OsRng);
        let vkey = Point::from_verifying_key(sk.verifying_key());
        let message = Scalar::random(&mut OsRng);
        let r = Scalar::random_nonzero(&mut OsRng);
        let s = Scalar::random_nonzero(&mut OsRng);
        assert!(RecoverableSignature::from_scalars(&r, &s, &vkey, &message).is_none());
    }

    #[test]
    fn zero_s_is_rejected() {
        let sk = SigningKey::random(&mut OsRng);
        let vkey = Point::from_verifying_key(sk.verifying_key());
        let message = Scalar::random(&mut OsRng);
        let r = Scalar::random_nonzero(&mut OsRng);
        assert!(RecoverableSignature::from_scalars(&r, &Scalar::ZERO, &vkey, &message).is_none());
    }
}
