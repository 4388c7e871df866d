use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::curve::Scalar;
use crate::tools::hashing::{Chain, FofHasher};
use crate::tools::sss::interpolation_coeff;

const PARTY_ID_DST: &[u8] = b"Party ID";

/// An identifier of a protocol party.
///
/// Identifiers order deterministically (and identically on every node),
/// and map to non-zero scalars used as Shamir evaluation points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The Shamir evaluation point of this party, a non-zero scalar
    /// derived deterministically from the identifier.
    pub(crate) fn scalar(&self) -> Scalar {
        let mut counter = 0u8;
        loop {
            let scalar = FofHasher::new_with_dst(PARTY_ID_DST)
                .chain(&self.0)
                .chain(&counter)
                .finalize_to_scalar();
            if !scalar.is_zero() {
                return scalar;
            }
            counter = counter.wrapping_add(1);
        }
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The Lagrange coefficients at zero for the evaluation points of the given parties.
///
/// The result does not depend on the iteration order of `ids`.
pub(crate) fn lagrange_coefficients(ids: &BTreeSet<PartyId>) -> BTreeMap<PartyId, Scalar> {
    let points = ids.iter().map(PartyId::scalar).collect::<BTreeSet<_>>();
    ids.iter()
        .map(|id| (id.clone(), interpolation_coeff(&points, &id.scalar())))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand_core::OsRng;

    use super::{lagrange_coefficients, PartyId};
    use crate::curve::Scalar;
    use crate::tools::sss::Polynomial;

    #[test]
    fn scalars_are_stable_and_distinct() {
        let a = PartyId::new("alice");
        assert_eq!(a.scalar(), PartyId::new("alice").scalar());
        assert_ne!(a.scalar(), PartyId::new("bob").scalar());
        assert!(!a.scalar().is_zero());
    }

    #[test]
    fn lagrange_interpolation_recovers_the_constant_term() {
        let ids = ["alice", "bob", "charlie", "dave"]
            .into_iter()
            .map(PartyId::from)
            .collect::<BTreeSet<_>>();

        let f = Polynomial::random(&mut OsRng, &Scalar::random(&mut OsRng), ids.len() - 1);
        let coeffs = lagrange_coefficients(&ids);

        let interpolated: Scalar = ids
            .iter()
            .map(|id| coeffs[id] * f.evaluate(&id.scalar()))
            .sum();
        assert_eq!(interpolated, f.evaluate(&Scalar::ZERO));
    }
}
