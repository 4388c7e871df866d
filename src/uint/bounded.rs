use super::{Integer, UintLike};

/// An unsigned integer carrying a bound on its bit size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounded<T> {
    /// bound on the bit size of the value
    bound: u32,
    value: T,
}

impl<T> Bounded<T>
where
    T: UintLike,
{
    pub fn new(value: T, bound: u32) -> Option<Self> {
        if bound as usize > <T as Integer>::BITS || value.bits() as u32 > bound {
            return None;
        }
        Some(Self { value, bound })
    }

    pub fn bound_usize(&self) -> usize {
        // Extracted into a method to localize the conversion
        self.bound as usize
    }
}

impl<T> AsRef<T> for Bounded<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use crypto_bigint::U1024;

    use super::Bounded;

    #[test]
    fn the_bound_is_enforced() {
        assert!(Bounded::new(U1024::from_u64(15), 4).is_some());
        assert!(Bounded::new(U1024::from_u64(16), 4).is_none());
    }
}
