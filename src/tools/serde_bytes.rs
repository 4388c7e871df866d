//! Convenience functions to serialize byte sequences efficiently
//! both in binary and human-readable formats.

use core::any::type_name;
use core::fmt;
use core::marker::PhantomData;

use serde::{de, Deserializer, Serializer};

// A type of a trait alias, to work around https://github.com/rust-lang/rust/issues/113517
// If not for that issue, we could just use `TryFrom<&'a [u8]>` directly in the bounds.
pub(crate) trait TryFromBytes<'a, E>: TryFrom<&'a [u8], Error = E> {}

impl<'a, T> TryFromBytes<'a, T::Error> for T where T: TryFrom<&'a [u8]> {}

struct HexVisitor<T, V>(PhantomData<T>, PhantomData<V>);

impl<T, V> de::Visitor<'_> for HexVisitor<T, V>
where
    T: for<'a> TryFromBytes<'a, V>,
    V: fmt::Display,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x-prefixed hex-encoded bytes of {}", type_name::<T>())
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.len() < 2 {
            return Err(de::Error::invalid_length(v.len(), &"0x-prefixed hex-encoded bytes"));
        }
        if &v[..2] != "0x" {
            return Err(de::Error::invalid_value(
                de::Unexpected::Str(v),
                &"0x-prefixed hex-encoded bytes",
            ));
        }
        let bytes = hex::decode(&v[2..]).map_err(de::Error::custom)?;
        T::try_from(&bytes).map_err(de::Error::custom)
    }
}

struct BytesVisitor<T, V>(PhantomData<T>, PhantomData<V>);

impl<T, V> de::Visitor<'_> for BytesVisitor<T, V>
where
    T: for<'a> TryFromBytes<'a, V>,
    V: fmt::Display,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", type_name::<T>())
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        T::try_from(v).map_err(de::Error::custom)
    }
}

pub(crate) mod as_hex {
    //! Serialization functions using hex (`0x`-prefixed) representation
    //! for bytestrings in human-readable formats, and plain bytes in binary ones.
    //!
    //! To be used in `[serde(with)]` field attributes.

    use super::*;

    pub(crate) fn serialize<T, S>(obj: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("0x{}", hex::encode(obj.as_ref())))
        } else {
            serializer.serialize_bytes(obj.as_ref())
        }
    }

    pub(crate) fn deserialize<'de, T, V, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: for<'a> TryFromBytes<'a, V>,
        V: fmt::Display,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(HexVisitor::<T, V>(PhantomData, PhantomData))
        } else {
            deserializer.deserialize_bytes(BytesVisitor::<T, V>(PhantomData, PhantomData))
        }
    }
}
