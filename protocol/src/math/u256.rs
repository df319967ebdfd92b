//! The 256-bit unsigned integer backing every amount, plus its string
//! serialization. JSON consumers choke on integers wider than 2^53, so the
//! wire form is always a decimal string.

#![allow(clippy::assign_op_pattern, clippy::manual_div_ceil)]

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer.
    pub struct U256(4);
}

impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecimalVisitor;

        impl<'de> Visitor<'de> for DecimalVisitor {
            type Value = U256;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
                U256::from_dec_str(v).map_err(|e| E::custom(format!("invalid U256 {v:?}: {e:?}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
                Ok(U256::from(v))
            }
        }

        // bincode cannot drive `deserialize_any`, so only self-describing
        // formats get the lenient integer path.
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(DecimalVisitor)
        } else {
            deserializer.deserialize_str(DecimalVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_decimal_strings() {
        let value = U256::from(10_000_000_000_000u64);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"10000000000000\"");
        let back: U256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn json_accepts_plain_integers() {
        let back: U256 = serde_json::from_str("42").unwrap();
        assert_eq!(back, U256::from(42u64));
    }

    #[test]
    fn bincode_round_trip() {
        let value = U256::MAX;
        let bytes = bincode::serialize(&value).unwrap();
        let back: U256 = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<U256>("\"12ab\"").is_err());
    }
}
