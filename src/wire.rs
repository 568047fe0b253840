//! JSON encoding for floats that may be non-finite.
//!
//! JSON has no NaN or infinity. Finite values are written as plain numbers;
//! non-finite values are written as the string tokens `"NaN"`, `"Infinity"`
//! and `"-Infinity"`. Decoding accepts either form, so a value always comes
//! back as the same `f64` it went out as.
//!
//! Use [`WireF64`] directly, or `#[serde(with = "crate::wire::float")]` on a
//! plain `f64` field.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const NAN_TOKEN: &str = "NaN";
pub const POS_INF_TOKEN: &str = "Infinity";
pub const NEG_INF_TOKEN: &str = "-Infinity";

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct WireF64(pub f64);

impl From<f64> for WireF64 {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<WireF64> for f64 {
    fn from(value: WireF64) -> Self {
        value.0
    }
}

impl Serialize for WireF64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if v.is_nan() {
            serializer.serialize_str(NAN_TOKEN)
        } else if v == f64::INFINITY {
            serializer.serialize_str(POS_INF_TOKEN)
        } else if v == f64::NEG_INFINITY {
            serializer.serialize_str(NEG_INF_TOKEN)
        } else {
            serializer.serialize_f64(v)
        }
    }
}

struct WireF64Visitor;

impl Visitor<'_> for WireF64Visitor {
    type Value = WireF64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or one of \"NaN\", \"Infinity\", \"-Infinity\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<WireF64, E> {
        Ok(WireF64(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<WireF64, E> {
        Ok(WireF64(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<WireF64, E> {
        Ok(WireF64(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<WireF64, E> {
        match v {
            NAN_TOKEN => Ok(WireF64(f64::NAN)),
            POS_INF_TOKEN => Ok(WireF64(f64::INFINITY)),
            NEG_INF_TOKEN => Ok(WireF64(f64::NEG_INFINITY)),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for WireF64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(WireF64Visitor)
    }
}

/// `serde(with)` adapter for plain `f64` fields.
pub mod float {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::WireF64;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        WireF64(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        WireF64::deserialize(deserializer).map(f64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug)]
    struct Row {
        #[serde(with = "float")]
        cost: f64,
        rr: Option<WireF64>,
    }

    #[test]
    fn non_finite_values_become_tokens() {
        let row = Row { cost: f64::INFINITY, rr: Some(WireF64(f64::NAN)) };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"cost":"Infinity","rr":"NaN"}"#);
    }

    #[test]
    fn finite_values_stay_numbers() {
        let row = Row { cost: 12.5, rr: None };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"cost":12.5,"rr":null}"#);
    }

    #[test]
    fn decodes_tokens_and_numbers() {
        let row: Row = serde_json::from_str(r#"{"cost":"-Infinity","rr":3}"#).unwrap();
        assert_eq!(row.cost, f64::NEG_INFINITY);
        assert_eq!(row.rr, Some(WireF64(3.0)));

        let bad = serde_json::from_str::<Row>(r#"{"cost":"lots","rr":null}"#);
        assert!(bad.is_err());
    }
}
