// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resource quantities such as "512M" or "1Gi".

use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const BINARY_SUFFIXES: &[(&str, u64)] = &[
    ("Ei", 1 << 60),
    ("Pi", 1 << 50),
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

const DECIMAL_SUFFIXES: &[(&str, u64)] = &[
    ("E", 1_000_000_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("T", 1_000_000_000_000),
    ("G", 1_000_000_000),
    ("M", 1_000_000),
    ("k", 1_000),
];

/// The family of suffixes a quantity is rendered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QuantityFormat {
    /// Powers of two: Ki, Mi, Gi, ...
    #[default]
    BinarySI,
    /// Powers of ten: k, M, G, ...
    DecimalSI,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityParseError {
    #[error("quantity {0:?} is empty")]
    Empty(String),

    #[error("quantity {0:?} does not start with an unsigned integer")]
    InvalidNumber(String),

    #[error("quantity {0:?} has unrecognized suffix {1:?}")]
    UnknownSuffix(String, String),

    #[error("quantity {0:?} does not fit in 64 bits")]
    Overflow(String),
}

/// A non-negative, integral resource quantity.
///
/// Two quantities compare equal when they denote the same number of base
/// units, regardless of the suffix family they were written with; "1Gi" and
/// "1073741824" are the same quantity.
#[derive(Clone, Copy, Debug, Default)]
pub struct Quantity {
    value: u64,
    format: QuantityFormat,
}

impl Quantity {
    pub const fn new(value: u64, format: QuantityFormat) -> Self {
        Self { value, format }
    }

    /// A quantity of `value` base units rendered with binary suffixes.
    pub const fn from_bytes(value: u64) -> Self {
        Self::new(value, QuantityFormat::BinarySI)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub fn format(&self) -> QuantityFormat {
        self.format
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl FromStr for Quantity {
    type Err = QuantityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(QuantityParseError::Empty(s.to_owned()));
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, suffix) = trimmed.split_at(split);
        let number: u64 = digits
            .parse()
            .map_err(|_| QuantityParseError::InvalidNumber(s.to_owned()))?;

        if suffix.is_empty() {
            return Ok(Self::new(number, QuantityFormat::DecimalSI));
        }

        let (multiplier, format) = BINARY_SUFFIXES
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|(_, mult)| (*mult, QuantityFormat::BinarySI))
            .or_else(|| {
                DECIMAL_SUFFIXES
                    .iter()
                    .find(|(name, _)| *name == suffix)
                    .map(|(_, mult)| (*mult, QuantityFormat::DecimalSI))
            })
            .ok_or_else(|| {
                QuantityParseError::UnknownSuffix(
                    s.to_owned(),
                    suffix.to_owned(),
                )
            })?;

        let value = number
            .checked_mul(multiplier)
            .ok_or_else(|| QuantityParseError::Overflow(s.to_owned()))?;

        Ok(Self::new(value, format))
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suffixes = match self.format {
            QuantityFormat::BinarySI => BINARY_SUFFIXES,
            QuantityFormat::DecimalSI => DECIMAL_SUFFIXES,
        };

        if self.value != 0 {
            for (name, mult) in suffixes {
                if self.value % mult == 0 {
                    return write!(f, "{}{}", self.value / mult, name);
                }
            }
        }

        write!(f, "{}", self.value)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'d> Deserialize<'d> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'d>,
    {
        deserializer.deserialize_any(QuantityVisitor)
    }
}

/// Accepts the string form as well as a bare integer count of base units.
struct QuantityVisitor;

impl<'d> de::Visitor<'d> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a quantity string or a non-negative integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
        Quantity::from_str(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
        Ok(Quantity::new(v, QuantityFormat::DecimalSI))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
        }
    }
}

impl JsonSchema for Quantity {
    fn schema_name() -> String {
        "Quantity".to_owned()
    }

    fn json_schema(
        gen: &mut schemars::gen::SchemaGenerator,
    ) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}
