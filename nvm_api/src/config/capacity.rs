use std::{fmt::Display, str::FromStr};

use crate::{
    constants::CAPACITY_REMAINING,
    primitives::bytes::{ByteCount, ParseByteCountError},
};

/// Requested capacity of a memory region.
/// Serialize and Deserialize traits are implemented manually below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// # Explicit
    ///
    /// Fixed capacity in bytes.
    Explicit(ByteCount),

    /// # Remaining
    ///
    /// Whatever is left on each DIMM after every other region is placed.
    ///
    /// String equivalent is defined in constants::CAPACITY_REMAINING
    Remaining,
}

impl Capacity {
    pub fn is_remaining(&self) -> bool {
        matches!(self, Capacity::Remaining)
    }

    /// Returns the explicit size, if any.
    pub fn explicit(&self) -> Option<ByteCount> {
        match self {
            Capacity::Explicit(size) => Some(*size),
            Capacity::Remaining => None,
        }
    }

    /// Whether this capacity asks for anything at all. Explicit zero is a
    /// no-op request.
    pub fn is_requested(&self) -> bool {
        match self {
            Capacity::Explicit(size) => !size.is_zero(),
            Capacity::Remaining => true,
        }
    }
}

impl FromStr for Capacity {
    type Err = ParseByteCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.eq_ignore_ascii_case(CAPACITY_REMAINING) {
            Capacity::Remaining
        } else {
            Capacity::Explicit(ByteCount::from_human_readable(s)?)
        })
    }
}

impl From<ByteCount> for Capacity {
    fn from(n: ByteCount) -> Self {
        Capacity::Explicit(n)
    }
}

impl Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capacity::Explicit(n) => write!(f, "{n}"),
            Capacity::Remaining => write!(f, "{}", CAPACITY_REMAINING),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Capacity {
    fn deserialize<D>(deserializer: D) -> Result<Capacity, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Capacity may be provided as a string (e.g. "100G" or "remaining")
        // or as a pure number of bytes.
        let value = serde_yaml::Value::deserialize(deserializer)?;

        match value {
            serde_yaml::Value::String(s) => Capacity::from_str(s.as_str())
                .map_err(|e| serde::de::Error::custom(format!("invalid capacity: {e}"))),
            serde_yaml::Value::Number(n) => {
                let n = n.as_u64().ok_or_else(|| {
                    serde::de::Error::custom("invalid capacity, expected unsigned integer")
                })?;
                Ok(Capacity::Explicit(ByteCount(n)))
            }
            _ => Err(serde::de::Error::custom("invalid capacity")),
        }
    }
}

impl serde::Serialize for Capacity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}
