use std::{fmt::Display, num::ParseIntError, str::FromStr};

/// One gibibyte.
pub const GIB: u64 = 1 << 30;

/// A capacity in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteCount(pub u64);

impl From<u64> for ByteCount {
    fn from(x: u64) -> Self {
        ByteCount(x)
    }
}

impl ByteCount {
    pub const ZERO: ByteCount = ByteCount(0);

    pub const fn from_gib(gib: u64) -> Self {
        ByteCount(gib * GIB)
    }

    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: ByteCount) -> Option<ByteCount> {
        self.0.checked_add(other.0).map(ByteCount)
    }

    pub fn saturating_add(self, other: ByteCount) -> ByteCount {
        ByteCount(self.0.saturating_add(other.0))
    }

    /// Sums byte counts, or `None` on overflow.
    pub fn checked_sum(counts: impl IntoIterator<Item = ByteCount>) -> Option<ByteCount> {
        counts
            .into_iter()
            .try_fold(ByteCount::ZERO, ByteCount::checked_add)
    }

    pub fn checked_mul(self, factor: u64) -> Option<ByteCount> {
        self.0.checked_mul(factor).map(ByteCount)
    }

    pub fn saturating_sub(self, other: ByteCount) -> ByteCount {
        ByteCount(self.0.saturating_sub(other.0))
    }

    /// Rounds down to a multiple of `alignment`. A zero alignment leaves the
    /// value untouched.
    pub fn align_down(self, alignment: ByteCount) -> ByteCount {
        match alignment.0 {
            0 => self,
            a => ByteCount(self.0 - self.0 % a),
        }
    }

    /// Rounds up to a multiple of `alignment`, or `None` on overflow.
    pub fn align_up(self, alignment: ByteCount) -> Option<ByteCount> {
        match alignment.0 {
            0 => Some(self),
            a => match self.0 % a {
                0 => Some(self),
                rem => self.0.checked_add(a - rem).map(ByteCount),
            },
        }
    }

    pub fn to_human_readable(&self) -> String {
        match self.0.trailing_zeros() {
            _ if self.0 == 0 => "0".to_owned(),
            0..=9 => format!("{}", self.0),
            10..=19 => format!("{}K", self.0 >> 10),
            20..=29 => format!("{}M", self.0 >> 20),
            30..=39 => format!("{}G", self.0 >> 30),
            _ => format!("{}T", self.0 >> 40),
        }
    }

    pub fn from_human_readable(mut s: &str) -> Result<Self, ParseByteCountError> {
        s = s.trim();
        let try_parse = |val: &str, shift: u32| {
            let value = val.trim().parse::<u64>()?;
            value
                .checked_mul(1 << shift)
                .map(Self)
                .ok_or(ParseByteCountError::Overflow)
        };
        if let Some(p) = s.strip_suffix('K') {
            try_parse(p, 10)
        } else if let Some(p) = s.strip_suffix('M') {
            try_parse(p, 20)
        } else if let Some(p) = s.strip_suffix('G') {
            try_parse(p, 30)
        } else if let Some(p) = s.strip_suffix('T') {
            try_parse(p, 40)
        } else {
            try_parse(s, 0)
        }
    }
}

/// Error returned when a human-readable byte count cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseByteCountError {
    #[error(transparent)]
    InvalidNumber(#[from] ParseIntError),
    #[error("byte count does not fit in 64 bits")]
    Overflow,
}

impl Display for ByteCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

impl FromStr for ByteCount {
    type Err = ParseByteCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_human_readable(s.trim())
    }
}

impl<'de> serde::Deserialize<'de> for ByteCount {
    fn deserialize<D>(deserializer: D) -> Result<ByteCount, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Size may be provided as a string (e.g. "1K") or as a pure number
        // (e.g. 1024). Serde forces a number when only digits are provided, so
        // we need to deserialize as a generic value and then check the type.
        let value = serde_yaml::Value::deserialize(deserializer)?;

        match value {
            serde_yaml::Value::String(s) => ByteCount::from_str(s.as_str())
                .map_err(|e| serde::de::Error::custom(format!("invalid byte count size: {e}"))),
            serde_yaml::Value::Number(n) => {
                let n = n.as_u64().ok_or_else(|| {
                    serde::de::Error::custom("invalid byte count size, expected unsigned integer")
                })?;
                Ok(ByteCount(n))
            }
            _ => Err(serde::de::Error::custom("invalid byte count size")),
        }
    }
}

impl serde::Serialize for ByteCount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.0 & 0x3FF != 0 {
            // If the count is not a multiple of 1024, then we must write it as
            // a raw number. In this case, we serialize it as a number.
            serializer.serialize_u64(self.0)
        } else {
            // Serialize as a string if the value is a multiple of 1024
            serializer.serialize_str(self.to_human_readable().as_str())
        }
    }
}
