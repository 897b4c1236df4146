use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Granularity at which consecutive addresses rotate between the members of
/// an interleave set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum InterleaveSize {
    #[strum(serialize = "64B")]
    #[serde(rename = "64B")]
    Size64B,

    #[strum(serialize = "128B")]
    #[serde(rename = "128B")]
    Size128B,

    #[strum(serialize = "256B")]
    #[serde(rename = "256B")]
    Size256B,

    #[strum(serialize = "4KB")]
    #[serde(rename = "4KB")]
    Size4KB,

    #[strum(serialize = "1GB")]
    #[serde(rename = "1GB")]
    Size1GB,
}

impl InterleaveSize {
    /// Size of one interleave unit in bytes.
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Size64B => 64,
            Self::Size128B => 128,
            Self::Size256B => 256,
            Self::Size4KB => 4 << 10,
            Self::Size1GB => 1 << 30,
        }
    }
}

/// Interleave format of an app-direct region: the interleave size used
/// across memory controllers and the one used across channels.
///
/// The textual form is `<imc>_<channel>`, e.g. `4KB_4KB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterleaveFormat {
    pub imc: InterleaveSize,
    pub channel: InterleaveSize,
}

impl InterleaveFormat {
    pub const fn new(imc: InterleaveSize, channel: InterleaveSize) -> Self {
        Self { imc, channel }
    }
}

impl Default for InterleaveFormat {
    fn default() -> Self {
        Self::new(InterleaveSize::Size4KB, InterleaveSize::Size4KB)
    }
}

impl Display for InterleaveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.imc, self.channel)
    }
}

/// Error returned when an interleave format string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInterleaveFormatError(pub String);

impl Display for ParseInterleaveFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid interleave format '{}', expected '<imc>_<channel>'",
            self.0
        )
    }
}

impl std::error::Error for ParseInterleaveFormatError {}

impl FromStr for InterleaveFormat {
    type Err = ParseInterleaveFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseInterleaveFormatError(s.to_owned());
        let (imc, channel) = s.trim().split_once('_').ok_or_else(err)?;
        Ok(Self {
            imc: imc.parse().map_err(|_| err())?,
            channel: channel.parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for InterleaveFormat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InterleaveFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
