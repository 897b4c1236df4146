use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Memory modes a persistent memory platform can expose. The BIOS and the
/// DIMM SKU together decide which of them are available.
#[bitflags]
#[repr(u8)]
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MemoryMode {
    /// Capacity used as volatile system memory.
    Volatile = 1 << 0,
    /// Directly addressable persistent memory.
    AppDirect = 1 << 1,
    /// Block-addressed storage capacity.
    Storage = 1 << 2,
    /// Mirrored app-direct regions.
    Mirror = 1 << 3,
}

/// (De)serializes a set of memory modes as a list of names rather than as the
/// raw bit representation, e.g. `[volatile, app-direct]`.
pub mod serde_list {
    use super::*;

    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(modes: &BitFlags<MemoryMode>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(modes.iter())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitFlags<MemoryMode>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Vec::<MemoryMode>::deserialize(deserializer)?
            .into_iter()
            .collect())
    }
}
