//! Configuration goals, the per-DIMM slices of a layout handed to the device
//! library and persisted until the platform applies them.

use serde::{Deserialize, Serialize};
use sysdefs::interleave::InterleaveFormat;

use crate::{
    layout::{DimmLayout, MemoryAllocationLayout, PersistentRegion},
    primitives::bytes::ByteCount,
    DimmId, SocketId,
};

/// Configuration goal of one DIMM.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigGoal {
    pub dimm_id: DimmId,
    pub socket_id: SocketId,
    pub volatile_size: ByteCount,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interleave_sets: Vec<GoalInterleaveSet>,

    #[serde(default)]
    pub storage_size: ByteCount,

    /// The DIMM is dedicated to storage.
    #[serde(default)]
    pub reserved: bool,

    #[serde(default)]
    pub status: GoalStatus,
}

impl ConfigGoal {
    /// Builds the goal of one DIMM of a layout. Placeholder regions that
    /// ended up empty are dropped.
    pub fn new(dimm: &DimmLayout, reserved: bool) -> Self {
        Self {
            dimm_id: dimm.id.clone(),
            socket_id: dimm.socket_id,
            volatile_size: dimm.volatile,
            interleave_sets: dimm
                .persistent
                .iter()
                .filter(|region| !region.size.is_zero())
                .map(GoalInterleaveSet::from)
                .collect(),
            storage_size: dimm.storage,
            reserved,
            status: GoalStatus::New,
        }
    }

    /// Whether the goal shares an interleave set with other DIMMs.
    pub fn spans_dimms(&self) -> bool {
        self.interleave_sets.iter().any(|set| set.member_count > 1)
    }
}

impl MemoryAllocationLayout {
    /// Goals of every DIMM in layout order.
    pub fn goals(&self) -> impl Iterator<Item = ConfigGoal> + '_ {
        self.dimms
            .values()
            .map(|dimm| ConfigGoal::new(dimm, self.is_reserved(&dimm.id)))
    }
}

/// One app-direct interleave set of a goal.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoalInterleaveSet {
    pub interleave_index: u8,
    pub set_id: u32,
    pub size: ByteCount,
    pub format: InterleaveFormat,

    #[serde(default)]
    pub mirrored: bool,

    pub member_count: usize,
}

impl From<&PersistentRegion> for GoalInterleaveSet {
    fn from(region: &PersistentRegion) -> Self {
        Self {
            interleave_index: region.interleave_index,
            set_id: region.set_id,
            size: region.size,
            format: region.format,
            mirrored: region.mirrored,
            member_count: region.member_count,
        }
    }
}

/// Lifecycle of a goal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    /// Committed, waiting for the platform to apply it on the next boot.
    #[default]
    New,

    /// Applied by the platform.
    Applied,

    /// Rejected by the platform.
    Failed,
}
