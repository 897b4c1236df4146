//! Physical memory allocation layout computed from a request.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use sysdefs::interleave::InterleaveFormat;

use crate::{platform::Dimm, primitives::bytes::ByteCount, DimmId, SocketId};

/// Per-DIMM, per-interleave-set layout. A pure value: computing it never
/// touches a device.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemoryAllocationLayout {
    pub dimms: BTreeMap<DimmId, DimmLayout>,

    /// DIMM dedicated entirely to storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_dimm: Option<DimmId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<LayoutWarning>,
}

impl MemoryAllocationLayout {
    /// Seeds an empty layout with one entry per DIMM.
    pub fn new<'a>(dimms: impl IntoIterator<Item = &'a Dimm>) -> Self {
        Self {
            dimms: dimms
                .into_iter()
                .map(|dimm| (dimm.id.clone(), DimmLayout::from(dimm)))
                .collect(),
            ..Default::default()
        }
    }

    pub fn has_warning(&self, warning: LayoutWarning) -> bool {
        self.warnings.contains(&warning)
    }

    /// Records a warning once.
    pub fn add_warning(&mut self, warning: LayoutWarning) {
        if !self.has_warning(warning) {
            warn!("{}", warning.message());
            self.warnings.push(warning);
        }
    }

    pub fn is_reserved(&self, dimm_id: &str) -> bool {
        self.reserved_dimm.as_deref() == Some(dimm_id)
    }

    /// DIMMs that take part in volatile and app-direct apportionment, in
    /// layout order.
    pub fn eligible_dimms(&self) -> impl Iterator<Item = &DimmLayout> {
        self.dimms
            .values()
            .filter(|dimm| !self.is_reserved(&dimm.id))
    }

    /// Eligible DIMMs grouped by socket, each group in placement order.
    pub fn eligible_by_socket(&self) -> BTreeMap<SocketId, Vec<&DimmLayout>> {
        let mut sockets: BTreeMap<SocketId, Vec<&DimmLayout>> = BTreeMap::new();
        for dimm in self.eligible_dimms() {
            sockets.entry(dimm.socket_id).or_default().push(dimm);
        }
        for dimms in sockets.values_mut() {
            dimms.sort_by(|a, b| a.placement().cmp(&b.placement()));
        }
        sockets
    }

    /// Volatile capacity of all DIMMs, or `None` on overflow.
    pub fn total_volatile(&self) -> Option<ByteCount> {
        ByteCount::checked_sum(self.dimms.values().map(|dimm| dimm.volatile))
    }

    /// Raw app-direct capacity, mirror copies included.
    pub fn total_persistent(&self) -> Option<ByteCount> {
        ByteCount::checked_sum(self.dimms.values().map(DimmLayout::persistent_size))
    }

    pub fn total_storage(&self) -> Option<ByteCount> {
        ByteCount::checked_sum(self.dimms.values().map(|dimm| dimm.storage))
    }
}

/// Layout of a single DIMM.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DimmLayout {
    pub id: DimmId,
    pub socket_id: SocketId,
    pub memory_controller_id: u16,
    pub channel_id: u16,

    /// Raw capacity of the DIMM.
    pub capacity: ByteCount,

    #[serde(default)]
    pub volatile: ByteCount,

    /// App-direct regions ordered by interleave index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persistent: Vec<PersistentRegion>,

    #[serde(default)]
    pub storage: ByteCount,
}

impl From<&Dimm> for DimmLayout {
    fn from(dimm: &Dimm) -> Self {
        Self {
            id: dimm.id.clone(),
            socket_id: dimm.socket_id,
            memory_controller_id: dimm.memory_controller_id,
            channel_id: dimm.channel_id,
            capacity: dimm.capacity,
            volatile: ByteCount::ZERO,
            persistent: Vec::new(),
            storage: ByteCount::ZERO,
        }
    }
}

impl DimmLayout {
    pub fn placement(&self) -> (SocketId, u16, u16, &str) {
        (
            self.socket_id,
            self.memory_controller_id,
            self.channel_id,
            self.id.as_str(),
        )
    }

    /// Saturates at `u64::MAX`; `assigned` reports the overflow.
    pub fn persistent_size(&self) -> ByteCount {
        self.persistent
            .iter()
            .fold(ByteCount::ZERO, |total, region| total.saturating_add(region.size))
    }

    /// Sum of every region placed on the DIMM, or `None` on overflow.
    pub fn assigned(&self) -> Option<ByteCount> {
        self.persistent
            .iter()
            .try_fold(self.volatile, |total, region| total.checked_add(region.size))?
            .checked_add(self.storage)
    }

    /// Capacity not yet claimed by volatile or app-direct regions.
    pub fn free(&self) -> ByteCount {
        self.capacity
            .saturating_sub(self.volatile)
            .saturating_sub(self.persistent_size())
    }

    pub fn region(&self, interleave_index: u8) -> Option<&PersistentRegion> {
        self.persistent
            .iter()
            .find(|region| region.interleave_index == interleave_index)
    }

    pub fn region_mut(&mut self, interleave_index: u8) -> Option<&mut PersistentRegion> {
        self.persistent
            .iter_mut()
            .find(|region| region.interleave_index == interleave_index)
    }
}

/// Portion of a DIMM that belongs to an app-direct interleave set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersistentRegion {
    /// Position of the region on this DIMM, starting at 0.
    pub interleave_index: u8,

    /// Identifier shared by every member of the interleave set, starting at 1.
    pub set_id: u32,

    pub format: InterleaveFormat,

    /// Raw capacity of this DIMM used by the set.
    pub size: ByteCount,

    #[serde(default)]
    pub mirrored: bool,

    /// DIMM holding the mirror copy of this region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_partner: Option<DimmId>,

    /// Number of DIMMs in the interleave set.
    pub member_count: usize,
}

/// Recoverable shortfall recorded while computing a layout.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutWarning {
    AppDirectNotSupportedByDriver,
    StorageNotSupportedByDriver,
    PersistentSettingsNotRecommended,
    NonOptimalPopulation,
}

impl LayoutWarning {
    pub fn message(&self) -> &'static str {
        match self {
            Self::AppDirectNotSupportedByDriver => {
                "The requested goal will result in app-direct capacity which is not supported by the host software"
            }
            Self::StorageNotSupportedByDriver => {
                "The requested goal will result in storage capacity which is not supported by the host software"
            }
            Self::PersistentSettingsNotRecommended => {
                "The requested persistent settings are not recommended by the platform BIOS"
            }
            Self::NonOptimalPopulation => {
                "The requested goal will result in a non-optimal DIMM population"
            }
        }
    }
}
