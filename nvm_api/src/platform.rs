//! Inventory and capability data of a persistent memory platform, as seen by
//! the layout engine.

use enumflags2::BitFlags;
use serde::{Deserialize, Serialize};
use sysdefs::{
    interleave::InterleaveFormat,
    memory_modes::{serde_list, MemoryMode},
};

use crate::{
    constants::{DEFAULT_ALIGNMENT, MAX_INTERLEAVE_SETS_PER_DIMM},
    primitives::bytes::ByteCount,
    DimmId, SocketId,
};

/// A manageable NVDIMM.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Dimm {
    pub id: DimmId,
    pub socket_id: SocketId,
    pub memory_controller_id: u16,
    pub channel_id: u16,
    pub capacity: ByteCount,
}

impl Dimm {
    /// Physical placement key. Sorting by it walks sockets, then memory
    /// controllers, then channels.
    pub fn placement(&self) -> (SocketId, u16, u16, &str) {
        (
            self.socket_id,
            self.memory_controller_id,
            self.channel_id,
            self.id.as_str(),
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PoolKind {
    AppDirect,
    Storage,
}

/// Existing aggregation of app-direct or storage capacity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Pool {
    pub id: String,
    pub kind: PoolKind,
    pub dimms: Vec<DimmId>,
    #[serde(default)]
    pub namespace_count: u32,
}

/// What the NVDIMM driver of the running OS can expose.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DriverFeatures {
    pub app_direct: bool,
    pub storage: bool,
}

impl Default for DriverFeatures {
    fn default() -> Self {
        Self {
            app_direct: true,
            storage: true,
        }
    }
}

/// An interleave format the BIOS can configure.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InterleaveCapability {
    pub format: InterleaveFormat,
    #[serde(default)]
    pub recommended: bool,
}

/// What the BIOS and the DIMM SKUs allow.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlatformCapabilities {
    #[serde(with = "serde_list")]
    pub memory_modes: BitFlags<MemoryMode>,

    #[serde(default = "default_max_interleave_sets")]
    pub max_interleave_sets_per_dimm: u8,

    /// Granularity of every region placed on a DIMM.
    #[serde(default = "default_alignment")]
    pub alignment: ByteCount,

    #[serde(default)]
    pub interleave_formats: Vec<InterleaveCapability>,
}

fn default_max_interleave_sets() -> u8 {
    MAX_INTERLEAVE_SETS_PER_DIMM
}

fn default_alignment() -> ByteCount {
    DEFAULT_ALIGNMENT
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            memory_modes: BitFlags::all(),
            max_interleave_sets_per_dimm: MAX_INTERLEAVE_SETS_PER_DIMM,
            alignment: DEFAULT_ALIGNMENT,
            interleave_formats: vec![InterleaveCapability {
                format: InterleaveFormat::default(),
                recommended: true,
            }],
        }
    }
}

impl PlatformCapabilities {
    pub fn supports(&self, mode: MemoryMode) -> bool {
        self.memory_modes.contains(mode)
    }

    /// Returns the capability entry for a format, if the platform knows it.
    pub fn interleave_format(&self, format: &InterleaveFormat) -> Option<&InterleaveCapability> {
        self.interleave_formats
            .iter()
            .find(|capability| capability.format == *format)
    }

    /// Format used when a request does not name one: the first recommended
    /// format, then the first known format, then 4KB_4KB.
    pub fn default_interleave_format(&self) -> InterleaveFormat {
        self.interleave_formats
            .iter()
            .find(|capability| capability.recommended)
            .or(self.interleave_formats.first())
            .map(|capability| capability.format)
            .unwrap_or_default()
    }
}

/// System-wide capabilities.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SystemCapabilities {
    #[serde(default)]
    pub driver: DriverFeatures,

    #[serde(default)]
    pub platform: PlatformCapabilities,
}

/// Everything the layout engine needs to know about a platform, captured at
/// one point in time.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlatformSnapshot {
    #[serde(default)]
    pub capabilities: SystemCapabilities,

    pub socket_count: u16,

    #[serde(default)]
    pub dimms: Vec<Dimm>,

    #[serde(default)]
    pub pools: Vec<Pool>,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use sysdefs::interleave::InterleaveSize;

    use super::*;

    #[test]
    fn test_deserialize_snapshot() {
        let snapshot: PlatformSnapshot = serde_yaml::from_str(indoc! {r#"
            socketCount: 2
            capabilities:
              driver:
                appDirect: true
                storage: false
              platform:
                memoryModes: [volatile, app-direct]
                interleaveFormats:
                  - format: 64B_4KB
                  - format: 4KB_4KB
                    recommended: true
            dimms:
              - id: "0x0001"
                socketId: 0
                memoryControllerId: 0
                channelId: 0
                capacity: 128G
            pools:
              - id: pool0
                kind: app-direct
                dimms: ["0x0001"]
                namespaceCount: 1
        "#})
        .unwrap();

        assert_eq!(snapshot.socket_count, 2);
        assert!(!snapshot.capabilities.driver.storage);
        let platform = &snapshot.capabilities.platform;
        assert!(platform.supports(MemoryMode::AppDirect));
        assert!(!platform.supports(MemoryMode::Mirror));
        assert_eq!(platform.alignment, DEFAULT_ALIGNMENT);
        assert_eq!(platform.max_interleave_sets_per_dimm, 2);
        assert_eq!(
            platform.default_interleave_format(),
            InterleaveFormat::default()
        );
        assert_eq!(snapshot.dimms[0].capacity, ByteCount::from_gib(128));
        assert_eq!(snapshot.pools[0].kind, PoolKind::AppDirect);
    }

    #[test]
    fn test_default_interleave_format() {
        let first = InterleaveFormat::new(InterleaveSize::Size64B, InterleaveSize::Size256B);
        let mut platform = PlatformCapabilities {
            interleave_formats: vec![InterleaveCapability {
                format: first,
                recommended: false,
            }],
            ..Default::default()
        };
        assert_eq!(platform.default_interleave_format(), first);
        assert!(platform.interleave_format(&first).is_some());
        assert!(platform
            .interleave_format(&InterleaveFormat::default())
            .is_none());

        platform.interleave_formats.clear();
        assert_eq!(
            platform.default_interleave_format(),
            InterleaveFormat::default()
        );
    }

    #[test]
    fn test_placement_order() {
        let dimm = |id: &str, socket, imc, channel| Dimm {
            id: id.into(),
            socket_id: socket,
            memory_controller_id: imc,
            channel_id: channel,
            capacity: ByteCount::from_gib(128),
        };
        let mut dimms = [
            dimm("d", 1, 0, 0),
            dimm("c", 0, 1, 0),
            dimm("b", 0, 0, 1),
            dimm("a", 0, 0, 1),
        ];
        dimms.sort_by(|a, b| a.placement().cmp(&b.placement()));
        let ids = dimms.iter().map(|d| d.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["a", "b", "c", "d"]);
    }
}
