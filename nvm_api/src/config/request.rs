use serde::{Deserialize, Serialize};
use sysdefs::interleave::InterleaveFormat;

use crate::{DimmId, SocketId};

use super::Capacity;

/// Normalized memory allocation request consumed by the layout engine.
///
/// Capacities are totals across the whole target set of DIMMs.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemoryAllocationRequest {
    /// Explicit list of target DIMMs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimms: Vec<DimmId>,

    /// Target all manageable DIMMs of these sockets.
    ///
    /// When both `dimms` and `sockets` are empty, all manageable DIMMs are
    /// targeted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sockets: Vec<SocketId>,

    /// Capacity to use as volatile memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatile: Option<Capacity>,

    /// Ordered app-direct extents, at most two.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persistent: Vec<PersistentExtent>,

    /// Route all capacity left after the other regions to storage.
    #[serde(default)]
    pub storage_remaining: bool,

    /// Dedicate one DIMM entirely to storage, excluding it from volatile and
    /// app-direct apportionment.
    #[serde(default)]
    pub reserve_dimm: bool,
}

impl MemoryAllocationRequest {
    /// Number of fields set to the remaining-capacity marker.
    pub fn remaining_count(&self) -> usize {
        usize::from(self.volatile.is_some_and(|v| v.is_remaining()))
            + usize::from(self.storage_remaining)
            + self
                .persistent
                .iter()
                .filter(|extent| extent.capacity.is_remaining())
                .count()
    }

    /// Whether any volatile capacity is requested.
    pub fn requests_volatile(&self) -> bool {
        self.volatile.is_some_and(|v| v.is_requested())
    }

    /// Whether any app-direct capacity is requested.
    pub fn requests_persistent(&self) -> bool {
        self.persistent
            .iter()
            .any(|extent| extent.capacity.is_requested())
    }

    /// Whether capacity is explicitly routed to storage.
    pub fn requests_storage(&self) -> bool {
        self.storage_remaining || self.reserve_dimm
    }
}

/// One app-direct extent of a request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersistentExtent {
    /// Total usable capacity of the extent.
    pub capacity: Capacity,

    /// Memory controller and channel interleave sizes. The platform default
    /// is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<InterleaveFormat>,

    /// Create one non-interleaved set per DIMM instead of one set spanning
    /// the DIMMs of a socket.
    #[serde(default)]
    pub by_one: bool,

    /// Mirror the extent across pairs of DIMMs on the same socket.
    #[serde(default)]
    pub mirrored: bool,
}

impl PersistentExtent {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            capacity,
            format: None,
            by_one: false,
            mirrored: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::primitives::bytes::ByteCount;

    use super::*;

    #[test]
    fn test_deserialize_request() {
        let request: MemoryAllocationRequest = serde_yaml::from_str(indoc! {r#"
            sockets: [0, 1]
            volatile: 200G
            persistent:
              - capacity: remaining
                format: 4KB_4KB
                mirrored: true
            reserveDimm: true
        "#})
        .unwrap();

        assert_eq!(request.sockets, vec![0, 1]);
        assert!(request.dimms.is_empty());
        assert_eq!(
            request.volatile,
            Some(Capacity::Explicit(ByteCount::from_gib(200)))
        );
        assert_eq!(request.persistent.len(), 1);
        assert!(request.persistent[0].mirrored);
        assert!(!request.persistent[0].by_one);
        assert_eq!(
            request.persistent[0].format,
            Some(InterleaveFormat::default())
        );
        assert!(request.reserve_dimm);
        assert!(!request.storage_remaining);
        assert_eq!(request.remaining_count(), 1);
    }

    #[test]
    fn test_deserialize_unknown_field() {
        assert!(serde_yaml::from_str::<MemoryAllocationRequest>("memorySize: 1G").is_err());
    }

    #[test]
    fn test_remaining_count() {
        let mut request = MemoryAllocationRequest {
            volatile: Some(Capacity::Remaining),
            storage_remaining: true,
            persistent: vec![
                PersistentExtent::new(Capacity::Remaining),
                PersistentExtent::new(Capacity::Explicit(ByteCount::from_gib(1))),
            ],
            ..Default::default()
        };
        assert_eq!(request.remaining_count(), 3);

        request.storage_remaining = false;
        request.volatile = Some(Capacity::Explicit(ByteCount::ZERO));
        assert_eq!(request.remaining_count(), 1);
        assert!(!request.requests_volatile());
        assert!(request.requests_persistent());
    }
}
