//! Caller-level form of a memory allocation request.
//!
//! Users describe a goal with a flat set of properties where `persistent` and
//! `persistent1` are aliases for the first app-direct extent. The layout
//! engine only ever sees the normalized [`MemoryAllocationRequest`], with at
//! most two ordered extents.

use serde::{Deserialize, Serialize};
use sysdefs::interleave::InterleaveFormat;

use crate::{
    constants::{SETTINGS_BY_ONE, SETTINGS_MIRROR},
    error::BadRequestError,
    DimmId, SocketId,
};

use super::{Capacity, MemoryAllocationRequest, PersistentExtent};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoalRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimms: Vec<DimmId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sockets: Vec<SocketId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatile_size: Option<Capacity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_size: Option<Capacity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_settings: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent1_size: Option<Capacity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent1_settings: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent2_size: Option<Capacity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent2_settings: Option<String>,

    /// Only `remaining` is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_capacity: Option<String>,

    #[serde(default)]
    pub reserve_dimm: bool,
}

impl GoalRequest {
    /// Collapses the property aliases into a normalized request.
    ///
    /// Checks that only concern the property form are done here. Everything
    /// that can be expressed on the normalized request is left to the request
    /// rules of the allocator.
    pub fn to_request(&self) -> Result<MemoryAllocationRequest, BadRequestError> {
        let storage_remaining = match &self.storage_capacity {
            None => false,
            Some(value) if is_remaining_keyword(value) => true,
            Some(value) => {
                return Err(BadRequestError::InvalidStorageCapacity {
                    value: value.clone(),
                })
            }
        };

        if self.persistent_size.is_some() && self.persistent1_size.is_some() {
            return Err(BadRequestError::ConflictingPersistentSizes);
        }

        let (first_size, first_settings) = if self.persistent_size.is_some() {
            (self.persistent_size, &self.persistent_settings)
        } else {
            (self.persistent1_size, &self.persistent1_settings)
        };

        if self.persistent2_size.is_some() && first_size.is_none() {
            return Err(BadRequestError::SecondExtentWithoutFirst);
        }

        if self.volatile_size.is_none() && first_size.is_none() && !storage_remaining {
            return Err(BadRequestError::NoCapacityRequested);
        }

        let mut persistent = Vec::new();
        if let Some(capacity) = first_size {
            persistent.push(to_extent(capacity, first_settings.as_deref())?);
        }
        if let Some(capacity) = self.persistent2_size {
            persistent.push(to_extent(
                capacity,
                self.persistent2_settings.as_deref(),
            )?);
        }

        Ok(MemoryAllocationRequest {
            dimms: self.dimms.clone(),
            sockets: self.sockets.clone(),
            volatile: self.volatile_size,
            persistent,
            storage_remaining,
            reserve_dimm: self.reserve_dimm,
        })
    }
}

fn is_remaining_keyword(value: &str) -> bool {
    value
        .parse::<Capacity>()
        .is_ok_and(|capacity| capacity.is_remaining())
}

fn to_extent(
    capacity: Capacity,
    settings: Option<&str>,
) -> Result<PersistentExtent, BadRequestError> {
    let mut extent = PersistentExtent::new(capacity);
    let Some(settings) = settings else {
        return Ok(extent);
    };

    let invalid = || BadRequestError::InvalidPersistentSettings {
        value: settings.to_owned(),
    };

    for token in settings.split_whitespace() {
        if token.eq_ignore_ascii_case(SETTINGS_BY_ONE) {
            extent.by_one = true;
        } else if token.eq_ignore_ascii_case(SETTINGS_MIRROR) {
            extent.mirrored = true;
        } else if extent.format.is_none() {
            extent.format = Some(token.parse::<InterleaveFormat>().map_err(|_| invalid())?);
        } else {
            return Err(invalid());
        }
    }

    Ok(extent)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use sysdefs::interleave::InterleaveSize;

    use crate::primitives::bytes::ByteCount;

    use super::*;

    fn gib(n: u64) -> Option<Capacity> {
        Some(Capacity::Explicit(ByteCount::from_gib(n)))
    }

    #[test]
    fn test_persistent_alias() {
        let request = GoalRequest {
            persistent_size: gib(100),
            ..Default::default()
        }
        .to_request()
        .unwrap();
        assert_eq!(request.persistent.len(), 1);

        let request = GoalRequest {
            persistent1_size: gib(100),
            persistent1_settings: Some("256B_4KB Mirror".into()),
            persistent2_size: Some(Capacity::Remaining),
            persistent2_settings: Some("ByOne".into()),
            ..Default::default()
        }
        .to_request()
        .unwrap();
        assert_eq!(request.persistent.len(), 2);
        assert_eq!(
            request.persistent[0].format,
            Some(InterleaveFormat::new(
                InterleaveSize::Size256B,
                InterleaveSize::Size4KB
            ))
        );
        assert!(request.persistent[0].mirrored);
        assert!(!request.persistent[0].by_one);
        assert!(request.persistent[1].by_one);
        assert!(request.persistent[1].capacity.is_remaining());
        assert_eq!(request.persistent[1].format, None);
    }

    #[test]
    fn test_conflicting_sizes() {
        let err = GoalRequest {
            persistent_size: gib(1),
            persistent1_size: gib(1),
            ..Default::default()
        }
        .to_request()
        .unwrap_err();
        assert_eq!(err, BadRequestError::ConflictingPersistentSizes);
    }

    #[test]
    fn test_second_without_first() {
        let err = GoalRequest {
            volatile_size: gib(1),
            persistent2_size: gib(1),
            ..Default::default()
        }
        .to_request()
        .unwrap_err();
        assert_eq!(err, BadRequestError::SecondExtentWithoutFirst);
    }

    #[test]
    fn test_storage_capacity() {
        let request = GoalRequest {
            storage_capacity: Some("Remaining".into()),
            reserve_dimm: true,
            dimms: vec!["0x0001".into()],
            ..Default::default()
        }
        .to_request()
        .unwrap();
        assert!(request.storage_remaining);
        assert!(request.reserve_dimm);
        assert_eq!(request.volatile, None);

        let err = GoalRequest {
            storage_capacity: Some("10G".into()),
            ..Default::default()
        }
        .to_request()
        .unwrap_err();
        assert_eq!(
            err,
            BadRequestError::InvalidStorageCapacity {
                value: "10G".into()
            }
        );
    }

    #[test]
    fn test_no_capacity() {
        let err = GoalRequest {
            reserve_dimm: true,
            ..Default::default()
        }
        .to_request()
        .unwrap_err();
        assert_eq!(err, BadRequestError::NoCapacityRequested);
    }

    #[test]
    fn test_invalid_settings() {
        for settings in ["4KB", "4KB_4KB 4KB_4KB", "Mirrored"] {
            let err = GoalRequest {
                persistent_size: gib(1),
                persistent_settings: Some(settings.into()),
                ..Default::default()
            }
            .to_request()
            .unwrap_err();
            assert_eq!(
                err,
                BadRequestError::InvalidPersistentSettings {
                    value: settings.into()
                },
                "settings '{settings}' should be rejected"
            );
        }
    }

    #[test]
    fn test_deserialize() {
        let goal: GoalRequest = serde_yaml::from_str(indoc! {r#"
            sockets: [1]
            volatileSize: 64G
            persistentSize: remaining
            persistentSettings: 4KB_4KB
        "#})
        .unwrap();
        let request = goal.to_request().unwrap();
        assert_eq!(request.sockets, vec![1]);
        assert_eq!(request.volatile, gib(64));
        assert_eq!(request.persistent[0].format, Some(InterleaveFormat::default()));
    }
}
