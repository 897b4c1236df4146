//! End-to-end tests of the allocator: request rules, layout steps and
//! post-layout checks together.

use std::collections::BTreeSet;

use maplit::btreeset;

use nvm_api::{
    config::{Capacity, MemoryAllocationRequest, PersistentExtent},
    error::{BadRequestError, ErrorKind, LibraryError, ResourceError},
    layout::LayoutWarning,
    platform::{DriverFeatures, SystemCapabilities},
    primitives::bytes::ByteCount,
    status::ConfigGoal,
    DimmId,
};

use crate::providers::GoalCommitter;

use super::{context::test_utils::dimm, Allocator};

fn gib(n: u64) -> ByteCount {
    ByteCount::from_gib(n)
}

fn explicit(n: u64) -> Option<Capacity> {
    Some(Capacity::Explicit(gib(n)))
}

/// Two sockets with two 128G DIMMs each.
fn two_socket_allocator() -> Allocator {
    Allocator::new(
        SystemCapabilities::default(),
        vec![
            dimm("0x0001", 0, 0, 0, 128),
            dimm("0x0011", 0, 1, 0, 128),
            dimm("0x1001", 1, 0, 0, 128),
            dimm("0x1011", 1, 1, 0, 128),
        ],
        Vec::new(),
        2,
    )
}

fn bad_request(allocator: &Allocator, request: &MemoryAllocationRequest) -> BadRequestError {
    match allocator.layout(request).unwrap_err().kind() {
        ErrorKind::BadRequest(e) => e.clone(),
        other => panic!("unexpected error kind: {other:?}"),
    }
}

/// Committer that fails on a chosen set of DIMMs.
#[derive(Default)]
struct TestCommitter {
    failing: BTreeSet<DimmId>,
    committed: Vec<ConfigGoal>,
}

impl GoalCommitter for TestCommitter {
    fn commit_goal(&mut self, dimm_id: &DimmId, goal: &ConfigGoal) -> Result<(), LibraryError> {
        if self.failing.contains(dimm_id) {
            return Err(LibraryError::ReturnCode { code: 5 });
        }
        self.committed.push(goal.clone());
        Ok(())
    }
}

#[test]
fn test_mixed_request() {
    let allocator = two_socket_allocator();
    let request = MemoryAllocationRequest {
        volatile: explicit(200),
        persistent: vec![PersistentExtent::new(Capacity::Remaining)],
        ..Default::default()
    };
    let layout = allocator.layout(&request).unwrap();

    assert!(layout.warnings.is_empty());
    assert_eq!(layout.total_volatile(), Some(gib(200)));
    assert_eq!(layout.total_persistent(), Some(gib(312)));
    assert_eq!(layout.total_storage(), Some(ByteCount::ZERO));
    for dimm in layout.dimms.values() {
        assert_eq!(dimm.volatile, gib(50));
        assert_eq!(dimm.persistent[0].size, gib(78));
        assert_eq!(dimm.persistent[0].member_count, 2);
    }
}

#[test]
fn test_layout_is_idempotent() {
    let allocator = two_socket_allocator();
    let request = MemoryAllocationRequest {
        volatile: explicit(100),
        persistent: vec![
            PersistentExtent::new(Capacity::Explicit(gib(60))),
            PersistentExtent {
                by_one: true,
                ..PersistentExtent::new(Capacity::Remaining)
            },
        ],
        ..Default::default()
    };
    assert_eq!(
        allocator.layout(&request).unwrap(),
        allocator.layout(&request).unwrap()
    );
}

#[test]
fn test_rules_run_first() {
    let allocator = two_socket_allocator();

    assert_eq!(
        bad_request(
            &allocator,
            &MemoryAllocationRequest {
                volatile: Some(Capacity::Remaining),
                storage_remaining: true,
                ..Default::default()
            }
        ),
        BadRequestError::TooManyRemaining { count: 2 }
    );

    assert_eq!(
        bad_request(
            &allocator,
            &MemoryAllocationRequest {
                dimms: vec!["0x0001".into()],
                sockets: vec![0],
                volatile: explicit(10),
                ..Default::default()
            }
        ),
        BadRequestError::DimmsAndSocketsSpecified
    );
}

#[test]
fn test_single_dimm_volatile_remaining() {
    let allocator = Allocator::new(
        SystemCapabilities::default(),
        vec![dimm("0x0001", 0, 0, 0, 256)],
        Vec::new(),
        1,
    );
    let layout = allocator
        .layout(&MemoryAllocationRequest {
            volatile: Some(Capacity::Remaining),
            ..Default::default()
        })
        .unwrap();

    let dimm = &layout.dimms["0x0001"];
    assert_eq!(dimm.volatile, gib(256));
    assert_eq!(dimm.storage, ByteCount::ZERO);
    assert!(dimm.persistent.is_empty());
}

#[test]
fn test_driver_without_app_direct() {
    let allocator = Allocator::new(
        SystemCapabilities {
            driver: DriverFeatures {
                app_direct: false,
                storage: true,
            },
            ..Default::default()
        },
        vec![dimm("0x0001", 0, 0, 0, 128), dimm("0x0011", 0, 1, 0, 128)],
        Vec::new(),
        1,
    );
    let layout = allocator
        .layout(&MemoryAllocationRequest {
            persistent: vec![PersistentExtent::new(Capacity::Explicit(gib(100)))],
            ..Default::default()
        })
        .unwrap();

    assert_eq!(
        layout.warnings,
        vec![LayoutWarning::AppDirectNotSupportedByDriver]
    );
    assert_eq!(layout.total_persistent(), Some(ByteCount::ZERO));
    assert_eq!(layout.total_storage(), Some(gib(256)));
}

#[test]
fn test_reserve_single_dimm() {
    let allocator = two_socket_allocator();
    let layout = allocator
        .layout(&MemoryAllocationRequest {
            dimms: vec!["0x1001".into()],
            storage_remaining: true,
            reserve_dimm: true,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(layout.dimms.len(), 1);
    assert_eq!(layout.reserved_dimm.as_deref(), Some("0x1001"));
    let dimm = &layout.dimms["0x1001"];
    assert_eq!(dimm.volatile, ByteCount::ZERO);
    assert_eq!(dimm.storage, gib(128));
}

#[test]
fn test_reserve_last_dimm() {
    let allocator = two_socket_allocator();
    let layout = allocator
        .layout(&MemoryAllocationRequest {
            volatile: explicit(30),
            persistent: vec![PersistentExtent::new(Capacity::Explicit(gib(60)))],
            reserve_dimm: true,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(layout.reserved_dimm.as_deref(), Some("0x1011"));
    let reserved = &layout.dimms["0x1011"];
    assert_eq!(reserved.storage, gib(128));
    assert!(reserved.persistent.is_empty());

    // The set on socket 1 only has one member left.
    let region = &layout.dimms["0x1001"].persistent[0];
    assert_eq!(region.member_count, 1);
    assert_eq!(region.size, gib(20));
    assert_eq!(layout.dimms["0x1001"].volatile, gib(10));
}

#[test]
fn test_mirrored_extent() {
    let allocator = two_socket_allocator();
    let layout = allocator
        .layout(&MemoryAllocationRequest {
            persistent: vec![PersistentExtent {
                mirrored: true,
                ..PersistentExtent::new(Capacity::Explicit(gib(100)))
            }],
            ..Default::default()
        })
        .unwrap();

    let partners = layout
        .dimms
        .values()
        .filter_map(|dimm| {
            dimm.persistent[0]
                .mirror_partner
                .clone()
                .map(|partner| (dimm.id.clone(), partner))
        })
        .collect::<BTreeSet<_>>();
    assert_eq!(
        partners,
        btreeset! {
            ("0x0001".into(), "0x0011".into()),
            ("0x0011".into(), "0x0001".into()),
            ("0x1001".into(), "0x1011".into()),
            ("0x1011".into(), "0x1001".into()),
        }
    );
    assert_eq!(layout.total_persistent(), Some(gib(200)));
}

#[test]
fn test_mirrored_odd_member_count() {
    let allocator = Allocator::new(
        SystemCapabilities::default(),
        vec![
            dimm("0x0001", 0, 0, 0, 128),
            dimm("0x0011", 0, 1, 0, 128),
            dimm("0x0021", 0, 2, 0, 128),
        ],
        Vec::new(),
        1,
    );
    assert_eq!(
        bad_request(
            &allocator,
            &MemoryAllocationRequest {
                persistent: vec![PersistentExtent {
                    mirrored: true,
                    ..PersistentExtent::new(Capacity::Remaining)
                }],
                ..Default::default()
            }
        ),
        BadRequestError::MirrorRequiresEvenDimms {
            socket_id: 0,
            count: 3
        }
    );
}

#[test]
fn test_heterogeneous_remaining() {
    let allocator = Allocator::new(
        SystemCapabilities::default(),
        vec![dimm("0x0001", 0, 0, 0, 128), dimm("0x0011", 0, 1, 0, 256)],
        Vec::new(),
        1,
    );
    let layout = allocator
        .layout(&MemoryAllocationRequest {
            persistent: vec![PersistentExtent::new(Capacity::Remaining)],
            ..Default::default()
        })
        .unwrap();

    // The larger DIMM keeps its excess as storage.
    assert_eq!(layout.dimms["0x0001"].persistent[0].size, gib(128));
    assert_eq!(layout.dimms["0x0011"].persistent[0].size, gib(128));
    assert_eq!(layout.dimms["0x0011"].storage, gib(128));
}

#[test]
fn test_total_requested_capacity() {
    let allocator = two_socket_allocator();
    assert_eq!(
        allocator
            .total_requested_capacity(&MemoryAllocationRequest {
                sockets: vec![1],
                ..Default::default()
            })
            .unwrap(),
        gib(256)
    );
    assert_eq!(
        allocator
            .total_requested_capacity(&MemoryAllocationRequest::default())
            .unwrap(),
        gib(512)
    );
}

#[test]
fn test_layout_total_overflow() {
    // 2^63 bytes each
    let allocator = Allocator::new(
        SystemCapabilities::default(),
        vec![
            dimm("0x0001", 0, 0, 0, 1 << 33),
            dimm("0x0011", 0, 1, 0, 1 << 33),
        ],
        Vec::new(),
        1,
    );
    let request = MemoryAllocationRequest {
        volatile: Some(Capacity::Remaining),
        ..Default::default()
    };

    assert_eq!(
        allocator.layout(&request).unwrap_err().kind(),
        &ErrorKind::ResourceExhausted(ResourceError::CapacityOverflow)
    );
    assert_eq!(
        allocator.total_requested_capacity(&request).unwrap_err().kind(),
        &ErrorKind::ResourceExhausted(ResourceError::CapacityOverflow)
    );
}

#[test]
fn test_allocate_continues_past_failures() {
    let allocator = Allocator::new(
        SystemCapabilities::default(),
        vec![
            dimm("0x0001", 0, 0, 0, 128),
            dimm("0x0002", 0, 1, 0, 128),
            dimm("0x0003", 0, 2, 0, 128),
        ],
        Vec::new(),
        1,
    );
    let layout = allocator
        .layout(&MemoryAllocationRequest {
            volatile: explicit(90),
            ..Default::default()
        })
        .unwrap();

    let mut committer = TestCommitter {
        failing: btreeset! { "0x0002".to_string() },
        ..Default::default()
    };
    let report = allocator.allocate(&layout, &mut committer);

    assert_eq!(
        report.succeeded().collect::<Vec<_>>(),
        vec!["0x0001", "0x0003"]
    );
    let failed = report.failed().collect::<Vec<_>>();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "0x0002");
    assert_eq!(failed[0].1, &LibraryError::ReturnCode { code: 5 });
    assert_eq!(committer.committed.len(), 2);
    assert!(committer
        .committed
        .iter()
        .all(|goal| goal.volatile_size == gib(30)));

    assert!(matches!(
        report.into_result().unwrap_err().kind(),
        ErrorKind::Library(LibraryError::PartialCommit { succeeded: 2, .. })
    ));
}
