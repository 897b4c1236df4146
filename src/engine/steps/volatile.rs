use log::{debug, trace};

use nvm_api::{
    config::MemoryAllocationRequest,
    error::{BadRequestError, InternalError, NvmError, ReportError, ResourceError},
    layout::MemoryAllocationLayout,
    primitives::bytes::ByteCount,
    DimmId,
};

use super::{AllocationContext, LayoutStep};

/// Splits an explicit volatile capacity across the eligible DIMMs in
/// proportion to their raw capacity.
///
/// The total is rounded up to the platform alignment and handed out in
/// alignment units. Each DIMM first gets its proportional share rounded down,
/// then the units lost to rounding go one per DIMM in layout order. A
/// remaining volatile capacity is resolved later, once app-direct regions
/// are placed.
pub(crate) struct VolatileCapacity;

impl LayoutStep for VolatileCapacity {
    fn name(&self) -> &'static str {
        "volatile-capacity"
    }

    fn execute(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        let Some(total) = request.volatile.and_then(|volatile| volatile.explicit()) else {
            return Ok(());
        };
        if total.is_zero() {
            return Ok(());
        }

        let alignment = ctx.alignment();
        let unit = alignment.bytes().max(1);
        let requested = total
            .align_up(alignment)
            .structured(ResourceError::CapacityOverflow)?;
        let requested_units = requested.bytes() / unit;

        let dimms = layout
            .eligible_dimms()
            .map(|dimm| (dimm.id.clone(), dimm.capacity.bytes()))
            .collect::<Vec<(DimmId, u64)>>();
        let limits = dimms
            .iter()
            .map(|(_, capacity)| capacity / unit)
            .collect::<Vec<u64>>();
        let available_units = limits
            .iter()
            .try_fold(0u64, |sum, limit| sum.checked_add(*limit))
            .structured(ResourceError::CapacityOverflow)?;

        if requested_units > available_units {
            return Err(NvmError::new(BadRequestError::CapacityExceedsAvailable {
                kind: "volatile",
                requested: total.bytes(),
                available: available_units.saturating_mul(unit),
            }));
        }

        let raw_total: u128 = dimms.iter().map(|(_, capacity)| u128::from(*capacity)).sum();
        let mut shares = dimms
            .iter()
            .map(|(_, capacity)| {
                let share = u128::from(requested_units) * u128::from(*capacity) / raw_total;
                u64::try_from(share).unwrap_or(u64::MAX)
            })
            .collect::<Vec<u64>>();

        let mut leftover = requested_units - shares.iter().sum::<u64>();
        trace!("Handing out {leftover} leftover volatile unit(s)");
        while leftover > 0 {
            let mut progressed = false;
            for (share, limit) in shares.iter_mut().zip(&limits) {
                if leftover == 0 {
                    break;
                }
                if *share < *limit {
                    *share += 1;
                    leftover -= 1;
                    progressed = true;
                }
            }
            if !progressed {
                return Err(NvmError::new(InternalError::Internal(
                    "volatile capacity could not be distributed",
                )));
            }
        }

        for ((dimm_id, _), share) in dimms.iter().zip(shares) {
            let size = ByteCount(share * unit);
            debug!("Assigning {size} of volatile capacity to DIMM '{dimm_id}'");
            if let Some(dimm) = layout.dimms.get_mut(dimm_id) {
                dimm.volatile = size;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nvm_api::{config::Capacity, error::ErrorKind, platform::SystemCapabilities};

    use crate::engine::context::test_utils::{dimm, two_socket_context};

    use super::*;

    fn volatile_request(gib: u64) -> MemoryAllocationRequest {
        MemoryAllocationRequest {
            volatile: Some(Capacity::Explicit(ByteCount::from_gib(gib))),
            ..Default::default()
        }
    }

    fn volatile_of(layout: &MemoryAllocationLayout) -> Vec<u64> {
        layout
            .dimms
            .values()
            .map(|dimm| dimm.volatile.bytes() / ByteCount::from_gib(1).bytes())
            .collect()
    }

    #[test]
    fn test_even_split() {
        let ctx = two_socket_context(128);
        let mut layout = MemoryAllocationLayout::new(&ctx.dimms);
        VolatileCapacity
            .execute(&ctx, &volatile_request(200), &mut layout)
            .unwrap();
        assert_eq!(volatile_of(&layout), vec![50, 50, 50, 50]);
    }

    #[test]
    fn test_proportional_split() {
        let ctx = AllocationContext::new(
            SystemCapabilities::default(),
            vec![dimm("a", 0, 0, 0, 128), dimm("b", 0, 1, 0, 256)],
            Vec::new(),
            1,
        );
        let mut layout = MemoryAllocationLayout::new(&ctx.dimms);
        VolatileCapacity
            .execute(&ctx, &volatile_request(100), &mut layout)
            .unwrap();
        assert_eq!(volatile_of(&layout), vec![34, 66]);
        assert_eq!(layout.total_volatile(), Some(ByteCount::from_gib(100)));
    }

    #[test]
    fn test_leftover_units() {
        let ctx = AllocationContext::new(
            SystemCapabilities::default(),
            vec![
                dimm("a", 0, 0, 0, 128),
                dimm("b", 0, 1, 0, 128),
                dimm("c", 0, 2, 0, 128),
            ],
            Vec::new(),
            1,
        );
        let mut layout = MemoryAllocationLayout::new(&ctx.dimms);
        VolatileCapacity
            .execute(&ctx, &volatile_request(101), &mut layout)
            .unwrap();
        assert_eq!(volatile_of(&layout), vec![34, 34, 33]);
    }

    #[test]
    fn test_reserved_dimm_excluded() {
        let ctx = two_socket_context(128);
        let mut layout = MemoryAllocationLayout::new(&ctx.dimms);
        layout.reserved_dimm = Some("0x1011".into());
        VolatileCapacity
            .execute(&ctx, &volatile_request(300), &mut layout)
            .unwrap();
        assert_eq!(volatile_of(&layout), vec![100, 100, 100, 0]);
    }

    #[test]
    fn test_exceeds_available() {
        let ctx = two_socket_context(128);
        let mut layout = MemoryAllocationLayout::new(&ctx.dimms);
        let error = VolatileCapacity
            .execute(&ctx, &volatile_request(513), &mut layout)
            .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::BadRequest(BadRequestError::CapacityExceedsAvailable {
                kind: "volatile",
                requested: ByteCount::from_gib(513).bytes(),
                available: ByteCount::from_gib(512).bytes(),
            })
        );
    }

    #[test]
    fn test_remaining_is_deferred() {
        let ctx = two_socket_context(128);
        let mut layout = MemoryAllocationLayout::new(&ctx.dimms);
        let request = MemoryAllocationRequest {
            volatile: Some(Capacity::Remaining),
            ..Default::default()
        };
        VolatileCapacity.execute(&ctx, &request, &mut layout).unwrap();
        assert_eq!(layout.total_volatile(), Some(ByteCount::ZERO));
    }
}
