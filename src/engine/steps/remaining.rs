use std::collections::BTreeMap;

use log::debug;

use nvm_api::{
    config::MemoryAllocationRequest,
    error::NvmError,
    layout::MemoryAllocationLayout,
    primitives::bytes::ByteCount,
    DimmId,
};

use super::{AllocationContext, LayoutStep};

/// Resolves the capacity marked as remaining.
///
/// Remaining capacity is computed per DIMM and never moved between DIMMs.
/// Members of an interleave set must be equal, so a set takes the free
/// capacity of its smallest member on every member; whatever is left on the
/// larger members ends up as storage. Remaining storage needs no work here,
/// the storage step takes all that is left anyway.
pub(crate) struct RemainingCapacity;

impl LayoutStep for RemainingCapacity {
    fn name(&self) -> &'static str {
        "remaining-capacity"
    }

    fn execute(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        let alignment = ctx.alignment();

        if request.volatile.is_some_and(|volatile| volatile.is_remaining()) {
            let eligible = layout
                .eligible_dimms()
                .map(|dimm| dimm.id.clone())
                .collect::<Vec<_>>();
            for dimm_id in eligible {
                if let Some(dimm) = layout.dimms.get_mut(&dimm_id) {
                    dimm.volatile = dimm.free().align_down(alignment);
                    debug!(
                        "Assigning remaining {} of volatile capacity to DIMM '{dimm_id}'",
                        dimm.volatile
                    );
                }
            }
        }

        let Some(index) = request
            .persistent
            .iter()
            .position(|extent| extent.capacity.is_remaining())
        else {
            return Ok(());
        };

        // Members of each interleave set placed for the remaining extent.
        let mut sets: BTreeMap<u32, Vec<DimmId>> = BTreeMap::new();
        for dimm in layout.dimms.values() {
            if let Some(region) = dimm
                .persistent
                .iter()
                .find(|region| usize::from(region.interleave_index) == index)
            {
                sets.entry(region.set_id).or_default().push(dimm.id.clone());
            }
        }

        for (set_id, members) in sets {
            let size = members
                .iter()
                .filter_map(|dimm_id| layout.dimms.get(dimm_id))
                .map(|dimm| dimm.free().align_down(alignment))
                .min()
                .unwrap_or(ByteCount::ZERO);
            debug!(
                "Assigning remaining {size} per member to interleave set {set_id} ({} member(s))",
                members.len()
            );

            for dimm_id in &members {
                if let Some(region) = layout
                    .dimms
                    .get_mut(dimm_id)
                    .and_then(|dimm| dimm.region_mut(index as u8))
                {
                    region.size = size;
                }
            }
        }

        Ok(())
    }
}
