//! # Post-Layout Checks
//!
//! Invariants every computed layout must hold. A violation means a layout
//! step is wrong, so it is always fatal.

use std::collections::BTreeMap;

use nvm_api::{
    config::MemoryAllocationRequest,
    error::{InvalidLayoutError, NvmError},
    layout::{MemoryAllocationLayout, PersistentRegion},
    DimmId,
};

use super::AllocationContext;

pub(crate) trait PostLayoutCheck {
    fn name(&self) -> &'static str;

    fn verify(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), NvmError>;
}

pub(crate) fn post_layout_checks() -> Vec<Box<dyn PostLayoutCheck>> {
    vec![
        Box::new(CapacityWithinRaw),
        Box::new(AllTargetsPresent),
        Box::new(InterleaveIndices),
        Box::new(MirrorPairs),
        Box::new(SetMembersEqual),
    ]
}

/// Every byte of a DIMM is assigned to exactly one region.
pub(crate) struct CapacityWithinRaw;

impl PostLayoutCheck for CapacityWithinRaw {
    fn name(&self) -> &'static str {
        "capacity-within-raw"
    }

    fn verify(
        &self,
        _: &AllocationContext,
        _: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        for dimm in layout.dimms.values() {
            let assigned = dimm.assigned().map_or(u64::MAX, |assigned| assigned.bytes());
            let raw = dimm.capacity.bytes();
            if assigned > raw {
                return Err(NvmError::new(InvalidLayoutError::CapacityExceedsRaw {
                    dimm_id: dimm.id.clone(),
                    assigned,
                    raw,
                }));
            }
            if assigned < raw {
                return Err(NvmError::new(InvalidLayoutError::CapacityUnaccounted {
                    dimm_id: dimm.id.clone(),
                    unaccounted: raw - assigned,
                }));
            }
        }
        Ok(())
    }
}

pub(crate) struct AllTargetsPresent;

impl PostLayoutCheck for AllTargetsPresent {
    fn name(&self) -> &'static str {
        "all-targets-present"
    }

    fn verify(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        for dimm in ctx.target_dimms(request) {
            if !layout.dimms.contains_key(&dimm.id) {
                return Err(NvmError::new(InvalidLayoutError::MissingDimm {
                    dimm_id: dimm.id.clone(),
                }));
            }
        }
        Ok(())
    }
}

/// Interleave indices on a DIMM start at 0, have no gaps and stay within the
/// platform limit.
pub(crate) struct InterleaveIndices;

impl PostLayoutCheck for InterleaveIndices {
    fn name(&self) -> &'static str {
        "interleave-indices"
    }

    fn verify(
        &self,
        ctx: &AllocationContext,
        _: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        let max = ctx.platform().max_interleave_sets_per_dimm;
        for dimm in layout.dimms.values() {
            for (position, region) in dimm.persistent.iter().enumerate() {
                if usize::from(region.interleave_index) != position || region.interleave_index >= max
                {
                    return Err(NvmError::new(InvalidLayoutError::InterleaveIndex {
                        dimm_id: dimm.id.clone(),
                        index: region.interleave_index,
                    }));
                }
            }
        }
        Ok(())
    }
}

/// Mirrored regions come in symmetric pairs on the same socket.
pub(crate) struct MirrorPairs;

impl MirrorPairs {
    fn has_partner(layout: &MemoryAllocationLayout, dimm_id: &DimmId, region: &PersistentRegion) -> bool {
        let Some(partner_id) = region.mirror_partner.as_ref() else {
            return false;
        };
        let (Some(dimm), Some(partner)) = (layout.dimms.get(dimm_id), layout.dimms.get(partner_id))
        else {
            return false;
        };

        partner_id != dimm_id
            && partner.socket_id == dimm.socket_id
            && partner.persistent.iter().any(|other| {
                other.set_id == region.set_id
                    && other.size == region.size
                    && other.mirrored
                    && other.mirror_partner.as_ref() == Some(dimm_id)
            })
    }
}

impl PostLayoutCheck for MirrorPairs {
    fn name(&self) -> &'static str {
        "mirror-pairs"
    }

    fn verify(
        &self,
        _: &AllocationContext,
        _: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        for dimm in layout.dimms.values() {
            for region in dimm.persistent.iter().filter(|region| region.mirrored) {
                if !Self::has_partner(layout, &dimm.id, region) {
                    return Err(NvmError::new(InvalidLayoutError::MirrorPair {
                        dimm_id: dimm.id.clone(),
                        set_id: region.set_id,
                    }));
                }
            }
        }
        Ok(())
    }
}

/// All members of an interleave set agree on its shape, and the set has as
/// many members as it claims.
pub(crate) struct SetMembersEqual;

impl PostLayoutCheck for SetMembersEqual {
    fn name(&self) -> &'static str {
        "set-members-equal"
    }

    fn verify(
        &self,
        _: &AllocationContext,
        _: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        let mut sets: BTreeMap<u32, Vec<&PersistentRegion>> = BTreeMap::new();
        for region in layout.dimms.values().flat_map(|dimm| &dimm.persistent) {
            sets.entry(region.set_id).or_default().push(region);
        }

        for (set_id, regions) in sets {
            let first = regions[0];
            let consistent = regions.len() == first.member_count
                && regions.iter().all(|region| {
                    region.size == first.size
                        && region.format == first.format
                        && region.mirrored == first.mirrored
                        && region.member_count == first.member_count
                        && region.interleave_index == first.interleave_index
                });
            if !consistent {
                return Err(NvmError::new(InvalidLayoutError::SetMemberMismatch { set_id }));
            }
        }
        Ok(())
    }
}
