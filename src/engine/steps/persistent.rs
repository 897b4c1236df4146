use log::debug;

use nvm_api::{
    config::{Capacity, MemoryAllocationRequest, PersistentExtent},
    error::{BadRequestError, InternalError, NvmError, ReportError, ResourceError},
    layout::{LayoutWarning, MemoryAllocationLayout, PersistentRegion},
    primitives::bytes::ByteCount,
    DimmId, SocketId,
};

use super::{AllocationContext, LayoutStep};

/// Places the app-direct extents of a request, in order.
///
/// An extent becomes one interleave set per socket spanning the socket's
/// eligible DIMMs, or one set per DIMM when `by_one` is requested. Mirrored
/// extents pair the DIMMs of each socket in placement order and need twice
/// the raw capacity. A remaining extent is placed with empty regions, which
/// the remaining capacity step fills in.
pub(crate) struct PersistentExtents;

impl LayoutStep for PersistentExtents {
    fn name(&self) -> &'static str {
        "persistent-extents"
    }

    fn execute(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        if layout.has_warning(LayoutWarning::AppDirectNotSupportedByDriver) {
            debug!("Skipping app-direct extents, the driver cannot expose them");
            return Ok(());
        }

        let alignment = ctx.alignment();
        let sockets = layout
            .eligible_by_socket()
            .into_iter()
            .map(|(socket_id, dimms)| {
                (
                    socket_id,
                    dimms.iter().map(|dimm| dimm.id.clone()).collect(),
                )
            })
            .collect::<Vec<(SocketId, Vec<DimmId>)>>();

        let mut next_set_id = 1u32;
        for (index, extent) in request.persistent.iter().enumerate() {
            if !extent.capacity.is_requested() {
                continue;
            }

            let interleave_index = u8::try_from(index)
                .structured(InternalError::Internal("persistent extent index out of range"))?;
            let format = extent
                .format
                .unwrap_or_else(|| ctx.platform().default_interleave_format());
            let sets = interleave_sets(&sockets, extent)?;
            let members = sets.iter().map(Vec::len).sum::<usize>();

            let size = match extent.capacity {
                Capacity::Explicit(total) => {
                    let size = member_size(total, extent.mirrored, members, alignment)?;
                    let smallest = sets
                        .iter()
                        .flatten()
                        .filter_map(|dimm_id| layout.dimms.get(dimm_id))
                        .map(|dimm| dimm.free().align_down(alignment))
                        .min()
                        .unwrap_or_default();
                    if members == 0 || size > smallest {
                        let mut available = smallest.bytes().saturating_mul(members as u64);
                        if extent.mirrored {
                            available /= 2;
                        }
                        return Err(NvmError::new(BadRequestError::CapacityExceedsAvailable {
                            kind: "persistent",
                            requested: total.bytes(),
                            available,
                        }));
                    }
                    size
                }
                Capacity::Remaining => ByteCount::ZERO,
            };

            for set in sets {
                let set_id = next_set_id;
                next_set_id += 1;
                debug!(
                    "Placing interleave set {set_id} with {} member(s) of {size} for extent {index}",
                    set.len()
                );

                for (position, dimm_id) in set.iter().enumerate() {
                    let mirror_partner = extent
                        .mirrored
                        .then(|| set.get(position ^ 1).cloned())
                        .flatten();
                    let dimm = layout
                        .dimms
                        .get_mut(dimm_id)
                        .structured(InternalError::Internal("interleave set member not in layout"))?;
                    dimm.persistent.push(PersistentRegion {
                        interleave_index,
                        set_id,
                        format,
                        size,
                        mirrored: extent.mirrored,
                        mirror_partner,
                        member_count: set.len(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Groups the eligible DIMMs of each socket into the interleave sets of an
/// extent.
fn interleave_sets(
    sockets: &[(SocketId, Vec<DimmId>)],
    extent: &PersistentExtent,
) -> Result<Vec<Vec<DimmId>>, NvmError> {
    let mut sets = Vec::new();
    for (socket_id, dimms) in sockets {
        if extent.mirrored && dimms.len() % 2 != 0 {
            return Err(NvmError::new(BadRequestError::MirrorRequiresEvenDimms {
                socket_id: *socket_id,
                count: dimms.len(),
            }));
        }

        match (extent.by_one, extent.mirrored) {
            (true, true) => sets.extend(dimms.chunks(2).map(<[DimmId]>::to_vec)),
            (true, false) => sets.extend(dimms.iter().map(|dimm_id| vec![dimm_id.clone()])),
            (false, _) => sets.push(dimms.clone()),
        }
    }
    Ok(sets)
}

/// Raw size each member contributes to an extent of `total` usable bytes.
fn member_size(
    total: ByteCount,
    mirrored: bool,
    members: usize,
    alignment: ByteCount,
) -> Result<ByteCount, NvmError> {
    if members == 0 {
        return Ok(total);
    }

    let raw = if mirrored { total.checked_mul(2) } else { Some(total) }
        .structured(ResourceError::CapacityOverflow)?;
    let members = members as u64;
    let per_member = raw.bytes() / members + u64::from(raw.bytes() % members != 0);
    ByteCount(per_member)
        .align_up(alignment)
        .structured(ResourceError::CapacityOverflow)
}
