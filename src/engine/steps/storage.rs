use log::trace;

use nvm_api::{config::MemoryAllocationRequest, error::NvmError, layout::MemoryAllocationLayout};

use super::{AllocationContext, LayoutStep};

/// Turns whatever capacity is left on each DIMM into storage. The reserved
/// DIMM is entirely storage.
pub(crate) struct StorageCapacity;

impl LayoutStep for StorageCapacity {
    fn name(&self) -> &'static str {
        "storage-capacity"
    }

    fn execute(
        &self,
        _: &AllocationContext,
        _: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        let reserved = layout.reserved_dimm.clone();
        for dimm in layout.dimms.values_mut() {
            if reserved.as_ref() == Some(&dimm.id) {
                dimm.volatile = Default::default();
                dimm.persistent.clear();
            }
            dimm.storage = dimm.free();
            trace!("DIMM '{}' has {} of storage capacity", dimm.id, dimm.storage);
        }
        Ok(())
    }
}
