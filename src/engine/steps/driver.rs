use log::debug;

use nvm_api::{
    config::MemoryAllocationRequest,
    error::NvmError,
    layout::{LayoutWarning, MemoryAllocationLayout},
};

use super::{AllocationContext, LayoutStep};

/// Warns when the OS driver cannot expose the requested app-direct or storage
/// capacity. The platform can still be configured, the capacity just stays
/// unusable until the driver catches up.
pub(crate) struct CheckDriverSupportsPersistent;

impl LayoutStep for CheckDriverSupportsPersistent {
    fn name(&self) -> &'static str {
        "check-driver-supports-persistent"
    }

    fn execute(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        let driver = ctx.capabilities.driver;
        debug!("Driver features: {driver:?}");

        if request.requests_persistent() && !driver.app_direct {
            layout.add_warning(LayoutWarning::AppDirectNotSupportedByDriver);
        }

        if request.requests_storage() && !driver.storage {
            layout.add_warning(LayoutWarning::StorageNotSupportedByDriver);
        }

        Ok(())
    }
}
