//! # Layout Steps
//!
//! Each step fills in one part of the layout. Steps run in the order returned
//! by [`layout_steps`] and see the layout as left by the previous ones.
//! Shortfalls that do not prevent a usable layout are recorded as warnings on
//! the layout, everything else is an error.

use nvm_api::{config::MemoryAllocationRequest, error::NvmError, layout::MemoryAllocationLayout};

use super::AllocationContext;

mod driver;
mod persistent;
mod population;
mod recommended;
mod remaining;
mod storage;
mod volatile;

pub(crate) trait LayoutStep {
    fn name(&self) -> &'static str;

    fn execute(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError>;
}

pub(crate) fn layout_steps() -> Vec<Box<dyn LayoutStep>> {
    vec![
        Box::new(driver::CheckDriverSupportsPersistent),
        Box::new(volatile::VolatileCapacity),
        Box::new(persistent::PersistentExtents),
        Box::new(remaining::RemainingCapacity),
        Box::new(recommended::CheckRecommendedSettings),
        Box::new(storage::StorageCapacity),
        Box::new(population::CheckDimmPopulation),
    ]
}
