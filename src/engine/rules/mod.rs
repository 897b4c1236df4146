//! # Request Rules
//!
//! Rules that reject a memory allocation request before any layout step
//! runs. Each rule checks one constraint; the first violation wins.
//!
//! Structural rules only look at the request itself. Inventory rules
//! (`inventory` module) check the request against the manageable DIMMs,
//! and capability rules (`capability` module) check it against what the
//! platform BIOS and DIMM SKUs allow.
//!
//! The rules are declared in the order they are evaluated.

use nvm_api::{
    config::MemoryAllocationRequest,
    constants::MAX_PERSISTENT_EXTENTS,
    error::{BadRequestError, NvmError},
};

use super::AllocationContext;

mod capability;
mod inventory;

pub(crate) trait RequestRule {
    fn name(&self) -> &'static str;

    fn verify(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
    ) -> Result<(), NvmError>;
}

pub(crate) fn request_rules() -> Vec<Box<dyn RequestRule>> {
    vec![
        Box::new(TooManyRemaining),
        Box::new(DimmsAndSockets),
        Box::new(ExtentOrder),
        Box::new(inventory::NoManageableDimms),
        Box::new(inventory::DimmListInvalid),
        Box::new(inventory::SocketListInvalid),
        Box::new(ReserveDimm),
        Box::new(inventory::NamespacesExist),
        Box::new(capability::MemoryModeNotSupported),
        Box::new(capability::AppDirectNotSupported),
        Box::new(capability::MirrorNotSupported),
        Box::new(capability::InterleaveFormatNotSupported),
        Box::new(capability::TooManyInterleaveSets),
    ]
}

/// At most one capacity may take the remaining space.
pub(crate) struct TooManyRemaining;

impl RequestRule for TooManyRemaining {
    fn name(&self) -> &'static str {
        "too-many-remaining"
    }

    fn verify(&self, _: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        let count = request.remaining_count();
        if count > 1 {
            return Err(NvmError::new(BadRequestError::TooManyRemaining { count }));
        }
        Ok(())
    }
}

pub(crate) struct DimmsAndSockets;

impl RequestRule for DimmsAndSockets {
    fn name(&self) -> &'static str {
        "dimms-and-sockets"
    }

    fn verify(&self, _: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        if !request.dimms.is_empty() && !request.sockets.is_empty() {
            return Err(NvmError::new(BadRequestError::DimmsAndSocketsSpecified));
        }
        Ok(())
    }
}

/// Extents are ordered: a second extent needs a non-empty first one.
pub(crate) struct ExtentOrder;

impl RequestRule for ExtentOrder {
    fn name(&self) -> &'static str {
        "extent-order"
    }

    fn verify(&self, _: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        let count = request.persistent.len();
        if count > MAX_PERSISTENT_EXTENTS {
            return Err(NvmError::new(BadRequestError::TooManyPersistentExtents {
                count,
            }));
        }

        if count > 1 && !request.persistent[0].capacity.is_requested() {
            return Err(NvmError::new(BadRequestError::SecondExtentWithoutFirst));
        }
        Ok(())
    }
}

/// Reserving the only targeted DIMM leaves no room for volatile or app-direct
/// capacity.
pub(crate) struct ReserveDimm;

impl RequestRule for ReserveDimm {
    fn name(&self) -> &'static str {
        "reserve-dimm"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        if !request.reserve_dimm || ctx.target_dimms(request).len() != 1 {
            return Ok(());
        }

        if request.volatile.is_some() || !request.persistent.is_empty() {
            return Err(NvmError::new(
                BadRequestError::ReserveDimmWithOtherProperties,
            ));
        }
        Ok(())
    }
}
