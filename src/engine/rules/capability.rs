use nvm_api::{
    config::MemoryAllocationRequest,
    error::{NvmError, UnsupportedError},
};
use sysdefs::memory_modes::MemoryMode;

use super::{AllocationContext, RequestRule};

fn unsupported_mode(mode: MemoryMode) -> NvmError {
    NvmError::new(UnsupportedError::MemoryMode {
        mode: <&str>::from(mode).into(),
    })
}

/// Volatile and storage capacity need the matching platform mode.
pub(crate) struct MemoryModeNotSupported;

impl RequestRule for MemoryModeNotSupported {
    fn name(&self) -> &'static str {
        "memory-mode-not-supported"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        if request.requests_volatile() && !ctx.platform().supports(MemoryMode::Volatile) {
            return Err(unsupported_mode(MemoryMode::Volatile));
        }
        if request.requests_storage() && !ctx.platform().supports(MemoryMode::Storage) {
            return Err(unsupported_mode(MemoryMode::Storage));
        }
        Ok(())
    }
}

pub(crate) struct AppDirectNotSupported;

impl RequestRule for AppDirectNotSupported {
    fn name(&self) -> &'static str {
        "app-direct-not-supported"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        if request.requests_persistent() && !ctx.platform().supports(MemoryMode::AppDirect) {
            return Err(unsupported_mode(MemoryMode::AppDirect));
        }
        Ok(())
    }
}

pub(crate) struct MirrorNotSupported;

impl RequestRule for MirrorNotSupported {
    fn name(&self) -> &'static str {
        "mirror-not-supported"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        let mirrored = request
            .persistent
            .iter()
            .any(|extent| extent.mirrored && extent.capacity.is_requested());
        if mirrored && !ctx.platform().supports(MemoryMode::Mirror) {
            return Err(unsupported_mode(MemoryMode::Mirror));
        }
        Ok(())
    }
}

/// Explicit interleave formats must be known to the platform.
pub(crate) struct InterleaveFormatNotSupported;

impl RequestRule for InterleaveFormatNotSupported {
    fn name(&self) -> &'static str {
        "interleave-format-not-supported"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        for format in request.persistent.iter().filter_map(|extent| extent.format) {
            if ctx.platform().interleave_format(&format).is_none() {
                return Err(NvmError::new(UnsupportedError::InterleaveFormat {
                    format: format.to_string(),
                }));
            }
        }
        Ok(())
    }
}

pub(crate) struct TooManyInterleaveSets;

impl RequestRule for TooManyInterleaveSets {
    fn name(&self) -> &'static str {
        "too-many-interleave-sets"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        let max = ctx.platform().max_interleave_sets_per_dimm;
        let requested = request.persistent.len();
        if requested > usize::from(max) {
            return Err(NvmError::new(UnsupportedError::TooManyInterleaveSets {
                max,
                requested,
            }));
        }
        Ok(())
    }
}
