use std::collections::HashSet;

use nvm_api::{
    config::MemoryAllocationRequest,
    error::{BadRequestError, NvmError},
};

use super::{AllocationContext, RequestRule};

pub(crate) struct NoManageableDimms;

impl RequestRule for NoManageableDimms {
    fn name(&self) -> &'static str {
        "no-manageable-dimms"
    }

    fn verify(&self, ctx: &AllocationContext, _: &MemoryAllocationRequest) -> Result<(), NvmError> {
        if ctx.dimms.is_empty() {
            return Err(NvmError::new(BadRequestError::NoManageableDimms));
        }
        Ok(())
    }
}

/// Every requested DIMM is manageable and listed once.
pub(crate) struct DimmListInvalid;

impl RequestRule for DimmListInvalid {
    fn name(&self) -> &'static str {
        "dimm-list-invalid"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        let mut seen = HashSet::new();
        for dimm_id in &request.dimms {
            if ctx.dimm(dimm_id).is_none() {
                return Err(NvmError::new(BadRequestError::InvalidDimm {
                    dimm_id: dimm_id.clone(),
                }));
            }
            if !seen.insert(dimm_id) {
                return Err(NvmError::new(BadRequestError::DuplicateDimm {
                    dimm_id: dimm_id.clone(),
                }));
            }
        }
        Ok(())
    }
}

/// Every requested socket exists and holds at least one manageable DIMM.
pub(crate) struct SocketListInvalid;

impl RequestRule for SocketListInvalid {
    fn name(&self) -> &'static str {
        "socket-list-invalid"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        for &socket_id in &request.sockets {
            if socket_id >= ctx.socket_count || ctx.dimms_on_socket(socket_id).next().is_none() {
                return Err(NvmError::new(BadRequestError::InvalidSocket { socket_id }));
            }
        }
        Ok(())
    }
}

/// Existing namespaces must be deleted before their DIMMs are reconfigured.
pub(crate) struct NamespacesExist;

impl RequestRule for NamespacesExist {
    fn name(&self) -> &'static str {
        "namespaces-exist"
    }

    fn verify(&self, ctx: &AllocationContext, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        for dimm in ctx.target_dimms(request) {
            if let Some(pool) = ctx.pools_with_namespaces(&dimm.id).next() {
                return Err(NvmError::new(BadRequestError::NamespacesExist {
                    dimm_id: dimm.id.clone(),
                    pool_id: pool.id.clone(),
                }));
            }
        }
        Ok(())
    }
}
