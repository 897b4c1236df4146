use std::{fs, path::Path};

use log::debug;

use nvm_api::{
    error::{InvalidInputError, NvmError, ReportError},
    platform::{Dimm, PlatformSnapshot, Pool, SystemCapabilities},
};

use super::{CapabilityProvider, InventoryProvider};

/// Reads a platform snapshot from a YAML file.
pub fn load_platform_snapshot(path: &Path) -> Result<PlatformSnapshot, NvmError> {
    debug!("Loading platform snapshot from '{}'", path.display());
    let error = || InvalidInputError::LoadPlatformSnapshot {
        path: path.to_string_lossy().into(),
    };
    let contents = fs::read_to_string(path).structured(error())?;
    serde_yaml::from_str(&contents).structured(error())
}

impl CapabilityProvider for PlatformSnapshot {
    fn capabilities(&self) -> Result<SystemCapabilities, NvmError> {
        Ok(self.capabilities.clone())
    }
}

impl InventoryProvider for PlatformSnapshot {
    fn manageable_dimms(&self) -> Result<Vec<Dimm>, NvmError> {
        Ok(self.dimms.clone())
    }

    fn pools(&self) -> Result<Vec<Pool>, NvmError> {
        Ok(self.pools.clone())
    }

    fn socket_count(&self) -> Result<u16, NvmError> {
        Ok(self.socket_count)
    }
}
