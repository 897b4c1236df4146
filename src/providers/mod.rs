//! Narrow interfaces to the collaborators of the layout engine: the platform
//! capability and inventory sources, and the sink that receives configuration
//! goals.

use nvm_api::{
    error::{LibraryError, NvmError},
    platform::{Dimm, Pool, SystemCapabilities},
    status::ConfigGoal,
    DimmId,
};

mod snapshot;

pub use snapshot::load_platform_snapshot;

/// Source of driver and platform capabilities.
pub trait CapabilityProvider {
    fn capabilities(&self) -> Result<SystemCapabilities, NvmError>;
}

/// Source of the DIMM and pool inventory.
pub trait InventoryProvider {
    /// DIMMs that can be configured. Unmanageable DIMMs are not reported.
    fn manageable_dimms(&self) -> Result<Vec<Dimm>, NvmError>;

    fn pools(&self) -> Result<Vec<Pool>, NvmError>;

    fn socket_count(&self) -> Result<u16, NvmError>;
}

/// Receives the configuration goal of one DIMM at a time.
pub trait GoalCommitter {
    fn commit_goal(&mut self, dimm_id: &DimmId, goal: &ConfigGoal) -> Result<(), LibraryError>;
}

/// Persisted configuration goals.
pub trait GoalStore: GoalCommitter {
    /// All goals, ordered by DIMM id.
    fn goals(&self) -> Vec<ConfigGoal>;

    fn delete_goal(&mut self, dimm_id: &DimmId) -> Result<(), LibraryError>;
}
