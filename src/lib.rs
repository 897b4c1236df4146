use std::path::Path;

use log::info;
use serde::Serialize;

use nvm_api::{
    config::AgentConfig,
    error::{NvmError, NvmResultExt},
    layout::MemoryAllocationLayout,
    platform::PlatformSnapshot,
    status::ConfigGoal,
};

pub mod cli;
mod config;
mod datastore;
mod engine;
mod goals;
mod logging;
mod providers;

pub use config::{load_agent_config, load_request};
pub use datastore::FileGoalStore;
pub use engine::{AllocationContext, AllocationReport, Allocator};
pub use goals::GoalFilter;
pub use logging::{file_log::FileLog, multilog::MultiLogger};
pub use providers::{
    load_platform_snapshot, CapabilityProvider, GoalCommitter, GoalStore, InventoryProvider,
};

/// nvmcfg version as provided by environment variables at build time
pub const NVMCFG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result of a create-goal command.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GoalPlan {
    pub layout: MemoryAllocationLayout,
    pub goals: Vec<ConfigGoal>,

    /// The goals were written to the goal store.
    pub stored: bool,
}

/// Entry point of the agent commands, operating on the platform snapshot and
/// goal store named by the agent configuration.
pub struct NvmCfg {
    config: AgentConfig,
}

impl NvmCfg {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    fn platform(&self) -> Result<PlatformSnapshot, NvmError> {
        load_platform_snapshot(&self.config.platform_snapshot)
            .message("Failed to load platform snapshot")
    }

    fn allocator(&self) -> Result<Allocator, NvmError> {
        let platform = self.platform()?;
        Allocator::from_providers(&platform, &platform)
    }

    fn open_store(&self) -> Result<FileGoalStore, NvmError> {
        FileGoalStore::open(&self.config.goal_store).message("Failed to open goal store")
    }

    /// Computes the layout of a goal request and, when `store` is set,
    /// commits the goals of every DIMM.
    #[tracing::instrument(skip_all)]
    pub fn create_goal(&self, request: &Path, store: bool) -> Result<GoalPlan, NvmError> {
        let request = load_request(request).message("Failed to load goal request")?;
        let allocator = self.allocator()?;
        let layout = allocator
            .layout(&request)
            .message("Failed to compute memory allocation layout")?;
        let goals = layout.goals().collect();

        if store {
            let mut goal_store = self.open_store()?;
            let report = allocator.allocate(&layout, &mut goal_store);
            goal_store
                .persist()
                .message("Failed to persist configuration goals")?;
            report
                .into_result()
                .message("Failed to store configuration goals")?;
            info!("Stored configuration goals of {} DIMM(s)", layout.dimms.len());
        }

        Ok(GoalPlan {
            layout,
            goals,
            stored: store,
        })
    }

    pub fn validate(&self, request: &Path) -> Result<(), NvmError> {
        let request = load_request(request).message("Failed to load goal request")?;
        self.allocator()?
            .verify(&request)
            .message("Goal request is invalid")?;
        info!("Goal request is valid");
        Ok(())
    }

    pub fn show_goals(&self, filter: &GoalFilter) -> Result<Vec<ConfigGoal>, NvmError> {
        Ok(goals::show_goals(&self.open_store()?, filter))
    }

    pub fn delete_goals(&self, filter: &GoalFilter) -> Result<(), NvmError> {
        let mut store = self.open_store()?;
        let report =
            goals::delete_goals(&mut store, filter).message("Failed to delete goals")?;
        store
            .persist()
            .message("Failed to persist configuration goals")?;
        report.into_result()
    }

    pub fn dump_config(&self, path: &Path) -> Result<(), NvmError> {
        goals::export_config(&self.open_store()?, path)
    }

    pub fn load_goal(&self, path: &Path, targets: &GoalFilter) -> Result<(), NvmError> {
        let platform = self.platform()?;
        let manageable = platform
            .manageable_dimms()
            .message("Failed to query manageable DIMMs")?;
        let dimm_ids = targets
            .resolve_dimms(&manageable)
            .message("Failed to resolve import targets")?;

        let mut store = self.open_store()?;
        let report = goals::import_config(&mut store, path, &dimm_ids, &manageable)
            .message("Failed to import configuration goals")?;
        store
            .persist()
            .message("Failed to persist configuration goals")?;
        report.into_result()
    }
}
