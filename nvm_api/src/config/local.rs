use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{GOAL_STORE_PATH_DEFAULT, PLATFORM_SNAPSHOT_PATH_DEFAULT};

/// Configuration of the nvmcfg agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentConfig {
    /// Platform snapshot describing the DIMMs, pools and capabilities.
    #[serde(default = "default_platform_snapshot")]
    pub platform_snapshot: PathBuf,

    /// File holding the persisted configuration goals.
    #[serde(default = "default_goal_store")]
    pub goal_store: PathBuf,
}

fn default_platform_snapshot() -> PathBuf {
    PathBuf::from(PLATFORM_SNAPSHOT_PATH_DEFAULT)
}

fn default_goal_store() -> PathBuf {
    PathBuf::from(GOAL_STORE_PATH_DEFAULT)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            platform_snapshot: default_platform_snapshot(),
            goal_store: default_goal_store(),
        }
    }
}
