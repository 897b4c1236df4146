use std::{fs, io::ErrorKind, path::Path};

use log::{debug, info};

use nvm_api::{
    config::{AgentConfig, GoalRequest, MemoryAllocationRequest},
    error::{InvalidInputError, NvmError, ReportError},
};

/// Loads the agent configuration. A missing file yields the defaults.
pub fn load_agent_config(path: &Path) -> Result<AgentConfig, NvmError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(
                "No agent configuration at {}, using defaults",
                path.display()
            );
            return Ok(AgentConfig::default());
        }
        Err(e) => {
            return Err(e).structured(InvalidInputError::ReadInputFile {
                path: path.to_string_lossy().into(),
            })
        }
    };

    info!("Loading agent configuration from {}", path.display());
    serde_yaml::from_str(&contents).structured(InvalidInputError::ParseAgentConfig)
}

/// Reads a goal request from a YAML file and normalizes it.
pub fn load_request(path: &Path) -> Result<MemoryAllocationRequest, NvmError> {
    let contents = fs::read_to_string(path).structured(InvalidInputError::ReadInputFile {
        path: path.to_string_lossy().into(),
    })?;
    let goal: GoalRequest =
        serde_yaml::from_str(&contents).structured(InvalidInputError::ParseRequest)?;
    goal.to_request().map_err(NvmError::new)
}
