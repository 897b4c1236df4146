use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use nvm_api::{
    error::{LibraryError, NvmError, PersistenceError, ReportError},
    status::ConfigGoal,
    DimmId,
};

use crate::providers::{GoalCommitter, GoalStore};

/// On-disk format of the goal store.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GoalStoreContents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_modified: Option<DateTime<Utc>>,

    #[serde(default)]
    goals: BTreeMap<DimmId, ConfigGoal>,
}

/// Configuration goals persisted in a YAML file, keyed by DIMM id.
///
/// Committed and deleted goals are kept in memory until `persist()` is
/// called, which replaces the file atomically.
pub struct FileGoalStore {
    path: PathBuf,
    contents: GoalStoreContents,
    modified: bool,
}

impl FileGoalStore {
    /// Opens the goal store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, NvmError> {
        let contents = if path.exists() {
            info!("Loading goal store from {}", path.display());
            let raw = fs::read_to_string(path).structured(PersistenceError::LoadGoalStore {
                path: path.to_string_lossy().into(),
            })?;
            serde_yaml::from_str(&raw).structured(PersistenceError::LoadGoalStore {
                path: path.to_string_lossy().into(),
            })?
        } else {
            info!("No goal store at {}, starting empty", path.display());
            GoalStoreContents::default()
        };

        Ok(Self {
            path: path.to_owned(),
            contents,
            modified: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the file was last written, if ever.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.contents.last_modified
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Writes pending changes to disk. Does nothing when there are none.
    pub fn persist(&mut self) -> Result<(), NvmError> {
        if !self.modified {
            debug!("Goal store has no pending changes");
            return Ok(());
        }

        let error = || PersistenceError::WriteGoalStore {
            path: self.path.to_string_lossy().into(),
        };

        let directory = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(directory).structured(error())?;

        let mut contents = GoalStoreContents {
            last_modified: Some(Utc::now()),
            goals: self.contents.goals.clone(),
        };
        let yaml = serde_yaml::to_string(&contents).structured(error())?;

        let mut file = NamedTempFile::new_in(directory).structured(error())?;
        file.write_all(yaml.as_bytes()).structured(error())?;
        file.persist(&self.path).structured(error())?;

        info!(
            "Wrote {} configuration goal(s) to {}",
            self.contents.goals.len(),
            self.path.display()
        );
        self.contents.last_modified = contents.last_modified.take();
        self.modified = false;
        Ok(())
    }
}

impl GoalCommitter for FileGoalStore {
    fn commit_goal(&mut self, dimm_id: &DimmId, goal: &ConfigGoal) -> Result<(), LibraryError> {
        debug!("Storing configuration goal of DIMM '{dimm_id}'");
        self.contents.goals.insert(dimm_id.clone(), goal.clone());
        self.modified = true;
        Ok(())
    }
}

impl GoalStore for FileGoalStore {
    fn goals(&self) -> Vec<ConfigGoal> {
        self.contents.goals.values().cloned().collect()
    }

    fn delete_goal(&mut self, dimm_id: &DimmId) -> Result<(), LibraryError> {
        if self.contents.goals.remove(dimm_id).is_some() {
            debug!("Deleted configuration goal of DIMM '{dimm_id}'");
            self.modified = true;
        }
        Ok(())
    }
}
