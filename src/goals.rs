//! Management of persisted configuration goals: listing, deleting, exporting
//! and importing them.

use std::{collections::BTreeMap, fs, path::Path};

use log::{debug, error, info};

use nvm_api::{
    error::{BadRequestError, NvmError, PersistenceError, ReportError},
    platform::Dimm,
    status::{ConfigGoal, GoalStatus},
    DimmId, SocketId,
};

use crate::{
    engine::AllocationReport,
    providers::{GoalCommitter, GoalStore},
};

/// Selects goals by DIMM id or socket. An empty filter matches everything.
#[derive(Debug, Default, Clone)]
pub struct GoalFilter {
    pub dimms: Vec<DimmId>,
    pub sockets: Vec<SocketId>,
}

impl GoalFilter {
    pub fn matches(&self, goal: &ConfigGoal) -> bool {
        (self.dimms.is_empty() || self.dimms.contains(&goal.dimm_id))
            && (self.sockets.is_empty() || self.sockets.contains(&goal.socket_id))
    }

    /// Resolves the filter to a list of DIMM ids. Sockets expand to their
    /// manageable DIMMs; an empty filter stays empty and selects every DIMM.
    pub fn resolve_dimms(&self, manageable: &[Dimm]) -> Result<Vec<DimmId>, NvmError> {
        if !self.dimms.is_empty() && !self.sockets.is_empty() {
            return Err(NvmError::new(BadRequestError::DimmsAndSocketsSpecified));
        }

        let mut dimm_ids = self.dimms.clone();
        for &socket_id in &self.sockets {
            let before = dimm_ids.len();
            dimm_ids.extend(
                manageable
                    .iter()
                    .filter(|dimm| dimm.socket_id == socket_id)
                    .map(|dimm| dimm.id.clone()),
            );
            if dimm_ids.len() == before {
                return Err(NvmError::new(BadRequestError::InvalidSocket { socket_id }));
            }
        }
        Ok(dimm_ids)
    }
}

pub fn show_goals(store: &dyn GoalStore, filter: &GoalFilter) -> Vec<ConfigGoal> {
    store
        .goals()
        .into_iter()
        .filter(|goal| filter.matches(goal))
        .collect()
}

/// Deletes the goals matched by `filter`.
///
/// Goals of DIMMs that share an interleave set with other DIMMs of their
/// socket can only be deleted together with the rest of the socket.
#[tracing::instrument(skip_all)]
pub fn delete_goals(
    store: &mut dyn GoalStore,
    filter: &GoalFilter,
) -> Result<AllocationReport, NvmError> {
    let goals = store.goals();
    let matched = goals
        .iter()
        .filter(|goal| filter.matches(goal))
        .collect::<Vec<_>>();
    if matched.is_empty() {
        return Err(NvmError::new(BadRequestError::NotConfigured));
    }

    let mut by_socket: BTreeMap<SocketId, Vec<&ConfigGoal>> = BTreeMap::new();
    for goal in &goals {
        by_socket.entry(goal.socket_id).or_default().push(goal);
    }
    for (socket_id, socket_goals) in by_socket {
        let spans_dimms = socket_goals.iter().any(|goal| goal.spans_dimms());
        let matched_count = socket_goals.iter().filter(|goal| filter.matches(goal)).count();
        if spans_dimms && matched_count > 0 && matched_count < socket_goals.len() {
            return Err(NvmError::new(BadRequestError::PartialSocketDelete {
                socket_id,
            }));
        }
    }

    let mut report = AllocationReport::default();
    for goal in matched {
        info!("Deleting configuration goal of DIMM '{}'", goal.dimm_id);
        let result = store.delete_goal(&goal.dimm_id);
        if let Err(e) = &result {
            error!(
                "Failed to delete configuration goal of DIMM '{}': {e}",
                goal.dimm_id
            );
        }
        report.record(goal.dimm_id.clone(), result);
    }
    Ok(report)
}

/// Writes every goal of the store to a YAML file.
pub fn export_config(store: &dyn GoalStore, path: &Path) -> Result<(), NvmError> {
    let goals = store.goals();
    info!(
        "Exporting {} configuration goal(s) to {}",
        goals.len(),
        path.display()
    );
    let error = || PersistenceError::ExportConfig {
        path: path.to_string_lossy().into(),
    };
    let yaml = serde_yaml::to_string(&goals).structured(error())?;
    fs::write(path, yaml).structured(error())
}

/// Reads goals exported by `export_config()` and commits the ones belonging
/// to `dimm_ids`, or all of them when `dimm_ids` is empty. Every goal starts
/// over as new.
#[tracing::instrument(skip_all)]
pub fn import_config(
    store: &mut dyn GoalStore,
    path: &Path,
    dimm_ids: &[DimmId],
    manageable: &[Dimm],
) -> Result<AllocationReport, NvmError> {
    for dimm_id in dimm_ids {
        if !manageable.iter().any(|dimm| &dimm.id == dimm_id) {
            return Err(NvmError::new(BadRequestError::InvalidDimm {
                dimm_id: dimm_id.clone(),
            }));
        }
    }

    let error = || PersistenceError::ImportConfig {
        path: path.to_string_lossy().into(),
    };
    let raw = fs::read_to_string(path).structured(error())?;
    let goals: Vec<ConfigGoal> = serde_yaml::from_str(&raw).structured(error())?;
    debug!("Read {} configuration goal(s) from {}", goals.len(), path.display());

    let goals = goals
        .into_iter()
        .filter(|goal| dimm_ids.is_empty() || dimm_ids.contains(&goal.dimm_id))
        .collect::<Vec<_>>();
    if let Some(goal) = goals
        .iter()
        .find(|goal| !manageable.iter().any(|dimm| dimm.id == goal.dimm_id))
    {
        return Err(NvmError::new(BadRequestError::InvalidDimm {
            dimm_id: goal.dimm_id.clone(),
        }));
    }

    let mut report = AllocationReport::default();
    for mut goal in goals {
        goal.status = GoalStatus::New;
        info!("Importing configuration goal of DIMM '{}'", goal.dimm_id);
        let result = store.commit_goal(&goal.dimm_id, &goal);
        if let Err(e) = &result {
            error!(
                "Failed to import configuration goal of DIMM '{}': {e}",
                goal.dimm_id
            );
        }
        report.record(goal.dimm_id, result);
    }
    Ok(report)
}
