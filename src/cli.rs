use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use nvm_api::{constants::AGENT_CONFIG_PATH, DimmId, SocketId};

use crate::{goals::GoalFilter, NVMCFG_VERSION};

#[derive(Parser, Debug)]
#[clap(version = NVMCFG_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Warn)]
    pub verbosity: LevelFilter,

    /// Path to the agent configuration
    #[arg(global = true, short, long, default_value = AGENT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Also write all logs to this file, one JSON object per line
    #[arg(global = true, long)]
    pub log_file: Option<PathBuf>,

    /// Record tracing spans to this file as JSON
    #[arg(global = true, long)]
    pub trace_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Selection of DIMMs shared by the goal commands.
#[derive(clap::Args, Debug, Default)]
pub struct Targets {
    /// Comma-separated list of DIMM ids
    #[clap(long, value_delimiter = ',', num_args = 0..)]
    pub dimm: Vec<DimmId>,

    /// Comma-separated list of socket ids
    #[clap(long, value_delimiter = ',', num_args = 0..)]
    pub socket: Vec<SocketId>,
}

impl From<&Targets> for GoalFilter {
    fn from(targets: &Targets) -> Self {
        Self {
            dimms: targets.dimm.clone(),
            sockets: targets.socket.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the memory allocation layout of a goal request
    ///
    /// The layout and its warnings are printed. Configuration goals are only
    /// stored when --force is given.
    #[clap(name = "create-goal")]
    CreateGoal {
        /// Goal request file
        #[clap(index = 1)]
        request: PathBuf,

        /// Store the resulting configuration goals
        #[clap(short, long)]
        force: bool,
    },

    /// Check a goal request against the platform without computing a layout
    Validate {
        /// Goal request file
        #[clap(index = 1)]
        request: PathBuf,
    },

    /// Show stored configuration goals
    #[clap(name = "show-goal")]
    ShowGoal {
        #[clap(flatten)]
        targets: Targets,
    },

    /// Delete stored configuration goals
    #[clap(name = "delete-goal")]
    DeleteGoal {
        #[clap(flatten)]
        targets: Targets,
    },

    /// Export all stored configuration goals to a file
    #[clap(name = "dump-config")]
    DumpConfig {
        /// Destination file
        #[clap(index = 1)]
        path: PathBuf,
    },

    /// Import configuration goals from a file written by dump-config
    #[clap(name = "load-goal")]
    LoadGoal {
        /// Source file
        #[clap(index = 1)]
        path: PathBuf,

        /// DIMMs to import, all when neither --dimm nor --socket is given
        #[clap(flatten)]
        targets: Targets,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::CreateGoal { .. } => "create-goal",
            Commands::Validate { .. } => "validate",
            Commands::ShowGoal { .. } => "show-goal",
            Commands::DeleteGoal { .. } => "delete-goal",
            Commands::DumpConfig { .. } => "dump-config",
            Commands::LoadGoal { .. } => "load-goal",
        }
    }

    /// Whether the command changes stored configuration goals.
    pub fn modifies_goals(&self) -> bool {
        matches!(
            self,
            Commands::CreateGoal { force: true, .. }
                | Commands::DeleteGoal { .. }
                | Commands::LoadGoal { .. }
        )
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}
