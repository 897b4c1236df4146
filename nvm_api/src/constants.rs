use const_format::formatcp;

use crate::primitives::bytes::ByteCount;

// Request constants

/// Capacity that takes whatever is left on each DIMM.
pub const CAPACITY_REMAINING: &str = "remaining";

/// Persistent settings keyword requesting one interleave set per DIMM.
pub const SETTINGS_BY_ONE: &str = "ByOne";

/// Persistent settings keyword requesting a mirrored interleave set.
pub const SETTINGS_MIRROR: &str = "Mirror";

/// Maximum number of app-direct extents in one request.
pub const MAX_PERSISTENT_EXTENTS: usize = 2;

// Platform defaults

/// Alignment of regions when the platform does not report one.
pub const DEFAULT_ALIGNMENT: ByteCount = ByteCount::from_gib(1);

/// Interleave sets per DIMM when the platform does not report a limit.
pub const MAX_INTERLEAVE_SETS_PER_DIMM: u8 = 2;

// Path constants

/// Directory holding the agent state.
pub const NVMCFG_STATE_DIRECTORY: &str = "/var/lib/nvmcfg";

/// Default path of the persisted configuration goals.
pub const GOAL_STORE_PATH_DEFAULT: &str = formatcp!("{NVMCFG_STATE_DIRECTORY}/goals.yaml");

/// Default path of the platform snapshot.
pub const PLATFORM_SNAPSHOT_PATH_DEFAULT: &str = formatcp!("{NVMCFG_STATE_DIRECTORY}/platform.yaml");

/// Path to load the agent config from.
pub const AGENT_CONFIG_PATH: &str = "/etc/nvmcfg/config.yaml";
