mod capacity;
mod goal_request;
mod local;
mod request;

pub use capacity::Capacity;
pub use goal_request::GoalRequest;
pub use local::AgentConfig;
pub use request::{MemoryAllocationRequest, PersistentExtent};
