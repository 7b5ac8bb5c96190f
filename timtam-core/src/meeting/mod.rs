//! Per-meeting state and the registry that owns it.

mod manager;
mod state;

pub use manager::{ManagerStatus, MeetingHandle, OrchestratorManager};
pub use state::{MeetingState, MeetingStatus};
