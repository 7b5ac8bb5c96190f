//! Concrete collaborators wired into the engine.

mod judge;
mod metrics;
mod notifier;

pub use judge::{HttpJudgeClient, parse_decision};
pub use metrics::{LatencySummary, MetricsRegistry, MetricsSnapshot};
pub use notifier::TracingNotifier;
