//! Collaborator traits.
//!
//! The engine talks to the outside world only through these seams: the
//! language-model call, the meeting platform's chat/audit sink, and the
//! metrics backend. Concrete implementations live in the server binary;
//! recording fakes live in [`crate::testing`].

use async_trait::async_trait;

use crate::error::{JudgeError, NotifyError};
use crate::types::{JudgeResult, MeetingId};

/// Performs one judgment call against a language model.
///
/// "No decision" is reported as `JudgeResult { decision: None, .. }`, never as
/// an error. Errors are reserved for transport and endpoint failures.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn invoke(&self, prompt: &str, node_id: &str) -> Result<JudgeResult, JudgeError>;
}

/// Chat and audit-log sink of the meeting platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a message into the meeting's chat.
    async fn post_chat(&self, meeting_id: &MeetingId, message: &str) -> Result<(), NotifyError>;

    /// Record a prompt/response pair for audit.
    async fn post_log_entry(
        &self,
        meeting_id: &MeetingId,
        prompt: &str,
        raw_response: &str,
        node_id: &str,
    ) -> Result<(), NotifyError>;
}

/// Best-effort metrics backend. Implementations must not block.
pub trait MetricsSink: Send + Sync {
    fn put_latency(&self, name: &str, ms: f64);
    fn put_count(&self, name: &str, value: u64);
}

/// Metric name helpers
pub mod metric {
    pub const QUEUE_DROPPED: &str = "Grasp.Queue.Dropped";
    pub const INGEST_ERRORS: &str = "Ingest.Errors";
    pub const INGEST_EVENTS: &str = "Ingest.Events";
    pub const CONFIG_RESOLVE_ERRORS: &str = "Config.ResolveErrors";

    pub fn execution_latency(node_id: &str) -> String {
        format!("Grasp.{}.ExecutionLatency", node_id)
    }

    pub fn e2e_latency(node_id: &str) -> String {
        format!("Grasp.{}.E2ELatency", node_id)
    }

    pub fn errors(node_id: &str) -> String {
        format!("Grasp.{}.Errors", node_id)
    }

    /// Round trip of the model call alone, recorded by judgment clients.
    pub fn invoke_latency(node_id: &str) -> String {
        format!("LLM.{}.InvokeLatency", node_id)
    }
}
