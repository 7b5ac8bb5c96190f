//! Notifier that emits chat messages and audit entries as log events.

use async_trait::async_trait;
use timtam_core::error::NotifyError;
use timtam_core::traits::Notifier;
use timtam_core::types::MeetingId;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn post_chat(&self, meeting_id: &MeetingId, message: &str) -> Result<(), NotifyError> {
        info!(target: "timtam::chat", meeting_id = %meeting_id, text = message, "chat.posted");
        Ok(())
    }

    async fn post_log_entry(
        &self,
        meeting_id: &MeetingId,
        prompt: &str,
        raw_response: &str,
        node_id: &str,
    ) -> Result<(), NotifyError> {
        info!(
            target: "timtam::audit",
            meeting_id = %meeting_id,
            node_id,
            prompt_chars = prompt.chars().count(),
            raw_response,
            "audit.entry"
        );
        Ok(())
    }
}
