//! Live reconfiguration messages.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ConfigSource, parse_grasp_group};
use crate::error::Result;
use crate::meeting::OrchestratorManager;
use crate::types::MeetingId;

/// Name announced when an override arrives without one.
pub const UNNAMED_CONFIG: &str = "custom configuration";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Replace the Grasp group of every live meeting
    GraspConfig {
        #[serde(alias = "yaml")]
        body: String,
    },
    /// Replace one meeting's Grasp group and announce it in chat
    ApplyGraspConfig {
        #[serde(rename = "meetingId")]
        meeting_id: MeetingId,
        #[serde(alias = "yaml")]
        body: String,
        #[serde(rename = "configName", default, skip_serializing_if = "Option::is_none")]
        config_name: Option<String>,
    },
    /// Forget a meeting
    EndMeeting {
        #[serde(rename = "meetingId")]
        meeting_id: MeetingId,
    },
}

impl ControlMessage {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// What a control message changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    RebuiltAll { meetings: usize, grasps: usize },
    RebuiltMeeting { meeting_id: MeetingId, grasps: usize },
    MeetingNotLive { meeting_id: MeetingId },
    MeetingEnded { meeting_id: MeetingId, removed: bool },
}

/// Apply a control message to the manager.
///
/// The Grasp group is validated before any meeting is touched, so an invalid
/// body leaves every meeting unchanged.
pub async fn apply_control(
    manager: &OrchestratorManager,
    message: ControlMessage,
) -> Result<ControlOutcome> {
    match message {
        ControlMessage::GraspConfig { body } => {
            let definition = parse_grasp_group(&body)?;
            let meetings = manager
                .rebuild_all(&definition, ConfigSource::Override { config_name: None })
                .await;
            info!(
                meetings,
                grasp_count = definition.len(),
                "control.grasp_config.applied"
            );
            Ok(ControlOutcome::RebuiltAll {
                meetings,
                grasps: definition.len(),
            })
        }
        ControlMessage::ApplyGraspConfig {
            meeting_id,
            body,
            config_name,
        } => {
            let definition = parse_grasp_group(&body)?;
            let source = ConfigSource::Override {
                config_name: config_name.clone(),
            };
            if !manager.rebuild_meeting(&meeting_id, &definition, source).await {
                warn!(meeting_id = %meeting_id, "control.apply_grasp_config.not_live");
                return Ok(ControlOutcome::MeetingNotLive { meeting_id });
            }

            let name = config_name.as_deref().unwrap_or(UNNAMED_CONFIG);
            let announcement = format!(
                "Applied grasp configuration \"{}\" ({} grasps)",
                name,
                definition.len()
            );
            if let Err(e) = manager.notifier().post_chat(&meeting_id, &announcement).await {
                warn!(meeting_id = %meeting_id, error = %e, "control.announce.failed");
            }
            info!(
                meeting_id = %meeting_id,
                config_name = name,
                grasp_count = definition.len(),
                "control.apply_grasp_config.applied"
            );
            Ok(ControlOutcome::RebuiltMeeting {
                meeting_id,
                grasps: definition.len(),
            })
        }
        ControlMessage::EndMeeting { meeting_id } => {
            let removed = manager.remove_meeting(&meeting_id).await;
            Ok(ControlOutcome::MeetingEnded {
                meeting_id,
                removed,
            })
        }
    }
}
