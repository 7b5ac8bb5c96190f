//! Shared types for timtam-core.
//!
//! These types cross the engine boundary: transcript events arriving from the
//! meeting platform, notes written by Grasps, and judgment results coming back
//! from the language model.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Meeting identifier. Every piece of per-tenant state is keyed by this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(String);

impl MeetingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeetingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MeetingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcript
// ─────────────────────────────────────────────────────────────────────────────

/// One speech-recognition result delivered by the transcript source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub meeting_id: MeetingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    pub text: String,
    pub is_final: bool,
    /// Capture time in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
}

impl TranscriptEvent {
    /// Text as it should appear in the window, prefixed with the speaker.
    pub fn display_text(&self) -> String {
        match &self.speaker_id {
            Some(speaker) if !speaker.is_empty() => format!("[{}] {}", speaker, self.text),
            _ => self.text.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grasp output
// ─────────────────────────────────────────────────────────────────────────────

/// Where a Grasp's decision goes when it decides to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputHandler {
    Chat,
    Note,
    Both,
}

impl OutputHandler {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "note" => Some(Self::Note),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Note => "note",
            Self::Both => "both",
        }
    }

    pub fn writes_chat(&self) -> bool {
        matches!(self, Self::Chat | Self::Both)
    }

    pub fn writes_note(&self) -> bool {
        matches!(self, Self::Note | Self::Both)
    }
}

impl fmt::Display for OutputHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A note written by a Grasp into its meeting's notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub tag: String,
    pub content: String,
    pub timestamp_ms: i64,
    /// nodeId of the Grasp that wrote the note
    pub created_by: String,
}

/// The model's answer, in the JSON shape the prompt preamble asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub should_intervene: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// Outcome of one judgment call.
///
/// `decision` is `None` when the model's answer could not be interpreted;
/// that is a normal outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    pub decision: Option<Decision>,
    pub prompt: String,
    pub raw_response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_event_from_camel_case_json() {
        let json = r#"{
            "meetingId": "m-1",
            "speakerId": "alice",
            "text": "hello",
            "isFinal": true,
            "timestamp": 1700000000000,
            "sequenceNumber": "42"
        }"#;
        let ev: TranscriptEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.meeting_id.as_str(), "m-1");
        assert_eq!(ev.speaker_id.as_deref(), Some("alice"));
        assert!(ev.is_final);
        assert_eq!(ev.timestamp, Some(1_700_000_000_000));
        assert_eq!(ev.display_text(), "[alice] hello");
    }

    #[test]
    fn test_transcript_event_optional_fields() {
        let json = r#"{"meetingId": "m-1", "text": "hi", "isFinal": false}"#;
        let ev: TranscriptEvent = serde_json::from_str(json).unwrap();
        assert!(ev.speaker_id.is_none());
        assert!(ev.timestamp.is_none());
        assert_eq!(ev.display_text(), "hi");
    }

    #[test]
    fn test_output_handler_flags() {
        assert!(OutputHandler::Chat.writes_chat());
        assert!(!OutputHandler::Chat.writes_note());
        assert!(OutputHandler::Note.writes_note());
        assert!(!OutputHandler::Note.writes_chat());
        assert!(OutputHandler::Both.writes_chat() && OutputHandler::Both.writes_note());
        assert_eq!(OutputHandler::parse("both"), Some(OutputHandler::Both));
        assert_eq!(OutputHandler::parse("Chat"), None);
    }

    #[test]
    fn test_decision_tolerates_missing_fields() {
        let d: Decision = serde_json::from_str(r#"{"should_intervene": false}"#).unwrap();
        assert!(!d.should_intervene);
        assert!(d.message.is_empty());
    }
}
