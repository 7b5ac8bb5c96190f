//! Error types for timtam-core.

use thiserror::Error;

/// Result type alias using the engine error
pub type Result<T> = std::result::Result<T, EngineError>;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Configuration store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Judgment call failed: {0}")]
    Judge(#[from] JudgeError),

    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Transport error: {0}")]
    Source(#[from] SourceError),

    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while parsing a `{{INPUT}}` / `{{NOTES}}` placeholder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("invalid INPUT modifier: {0}")]
    InvalidInputModifier(String),

    #[error("invalid NOTES modifier: {0}")]
    InvalidNotesModifier(String),

    #[error("NOTES placeholder requires a tag")]
    MissingNotesTag,
}

/// Grasp group validation errors. Any one of these rejects the whole document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid document: {0}")]
    Syntax(String),

    #[error("missing required field: grasps")]
    MissingGrasps,

    #[error("field \"grasps\" must be an array")]
    GraspsNotArray,

    #[error("grasps[{index}]: must be a table")]
    GraspNotTable { index: usize },

    #[error("{}unknown parameter: {name}", location(.index))]
    UnknownParameter { index: Option<usize>, name: String },

    #[error("grasps[{index}]: {field} is required")]
    MissingField { index: usize, field: &'static str },

    #[error("grasps[{index}]: {field} must be {expected}")]
    InvalidField {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },

    #[error("grasps[{index}]: outputHandler must be \"chat\", \"note\" or \"both\" (got \"{value}\")")]
    InvalidOutputHandler { index: usize, value: String },

    #[error("grasp {node_id}: noteTag is required when outputHandler is \"note\" or \"both\"")]
    MissingNoteTag { node_id: String },

    #[error("grasp {node_id}: intervalSec must be greater than 0 (got {value})")]
    NonPositiveInterval { node_id: String, value: f64 },

    #[error("duplicate nodeId: {0}")]
    DuplicateNodeId(String),

    #[error("grasp {node_id}: {source}")]
    InvalidTemplate {
        node_id: String,
        #[source]
        source: TemplateError,
    },

    #[error("note tag \"{tag}\" is written by both {first} and {second}")]
    DuplicateNoteWriter {
        tag: String,
        first: String,
        second: String,
    },

    #[error("note tag \"{tag}\" written by {writer} is never referenced by another grasp")]
    UnreferencedNoteTag { tag: String, writer: String },

    #[error("grasp {reader} references note tag \"{tag}\" which no grasp writes")]
    UnwrittenNoteTag { tag: String, reader: String },
}

fn location(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("grasps[{}]: ", i),
        None => String::new(),
    }
}

/// Configuration store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Configuration rejected: {0}")]
    Invalid(#[from] ConfigError),

    #[error("Configuration not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Backend(String),
}

/// Raised to the caller of the resolver instead of silently falling back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("meeting {meeting_id} is assigned configuration {version_id}, which does not exist")]
    AssignedVersionMissing {
        meeting_id: String,
        version_id: String,
    },
}

/// Judgment client errors. "No decision" is not an error.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable response: {0}")]
    InvalidResponse(String),
}

/// Notifier delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Transcript / control transport errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("source closed")]
    Closed,
}

#[cfg(feature = "db")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Syntax(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_parameter_message() {
        let err = ConfigError::UnknownParameter {
            index: Some(2),
            name: "foo".into(),
        };
        assert_eq!(err.to_string(), "grasps[2]: unknown parameter: foo");

        let err = ConfigError::UnknownParameter {
            index: None,
            name: "bar".into(),
        };
        assert_eq!(err.to_string(), "unknown parameter: bar");
    }

    #[test]
    fn test_engine_error_wraps_config_error() {
        let err: EngineError = ConfigError::MissingGrasps.into();
        assert!(err.to_string().contains("grasps"));
        assert!(matches!(err, EngineError::Config(_)));
    }
}
