//! Built-in Grasp group used when no stored configuration applies.

use super::definition::GraspGroupDefinition;
use super::parser::parse_grasp_group;
use crate::error::ConfigError;

/// Name under which the stored default configuration is looked up.
/// Matching is case-sensitive.
pub const DEFAULT_CONFIG_NAME: &str = "DEFAULT";

pub const BUILTIN_GRASP_TOML: &str = r#"[[grasps]]
nodeId = "friendly-nodder"
intervalSec = 15
outputHandler = "chat"
promptTemplate = """
These are the latest utterances in the meeting.
{{INPUT:latest5}}

Decide whether a short, friendly acknowledgement would help.
"""

[[grasps]]
nodeId = "argument-observer"
intervalSec = 60
outputHandler = "note"
noteTag = "argument-notes"
promptTemplate = """
This is what was said in the meeting over the past minute.
{{INPUT:past1m}}

Record the arguments and key points being made.
"""

[[grasps]]
nodeId = "summary-provider"
intervalSec = 180
outputHandler = "chat"
promptTemplate = """
These are the notes taken on the discussion so far.
{{NOTES:argument-notes}}

Decide whether the participants would benefit from a short summary.
"""
"#;

/// Parse the built-in group.
pub fn builtin_definition() -> Result<GraspGroupDefinition, ConfigError> {
    parse_grasp_group(BUILTIN_GRASP_TOML)
}
