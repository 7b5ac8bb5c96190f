//! Grasp group document parser.
//!
//! A document is TOML with a single `grasps` array:
//!
//! ```toml
//! [[grasps]]
//! nodeId = "argument-observer"
//! intervalSec = 60
//! outputHandler = "note"
//! noteTag = "argument-notes"
//! promptTemplate = "Observe the discussion: {{INPUT:past1m}}"
//! ```
//!
//! Parsing is a pure function from text to a validated definition. The first
//! violation rejects the whole document.

use std::collections::{HashMap, HashSet};

use toml::{Table, Value};

use super::definition::{GraspConfig, GraspGroupDefinition};
use crate::error::ConfigError;
use crate::grasp::{ParsedTemplate, PromptTemplate};
use crate::types::OutputHandler;

const GRASPS: &str = "grasps";
const NODE_ID: &str = "nodeId";
const PROMPT_TEMPLATE: &str = "promptTemplate";
const INTERVAL_SEC: &str = "intervalSec";
const OUTPUT_HANDLER: &str = "outputHandler";
const NOTE_TAG: &str = "noteTag";

const GRASP_FIELDS: [&str; 5] = [NODE_ID, PROMPT_TEMPLATE, INTERVAL_SEC, OUTPUT_HANDLER, NOTE_TAG];

/// Parse and validate a Grasp group document.
pub fn parse_grasp_group(text: &str) -> Result<GraspGroupDefinition, ConfigError> {
    let doc: Table = toml::from_str(text)?;

    if let Some(key) = doc.keys().find(|k| k.as_str() != GRASPS) {
        return Err(ConfigError::UnknownParameter {
            index: None,
            name: key.clone(),
        });
    }
    let entries = match doc.get(GRASPS) {
        None => return Err(ConfigError::MissingGrasps),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(ConfigError::GraspsNotArray),
    };

    let mut grasps = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let Value::Table(table) = entry else {
            return Err(ConfigError::GraspNotTable { index });
        };
        let grasp = parse_grasp(index, table)?;
        if !seen.insert(grasp.node_id.clone()) {
            return Err(ConfigError::DuplicateNodeId(grasp.node_id));
        }
        grasps.push(grasp);
    }

    validate_note_references(&grasps)?;
    Ok(GraspGroupDefinition { grasps })
}

fn parse_grasp(index: usize, table: &Table) -> Result<GraspConfig, ConfigError> {
    if let Some(key) = table.keys().find(|k| !GRASP_FIELDS.contains(&k.as_str())) {
        return Err(ConfigError::UnknownParameter {
            index: Some(index),
            name: key.clone(),
        });
    }

    let node_id = required_str(index, table, NODE_ID)?;
    let template_source = required_str(index, table, PROMPT_TEMPLATE)?;

    let interval_sec = match table.get(INTERVAL_SEC) {
        None => return Err(ConfigError::MissingField { index, field: INTERVAL_SEC }),
        Some(Value::Integer(n)) => *n as f64,
        Some(Value::Float(f)) => *f,
        Some(_) => {
            return Err(ConfigError::InvalidField {
                index,
                field: INTERVAL_SEC,
                expected: "a number",
            });
        }
    };

    let handler_name = required_str(index, table, OUTPUT_HANDLER)?;
    let output_handler =
        OutputHandler::parse(handler_name).ok_or_else(|| ConfigError::InvalidOutputHandler {
            index,
            value: handler_name.to_string(),
        })?;

    let note_tag = match table.get(NOTE_TAG) {
        None => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(ConfigError::InvalidField {
                index,
                field: NOTE_TAG,
                expected: "a string",
            });
        }
    };

    if output_handler.writes_note() && note_tag.is_none() {
        return Err(ConfigError::MissingNoteTag {
            node_id: node_id.to_string(),
        });
    }
    if interval_sec.is_nan() || interval_sec <= 0.0 {
        return Err(ConfigError::NonPositiveInterval {
            node_id: node_id.to_string(),
            value: interval_sec,
        });
    }

    let template =
        ParsedTemplate::parse(template_source).map_err(|source| ConfigError::InvalidTemplate {
            node_id: node_id.to_string(),
            source,
        })?;

    Ok(GraspConfig {
        node_id: node_id.to_string(),
        prompt: PromptTemplate::Literal(template),
        interval_sec,
        output_handler,
        note_tag,
        input_length: None,
    })
}

/// Missing, empty or non-string values are all rejected.
fn required_str<'a>(
    index: usize,
    table: &'a Table,
    field: &'static str,
) -> Result<&'a str, ConfigError> {
    match table.get(field) {
        None => Err(ConfigError::MissingField { index, field }),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ConfigError::MissingField { index, field })
        }
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ConfigError::InvalidField {
            index,
            field,
            expected: "a string",
        }),
    }
}

/// Every written tag must be read by another Grasp, and every read tag must
/// have exactly one writer.
pub(crate) fn validate_note_references(grasps: &[GraspConfig]) -> Result<(), ConfigError> {
    let mut writers: Vec<(&str, &str)> = Vec::new();
    for grasp in grasps {
        let Some(tag) = grasp.written_tag() else {
            continue;
        };
        if let Some((_, first)) = writers.iter().find(|(t, _)| *t == tag) {
            return Err(ConfigError::DuplicateNoteWriter {
                tag: tag.to_string(),
                first: first.to_string(),
                second: grasp.node_id.clone(),
            });
        }
        writers.push((tag, grasp.node_id.as_str()));
    }

    let mut readers: HashMap<&str, Vec<&str>> = HashMap::new();
    for grasp in grasps {
        for tag in grasp.prompt.referenced_tags() {
            if !writers.iter().any(|(t, _)| *t == tag) {
                return Err(ConfigError::UnwrittenNoteTag {
                    tag: tag.to_string(),
                    reader: grasp.node_id.clone(),
                });
            }
            readers.entry(tag).or_default().push(grasp.node_id.as_str());
        }
    }

    for (tag, writer) in &writers {
        let read_elsewhere = readers
            .get(tag)
            .is_some_and(|r| r.iter().any(|reader| reader != writer))
            || grasps
                .iter()
                .any(|g| g.node_id != *writer && g.prompt.reads_all_notes());
        if !read_elsewhere {
            return Err(ConfigError::UnreferencedNoteTag {
                tag: tag.to_string(),
                writer: writer.to_string(),
            });
        }
    }
    Ok(())
}
