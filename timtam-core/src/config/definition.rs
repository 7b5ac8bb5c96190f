//! Typed Grasp group definition.
//!
//! Stored documents always produce literal templates. Embedding code that
//! wants a named strategy builds its group with [`GraspGroupDefinition::builder`],
//! which applies the same validation as the document parser.

use std::collections::HashSet;

use super::parser::validate_note_references;
use crate::error::ConfigError;
use crate::grasp::{PromptTemplate, TemplateStrategy};
use crate::types::OutputHandler;

/// One validated Grasp entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GraspConfig {
    /// Unique within its group
    pub node_id: String,
    pub prompt: PromptTemplate,
    /// Cooldown between executions, in seconds (> 0)
    pub interval_sec: f64,
    pub output_handler: OutputHandler,
    pub note_tag: Option<String>,
    /// Window lines handed to a strategy template; `None` means all
    pub input_length: Option<usize>,
}

impl GraspConfig {
    /// A Grasp driven by a named strategy. The note tag and input length
    /// start unset.
    pub fn strategy(
        node_id: impl Into<String>,
        strategy: TemplateStrategy,
        interval_sec: f64,
        output_handler: OutputHandler,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            prompt: PromptTemplate::Strategy(strategy),
            interval_sec,
            output_handler,
            note_tag: None,
            input_length: None,
        }
    }

    pub fn with_note_tag(mut self, tag: impl Into<String>) -> Self {
        self.note_tag = Some(tag.into());
        self
    }

    pub fn with_input_length(mut self, lines: usize) -> Self {
        self.input_length = Some(lines);
        self
    }

    pub fn cooldown_ms(&self) -> i64 {
        (self.interval_sec * 1000.0).round() as i64
    }

    /// Tag used when writing notes. Falls back to the node id.
    pub fn note_tag(&self) -> &str {
        self.note_tag.as_deref().unwrap_or(&self.node_id)
    }

    /// Tag this Grasp writes, if its handler writes notes at all.
    pub fn written_tag(&self) -> Option<&str> {
        self.output_handler.writes_note().then(|| self.note_tag())
    }
}

/// Ordered set of Grasps applied to a meeting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraspGroupDefinition {
    pub grasps: Vec<GraspConfig>,
}

impl GraspGroupDefinition {
    pub fn builder() -> GraspGroupBuilder {
        GraspGroupBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.grasps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grasps.is_empty()
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.grasps.iter().map(|g| g.node_id.as_str()).collect()
    }
}

/// Programmatic counterpart of the document parser.
#[derive(Debug, Default)]
pub struct GraspGroupBuilder {
    grasps: Vec<GraspConfig>,
}

impl GraspGroupBuilder {
    pub fn grasp(mut self, grasp: GraspConfig) -> Self {
        self.grasps.push(grasp);
        self
    }

    /// Validate in declaration order. The first violation wins.
    pub fn build(self) -> Result<GraspGroupDefinition, ConfigError> {
        let mut seen = HashSet::new();
        for grasp in &self.grasps {
            if grasp.output_handler.writes_note() && grasp.note_tag.is_none() {
                return Err(ConfigError::MissingNoteTag {
                    node_id: grasp.node_id.clone(),
                });
            }
            if grasp.interval_sec.is_nan() || grasp.interval_sec <= 0.0 {
                return Err(ConfigError::NonPositiveInterval {
                    node_id: grasp.node_id.clone(),
                    value: grasp.interval_sec,
                });
            }
            if !seen.insert(grasp.node_id.as_str()) {
                return Err(ConfigError::DuplicateNodeId(grasp.node_id.clone()));
            }
        }
        validate_note_references(&self.grasps)?;
        Ok(GraspGroupDefinition {
            grasps: self.grasps,
        })
    }
}
