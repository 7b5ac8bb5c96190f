//! Decides which Grasp group applies to a meeting.
//!
//! Order: the version explicitly assigned to the meeting, then the newest
//! version named `DEFAULT`, then the built-in group. Any load or parse failure
//! falls back to the built-in group, except an assignment that points at a
//! version which does not exist.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::builtin::{DEFAULT_CONFIG_NAME, builtin_definition};
use super::definition::GraspGroupDefinition;
use super::parser::parse_grasp_group;
use super::store::ConfigStore;
use crate::error::ResolveError;
use crate::types::MeetingId;

/// Where a resolved group came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigSource {
    Assigned { version_id: String },
    NamedDefault { version_id: String },
    BuiltIn,
    /// Pushed at runtime through the control channel
    Override { config_name: Option<String> },
}

#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub source: ConfigSource,
    pub definition: GraspGroupDefinition,
}

#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub async fn resolve(&self, meeting_id: &MeetingId) -> Result<ResolvedGroup, ResolveError> {
        match self.store.assigned_version(meeting_id).await {
            Ok(Some(version_id)) => return self.resolve_assigned(meeting_id, version_id).await,
            Ok(None) => {}
            Err(e) => {
                warn!(meeting_id = %meeting_id, error = %e, "config.assignment.load_failed");
                return Ok(Self::builtin());
            }
        }

        match self.store.named_version(DEFAULT_CONFIG_NAME).await {
            Ok(Some(config)) => match parse_grasp_group(&config.body) {
                Ok(definition) => {
                    info!(
                        meeting_id = %meeting_id,
                        version_id = %config.version_id,
                        grasp_count = definition.len(),
                        "config.default.loaded"
                    );
                    Ok(ResolvedGroup {
                        source: ConfigSource::NamedDefault {
                            version_id: config.version_id,
                        },
                        definition,
                    })
                }
                Err(e) => {
                    warn!(version_id = %config.version_id, error = %e, "config.default.invalid");
                    Ok(Self::builtin())
                }
            },
            Ok(None) => {
                info!(meeting_id = %meeting_id, "config.default.not_found");
                Ok(Self::builtin())
            }
            Err(e) => {
                warn!(error = %e, "config.default.load_failed");
                Ok(Self::builtin())
            }
        }
    }

    async fn resolve_assigned(
        &self,
        meeting_id: &MeetingId,
        version_id: String,
    ) -> Result<ResolvedGroup, ResolveError> {
        let config = match self.store.version_by_id(&version_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                return Err(ResolveError::AssignedVersionMissing {
                    meeting_id: meeting_id.to_string(),
                    version_id,
                });
            }
            Err(e) => {
                warn!(meeting_id = %meeting_id, version_id = %version_id, error = %e, "config.assigned.load_failed");
                return Ok(Self::builtin());
            }
        };

        match parse_grasp_group(&config.body) {
            Ok(definition) => {
                info!(
                    meeting_id = %meeting_id,
                    version_id = %version_id,
                    grasp_count = definition.len(),
                    "config.assigned.loaded"
                );
                Ok(ResolvedGroup {
                    source: ConfigSource::Assigned { version_id },
                    definition,
                })
            }
            Err(e) => {
                warn!(meeting_id = %meeting_id, version_id = %version_id, error = %e, "config.assigned.invalid");
                Ok(Self::builtin())
            }
        }
    }

    /// The built-in group. An empty group if even that fails to parse.
    pub fn builtin() -> ResolvedGroup {
        let definition = builtin_definition().unwrap_or_else(|e| {
            error!(error = %e, "config.builtin.invalid");
            GraspGroupDefinition::default()
        });
        ResolvedGroup {
            source: ConfigSource::BuiltIn,
            definition,
        }
    }
}
