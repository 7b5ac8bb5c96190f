//! timtam-core - Grasp orchestration engine
//!
//! Decides, per meeting and in near real time, when to ask a language model
//! whether a facilitator should speak up, and routes the answer to the
//! meeting chat or to a shared notebook that later prompts can read.
//!
//! - **grasp**: window buffer, notebook, cooldowns, templates, the Grasp runtime and queue
//! - **config**: Grasp group DSL, built-in group, versioned stores and the resolver
//! - **meeting**: per-meeting state and the manager that owns it
//! - **ingest**: transcript/control sources, the ingestion loop and the ticker
//! - **traits**: judgment, notification and metrics collaborators
//! - **settings**: engine and ingestion policy
//! - **telemetry**: tracing initialisation

pub mod config;
pub mod error;
pub mod grasp;
pub mod ingest;
pub mod meeting;
pub mod settings;
pub mod telemetry;
pub mod testing;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{ConfigResolver, ConfigSource, ConfigStore, GraspGroupDefinition, parse_grasp_group};
pub use error::{EngineError, Result};
pub use meeting::{MeetingState, OrchestratorManager};
pub use settings::{EngineConfig, IngestConfig};
pub use traits::{JudgeClient, MetricsSink, Notifier};
pub use types::{MeetingId, TranscriptEvent};
