//! Grasp group configuration.
//!
//! - **definition**: typed intermediate representation of a group and its builder
//! - **parser**: document text to validated definition
//! - **builtin**: fallback group and the `DEFAULT` name
//! - **store**: versioned storage trait and in-memory store
//! - **sqlite**: durable store (feature `db`)
//! - **resolver**: picks the group that applies to a meeting

mod builtin;
mod definition;
mod parser;
mod resolver;
#[cfg(feature = "db")]
mod sqlite;
mod store;

pub use builtin::{BUILTIN_GRASP_TOML, DEFAULT_CONFIG_NAME, builtin_definition};
pub use definition::{GraspConfig, GraspGroupBuilder, GraspGroupDefinition};
pub use parser::parse_grasp_group;
pub use resolver::{ConfigResolver, ConfigSource, ResolvedGroup};
#[cfg(feature = "db")]
pub use sqlite::SqliteConfigStore;
pub use store::{ConfigStore, InMemoryConfigStore, StoredConfig};
