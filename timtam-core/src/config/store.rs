//! Durable storage of named Grasp group versions.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parser::parse_grasp_group;
use crate::error::StoreError;
use crate::types::MeetingId;
use crate::utils::now_ms;

/// One saved version of a Grasp group document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub version_id: String,
    pub name: String,
    pub body: String,
    pub created_at_ms: i64,
}

impl StoredConfig {
    /// New version with a `<name>-<uuid>` identifier.
    pub fn new(name: impl Into<String>, body: impl Into<String>, created_at_ms: i64) -> Self {
        let name = name.into();
        Self {
            version_id: format!("{}-{}", name, Uuid::new_v4()),
            name,
            body: body.into(),
            created_at_ms,
        }
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Version explicitly attached to a meeting, if any.
    async fn assigned_version(&self, meeting_id: &MeetingId) -> Result<Option<String>, StoreError>;

    /// Most recently created version with exactly this name.
    async fn named_version(&self, name: &str) -> Result<Option<StoredConfig>, StoreError>;

    async fn version_by_id(&self, version_id: &str) -> Result<Option<StoredConfig>, StoreError>;

    /// Validate `body` and store it as a new version of `name`.
    async fn save_config(&self, name: &str, body: &str) -> Result<StoredConfig, StoreError>;

    /// Attach an existing version to a meeting.
    async fn assign(&self, meeting_id: &MeetingId, version_id: &str) -> Result<(), StoreError>;

    /// Returns whether a version was removed. Assignments are left in place.
    async fn delete_version(&self, version_id: &str) -> Result<bool, StoreError>;
}

/// Process-local store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    versions: Vec<StoredConfig>,
    assignments: HashMap<MeetingId, String>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a version as-is, without validation.
    pub fn insert(&self, config: StoredConfig) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        inner.versions.push(config);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.versions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn assigned_version(&self, meeting_id: &MeetingId) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.assignments.get(meeting_id).cloned())
    }

    async fn named_version(&self, name: &str) -> Result<Option<StoredConfig>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        // ties go to the later insert
        Ok(inner
            .versions
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name == name)
            .max_by_key(|(i, c)| (c.created_at_ms, *i))
            .map(|(_, c)| c.clone()))
    }

    async fn version_by_id(&self, version_id: &str) -> Result<Option<StoredConfig>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner
            .versions
            .iter()
            .find(|c| c.version_id == version_id)
            .cloned())
    }

    async fn save_config(&self, name: &str, body: &str) -> Result<StoredConfig, StoreError> {
        parse_grasp_group(body)?;
        let config = StoredConfig::new(name, body, now_ms());
        self.insert(config.clone())?;
        Ok(config)
    }

    async fn assign(&self, meeting_id: &MeetingId, version_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        if !inner.versions.iter().any(|c| c.version_id == version_id) {
            return Err(StoreError::NotFound(version_id.to_string()));
        }
        inner
            .assignments
            .insert(meeting_id.clone(), version_id.to_string());
        Ok(())
    }

    async fn delete_version(&self, version_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let before = inner.versions.len();
        inner.versions.retain(|c| c.version_id != version_id);
        Ok(inner.versions.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "grasps = []";

    #[tokio::test]
    async fn test_named_version_picks_latest() {
        let store = InMemoryConfigStore::new();
        store.insert(StoredConfig::new("DEFAULT", "old", 1_000)).unwrap();
        store.insert(StoredConfig::new("DEFAULT", "new", 2_000)).unwrap();
        store.insert(StoredConfig::new("default", "lower", 3_000)).unwrap();

        let found = store.named_version("DEFAULT").await.unwrap().unwrap();
        assert_eq!(found.body, "new");
        assert!(found.version_id.starts_with("DEFAULT-"));
        assert!(store.named_version("OTHER").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_validates_body() {
        let store = InMemoryConfigStore::new();
        let err = store.save_config("broken", "grasps = 1").await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.is_empty());

        let saved = store.save_config("team", VALID).await.unwrap();
        assert_eq!(
            store.version_by_id(&saved.version_id).await.unwrap(),
            Some(saved)
        );
    }

    #[tokio::test]
    async fn test_assign_requires_existing_version() {
        let store = InMemoryConfigStore::new();
        let meeting = MeetingId::new("m-1");
        assert!(matches!(
            store.assign(&meeting, "nope").await,
            Err(StoreError::NotFound(_))
        ));

        let saved = store.save_config("team", VALID).await.unwrap();
        store.assign(&meeting, &saved.version_id).await.unwrap();
        assert_eq!(
            store.assigned_version(&meeting).await.unwrap(),
            Some(saved.version_id.clone())
        );

        assert!(store.delete_version(&saved.version_id).await.unwrap());
        assert!(!store.delete_version(&saved.version_id).await.unwrap());
        // assignment survives the deletion
        assert!(store.assigned_version(&meeting).await.unwrap().is_some());
    }
}
