//! Registry of live meetings.
//!
//! The manager owns every `MeetingState`, creates them on first use with the
//! Grasp group the resolver picks, and evicts meetings that have gone quiet.
//! Each meeting sits behind its own async mutex so one meeting's slow
//! judgment call never blocks another meeting.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::state::{MeetingState, MeetingStatus};
use crate::config::{ConfigResolver, ConfigSource, GraspGroupDefinition};
use crate::error::ResolveError;
use crate::grasp::Grasp;
use crate::settings::EngineConfig;
use crate::traits::{JudgeClient, MetricsSink, Notifier};
use crate::types::{MeetingId, TranscriptEvent};

pub type MeetingHandle = Arc<Mutex<MeetingState>>;

/// Aggregate view over every tracked meeting.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub meeting_count: usize,
    pub max_meetings: usize,
    /// Meetings skipped because they were busy running a Grasp
    pub busy_meetings: usize,
    pub meetings: Vec<MeetingStatus>,
}

pub struct OrchestratorManager {
    meetings: RwLock<HashMap<MeetingId, MeetingHandle>>,
    resolver: ConfigResolver,
    judge: Arc<dyn JudgeClient>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn MetricsSink>,
    config: EngineConfig,
    rebuild_generation: AtomicU64,
}

impl OrchestratorManager {
    pub fn new(
        config: EngineConfig,
        resolver: ConfigResolver,
        judge: Arc<dyn JudgeClient>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        info!(
            max_meetings = config.max_meetings,
            meeting_timeout_ms = config.meeting_timeout_ms,
            "manager.created"
        );
        Self {
            meetings: RwLock::new(HashMap::new()),
            resolver,
            judge,
            notifier,
            metrics,
            config,
            rebuild_generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// Instantiate runtime Grasps for a definition.
    pub fn build_grasps(&self, definition: &GraspGroupDefinition) -> Vec<Grasp> {
        definition
            .grasps
            .iter()
            .cloned()
            .map(|config| Grasp::new(config, self.judge.clone()))
            .collect()
    }

    /// Existing meeting, or a new one with the resolved Grasp group.
    ///
    /// At capacity, inactive meetings are evicted first.
    pub async fn get_or_create(
        &self,
        meeting_id: &MeetingId,
        now_ms: i64,
    ) -> Result<MeetingHandle, ResolveError> {
        if let Some(handle) = self.get(meeting_id).await {
            return Ok(handle);
        }

        let resolved = self.resolver.resolve(meeting_id).await?;
        let grasps = self.build_grasps(&resolved.definition);

        let mut meetings = self.meetings.write().await;
        // another task may have created it while resolving
        if let Some(handle) = meetings.get(meeting_id) {
            return Ok(handle.clone());
        }
        if meetings.len() >= self.config.max_meetings {
            Self::evict_inactive(&mut meetings, self.config.meeting_timeout_ms, now_ms);
            if meetings.len() >= self.config.max_meetings {
                warn!(
                    meeting_id = %meeting_id,
                    meeting_count = meetings.len(),
                    max_meetings = self.config.max_meetings,
                    "manager.capacity.exceeded"
                );
            }
        }

        let grasp_count = grasps.len();
        let state = MeetingState::new(
            meeting_id.clone(),
            grasps,
            resolved.source,
            &self.config,
            self.notifier.clone(),
            self.metrics.clone(),
            now_ms,
        );
        let handle = Arc::new(Mutex::new(state));
        meetings.insert(meeting_id.clone(), handle.clone());
        info!(
            meeting_id = %meeting_id,
            grasp_count,
            total_meetings = meetings.len(),
            "meeting.created"
        );
        Ok(handle)
    }

    pub async fn get(&self, meeting_id: &MeetingId) -> Option<MeetingHandle> {
        self.meetings.read().await.get(meeting_id).cloned()
    }

    /// Route a transcript event to its meeting. Returns whether a Grasp ran.
    pub async fn process_transcript(
        &self,
        event: &TranscriptEvent,
        now_ms: i64,
    ) -> Result<bool, ResolveError> {
        let handle = self.get_or_create(&event.meeting_id, now_ms).await?;
        let mut meeting = handle.lock().await;
        Ok(meeting.on_transcript(event, now_ms).await)
    }

    /// Periodic tick for every meeting, concurrently.
    ///
    /// Meetings busy with an event are skipped for this tick. Returns how
    /// many meetings executed a Grasp.
    pub async fn process_all_queues(&self, now_ms: i64) -> usize {
        let handles: Vec<MeetingHandle> = self.meetings.read().await.values().cloned().collect();
        let results = join_all(handles.iter().map(|handle| async move {
            match handle.try_lock() {
                Ok(mut meeting) => meeting.process_queue(now_ms).await,
                Err(_) => false,
            }
        }))
        .await;
        results.into_iter().filter(|ran| *ran).count()
    }

    /// Remove meetings inactive for longer than the timeout.
    pub async fn cleanup_inactive_meetings(&self, now_ms: i64) -> usize {
        let mut meetings = self.meetings.write().await;
        Self::evict_inactive(&mut meetings, self.config.meeting_timeout_ms, now_ms)
    }

    fn evict_inactive(
        meetings: &mut HashMap<MeetingId, MeetingHandle>,
        timeout_ms: i64,
        now_ms: i64,
    ) -> usize {
        let before = meetings.len();
        // a locked meeting is in use, so not inactive
        meetings.retain(|_, handle| match handle.try_lock() {
            Ok(meeting) => now_ms - meeting.last_activity_ms() <= timeout_ms,
            Err(_) => true,
        });
        let removed = before - meetings.len();
        if removed > 0 {
            info!(
                removed_meetings = removed,
                remaining_meetings = meetings.len(),
                "manager.cleanup"
            );
        }
        removed
    }

    pub async fn remove_meeting(&self, meeting_id: &MeetingId) -> bool {
        let removed = self.meetings.write().await.remove(meeting_id).is_some();
        if removed {
            info!(meeting_id = %meeting_id, "meeting.removed");
        }
        removed
    }

    /// Drop every meeting.
    pub async fn cleanup(&self) {
        let mut meetings = self.meetings.write().await;
        let count = meetings.len();
        meetings.clear();
        info!(removed_meetings = count, "manager.cleared");
    }

    /// Swap one meeting's Grasp group. Returns `false` if it is not live.
    ///
    /// A meeting that is busy in a judgment call is rebuilt by a spawned task
    /// once it frees up, so the caller never waits on it.
    pub async fn rebuild_meeting(
        &self,
        meeting_id: &MeetingId,
        definition: &GraspGroupDefinition,
        source: ConfigSource,
    ) -> bool {
        let Some(handle) = self.get(meeting_id).await else {
            return false;
        };
        let generation = self.next_generation();
        let grasps = self.build_grasps(definition);
        schedule_rebuild(meeting_id.clone(), handle, grasps, source, generation);
        true
    }

    /// Swap the Grasp group of every live meeting. Returns how many changed
    /// or were scheduled to change.
    pub async fn rebuild_all(&self, definition: &GraspGroupDefinition, source: ConfigSource) -> usize {
        let handles: Vec<(MeetingId, MeetingHandle)> = self
            .meetings
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();
        let generation = self.next_generation();
        let count = handles.len();
        for (meeting_id, handle) in handles {
            let grasps = self.build_grasps(definition);
            schedule_rebuild(meeting_id, handle, grasps, source.clone(), generation);
        }
        count
    }

    fn next_generation(&self) -> u64 {
        self.rebuild_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub async fn len(&self) -> usize {
        self.meetings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.meetings.read().await.is_empty()
    }

    pub async fn meeting_ids(&self) -> Vec<MeetingId> {
        let mut ids: Vec<MeetingId> = self.meetings.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn status(&self) -> ManagerStatus {
        let handles: Vec<MeetingHandle> = self.meetings.read().await.values().cloned().collect();
        let mut meetings = Vec::with_capacity(handles.len());
        let mut busy_meetings = 0;
        for handle in &handles {
            match handle.try_lock() {
                Ok(meeting) => meetings.push(meeting.status()),
                Err(_) => busy_meetings += 1,
            }
        }
        meetings.sort_by(|a, b| a.meeting_id.cmp(&b.meeting_id));
        ManagerStatus {
            meeting_count: handles.len(),
            max_meetings: self.config.max_meetings,
            busy_meetings,
            meetings,
        }
    }
}

fn schedule_rebuild(
    meeting_id: MeetingId,
    handle: MeetingHandle,
    grasps: Vec<Grasp>,
    source: ConfigSource,
    generation: u64,
) {
    match handle.try_lock() {
        Ok(mut meeting) => meeting.apply_rebuild(grasps, source, generation),
        Err(_) => {
            debug!(meeting_id = %meeting_id, generation, "meeting.rebuild.deferred");
            let handle = Arc::clone(&handle);
            tokio::spawn(async move {
                handle.lock().await.apply_rebuild(grasps, source, generation);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, InMemoryConfigStore, parse_grasp_group};
    use crate::testing::{RecordingMetrics, RecordingNotifier, ScriptedJudge};
    use std::time::Duration;

    const BASE: i64 = 1_705_314_600_000;
    const HOUR: i64 = 3_600_000;

    fn manager_with(config: EngineConfig, store: Arc<InMemoryConfigStore>) -> OrchestratorManager {
        OrchestratorManager::new(
            config,
            ConfigResolver::new(store),
            Arc::new(ScriptedJudge::decline()),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingMetrics::default()),
        )
    }

    fn manager() -> OrchestratorManager {
        manager_with(EngineConfig::default(), Arc::new(InMemoryConfigStore::new()))
    }

    fn event(meeting: &str, text: &str) -> TranscriptEvent {
        TranscriptEvent {
            meeting_id: MeetingId::new(meeting),
            speaker_id: None,
            text: text.into(),
            is_final: true,
            timestamp: Some(BASE),
            sequence_number: None,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let m = manager();
        let id = MeetingId::new("m-1");
        let a = m.get_or_create(&id, BASE).await.unwrap();
        let b = m.get_or_create(&id, BASE).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(m.len().await, 1);
        assert_eq!(a.lock().await.grasps().len(), 3);
    }

    #[tokio::test]
    async fn test_message_counts_isolated() {
        let m = manager();
        for i in 0..3 {
            m.process_transcript(&event("a", &format!("a{}", i)), BASE).await.unwrap();
        }
        m.process_transcript(&event("b", "b0"), BASE).await.unwrap();

        let a = m.get(&MeetingId::new("a")).await.unwrap();
        let b = m.get(&MeetingId::new("b")).await.unwrap();
        assert_eq!(a.lock().await.message_count(), 3);
        assert_eq!(b.lock().await.message_count(), 1);
        assert!(!b.lock().await.window().content(None).contains("a0"));
    }

    #[tokio::test]
    async fn test_capacity_evicts_inactive() {
        let config = EngineConfig {
            max_meetings: 3,
            meeting_timeout_ms: HOUR,
            ..EngineConfig::default()
        };
        let m = manager_with(config, Arc::new(InMemoryConfigStore::new()));
        for id in ["m1", "m2", "m3"] {
            m.get_or_create(&MeetingId::new(id), BASE).await.unwrap();
        }

        let later = BASE + 2 * HOUR;
        m.get_or_create(&MeetingId::new("m4"), later).await.unwrap();

        assert!(m.len().await <= 3);
        assert_eq!(m.meeting_ids().await, vec![MeetingId::new("m4")]);
    }

    #[tokio::test]
    async fn test_capacity_is_soft_when_all_active() {
        let config = EngineConfig {
            max_meetings: 1,
            ..EngineConfig::default()
        };
        let m = manager_with(config, Arc::new(InMemoryConfigStore::new()));
        m.get_or_create(&MeetingId::new("a"), BASE).await.unwrap();
        m.get_or_create(&MeetingId::new("b"), BASE + 1).await.unwrap();
        assert_eq!(m.len().await, 2);
    }

    #[tokio::test]
    async fn test_cleanup_uses_strict_timeout() {
        let m = manager();
        m.get_or_create(&MeetingId::new("a"), BASE).await.unwrap();
        let timeout = m.config().meeting_timeout_ms;

        assert_eq!(m.cleanup_inactive_meetings(BASE + timeout).await, 0);
        assert_eq!(m.cleanup_inactive_meetings(BASE + timeout + 1).await, 1);
        assert!(m.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_and_cleanup() {
        let m = manager();
        m.get_or_create(&MeetingId::new("a"), BASE).await.unwrap();
        m.get_or_create(&MeetingId::new("b"), BASE).await.unwrap();

        assert!(m.remove_meeting(&MeetingId::new("a")).await);
        assert!(!m.remove_meeting(&MeetingId::new("a")).await);
        m.cleanup().await;
        assert!(m.is_empty().await);
    }

    #[tokio::test]
    async fn test_assigned_version_missing_propagates() {
        let store = Arc::new(InMemoryConfigStore::new());
        let saved = store.save_config("x", "grasps = []").await.unwrap();
        let id = MeetingId::new("m");
        store.assign(&id, &saved.version_id).await.unwrap();
        store.delete_version(&saved.version_id).await.unwrap();

        let m = manager_with(EngineConfig::default(), store);
        let err = m.process_transcript(&event("m", "hi"), BASE).await.unwrap_err();
        assert!(matches!(err, ResolveError::AssignedVersionMissing { .. }));
        assert!(m.is_empty().await);
    }

    #[tokio::test]
    async fn test_rebuild_meeting_and_all() {
        let m = manager();
        m.get_or_create(&MeetingId::new("a"), BASE).await.unwrap();
        m.get_or_create(&MeetingId::new("b"), BASE).await.unwrap();
        let empty = parse_grasp_group("grasps = []").unwrap();

        assert!(m
            .rebuild_meeting(&MeetingId::new("a"), &empty, ConfigSource::BuiltIn)
            .await);
        assert!(!m
            .rebuild_meeting(&MeetingId::new("zzz"), &empty, ConfigSource::BuiltIn)
            .await);

        let status = m.status().await;
        assert_eq!(status.meeting_count, 2);
        assert_eq!(status.meetings[0].grasp_count, 0);
        assert_eq!(status.meetings[1].grasp_count, 3);

        assert_eq!(m.rebuild_all(&empty, ConfigSource::BuiltIn).await, 2);
        let status = m.status().await;
        assert!(status.meetings.iter().all(|s| s.grasp_count == 0));
    }

    #[tokio::test]
    async fn test_rebuild_of_busy_meeting_is_deferred() {
        let m = manager();
        let id = MeetingId::new("a");
        let handle = m.get_or_create(&id, BASE).await.unwrap();
        let empty = parse_grasp_group("grasps = []").unwrap();

        let guard = handle.lock().await;
        let rebuilt = tokio::time::timeout(
            Duration::from_secs(1),
            m.rebuild_all(&empty, ConfigSource::BuiltIn),
        )
        .await
        .unwrap();
        assert_eq!(rebuilt, 1);
        assert_eq!(guard.grasps().len(), 3);
        drop(guard);

        for _ in 0..50 {
            if handle.lock().await.grasps().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(handle.lock().await.grasps().is_empty());
    }

    #[tokio::test]
    async fn test_process_all_queues_fans_out() {
        let m = manager();
        m.process_transcript(&event("a", "hello"), BASE).await.unwrap();
        m.process_transcript(&event("b", "hello"), BASE).await.unwrap();

        // each meeting ran one Grasp on its event and holds two more
        assert_eq!(m.process_all_queues(BASE + 500).await, 0);
        assert_eq!(m.process_all_queues(BASE + 2_000).await, 2);
    }
}
