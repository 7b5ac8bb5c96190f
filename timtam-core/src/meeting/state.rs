//! State of one live meeting.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ConfigSource;
use crate::grasp::{ExecContext, Grasp, GraspQueue, Notebook, WindowBuffer};
use crate::settings::EngineConfig;
use crate::traits::{MetricsSink, Notifier};
use crate::types::{MeetingId, TranscriptEvent};

/// Point-in-time view of a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingStatus {
    pub meeting_id: MeetingId,
    pub last_activity_ms: i64,
    pub message_count: u64,
    pub grasp_count: usize,
    pub grasp_ids: Vec<String>,
    pub queue_size: usize,
    pub note_count: usize,
    pub config_source: ConfigSource,
}

/// Owns one meeting's transcript window, notebook, queue and live Grasps.
pub struct MeetingState {
    meeting_id: MeetingId,
    window: WindowBuffer,
    notebook: Notebook,
    queue: GraspQueue,
    grasps: Vec<Grasp>,
    config_source: ConfigSource,
    last_activity_ms: i64,
    message_count: u64,
    config_generation: u64,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn MetricsSink>,
}

impl MeetingState {
    pub fn new(
        meeting_id: MeetingId,
        grasps: Vec<Grasp>,
        config_source: ConfigSource,
        config: &EngineConfig,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<dyn MetricsSink>,
        now_ms: i64,
    ) -> Self {
        Self {
            notebook: Notebook::new(meeting_id.clone()),
            meeting_id,
            window: WindowBuffer::new(),
            queue: GraspQueue::new(config.global_cooldown_ms, config.stale_entry_ms),
            grasps,
            config_source,
            last_activity_ms: now_ms,
            message_count: 0,
            config_generation: 0,
            notifier,
            metrics,
        }
    }

    /// Apply a final transcript event, queue every Grasp whose cooldown has
    /// elapsed, and run at most one of them.
    ///
    /// Returns whether a Grasp was executed. Non-final events are ignored.
    pub async fn on_transcript(&mut self, event: &TranscriptEvent, now_ms: i64) -> bool {
        if !event.is_final {
            return false;
        }
        let capture_ms = event.timestamp.filter(|ts| *ts > 0);
        let event_ms = capture_ms.unwrap_or(now_ms);

        self.window.push(event.display_text(), event_ms);
        self.message_count += 1;
        self.last_activity_ms = now_ms;

        for (slot, grasp) in self.grasps.iter().enumerate() {
            if grasp.should_execute(now_ms) {
                self.queue
                    .enqueue(slot, grasp.node_id(), event_ms, capture_ms);
            }
        }
        debug!(
            meeting_id = %self.meeting_id,
            message_count = self.message_count,
            queue_size = self.queue.len(),
            "meeting.transcript.applied"
        );

        self.process_next(now_ms).await
    }

    /// Periodic path: run a queued Grasp even when nobody is speaking.
    pub async fn process_queue(&mut self, now_ms: i64) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.process_next(now_ms).await
    }

    async fn process_next(&mut self, now_ms: i64) -> bool {
        let mut ctx = ExecContext {
            meeting_id: &self.meeting_id,
            window: &self.window,
            notebook: &mut self.notebook,
            notifier: self.notifier.as_ref(),
            metrics: self.metrics.as_ref(),
        };
        self.queue
            .process_next(&mut self.grasps, &mut ctx, now_ms)
            .await
    }

    /// Replace the live Grasp set. Pending queue entries refer to the old set
    /// and are discarded.
    pub fn rebuild_grasps(&mut self, grasps: Vec<Grasp>, config_source: ConfigSource) {
        self.queue.clear();
        self.grasps = grasps;
        self.config_source = config_source;
        info!(
            meeting_id = %self.meeting_id,
            grasp_count = self.grasps.len(),
            "meeting.grasps.rebuilt"
        );
    }

    /// Rebuild unless a newer generation has already been applied. Deferred
    /// rebuilds can reach the lock out of order.
    pub fn apply_rebuild(&mut self, grasps: Vec<Grasp>, config_source: ConfigSource, generation: u64) {
        if generation <= self.config_generation {
            debug!(
                meeting_id = %self.meeting_id,
                generation,
                applied = self.config_generation,
                "meeting.rebuild.superseded"
            );
            return;
        }
        self.config_generation = generation;
        self.rebuild_grasps(grasps, config_source);
    }

    pub fn meeting_id(&self) -> &MeetingId {
        &self.meeting_id
    }

    pub fn last_activity_ms(&self) -> i64 {
        self.last_activity_ms
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn grasps(&self) -> &[Grasp] {
        &self.grasps
    }

    pub fn window(&self) -> &WindowBuffer {
        &self.window
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn config_source(&self) -> &ConfigSource {
        &self.config_source
    }

    pub fn status(&self) -> MeetingStatus {
        MeetingStatus {
            meeting_id: self.meeting_id.clone(),
            last_activity_ms: self.last_activity_ms,
            message_count: self.message_count,
            grasp_count: self.grasps.len(),
            grasp_ids: self.grasps.iter().map(|g| g.node_id().to_string()).collect(),
            queue_size: self.queue.len(),
            note_count: self.notebook.len(),
            config_source: self.config_source.clone(),
        }
    }
}
