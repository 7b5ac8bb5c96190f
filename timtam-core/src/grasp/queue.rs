//! Per-meeting ready-queue of Grasps.
//!
//! Many Grasps may become eligible at once. The queue releases at most one of
//! them per global cooldown period, oldest first, and drops entries that have
//! waited too long to still be relevant.

use std::collections::VecDeque;

use tracing::{debug, info};

use super::cooldown::Cooldown;
use super::runtime::{ExecContext, Grasp};
use crate::traits::metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    /// Index of the Grasp in its meeting's live set
    slot: usize,
    /// Event time used for staleness
    enqueued_at_ms: i64,
    /// Original capture time, when the triggering event carried one
    capture_ms: Option<i64>,
}

#[derive(Debug)]
pub struct GraspQueue {
    entries: VecDeque<QueueEntry>,
    cooldown: Cooldown,
    stale_entry_ms: i64,
}

impl GraspQueue {
    pub fn new(global_cooldown_ms: i64, stale_entry_ms: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            cooldown: Cooldown::new(global_cooldown_ms),
            stale_entry_ms,
        }
    }

    /// Queue the Grasp at `slot`. A Grasp already waiting is not queued twice.
    ///
    /// Returns whether a new entry was added.
    pub fn enqueue(
        &mut self,
        slot: usize,
        node_id: &str,
        event_timestamp_ms: i64,
        capture_ms: Option<i64>,
    ) -> bool {
        if self.contains(slot) {
            return false;
        }
        self.entries.push_back(QueueEntry {
            slot,
            enqueued_at_ms: event_timestamp_ms,
            capture_ms,
        });
        debug!(
            node_id = %node_id,
            queue_size = self.entries.len(),
            "grasp.queue.enqueued"
        );
        true
    }

    /// Run the oldest queued Grasp if the global cooldown allows it.
    ///
    /// Returns `true` only when a Grasp was executed. A stale entry is popped
    /// and discarded, and that call returns `false`.
    pub async fn process_next(
        &mut self,
        grasps: &mut [Grasp],
        ctx: &mut ExecContext<'_>,
        now_ms: i64,
    ) -> bool {
        if !self.cooldown.should_execute(now_ms) {
            return false;
        }
        let Some(entry) = self.entries.pop_front() else {
            return false;
        };
        let Some(grasp) = grasps.get_mut(entry.slot) else {
            return false;
        };

        let age_ms = now_ms - entry.enqueued_at_ms;
        if age_ms > self.stale_entry_ms {
            info!(
                meeting_id = %ctx.meeting_id,
                node_id = %grasp.node_id(),
                age_ms,
                "grasp.queue.skipped"
            );
            ctx.metrics.put_count(metric::QUEUE_DROPPED, 1);
            return false;
        }

        debug!(
            meeting_id = %ctx.meeting_id,
            node_id = %grasp.node_id(),
            queue_size = self.entries.len(),
            age_ms,
            "grasp.queue.processing"
        );
        grasp.execute(ctx, entry.capture_ms, now_ms).await;
        self.cooldown.mark_executed(now_ms);
        true
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.entries.iter().any(|e| e.slot == slot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::GraspConfig;
    use crate::grasp::notebook::Notebook;
    use crate::grasp::template::PromptTemplate;
    use crate::grasp::window::WindowBuffer;
    use crate::testing::{RecordingMetrics, RecordingNotifier, ScriptedJudge};
    use crate::types::{MeetingId, OutputHandler};

    const BASE: i64 = 1_705_314_600_000;

    fn grasps(judge: Arc<ScriptedJudge>, ids: &[&str]) -> Vec<Grasp> {
        ids.iter()
            .map(|id| {
                Grasp::new(
                    GraspConfig {
                        node_id: id.to_string(),
                        prompt: PromptTemplate::literal("{{INPUT}}").unwrap(),
                        interval_sec: 10.0,
                        output_handler: OutputHandler::Chat,
                        note_tag: None,
                        input_length: None,
                    },
                    judge.clone(),
                )
            })
            .collect()
    }

    struct Env {
        meeting_id: MeetingId,
        window: WindowBuffer,
        notebook: Notebook,
        notifier: RecordingNotifier,
        metrics: RecordingMetrics,
    }

    impl Env {
        fn new() -> Self {
            let meeting_id = MeetingId::new("m-q");
            Self {
                notebook: Notebook::new(meeting_id.clone()),
                meeting_id,
                window: WindowBuffer::new(),
                notifier: RecordingNotifier::default(),
                metrics: RecordingMetrics::default(),
            }
        }

        fn ctx(&mut self) -> ExecContext<'_> {
            ExecContext {
                meeting_id: &self.meeting_id,
                window: &self.window,
                notebook: &mut self.notebook,
                notifier: &self.notifier,
                metrics: &self.metrics,
            }
        }
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut q = GraspQueue::new(2_000, 60_000);
        assert!(q.enqueue(0, "a", BASE, None));
        assert!(!q.enqueue(0, "a", BASE + 10, None));
        assert!(q.enqueue(1, "b", BASE, None));
        assert_eq!(q.len(), 2);
    }

    #[tokio::test]
    async fn test_fifo_behind_global_cooldown() {
        let judge = Arc::new(ScriptedJudge::intervene("ok"));
        let mut live = grasps(judge.clone(), &["a", "b"]);
        let mut env = Env::new();
        let mut q = GraspQueue::new(2_000, 60_000);
        q.enqueue(1, "b", BASE, None);
        q.enqueue(0, "a", BASE, None);

        assert!(q.process_next(&mut live, &mut env.ctx(), BASE).await);
        assert_eq!(judge.node_ids(), vec!["b"]);

        // global cooldown holds the second entry back
        assert!(!q.process_next(&mut live, &mut env.ctx(), BASE + 1_999).await);
        assert_eq!(q.len(), 1);

        assert!(q.process_next(&mut live, &mut env.ctx(), BASE + 2_000).await);
        assert_eq!(judge.node_ids(), vec!["b", "a"]);
        assert!(q.is_empty());

        assert!(!q.process_next(&mut live, &mut env.ctx(), BASE + 10_000).await);
    }

    #[tokio::test]
    async fn test_stale_entry_dropped_without_execution() {
        let judge = Arc::new(ScriptedJudge::intervene("ok"));
        let mut live = grasps(judge.clone(), &["a"]);
        let mut env = Env::new();
        let mut q = GraspQueue::new(2_000, 60_000);
        q.enqueue(0, "a", BASE, None);

        let executed = q.process_next(&mut live, &mut env.ctx(), BASE + 60_001).await;

        assert!(!executed);
        assert!(q.is_empty());
        assert!(judge.prompts().is_empty());
        assert_eq!(env.metrics.count("Grasp.Queue.Dropped"), 1);
        // dropping does not consume the global cooldown
        q.enqueue(0, "a", BASE + 60_001, None);
        assert!(q.process_next(&mut live, &mut env.ctx(), BASE + 60_002).await);
    }

    #[tokio::test]
    async fn test_entry_at_threshold_still_runs() {
        let judge = Arc::new(ScriptedJudge::intervene("ok"));
        let mut live = grasps(judge.clone(), &["a"]);
        let mut env = Env::new();
        let mut q = GraspQueue::new(2_000, 60_000);
        q.enqueue(0, "a", BASE, None);

        assert!(q.process_next(&mut live, &mut env.ctx(), BASE + 60_000).await);
        assert_eq!(judge.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_queue() {
        let mut q = GraspQueue::new(2_000, 60_000);
        q.enqueue(0, "a", BASE, None);
        q.enqueue(1, "b", BASE, None);
        q.clear();
        assert!(q.is_empty());
        assert!(q.enqueue(0, "a", BASE, None));
    }
}
