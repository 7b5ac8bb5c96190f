//! The ingestion loop.
//!
//! Pulls transcript messages in batches, hands each final event to a
//! per-meeting lane and keeps polling. A lane is a bounded channel drained by
//! one task, so a meeting sees its events in arrival order while a slow
//! judgment call in one meeting never holds up another. Control messages are
//! polled once per iteration.
//!
//! The loop never waits on a lane. When a lane's channel is full the event is
//! parked in that lane's backlog and retried on the next poll. Once the
//! backlog is full too, further events for the meeting stay unacknowledged
//! and the transport redelivers them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::control::{ControlMessage, apply_control};
use super::source::{ControlSource, ReceivedMessage, TranscriptSource};
use crate::error::SourceError;
use crate::meeting::OrchestratorManager;
use crate::settings::IngestConfig;
use crate::traits::metric;
use crate::types::{MeetingId, TranscriptEvent};
use crate::utils::now_ms;

struct Pending {
    receipt: String,
    event: TranscriptEvent,
}

/// Receive wait while some lane still has parked events.
const BACKLOG_RETRY: Duration = Duration::from_millis(100);

struct Lane {
    tx: mpsc::Sender<Pending>,
    task: JoinHandle<()>,
    backlog: VecDeque<Pending>,
}

pub struct IngestLoop {
    manager: Arc<OrchestratorManager>,
    transcripts: Arc<dyn TranscriptSource>,
    control: Option<Arc<dyn ControlSource>>,
    config: IngestConfig,
    lanes: HashMap<MeetingId, Lane>,
    polls: u64,
    consecutive_errors: u32,
}

impl IngestLoop {
    pub fn new(
        manager: Arc<OrchestratorManager>,
        transcripts: Arc<dyn TranscriptSource>,
        config: IngestConfig,
    ) -> Self {
        Self {
            manager,
            transcripts,
            control: None,
            config,
            lanes: HashMap::new(),
            polls: 0,
            consecutive_errors: 0,
        }
    }

    pub fn with_control(mut self, control: Arc<dyn ControlSource>) -> Self {
        self.control = Some(control);
        self
    }

    /// Number of meetings with a live lane.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Run until `shutdown` flips to `true` or the transcript source closes,
    /// then let every lane finish its pending events.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.config.batch_size,
            wait_ms = self.config.wait_ms,
            "ingest.loop.started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(_) => self.consecutive_errors = 0,
                Err(SourceError::Closed) => {
                    info!("ingest.source.closed");
                    break;
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    self.manager.metrics().put_count(metric::INGEST_ERRORS, 1);
                    error!(
                        error = %e,
                        consecutive_errors = self.consecutive_errors,
                        "ingest.loop.error"
                    );
                    if let Some(delay) = self.config.backoff(self.consecutive_errors) {
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            consecutive_errors = self.consecutive_errors,
                            "ingest.loop.backoff"
                        );
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }

            self.polls += 1;
            if self.config.cleanup_every_polls > 0
                && self.polls % self.config.cleanup_every_polls == 0
            {
                self.cleanup().await;
            }
        }

        self.drain_lanes().await;
        info!(polls = self.polls, "ingest.loop.stopped");
    }

    /// One iteration: apply pending control messages, then receive and
    /// dispatch one batch. Returns the number of messages received.
    pub async fn poll_once(&mut self) -> Result<usize, SourceError> {
        self.apply_pending_control().await;
        self.flush_backlogs();

        let wait = if self.lanes.values().any(|lane| !lane.backlog.is_empty()) {
            self.config.wait().min(BACKLOG_RETRY)
        } else {
            self.config.wait()
        };
        let batch = self.transcripts.receive(self.config.batch_size, wait).await?;
        let received = batch.len();
        for message in batch {
            self.dispatch(message).await?;
        }
        Ok(received)
    }

    async fn apply_pending_control(&self) {
        let Some(control) = &self.control else {
            return;
        };
        let bodies = match control.poll().await {
            Ok(bodies) => bodies,
            Err(e) => {
                warn!(error = %e, "ingest.control.poll_failed");
                return;
            }
        };
        for body in bodies {
            let message = match ControlMessage::parse(&body) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "ingest.control.invalid");
                    continue;
                }
            };
            match apply_control(&self.manager, message).await {
                Ok(outcome) => debug!(?outcome, "ingest.control.applied"),
                Err(e) => warn!(error = %e, "ingest.control.rejected"),
            }
        }
    }

    async fn dispatch(&mut self, message: ReceivedMessage) -> Result<(), SourceError> {
        let event: TranscriptEvent = match serde_json::from_str(&message.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, receipt = %message.receipt, "ingest.message.invalid");
                self.manager.metrics().put_count(metric::INGEST_ERRORS, 1);
                return self.transcripts.ack(&message.receipt).await;
            }
        };
        if !event.is_final {
            return self.transcripts.ack(&message.receipt).await;
        }

        self.manager.metrics().put_count(metric::INGEST_EVENTS, 1);
        let meeting_id = event.meeting_id.clone();
        let mut pending = Pending {
            receipt: message.receipt,
            event,
        };

        let capacity = self.lane_capacity();
        // a lane whose task has gone away is replaced once
        for _ in 0..2 {
            let lane = self.lane(&meeting_id);
            if !lane.backlog.is_empty() {
                // parked events go first
                if lane.backlog.len() < capacity {
                    lane.backlog.push_back(pending);
                } else {
                    warn!(meeting_id = %meeting_id, receipt = %pending.receipt, "ingest.lane.full");
                }
                return Ok(());
            }
            match lane.tx.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => {
                    lane.backlog.push_back(returned);
                    debug!(meeting_id = %meeting_id, "ingest.lane.parked");
                    return Ok(());
                }
                Err(TrySendError::Closed(returned)) => {
                    warn!(meeting_id = %meeting_id, "ingest.lane.closed");
                    self.lanes.remove(&meeting_id);
                    pending = returned;
                }
            }
        }
        error!(meeting_id = %meeting_id, receipt = %pending.receipt, "ingest.lane.unavailable");
        Ok(())
    }

    /// Move parked events into their lanes while there is room. A lane found
    /// closed is reopened with its backlog intact.
    fn flush_backlogs(&mut self) {
        let mut closed = Vec::new();
        for (meeting_id, lane) in self.lanes.iter_mut() {
            while let Some(pending) = lane.backlog.pop_front() {
                match lane.tx.try_send(pending) {
                    Ok(()) => {}
                    Err(TrySendError::Full(returned)) => {
                        lane.backlog.push_front(returned);
                        break;
                    }
                    Err(TrySendError::Closed(returned)) => {
                        lane.backlog.push_front(returned);
                        closed.push(meeting_id.clone());
                        break;
                    }
                }
            }
        }
        for meeting_id in closed {
            if let Some(old) = self.lanes.remove(&meeting_id) {
                warn!(meeting_id = %meeting_id, parked = old.backlog.len(), "ingest.lane.closed");
                self.lane(&meeting_id).backlog = old.backlog;
            }
        }
    }

    fn lane_capacity(&self) -> usize {
        self.config.lane_capacity.max(1)
    }

    fn lane(&mut self, meeting_id: &MeetingId) -> &mut Lane {
        let capacity = self.lane_capacity();
        let manager = &self.manager;
        let transcripts = &self.transcripts;
        self.lanes.entry(meeting_id.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(capacity);
            let task = tokio::spawn(run_lane(
                meeting_id.clone(),
                manager.clone(),
                transcripts.clone(),
                rx,
            ));
            debug!(meeting_id = %meeting_id, "ingest.lane.opened");
            Lane {
                tx,
                task,
                backlog: VecDeque::new(),
            }
        })
    }

    /// Evict inactive meetings and close the idle lanes of meetings that are
    /// no longer live.
    pub async fn cleanup(&mut self) {
        let removed = self.manager.cleanup_inactive_meetings(now_ms()).await;
        let live = self.manager.meeting_ids().await;

        let before = self.lanes.len();
        self.lanes.retain(|meeting_id, lane| {
            let idle = lane.backlog.is_empty() && lane.tx.capacity() == lane.tx.max_capacity();
            live.contains(meeting_id) || !idle
        });
        let closed = before - self.lanes.len();
        if removed > 0 || closed > 0 {
            info!(removed_meetings = removed, closed_lanes = closed, "ingest.cleanup");
        }
    }

    /// Close every lane and wait for the queued and parked events to be
    /// applied.
    pub async fn drain_lanes(&mut self) {
        let lanes: Vec<Lane> = self.lanes.drain().map(|(_, lane)| lane).collect();
        let count = lanes.len();
        let tasks: Vec<JoinHandle<()>> = lanes
            .into_iter()
            .map(|Lane { tx, task, backlog }| {
                if !backlog.is_empty() {
                    // the sender closes once the backlog is handed over
                    tokio::spawn(async move {
                        for pending in backlog {
                            if tx.send(pending).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                task
            })
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "ingest.lane.panicked");
            }
        }
        debug!(lanes = count, "ingest.lanes.drained");
    }
}

async fn run_lane(
    meeting_id: MeetingId,
    manager: Arc<OrchestratorManager>,
    transcripts: Arc<dyn TranscriptSource>,
    mut rx: mpsc::Receiver<Pending>,
) {
    while let Some(Pending { receipt, event }) = rx.recv().await {
        match manager.process_transcript(&event, now_ms()).await {
            Ok(executed) => {
                debug!(meeting_id = %meeting_id, executed, "ingest.event.processed");
                if let Err(e) = transcripts.ack(&receipt).await {
                    warn!(meeting_id = %meeting_id, error = %e, "ingest.ack.failed");
                }
            }
            Err(e) => {
                // left unacknowledged so the transport redelivers it
                error!(meeting_id = %meeting_id, error = %e, "ingest.event.resolve_failed");
                manager.metrics().put_count(metric::CONFIG_RESOLVE_ERRORS, 1);
            }
        }
    }
    debug!(meeting_id = %meeting_id, "ingest.lane.closed");
}
