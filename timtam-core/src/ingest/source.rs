//! Transport seams of the ingestion loop, plus in-process queues.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::error::SourceError;

/// One message pulled from a queue, acknowledged by `receipt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub receipt: String,
    pub body: String,
}

/// Long-polling transcript queue.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Wait up to `wait` for at least one message and return at most `max`.
    /// An empty batch after the wait is not an error.
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, SourceError>;

    /// Delete a processed message so it is not delivered again.
    async fn ack(&self, receipt: &str) -> Result<(), SourceError>;
}

/// Low-frequency control channel. Polling never blocks.
#[async_trait]
pub trait ControlSource: Send + Sync {
    async fn poll(&self) -> Result<Vec<String>, SourceError>;
}

/// In-process queue implementing both seams.
///
/// Unacknowledged messages stay in flight until [`ChannelQueue::redeliver`]
/// puts them back at the tail.
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<(String, String)>,
    rx: Mutex<mpsc::UnboundedReceiver<(String, String)>>,
    in_flight: StdMutex<HashMap<String, String>>,
    next_receipt: AtomicU64,
}

impl Default for ChannelQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            in_flight: StdMutex::new(HashMap::new()),
            next_receipt: AtomicU64::new(1),
        }
    }

    /// Enqueue a message body.
    pub fn send(&self, body: impl Into<String>) -> Result<(), SourceError> {
        let receipt = format!("r-{}", self.next_receipt.fetch_add(1, Ordering::Relaxed));
        self.tx
            .send((receipt, body.into()))
            .map_err(|_| SourceError::Closed)
    }

    /// Messages handed out but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Put every unacknowledged message back on the queue.
    pub fn redeliver(&self) -> Result<usize, SourceError> {
        let pending: Vec<(String, String)> = {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| SourceError::Transport("in-flight lock poisoned".into()))?;
            in_flight.drain().collect()
        };
        let count = pending.len();
        for (_, body) in pending {
            self.send(body)?;
        }
        Ok(count)
    }

    fn track(&self, batch: &[ReceivedMessage]) -> Result<(), SourceError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| SourceError::Transport("in-flight lock poisoned".into()))?;
        for msg in batch {
            in_flight.insert(msg.receipt.clone(), msg.body.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl TranscriptSource for ChannelQueue {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, SourceError> {
        let mut rx = self.rx.lock().await;
        let first = match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(item)) => item,
            Ok(None) => return Err(SourceError::Closed),
            Err(_) => return Ok(Vec::new()),
        };
        let mut batch: Vec<(String, String)> = vec![first];
        while batch.len() < max {
            match rx.try_recv() {
                Ok(item) => batch.push(item),
                Err(_) => break,
            }
        }
        drop(rx);

        let batch: Vec<ReceivedMessage> = batch
            .into_iter()
            .map(|(receipt, body)| ReceivedMessage { receipt, body })
            .collect();
        self.track(&batch)?;
        Ok(batch)
    }

    async fn ack(&self, receipt: &str) -> Result<(), SourceError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| SourceError::Transport("in-flight lock poisoned".into()))?;
        in_flight.remove(receipt);
        Ok(())
    }
}

#[async_trait]
impl ControlSource for ChannelQueue {
    async fn poll(&self) -> Result<Vec<String>, SourceError> {
        let mut rx = self.rx.lock().await;
        let mut bodies = Vec::new();
        while let Ok((_, body)) = rx.try_recv() {
            bodies.push(body);
        }
        Ok(bodies)
    }
}
