//! Recording fakes for the collaborator traits.
//!
//! Used by the unit tests, the integration tests and the server's tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{JudgeError, NotifyError};
use crate::traits::{JudgeClient, MetricsSink, Notifier};
use crate::types::{Decision, JudgeResult, MeetingId};

#[derive(Debug, Clone)]
enum Script {
    Decide(Decision),
    Unparseable(String),
    Fail(String),
}

/// Judgment client that answers every call the same way and remembers what
/// it was asked.
#[derive(Debug)]
pub struct ScriptedJudge {
    script: Script,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedJudge {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn intervene(message: &str) -> Self {
        Self::with_script(Script::Decide(Decision {
            should_intervene: true,
            reason: "scripted".into(),
            message: message.into(),
        }))
    }

    pub fn decline() -> Self {
        Self::with_script(Script::Decide(Decision {
            should_intervene: false,
            reason: "scripted".into(),
            message: String::new(),
        }))
    }

    pub fn no_decision(raw: &str) -> Self {
        Self::with_script(Script::Unparseable(raw.into()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_script(Script::Fail(message.into()))
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(_, n)| n.clone()).collect())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl JudgeClient for ScriptedJudge {
    async fn invoke(&self, prompt: &str, node_id: &str) -> Result<JudgeResult, JudgeError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((prompt.to_string(), node_id.to_string()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Decide(decision) => Ok(JudgeResult {
                decision: Some(decision.clone()),
                prompt: prompt.to_string(),
                raw_response: serde_json::to_string(decision).unwrap_or_default(),
            }),
            Script::Unparseable(raw) => Ok(JudgeResult {
                decision: None,
                prompt: prompt.to_string(),
                raw_response: raw.clone(),
            }),
            Script::Fail(message) => Err(JudgeError::Transport(message.clone())),
        }
    }
}

/// One recorded audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub meeting_id: String,
    pub prompt: String,
    pub raw_response: String,
    pub node_id: String,
}

/// Notifier that records every call, optionally failing all of them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    chats: Mutex<Vec<(String, String)>>,
    logs: Mutex<Vec<LogEntry>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// `(meeting_id, message)` pairs in posting order.
    pub fn chats(&self) -> Vec<(String, String)> {
        self.chats.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn chats_for(&self, meeting_id: &str) -> Vec<String> {
        self.chats()
            .into_iter()
            .filter(|(m, _)| m == meeting_id)
            .map(|(_, msg)| msg)
            .collect()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("recording notifier set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_chat(&self, meeting_id: &MeetingId, message: &str) -> Result<(), NotifyError> {
        self.check()?;
        if let Ok(mut chats) = self.chats.lock() {
            chats.push((meeting_id.to_string(), message.to_string()));
        }
        Ok(())
    }

    async fn post_log_entry(
        &self,
        meeting_id: &MeetingId,
        prompt: &str,
        raw_response: &str,
        node_id: &str,
    ) -> Result<(), NotifyError> {
        self.check()?;
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(LogEntry {
                meeting_id: meeting_id.to_string(),
                prompt: prompt.to_string(),
                raw_response: raw_response.to_string(),
                node_id: node_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Metrics sink that keeps every data point.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    latencies: Mutex<HashMap<String, Vec<f64>>>,
    counts: Mutex<HashMap<String, u64>>,
}

impl RecordingMetrics {
    pub fn latencies(&self, name: &str) -> Vec<f64> {
        self.latencies
            .lock()
            .ok()
            .and_then(|l| l.get(name).cloned())
            .unwrap_or_default()
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts
            .lock()
            .ok()
            .and_then(|c| c.get(name).copied())
            .unwrap_or(0)
    }
}

impl MetricsSink for RecordingMetrics {
    fn put_latency(&self, name: &str, ms: f64) {
        if let Ok(mut l) = self.latencies.lock() {
            l.entry(name.to_string()).or_default().push(ms);
        }
    }

    fn put_count(&self, name: &str, value: u64) {
        if let Ok(mut c) = self.counts.lock() {
            *c.entry(name.to_string()).or_default() += value;
        }
    }
}
