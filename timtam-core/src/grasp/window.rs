//! Rolling transcript log for one meeting.

use crate::utils::format_clock;

/// One finalized utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub text: String,
    pub timestamp_ms: i64,
}

/// Append-only sequence of utterances, rendered as `[HH:MM:SS] text` lines.
#[derive(Debug, Clone, Default)]
pub struct WindowBuffer {
    lines: Vec<TranscriptLine>,
}

impl WindowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line. Empty text is ignored.
    pub fn push(&mut self, text: impl Into<String>, timestamp_ms: i64) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.lines.push(TranscriptLine { text, timestamp_ms });
    }

    /// Render the last `last_n` lines, or every line when `None`.
    pub fn content(&self, last_n: Option<usize>) -> String {
        let lines = match last_n {
            Some(n) => &self.lines[self.lines.len().saturating_sub(n)..],
            None => &self.lines[..],
        };
        Self::format(lines.iter())
    }

    /// Render lines strictly newer than `now_ms - duration_ms`.
    pub fn content_since(&self, duration_ms: i64, now_ms: i64) -> String {
        let since = now_ms - duration_ms;
        Self::format(self.lines.iter().filter(|l| l.timestamp_ms > since))
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn format<'a>(lines: impl Iterator<Item = &'a TranscriptLine>) -> String {
        lines
            .map(|l| format!("[{}] {}", format_clock(l.timestamp_ms), l.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
