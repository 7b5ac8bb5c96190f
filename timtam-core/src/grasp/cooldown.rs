//! Minimum-interval gate for a single timer.

/// Tracks whether a timer may fire at a given instant.
///
/// The gate opens once `cooldown_ms` have elapsed since the last recorded
/// execution. A fresh cooldown is open immediately.
#[derive(Debug, Clone)]
pub struct Cooldown {
    cooldown_ms: i64,
    last_executed_ms: i64,
}

impl Cooldown {
    pub fn new(cooldown_ms: i64) -> Self {
        Self {
            cooldown_ms,
            last_executed_ms: 0,
        }
    }

    pub fn should_execute(&self, now_ms: i64) -> bool {
        now_ms - self.last_executed_ms >= self.cooldown_ms
    }

    pub fn mark_executed(&mut self, now_ms: i64) {
        self.last_executed_ms = now_ms;
    }

    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown_ms
    }

    pub fn last_executed_ms(&self) -> i64 {
        self.last_executed_ms
    }
}
