//! Utilities
//!
//! Common helpers shared by the engine modules.

mod time;

pub use time::{format_clock, now_ms};
