//! Ingestion: transcript and control sources, the polling loop with its
//! per-meeting lanes, and the periodic queue ticker.

mod control;
mod source;
mod ticker;
mod worker;

pub use control::{ControlMessage, ControlOutcome, UNNAMED_CONFIG, apply_control};
pub use source::{ChannelQueue, ControlSource, ReceivedMessage, TranscriptSource};
pub use ticker::spawn_ticker;
pub use worker::IngestLoop;
