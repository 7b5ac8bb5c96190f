//! Grasp execution engine.
//!
//! A Grasp is one configured judgment unit: a prompt template, a cooldown and
//! an output policy. This module holds the per-meeting building blocks it runs
//! against:
//!
//! - **window**: rolling transcript log
//! - **notebook**: tag-indexed notes written by Grasps
//! - **cooldown**: minimum-interval gate
//! - **template**: placeholder substitution and named strategies
//! - **runtime**: the executable Grasp
//! - **queue**: per-meeting ready-queue behind a global cooldown

mod cooldown;
mod notebook;
mod queue;
mod runtime;
mod template;
mod window;

pub use cooldown::Cooldown;
pub use notebook::{Notebook, format_notes};
pub use queue::GraspQueue;
pub use runtime::{ExecContext, Grasp, GraspOutcome};
pub use template::{
    InputSelector, NO_NOTES_MARKER, NotesSelector, PROMPT_PREAMBLE, ParsedTemplate,
    PromptTemplate, Segment, TemplateStrategy, with_preamble,
};
pub use window::{TranscriptLine, WindowBuffer};
