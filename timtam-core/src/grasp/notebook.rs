//! Tag-indexed notes written by Grasps for one meeting.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{MeetingId, Note};
use crate::utils::format_clock;

/// Append-only note store. Notes are grouped by tag and kept in write order.
#[derive(Debug, Clone)]
pub struct Notebook {
    meeting_id: MeetingId,
    notes: Vec<Note>,
    by_tag: HashMap<String, Vec<usize>>,
}

impl Notebook {
    pub fn new(meeting_id: MeetingId) -> Self {
        Self {
            meeting_id,
            notes: Vec::new(),
            by_tag: HashMap::new(),
        }
    }

    pub fn add_note(
        &mut self,
        tag: impl Into<String>,
        content: impl Into<String>,
        created_by: impl Into<String>,
        now_ms: i64,
    ) {
        let note = Note {
            tag: tag.into(),
            content: content.into(),
            timestamp_ms: now_ms,
            created_by: created_by.into(),
        };
        debug!(
            meeting_id = %self.meeting_id,
            tag = %note.tag,
            created_by = %note.created_by,
            content_length = note.content.len(),
            total_notes = self.notes.len() + 1,
            "notebook.note.added"
        );
        self.by_tag
            .entry(note.tag.clone())
            .or_default()
            .push(self.notes.len());
        self.notes.push(note);
    }

    /// Notes for `tag`, oldest first.
    pub fn notes_by_tag(&self, tag: &str) -> Vec<&Note> {
        self.by_tag
            .get(tag)
            .map(|idx| idx.iter().map(|&i| &self.notes[i]).collect())
            .unwrap_or_default()
    }

    pub fn latest_note(&self, tag: &str) -> Option<&Note> {
        self.by_tag
            .get(tag)
            .and_then(|idx| idx.last())
            .map(|&i| &self.notes[i])
    }

    pub fn all_notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn meeting_id(&self) -> &MeetingId {
        &self.meeting_id
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Render notes as `[HH:MM:SS] content` blocks separated by a blank line.
pub fn format_notes<'a>(notes: impl IntoIterator<Item = &'a Note>) -> String {
    notes
        .into_iter()
        .map(|n| format!("[{}] {}", format_clock(n.timestamp_ms), n.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: i64 = 1_705_314_600_000;

    fn notebook() -> Notebook {
        Notebook::new(MeetingId::new("m-1"))
    }

    #[test]
    fn test_latest_note_by_tag() {
        let mut nb = notebook();
        assert!(nb.latest_note("argument-notes").is_none());

        nb.add_note("argument-notes", "first", "observer", BASE);
        nb.add_note("mood", "calm", "mood-reader", BASE + 1);
        nb.add_note("argument-notes", "second", "observer", BASE + 2);

        let latest = nb.latest_note("argument-notes").unwrap();
        assert_eq!(latest.content, "second");
        assert_eq!(latest.created_by, "observer");
        assert_eq!(nb.latest_note("mood").unwrap().content, "calm");
    }

    #[test]
    fn test_notes_by_tag_in_write_order() {
        let mut nb = notebook();
        nb.add_note("t", "a", "g", BASE);
        nb.add_note("u", "x", "g", BASE);
        nb.add_note("t", "b", "g", BASE);

        let contents: Vec<_> = nb.notes_by_tag("t").iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert!(nb.notes_by_tag("missing").is_empty());
        assert_eq!(nb.len(), 3);
        assert_eq!(nb.all_notes()[1].tag, "u");
    }

    #[test]
    fn test_format_notes() {
        let mut nb = notebook();
        nb.add_note("t", "alpha", "g", BASE);
        nb.add_note("t", "beta", "g", BASE + 65_000);
        assert_eq!(
            format_notes(nb.notes_by_tag("t")),
            "[10:30:00] alpha\n\n[10:31:05] beta"
        );
        assert_eq!(format_notes(Vec::<&Note>::new()), "");
    }
}
