//! Prompt templates.
//!
//! A literal template is parsed once into segments. Two placeholder families
//! are recognised:
//!
//! | Placeholder              | Renders                                  |
//! |--------------------------|------------------------------------------|
//! | `{{INPUT}}`, `{{INPUT:all}}` | the whole transcript window           |
//! | `{{INPUT:latestN}}`      | the last N transcript lines              |
//! | `{{INPUT:pastT}}`        | lines newer than T (`30s`, `5m`, `1h`)   |
//! | `{{NOTES:tag}}`          | the latest note written under `tag`      |
//! | `{{NOTES:tag:latestN}}`  | the last N notes under `tag`             |
//! | `{{NOTES:tag:all}}`      | every note under `tag`                   |
//!
//! Any other `{{...}}` text is kept as-is.

use std::sync::LazyLock;

use regex::Regex;

use super::notebook::{Notebook, format_notes};
use super::window::WindowBuffer;
use crate::error::TemplateError;

/// Rendered in place of a NOTES placeholder whose tag has no notes yet.
pub const NO_NOTES_MARKER: &str = "(no notes yet)";

/// Instruction block placed in front of every rendered prompt.
pub const PROMPT_PREAMBLE: &str = "Based on the instructions below, decide whether the meeting needs an intervention. \
Reply with exactly the following JSON and nothing else:\n\
{\"should_intervene\": true, \"reason\": \"why you decided this\", \"message\": \"the message to post\"}\n\
----------\n\n";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(INPUT|NOTES)(?::([^}]*))?\}\}").expect("placeholder pattern compiles")
});

/// Which part of the transcript window an INPUT placeholder selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSelector {
    All,
    Latest(usize),
    PastMs(i64),
}

/// Which notes a NOTES placeholder selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotesSelector {
    LatestOne,
    Latest(usize),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Input(InputSelector),
    Notes { tag: String, selector: NotesSelector },
}

/// A literal template, split into text and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl ParsedTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in PLACEHOLDER.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > cursor {
                segments.push(Segment::Literal(source[cursor..whole.start()].to_string()));
            }
            let modifier = caps.get(2).map(|m| m.as_str());
            let segment = match &caps[1] {
                "INPUT" => Segment::Input(parse_input_modifier(modifier.unwrap_or(""))?),
                _ => parse_notes_modifier(modifier)?,
            };
            segments.push(segment);
            cursor = whole.end();
        }
        if cursor < source.len() {
            segments.push(Segment::Literal(source[cursor..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Tags referenced through NOTES placeholders, in order of appearance.
    pub fn referenced_tags(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Notes { tag, .. } => Some(tag.as_str()),
            _ => None,
        })
    }

    pub fn render(&self, window: &WindowBuffer, notebook: &Notebook, now_ms: i64) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Input(selector) => out.push_str(&render_input(*selector, window, now_ms)),
                Segment::Notes { tag, selector } => {
                    out.push_str(&render_notes(tag, *selector, notebook))
                }
            }
        }
        out
    }
}

fn parse_input_modifier(modifier: &str) -> Result<InputSelector, TemplateError> {
    let invalid = || TemplateError::InvalidInputModifier(modifier.to_string());
    match modifier {
        "" | "all" => Ok(InputSelector::All),
        m if m.starts_with("latest") => parse_count(&m["latest".len()..])
            .map(InputSelector::Latest)
            .ok_or_else(invalid),
        m if m.starts_with("past") => parse_duration_ms(&m["past".len()..])
            .map(InputSelector::PastMs)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn parse_notes_modifier(modifier: Option<&str>) -> Result<Segment, TemplateError> {
    let modifier = modifier.unwrap_or("");
    let mut parts = modifier.splitn(2, ':');
    let tag = parts.next().unwrap_or("").trim();
    if tag.is_empty() {
        return Err(TemplateError::MissingNotesTag);
    }
    let invalid = || TemplateError::InvalidNotesModifier(modifier.to_string());
    let selector = match parts.next() {
        None => NotesSelector::LatestOne,
        Some("all") => NotesSelector::All,
        Some(count) if count.starts_with("latest") => parse_count(&count["latest".len()..])
            .map(NotesSelector::Latest)
            .ok_or_else(invalid)?,
        Some(_) => return Err(invalid()),
    };
    Ok(Segment::Notes {
        tag: tag.to_string(),
        selector,
    })
}

fn parse_count(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `30s`, `5m`, `2h` to milliseconds.
fn parse_duration_ms(text: &str) -> Option<i64> {
    let unit = text.chars().last()?;
    let value = parse_count(&text[..text.len() - unit.len_utf8()])? as i64;
    let scale = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        _ => return None,
    };
    value.checked_mul(scale)
}

fn render_input(selector: InputSelector, window: &WindowBuffer, now_ms: i64) -> String {
    match selector {
        InputSelector::All => window.content(None),
        InputSelector::Latest(n) => window.content(Some(n)),
        InputSelector::PastMs(ms) => window.content_since(ms, now_ms),
    }
}

fn render_notes(tag: &str, selector: NotesSelector, notebook: &Notebook) -> String {
    let notes = notebook.notes_by_tag(tag);
    let selected = match selector {
        NotesSelector::LatestOne => &notes[notes.len().saturating_sub(1)..],
        NotesSelector::Latest(n) => &notes[notes.len().saturating_sub(n)..],
        NotesSelector::All => &notes[..],
    };
    if selected.is_empty() {
        return NO_NOTES_MARKER.to_string();
    }
    format_notes(selected.iter().copied())
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Built-in prompt builders selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStrategy {
    /// Recent conversation only
    TranscriptDigest,
    /// Every note in the notebook followed by the recent conversation
    NotesDigest,
}

impl TemplateStrategy {
    pub const NAMES: [&'static str; 2] = ["transcript-digest", "notes-digest"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "transcript-digest" => Some(Self::TranscriptDigest),
            "notes-digest" => Some(Self::NotesDigest),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TranscriptDigest => "transcript-digest",
            Self::NotesDigest => "notes-digest",
        }
    }

    pub fn render(&self, input: &str, notebook: &Notebook) -> String {
        match self {
            Self::TranscriptDigest => format!(
                "Recent conversation:\n{}\n\nDecide whether a short, friendly facilitation comment would help.",
                input
            ),
            Self::NotesDigest => {
                let notes = if notebook.is_empty() {
                    NO_NOTES_MARKER.to_string()
                } else {
                    format_notes(notebook.all_notes())
                };
                format!(
                    "Notes so far:\n{}\n\nRecent conversation:\n{}\n\nDecide whether the discussion needs a summary or a nudge.",
                    notes, input
                )
            }
        }
    }
}

/// Either a literal template or a named strategy. Persisted configuration
/// never carries executable logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptTemplate {
    Literal(ParsedTemplate),
    Strategy(TemplateStrategy),
}

impl PromptTemplate {
    pub fn literal(source: &str) -> Result<Self, TemplateError> {
        ParsedTemplate::parse(source).map(Self::Literal)
    }

    /// Render against the meeting state. `input_length` limits the window
    /// handed to strategies; literal templates pick their own slice.
    pub fn render(
        &self,
        window: &WindowBuffer,
        notebook: &Notebook,
        input_length: Option<usize>,
        now_ms: i64,
    ) -> String {
        match self {
            Self::Literal(t) => t.render(window, notebook, now_ms),
            Self::Strategy(s) => s.render(&window.content(input_length), notebook),
        }
    }

    pub fn referenced_tags(&self) -> Vec<&str> {
        match self {
            Self::Literal(t) => t.referenced_tags().collect(),
            Self::Strategy(_) => Vec::new(),
        }
    }

    /// True when the prompt includes the whole notebook regardless of tag.
    pub fn reads_all_notes(&self) -> bool {
        matches!(self, Self::Strategy(TemplateStrategy::NotesDigest))
    }
}

/// Prefix a rendered prompt with the answer-format instructions.
pub fn with_preamble(prompt: &str) -> String {
    format!("{}{}", PROMPT_PREAMBLE, prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MeetingId;

    const BASE: i64 = 1_705_314_600_000;

    fn window(n: i64) -> WindowBuffer {
        let mut w = WindowBuffer::new();
        for i in 0..n {
            w.push(format!("l{}", i + 1), BASE + i * 60_000);
        }
        w
    }

    fn notebook() -> Notebook {
        Notebook::new(MeetingId::new("m"))
    }

    #[test]
    fn test_parse_segments() {
        let t = ParsedTemplate::parse("A {{INPUT:latest5}} B {{NOTES:x}} C").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Literal("A ".into()),
                Segment::Input(InputSelector::Latest(5)),
                Segment::Literal(" B ".into()),
                Segment::Notes {
                    tag: "x".into(),
                    selector: NotesSelector::LatestOne
                },
                Segment::Literal(" C".into()),
            ]
        );
        assert_eq!(t.referenced_tags().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_input_modifiers() {
        let cases = [
            ("{{INPUT}}", InputSelector::All),
            ("{{INPUT:all}}", InputSelector::All),
            ("{{INPUT:latest3}}", InputSelector::Latest(3)),
            ("{{INPUT:past30s}}", InputSelector::PastMs(30_000)),
            ("{{INPUT:past1m}}", InputSelector::PastMs(60_000)),
            ("{{INPUT:past2h}}", InputSelector::PastMs(7_200_000)),
        ];
        for (src, expected) in cases {
            let t = ParsedTemplate::parse(src).unwrap();
            assert_eq!(t.segments(), &[Segment::Input(expected)], "{}", src);
        }
    }

    #[test]
    fn test_invalid_modifiers() {
        for src in [
            "{{INPUT:latest}}",
            "{{INPUT:latestx}}",
            "{{INPUT:past5d}}",
            "{{INPUT:past}}",
            "{{INPUT:recent}}",
        ] {
            assert!(
                matches!(
                    ParsedTemplate::parse(src),
                    Err(TemplateError::InvalidInputModifier(_))
                ),
                "{}",
                src
            );
        }
        assert_eq!(
            ParsedTemplate::parse("{{NOTES}}"),
            Err(TemplateError::MissingNotesTag)
        );
        assert_eq!(
            ParsedTemplate::parse("{{NOTES:}}"),
            Err(TemplateError::MissingNotesTag)
        );
        assert!(matches!(
            ParsedTemplate::parse("{{NOTES:x:first2}}"),
            Err(TemplateError::InvalidNotesModifier(_))
        ));
    }

    #[test]
    fn test_unknown_placeholders_stay_literal() {
        let t = ParsedTemplate::parse("hello {{NAME}} and {{ INPUT }}").unwrap();
        assert_eq!(
            t.render(&window(1), &notebook(), BASE),
            "hello {{NAME}} and {{ INPUT }}"
        );
    }

    #[test]
    fn test_render_input_slices() {
        let w = window(4);
        let now = BASE + 3 * 60_000;

        let t = ParsedTemplate::parse("{{INPUT:latest2}}").unwrap();
        assert_eq!(t.render(&w, &notebook(), now), "[10:32:00] l3\n[10:33:00] l4");

        let t = ParsedTemplate::parse("{{INPUT:past1m}}").unwrap();
        assert_eq!(t.render(&w, &notebook(), now), "[10:33:00] l4");
    }

    #[test]
    fn test_render_notes_latest_and_marker() {
        let t = ParsedTemplate::parse("Notes: {{NOTES:arg}}").unwrap();
        let mut nb = notebook();
        assert_eq!(
            t.render(&WindowBuffer::new(), &nb, BASE),
            "Notes: (no notes yet)"
        );

        nb.add_note("arg", "first", "obs", BASE);
        nb.add_note("arg", "second", "obs", BASE + 1_000);
        assert_eq!(
            t.render(&WindowBuffer::new(), &nb, BASE),
            "Notes: [10:30:01] second"
        );

        let all = ParsedTemplate::parse("{{NOTES:arg:all}}").unwrap();
        assert_eq!(
            all.render(&WindowBuffer::new(), &nb, BASE),
            "[10:30:00] first\n\n[10:30:01] second"
        );

        let latest = ParsedTemplate::parse("{{NOTES:arg:latest5}}").unwrap();
        assert_eq!(
            latest.render(&WindowBuffer::new(), &nb, BASE),
            all.render(&WindowBuffer::new(), &nb, BASE)
        );
    }

    #[test]
    fn test_strategy_uses_input_length() {
        let w = window(3);
        let mut nb = notebook();
        let p = PromptTemplate::Strategy(TemplateStrategy::TranscriptDigest);
        let rendered = p.render(&w, &nb, Some(1), BASE);
        assert!(rendered.contains("l3"));
        assert!(!rendered.contains("l2"));

        nb.add_note("x", "noted", "g", BASE);
        let p = PromptTemplate::Strategy(TemplateStrategy::NotesDigest);
        let rendered = p.render(&w, &nb, None, BASE);
        assert!(rendered.contains("noted"));
        assert!(rendered.contains("l1"));
        assert!(p.referenced_tags().is_empty());
        assert!(p.reads_all_notes());
        assert!(!PromptTemplate::literal("{{NOTES:x}}").unwrap().reads_all_notes());
    }

    #[test]
    fn test_strategy_registry() {
        for name in TemplateStrategy::NAMES {
            assert_eq!(TemplateStrategy::from_name(name).unwrap().name(), name);
        }
        assert!(TemplateStrategy::from_name("eval").is_none());
    }

    #[test]
    fn test_preamble() {
        let p = with_preamble("body");
        assert!(p.starts_with(PROMPT_PREAMBLE));
        assert!(p.ends_with("----------\n\nbody"));
        assert!(p.contains("\"should_intervene\""));
    }
}
