//! Diff highlighting of edited annotations over a record's raw text.
//!
//! Each annotated word is classified against the record's baseline as
//! unchanged, newly added, or removed, then every whole-word,
//! case-insensitive occurrence in the text is wrapped in a
//! `<span class="highlight-...">`. Longer words claim their spans first so
//! a shorter word never splits a longer phrase that contains it.

use log::warn;
use regex::RegexBuilder;
use std::borrow::Cow;

use crate::corpus::Record;
use crate::edits::EditEntry;

/// Diff category of a highlighted word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Highlight {
    /// Booster present in both baseline and edit
    Booster,
    /// Hedge present in both baseline and edit
    Hedge,
    /// Booster added by the edit
    BoosterNew,
    /// Hedge added by the edit
    HedgeNew,
    /// Baseline word of either kind dropped by the edit
    Removed,
}

impl Highlight {
    pub fn css_class(self) -> &'static str {
        match self {
            Highlight::Booster => "highlight-booster",
            Highlight::Hedge => "highlight-hedge",
            Highlight::BoosterNew => "highlight-booster-new",
            Highlight::HedgeNew => "highlight-hedge-new",
            Highlight::Removed => "highlight-removed",
        }
    }
}

/// Baseline vs. current annotation sets split into diff groups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationDiff {
    pub added_boosters: Vec<String>,
    pub added_hedges: Vec<String>,
    pub kept_boosters: Vec<String>,
    pub kept_hedges: Vec<String>,
    pub removed_boosters: Vec<String>,
    pub removed_hedges: Vec<String>,
}

impl AnnotationDiff {
    /// Compare a record's baseline with its edit entry; no entry means nothing changed
    pub fn compute(record: &Record, entry: Option<&EditEntry>) -> Self {
        let baseline_boosters = &record.original_boosters;
        let baseline_hedges = &record.original_hedges;
        let (current_boosters, current_hedges) = match entry {
            Some(entry) => (&entry.edited_boosters, &entry.edited_hedges),
            None => (baseline_boosters, baseline_hedges),
        };

        Self {
            added_boosters: difference(current_boosters, baseline_boosters),
            added_hedges: difference(current_hedges, baseline_hedges),
            kept_boosters: intersection(current_boosters, baseline_boosters),
            kept_hedges: intersection(current_hedges, baseline_hedges),
            removed_boosters: difference(baseline_boosters, current_boosters),
            removed_hedges: difference(baseline_hedges, current_hedges),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.added_boosters.is_empty()
            && self.added_hedges.is_empty()
            && self.removed_boosters.is_empty()
            && self.removed_hedges.is_empty()
    }

    /// Tagged words, longest first; equal lengths keep group order
    pub fn worklist(&self) -> Vec<(&str, Highlight)> {
        let groups = [
            (&self.added_boosters, Highlight::BoosterNew),
            (&self.added_hedges, Highlight::HedgeNew),
            (&self.kept_boosters, Highlight::Booster),
            (&self.kept_hedges, Highlight::Hedge),
            (&self.removed_boosters, Highlight::Removed),
            (&self.removed_hedges, Highlight::Removed),
        ];

        let mut words: Vec<(&str, Highlight)> = groups
            .into_iter()
            .flat_map(|(words, tag)| words.iter().map(move |w| (w.as_str(), tag)))
            .collect();
        // stable: ties stay in group order
        words.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        words
    }
}

fn difference(left: &[String], right: &[String]) -> Vec<String> {
    left.iter().filter(|w| !right.contains(w)).cloned().collect()
}

fn intersection(left: &[String], right: &[String]) -> Vec<String> {
    left.iter().filter(|w| right.contains(w)).cloned().collect()
}

/// A highlighted byte range of the raw text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub highlight: Highlight,
}

impl Span {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end && self.start < end
    }
}

/// Non-overlapping spans over `text`, sorted by position
///
/// Words are processed in worklist order; an occurrence overlapping an
/// already claimed span is skipped.
pub fn match_spans(text: &str, worklist: &[(&str, Highlight)]) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();

    for &(word, highlight) in worklist {
        let word = word.trim();
        if word.is_empty() {
            continue;
        }

        let pattern = format!(r"\b{}\b", regex::escape(word));
        let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                warn!("Skipping highlight for '{}': {}", word, e);
                continue;
            }
        };

        for m in re.find_iter(text) {
            if spans.iter().any(|s| s.overlaps(m.start(), m.end())) {
                continue;
            }
            spans.push(Span {
                start: m.start(),
                end: m.end(),
                highlight,
            });
        }
    }

    spans.sort_by_key(|s| s.start);
    spans
}

/// Escape text for embedding in HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Interleave escaped literal text with tagged spans
pub fn render_spans(text: &str, spans: &[Span]) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * 40);
    let mut pos = 0;
    for span in spans {
        out.push_str(&escape_html(&text[pos..span.start]));
        out.push_str("<span class=\"");
        out.push_str(span.highlight.css_class());
        out.push_str("\">");
        // casing comes from the text, not the annotation
        out.push_str(&escape_html(&text[span.start..span.end]));
        out.push_str("</span>");
        pos = span.end;
    }
    out.push_str(&escape_html(&text[pos..]));
    out
}

/// Highlight `raw_text` with the diff between `record` and `entry`
pub fn render(raw_text: &str, record: &Record, entry: Option<&EditEntry>) -> String {
    let diff = AnnotationDiff::compute(record, entry);
    let spans = match_spans(raw_text, &diff.worklist());
    render_spans(raw_text, &spans)
}

/// Card body: the pre-rendered sentence when unedited, diff highlighting otherwise
pub fn card_text<'a>(record: &'a Record, entry: Option<&EditEntry>) -> Cow<'a, str> {
    match entry {
        None => Cow::Borrowed(&record.sentence),
        Some(entry) => Cow::Owned(render(&record.plain_text, record, Some(entry))),
    }
}
