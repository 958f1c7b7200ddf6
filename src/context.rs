//! Rolling context carried from slide to slide.
//!
//! After each slide the engine records a short summary (the slide's source
//! text and the first lines of its notes). The next request receives the
//! most recent summaries, newest last, as long as they fit in a character
//! budget. The budget, not the slide count, bounds the prompt so a run of
//! dense slides cannot blow it up.

use std::collections::VecDeque;

const SOURCE_EXCERPT_CHARS: usize = 200;
const SUMMARY_EXCERPT_CHARS: usize = 300;
const SUMMARY_LINES: usize = 5;

/// Bounded FIFO of per-slide summaries for one file.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    entries: VecDeque<String>,
    capacity: usize,
    char_budget: usize,
}

impl ContextWindow {
    pub fn new(capacity: usize, char_budget: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
            char_budget,
        }
    }

    /// Record slide `index`, evicting the oldest entry once over capacity.
    pub fn push(&mut self, index: usize, source_text: &str, notes: &str) {
        let summary: String = notes
            .lines()
            .take(SUMMARY_LINES)
            .collect::<Vec<_>>()
            .join("\n");
        let entry = format!(
            "Slide {index}: {}...\nKey points: {}...",
            truncate_chars(source_text, SOURCE_EXCERPT_CHARS),
            truncate_chars(&summary, SUMMARY_EXCERPT_CHARS),
        );
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Context text for the next request, oldest first.
    ///
    /// Walks back from the newest entry and stops at the first one that
    /// would exceed the budget, so the result is always a contiguous
    /// suffix of the window. Empty when nothing fits.
    pub fn build(&self) -> String {
        let mut used = 0usize;
        let mut kept = Vec::new();
        for entry in self.entries.iter().rev() {
            let len = entry.chars().count();
            if used + len > self.char_budget {
                break;
            }
            used += len;
            kept.push(entry.as_str());
        }
        kept.reverse();
        kept.join("\n\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// First `max` characters of `s`, never splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
