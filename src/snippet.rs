//! Context-snippet location over noisy document text.

use crate::utils::{NormalizedText, flatten_line_breaks, normalize_locator_target, slice_chars};

/// Context window around the first occurrence of `identifier` in `full_text`.
///
/// The identifier is matched on the offset-preserving normalized form, so
/// "ATCC12345" finds "ATCC 12 345" and "CBS 280.96" keeps its decimal point.
/// The window spans `window` characters before the first matched character
/// and after the last one, clamped to the document. Line breaks become
/// spaces. Returns an empty string when the identifier cannot be located.
pub fn locate_context(full_text: &str, identifier: &str, window: usize) -> String {
    if full_text.is_empty() {
        return String::new();
    }
    let target = normalize_locator_target(identifier);
    let normalized = NormalizedText::build(full_text);
    let Some(match_idx) = normalized.find(&target) else {
        return String::new();
    };
    let Some((first, last)) = normalized.source_span(match_idx, target.len()) else {
        return String::new();
    };
    let start = first.saturating_sub(window);
    let end = last.saturating_add(1).saturating_add(window);
    flatten_line_breaks(slice_chars(full_text, start, end))
}

/// Snippet locator carrying a configured window size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnippetLocator {
    window: usize,
}

impl Default for SnippetLocator {
    fn default() -> Self {
        Self { window: 1000 }
    }
}

impl SnippetLocator {
    /// Locator with a custom window size in characters.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Configured window size.
    pub fn window(&self) -> usize {
        self.window
    }

    /// See [`locate_context`].
    pub fn locate(&self, full_text: &str, identifier: &str) -> String {
        locate_context(full_text, identifier, self.window)
    }
}
