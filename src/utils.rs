//! Text normalization helpers shared by the extractor, classifier, and locator.

/// Reduce text to its claim-matching form.
///
/// Upper-cases, then drops every character that is not an ASCII uppercase
/// letter, ASCII digit, or period. Idempotent; never reorders or rewrites the
/// surviving letters and digits.
pub fn normalize_compact<T: AsRef<str>>(text: T) -> String {
    text.as_ref()
        .to_uppercase()
        .chars()
        .filter(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || *ch == '.')
        .collect()
}

/// Normalized character sequence with a co-indexed table of source offsets.
///
/// `chars[i]` came from character position `offsets[i]` of the source text
/// (character positions, not byte offsets). Multi-character upper-case
/// expansions share the offset of the character they came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedText {
    chars: Vec<char>,
    offsets: Vec<usize>,
}

impl NormalizedText {
    /// Build the normalized view in one left-to-right pass.
    pub fn build(text: &str) -> Self {
        let mut normalized = Self::default();
        for (idx, ch) in text.chars().enumerate() {
            if !is_locator_char(ch) {
                continue;
            }
            for upper in ch.to_uppercase() {
                normalized.chars.push(upper);
                normalized.offsets.push(idx);
            }
        }
        normalized
    }

    /// Normalized characters.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Source offsets, co-indexed with `chars`.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Normalized sequence as a string.
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    /// Length of the normalized sequence.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// True when nothing survived normalization.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// First occurrence of `needle`, as an index into the normalized sequence.
    pub fn find(&self, needle: &[char]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.chars.len() {
            return None;
        }
        self.chars
            .windows(needle.len())
            .position(|window| window == needle)
    }

    /// Map a normalized index range `[start, start + len)` back to the source
    /// character span `(first, last)`, both inclusive.
    ///
    /// Returns `None` when either end falls outside the offset table.
    pub fn source_span(&self, start: usize, len: usize) -> Option<(usize, usize)> {
        let last = start.checked_add(len)?.checked_sub(1)?;
        let first = *self.offsets.get(start)?;
        let last = *self.offsets.get(last)?;
        Some((first, last))
    }
}

/// Characters kept by the offset-preserving normalizer.
pub fn is_locator_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '.'
}

/// Normalize an identifier the same way `NormalizedText::build` normalizes documents.
pub fn normalize_locator_target(identifier: &str) -> Vec<char> {
    NormalizedText::build(identifier).chars
}

/// Replace every newline and carriage return with a single space and trim.
pub fn flatten_line_breaks<T: AsRef<str>>(text: T) -> String {
    text.as_ref()
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Keep at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Slice `text` by character positions `[start, end)`, clamped to its length.
pub fn slice_chars(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |pos: usize| {
        text.char_indices()
            .nth(pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(text.len())
    };
    let start_byte = byte_at(start);
    let end_byte = byte_at(end.max(start));
    &text[start_byte..end_byte]
}

/// Upper-case the first letter of every word and lower-case the rest.
///
/// A word starts at any letter that does not follow another letter.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
