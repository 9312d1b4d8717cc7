//! Trigger detection at the caret.

use once_cell::sync::Lazy;
use regex::Regex;

/// Character that introduces a trigger in typed text.
pub const TRIGGER_PREFIX: char = '/';

// `/letters` anchored at the caret, with the slash at start of text or after whitespace.
static TRIGGER_AT_CARET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(/([A-Za-z]+))$").expect("trigger pattern is valid"));

static VALID_TRIGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+$").expect("trigger name pattern is valid"));

/// A trigger located directly before the caret.
///
/// `start` is the offset of the prefix slash and `end` the caret, both counted
/// in chars. `token` keeps the case the user typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    pub token: String,
    pub start: usize,
    pub end: usize,
}

impl TriggerMatch {
    /// Store key for this token.
    pub fn key(&self) -> String {
        normalize_trigger(&self.token)
    }

    /// Number of chars the span covers, slash included.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Finds a `/trigger` ending exactly at `caret`.
///
/// The caret is clamped to the text length. Returns `None` for empty text,
/// a caret at 0, or when the chars before the caret are not a slash followed
/// by a maximal run of ASCII letters.
pub fn find_trigger(text: &str, caret: usize) -> Option<TriggerMatch> {
    if text.is_empty() || caret == 0 {
        return None;
    }

    let prefix = char_prefix(text, caret);
    let captures = TRIGGER_AT_CARET.captures(prefix)?;
    let span = captures.get(1)?;
    let token = captures.get(2)?.as_str().to_string();

    let start = prefix[..span.start()].chars().count();
    let end = start + span.as_str().chars().count();
    Some(TriggerMatch { token, start, end })
}

/// True when `name` is usable as a trigger key (letters only, non-empty).
pub fn is_valid_trigger(name: &str) -> bool {
    VALID_TRIGGER.is_match(name)
}

pub fn normalize_trigger(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Slice of `text` holding its first `chars` characters.
pub(crate) fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Replaces the chars in `start..end` with `replacement`.
pub(crate) fn splice_chars(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let head = char_prefix(text, start);
    let tail = &text[char_prefix(text, end).len()..];
    let mut out = String::with_capacity(head.len() + replacement.len() + tail.len());
    out.push_str(head);
    out.push_str(replacement);
    out.push_str(tail);
    out
}
