//! Trailing-text approximation for contenteditable regions whose live
//! text/caret introspection cannot be trusted.

use std::collections::VecDeque;

pub const MAX_BUFFER_LENGTH: usize = 200;

/// `InputEvent.inputType` values the buffer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    InsertText,
    InsertParagraph,
    InsertLineBreak,
    DeleteContentBackward,
    Other(String),
}

impl InputKind {
    pub fn from_dom(input_type: &str) -> Self {
        match input_type {
            "insertText" => InputKind::InsertText,
            "insertParagraph" => InputKind::InsertParagraph,
            "insertLineBreak" => InputKind::InsertLineBreak,
            "deleteContentBackward" => InputKind::DeleteContentBackward,
            other => InputKind::Other(other.to_string()),
        }
    }
}

/// What an input event did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUpdate {
    Appended,
    Deleted,
    /// The event could not be applied incrementally; the caller must resync.
    NeedsResync,
}

/// Last characters typed into the tracked region, oldest first.
#[derive(Debug, Clone)]
pub struct RecentTextBuffer<N> {
    region: Option<N>,
    text: VecDeque<char>,
    capacity: usize,
}

impl<N: Copy + Eq> RecentTextBuffer<N> {
    pub fn new(capacity: usize) -> Self {
        Self {
            region: None,
            text: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn region(&self) -> Option<N> {
        self.region
    }

    pub fn tracks(&self, region: N) -> bool {
        self.region == Some(region)
    }

    /// Empties the buffer and points it at `region`.
    pub fn retarget(&mut self, region: Option<N>) {
        self.region = region;
        self.text.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn push(&mut self, c: char) {
        self.text.push_back(c);
        while self.text.len() > self.capacity {
            self.text.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<char> {
        self.text.pop_back()
    }

    /// Applies one input event incrementally.
    pub fn apply(&mut self, kind: &InputKind, data: Option<&str>) -> BufferUpdate {
        match kind {
            InputKind::InsertText => {
                let mut chars = data.unwrap_or_default().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        self.push(c);
                        BufferUpdate::Appended
                    }
                    _ => BufferUpdate::NeedsResync,
                }
            }
            InputKind::InsertParagraph | InputKind::InsertLineBreak => {
                self.push('\n');
                BufferUpdate::Appended
            }
            InputKind::DeleteContentBackward => {
                self.pop();
                BufferUpdate::Deleted
            }
            InputKind::Other(_) => BufferUpdate::NeedsResync,
        }
    }

    /// Replaces the contents with the tail of `text`.
    pub fn resync(&mut self, text: &str) {
        self.text.clear();
        let total = text.chars().count();
        let skip = total.saturating_sub(self.capacity);
        self.text.extend(text.chars().skip(skip));
    }
}

impl<N: Copy + Eq> Default for RecentTextBuffer<N> {
    fn default() -> Self {
        Self::new(MAX_BUFFER_LENGTH)
    }
}
