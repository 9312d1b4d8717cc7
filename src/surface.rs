//! Field adapter: plain inputs, textareas and contenteditable regions behind
//! one read/write contract.

use tracing::debug;

use crate::dom::{Boundary, Dom};
use crate::errors::SurfaceError;

/// Input types that accept free text.
const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel", "email"];

/// Autocomplete markers of payment fields.
const CARD_MARKERS: &[&str] = &["cc-", "card"];

/// One editable region of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface<N> {
    PlainField(N),
    TextArea(N),
    RichRegion(N),
}

/// How the caret was located, which decides how a write is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretContext<N> {
    /// Value and selection of a form control.
    Control,
    /// The caret sat in this text node; text and caret are local to it.
    TextNode(N),
    /// Flattened text of the whole region.
    Element,
}

/// Text and caret as read from a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSnapshot<N> {
    pub text: String,
    pub caret: usize,
    pub context: CaretContext<N>,
}

impl<N: Copy + Eq + std::fmt::Debug> Surface<N> {
    /// Tags `node` by its kind. Says nothing about editability.
    pub fn classify<D: Dom<Node = N>>(dom: &D, node: N) -> Option<Self> {
        match dom.tag_name(node)?.as_str() {
            "input" => Some(Surface::PlainField(node)),
            "textarea" => Some(Surface::TextArea(node)),
            _ if is_rich_region(dom, node) => Some(Surface::RichRegion(node)),
            _ => None,
        }
    }

    /// Classifies `node` and keeps it only if it is editable and not excluded.
    pub fn qualify<D: Dom<Node = N>>(dom: &D, node: N) -> Option<Self> {
        if is_excluded(dom, node) || !is_editable(dom, node) {
            return None;
        }
        Self::classify(dom, node)
    }

    pub fn node(&self) -> N {
        match *self {
            Surface::PlainField(n) | Surface::TextArea(n) | Surface::RichRegion(n) => n,
        }
    }

    pub fn is_rich(&self) -> bool {
        matches!(self, Surface::RichRegion(_))
    }

    /// Reads the text and caret the way the surface kind allows.
    pub fn read<D: Dom<Node = N>>(&self, dom: &D) -> Result<FieldSnapshot<N>, SurfaceError> {
        let node = self.node();
        if !dom.is_connected(node) {
            return Err(SurfaceError::Detached);
        }
        match self {
            Surface::PlainField(_) | Surface::TextArea(_) => {
                let text = dom.value(node);
                let caret = dom
                    .selection_start(node)
                    .unwrap_or_else(|| text.chars().count());
                Ok(FieldSnapshot { text, caret, context: CaretContext::Control })
            }
            Surface::RichRegion(_) => {
                let selection = dom.selection().ok_or(SurfaceError::NoCaret)?;
                let focus = selection.focus;
                if !dom.contains(node, focus.node) {
                    return Err(SurfaceError::SelectionOutside);
                }
                if dom.is_text(focus.node) {
                    let text = dom.text_content(focus.node);
                    let caret = focus.offset.min(text.chars().count());
                    return Ok(FieldSnapshot {
                        text,
                        caret,
                        context: CaretContext::TextNode(focus.node),
                    });
                }
                self.read_flattened(dom)
            }
        }
    }

    /// Reads the whole flattened text of the surface, whatever node holds the
    /// caret. Controls read as usual.
    pub fn read_flattened<D: Dom<Node = N>>(&self, dom: &D) -> Result<FieldSnapshot<N>, SurfaceError> {
        let Surface::RichRegion(node) = *self else {
            return self.read(dom);
        };
        if !dom.is_connected(node) {
            return Err(SurfaceError::Detached);
        }
        let text = dom.text_content(node);
        let caret = match dom.selection() {
            Some(selection) => dom
                .text_length_before(node, selection.focus)
                .ok_or(SurfaceError::SelectionOutside)?,
            None => return Err(SurfaceError::NoCaret),
        };
        Ok(FieldSnapshot { text, caret, context: CaretContext::Element })
    }

    /// Rereads with the same reading mode `context` was produced by.
    pub fn reread<D: Dom<Node = N>>(
        &self,
        dom: &D,
        context: CaretContext<N>,
    ) -> Result<FieldSnapshot<N>, SurfaceError> {
        match context {
            CaretContext::Control => self.read(dom),
            CaretContext::Element => self.read_flattened(dom),
            CaretContext::TextNode(text_node) => {
                if !dom.is_connected(text_node) || !dom.contains(self.node(), text_node) {
                    return Err(SurfaceError::Detached);
                }
                let snapshot = self.read(dom)?;
                if snapshot.context != context {
                    return Err(SurfaceError::SelectionOutside);
                }
                Ok(snapshot)
            }
        }
    }

    /// Whether the surface, and the text node a `TextNode` context names, are
    /// still in the document.
    pub fn is_attached<D: Dom<Node = N>>(&self, dom: &D, context: CaretContext<N>) -> bool {
        let node = self.node();
        if !dom.is_connected(node) {
            return false;
        }
        match context {
            CaretContext::TextNode(text_node) => dom.is_connected(text_node) && dom.contains(node, text_node),
            CaretContext::Control | CaretContext::Element => true,
        }
    }

    /// Writes `text` and puts the caret at `caret`.
    ///
    /// With a `TextNode` context `text` is local to that node; a detached node
    /// leaves the page untouched.
    pub fn write<D: Dom<Node = N>>(&self, dom: &mut D, text: &str, caret: usize, context: CaretContext<N>) {
        let node = self.node();
        match (self, context) {
            (Surface::PlainField(_) | Surface::TextArea(_), _) => {
                dom.set_value(node, text);
                let caret = caret.min(text.chars().count());
                dom.set_selection_range(node, caret, caret);
                dom.dispatch_input(node);
            }
            (Surface::RichRegion(_), CaretContext::TextNode(text_node)) => {
                if !dom.is_connected(text_node) {
                    debug!(?node, ?text_node, "text node detached, write skipped");
                    return;
                }
                dom.set_text_content(text_node, text);
                let caret = caret.min(text.chars().count());
                dom.collapse_selection(Boundary::new(text_node, caret));
            }
            (Surface::RichRegion(_), _) => {
                dom.set_text_content(node, text);
                match dom.first_child(node) {
                    Some(child) if dom.is_text(child) => {
                        let len = dom.text_content(child).chars().count();
                        dom.collapse_selection(Boundary::new(child, caret.min(len)));
                    }
                    _ => {
                        debug!(?node, "rich region has no text node after write");
                        dom.collapse_selection(Boundary::new(node, 0));
                    }
                }
            }
        }
    }
}

fn is_rich_region<D: Dom>(dom: &D, node: D::Node) -> bool {
    matches!(
        dom.attribute(node, "contenteditable")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref(),
        Some("" | "true" | "plaintext-only")
    )
}

/// Input `type`, normalized the way the DOM reports it.
fn input_type<D: Dom>(dom: &D, node: D::Node) -> String {
    dom.attribute(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

/// Whether the node is a surface the engine may edit.
pub fn is_editable<D: Dom>(dom: &D, node: D::Node) -> bool {
    let read_only = dom.attribute(node, "readonly").is_some();
    match dom.tag_name(node).as_deref() {
        Some("input") => TEXT_INPUT_TYPES.contains(&input_type(dom, node).as_str()) && !read_only,
        Some("textarea") => !read_only,
        Some(_) => is_rich_region(dom, node),
        None => false,
    }
}

/// Password and payment fields are never read or written.
pub fn is_excluded<D: Dom>(dom: &D, node: D::Node) -> bool {
    let autocomplete = dom
        .attribute(node, "autocomplete")
        .map(|a| a.to_ascii_lowercase())
        .unwrap_or_default();

    if dom.tag_name(node).as_deref() == Some("input") {
        let kind = input_type(dom, node);
        if kind == "password" || (kind == "email" && autocomplete.contains("cc-")) {
            return true;
        }
    }

    CARD_MARKERS.iter().any(|marker| autocomplete.contains(marker))
}
