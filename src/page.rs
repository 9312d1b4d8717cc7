//! In-memory page implementing [`Dom`].
//!
//! Models the parts of a document the engine touches: an element/text tree
//! under a `body` root, attributes, form-control values with their own
//! selection range, one document selection, focus, native `input`
//! notifications and toasts. Used by the CLI `try` command and by the tests.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::dom::{Boundary, Dom, Selection};
use crate::keys::KeyBinding;
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        value: String,
        selection: Option<(usize, usize)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A toast currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
}

pub struct MemoryPage {
    nodes: Vec<NodeData>,
    body: NodeId,
    active: Option<NodeId>,
    selection: Option<Selection<NodeId>>,
    input_events: Vec<NodeId>,
    toasts: Vec<Toast>,
    replayed: Vec<(NodeId, String)>,
}

impl MemoryPage {
    pub fn new() -> Self {
        let body = NodeData {
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attributes: BTreeMap::new(),
                value: String::new(),
                selection: None,
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            active: None,
            selection: None,
            input_events: Vec::new(),
            toasts: Vec::new(),
            replayed: Vec::new(),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { kind, parent: Some(parent), children: Vec::new() });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn element(tag: &str, attributes: &[(&str, &str)], value: &str) -> NodeKind {
        let is_control = matches!(tag, "input" | "textarea");
        let len = value.chars().count();
        NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            value: value.to_string(),
            selection: is_control.then_some((len, len)),
        }
    }

    /// Appends an element to `body`.
    pub fn add_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.add_child_element(self.body, tag, attributes)
    }

    pub fn add_child_element(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.push(parent, Self::element(tag, attributes, ""))
    }

    /// Appends an `<input>` with the given value; its caret starts at the end.
    pub fn add_input(&mut self, attributes: &[(&str, &str)], value: &str) -> NodeId {
        self.push(self.body, Self::element("input", attributes, value))
    }

    pub fn add_textarea(&mut self, attributes: &[(&str, &str)], value: &str) -> NodeId {
        self.push(self.body, Self::element("textarea", attributes, value))
    }

    pub fn add_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeKind::Text(text.to_string()))
    }

    /// Detaches `node` (and its subtree) from the document.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
        if self.active.is_some_and(|a| self.contains(node, a)) {
            self.active = None;
        }
    }

    pub fn focus(&mut self, node: NodeId) {
        self.active = Some(node);
    }

    pub fn blur(&mut self) {
        self.active = None;
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn set_selection(&mut self, selection: Selection<NodeId>) {
        self.selection = Some(selection);
    }

    /// Drops a control's selection range, as some exotic inputs report none.
    pub fn clear_selection_range(&mut self, control: NodeId) {
        if let NodeKind::Element { selection, .. } = &mut self.nodes[control.0].kind {
            *selection = None;
        }
    }

    /// Types `text` into a control at its caret, as a user would.
    ///
    /// Does not fire `input`; the caller dispatches events to the router.
    pub fn type_into(&mut self, control: NodeId, text: &str) {
        let caret = self.selection_start(control).unwrap_or(0);
        let current = self.value(control);
        let updated = crate::matcher::splice_chars(&current, caret, caret, text);
        if let NodeKind::Element { value, selection, .. } = &mut self.nodes[control.0].kind {
            *value = updated;
            let caret = caret + text.chars().count();
            *selection = Some((caret, caret));
        }
    }

    /// Types `text` into a text node at the document caret, or at its end when
    /// the caret is elsewhere.
    pub fn type_into_text(&mut self, text_node: NodeId, text: &str) {
        let current = self.text_content(text_node);
        let caret = match self.selection {
            Some(sel) if sel.focus.node == text_node => sel.focus.offset.min(current.chars().count()),
            _ => current.chars().count(),
        };
        let updated = crate::matcher::splice_chars(&current, caret, caret, text);
        self.nodes[text_node.0].kind = NodeKind::Text(updated);
        self.selection = Some(Selection::collapsed(Boundary::new(
            text_node,
            caret + text.chars().count(),
        )));
    }

    /// Nodes that received a native `input` notification, oldest first.
    pub fn input_events(&self) -> &[NodeId] {
        &self.input_events
    }

    /// Messages of the toasts still on screen.
    pub fn toasts(&self) -> Vec<&str> {
        self.toasts.iter().map(|t| t.message.as_str()).collect()
    }

    /// Removes toasts whose time is up.
    pub fn tick(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires_at > now);
    }

    /// Keys whose default action was replayed, with their target.
    pub fn replayed(&self) -> &[(NodeId, String)] {
        &self.replayed
    }

    fn chars_in(&self, node: NodeId) -> usize {
        self.text_content(node).chars().count()
    }

    fn preorder(&self, node: NodeId, out: &mut Vec<NodeId>) {
        out.push(node);
        for child in &self.nodes[node.0].children {
            self.preorder(*child, out);
        }
    }

    /// Walks `node` in document order adding text lengths until `boundary`.
    fn count_before(&self, node: NodeId, boundary: Boundary<NodeId>, acc: &mut usize) -> bool {
        let data = &self.nodes[node.0];
        if node == boundary.node {
            match &data.kind {
                NodeKind::Text(text) => *acc += boundary.offset.min(text.chars().count()),
                NodeKind::Element { .. } => {
                    let upto = boundary.offset.min(data.children.len());
                    *acc += data.children[..upto].iter().map(|c| self.chars_in(*c)).sum::<usize>();
                }
            }
            return true;
        }
        match &data.kind {
            NodeKind::Text(text) => {
                *acc += text.chars().count();
                false
            }
            NodeKind::Element { .. } => data
                .children
                .iter()
                .any(|child| self.count_before(*child, boundary, acc)),
        }
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom for MemoryPage {
    type Node = NodeId;

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => attributes.get(&name.to_ascii_lowercase()).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    fn is_text(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Text(_))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.first().copied()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.body, node)
    }

    fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    fn selection(&self) -> Option<Selection<NodeId>> {
        self.selection
    }

    fn collapse_selection(&mut self, at: Boundary<NodeId>) {
        self.selection = Some(Selection::collapsed(at));
    }

    fn text_length_before(&self, root: NodeId, boundary: Boundary<NodeId>) -> Option<usize> {
        if !self.contains(root, boundary.node) {
            return None;
        }
        let mut count = 0;
        self.count_before(root, boundary, &mut count);
        Some(count)
    }

    fn text_content(&self, node: NodeId) -> String {
        let data = &self.nodes[node.0];
        match &data.kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element { .. } => data.children.iter().map(|c| self.text_content(*c)).collect(),
        }
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        if self.is_text(node) {
            self.nodes[node.0].kind = NodeKind::Text(text.to_string());
            return;
        }
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            self.add_text(node, text);
        }
    }

    fn value(&self, control: NodeId) -> String {
        match &self.nodes[control.0].kind {
            NodeKind::Element { value, .. } => value.clone(),
            NodeKind::Text(_) => String::new(),
        }
    }

    fn set_value(&mut self, control: NodeId, new_value: &str) {
        if let NodeKind::Element { value, selection, .. } = &mut self.nodes[control.0].kind {
            *value = new_value.to_string();
            let len = new_value.chars().count();
            *selection = Some((len, len));
        }
    }

    fn selection_start(&self, control: NodeId) -> Option<usize> {
        match &self.nodes[control.0].kind {
            NodeKind::Element { selection, .. } => selection.map(|(start, _)| start),
            NodeKind::Text(_) => None,
        }
    }

    fn set_selection_range(&mut self, control: NodeId, start: usize, end: usize) {
        if let NodeKind::Element { value, selection, .. } = &mut self.nodes[control.0].kind {
            let len = value.chars().count();
            *selection = Some((start.min(len), end.min(len)));
        }
    }

    fn dispatch_input(&mut self, control: NodeId) {
        self.input_events.push(control);
    }

    fn show_toast(&mut self, message: &str, ttl: Duration) {
        self.toasts.push(Toast { message: message.to_string(), expires_at: Instant::now() + ttl });
    }

    fn replay_default(&mut self, target: NodeId, key: &KeyBinding) {
        self.replayed.push((target, key.to_string()));
        if !key.key.eq_ignore_ascii_case("Tab") {
            return;
        }
        let mut order = Vec::new();
        self.preorder(self.body, &mut order);
        let page: &MemoryPage = self;
        let next = order
            .iter()
            .skip_while(|n| **n != target)
            .skip(1)
            .find(|n| Surface::qualify(page, **n).is_some())
            .copied();
        debug!(?target, ?next, "replayed tab navigation");
        if let Some(next) = next {
            self.active = Some(next);
        }
    }
}
