//! Host page abstraction.
//!
//! The engine never reaches into a browser directly. Everything it needs from
//! the page (node identity, attributes, selection, text, form-control values,
//! native change notification, toasts) goes through [`Dom`]. A wasm layer
//! implements it over the real document; [`crate::page::MemoryPage`] implements
//! it in memory for the CLI and the tests.
//!
//! All offsets are counted in chars (Unicode scalar values). Hosts whose native
//! unit differs (UTF-16 in browsers) convert at this boundary.

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use crate::keys::KeyBinding;

/// A position in the document: a node and an offset inside it.
///
/// For text nodes the offset counts chars, for elements it counts children,
/// mirroring DOM range boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary<N> {
    pub node: N,
    pub offset: usize,
}

impl<N> Boundary<N> {
    pub fn new(node: N, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The document selection. `focus` is where the caret sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<N> {
    pub anchor: Boundary<N>,
    pub focus: Boundary<N>,
}

impl<N: Copy> Selection<N> {
    pub fn collapsed(at: Boundary<N>) -> Self {
        Self { anchor: at, focus: at }
    }
}

/// Trait for the page the engine runs in.
pub trait Dom {
    /// Handle to a live node. Equality is node identity.
    type Node: Copy + Eq + Hash + fmt::Debug;

    /// Lowercase tag name, `None` for text nodes.
    fn tag_name(&self, node: Self::Node) -> Option<String>;

    /// Raw attribute value as written in the document.
    fn attribute(&self, node: Self::Node, name: &str) -> Option<String>;

    fn is_text(&self, node: Self::Node) -> bool;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    fn first_child(&self, node: Self::Node) -> Option<Self::Node>;

    /// Whether the node is still part of the document.
    fn is_connected(&self, node: Self::Node) -> bool;

    /// Inclusive ancestry test.
    fn contains(&self, ancestor: Self::Node, node: Self::Node) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// The focused element, if any.
    fn active_element(&self) -> Option<Self::Node>;

    fn selection(&self) -> Option<Selection<Self::Node>>;

    /// Collapses the document selection at `at`.
    fn collapse_selection(&mut self, at: Boundary<Self::Node>);

    /// Number of chars of `root`'s flattened text that precede `boundary`.
    ///
    /// `None` when the boundary is not inside `root`.
    fn text_length_before(&self, root: Self::Node, boundary: Boundary<Self::Node>) -> Option<usize>;

    /// Flattened text of a node and its descendants.
    fn text_content(&self, node: Self::Node) -> String;

    /// Replaces all children of an element with one text node, or the data of a
    /// text node.
    fn set_text_content(&mut self, node: Self::Node, text: &str);

    /// Current value of an input or textarea.
    fn value(&self, control: Self::Node) -> String;

    /// Sets a control's value through the native setter, so frameworks that
    /// shadow `value` still see the change.
    fn set_value(&mut self, control: Self::Node, value: &str);

    /// Selection start of an input or textarea, `None` when the control does not
    /// expose one.
    fn selection_start(&self, control: Self::Node) -> Option<usize>;

    fn set_selection_range(&mut self, control: Self::Node, start: usize, end: usize);

    /// Fires the control's native bubbling `input` event.
    fn dispatch_input(&mut self, control: Self::Node);

    /// Shows a transient notification that removes itself after `ttl`.
    fn show_toast(&mut self, message: &str, ttl: Duration);

    /// Re-runs the default action of a key whose default was prevented while a
    /// lookup was pending and which turned out not to expand.
    fn replay_default(&mut self, target: Self::Node, key: &KeyBinding);
}
