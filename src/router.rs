//! Event router: owns the per-page session and turns capture-phase key,
//! input, selection and focus events into engine calls.

use std::collections::HashSet;

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::buffer::{BufferUpdate, InputKind, RecentTextBuffer};
use crate::config::Settings;
use crate::dom::Dom;
use crate::engine::{ExpansionEngine, ExpansionOutcome, PendingExpansion, ResolvedExpansion};
use crate::keys::KeyModifiers;
use crate::matcher::{char_prefix, normalize_trigger};
use crate::store::{SnippetStore, Snippets};
use crate::surface::{is_excluded, Surface};

/// A `keydown` seen in the capture phase.
#[derive(Debug, Clone)]
pub struct KeyEvent<N> {
    /// `KeyboardEvent.key`.
    pub key: String,
    pub modifiers: KeyModifiers,
    pub target: Option<N>,
    /// Dispatch path, innermost node first.
    pub path: Vec<N>,
    default_prevented: bool,
}

impl<N> KeyEvent<N> {
    pub fn new(key: impl Into<String>, modifiers: KeyModifiers, target: Option<N>) -> Self {
        Self { key: key.into(), modifiers, target, path: Vec::new(), default_prevented: false }
    }

    pub fn with_path(mut self, path: Vec<N>) -> Self {
        self.path = path;
        self
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// An `input` event seen in the capture phase.
#[derive(Debug, Clone)]
pub struct InputEvent<N> {
    pub target: N,
    pub kind: InputKind,
    pub data: Option<String>,
}

impl<N> InputEvent<N> {
    pub fn new(target: N, input_type: &str, data: Option<&str>) -> Self {
        Self { target, kind: InputKind::from_dom(input_type), data: data.map(str::to_string) }
    }

    pub fn insert_text(target: N, data: &str) -> Self {
        Self::new(target, "insertText", Some(data))
    }
}

/// What a key press turned into.
#[derive(Debug)]
pub enum KeyOutcome<N> {
    Ignored,
    /// A known trigger sits at the caret; its default was prevented and the
    /// lookup is up to the caller.
    Expand(PendingExpansion<N>),
    Undone,
}

/// Result of [`EventRouter::handle_key_down`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyHandled {
    Ignored,
    Expansion(ExpansionOutcome),
    Undone,
}

/// In-memory state of one page: undo snapshot, recent text, trigger cache.
///
/// Created when the page loads and reset by [`EventRouter::teardown`]; never
/// persisted.
pub struct Session<N> {
    engine: ExpansionEngine<N>,
    buffer: RecentTextBuffer<N>,
    triggers: Option<HashSet<String>>,
    changes: Option<Receiver<Snippets>>,
}

impl<N: Copy + Eq + std::fmt::Debug> Session<N> {
    pub fn new(settings: &Settings) -> Self {
        Self {
            engine: ExpansionEngine::new(settings),
            buffer: RecentTextBuffer::new(settings.buffer_capacity),
            triggers: None,
            changes: None,
        }
    }

    pub fn engine(&self) -> &ExpansionEngine<N> {
        &self.engine
    }

    pub fn buffer(&self) -> &RecentTextBuffer<N> {
        &self.buffer
    }

    /// Cached trigger keys, `None` until the first load.
    pub fn triggers(&self) -> Option<&HashSet<String>> {
        self.triggers.as_ref()
    }

    fn set_triggers(&mut self, snippets: &Snippets) {
        self.triggers = Some(snippets.keys().cloned().collect());
        debug!(count = snippets.len(), "trigger cache refreshed");
    }
}

pub struct EventRouter<N> {
    settings: Settings,
    session: Session<N>,
}

impl<N: Copy + Eq + std::fmt::Debug> EventRouter<N> {
    pub fn new(settings: Settings) -> Self {
        let session = Session::new(&settings);
        Self { settings, session }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &Session<N> {
        &self.session
    }

    /// Subscribes to store changes and fills the trigger cache.
    pub async fn load<S: SnippetStore>(&mut self, store: &S) {
        self.session.changes = Some(store.subscribe());
        self.refresh_cache(store).await;
    }

    pub async fn refresh_cache<S: SnippetStore>(&mut self, store: &S) {
        match store.read_all().await {
            Ok(snippets) => self.session.set_triggers(&snippets),
            Err(e) => warn!("Failed to load triggers, expansions will query the store: {}", e),
        }
    }

    /// Drops all page state, as on navigation.
    pub fn teardown(&mut self) {
        self.session = Session::new(&self.settings);
        info!("session torn down");
    }

    fn drain_changes(&mut self) {
        let latest = self.session.changes.as_ref().and_then(|rx| rx.try_iter().last());
        if let Some(snippets) = latest {
            self.session.set_triggers(&snippets);
        }
    }

    /// Whether a lookup for `token` is worth blocking the key for.
    pub fn is_known_trigger(&self, token: &str) -> bool {
        match &self.session.triggers {
            Some(triggers) => triggers.contains(&normalize_trigger(token)),
            None => true,
        }
    }

    /// Surface a key press applies to, in order: the focused field, the field
    /// holding the selection anchor, the nearest rich region on the dispatch
    /// path, the event target.
    ///
    /// A focused or targeted password/payment field ends the search.
    pub fn resolve_target<D: Dom<Node = N>>(&self, dom: &D, event: &KeyEvent<N>) -> Option<Surface<N>> {
        let active = dom.active_element();
        if active.is_some_and(|n| is_excluded(dom, n)) || event.target.is_some_and(|n| is_excluded(dom, n)) {
            return None;
        }

        active
            .and_then(|node| Surface::qualify(dom, node))
            .or_else(|| {
                let anchor = dom.selection()?.anchor.node;
                nearest_surface(dom, ancestors(dom, anchor))
            })
            .or_else(|| nearest_surface(dom, event.path.iter().copied()).filter(Surface::is_rich))
            .or_else(|| event.target.and_then(|node| Surface::qualify(dom, node)))
    }

    /// Synchronous part of key handling.
    ///
    /// For the expansion key with a known trigger at the caret this prevents
    /// the key's default and returns the pending expansion; the caller resolves
    /// it and hands the result to [`EventRouter::complete`]. The undo key is
    /// handled completely here.
    pub fn on_key_down<D: Dom<Node = N>>(&mut self, dom: &mut D, event: &mut KeyEvent<N>) -> KeyOutcome<N> {
        self.drain_changes();

        if self.settings.expansion_key.matches(&event.key, event.modifiers) {
            let Some(surface) = self.resolve_target(dom, event) else {
                return KeyOutcome::Ignored;
            };
            let recent = (surface.is_rich() && self.session.buffer.tracks(surface.node()))
                .then(|| self.session.buffer.text());
            let Some(pending) = self.session.engine.begin(dom, surface, recent.as_deref()) else {
                return KeyOutcome::Ignored;
            };
            if !self.is_known_trigger(&pending.span().token) {
                debug!(trigger = %pending.span().token, "not a saved trigger, leaving key alone");
                return KeyOutcome::Ignored;
            }
            event.prevent_default();
            return KeyOutcome::Expand(pending);
        }

        if self.settings.undo_key.matches(&event.key, event.modifiers) {
            let Some(surface) = self.resolve_target(dom, event) else {
                return KeyOutcome::Ignored;
            };
            if self.session.engine.undo(dom, surface) {
                event.prevent_default();
                self.resync_if_tracked(dom, surface);
                return KeyOutcome::Undone;
            }
        }

        KeyOutcome::Ignored
    }

    /// Applies a resolved expansion. On a miss the blocked key's default action
    /// is replayed.
    pub fn complete<D: Dom<Node = N>>(&mut self, dom: &mut D, resolved: ResolvedExpansion<N>) -> ExpansionOutcome {
        let surface = resolved.pending().surface();
        let outcome = self.session.engine.apply(dom, resolved);
        if outcome.is_applied() {
            self.resync_if_tracked(dom, surface);
        } else if outcome.restores_default() {
            dom.replay_default(surface.node(), &self.settings.expansion_key);
        }
        outcome
    }

    /// Key handling start to finish, awaiting the lookup in between.
    pub async fn handle_key_down<D, S>(&mut self, dom: &mut D, store: &S, event: &mut KeyEvent<N>) -> KeyHandled
    where
        D: Dom<Node = N>,
        S: SnippetStore,
    {
        match self.on_key_down(dom, event) {
            KeyOutcome::Ignored => KeyHandled::Ignored,
            KeyOutcome::Undone => KeyHandled::Undone,
            KeyOutcome::Expand(pending) => {
                let resolved = pending.resolve(store).await;
                KeyHandled::Expansion(self.complete(dom, resolved))
            }
        }
    }

    /// Keeps the recent-text buffer in step with typing in rich regions.
    pub fn on_input<D: Dom<Node = N>>(&mut self, dom: &D, event: &InputEvent<N>) {
        self.drain_changes();
        let Some(region) = rich_region_for(dom, event.target) else {
            return;
        };
        if !self.session.buffer.tracks(region) {
            self.session.buffer.retarget(Some(region));
            self.resync(dom, region);
            return;
        }
        if self.session.buffer.apply(&event.kind, event.data.as_deref()) == BufferUpdate::NeedsResync {
            self.resync(dom, region);
        }
    }

    /// Retargets the buffer when the selection moves into another rich region.
    pub fn on_selection_change<D: Dom<Node = N>>(&mut self, dom: &D) {
        let region = dom
            .selection()
            .and_then(|selection| rich_region_for(dom, selection.anchor.node));
        if let Some(region) = region {
            if !self.session.buffer.tracks(region) {
                debug!(?region, "selection moved to another rich region");
                self.session.buffer.retarget(Some(region));
            }
        }
    }

    /// Any focus change invalidates undo.
    pub fn on_focus_in<D: Dom<Node = N>>(&mut self, dom: &D, node: N) {
        self.session.engine.clear_undo();
        if let Some(region) = rich_region_for(dom, node) {
            if !self.session.buffer.tracks(region) {
                self.session.buffer.retarget(Some(region));
            }
        }
    }

    fn resync_if_tracked<D: Dom<Node = N>>(&mut self, dom: &D, surface: Surface<N>) {
        if surface.is_rich() && self.session.buffer.tracks(surface.node()) {
            self.resync(dom, surface.node());
        }
    }

    /// Rebuilds the buffer from the region's text before the caret.
    fn resync<D: Dom<Node = N>>(&mut self, dom: &D, region: N) {
        let text = match Surface::RichRegion(region).read_flattened(dom) {
            Ok(field) => char_prefix(&field.text, field.caret).to_string(),
            Err(_) => dom.text_content(region),
        };
        self.session.buffer.resync(&text);
    }
}

fn ancestors<D: Dom>(dom: &D, node: D::Node) -> impl Iterator<Item = D::Node> + '_ {
    std::iter::successors(Some(node), move |n| dom.parent(*n))
}

/// First qualifying surface along `chain` (innermost first). An excluded node
/// ends the walk, so nothing inside a payment field is reached through an
/// editable ancestor.
fn nearest_surface<D: Dom>(dom: &D, chain: impl Iterator<Item = D::Node>) -> Option<Surface<D::Node>> {
    for node in chain {
        if is_excluded(dom, node) {
            return None;
        }
        if let Some(surface) = Surface::qualify(dom, node) {
            return Some(surface);
        }
    }
    None
}

/// Nearest rich-edit region containing `node`, unless an excluded node is
/// closer.
fn rich_region_for<D: Dom>(dom: &D, node: D::Node) -> Option<D::Node> {
    nearest_surface(dom, ancestors(dom, node))
        .filter(Surface::is_rich)
        .map(|surface| surface.node())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Boundary;
    use crate::engine::Phase;
    use crate::page::{MemoryPage, NodeId};
    use crate::store::mock::MockStore;

    fn tab(target: NodeId) -> KeyEvent<NodeId> {
        KeyEvent::new("Tab", KeyModifiers::NONE, Some(target))
    }

    fn ctrl_z(target: NodeId) -> KeyEvent<NodeId> {
        KeyEvent::new("z", KeyModifiers::CTRL, Some(target))
    }

    async fn router(store: &MockStore) -> EventRouter<NodeId> {
        let mut router = EventRouter::new(Settings::default());
        router.load(store).await;
        router
    }

    #[tokio::test]
    async fn test_tab_expands_and_ctrl_z_undoes() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "Type /demo");
        page.focus(input);

        let mut event = tab(input);
        let handled = router.handle_key_down(&mut page, &store, &mut event).await;
        assert_eq!(
            handled,
            KeyHandled::Expansion(ExpansionOutcome::Applied { trigger: "demo".into(), caret: 16 })
        );
        assert!(event.default_prevented());
        assert_eq!(page.value(input), "Type Hello World");

        let mut undo = ctrl_z(input);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut undo).await, KeyHandled::Undone);
        assert!(undo.default_prevented());
        assert_eq!(page.value(input), "Type /demo");
        assert_eq!(page.selection_start(input), Some(10));

        let mut again = ctrl_z(input);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut again).await, KeyHandled::Ignored);
        assert!(!again.default_prevented());
    }

    #[tokio::test]
    async fn test_no_trigger_does_not_block_tab() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "no trigger here");
        page.focus(input);

        let mut event = tab(input);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut event).await, KeyHandled::Ignored);
        assert!(!event.default_prevented());
        assert_eq!(page.value(input), "no trigger here");
        assert_eq!(store.expand_calls(), 0);
    }

    #[tokio::test]
    async fn test_uncached_trigger_does_not_block_tab() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/nope");
        page.focus(input);

        let mut event = tab(input);
        assert!(matches!(router.on_key_down(&mut page, &mut event), KeyOutcome::Ignored));
        assert!(!event.default_prevented());
        assert_eq!(store.expand_calls(), 0);
    }

    #[tokio::test]
    async fn test_modified_tab_is_ignored() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/demo");
        page.focus(input);

        let mut event = KeyEvent::new("Tab", KeyModifiers { shift: true, ..KeyModifiers::NONE }, Some(input));
        assert!(matches!(router.on_key_down(&mut page, &mut event), KeyOutcome::Ignored));
        assert_eq!(page.value(input), "/demo");
    }

    #[tokio::test]
    async fn test_pending_expansion_blocks_default_before_lookup() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/demo");
        page.focus(input);

        let mut event = tab(input);
        let KeyOutcome::Expand(pending) = router.on_key_down(&mut page, &mut event) else {
            panic!("expected a pending expansion");
        };
        assert!(event.default_prevented());
        assert_eq!(pending.phase(), Phase::Matched);
        assert_eq!(store.expand_calls(), 0);

        let resolved = pending.resolve(&store).await;
        assert!(router.complete(&mut page, resolved).is_applied());
    }

    #[tokio::test]
    async fn test_store_failure_replays_tab() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        store.set_offline(true);
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/demo");
        let next = page.add_textarea(&[], "");
        page.focus(input);

        let mut event = tab(input);
        let handled = router.handle_key_down(&mut page, &store, &mut event).await;
        assert_eq!(handled, KeyHandled::Expansion(ExpansionOutcome::StoreUnavailable));
        assert_eq!(page.value(input), "/demo");
        assert_eq!(page.replayed(), &[(input, "Tab".to_string())]);
        assert_eq!(page.active_element(), Some(next));
    }

    #[tokio::test]
    async fn test_cache_follows_store_changes() {
        let store = MockStore::default();
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/later");
        page.focus(input);

        let mut event = tab(input);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut event).await, KeyHandled::Ignored);

        store.upsert("later", "added later").await.unwrap();
        let mut event = tab(input);
        assert!(router.handle_key_down(&mut page, &store, &mut event).await != KeyHandled::Ignored);
        assert_eq!(page.value(input), "added later");
    }

    #[tokio::test]
    async fn test_unloaded_cache_still_expands() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = EventRouter::new(Settings::default());
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/demo");
        page.focus(input);
        assert!(router.session().triggers().is_none());

        let mut event = tab(input);
        let handled = router.handle_key_down(&mut page, &store, &mut event).await;
        assert!(matches!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { .. })));
    }

    #[tokio::test]
    async fn test_focus_change_clears_undo() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/demo");
        let other = page.add_input(&[("type", "text")], "");
        page.focus(input);

        router.handle_key_down(&mut page, &store, &mut tab(input)).await;
        assert!(router.session().engine().undo_snapshot().is_some());

        page.focus(other);
        router.on_focus_in(&page, other);
        page.focus(input);
        router.on_focus_in(&page, input);

        let mut undo = ctrl_z(input);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut undo).await, KeyHandled::Ignored);
        assert_eq!(page.value(input), "Hello World");
    }

    #[tokio::test]
    async fn test_password_field_is_never_touched() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let password = page.add_input(&[("type", "password")], "/demo");
        let region = page.add_element("div", &[("contenteditable", "true")]);
        let text = page.add_text(region, "/demo");
        page.collapse_selection(Boundary::new(text, 5));
        page.focus(password);

        let mut event = tab(password);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut event).await, KeyHandled::Ignored);
        assert_eq!(page.value(password), "/demo");
        assert_eq!(page.text_content(region), "/demo");
    }

    #[tokio::test]
    async fn test_target_from_selection_anchor() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let region = page.add_element("div", &[("contenteditable", "true")]);
        let para = page.add_child_element(region, "p", &[]);
        let text = page.add_text(para, "see /demo");
        page.collapse_selection(Boundary::new(text, 9));
        page.blur();

        let event = KeyEvent::new("Tab", KeyModifiers::NONE, None);
        assert_eq!(router.resolve_target(&page, &event), Some(Surface::RichRegion(region)));

        let mut event = event;
        let handled = router.handle_key_down(&mut page, &store, &mut event).await;
        assert!(matches!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { .. })));
        assert_eq!(page.text_content(region), "see Hello World");
    }

    #[tokio::test]
    async fn test_target_from_dispatch_path_then_event_target() {
        let store = MockStore::default();
        let router = router(&store).await;
        let mut page = MemoryPage::new();
        let region = page.add_element("div", &[("contenteditable", "true")]);
        let inner = page.add_child_element(region, "span", &[]);
        let input = page.add_input(&[("type", "search")], "");

        let by_path = KeyEvent::new("Tab", KeyModifiers::NONE, Some(inner)).with_path(vec![inner, region, page.body()]);
        assert_eq!(router.resolve_target(&page, &by_path), Some(Surface::RichRegion(region)));

        let by_target = KeyEvent::new("Tab", KeyModifiers::NONE, Some(input));
        assert_eq!(router.resolve_target(&page, &by_target), Some(Surface::PlainField(input)));

        let nothing = KeyEvent::new("Tab", KeyModifiers::NONE, Some(inner));
        assert_eq!(router.resolve_target(&page, &nothing), None);
    }

    #[tokio::test]
    async fn test_excluded_region_inside_editor_is_not_reached() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let wrapper = page.add_element("div", &[("contenteditable", "true")]);
        let card = page.add_child_element(wrapper, "div", &[("contenteditable", "true"), ("autocomplete", "cc-number")]);
        let digits = page.add_text(card, "4111 /demo");
        page.collapse_selection(Boundary::new(digits, 10));
        page.blur();

        let by_selection = KeyEvent::new("Tab", KeyModifiers::NONE, None);
        assert_eq!(router.resolve_target(&page, &by_selection), None);
        let by_path = KeyEvent::new("Tab", KeyModifiers::NONE, None).with_path(vec![digits, card, wrapper, page.body()]);
        page.clear_selection();
        assert_eq!(router.resolve_target(&page, &by_path), None);

        page.collapse_selection(Boundary::new(digits, 10));
        let mut event = KeyEvent::new("Tab", KeyModifiers::NONE, None);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut event).await, KeyHandled::Ignored);
        assert_eq!(page.text_content(wrapper), "4111 /demo");

        router.on_input(&page, &InputEvent::insert_text(digits, "1"));
        assert_eq!(router.session().buffer().region(), None);
    }

    #[tokio::test]
    async fn test_buffer_tracks_typing_in_rich_region() {
        let store = MockStore::default();
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let region = page.add_element("div", &[("contenteditable", "true")]);
        let text = page.add_text(region, "");
        page.focus(region);
        page.collapse_selection(Boundary::new(text, 0));
        router.on_focus_in(&page, region);
        assert!(router.session().buffer().tracks(region));

        for c in ["h", "i"] {
            page.type_into_text(text, c);
            router.on_input(&page, &InputEvent::insert_text(text, c));
        }
        router.on_input(&page, &InputEvent::new(text, "insertParagraph", None));
        assert_eq!(router.session().buffer().text(), "hi\n");
        router.on_input(&page, &InputEvent::new(text, "deleteContentBackward", None));
        assert_eq!(router.session().buffer().text(), "hi");

        page.type_into_text(text, " pasted");
        router.on_input(&page, &InputEvent::new(text, "insertFromPaste", Some(" pasted")));
        assert_eq!(router.session().buffer().text(), "hi pasted");
    }

    #[tokio::test]
    async fn test_selection_in_other_region_resets_buffer() {
        let store = MockStore::default();
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let first = page.add_element("div", &[("contenteditable", "true")]);
        let first_text = page.add_text(first, "abc");
        let second = page.add_element("div", &[("contenteditable", "true")]);
        let second_text = page.add_text(second, "xyz");

        page.collapse_selection(Boundary::new(first_text, 3));
        router.on_input(&page, &InputEvent::insert_text(first_text, "c"));
        assert_eq!(router.session().buffer().text(), "abc");

        page.collapse_selection(Boundary::new(second_text, 1));
        router.on_selection_change(&page);
        assert!(router.session().buffer().tracks(second));
        assert!(router.session().buffer().is_empty());

        // same region again keeps what was typed
        router.on_input(&page, &InputEvent::insert_text(second_text, "q"));
        router.on_selection_change(&page);
        assert!(router.session().buffer().tracks(second));
    }

    #[tokio::test]
    async fn test_buffer_fallback_expands_split_trigger() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let region = page.add_element("div", &[("contenteditable", "true")]);
        let head = page.add_text(region, "");
        page.focus(region);
        page.collapse_selection(Boundary::new(head, 0));
        router.on_focus_in(&page, region);

        for c in "Type /de".chars() {
            let c = c.to_string();
            page.type_into_text(head, &c);
            router.on_input(&page, &InputEvent::insert_text(head, &c));
        }
        // the editor moves the rest of the word into its own node
        let tail = page.add_text(region, "");
        page.collapse_selection(Boundary::new(tail, 0));
        for c in ["m", "o"] {
            page.type_into_text(tail, c);
            router.on_input(&page, &InputEvent::insert_text(tail, c));
        }
        assert_eq!(router.session().buffer().text(), "Type /demo");

        let mut event = tab(region);
        let handled = router.handle_key_down(&mut page, &store, &mut event).await;
        assert!(matches!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { .. })));
        assert_eq!(page.text_content(region), "Type Hello World");
        assert_eq!(router.session().buffer().text(), "Type Hello World");
    }

    #[tokio::test]
    async fn test_teardown_resets_session() {
        let store = MockStore::with_snippets([("demo", "Hello World")]);
        let mut router = router(&store).await;
        let mut page = MemoryPage::new();
        let input = page.add_input(&[("type", "text")], "/demo");
        page.focus(input);
        router.handle_key_down(&mut page, &store, &mut tab(input)).await;
        assert!(router.session().triggers().is_some());

        router.teardown();
        assert!(router.session().triggers().is_none());
        assert!(router.session().engine().undo_snapshot().is_none());
        assert_eq!(router.session().buffer().region(), None);
    }
}
