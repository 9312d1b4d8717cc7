use crossbeam_channel::{unbounded, Receiver};
use slashkey::{
    Boundary, Dom, EventRouter, ExpansionOutcome, FileStore, InputEvent, KeyEvent, KeyHandled, KeyModifiers,
    MemoryPage, MemoryStore, NodeId, Settings, SnippetStore, Snippets, StoreError,
};

/// Store whose background side has gone away.
struct UnreachableStore;

impl SnippetStore for UnreachableStore {
    async fn read_all(&self) -> Result<Snippets, StoreError> {
        Err(StoreError::Unreachable("background context restarted".into()))
    }

    async fn upsert(&self, _trigger: &str, _text: &str) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("background context restarted".into()))
    }

    async fn delete(&self, _trigger: &str) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("background context restarted".into()))
    }

    fn subscribe(&self) -> Receiver<Snippets> {
        unbounded().1
    }
}

fn tab(target: NodeId) -> KeyEvent<NodeId> {
    KeyEvent::new("Tab", KeyModifiers::NONE, Some(target))
}

fn demo_store() -> MemoryStore {
    MemoryStore::with_snippets([("demo", "Hello World"), ("sig", "Best,\nAda")]).unwrap()
}

async fn loaded_router(store: &impl SnippetStore) -> EventRouter<NodeId> {
    let mut router = EventRouter::new(Settings::default());
    router.load(store).await;
    router
}

#[tokio::test]
async fn test_expand_plain_input() {
    let store = demo_store();
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let input = page.add_input(&[("type", "text")], "Type /demo");
    page.focus(input);

    let mut event = tab(input);
    let handled = router.handle_key_down(&mut page, &store, &mut event).await;

    assert_eq!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { trigger: "demo".into(), caret: 16 }));
    assert!(event.default_prevented());
    assert_eq!(page.value(input), "Type Hello World");
    assert_eq!(page.selection_start(input), Some(16));
    assert_eq!(page.input_events(), &[input]);
    assert_eq!(page.toasts(), vec!["Expanded '/demo'"]);
}

#[tokio::test]
async fn test_expand_textarea_with_multiline_snippet() {
    let store = demo_store();
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let area = page.add_textarea(&[], "Thanks!\n/Sig");
    page.focus(area);

    let handled = router.handle_key_down(&mut page, &store, &mut tab(area)).await;
    assert_eq!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { trigger: "Sig".into(), caret: 17 }));
    assert_eq!(page.value(area), "Thanks!\nBest,\nAda");
}

#[tokio::test]
async fn test_text_without_trigger_is_left_alone() {
    let store = demo_store();
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let input = page.add_input(&[("type", "text")], "no trigger here");
    page.focus(input);

    let mut event = tab(input);
    assert_eq!(router.handle_key_down(&mut page, &store, &mut event).await, KeyHandled::Ignored);
    assert!(!event.default_prevented());
    assert_eq!(page.value(input), "no trigger here");
    assert!(page.input_events().is_empty());
    assert!(page.toasts().is_empty());
}

#[tokio::test]
async fn test_sensitive_fields_are_skipped() {
    let store = demo_store();
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let password = page.add_input(&[("type", "password")], "/demo");
    let card = page.add_input(&[("type", "text"), ("autocomplete", "cc-number")], "/demo");
    let card_email = page.add_input(&[("type", "email"), ("autocomplete", "cc-email")], "/demo");

    for field in [password, card, card_email] {
        page.focus(field);
        let mut event = tab(field);
        assert_eq!(router.handle_key_down(&mut page, &store, &mut event).await, KeyHandled::Ignored);
        assert!(!event.default_prevented());
        assert_eq!(page.value(field), "/demo");
    }
}

#[tokio::test]
async fn test_undo_restores_trigger_once() {
    let store = demo_store();
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let input = page.add_input(&[("type", "text")], "Type /demo");
    page.focus(input);
    router.handle_key_down(&mut page, &store, &mut tab(input)).await;

    let mut undo = KeyEvent::new("z", KeyModifiers::CTRL, Some(input));
    assert_eq!(router.handle_key_down(&mut page, &store, &mut undo).await, KeyHandled::Undone);
    assert_eq!(page.value(input), "Type /demo");
    assert_eq!(page.selection_start(input), Some(10));

    let mut again = KeyEvent::new("z", KeyModifiers::CTRL, Some(input));
    assert_eq!(router.handle_key_down(&mut page, &store, &mut again).await, KeyHandled::Ignored);
    assert!(!again.default_prevented());
}

#[tokio::test]
async fn test_unreachable_store_falls_back_to_tab() {
    let store = UnreachableStore;
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let input = page.add_input(&[("type", "text")], "Type /demo");
    let next = page.add_input(&[("type", "text")], "");
    page.focus(input);

    let mut event = tab(input);
    let handled = router.handle_key_down(&mut page, &store, &mut event).await;
    assert_eq!(handled, KeyHandled::Expansion(ExpansionOutcome::StoreUnavailable));
    assert_eq!(page.value(input), "Type /demo");
    assert_eq!(page.active_element(), Some(next));
}

#[tokio::test]
async fn test_contenteditable_expansion_and_undo() {
    let store = demo_store();
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let editor = page.add_element("div", &[("contenteditable", "true")]);
    let para = page.add_child_element(editor, "p", &[]);
    let text = page.add_text(para, "Regards /sig");
    page.focus(editor);
    page.collapse_selection(Boundary::new(text, 12));
    router.on_focus_in(&page, editor);

    let handled = router.handle_key_down(&mut page, &store, &mut tab(editor)).await;
    assert!(matches!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { .. })));
    assert_eq!(page.text_content(editor), "Regards Best,\nAda");
    assert_eq!(page.selection().map(|s| s.focus.offset), Some(17));

    let mut undo = KeyEvent::new("z", KeyModifiers::CTRL, Some(editor));
    assert_eq!(router.handle_key_down(&mut page, &store, &mut undo).await, KeyHandled::Undone);
    assert_eq!(page.text_content(editor), "Regards /sig");
}

#[tokio::test]
async fn test_trigger_split_across_text_nodes() {
    let store = demo_store();
    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let editor = page.add_element("div", &[("contenteditable", "true")]);
    let head = page.add_text(editor, "");
    page.focus(editor);
    page.collapse_selection(Boundary::new(head, 0));
    router.on_focus_in(&page, editor);

    for c in ["/", "d", "e"] {
        page.type_into_text(head, c);
        router.on_input(&page, &InputEvent::insert_text(head, c));
    }
    let tail = page.add_text(editor, "");
    page.collapse_selection(Boundary::new(tail, 0));
    for c in ["m", "o"] {
        page.type_into_text(tail, c);
        router.on_input(&page, &InputEvent::insert_text(tail, c));
    }

    let handled = router.handle_key_down(&mut page, &store, &mut tab(editor)).await;
    assert!(matches!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { .. })));
    assert_eq!(page.text_content(editor), "Hello World");
}

#[tokio::test]
async fn test_file_store_backs_expansion() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("snippets.toml"));
    store.upsert("addr", "1 Main St").await.unwrap();

    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let input = page.add_input(&[("type", "text")], "/demo and /addr");
    page.focus(input);

    let handled = router.handle_key_down(&mut page, &store, &mut tab(input)).await;
    assert!(matches!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { .. })));
    assert_eq!(page.value(input), "/demo and 1 Main St");

    page.set_selection_range(input, 5, 5);
    router.on_focus_in(&page, input);
    router.handle_key_down(&mut page, &store, &mut tab(input)).await;
    assert_eq!(page.value(input), "This is a demo expansion text! and 1 Main St");
}

#[tokio::test]
async fn test_hand_edited_store_key_expands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snippets.toml");
    std::fs::write(&path, "[shortcuts]\nSig = \"Best, Ada\"\n").unwrap();
    let store = FileStore::new(&path);

    let mut router = loaded_router(&store).await;
    let mut page = MemoryPage::new();
    let input = page.add_input(&[("type", "text")], "/sig");
    page.focus(input);

    let handled = router.handle_key_down(&mut page, &store, &mut tab(input)).await;
    assert!(matches!(handled, KeyHandled::Expansion(ExpansionOutcome::Applied { .. })));
    assert_eq!(page.value(input), "Best, Ada");
}
