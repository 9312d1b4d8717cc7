//! Slashkey - Slash-Trigger Text Expansion
//!
//! Type `/name` in a text field, press Tab, and `/name` is replaced by the
//! snippet saved under `name`. Ctrl+Z right after puts the trigger back.
//!
//! The crate is host-driven: the page is reached only through the [`Dom`]
//! trait and events are fed in by the host through [`EventRouter`]. Snippets
//! live behind the async [`SnippetStore`] trait. [`MemoryPage`] is a complete
//! in-memory page used by the CLI and the tests.

pub mod buffer;
pub mod config;
pub mod dom;
pub mod engine;
pub mod errors;
pub mod keys;
pub mod manage;
pub mod matcher;
pub mod page;
pub mod router;
pub mod store;
pub mod surface;

pub use buffer::{InputKind, RecentTextBuffer, MAX_BUFFER_LENGTH};
pub use config::{get_config_path, get_store_path, load_settings, Settings};
pub use dom::{Boundary, Dom, Selection};
pub use engine::{ExpansionEngine, ExpansionOutcome, Lookup, PendingExpansion, Phase, ResolvedExpansion};
pub use errors::{ConfigError, Result, SlashkeyError, StoreError, SurfaceError};
pub use keys::{KeyBinding, KeyModifiers};
pub use manage::{SnippetDraft, SnippetEntry};
pub use matcher::{find_trigger, TriggerMatch, TRIGGER_PREFIX};
pub use page::{MemoryPage, NodeId};
pub use router::{EventRouter, InputEvent, KeyEvent, KeyHandled, KeyOutcome, Session};
pub use store::{FileStore, MemoryStore, SnippetStore, Snippets};
pub use surface::Surface;
