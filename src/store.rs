//! Trigger -> snippet storage.
//!
//! The engine reaches storage only through [`SnippetStore`]. Two stores ship
//! with the crate: [`MemoryStore`] for a single process and [`FileStore`],
//! a TOML file that other processes (the CLI, an editor) may change while the
//! engine runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::matcher::{is_valid_trigger, normalize_trigger};

/// Full mapping, sorted by trigger.
pub type Snippets = BTreeMap<String, String>;

pub const DEMO_TRIGGER: &str = "demo";
pub const DEMO_SNIPPET: &str = "This is a demo expansion text!";

/// Async request/response access to the snippet mapping.
#[allow(async_fn_in_trait)]
pub trait SnippetStore {
    /// Every stored mapping, possibly empty.
    async fn read_all(&self) -> Result<Snippets, StoreError>;

    /// Inserts or replaces the snippet for `trigger` (stored lowercased).
    async fn upsert(&self, trigger: &str, text: &str) -> Result<(), StoreError>;

    /// Removes `trigger`. Removing an unknown trigger succeeds.
    async fn delete(&self, trigger: &str) -> Result<(), StoreError>;

    /// Snippet for `trigger`, matched case-insensitively.
    async fn expand(&self, trigger: &str) -> Result<Option<String>, StoreError> {
        let key = normalize_trigger(trigger);
        Ok(self.read_all().await?.remove(&key))
    }

    /// Channel that receives the full mapping after every change.
    fn subscribe(&self) -> Receiver<Snippets>;
}

fn checked_key(trigger: &str) -> Result<String, StoreError> {
    let trigger = trigger.trim();
    if !is_valid_trigger(trigger) {
        return Err(StoreError::InvalidTrigger(trigger.to_string()));
    }
    Ok(normalize_trigger(trigger))
}

/// Fan-out of change notifications. Dropped receivers are pruned on send.
#[derive(Default)]
pub struct Subscribers {
    senders: Mutex<Vec<Sender<Snippets>>>,
}

impl Subscribers {
    pub fn subscribe(&self) -> Receiver<Snippets> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    pub fn publish(&self, snippets: &Snippets) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(snippets.clone()).is_ok());
        debug!(subscribers = senders.len(), entries = snippets.len(), "published snippet change");
    }
}

#[derive(Default)]
pub struct MemoryStore {
    snippets: RwLock<Snippets>,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `entries`; keys are validated and lowercased.
    pub fn with_snippets<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, StoreError> {
        let mut snippets = Snippets::new();
        for (trigger, text) in entries {
            snippets.insert(checked_key(trigger)?, text.to_string());
        }
        Ok(Self { snippets: RwLock::new(snippets), subscribers: Subscribers::default() })
    }
}

impl SnippetStore for MemoryStore {
    async fn read_all(&self) -> Result<Snippets, StoreError> {
        Ok(self.snippets.read().clone())
    }

    async fn upsert(&self, trigger: &str, text: &str) -> Result<(), StoreError> {
        let key = checked_key(trigger)?;
        let snapshot = {
            let mut snippets = self.snippets.write();
            snippets.insert(key, text.to_string());
            snippets.clone()
        };
        self.subscribers.publish(&snapshot);
        Ok(())
    }

    async fn delete(&self, trigger: &str) -> Result<(), StoreError> {
        let key = normalize_trigger(trigger.trim());
        let snapshot = {
            let mut snippets = self.snippets.write();
            snippets.remove(&key);
            snippets.clone()
        };
        self.subscribers.publish(&snapshot);
        Ok(())
    }

    async fn expand(&self, trigger: &str) -> Result<Option<String>, StoreError> {
        Ok(self.snippets.read().get(&normalize_trigger(trigger)).cloned())
    }

    fn subscribe(&self) -> Receiver<Snippets> {
        self.subscribers.subscribe()
    }
}

/// On-disk layout. `aliases` is the table name used by older releases.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shortcuts: Option<Snippets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aliases: Option<Snippets>,
}

impl StoreFile {
    fn parse(input: &str) -> Result<Self, StoreError> {
        Ok(toml::from_str(input)?)
    }

    fn current(shortcuts: Snippets) -> Self {
        Self { shortcuts: Some(shortcuts), aliases: None }
    }
}

/// Snippets kept in a TOML file:
///
/// ```toml
/// [shortcuts]
/// demo = "This is a demo expansion text!"
/// ```
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
    subscribers: Arc<Subscribers>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
            subscribers: Arc::new(Subscribers::default()),
        }
    }

    /// Store at the default data location.
    pub fn open_default() -> crate::Result<Self> {
        Ok(Self::new(crate::config::get_store_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Snippets, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snippet store at {:?}, seeding the demo snippet", self.path);
                let seeded = Snippets::from([(DEMO_TRIGGER.to_string(), DEMO_SNIPPET.to_string())]);
                self.save(&seeded).await?;
                return Ok(seeded);
            }
            Err(e) => return Err(StoreError::Read { path: self.path.clone(), source: e }),
        };

        let file = StoreFile::parse(&contents)?;
        match (file.shortcuts, file.aliases) {
            (Some(shortcuts), _) => Ok(normalize_keys(shortcuts)),
            (None, Some(aliases)) => {
                info!(entries = aliases.len(), "Migrating legacy aliases table to shortcuts");
                let aliases = normalize_keys(aliases);
                self.save(&aliases).await?;
                Ok(aliases)
            }
            (None, None) => Ok(Snippets::new()),
        }
    }

    async fn save(&self, snippets: &Snippets) -> Result<(), StoreError> {
        let serialized = toml::to_string_pretty(&StoreFile::current(snippets.clone()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Write { path: parent.to_path_buf(), source: e })?;
        }
        tokio::fs::write(&self.path, serialized)
            .await
            .map_err(|e| StoreError::Write { path: self.path.clone(), source: e })
    }

    async fn modify(&self, change: impl FnOnce(&mut Snippets)) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut snippets = self.load().await?;
        change(&mut snippets);
        self.save(&snippets).await?;
        self.subscribers.publish(&snippets);
        Ok(())
    }

    /// Watches the backing file and republishes the mapping whenever another
    /// process rewrites it. Watching stops when the returned watcher is dropped.
    pub fn watch(&self) -> Result<RecommendedWatcher, StoreError> {
        let path = self.path.clone();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Write { path: dir.clone(), source: e })?;

        let subscribers = Arc::clone(&self.subscribers);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("Snippet store watch error: {}", e);
                    return;
                }
            };
            if !(event.kind.is_create() || event.kind.is_modify()) || !event.paths.iter().any(|p| p == &path) {
                return;
            }
            match read_snippets_blocking(&path) {
                Ok(snippets) => subscribers.publish(&snippets),
                Err(e) => warn!("Ignoring unreadable snippet store {:?}: {}", path, e),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching snippet store at {:?}", self.path);
        Ok(watcher)
    }
}

/// Lowercases hand-edited keys and drops the ones that are not triggers.
fn normalize_keys(snippets: Snippets) -> Snippets {
    snippets
        .into_iter()
        .filter_map(|(trigger, text)| match checked_key(&trigger) {
            Ok(key) => Some((key, text)),
            Err(e) => {
                warn!("Skipping stored snippet: {}", e);
                None
            }
        })
        .collect()
}

fn read_snippets_blocking(path: &Path) -> Result<Snippets, StoreError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Read { path: path.to_path_buf(), source: e })?;
    let file = StoreFile::parse(&contents)?;
    Ok(normalize_keys(file.shortcuts.or(file.aliases).unwrap_or_default()))
}

impl SnippetStore for FileStore {
    async fn read_all(&self) -> Result<Snippets, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    async fn upsert(&self, trigger: &str, text: &str) -> Result<(), StoreError> {
        let key = checked_key(trigger)?;
        let text = text.to_string();
        self.modify(move |snippets| {
            snippets.insert(key, text);
        })
        .await
    }

    async fn delete(&self, trigger: &str) -> Result<(), StoreError> {
        let key = normalize_trigger(trigger.trim());
        self.modify(move |snippets| {
            snippets.remove(&key);
        })
        .await
    }

    fn subscribe(&self) -> Receiver<Snippets> {
        self.subscribers.subscribe()
    }
}
