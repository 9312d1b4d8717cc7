//! Validated create/rename/delete/list over a [`SnippetStore`], used by the CLI.

use tracing::info;

use crate::errors::SlashkeyError;
use crate::matcher::{is_valid_trigger, normalize_trigger, TRIGGER_PREFIX};
use crate::store::SnippetStore;
use crate::Result;

/// Characters of snippet text shown in listings.
pub const PREVIEW_LENGTH: usize = 100;

/// A trigger/snippet pair that passed validation: trimmed, letters-only,
/// lowercased trigger and non-empty trimmed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetDraft {
    trigger: String,
    text: String,
}

impl SnippetDraft {
    pub fn new(trigger: &str, text: &str) -> Result<Self> {
        let trigger = checked_trigger(trigger)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SlashkeyError::Draft("snippet text is empty".into()));
        }
        Ok(Self { trigger, text: text.to_string() })
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

fn checked_trigger(trigger: &str) -> Result<String> {
    let trigger = trigger.trim();
    if trigger.is_empty() {
        return Err(SlashkeyError::Draft("trigger is empty".into()));
    }
    if !is_valid_trigger(trigger) {
        return Err(SlashkeyError::Draft(format!(
            "trigger '{}' must contain only letters",
            trigger
        )));
    }
    Ok(normalize_trigger(trigger))
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetEntry {
    pub trigger: String,
    pub text: String,
}

impl SnippetEntry {
    /// Text cut to [`PREVIEW_LENGTH`] characters, with `...` when cut.
    pub fn preview(&self) -> String {
        if self.text.chars().count() <= PREVIEW_LENGTH {
            return self.text.clone();
        }
        let mut preview: String = self.text.chars().take(PREVIEW_LENGTH).collect();
        preview.push_str("...");
        preview
    }

    /// `/trigger` as typed.
    pub fn typed(&self) -> String {
        format!("{}{}", TRIGGER_PREFIX, self.trigger)
    }
}

/// Saves `draft`. When `editing` names a different trigger, that one is
/// deleted after the new one is written.
pub async fn save<S: SnippetStore>(store: &S, draft: &SnippetDraft, editing: Option<&str>) -> Result<()> {
    store.upsert(draft.trigger(), draft.text()).await?;
    if let Some(old) = editing.map(normalize_trigger) {
        if old != draft.trigger() {
            store.delete(&old).await?;
            info!("Renamed /{} to /{}", old, draft.trigger());
            return Ok(());
        }
    }
    info!("Saved /{}", draft.trigger());
    Ok(())
}

/// Gives the snippet stored under `old` a new trigger. The text is kept
/// exactly as stored.
pub async fn rename<S: SnippetStore>(store: &S, old: &str, new: &str) -> Result<()> {
    let old = normalize_trigger(old.trim());
    let trigger = checked_trigger(new)?;
    let text = store
        .expand(&old)
        .await?
        .ok_or_else(|| SlashkeyError::Draft(format!("no snippet for /{}", old)))?;
    save(store, &SnippetDraft { trigger, text }, Some(&old)).await
}

pub async fn remove<S: SnippetStore>(store: &S, trigger: &str) -> Result<()> {
    store.delete(trigger).await?;
    info!("Removed /{}", normalize_trigger(trigger.trim()));
    Ok(())
}

/// All entries, alphabetical by trigger.
pub async fn list<S: SnippetStore>(store: &S) -> Result<Vec<SnippetEntry>> {
    Ok(store
        .read_all()
        .await?
        .into_iter()
        .map(|(trigger, text)| SnippetEntry { trigger, text })
        .collect())
}
