//! Expansion engine: turns a matched trigger into a rewrite of the field.
//!
//! One interaction moves through `Idle -> Matched -> Resolving -> Applied`.
//! The phases are carried by values rather than a shared flag:
//! [`PendingExpansion`] is a match waiting for its lookup,
//! [`PendingExpansion::resolve`] is the lookup (the only await in the engine),
//! and [`ExpansionEngine::apply`] performs the write. Any miss falls back to
//! `Idle` without touching the page.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::dom::Dom;
use crate::matcher::{char_prefix, find_trigger, splice_chars, TriggerMatch, TRIGGER_PREFIX};
use crate::store::SnippetStore;
use crate::surface::{CaretContext, FieldSnapshot, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Matched,
    Resolving,
    Applied,
}

/// Field state right before the last successful expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoSnapshot<N> {
    pub surface: Surface<N>,
    pub text: String,
    pub caret: usize,
    pub context: CaretContext<N>,
}

/// A trigger found at the caret, not yet looked up.
#[derive(Debug, Clone)]
pub struct PendingExpansion<N> {
    surface: Surface<N>,
    field: FieldSnapshot<N>,
    span: TriggerMatch,
    from_buffer: bool,
    phase: Phase,
}

impl<N: Copy + Eq> PendingExpansion<N> {
    pub fn surface(&self) -> Surface<N> {
        self.surface
    }

    pub fn span(&self) -> &TriggerMatch {
        &self.span
    }

    /// Field contents the match was made against.
    pub fn field(&self) -> &FieldSnapshot<N> {
        &self.field
    }

    /// Whether the match came from the recent-text buffer.
    pub fn from_buffer(&self) -> bool {
        self.from_buffer
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Looks the trigger up. Store failures are logged and count as a miss.
    pub async fn resolve<S: SnippetStore>(mut self, store: &S) -> ResolvedExpansion<N> {
        self.phase = Phase::Resolving;
        let key = self.span.key();
        let lookup = match store.expand(&key).await {
            Ok(Some(text)) if !text.is_empty() => Lookup::Found(text),
            Ok(_) => {
                debug!(trigger = %key, "no snippet for trigger");
                Lookup::Unknown
            }
            Err(e) => {
                warn!(trigger = %key, "Failed to expand trigger: {}", e);
                Lookup::Unavailable
            }
        };
        ResolvedExpansion { pending: self, lookup }
    }
}

/// Result of the store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    Unknown,
    Unavailable,
}

/// A pending expansion whose lookup has completed.
#[derive(Debug, Clone)]
pub struct ResolvedExpansion<N> {
    pending: PendingExpansion<N>,
    lookup: Lookup,
}

impl<N: Copy + Eq> ResolvedExpansion<N> {
    pub fn pending(&self) -> &PendingExpansion<N> {
        &self.pending
    }

    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    pub fn phase(&self) -> Phase {
        self.pending.phase
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// The trigger was replaced; `caret` is where the caret now sits.
    Applied { trigger: String, caret: usize },
    UnknownTrigger,
    StoreUnavailable,
    /// The field changed while the lookup was in flight; nothing was written.
    Stale,
}

impl ExpansionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ExpansionOutcome::Applied { .. })
    }

    /// Phase the interaction ended in.
    pub fn phase(&self) -> Phase {
        if self.is_applied() {
            Phase::Applied
        } else {
            Phase::Idle
        }
    }

    /// Misses after which a blocked key should get its default action back.
    pub fn restores_default(&self) -> bool {
        matches!(self, ExpansionOutcome::UnknownTrigger | ExpansionOutcome::StoreUnavailable)
    }
}

pub struct ExpansionEngine<N> {
    undo: Option<UndoSnapshot<N>>,
    toast_duration: Duration,
    fence_stale: bool,
}

impl<N: Copy + Eq + std::fmt::Debug> ExpansionEngine<N> {
    pub fn new(settings: &Settings) -> Self {
        Self {
            undo: None,
            toast_duration: settings.toast_duration(),
            fence_stale: settings.fence_stale_expansions,
        }
    }

    /// Reads `surface` and matches a trigger at its caret.
    ///
    /// When the live reading has no trigger and `recent_text` (the buffer of a
    /// rich region) ends in one, the buffer's trigger is located in the
    /// region's flattened text instead.
    pub fn begin<D: Dom<Node = N>>(
        &self,
        dom: &D,
        surface: Surface<N>,
        recent_text: Option<&str>,
    ) -> Option<PendingExpansion<N>> {
        let field = match surface.read(dom) {
            Ok(field) => field,
            Err(e) => {
                debug!(?surface, "cannot read caret context: {}", e);
                return self.begin_from_buffer(dom, surface, recent_text);
            }
        };

        match find_trigger(&field.text, field.caret) {
            Some(span) => Some(PendingExpansion { surface, field, span, from_buffer: false, phase: Phase::Matched }),
            None => self.begin_from_buffer(dom, surface, recent_text),
        }
    }

    fn begin_from_buffer<D: Dom<Node = N>>(
        &self,
        dom: &D,
        surface: Surface<N>,
        recent_text: Option<&str>,
    ) -> Option<PendingExpansion<N>> {
        if !surface.is_rich() {
            return None;
        }
        let recent = recent_text?;
        let buffered = find_trigger(recent, recent.chars().count())?;
        let field = surface.read_flattened(dom).ok()?;
        let span = locate_token(&field.text, field.caret, &buffered.token)?;
        debug!(trigger = %span.token, "trigger recovered from recent text buffer");
        Some(PendingExpansion { surface, field, span, from_buffer: true, phase: Phase::Matched })
    }

    /// Writes a resolved expansion into its field.
    pub fn apply<D: Dom<Node = N>>(&mut self, dom: &mut D, resolved: ResolvedExpansion<N>) -> ExpansionOutcome {
        let ResolvedExpansion { pending, lookup } = resolved;
        let snippet = match lookup {
            Lookup::Found(snippet) => snippet,
            Lookup::Unknown => return ExpansionOutcome::UnknownTrigger,
            Lookup::Unavailable => return ExpansionOutcome::StoreUnavailable,
        };
        let PendingExpansion { surface, field, span, .. } = pending;

        if !surface.is_attached(dom, field.context) {
            debug!(?surface, trigger = %span.token, "field detached during lookup, dropping expansion");
            return ExpansionOutcome::Stale;
        }
        if self.fence_stale {
            match surface.reread(dom, field.context) {
                Ok(now) if now.text == field.text && now.caret == field.caret => {}
                Ok(_) => {
                    debug!(?surface, trigger = %span.token, "field changed during lookup, dropping expansion");
                    return ExpansionOutcome::Stale;
                }
                Err(e) => {
                    debug!(?surface, trigger = %span.token, "field unavailable after lookup: {}", e);
                    return ExpansionOutcome::Stale;
                }
            }
        }

        let new_text = splice_chars(&field.text, span.start, span.end, &snippet);
        let new_caret = span.start + snippet.chars().count();
        surface.write(dom, &new_text, new_caret, field.context);

        self.undo = Some(UndoSnapshot {
            surface,
            text: field.text,
            caret: field.caret,
            context: field.context,
        });
        dom.show_toast(&format!("Expanded '{}{}'", TRIGGER_PREFIX, span.token), self.toast_duration);
        info!(trigger = %span.token, caret = new_caret, "expanded trigger");

        ExpansionOutcome::Applied { trigger: span.token, caret: new_caret }
    }

    /// Restores the field as it was before the last expansion, once.
    ///
    /// Returns `false` when there is nothing to undo for `surface`.
    pub fn undo<D: Dom<Node = N>>(&mut self, dom: &mut D, surface: Surface<N>) -> bool {
        let applicable = self
            .undo
            .as_ref()
            .is_some_and(|snapshot| snapshot.surface == surface && surface.is_attached(dom, snapshot.context));
        if !applicable {
            return false;
        }
        let Some(snapshot) = self.undo.take() else {
            return false;
        };
        snapshot.surface.write(dom, &snapshot.text, snapshot.caret, snapshot.context);
        info!(?surface, "undid expansion");
        true
    }

    pub fn undo_snapshot(&self) -> Option<&UndoSnapshot<N>> {
        self.undo.as_ref()
    }

    pub fn clear_undo(&mut self) {
        if self.undo.take().is_some() {
            debug!("undo snapshot cleared");
        }
    }
}

/// Finds `/token` in `text`, preferring a match at `caret`, otherwise the last
/// occurrence that stands on its own.
fn locate_token(text: &str, caret: usize, token: &str) -> Option<TriggerMatch> {
    if let Some(found) = find_trigger(text, caret) {
        if found.token.eq_ignore_ascii_case(token) {
            return Some(found);
        }
    }

    let needle = format!("{TRIGGER_PREFIX}{token}");
    let searchable = char_prefix(text, caret.max(1));
    let searchable = if searchable.contains(&needle) { searchable } else { text };

    searchable.rmatch_indices(&needle).find_map(|(byte, _)| {
        let before = text[..byte].chars().next_back();
        let after = text[byte + needle.len()..].chars().next();
        let bounded_left = before.map_or(true, char::is_whitespace);
        let bounded_right = after.map_or(true, |c| !c.is_ascii_alphabetic());
        (bounded_left && bounded_right).then(|| {
            let start = text[..byte].chars().count();
            TriggerMatch { token: token.to_string(), start, end: start + needle.chars().count() }
        })
    })
}
