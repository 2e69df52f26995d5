//! Shared session state read by the UI and written by the pollers and
//! actions.
//!
//! Every field lives in its own [`tokio::sync::watch`] channel and is
//! replaced wholesale, so a reader always sees either the old or the
//! new value of a field, never a mix. No ordering is promised across
//! fields: health and the roster may briefly disagree.
//!
//! Once the owning orchestrator is torn down, every write is discarded
//! so that late-finishing actions cannot touch a dismissed view.

use std::collections::BTreeMap;

use chrono::Utc;
use flux_core::catalog::ModelInfo;
use flux_core::status::{HealthState, QueueSnapshot};
use flux_core::types::{ImageId, Timestamp};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::roster::{diff_roster, Reconciliation};

// ---------------------------------------------------------------------------
// Error records
// ---------------------------------------------------------------------------

/// Which part of the client an error belongs to.
///
/// At most one record is kept per category; a later success in the same
/// category clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Health,
    Queue,
    Generation,
    Delete,
    Download,
    Models,
}

/// How an error should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Shown briefly, cleared by the next success.
    Transient,
    /// Consequential failure that stays until dismissed or superseded.
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub severity: Severity,
    pub recorded_at: Timestamp,
}

impl ErrorRecord {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Transient)
    }

    pub fn persistent(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Persistent)
    }

    fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            recorded_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation flags
// ---------------------------------------------------------------------------

/// Guard against re-entrant execution of one user action.
#[derive(Debug)]
pub struct OperationFlag {
    state: watch::Sender<bool>,
}

/// Holds an [`OperationFlag`] raised; dropping it lowers the flag.
#[derive(Debug)]
#[must_use = "the flag is lowered as soon as the guard is dropped"]
pub struct FlagGuard<'a> {
    flag: &'a OperationFlag,
}

impl OperationFlag {
    fn new() -> Self {
        Self {
            state: watch::channel(false).0,
        }
    }

    pub fn is_set(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Raise the flag if it is currently lowered.
    ///
    /// Returns `None` when the action is already in progress.
    pub fn try_acquire(&self) -> Option<FlagGuard<'_>> {
        let acquired = self.state.send_if_modified(|set| {
            if *set {
                false
            } else {
                *set = true;
                true
            }
        });
        acquired.then(|| FlagGuard { flag: self })
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.state.send_replace(false);
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The view model shared by every component of the orchestrator.
#[derive(Debug)]
pub struct SessionState {
    health: watch::Sender<HealthState>,
    roster: watch::Sender<Vec<ImageId>>,
    queue: watch::Sender<Option<QueueSnapshot>>,
    models: watch::Sender<Option<Vec<ModelInfo>>>,
    errors: watch::Sender<BTreeMap<ErrorCategory, ErrorRecord>>,
    generating: OperationFlag,
    downloading_all: OperationFlag,
    lifecycle: CancellationToken,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// A fresh session with its own lifecycle.
    pub fn new() -> Self {
        Self::with_lifecycle(CancellationToken::new())
    }

    /// A fresh session that stops accepting writes once `lifecycle` is
    /// cancelled.
    pub fn with_lifecycle(lifecycle: CancellationToken) -> Self {
        Self {
            health: watch::channel(HealthState::Unknown).0,
            roster: watch::channel(Vec::new()).0,
            queue: watch::channel(None).0,
            models: watch::channel(None).0,
            errors: watch::channel(BTreeMap::new()).0,
            generating: OperationFlag::new(),
            downloading_all: OperationFlag::new(),
            lifecycle,
        }
    }

    // ---- readers ----

    pub fn health(&self) -> HealthState {
        *self.health.borrow()
    }

    pub fn roster(&self) -> Vec<ImageId> {
        self.roster.borrow().clone()
    }

    pub fn roster_len(&self) -> usize {
        self.roster.borrow().len()
    }

    /// `None` until the first successful queue poll.
    pub fn queue(&self) -> Option<QueueSnapshot> {
        *self.queue.borrow()
    }

    /// `None` until the first successful catalog fetch.
    pub fn models(&self) -> Option<Vec<ModelInfo>> {
        self.models.borrow().clone()
    }

    pub fn errors(&self) -> BTreeMap<ErrorCategory, ErrorRecord> {
        self.errors.borrow().clone()
    }

    pub fn error(&self, category: ErrorCategory) -> Option<ErrorRecord> {
        self.errors.borrow().get(&category).cloned()
    }

    pub fn generating(&self) -> &OperationFlag {
        &self.generating
    }

    pub fn downloading_all(&self) -> &OperationFlag {
        &self.downloading_all
    }

    pub fn is_generating(&self) -> bool {
        self.generating.is_set()
    }

    pub fn is_downloading_all(&self) -> bool {
        self.downloading_all.is_set()
    }

    pub fn is_torn_down(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    // ---- subscriptions ----

    pub fn subscribe_health(&self) -> watch::Receiver<HealthState> {
        self.health.subscribe()
    }

    pub fn subscribe_roster(&self) -> watch::Receiver<Vec<ImageId>> {
        self.roster.subscribe()
    }

    pub fn subscribe_queue(&self) -> watch::Receiver<Option<QueueSnapshot>> {
        self.queue.subscribe()
    }

    pub fn subscribe_models(&self) -> watch::Receiver<Option<Vec<ModelInfo>>> {
        self.models.subscribe()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<BTreeMap<ErrorCategory, ErrorRecord>> {
        self.errors.subscribe()
    }

    /// Drop an error record the user has acknowledged.
    pub fn dismiss_error(&self, category: ErrorCategory) {
        self.clear_error(category);
    }

    // ---- writers ----

    fn accepts_writes(&self, field: &'static str) -> bool {
        if self.is_torn_down() {
            tracing::debug!(field, "Session torn down, discarding update");
            return false;
        }
        true
    }

    /// Replace the health state, returning the previous one.
    pub(crate) fn set_health(&self, state: HealthState) -> Option<HealthState> {
        if !self.accepts_writes("health") {
            return None;
        }
        Some(self.health.send_replace(state))
    }

    /// Replace the roster with `fetched` and report the delta against the
    /// roster as it stood at the moment of replacement.
    pub(crate) fn reconcile_roster(&self, fetched: Vec<ImageId>) -> Option<Reconciliation> {
        if !self.accepts_writes("roster") {
            return None;
        }
        let mut delta = Reconciliation::default();
        self.roster.send_if_modified(|roster| {
            delta = diff_roster(roster, &fetched);
            if *roster == fetched {
                return false;
            }
            *roster = fetched;
            true
        });
        Some(delta)
    }

    /// Remove one image after the service confirmed its deletion.
    pub(crate) fn remove_image(&self, id: &str) -> bool {
        if !self.accepts_writes("roster") {
            return false;
        }
        self.roster.send_if_modified(|roster| {
            let before = roster.len();
            roster.retain(|image| image != id);
            roster.len() != before
        })
    }

    pub(crate) fn clear_roster(&self) {
        if !self.accepts_writes("roster") {
            return;
        }
        self.roster.send_if_modified(|roster| {
            let changed = !roster.is_empty();
            roster.clear();
            changed
        });
    }

    pub(crate) fn set_queue(&self, snapshot: QueueSnapshot) {
        if !self.accepts_writes("queue") {
            return;
        }
        self.queue.send_replace(Some(snapshot));
    }

    /// Replace the model catalog, returning the previous one.
    pub(crate) fn set_models(&self, models: Vec<ModelInfo>) -> Option<Option<Vec<ModelInfo>>> {
        if !self.accepts_writes("models") {
            return None;
        }
        Some(self.models.send_replace(Some(models)))
    }

    pub(crate) fn record_error(&self, category: ErrorCategory, record: ErrorRecord) {
        if !self.accepts_writes("errors") {
            return;
        }
        self.errors.send_modify(|errors| {
            errors.insert(category, record);
        });
    }

    pub(crate) fn clear_error(&self, category: ErrorCategory) {
        if !self.accepts_writes("errors") {
            return;
        }
        self.errors
            .send_if_modified(|errors| errors.remove(&category).is_some());
    }
}
