//! Image roster reconciliation.
//!
//! Each cycle fetches the full image list, replaces the local roster
//! with it, and announces additions with a single aggregated
//! notification. Removals found this way (images deleted elsewhere) are
//! applied without a notification; deletions made from this client are
//! announced by the mutation coordinator instead.

use std::collections::HashSet;
use std::sync::Arc;

use flux_core::types::ImageId;
use flux_gateway::{Gateway, GatewayError};

use crate::notify::Notifier;
use crate::session::SessionState;

/// Delta between the previous roster and a freshly fetched one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Identifiers present in the fetched list but not locally, in
    /// fetched order.
    pub added: Vec<ImageId>,
    /// Identifiers that disappeared, in previous roster order.
    pub removed: Vec<ImageId>,
}

/// Compute which identifiers `fetched` adds to and removes from
/// `current`.
pub fn diff_roster(current: &[ImageId], fetched: &[ImageId]) -> Reconciliation {
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let fetched_set: HashSet<&str> = fetched.iter().map(String::as_str).collect();

    Reconciliation {
        added: fetched
            .iter()
            .filter(|id| !current_set.contains(id.as_str()))
            .cloned()
            .collect(),
        removed: current
            .iter()
            .filter(|id| !fetched_set.contains(id.as_str()))
            .cloned()
            .collect(),
    }
}

/// Collapse repeated identifiers to their first occurrence.
pub fn dedupe(images: Vec<ImageId>) -> Vec<ImageId> {
    let mut seen = HashSet::with_capacity(images.len());
    images
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Notification body for `count` new images.
pub fn new_images_message(count: usize) -> String {
    if count == 1 {
        "1 new image".to_string()
    } else {
        format!("{count} new images")
    }
}

pub struct RosterSynchronizer {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionState>,
    notifier: Arc<Notifier>,
}

impl RosterSynchronizer {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        session: Arc<SessionState>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            gateway,
            session,
            notifier,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// On fetch failure the roster is left untouched and the error is
    /// only logged; the health monitor is what tells the user the
    /// service is down.
    pub async fn reconcile(&self) -> Result<Reconciliation, GatewayError> {
        let fetched = match self.gateway.list_images().await {
            Ok(images) => dedupe(images),
            Err(e) => {
                tracing::warn!(error = %e, "Image roster fetch failed, keeping current roster");
                return Err(e);
            }
        };

        let total = fetched.len();
        let Some(delta) = self.session.reconcile_roster(fetched) else {
            return Ok(Reconciliation::default());
        };

        if !delta.removed.is_empty() {
            tracing::debug!(removed = delta.removed.len(), "Images removed outside this client");
        }

        if !delta.added.is_empty() {
            tracing::info!(added = delta.added.len(), total, "New images in roster");
            self.notifier
                .info("New images available", new_images_message(delta.added.len()));
        }

        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ImageId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn additions_keep_fetched_order() {
        let delta = diff_roster(&ids(&["a", "b"]), &ids(&["c", "a", "b", "d"]));
        assert_eq!(delta.added, ids(&["c", "d"]));
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn subset_fetch_reports_only_removals() {
        let delta = diff_roster(&ids(&["a", "b", "c"]), &ids(&["a", "c"]));
        assert!(delta.added.is_empty());
        assert_eq!(delta.removed, ids(&["b"]));
    }

    #[test]
    fn identical_lists_have_no_delta() {
        let delta = diff_roster(&ids(&["a", "b"]), &ids(&["b", "a"]));
        assert_eq!(delta, Reconciliation::default());
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        assert_eq!(dedupe(ids(&["a", "b", "a", "c", "b"])), ids(&["a", "b", "c"]));
    }

    #[test]
    fn message_pluralizes() {
        assert_eq!(new_images_message(1), "1 new image");
        assert_eq!(new_images_message(4), "4 new images");
    }
}
