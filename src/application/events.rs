//! Explicit content-change notifications.
//!
//! The content service publishes a `ContentChange` after every successful
//! write. Subscribers (the group repository's cache, for one) register on the
//! `ContentNotifier` they are wired to at startup.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

const SOURCE: &str = "pagebits::application::events";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChange {
    GroupCreated {
        group_id: Uuid,
        slug: String,
    },
    /// `previous_slug` is set when the slug itself changed.
    GroupUpdated {
        group_id: Uuid,
        slug: String,
        previous_slug: Option<String>,
    },
    GroupDeleted {
        group_id: Uuid,
        slug: String,
    },
    BitCreated {
        bit_id: Uuid,
        group_slug: String,
    },
    BitUpdated {
        bit_id: Uuid,
        group_slug: String,
    },
    BitDeleted {
        bit_id: Uuid,
        group_slug: String,
    },
    BitDataUpdated {
        bit_id: Uuid,
        group_slug: String,
    },
    /// A content form submission rewrote several bits at once.
    ContentSaved {
        group_id: Uuid,
        group_slug: String,
    },
}

impl ContentChange {
    /// Slugs of the groups whose loaded form is stale after this change.
    pub fn affected_group_slugs(&self) -> Vec<&str> {
        match self {
            ContentChange::GroupCreated { slug, .. } | ContentChange::GroupDeleted { slug, .. } => {
                vec![slug.as_str()]
            }
            ContentChange::GroupUpdated {
                slug,
                previous_slug,
                ..
            } => match previous_slug {
                Some(previous) if previous != slug => vec![previous.as_str(), slug.as_str()],
                _ => vec![slug.as_str()],
            },
            ContentChange::BitCreated { group_slug, .. }
            | ContentChange::BitUpdated { group_slug, .. }
            | ContentChange::BitDeleted { group_slug, .. }
            | ContentChange::BitDataUpdated { group_slug, .. }
            | ContentChange::ContentSaved { group_slug, .. } => vec![group_slug.as_str()],
        }
    }
}

#[async_trait]
pub trait ContentChangeListener: Send + Sync {
    async fn on_change(&self, change: &ContentChange);
}

#[derive(Clone, Default)]
pub struct ContentNotifier {
    listeners: Arc<RwLock<Vec<Arc<dyn ContentChangeListener>>>>,
}

impl ContentNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ContentChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(recover_poisoned)
            .push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Deliver `change` to every subscriber in subscription order.
    pub async fn notify(&self, change: ContentChange) {
        let listeners = self.snapshot();
        debug!(
            target = SOURCE,
            change = ?change,
            listeners = listeners.len(),
            "publishing content change"
        );
        for listener in listeners {
            listener.on_change(&change).await;
        }
    }

    /// Copy of the listener list, so no lock is held across `.await`.
    fn snapshot(&self) -> Vec<Arc<dyn ContentChangeListener>> {
        self.listeners
            .read()
            .unwrap_or_else(recover_poisoned)
            .clone()
    }
}

/// Poisoning is logged and otherwise ignored.
fn recover_poisoned<G>(poisoned: PoisonError<G>) -> G {
    warn!(target = SOURCE, "listener registry lock was poisoned; recovering");
    poisoned.into_inner()
}
