//! Cache-aside access to loaded groups.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    application::{
        events::{ContentChange, ContentChangeListener},
        repos::{GroupsRepo, RepoError},
    },
    cache::{CacheStore, group_key},
    config::CacheSettings,
    domain::entities::LoadedGroup,
};

const SOURCE: &str = "pagebits::application::groups";

pub const DEFAULT_KEY_PREFIX: &str = "pagebits";
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("group `{slug}` not found")]
    NotFound { slug: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct GroupCacheConfig {
    pub key_prefix: String,
    pub ttl: Duration,
}

impl Default for GroupCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: DEFAULT_TTL,
        }
    }
}

impl From<&CacheSettings> for GroupCacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            key_prefix: settings.key_prefix.clone(),
            ttl: settings.ttl,
        }
    }
}

/// Owns the cache lifecycle for loaded groups.
///
/// Reads go through the cache; invalidation happens when a `ContentChange`
/// for the owning group is delivered to [`ContentChangeListener::on_change`].
///
/// Every invalidation bumps `epoch`. A miss only keeps what it loaded if no
/// invalidation ran while it was reading.
pub struct GroupRepository {
    reader: Arc<dyn GroupsRepo>,
    cache: Arc<dyn CacheStore<Arc<LoadedGroup>>>,
    config: GroupCacheConfig,
    epoch: AtomicU64,
}

impl GroupRepository {
    pub fn new(
        reader: Arc<dyn GroupsRepo>,
        cache: Arc<dyn CacheStore<Arc<LoadedGroup>>>,
        config: GroupCacheConfig,
    ) -> Self {
        Self {
            reader,
            cache,
            config,
            epoch: AtomicU64::new(0),
        }
    }

    fn cache_key(&self, slug: &str) -> String {
        group_key(&self.config.key_prefix, slug)
    }

    /// Load a group with its bits and data, serving from cache when possible.
    pub async fn get_group(&self, slug: &str) -> Result<Arc<LoadedGroup>, GroupError> {
        let key = self.cache_key(slug);

        if let Some(group) = self.cache.get(&key).await {
            counter!("pagebits_group_cache_hit_total").increment(1);
            debug!(target = SOURCE, slug, "group cache hit");
            return Ok(group);
        }

        counter!("pagebits_group_cache_miss_total").increment(1);
        debug!(target = SOURCE, slug, "group cache miss");

        let epoch = self.epoch.load(Ordering::SeqCst);
        let group = self
            .reader
            .load_group(slug)
            .await?
            .ok_or_else(|| GroupError::NotFound {
                slug: slug.to_string(),
            })?;

        let group = Arc::new(group);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(target = SOURCE, slug, "invalidated during load; not cached");
            return Ok(group);
        }
        self.cache
            .set(&key, Arc::clone(&group), self.config.ttl)
            .await;
        // An invalidation that landed between the check and the set.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            self.cache.delete(&key).await;
        }
        Ok(group)
    }

    pub async fn invalidate(&self, slug: &str) {
        counter!("pagebits_group_cache_invalidate_total").increment(1);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.delete(&self.cache_key(slug)).await;
        debug!(target = SOURCE, slug, "group cache entry invalidated");
    }

    pub async fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.clear().await;
        info!(target = SOURCE, "group cache cleared");
    }
}

#[async_trait]
impl ContentChangeListener for GroupRepository {
    async fn on_change(&self, change: &ContentChange) {
        for slug in change.affected_group_slugs() {
            self.invalidate(slug).await;
        }
    }
}
