//! Time-bounded cache of listing result sets, keyed by owner and filter
//! fingerprint

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tracing::debug;

use crate::config::InventoryOptions;
use crate::inventory::filters::{escape, ListingFilters};
use crate::inventory::model::Listing;

/// A result set as it was last fetched; replaced wholesale, never merged
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub listings: Arc<Vec<Listing>>,
    pub fetched_at: DateTime<Utc>,
}

/// Shared handle; clones see the same entries.
///
/// Every key carries the owning user id, so one user's rows are never a hit
/// for another. Entries older than the TTL read as misses and are dropped lazily. At
/// capacity the least recently used key goes first.
#[derive(Clone)]
pub struct ListingCache {
    entries: Cache<String, CacheEntry>,
    max_limit: u32,
}

impl ListingCache {
    pub fn new(options: &InventoryOptions) -> Self {
        let entries = Cache::builder()
            .max_capacity(options.cache_capacity)
            .time_to_live(options.cache_ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            entries,
            max_limit: options.max_limit,
        }
    }

    pub fn key(&self, owner: &str, filters: &ListingFilters) -> String {
        format!("owner={}|{}", escape(owner), filters.fingerprint(self.max_limit))
    }

    pub async fn get(&self, owner: &str, filters: &ListingFilters) -> Option<CacheEntry> {
        let key = self.key(owner, filters);
        let entry = self.entries.get(&key).await;
        debug!(%key, hit = entry.is_some(), "listing cache lookup");
        entry
    }

    pub async fn set(
        &self,
        owner: &str,
        filters: &ListingFilters,
        listings: Vec<Listing>,
    ) -> CacheEntry {
        let entry = CacheEntry {
            listings: Arc::new(listings),
            fetched_at: Utc::now(),
        };
        self.entries
            .insert(self.key(owner, filters), entry.clone())
            .await;
        entry
    }

    pub async fn invalidate(&self, owner: &str, filters: &ListingFilters) {
        self.entries.invalidate(&self.key(owner, filters)).await;
    }

    pub fn invalidate_all(&self) {
        debug!("listing cache cleared");
        self.entries.invalidate_all();
    }

    /// Approximate; pending evictions may not be reflected yet
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Apply pending evictions and expirations now
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}

impl fmt::Debug for ListingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingCache")
            .field("entries", &self.entries.entry_count())
            .field("max_limit", &self.max_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::model::ListingStatus;
    use serde_json::json;
    use std::time::Duration;

    const OWNER: &str = "user-1";

    fn listing(id: &str) -> Listing {
        Listing::from_row(json!({ "id": id, "user_id": "u", "title": "Item", "price": 10 })).unwrap()
    }

    fn cache(ttl: Duration, capacity: u64) -> ListingCache {
        ListingCache::new(
            &InventoryOptions::default()
                .with_cache_ttl(ttl)
                .with_cache_capacity(capacity),
        )
    }

    #[tokio::test]
    async fn set_then_get_returns_same_rows() {
        let cache = cache(Duration::from_secs(60), 16);
        let filters = ListingFilters::new(50).with_search("drill");

        assert!(cache.get(OWNER, &filters).await.is_none());
        let stored = cache.set(OWNER, &filters, vec![listing("1"), listing("2")]).await;

        let hit = cache.get(OWNER, &filters).await.unwrap();
        assert_eq!(hit, stored);
        assert_eq!(hit.listings.len(), 2);
    }

    #[tokio::test]
    async fn logically_identical_filters_hit_the_same_entry() {
        let cache = cache(Duration::from_secs(60), 16);
        cache
            .set(OWNER, &ListingFilters::new(500).with_search("Drill"), vec![listing("1")])
            .await;

        let same = ListingFilters::new(100).with_search(" drill ");
        assert!(cache.get(OWNER, &same).await.is_some());

        let other = ListingFilters::new(100).with_status(ListingStatus::Sold);
        assert!(cache.get(OWNER, &other).await.is_none());
    }

    #[tokio::test]
    async fn set_replaces_the_entry_wholesale() {
        let cache = cache(Duration::from_secs(60), 16);
        let filters = ListingFilters::default();
        cache.set(OWNER, &filters, vec![listing("1"), listing("2")]).await;
        cache.set(OWNER, &filters, vec![listing("3")]).await;

        let hit = cache.get(OWNER, &filters).await.unwrap();
        assert_eq!(hit.listings.len(), 1);
        assert_eq!(hit.listings[0].id, "3");
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = cache(Duration::from_millis(100), 16);
        let filters = ListingFilters::default();
        cache.set(OWNER, &filters, vec![listing("1")]).await;
        assert!(cache.get(OWNER, &filters).await.is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.get(OWNER, &filters).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_one_or_all() {
        let cache = cache(Duration::from_secs(60), 16);
        let a = ListingFilters::new(10);
        let b = ListingFilters::new(20);
        cache.set(OWNER, &a, vec![listing("1")]).await;
        cache.set(OWNER, &b, vec![listing("2")]).await;

        cache.invalidate(OWNER, &a).await;
        assert!(cache.get(OWNER, &a).await.is_none());
        assert!(cache.get(OWNER, &b).await.is_some());

        cache.invalidate_all();
        assert!(cache.get(OWNER, &b).await.is_none());
    }

    #[tokio::test]
    async fn keys_are_scoped_to_the_owner() {
        let cache = cache(Duration::from_secs(60), 16);
        let filters = ListingFilters::default();
        cache.set("user-1", &filters, vec![listing("1")]).await;

        assert!(cache.get("user-1", &filters).await.is_some());
        assert!(cache.get("user-2", &filters).await.is_none());
        // an owner id cannot spoof the filter part of another key
        assert!(cache.get("user-1|search=", &filters).await.is_none());
    }

    #[tokio::test]
    async fn capacity_keeps_the_newest_entry() {
        let cache = cache(Duration::from_secs(60), 2);
        let (a, b, c) = (
            ListingFilters::new(1),
            ListingFilters::new(2),
            ListingFilters::new(3),
        );
        cache.set(OWNER, &a, vec![listing("a")]).await;
        cache.set(OWNER, &b, vec![listing("b")]).await;
        for _ in 0..5 {
            assert!(cache.get(OWNER, &a).await.is_some());
            assert!(cache.get(OWNER, &b).await.is_some());
        }
        cache.run_pending_tasks().await;

        // frequently read keys must not keep a fresh result set out
        cache.set(OWNER, &c, vec![listing("c")]).await;
        cache.run_pending_tasks().await;

        let newest = cache.get(OWNER, &c).await.unwrap();
        assert_eq!(newest.listings[0].id, "c");
        assert!(cache.entry_count() <= 2);
    }
}
