//! Image enrichment: attach a photo URL to every dish that lacks one.
//!
//! ## Concurrency
//!
//! Lookups for all dishes run as one `join_all`, but only
//! `enrichment_concurrency` of them may talk to the image provider at once
//! (a `tokio::sync::Semaphore`). This protects the provider's quota; the
//! pipeline has no other parallel stage.
//!
//! ## Deduplication
//!
//! [`PhotoCache`] maps a lookup key to its outcome, misses included, and
//! serialises lookups per key, so a menu listing "Shiro" three times makes at
//! most one external call for it. The cache is an ordinary value: the
//! orchestrator decides how long one lives.
//!
//! Enrichment never fails a job. Provider errors, timeouts and empty results
//! all fall back to the placeholder photo.

use crate::config::DigitizerConfig;
use crate::output::Menu;
use crate::ports::ImageSearch;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Cached outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedPhoto {
    Found(String),
    /// Lookup failed or found nothing; the placeholder applies.
    Missing,
}

/// Per-key photo cache with single-flight lookups.
#[derive(Default)]
pub struct PhotoCache {
    entries: Mutex<HashMap<String, CachedPhoto>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PhotoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<CachedPhoto> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn insert(&self, key: &str, photo: CachedPhoto) {
        self.entries.lock().await.insert(key.to_string(), photo);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Hold the per-key lock; only one lookup per key runs at a time.
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

/// Counters from one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub total_items: usize,
    /// Items that already carried a photo.
    pub skipped: usize,
    pub cache_hits: usize,
    /// External search calls made.
    pub lookups: usize,
    /// Items that received the placeholder.
    pub placeholders: usize,
}

/// Cache key for a query: dishes differing only in case or padding share one.
pub fn lookup_key(query: &str) -> String {
    query.trim().to_lowercase()
}

enum Outcome {
    Hit(CachedPhoto),
    Fetched(CachedPhoto),
}

struct WorkItem {
    tab: usize,
    category: usize,
    item: usize,
    query: Option<String>,
}

pub async fn enrich_menu(
    menu: &mut Menu,
    search: &dyn ImageSearch,
    cache: &PhotoCache,
    config: &DigitizerConfig,
) -> EnrichmentStats {
    let mut stats = EnrichmentStats::default();
    let mut work = Vec::new();

    for (t, tab) in menu.tabs.iter().enumerate() {
        for (c, category) in tab.categories.iter().enumerate() {
            for (i, item) in category.items.iter().enumerate() {
                stats.total_items += 1;
                if item.has_photo() {
                    stats.skipped += 1;
                    continue;
                }
                let query = [&item.name, &item.description]
                    .into_iter()
                    .map(|s| s.trim())
                    .find(|s| !s.is_empty())
                    .map(str::to_string);
                work.push(WorkItem {
                    tab: t,
                    category: c,
                    item: i,
                    query,
                });
            }
        }
    }

    let semaphore = Semaphore::new(config.enrichment_concurrency.max(1));
    let per_call = Duration::from_secs(config.image_search_timeout_secs.max(1));

    let lookups = work.iter().map(|w| {
        let semaphore = &semaphore;
        async move {
            match &w.query {
                Some(query) => Some(lookup(query, search, cache, semaphore, per_call).await),
                None => None,
            }
        }
    });
    let outcomes = join_all(lookups).await;

    for (w, outcome) in work.iter().zip(outcomes) {
        let photo = match outcome {
            Some(Outcome::Hit(p)) => {
                stats.cache_hits += 1;
                p
            }
            Some(Outcome::Fetched(p)) => {
                stats.lookups += 1;
                p
            }
            None => CachedPhoto::Missing,
        };
        let url = match photo {
            CachedPhoto::Found(url) => url,
            CachedPhoto::Missing => {
                stats.placeholders += 1;
                config.placeholder_photo_url.clone()
            }
        };
        menu.tabs[w.tab].categories[w.category].items[w.item].photos = vec![url];
    }

    info!(
        "Enriched {} items: {} skipped, {} lookups, {} cache hits, {} placeholders",
        stats.total_items, stats.skipped, stats.lookups, stats.cache_hits, stats.placeholders
    );
    stats
}

async fn lookup(
    query: &str,
    search: &dyn ImageSearch,
    cache: &PhotoCache,
    semaphore: &Semaphore,
    per_call: Duration,
) -> Outcome {
    let key = lookup_key(query);
    if let Some(hit) = cache.get(&key).await {
        return Outcome::Hit(hit);
    }

    let _key_guard = cache.acquire(&key).await;
    if let Some(hit) = cache.get(&key).await {
        return Outcome::Hit(hit);
    }

    let photo = {
        let Ok(_permit) = semaphore.acquire().await else {
            return Outcome::Fetched(CachedPhoto::Missing);
        };
        match timeout(per_call, search.search(query)).await {
            Ok(Ok(Some(url))) if !url.trim().is_empty() => CachedPhoto::Found(url),
            Ok(Ok(_)) => {
                debug!("No photo found for '{}'", query);
                CachedPhoto::Missing
            }
            Ok(Err(e)) => {
                warn!("Image search failed for '{}': {}", query, e);
                CachedPhoto::Missing
            }
            Err(_) => {
                warn!("Image search for '{}' timed out after {:?}", query, per_call);
                CachedPhoto::Missing
            }
        }
    };

    cache.insert(&key, photo.clone()).await;
    Outcome::Fetched(photo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortError;
    use crate::output::{Category, MenuItem, Tab};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSearch {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay_ms: u64,
    }

    #[async_trait]
    impl ImageSearch for FakeSearch {
        async fn search(&self, query: &str) -> Result<Option<String>, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match query {
                "Kitfo" => Err(PortError::Request("503 from image provider".into())),
                "Mystery" => Ok(None),
                q => Ok(Some(format!("https://img.test/{}", q.replace(' ', "-")))),
            }
        }
    }

    fn item(name: &str) -> MenuItem {
        MenuItem {
            name: name.into(),
            ..Default::default()
        }
    }

    fn menu_of(items: Vec<MenuItem>) -> Menu {
        Menu {
            tabs: vec![Tab {
                name: "General".into(),
                categories: vec![Category {
                    name: "General".into(),
                    items,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn photos(menu: &Menu) -> Vec<String> {
        menu.items().map(|(_, _, i)| i.photos.join("|")).collect()
    }

    #[tokio::test]
    async fn duplicate_names_search_once() {
        let search = FakeSearch::default();
        let cache = PhotoCache::new();
        let mut menu = menu_of(vec![item("Shiro"), item("Shiro"), item("shiro ")]);
        let stats = enrich_menu(&mut menu, &search, &cache, &DigitizerConfig::default()).await;

        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.cache_hits, 2);
        assert!(photos(&menu).iter().all(|p| !p.is_empty()));
    }

    #[tokio::test]
    async fn failures_get_placeholder() {
        let search = FakeSearch::default();
        let cache = PhotoCache::new();
        let config = DigitizerConfig::default();
        let mut menu = menu_of(vec![item("Kitfo"), item("Mystery"), item("Doro Wot")]);
        let stats = enrich_menu(&mut menu, &search, &cache, &config).await;

        let p = photos(&menu);
        assert_eq!(p[0], config.placeholder_photo_url);
        assert_eq!(p[1], config.placeholder_photo_url);
        assert_eq!(p[2], "https://img.test/Doro-Wot");
        assert_eq!(stats.placeholders, 2);
        assert_eq!(cache.get("kitfo").await, Some(CachedPhoto::Missing));
    }

    #[tokio::test]
    async fn slow_search_times_out_to_placeholder() {
        let search = FakeSearch {
            delay_ms: 30_000,
            ..Default::default()
        };
        let cache = PhotoCache::new();
        let config = DigitizerConfig::builder()
            .image_search_timeout_secs(1)
            .build()
            .unwrap();
        let mut menu = menu_of(vec![item("Tibs")]);

        let started = std::time::Instant::now();
        let stats = enrich_menu(&mut menu, &search, &cache, &config).await;

        assert!(started.elapsed() < Duration::from_secs(10), "lookup was not cut off");
        assert_eq!(photos(&menu), vec![config.placeholder_photo_url.clone()]);
        assert_eq!(stats.placeholders, 1);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn existing_photos_and_empty_queries() {
        let search = FakeSearch::default();
        let cache = PhotoCache::new();
        let config = DigitizerConfig::default();
        let mut with_photo = item("Tibs");
        with_photo.photos = vec!["https://own.test/tibs.jpg".into()];
        let described = MenuItem {
            description: "Spicy lentils".into(),
            ..Default::default()
        };
        let mut menu = menu_of(vec![with_photo, MenuItem::default(), described]);
        let stats = enrich_menu(&mut menu, &search, &cache, &config).await;

        let p = photos(&menu);
        assert_eq!(p[0], "https://own.test/tibs.jpg");
        assert_eq!(p[1], config.placeholder_photo_url);
        assert_eq!(p[2], "https://img.test/Spicy-lentils");
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.total_items, 3);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let search = FakeSearch {
            delay_ms: 20,
            ..Default::default()
        };
        let cache = PhotoCache::new();
        let config = DigitizerConfig::builder().enrichment_concurrency(2).build().unwrap();
        let items = (0..8).map(|n| item(&format!("Dish {n}"))).collect();
        let mut menu = menu_of(items);
        enrich_menu(&mut menu, &search, &cache, &config).await;

        assert_eq!(search.calls.load(Ordering::SeqCst), 8);
        assert!(search.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cache_is_reused_across_menus() {
        let search = FakeSearch::default();
        let cache = PhotoCache::new();
        let config = DigitizerConfig::default();
        enrich_menu(&mut menu_of(vec![item("Shiro")]), &search, &cache, &config).await;
        let stats = enrich_menu(&mut menu_of(vec![item("Shiro")]), &search, &cache, &config).await;
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(cache.len().await, 1);
    }
}
