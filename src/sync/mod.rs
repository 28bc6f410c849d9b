//! Catalog synchronization.
//!
//! [`Synchronizer`] is the single owner of the in-memory catalog, the
//! favorite list and the sync status. Fetches run on spawned tasks and
//! report back over a channel; the owner applies the result. Every change
//! is published as an immutable [`Snapshot`] on a watch channel.
//!
//! [`service::SyncService`] wraps a synchronizer in an event loop driven
//! by [`service::SyncHandle`] commands and key-value change notifications.

pub mod service;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, watch};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::FetchError;
use crate::favorites::Favorites;
use crate::fetcher::{CatalogFetcher, FetchReport, RetryPolicy};
use crate::recent::RecentSearches;
use crate::recipe::Recipe;
use crate::remote::{KvChange, FAVORITES_KEY};
use crate::status::{StatusMessage, STATUS_DISMISS_AFTER};

pub use service::{SyncHandle, SyncService};
pub use state::{Snapshot, SyncPhase, SyncState};

/// Result of a background fetch, delivered back to the owner.
pub type FetchOutcome = std::result::Result<FetchReport, FetchError>;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retry: RetryPolicy,
    /// Prune favorites even when some records were skipped during the fetch.
    pub prune_on_partial_fetch: bool,
    pub status_dismiss_after: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            prune_on_partial_fetch: false,
            status_dismiss_after: STATUS_DISMISS_AFTER,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: config.sync.max_attempts,
                delay: Duration::from_secs(config.sync.retry_delay_secs),
            },
            prune_on_partial_fetch: config.sync.prune_on_partial_fetch,
            status_dismiss_after: Duration::from_secs(config.status.dismiss_after_secs),
        }
    }
}

pub struct Synchronizer {
    fetcher: CatalogFetcher,
    cache: CacheStore,
    favorites: Favorites,
    recent: RecentSearches,
    options: SyncOptions,

    catalog: Arc<Vec<Recipe>>,
    /// Whether `catalog` may be used to prune favorites. False while
    /// nothing is known, or after a partial fetch unless configured otherwise.
    prune_against_catalog: bool,
    state: SyncState,
    status: Option<StatusMessage>,

    snapshots: watch::Sender<Arc<Snapshot>>,
}

impl Synchronizer {
    /// Build the synchronizer and show whatever the local cache holds.
    pub fn new(
        fetcher: CatalogFetcher,
        cache: CacheStore,
        favorites: Favorites,
        recent: RecentSearches,
        options: SyncOptions,
    ) -> Self {
        let fetcher = fetcher.with_policy(options.retry);
        let (snapshots, _) = watch::channel(Arc::new(Snapshot::default()));
        let mut sync = Self {
            fetcher,
            cache,
            favorites,
            recent,
            options,
            catalog: Arc::new(Vec::new()),
            prune_against_catalog: false,
            state: SyncState::default(),
            status: None,
            snapshots,
        };

        if let Some(cached) = sync.cache.load() {
            tracing::info!("Showing {} cached recipes", cached.len());
            // An empty snapshot says nothing about which favorites exist
            sync.prune_against_catalog = !cached.is_empty();
            sync.catalog = Arc::new(cached);
            sync.state.phase = SyncPhase::Synced;
        }
        sync.publish();
        sync
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn catalog(&self) -> &Arc<Vec<Recipe>> {
        &self.catalog
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn favorites(&self) -> &[i64] {
        self.favorites.ids()
    }

    pub fn recent_searches(&self) -> Vec<String> {
        self.recent.list()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    // ── Sync ────────────────────────────────────────────────────────

    /// Enter `Syncing`. Returns false if a fetch is already in flight.
    fn begin_sync(&mut self) -> bool {
        if self.state.is_syncing() {
            tracing::debug!("Sync already in progress, ignoring request");
            return false;
        }
        self.state.phase = SyncPhase::Syncing;
        self.publish();
        true
    }

    /// Start a background fetch whose outcome is sent to `done`.
    /// Returns false (and does nothing) if a fetch is already in flight.
    pub fn request_sync(&mut self, done: &mpsc::UnboundedSender<FetchOutcome>) -> bool {
        if !self.begin_sync() {
            return false;
        }
        let fetcher = self.fetcher.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let outcome = fetcher.fetch_catalog().await;
            if done.send(outcome).is_err() {
                tracing::debug!("Sync owner went away before the fetch finished");
            }
        });
        true
    }

    /// Fetch in the current task and apply the outcome.
    /// `Ok(false)` means another fetch was already in flight.
    pub async fn sync_now(&mut self) -> std::result::Result<bool, FetchError> {
        if !self.begin_sync() {
            return Ok(false);
        }
        let outcome = self.fetcher.fetch_catalog().await;
        self.complete_sync(outcome).await.map(|_| true)
    }

    /// Apply a fetch outcome on the owner.
    pub async fn complete_sync(&mut self, outcome: FetchOutcome) -> std::result::Result<(), FetchError> {
        match outcome {
            Ok(report) => {
                let complete = report.is_complete();
                self.catalog = Arc::new(report.recipes);
                if let Err(e) = self.cache.save(&self.catalog) {
                    tracing::warn!("Could not save recipe cache: {:#}", e);
                }
                self.state.last_synced = Some(Utc::now());
                self.state.last_error = None;

                self.prune_against_catalog = complete || self.options.prune_on_partial_fetch;
                if !self.prune_against_catalog {
                    tracing::warn!(
                        "{} record(s) skipped; keeping favorites unpruned",
                        report.skipped
                    );
                }
                self.reconcile_favorites().await;

                self.state.phase = SyncPhase::Synced;
                self.publish();
                Ok(())
            }
            Err(err) => {
                tracing::error!("Sync failed: {}", err);
                self.state.last_error = Some(err.clone());
                self.state.phase = SyncPhase::Failed;
                self.status = Some(StatusMessage::error(err.user_message()));
                self.publish();
                Err(err)
            }
        }
    }

    // ── Favorites ───────────────────────────────────────────────────

    /// Filter stored favorites against the catalog. When the catalog cannot
    /// be trusted for pruning, the stored list is adopted as-is.
    async fn reconcile_favorites(&mut self) {
        let result = if self.prune_against_catalog {
            self.favorites.reconcile_with(&self.catalog).await.map(|_| ())
        } else {
            self.favorites.refresh().await.map(|_| ())
        };
        if let Err(e) = result {
            tracing::warn!("Favorites reconciliation failed: {:#}", e);
        }
    }

    /// Pull favorites from the key-value store, validating them against the
    /// current catalog. Used at startup.
    pub async fn load_favorites(&mut self) {
        self.reconcile_favorites().await;
        self.publish();
    }

    /// React to an external key-value change notification.
    pub async fn handle_kv_change(&mut self, change: &KvChange) {
        if !change.touches(FAVORITES_KEY) {
            return;
        }
        tracing::debug!("Favorites changed remotely ({:?})", change.reason);
        self.reconcile_favorites().await;
        self.publish();
    }

    pub async fn toggle_favorite(&mut self, id: i64) -> Result<bool> {
        let result = self.favorites.toggle(id).await;
        if let Err(e) = &result {
            tracing::warn!("Could not save favorite {}: {:#}", id, e);
            self.status = Some(StatusMessage::error("Couldn't save favorites."));
        }
        self.publish();
        result
    }

    // ── Recent searches ─────────────────────────────────────────────

    pub fn record_search(&mut self, name: &str) -> Result<()> {
        self.recent.record(name)?;
        self.publish();
        Ok(())
    }

    pub fn remove_search(&mut self, name: &str) -> Result<()> {
        self.recent.remove(name)?;
        self.publish();
        Ok(())
    }

    pub fn clear_searches(&mut self) -> Result<()> {
        self.recent.clear_all()?;
        self.publish();
        Ok(())
    }

    // ── Clearing ────────────────────────────────────────────────────

    /// Delete the local snapshot and empty the in-memory catalog.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.catalog = Arc::new(Vec::new());
        self.prune_against_catalog = false;
        let result = self.cache.clear();
        if result.is_ok() {
            tracing::info!("Recipe cache cleared");
        }
        self.publish();
        result
    }

    /// Wipe the cache, catalog, favorites (locally and remotely) and recent
    /// searches. Every step runs even if an earlier one fails.
    pub async fn clear_all_data(&mut self) -> Result<()> {
        let mut failures: Vec<String> = Vec::new();

        self.catalog = Arc::new(Vec::new());
        self.prune_against_catalog = false;
        if let Err(e) = self.cache.clear() {
            failures.push(format!("cache: {e:#}"));
        }
        if let Err(e) = self.favorites.clear().await {
            failures.push(format!("favorites: {e:#}"));
        }
        if let Err(e) = self.recent.clear_all() {
            failures.push(format!("recent searches: {e:#}"));
        }

        self.publish();
        if failures.is_empty() {
            tracing::info!("All local and synced data cleared");
            Ok(())
        } else {
            tracing::error!("Clearing data partially failed: {}", failures.join("; "));
            anyhow::bail!("failed to clear {}", failures.join("; "))
        }
    }

    // ── Status ──────────────────────────────────────────────────────

    /// Drop the status message once it has been shown long enough.
    /// Returns true if one was dismissed.
    pub fn clear_expired_status(&mut self) -> bool {
        let expired = self
            .status
            .as_ref()
            .is_some_and(|msg| msg.is_expired(self.options.status_dismiss_after));
        if expired {
            self.status = None;
            self.publish();
        }
        expired
    }

    fn publish(&self) {
        let snapshot = Snapshot {
            catalog: Arc::clone(&self.catalog),
            favorites: self.favorites.ids().to_vec(),
            recent_searches: self.recent.list(),
            sync: self.state.clone(),
            status: self.status.clone(),
        };
        self.snapshots.send_replace(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchErrorKind, RemoteError, RemoteErrorCode};
    use crate::preferences::Preferences;
    use crate::remote::memory::{MemoryDatabase, MemoryKeyValueStore};
    use crate::remote::{ChangeReason, RemoteRecord};
    use tempfile::TempDir;

    fn recipe_record(id: i64, name: &str) -> RemoteRecord {
        RemoteRecord::new(id.to_string())
            .with_field("name", name)
            .with_field("image", format!("{id}.png"))
            .with_field("ingredients", vec!["Planks"])
            .with_field("output", 1i64)
            .with_field("category", "Blocks")
    }

    struct Fixture {
        dir: TempDir,
        db: Arc<MemoryDatabase>,
        kv: Arc<MemoryKeyValueStore>,
    }

    impl Fixture {
        fn new(db: MemoryDatabase, favorites: Vec<i64>) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                db: Arc::new(db),
                kv: Arc::new(MemoryKeyValueStore::new().with_ids(FAVORITES_KEY, favorites)),
            }
        }

        fn cache(&self) -> CacheStore {
            CacheStore::in_dir(self.dir.path(), "recipes.json")
        }

        fn synchronizer(&self) -> Synchronizer {
            self.synchronizer_with(SyncOptions::default())
        }

        fn synchronizer_with(&self, options: SyncOptions) -> Synchronizer {
            Synchronizer::new(
                CatalogFetcher::new(self.db.clone(), "Recipe"),
                self.cache(),
                Favorites::new(self.kv.clone()),
                RecentSearches::new(Preferences::in_dir(self.dir.path())),
                options,
            )
        }
    }

    fn three_recipes() -> MemoryDatabase {
        MemoryDatabase::paged(vec![
            vec![recipe_record(1, "Torch"), recipe_record(2, "Chest")],
            vec![recipe_record(3, "Anvil")],
        ])
    }

    #[tokio::test]
    async fn test_starts_idle_without_cache() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        let sync = fixture.synchronizer();

        assert_eq!(sync.state().phase, SyncPhase::Idle);
        assert!(sync.catalog().is_empty());
        assert_eq!(fixture.db.query_count(), 0);
    }

    #[tokio::test]
    async fn test_starts_synced_from_cache() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        {
            let mut sync = fixture.synchronizer();
            sync.sync_now().await.unwrap();
        }

        let sync = fixture.synchronizer();
        assert_eq!(sync.state().phase, SyncPhase::Synced);
        assert!(sync.state().last_synced.is_none());
        assert_eq!(sync.catalog().len(), 3);
        assert_eq!(sync.snapshot().catalog.len(), 3);
    }

    #[tokio::test]
    async fn test_successful_sync_replaces_catalog_and_saves_cache() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        let mut sync = fixture.synchronizer();

        assert!(sync.sync_now().await.unwrap());

        let names: Vec<&str> = sync.catalog().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Anvil", "Chest", "Torch"]);
        assert_eq!(sync.state().phase, SyncPhase::Synced);
        assert!(sync.state().last_synced.is_some());
        assert_eq!(fixture.cache().load().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_prunes_stale_favorites() {
        let fixture = Fixture::new(three_recipes(), vec![5, 2, 9, 1]);
        let mut sync = fixture.synchronizer();

        sync.sync_now().await.unwrap();

        assert_eq!(sync.favorites(), &[2, 1]);
        assert_eq!(fixture.kv.stored(FAVORITES_KEY), vec![2, 1]);
        assert_eq!(sync.snapshot().favorites, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_partial_fetch_keeps_favorites_by_default() {
        let mut broken = recipe_record(4, "Bed");
        broken.fields.remove("category");
        let db = MemoryDatabase::paged(vec![vec![recipe_record(1, "Torch"), broken]]);
        let fixture = Fixture::new(db, vec![4, 1]);
        let mut sync = fixture.synchronizer();

        sync.sync_now().await.unwrap();

        assert_eq!(sync.catalog().len(), 1);
        assert_eq!(sync.favorites(), &[4, 1]);
        assert_eq!(fixture.kv.write_count(), 0);
    }

    fn partial_catalog() -> MemoryDatabase {
        let mut broken = recipe_record(4, "Bed");
        broken.fields.remove("category");
        MemoryDatabase::paged(vec![vec![recipe_record(1, "Torch"), broken]])
    }

    fn initial_sync_change() -> KvChange {
        KvChange {
            reason: ChangeReason::InitialSync,
            keys: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_partial_fetch_survives_later_change_notifications() {
        let fixture = Fixture::new(partial_catalog(), vec![4, 1]);
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();

        sync.handle_kv_change(&initial_sync_change()).await;
        sync.load_favorites().await;

        assert_eq!(sync.favorites(), &[4, 1]);
        assert_eq!(fixture.kv.stored(FAVORITES_KEY), vec![4, 1]);
        assert_eq!(fixture.kv.write_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_fetch_prunes_when_configured() {
        let fixture = Fixture::new(partial_catalog(), vec![4, 1]);
        let mut sync = fixture.synchronizer_with(SyncOptions {
            prune_on_partial_fetch: true,
            ..SyncOptions::default()
        });

        sync.sync_now().await.unwrap();

        assert_eq!(sync.favorites(), &[1]);
        assert_eq!(fixture.kv.stored(FAVORITES_KEY), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_remote_catalog_prunes_every_favorite() {
        let fixture = Fixture::new(MemoryDatabase::paged(Vec::new()), vec![1, 2]);
        let mut sync = fixture.synchronizer();

        sync.sync_now().await.unwrap();
        assert!(sync.favorites().is_empty());
        assert!(fixture.kv.stored(FAVORITES_KEY).is_empty());

        // Later notifications keep validating against the empty catalog
        fixture.kv.external_change(FAVORITES_KEY, vec![7]);
        sync.handle_kv_change(&initial_sync_change()).await;
        assert!(sync.favorites().is_empty());
        assert!(fixture.kv.stored(FAVORITES_KEY).is_empty());
    }

    #[tokio::test]
    async fn test_change_after_clear_cache_does_not_prune() {
        let fixture = Fixture::new(three_recipes(), vec![1]);
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();
        sync.clear_cache().unwrap();

        fixture.kv.external_change(FAVORITES_KEY, vec![1, 42]);
        sync.handle_kv_change(&initial_sync_change()).await;

        assert_eq!(sync.favorites(), &[1, 42]);
    }

    #[tokio::test]
    async fn test_cache_write_failure_does_not_fail_sync() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        std::fs::create_dir(fixture.dir.path().join(".recipes.json.tmp")).unwrap();
        let mut sync = fixture.synchronizer();

        assert!(sync.sync_now().await.unwrap());

        assert_eq!(sync.state().phase, SyncPhase::Synced);
        assert!(sync.state().last_error.is_none());
        assert_eq!(sync.catalog().len(), 3);
        assert!(!fixture.cache().path().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sync_keeps_catalog_and_reports() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();

        fixture.db.fail_always(Some(RemoteError::new(
            RemoteErrorCode::NetworkFailure,
            "connection reset",
        )));
        let err = sync.sync_now().await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::Network);
        assert_eq!(sync.state().phase, SyncPhase::Failed);
        assert_eq!(sync.catalog().len(), 3);
        assert!(sync.state().last_error.is_some());
        let status = sync.status().unwrap();
        assert!(status.is_error);
        assert_eq!(status.message, FetchErrorKind::Network.user_message());

        // Recovery clears the error
        fixture.db.fail_always(None);
        sync.sync_now().await.unwrap();
        assert!(sync.state().last_error.is_none());
        assert_eq!(sync.state().phase, SyncPhase::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_are_coalesced() {
        let fixture = Fixture::new(
            three_recipes().with_latency(Duration::from_millis(500)),
            Vec::new(),
        );
        let mut sync = fixture.synchronizer();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(sync.request_sync(&tx));
        assert!(sync.state().is_syncing());
        assert!(!sync.request_sync(&tx));
        assert!(!sync.sync_now().await.unwrap());

        let outcome = rx.recv().await.unwrap();
        sync.complete_sync(outcome).await.unwrap();

        // Two pages, fetched once
        assert_eq!(fixture.db.query_count(), 2);
        assert_eq!(sync.state().phase, SyncPhase::Synced);
        assert!(rx.try_recv().is_err());

        // Settled, so a new request is accepted
        assert!(sync.request_sync(&tx));
    }

    #[tokio::test]
    async fn test_external_change_is_reconciled() {
        let fixture = Fixture::new(three_recipes(), vec![1]);
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();

        fixture.kv.external_change(FAVORITES_KEY, vec![3, 42, 1]);
        let change = KvChange {
            reason: ChangeReason::ServerChange,
            keys: vec![FAVORITES_KEY.to_string()],
        };
        sync.handle_kv_change(&change).await;
        // Redundant delivery is harmless
        sync.handle_kv_change(&change).await;

        assert_eq!(sync.favorites(), &[3, 1]);
        assert_eq!(fixture.kv.stored(FAVORITES_KEY), vec![3, 1]);
        assert_eq!(fixture.kv.write_count(), 1);
    }

    #[tokio::test]
    async fn test_change_before_first_sync_does_not_prune() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        let mut sync = fixture.synchronizer();

        fixture.kv.external_change(FAVORITES_KEY, vec![8, 9]);
        sync.handle_kv_change(&KvChange {
            reason: ChangeReason::InitialSync,
            keys: Vec::new(),
        })
        .await;

        assert_eq!(sync.favorites(), &[8, 9]);
        assert_eq!(fixture.kv.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unrelated_key_change_is_ignored() {
        let fixture = Fixture::new(three_recipes(), vec![1]);
        let mut sync = fixture.synchronizer();
        sync.load_favorites().await;

        fixture.kv.external_change("theme", vec![1]);
        sync.handle_kv_change(&KvChange {
            reason: ChangeReason::ServerChange,
            keys: vec!["theme".to_string()],
        })
        .await;
        assert_eq!(sync.favorites(), &[1]);
    }

    #[tokio::test]
    async fn test_toggle_favorite_twice() {
        let fixture = Fixture::new(three_recipes(), vec![1, 2]);
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();
        let writes_before = fixture.kv.write_count();

        assert!(sync.toggle_favorite(3).await.unwrap());
        assert!(sync.snapshot().is_favorite(3));
        assert!(!sync.toggle_favorite(3).await.unwrap());

        assert_eq!(sync.favorites(), &[1, 2]);
        assert_eq!(fixture.kv.write_count() - writes_before, 2);
    }

    #[tokio::test]
    async fn test_recent_searches_are_published() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        let mut sync = fixture.synchronizer();
        let rx = sync.subscribe();

        sync.record_search("Torch").unwrap();
        sync.record_search("Chest").unwrap();
        assert_eq!(rx.borrow().recent_searches, vec!["Chest", "Torch"]);

        sync.remove_search("Torch").unwrap();
        assert_eq!(rx.borrow().recent_searches, vec!["Chest"]);

        sync.clear_searches().unwrap();
        assert!(rx.borrow().recent_searches.is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_keeps_favorites_and_searches() {
        let fixture = Fixture::new(three_recipes(), vec![1]);
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();
        sync.record_search("Torch").unwrap();

        sync.clear_cache().unwrap();

        assert!(sync.catalog().is_empty());
        assert!(!fixture.cache().path().exists());
        assert_eq!(fixture.kv.stored(FAVORITES_KEY), vec![1]);
        assert_eq!(sync.recent_searches(), vec!["Torch"]);
    }

    #[tokio::test]
    async fn test_clear_all_data() {
        let fixture = Fixture::new(three_recipes(), vec![1, 2]);
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();
        sync.record_search("Torch").unwrap();

        sync.clear_all_data().await.unwrap();

        assert!(sync.catalog().is_empty());
        assert!(!fixture.cache().path().exists());
        assert!(fixture.kv.stored(FAVORITES_KEY).is_empty());
        assert!(sync.favorites().is_empty());
        assert!(sync.recent_searches().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_data_attempts_every_step() {
        let fixture = Fixture::new(three_recipes(), vec![1, 2]);
        let mut sync = fixture.synchronizer();
        sync.sync_now().await.unwrap();
        sync.record_search("Torch").unwrap();

        fixture.kv.set_fail_writes(true);
        let err = sync.clear_all_data().await.unwrap_err();

        assert!(err.to_string().contains("favorites"));
        // The other steps still ran
        assert!(sync.catalog().is_empty());
        assert!(!fixture.cache().path().exists());
        assert!(sync.recent_searches().is_empty());
        assert!(sync.favorites().is_empty());
    }

    #[tokio::test]
    async fn test_status_expires() {
        let fixture = Fixture::new(three_recipes(), Vec::new());
        let mut sync = fixture.synchronizer();
        sync.status = Some(StatusMessage::error("offline"));
        assert!(!sync.clear_expired_status());

        if let Some(status) = sync.status.as_mut() {
            status.timestamp = std::time::Instant::now() - Duration::from_secs(6);
        }
        assert!(sync.clear_expired_status());
        assert!(sync.status().is_none());
        assert!(sync.snapshot().status.is_none());
        assert!(!sync.clear_expired_status());
    }
}
