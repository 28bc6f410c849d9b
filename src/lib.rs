//! Offline-first recipe catalog synchronization.
//!
//! The catalog is pulled page by page from a remote record database,
//! cached locally so it is usable offline, and published as immutable
//! snapshots. Favorites live in a shared key-value store and are pruned
//! against the catalog after every sync. Recent searches stay on the device.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod favorites;
pub mod fetcher;
pub mod preferences;
pub mod recent;
pub mod recipe;
pub mod remote;
pub mod status;
pub mod sync;

pub use cache::CacheStore;
pub use catalog::RecipeSearch;
pub use config::Config;
pub use error::{FetchError, FetchErrorKind, RemoteError, RemoteErrorCode};
pub use favorites::Favorites;
pub use fetcher::{CatalogFetcher, FetchReport, RetryPolicy};
pub use preferences::Preferences;
pub use recent::RecentSearches;
pub use recipe::{IngredientGrid, Recipe};
pub use status::StatusMessage;
pub use sync::{Snapshot, SyncHandle, SyncOptions, SyncPhase, SyncService, SyncState, Synchronizer};
