use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::catalog;
use crate::error::FetchError;
use crate::recipe::Recipe;
use crate::status::StatusMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Synced,
    Failed,
}

/// Process-wide sync status. Rebuilt on every run.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub phase: SyncPhase,
    /// Last successful remote fetch. Stays `None` while showing cached data.
    pub last_synced: Option<DateTime<Utc>>,
    pub last_error: Option<FetchError>,
}

impl SyncState {
    pub fn is_syncing(&self) -> bool {
        self.phase == SyncPhase::Syncing
    }
}

/// Immutable view published to subscribers after every change.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub catalog: Arc<Vec<Recipe>>,
    pub favorites: Vec<i64>,
    pub recent_searches: Vec<String>,
    pub sync: SyncState,
    pub status: Option<StatusMessage>,
}

impl Snapshot {
    pub fn is_favorite(&self, id: i64) -> bool {
        self.favorites.contains(&id)
    }

    /// Favorite recipes in favorite order.
    pub fn favorite_recipes(&self) -> Vec<&Recipe> {
        catalog::resolve_ids(&self.catalog, &self.favorites)
    }
}
