//! Favorite recipe ids mirrored to the cloud key-value store.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;

use crate::recipe::Recipe;
use crate::remote::{KeyValueStore, FAVORITES_KEY};

/// Keep the stored ids that exist in `catalog`, in stored order.
/// Repeated ids collapse to their first occurrence.
pub fn reconcile(catalog: &[Recipe], stored: &[i64]) -> Vec<i64> {
    let known: HashSet<i64> = catalog.iter().map(|r| r.id).collect();
    let mut seen = HashSet::new();
    stored
        .iter()
        .copied()
        .filter(|id| known.contains(id) && seen.insert(*id))
        .collect()
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub kept: Vec<i64>,
    pub pruned: Vec<i64>,
}

pub struct Favorites {
    store: Arc<dyn KeyValueStore>,
    ids: Vec<i64>,
}

impl Favorites {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ids: Vec::new(),
        }
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Adopt whatever the remote store holds, without validation.
    pub async fn refresh(&mut self) -> Result<&[i64]> {
        self.ids = self.store.get_ids(FAVORITES_KEY).await?;
        Ok(&self.ids)
    }

    /// Pull the stored list, drop ids missing from `catalog`, and write the
    /// filtered list back if anything was dropped. Safe to repeat.
    pub async fn reconcile_with(&mut self, catalog: &[Recipe]) -> Result<Reconciled> {
        let stored = self.store.get_ids(FAVORITES_KEY).await?;
        let kept = reconcile(catalog, &stored);
        let pruned: Vec<i64> = stored.iter().copied().filter(|id| !kept.contains(id)).collect();

        if kept.len() < stored.len() {
            tracing::info!(
                "Pruning {} stale favorite(s): {:?}",
                stored.len() - kept.len(),
                pruned
            );
            self.store.set_ids(FAVORITES_KEY, &kept).await?;
        }

        self.ids = kept.clone();
        Ok(Reconciled { kept, pruned })
    }

    /// Remove `id` if present, else append it. Always written through.
    /// Returns whether `id` is a favorite afterwards.
    pub async fn toggle(&mut self, id: i64) -> Result<bool> {
        let now_favorite = if let Some(pos) = self.ids.iter().position(|f| *f == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id);
            true
        };
        self.store.set_ids(FAVORITES_KEY, &self.ids).await?;
        Ok(now_favorite)
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.ids.clear();
        self.store.set_ids(FAVORITES_KEY, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::IngredientGrid;
    use crate::remote::memory::MemoryKeyValueStore;

    fn catalog(ids: &[i64]) -> Vec<Recipe> {
        ids.iter()
            .map(|id| Recipe {
                id: *id,
                name: format!("Recipe {id}"),
                image: String::new(),
                ingredients: IngredientGrid::default(),
                alternate_ingredients: Vec::new(),
                output: 1,
                alternate_outputs: Vec::new(),
                category: "Misc".to_string(),
                remarks: None,
                image_remark: None,
            })
            .collect()
    }

    #[test]
    fn test_reconcile_preserves_stored_order() {
        assert_eq!(reconcile(&catalog(&[1, 2, 3]), &[5, 2, 9, 1]), vec![2, 1]);
    }

    #[test]
    fn test_reconcile_collapses_duplicates() {
        assert_eq!(reconcile(&catalog(&[1, 2]), &[2, 1, 2]), vec![2, 1]);
    }

    #[test]
    fn test_reconcile_against_empty_catalog_drops_everything() {
        assert!(reconcile(&[], &[1, 2]).is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_with_writes_back_only_when_pruned() {
        let store = Arc::new(MemoryKeyValueStore::new().with_ids(FAVORITES_KEY, vec![5, 2, 9, 1]));
        let mut favorites = Favorites::new(store.clone());

        let result = favorites.reconcile_with(&catalog(&[1, 2, 3])).await.unwrap();
        assert_eq!(result.kept, vec![2, 1]);
        assert_eq!(result.pruned, vec![5, 9]);
        assert_eq!(favorites.ids(), &[2, 1]);
        assert_eq!(store.stored(FAVORITES_KEY), vec![2, 1]);
        assert_eq!(store.write_count(), 1);

        // Second pass finds nothing to prune and does not write
        favorites.reconcile_with(&catalog(&[1, 2, 3])).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_and_writes_each_time() {
        let store = Arc::new(MemoryKeyValueStore::new().with_ids(FAVORITES_KEY, vec![1, 2]));
        let mut favorites = Favorites::new(store.clone());
        favorites.refresh().await.unwrap();

        assert!(favorites.toggle(7).await.unwrap());
        assert_eq!(favorites.ids(), &[1, 2, 7]);
        assert!(!favorites.toggle(7).await.unwrap());
        assert_eq!(favorites.ids(), &[1, 2]);

        assert_eq!(store.write_count(), 2);
        assert_eq!(store.stored(FAVORITES_KEY), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_toggle_removes_existing() {
        let store = Arc::new(MemoryKeyValueStore::new().with_ids(FAVORITES_KEY, vec![1, 2, 3]));
        let mut favorites = Favorites::new(store.clone());
        favorites.refresh().await.unwrap();

        assert!(!favorites.toggle(2).await.unwrap());
        assert_eq!(store.stored(FAVORITES_KEY), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_toggle_reports_write_failure() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set_fail_writes(true);
        let mut favorites = Favorites::new(store.clone());

        assert!(favorites.toggle(4).await.is_err());
        // Local state keeps the change; the next write carries it
        assert!(favorites.contains(4));
    }

    #[tokio::test]
    async fn test_clear_writes_empty_list() {
        let store = Arc::new(MemoryKeyValueStore::new().with_ids(FAVORITES_KEY, vec![1]));
        let mut favorites = Favorites::new(store.clone());
        favorites.refresh().await.unwrap();

        favorites.clear().await.unwrap();
        assert!(favorites.ids().is_empty());
        assert!(store.stored(FAVORITES_KEY).is_empty());
    }
}
