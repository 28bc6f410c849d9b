//! Recent search names, most-recent-first, stored as a JSON string preference.

use anyhow::{Context, Result};

use crate::preferences::Preferences;

pub const RECENT_SEARCHES_KEY: &str = "recentSearches";
pub const MAX_RECENT_SEARCHES: usize = 5;

/// Move `name` to the front of `entries`, dropping duplicates and
/// anything past `max_size`.
pub fn push_recent(entries: &mut Vec<String>, name: &str, max_size: usize) {
    entries.retain(|e| e != name);
    entries.insert(0, name.to_string());
    entries.truncate(max_size);
}

pub struct RecentSearches {
    prefs: Preferences,
    max_size: usize,
}

impl RecentSearches {
    pub fn new(prefs: Preferences) -> Self {
        Self::with_max_size(prefs, MAX_RECENT_SEARCHES)
    }

    /// Like [`RecentSearches::new`] with a smaller cap. Never exceeds
    /// [`MAX_RECENT_SEARCHES`].
    pub fn with_max_size(prefs: Preferences, max_size: usize) -> Self {
        Self {
            prefs,
            max_size: max_size.min(MAX_RECENT_SEARCHES),
        }
    }

    /// Current list. A missing or undecodable value reads as empty.
    pub fn list(&self) -> Vec<String> {
        let Some(raw) = self.prefs.get(RECENT_SEARCHES_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(mut entries) => {
                entries.truncate(self.max_size);
                entries
            }
            Err(e) => {
                tracing::debug!("Ignoring undecodable recent searches: {}", e);
                Vec::new()
            }
        }
    }

    pub fn record(&mut self, name: &str) -> Result<Vec<String>> {
        let mut entries = self.list();
        if name.trim().is_empty() {
            return Ok(entries);
        }
        push_recent(&mut entries, name, self.max_size);
        self.store(&entries)?;
        Ok(entries)
    }

    pub fn remove(&mut self, name: &str) -> Result<Vec<String>> {
        let mut entries = self.list();
        let before = entries.len();
        entries.retain(|e| e != name);
        if entries.len() != before {
            self.store(&entries)?;
        }
        Ok(entries)
    }

    pub fn clear_all(&mut self) -> Result<()> {
        self.prefs.remove(RECENT_SEARCHES_KEY)
    }

    fn store(&mut self, entries: &[String]) -> Result<()> {
        let encoded =
            serde_json::to_string(entries).context("Failed to encode recent searches")?;
        self.prefs.set(RECENT_SEARCHES_KEY, encoded)
    }
}
