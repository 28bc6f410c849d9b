//! Local catalog snapshot on disk.
//!
//! The whole catalog is stored as one JSON array. Reads fail soft (any
//! problem is a cache miss); writes go to a sibling temp file that is then
//! renamed over the snapshot, so a failed save leaves the old one intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::recipe::Recipe;

pub const CACHE_FILE_NAME: &str = "recipes.json";

/// Directory for private app data (`~/.local/share/craftbook` on Linux).
pub fn default_data_dir() -> Result<PathBuf> {
    Ok(dirs::data_dir()
        .context("Failed to get data directory")?
        .join("craftbook"))
}

/// Write `contents` to `path` via a temp file + rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .context("Snapshot path has no file name")?
        .to_string_lossy();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("Failed to write {}", tmp_path.display()));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path, file_name: &str) -> Self {
        Self::new(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. Missing, unreadable or malformed files are a miss.
    pub fn load(&self) -> Option<Vec<Recipe>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Could not read recipe cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Vec<Recipe>>(&contents) {
            Ok(recipes) => {
                tracing::debug!("Loaded {} recipes from cache", recipes.len());
                Some(recipes)
            }
            Err(e) => {
                tracing::warn!("Recipe cache corrupt, ignoring: {}", e);
                None
            }
        }
    }

    pub fn save(&self, recipes: &[Recipe]) -> Result<()> {
        let contents =
            serde_json::to_vec(recipes).context("Failed to serialize recipe cache")?;
        write_atomic(&self.path, &contents)?;
        tracing::debug!("Saved {} recipes to {}", recipes.len(), self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}
