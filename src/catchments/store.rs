use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::warn;

use super::selection::CatchmentSelection;

/// Namespace key under which the sidebar selection is remembered.
pub const SELECTION_KEY: &str = "propbase:grow:catchments";

/// Persisted key/value store for small JSON preference blobs.
pub trait PreferenceStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(AHashMap<String, String>);

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl PreferenceStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> { Ok(self.0.get(key).cloned()) }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.0.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory. Writes go to a temp file that is renamed into
/// place, so a crash never leaves a half-written preference behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    #[inline] pub fn dir(&self) -> &Path { &self.dir }

    fn path(&self, key: &str) -> PathBuf {
        let name: String = key.chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl PreferenceStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() { return Ok(None) }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("read {}", path.display()))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create dir {}", self.dir.display()))?;
        let target = self.path(key);

        let mut tmp = NamedTempFile::new_in(&self.dir).context("create temp file")?;
        tmp.write_all(value.as_bytes()).context("write temp file")?;
        tmp.as_file().sync_all().ok(); // best-effort fsync
        tmp.persist(&target)
            .with_context(|| format!("rename to {}", target.display()))?;
        let _ = File::open(&self.dir).and_then(|dir| dir.sync_all());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("remove {}", path.display()))
            }
            _ => Ok(()),
        }
    }
}

/// Load the remembered selection. Missing or unreadable data yields an empty selection; the
/// loaded tree is normalized so its global toggles agree with the per-state entries.
pub fn load_selection(store: &dyn PreferenceStore) -> CatchmentSelection {
    let raw = match store.read(SELECTION_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return CatchmentSelection::default(),
        Err(e) => {
            warn!(error = %e, "could not read saved catchment selection");
            return CatchmentSelection::default();
        }
    };

    match serde_json::from_str::<CatchmentSelection>(&raw) {
        Ok(mut selection) => {
            selection.normalize();
            selection
        }
        Err(e) => {
            warn!(error = %e, "discarding malformed catchment selection");
            CatchmentSelection::default()
        }
    }
}

pub fn save_selection(store: &mut dyn PreferenceStore, selection: &CatchmentSelection) -> Result<()> {
    let json = serde_json::to_string(selection).context("serialize catchment selection")?;
    store.write(SELECTION_KEY, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catchments::rules::Category, types::StateCode};

    #[test]
    fn memory_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(load_selection(&store), CatchmentSelection::default());

        let mut sel = CatchmentSelection::new();
        sel.set_global(Category::Primary, true);
        save_selection(&mut store, &sel).unwrap();
        assert_eq!(load_selection(&store), sel);
    }

    #[test]
    fn malformed_blob_falls_back_to_empty() {
        let mut store = MemoryStore::new();
        store.write(SELECTION_KEY, "{ nope").unwrap();
        assert!(load_selection(&store).is_empty());
    }

    #[test]
    fn file_store_writes_atomically_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("prefs"));
        assert_eq!(store.read(SELECTION_KEY).unwrap(), None);

        let mut sel = CatchmentSelection::new();
        sel.set_type(StateCode::Qld, "Junior Secondary", true);
        save_selection(&mut store, &sel).unwrap();

        assert!(dir.path().join("prefs/propbase_grow_catchments.json").exists());
        assert_eq!(load_selection(&store), sel);

        store.remove(SELECTION_KEY).unwrap();
        store.remove(SELECTION_KEY).unwrap();
        assert_eq!(store.read(SELECTION_KEY).unwrap(), None);
    }
}
