use anyhow::{anyhow, Result};
use growmap_core::PreferenceStore;
use web_sys::Storage;

use crate::common::describe;

/// Browser `localStorage`.
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn open() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
        let storage = window.local_storage()
            .map_err(|e| anyhow!("localStorage: {}", describe(&e)))?
            .ok_or_else(|| anyhow!("localStorage is disabled"))?;
        Ok(Self { storage })
    }
}

impl PreferenceStore for LocalStorageStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.storage.get_item(key).map_err(|e| anyhow!("read {key}: {}", describe(&e)))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage.set_item(key, value).map_err(|e| anyhow!("write {key}: {}", describe(&e)))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.storage.remove_item(key).map_err(|e| anyhow!("remove {key}: {}", describe(&e)))
    }
}
