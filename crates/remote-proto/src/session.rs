//! Session-scoped key/value storage.
//!
//! Values live in a JSON file inside the user's runtime directory, which the
//! OS clears at logout.  Hosts without a runtime directory get no store at
//! all; callers treat that as a missing optional capability.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::platform;

/// Key under which the panel remembers the last active tab.
pub const ACTIVE_TAB_KEY: &str = "activeMainTab";

const SESSION_FILE: &str = "session.json";

pub struct SessionStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SessionStore {
    /// Open the store in the platform session directory.
    pub fn open_default() -> Option<Self> {
        match platform::session_dir() {
            Some(dir) => Some(Self::open(dir.join(SESSION_FILE))),
            None => {
                warn!("session storage unsupported on this host");
                None
            }
        }
    }

    /// Open (or lazily create) a store backed by `path`.  A missing or
    /// corrupt file yields an empty store.
    pub fn open(path: PathBuf) -> Self {
        let values = Self::load(&path);
        Self { path, values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl ToString) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(path: &Path) -> BTreeMap<String, String> {
        if let Ok(content) = std::fs::read_to_string(path) {
            match serde_json::from_str(&content) {
                Ok(values) => return values,
                Err(e) => warn!("ignoring unreadable session file {}: {}", path.display(), e),
            }
        }
        BTreeMap::new()
    }
}
