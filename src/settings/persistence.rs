//! Load/save contract for policy settings

use super::PolicyConfig;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Persistent home for the policy settings
pub trait SettingsStore: Send + Sync {
    /// Load saved settings, `None` if nothing was saved yet
    fn load(&self) -> Result<Option<PolicyConfig>>;

    /// Save the full settings
    fn save(&self, config: &PolicyConfig) -> Result<()>;
}

/// Settings stored as pretty-printed JSON in a file
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileSettingsStore {
    /// Create a store backed by `path`; the file need not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn load(&self) -> Result<Option<PolicyConfig>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);

        if !self.path.exists() {
            debug!("Settings file {} does not exist", self.path.display());
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&self, config: &PolicyConfig) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        let json = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, json)?;

        debug!("Saved cache settings to {}", self.path.display());
        Ok(())
    }
}

/// Settings kept in memory only
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    saved: RwLock<Option<PolicyConfig>>,
}

impl InMemorySettingsStore {
    /// Store that already holds `config`
    pub fn with_saved(config: PolicyConfig) -> Self {
        Self {
            saved: RwLock::new(Some(config)),
        }
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self) -> Result<Option<PolicyConfig>> {
        Ok(*self.saved.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn save(&self, config: &PolicyConfig) -> Result<()> {
        *self.saved.write().unwrap_or_else(PoisonError::into_inner) = Some(*config);
        Ok(())
    }
}
