//! Vault configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ops::conflict::ConflictPolicy;

const CONFIG_FILE: &str = "mirrorvault.json";

/// Main vault configuration, persisted as JSON in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Config schema version
    pub version: u32,

    /// Data directory path (catalog database and config live here)
    pub data_dir: PathBuf,

    /// Root of the physical storage tree
    pub storage_dir: PathBuf,

    /// Display name of the namespace root
    pub root_name: String,

    /// How name collisions are resolved for file writes
    pub conflict_policy: ConflictPolicy,

    /// Whether deleting a non-empty directory is permitted
    pub allow_recursive_delete: bool,

    /// Tree cache time-to-live in seconds
    pub cache_ttl_secs: u64,

    /// Whether audit lines are written
    pub audit_enabled: bool,

    /// Audit log file name, relative to the storage root
    pub audit_file: String,
}

impl VaultConfig {
    fn target_version() -> u32 {
        1
    }

    /// Load configuration from a data directory, creating a default one if
    /// none exists.
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);

        if config_path.exists() {
            info!("Loading config from {:?}", config_path);
            let json = fs::read_to_string(&config_path)?;
            let config: VaultConfig = serde_json::from_str(&json)?;
            Ok(config)
        } else {
            warn!("No config found, creating default at {:?}", config_path);
            let config = Self::default_with_dir(data_dir.to_path_buf());
            config.save()?;
            Ok(config)
        }
    }

    /// Create default configuration rooted at a specific data directory
    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        let storage_dir = data_dir.join("storage");
        Self {
            version: Self::target_version(),
            data_dir,
            storage_dir,
            root_name: "Root".to_string(),
            conflict_policy: ConflictPolicy::Reject,
            allow_recursive_delete: false,
            cache_ttl_secs: 30,
            audit_enabled: true,
            audit_file: "vault-audit.log".to_string(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let config_path = self.data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, json)?;
        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Path of the catalog database file
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }

    /// Ensure the data and storage directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.storage_dir)?;
        Ok(())
    }
}
