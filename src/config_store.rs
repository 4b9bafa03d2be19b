//! `config_store` module: the per-user JSON configuration behind the `dip` CLI.
//!
//! The store lives at `<config-dir>/dip_config.json` (default `~/.dip_ui`) and
//! remembers the default DIP directory between invocations plus cached
//! SWORD collection details, keyed by collection URI.
//!
//! A missing file reads as an empty configuration; it is created on first
//! write. All failures surface as `anyhow::Error` at the CLI boundary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "dip_config.json";
pub const DEFAULT_CONFIG_DIR: &str = ".dip_ui";

/// Cached details for one SWORD collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servicedoc_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl CollectionConfig {
    /// Overwrites each field that `update` supplies.
    pub fn merge(&mut self, update: CollectionConfig) {
        if update.servicedoc_uri.is_some() {
            self.servicedoc_uri = update.servicedoc_uri;
        }
        if update.username.is_some() {
            self.username = update.username;
        }
        if update.password.is_some() {
            self.password = update.password;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DipConfig {
    /// Working directory the default DIP was resolved against.
    #[serde(default)]
    pub dipbase: Option<PathBuf>,
    /// Default DIP directory for commands given no `--dip`.
    #[serde(default)]
    pub dipdir: Option<PathBuf>,
    /// Collection used by `deposit` when none is given.
    #[serde(default)]
    pub collection_uri: Option<String>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionConfig>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ConfigStore { dir: dir.into() }
    }

    /// `~/.dip_ui`, when a home directory can be determined.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn load(&self) -> Result<DipConfig> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(config_path = ?path, "No configuration file yet, using defaults");
                return Ok(DipConfig::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config file {path:?}"));
            }
        };
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {path:?}"))?;
        debug!(config_path = ?path, "Configuration loaded");
        Ok(config)
    }

    pub fn save(&self, config: &DipConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create config directory {:?}", self.dir))?;
        let path = self.path();
        let mut json = serde_json::to_string_pretty(config)?;
        json.push('\n');
        fs::write(&path, json).with_context(|| format!("Failed to write config file {path:?}"))?;
        info!(config_path = ?path, "Configuration saved");
        Ok(())
    }

    /// Loads, applies `change`, and writes back.
    pub fn update<F>(&self, change: F) -> Result<DipConfig>
    where
        F: FnOnce(&mut DipConfig),
    {
        let mut config = self.load()?;
        change(&mut config);
        self.save(&config)?;
        Ok(config)
    }
}
