//! Configuration management for memfab.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Command-line flags
//! 2. Environment variables (MEMFAB_*)
//! 3. Config file (MEMFAB_CONFIG, or config.toml in the data directory)
//! 4. Default values

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use memfab_core::FabricConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding backend
    pub embedder: EmbedderKind,

    /// Paths
    pub paths: PathsConfig,

    /// Tier settings passed to the fabric
    pub fabric: FabricConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for memfab data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database holding the recency lists and the archive
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Which embedder the CLI wires into the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Feature hashing, no model needed
    #[default]
    Hash,
    /// Local all-MiniLM-L6-v2 (requires the `embeddings` feature)
    Fastembed,
}

impl std::str::FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "fastembed" | "minilm" => Ok(Self::Fastembed),
            other => bail!("Invalid embedder: {}. Use: hash or fastembed", other),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "memfab", "memfab") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".memfab")
    }
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("memfab.db")
}

fn default_index_dir() -> PathBuf {
    default_data_dir().join("vector_index")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: default_database_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedder: EmbedderKind::default(),
            paths: PathsConfig::default(),
            fabric: FabricConfig::new(default_index_dir()),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a config file body.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Apply MEMFAB_* overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("MEMFAB_DATABASE") {
            self.paths.database = PathBuf::from(path);
        }
        if let Some(path) = lookup("MEMFAB_INDEX_DIR") {
            self.fabric.index_dir = PathBuf::from(path);
        }
        if let Some(value) = lookup("MEMFAB_MAX_ITEMS") {
            self.fabric.max_items = value.parse().context("MEMFAB_MAX_ITEMS must be an integer")?;
        }
        if let Some(value) = lookup("MEMFAB_PROMOTION_THRESHOLD") {
            self.fabric.promotion_threshold = value
                .parse()
                .context("MEMFAB_PROMOTION_THRESHOLD must be a number")?;
        }
        if let Some(value) = lookup("MEMFAB_HALF_LIFE_HOURS") {
            self.fabric.half_life_hours = value
                .parse()
                .context("MEMFAB_HALF_LIFE_HOURS must be a number")?;
        }
        if let Some(value) = lookup("MEMFAB_EMBEDDER") {
            self.embedder = value.parse()?;
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MEMFAB_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.data_dir)
            .context("Failed to create data directory")?;
        if let Some(parent) = self.paths.database.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        std::fs::create_dir_all(&self.fabric.index_dir)
            .context("Failed to create index directory")?;
        Ok(())
    }
}
