//! Configuration management for the msmd simulator
//!
//! Loading, validation, and defaults for the pipeline's tunable parameters.

use crate::error::{MsmdError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Application clustering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Minimum similarity percentage (exclusive) for a merge candidate
    pub similarity_threshold: f64,
}

/// Generational page-similarity search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Survivor population size per generation
    pub population_size: usize,
    /// Number of generations to run
    pub generations: usize,
    /// Per-iteration probability of a mutation re-pairing
    pub mutation_rate: f64,
    /// Optional wall-clock budget for one discovery run, in milliseconds.
    /// Generation count is otherwise the only bound on runtime while the
    /// population grows quadratically with page count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_ms: Option<u64>,
}

/// Simulated memory layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Page size in bytes
    pub page_size: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 30.0,
        }
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 20,
            mutation_rate: 0.1,
            time_budget_ms: None,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { page_size: 4096 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clustering: ClusteringConfig::default(),
            explorer: ExplorerConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MsmdError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MsmdError::Io {
            source: e,
            context: format!("Failed to read config file: {}", path.display()),
        })?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MsmdError::Io {
            source: e,
            context: format!("Failed to write config file: {}", path.display()),
        })
    }

    /// Default configuration file path (~/.config/msmd/config.toml)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;
        Ok(config_dir.join("msmd").join("config.toml"))
    }

    /// Validate all configuration values, accumulating every failure
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.explorer.population_size == 0 {
            errors.push(ValidationError::new(
                "explorer.population_size",
                "must be positive",
            ));
        }
        if self.explorer.generations == 0 {
            errors.push(ValidationError::new(
                "explorer.generations",
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.explorer.mutation_rate) {
            errors.push(ValidationError::new(
                "explorer.mutation_rate",
                "must be within [0.0, 1.0]",
            ));
        }
        if !(0.0..=100.0).contains(&self.clustering.similarity_threshold) {
            errors.push(ValidationError::new(
                "clustering.similarity_threshold",
                "must be within [0.0, 100.0]",
            ));
        }
        if self.memory.page_size == 0 {
            errors.push(ValidationError::new("memory.page_size", "must be positive"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MsmdError::ConfigValidation { errors })
        }
    }
}
