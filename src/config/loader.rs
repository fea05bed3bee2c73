//! Configuration loader for Dolphin-Memory
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use super::validator::validate_config;
use crate::memory::translate::RamLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "dolphin-memory.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_process")]
    pub process: ProcessConfig,

    #[serde(default = "default_memory")]
    pub memory: MemoryConfig,

    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_watch")]
    pub watch: WatchConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Emulator process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Executable names tried when looking for the emulator
    #[serde(default = "default_names")]
    pub names: Vec<String>,
}

/// Console RAM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_mem1_size")]
    pub mem1_size: u32,
    #[serde(default = "default_mem2_size")]
    pub mem2_size: u32,
}

impl MemoryConfig {
    /// Region sizes assumed before the guest reports its own
    pub fn layout(&self) -> RamLayout {
        RamLayout::new(self.mem1_size, self.mem2_size)
    }
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    #[serde(default = "default_undo_depth")]
    pub undo_depth: usize,
    #[serde(default = "default_enforce_alignment")]
    pub enforce_alignment: bool,
    #[serde(default = "default_max_displayed_results")]
    pub max_displayed_results: usize,
}

/// Watch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_freeze_interval_ms")]
    pub freeze_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is missing
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(path)) => {
                debug!("No configuration at {}, using defaults", path);
                Ok(Config::default())
            }
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads and validates configuration from `path`, or from the default
/// location when no path is given
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let loader = ConfigLoader::new(path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE)));
    let config = loader.load_or_default()?;
    validate_config(&config)?;
    Ok(config)
}

// Default functions for serde
fn default_process() -> ProcessConfig {
    ProcessConfig {
        names: default_config().process.names,
    }
}

fn default_memory() -> MemoryConfig {
    let defaults = default_config();
    MemoryConfig {
        mem1_size: defaults.memory.mem1_size,
        mem2_size: defaults.memory.mem2_size,
    }
}

fn default_scanner() -> ScannerConfig {
    let defaults = default_config();
    ScannerConfig {
        max_threads: defaults.scanner.max_threads,
        undo_depth: defaults.scanner.undo_depth,
        enforce_alignment: defaults.scanner.enforce_alignment,
        max_displayed_results: defaults.scanner.max_displayed_results,
    }
}

fn default_watch() -> WatchConfig {
    let defaults = default_config();
    WatchConfig {
        poll_interval_ms: defaults.watch.poll_interval_ms,
        freeze_interval_ms: defaults.watch.freeze_interval_ms,
    }
}

fn default_logging() -> LoggingConfig {
    let defaults = default_config();
    LoggingConfig {
        level: defaults.logging.level,
        file: defaults.logging.file,
    }
}

// Individual field defaults
fn default_names() -> Vec<String> {
    default_config().process.names
}

fn default_mem1_size() -> u32 {
    default_config().memory.mem1_size
}

fn default_mem2_size() -> u32 {
    default_config().memory.mem2_size
}

fn default_max_threads() -> usize {
    default_config().scanner.max_threads
}

fn default_undo_depth() -> usize {
    default_config().scanner.undo_depth
}

fn default_enforce_alignment() -> bool {
    default_config().scanner.enforce_alignment
}

fn default_max_displayed_results() -> usize {
    default_config().scanner.max_displayed_results
}

fn default_poll_interval_ms() -> u64 {
    default_config().watch.poll_interval_ms
}

fn default_freeze_interval_ms() -> u64 {
    default_config().watch.freeze_interval_ms
}

fn default_log_level() -> String {
    default_config().logging.level
}

fn default_log_file() -> String {
    default_config().logging.file
}

impl Default for Config {
    fn default() -> Self {
        Config {
            process: default_process(),
            memory: default_memory(),
            scanner: default_scanner(),
            watch: default_watch(),
            logging: default_logging(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.memory.layout(), RamLayout::default());
        assert!(config.scanner.max_threads > 0);
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let result = loader.load();
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let config = loader.load_or_default().unwrap();
        assert_eq!(config.watch.poll_interval_ms, 100);
    }

    #[test]
    fn test_broken_file_is_not_replaced_by_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[scanner\nundo_depth = ").unwrap();

        let loader = ConfigLoader::new(&config_path);
        assert!(matches!(
            loader.load_or_default(),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.scanner.undo_depth = 3;
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());

        let loaded = loader.load().unwrap();
        assert_eq!(loaded.scanner.undo_depth, 3);
        assert_eq!(loaded.process.names, config.process.names);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [memory]
            mem1_size = 0x4000000

            [scanner]
            enforce_alignment = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.mem1_size, 0x0400_0000);
        assert!(!config.scanner.enforce_alignment);
        // Check defaults are applied
        assert_eq!(config.memory.mem2_size, 0x0400_0000);
        assert_eq!(config.scanner.undo_depth, 16);
    }

    #[test]
    fn test_load_config_validates() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        fs::write(&config_path, "[memory]\nmem1_size = 0\n").unwrap();

        assert!(matches!(
            load_config(Some(&config_path)),
            Err(ConfigError::Invalid(_))
        ));
    }
}
