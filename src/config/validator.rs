//! Configuration validator for Dolphin-Memory
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, LoggingConfig, MemoryConfig, ProcessConfig, ScannerConfig, WatchConfig};
use tracing::warn;

/// Largest region size the emulator can be configured with (256 MiB)
pub const MAX_REGION_SIZE: u32 = 0x1000_0000;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_process(&config.process)?;
        Self::validate_memory(&config.memory)?;
        Self::validate_scanner(&config.scanner)?;
        Self::validate_watch(&config.watch)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_process(process: &ProcessConfig) -> Result<(), ConfigError> {
        if process.names.is_empty() || process.names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "Emulator process names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates RAM sizes
    fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
        for (name, size) in [("mem1_size", memory.mem1_size), ("mem2_size", memory.mem2_size)] {
            if size == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
            if size > MAX_REGION_SIZE {
                return Err(ConfigError::Invalid(format!(
                    "{} cannot exceed 0x{:X}",
                    name, MAX_REGION_SIZE
                )));
            }
        }
        Ok(())
    }

    /// Validates scanner configuration
    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        if scanner.max_threads == 0 {
            return Err(ConfigError::Invalid(
                "Scanner threads must be at least 1".to_string(),
            ));
        }

        if scanner.max_threads > 128 {
            return Err(ConfigError::Invalid(
                "Scanner threads cannot exceed 128".to_string(),
            ));
        }

        if scanner.undo_depth == 0 {
            warn!("Scanner undo is disabled (undo_depth = 0)");
        }

        if scanner.max_displayed_results == 0 {
            return Err(ConfigError::Invalid(
                "At least one scan result must be displayable".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_watch(watch: &WatchConfig) -> Result<(), ConfigError> {
        if watch.poll_interval_ms == 0 || watch.freeze_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "Watch intervals must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        if logging.file.is_empty() {
            return Err(ConfigError::Invalid(
                "Log file path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        let mut config = Config::default();
        config.process.names.clear();
        assert!(validate_config(&config).is_err());

        config.process.names = vec!["  ".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_region_sizes() {
        let mut config = Config::default();
        config.memory.mem1_size = 0;
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("mem1_size"));

        config.memory.mem1_size = MAX_REGION_SIZE;
        assert!(validate_config(&config).is_ok());

        config.memory.mem2_size = MAX_REGION_SIZE + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_thread_count() {
        let mut config = Config::default();
        config.scanner.max_threads = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.max_threads = 129;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_undo_depth_is_allowed() {
        let mut config = Config::default();
        config.scanner.undo_depth = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_intervals() {
        let mut config = Config::default();
        config.watch.freeze_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("log level"));
    }
}
