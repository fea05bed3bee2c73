//! Configuration module for Dolphin-Memory
//!
//! Provides configuration loading, validation, and default settings
//! for the engine and its command line front end.

mod defaults;
mod loader;
mod validator;

pub use defaults::{default_config, ConfigDefaults};
pub use loader::{load_config, ConfigLoader, DEFAULT_CONFIG_FILE};
pub use validator::{validate_config, ConfigValidator, MAX_REGION_SIZE};

// Re-export the configuration structures
pub use loader::{Config, LoggingConfig, MemoryConfig, ProcessConfig, ScannerConfig, WatchConfig};

// Configuration-related error type
pub use loader::ConfigError;

// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
