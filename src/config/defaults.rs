//! Default configuration values for Dolphin-Memory

use crate::core::types::{DEFAULT_MEM1_SIZE, DEFAULT_MEM2_SIZE};
use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub process: ProcessDefaults,
    pub memory: MemoryDefaults,
    pub scanner: ScannerDefaults,
    pub watch: WatchDefaults,
    pub logging: LoggingDefaults,
}

/// Default emulator process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefaults {
    pub names: Vec<String>,
}

/// Default console RAM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDefaults {
    pub mem1_size: u32,
    pub mem2_size: u32,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub max_threads: usize,
    pub undo_depth: usize,
    pub enforce_alignment: bool,
    pub max_displayed_results: usize,
}

/// Default watch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchDefaults {
    pub poll_interval_ms: u64,
    pub freeze_interval_ms: u64,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
    pub file: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        process: ProcessDefaults {
            names: vec![
                "dolphin-emu".to_string(),
                "dolphin-emu-qt2".to_string(),
                "dolphin-emu-wx".to_string(),
                "Dolphin.exe".to_string(),
                "DolphinQt.exe".to_string(),
                "DolphinWx.exe".to_string(),
            ],
        },
        memory: MemoryDefaults {
            mem1_size: DEFAULT_MEM1_SIZE,
            mem2_size: DEFAULT_MEM2_SIZE,
        },
        scanner: ScannerDefaults {
            max_threads: num_cpus::get().min(8),
            undo_depth: 16,
            enforce_alignment: true,
            max_displayed_results: 1000,
        },
        watch: WatchDefaults {
            poll_interval_ms: 100,
            freeze_interval_ms: 10,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
            file: "dolphin-memory.log".to_string(),
        },
    }
}
