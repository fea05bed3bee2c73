//! Configuration files feeding the engine

use dolphin_memory::config::{load_config, Config, ConfigError, ConfigLoader};
use dolphin_memory::memory::{MemScanner, RamLayout};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

#[test]
fn file_overrides_defaults_per_field() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dolphin-memory.toml");
    fs::write(
        &path,
        r#"
            [process]
            names = ["dolphin-emu-nogui"]

            [memory]
            mem1_size = 0x2000000

            [scanner]
            undo_depth = 2
            max_threads = 1

            [logging]
            level = "debug"
        "#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.process.names, vec!["dolphin-emu-nogui".to_string()]);
    assert_eq!(config.memory.layout(), RamLayout::new(0x0200_0000, 0x0400_0000));
    assert_eq!(config.scanner.undo_depth, 2);
    assert!(config.scanner.enforce_alignment);
    assert_eq!(config.watch.poll_interval_ms, 100);
    assert_eq!(config.logging.level, "debug");

    let scanner = MemScanner::from_config(&config.scanner);
    assert!(scanner.settings().enforce_alignment);
}

#[test]
fn invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[memory]\nmem2_size = 0x20000000\n").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("mem2_size"));
}

#[test]
fn saved_defaults_load_back() {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::new(dir.path().join("saved.toml"));
    loader.save(&Config::default()).unwrap();

    let loaded = loader.load().unwrap();
    assert_eq!(loaded.memory.layout(), RamLayout::default());
    assert_eq!(loaded.process.names, Config::default().process.names);
}
