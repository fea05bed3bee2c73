//! Scan session behaviour against an in-memory emulator

use dolphin_memory::core::types::{
    ErrorKind, MemType, ScanFilter, ScanSettings, ScanState, Signedness, ARAM_SIZE, ARAM_START,
    MEM1_START, MEM2_START,
};
use dolphin_memory::memory::{MemScanner, RamLayout};
use dolphin_memory::process::{DolphinAccessor, SnapshotProcess};
use pretty_assertions::assert_eq;

fn hooked(layout: RamLayout, mem2: bool) -> (DolphinAccessor, SnapshotProcess) {
    let process = SnapshotProcess::new(layout);
    let process = if mem2 { process.with_mem2() } else { process };
    let control = process.clone();
    let mut accessor = DolphinAccessor::new(Box::new(process));
    accessor.hook();
    (accessor, control)
}

fn results(scanner: &MemScanner) -> Vec<u32> {
    scanner.results().collect()
}

#[test]
fn exact_scan_finds_values_in_every_region() {
    let (mut accessor, control) = hooked(RamLayout::new(0x1000, 0x800), true);
    control.poke_u32(MEM1_START + 0x100, 1337);
    control.poke_u32(MEM1_START + 0xFFC, 1337);
    control.poke_u32(MEM2_START + 0x40, 1337);

    let mut scanner = MemScanner::new(8);
    let count = scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("1337"), None)
        .unwrap();

    assert_eq!(count, 3);
    assert_eq!(
        results(&scanner),
        vec![MEM1_START + 0x100, MEM1_START + 0xFFC, MEM2_START + 0x40]
    );
    assert_eq!(scanner.state(), ScanState::Active);
}

#[test]
fn repeating_a_scan_on_unchanged_memory_is_idempotent() {
    let (mut accessor, control) = hooked(RamLayout::new(0x1000, 0x1000), false);
    for i in 0..16u32 {
        control.poke_u32(MEM1_START + i * 0x40, 100 + i);
    }

    let mut scanner = MemScanner::new(8);
    scanner
        .first_scan(&mut accessor, ScanFilter::BiggerThan, Some("105"), None)
        .unwrap();
    let before = results(&scanner);

    scanner
        .next_scan(&mut accessor, ScanFilter::BiggerThan, Some("105"), None)
        .unwrap();
    assert_eq!(results(&scanner), before);

    scanner
        .next_scan(&mut accessor, ScanFilter::Unchanged, None, None)
        .unwrap();
    assert_eq!(results(&scanner), before);
    assert_eq!(before.len(), 10);
}

#[test]
fn rescanning_after_reset_gives_the_same_results() {
    let (mut accessor, control) = hooked(RamLayout::new(0x1000, 0x800), true);
    control.poke_u32(MEM1_START + 0x24, 42);
    control.poke_u32(MEM1_START + 0x800, 42);
    control.poke_u32(MEM2_START + 0x7FC, 42);

    let mut scanner = MemScanner::new(8);
    let first_count = scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("42"), None)
        .unwrap();
    let first = results(&scanner);

    scanner.reset();
    assert_eq!(scanner.state(), ScanState::Unstarted);
    assert_eq!(scanner.result_count(), 0);

    let second_count = scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("42"), None)
        .unwrap();
    assert_eq!(second_count, first_count);
    assert_eq!(results(&scanner), first);
    assert_eq!(
        first,
        vec![MEM1_START + 0x24, MEM1_START + 0x800, MEM2_START + 0x7FC]
    );
}

#[test]
fn aram_session_scans_aram_then_mem1() {
    let process = SnapshotProcess::new(RamLayout::new(0x1000, 0x1000)).with_aram();
    let control = process.clone();
    let mut accessor = DolphinAccessor::new(Box::new(process));
    accessor.hook();
    assert!(accessor.is_aram_accessible());
    assert!(!accessor.is_mem2_enabled());

    control.poke_u32(ARAM_START + 0x40, 0xCAFE_F00D);
    control.poke_u32(MEM1_START + 0x80, 0xCAFE_F00D);

    let snapshot = accessor.refresh_cache().unwrap();
    assert_eq!(snapshot.cache_index_of(ARAM_START), Some(0));
    assert_eq!(snapshot.cache_index_of(MEM1_START), Some(ARAM_SIZE as usize));
    assert_eq!(snapshot.cache_index_of(MEM2_START), None);

    let mut scanner = MemScanner::new(8);
    scanner
        .set_settings(ScanSettings {
            signedness: Signedness::Unsigned,
            ..ScanSettings::default()
        })
        .unwrap();
    let count = scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("3405705229"), None)
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(results(&scanner), vec![ARAM_START + 0x40, MEM1_START + 0x80]);
}

#[test]
fn undo_restores_each_previous_result_set() {
    let (mut accessor, control) = hooked(RamLayout::new(0x400, 0x400), false);
    control.poke_u32(MEM1_START + 0x10, 5);
    control.poke_u32(MEM1_START + 0x20, 5);
    control.poke_u32(MEM1_START + 0x30, 5);

    let mut scanner = MemScanner::new(8);
    scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("5"), None)
        .unwrap();
    let first = results(&scanner);

    control.poke_u32(MEM1_START + 0x20, 6);
    scanner
        .next_scan(&mut accessor, ScanFilter::Unchanged, None, None)
        .unwrap();
    let second = results(&scanner);

    control.poke_u32(MEM1_START + 0x30, 7);
    scanner
        .next_scan(&mut accessor, ScanFilter::Unchanged, None, None)
        .unwrap();
    assert_eq!(results(&scanner), vec![MEM1_START + 0x10]);

    assert!(scanner.undo_scan());
    assert_eq!(results(&scanner), second);
    assert!(scanner.undo_scan());
    assert_eq!(results(&scanner), first);
    assert!(!scanner.undo_scan());
    assert_eq!(scanner.result_count(), 3);
}

#[test]
fn delta_filters_compare_against_the_previous_scan() {
    let (mut accessor, control) = hooked(RamLayout::new(0x400, 0x400), false);
    let address = MEM1_START + 0x80;
    control.poke_u32(address, 10);

    let mut scanner = MemScanner::new(8);
    scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("10"), None)
        .unwrap();
    assert_eq!(results(&scanner), vec![address]);

    control.poke_u32(address, 15);
    let count = scanner
        .next_scan(&mut accessor, ScanFilter::IncreasedBy, Some("5"), None)
        .unwrap();
    assert_eq!(count, 1);

    // The previous scan saw 15 as well
    let count = scanner
        .next_scan(&mut accessor, ScanFilter::Decreased, None, None)
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn increased_by_rejects_other_deltas() {
    let (mut accessor, control) = hooked(RamLayout::new(0x400, 0x400), false);
    control.poke_u32(MEM1_START, 10);
    control.poke_u32(MEM1_START + 4, 10);

    let mut scanner = MemScanner::new(8);
    scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("10"), None)
        .unwrap();

    control.poke_u32(MEM1_START, 15);
    control.poke_u32(MEM1_START + 4, 16);
    scanner
        .next_scan(&mut accessor, ScanFilter::IncreasedBy, Some("5"), None)
        .unwrap();
    assert_eq!(results(&scanner), vec![MEM1_START]);
}

#[test]
fn unknown_initial_then_changed_narrows_to_the_writes() {
    let (mut accessor, control) = hooked(RamLayout::new(0x200, 0x200), false);

    let mut scanner = MemScanner::new(8);
    scanner
        .set_settings(ScanSettings {
            mem_type: MemType::Halfword,
            signedness: Signedness::Unsigned,
            ..ScanSettings::default()
        })
        .unwrap();
    let count = scanner
        .first_scan(&mut accessor, ScanFilter::UnknownInitial, None, None)
        .unwrap();
    assert_eq!(count, 0x100);
    assert!(scanner.was_unknown_initial());
    assert_eq!(scanner.result_at(0x10), Some(MEM1_START + 0x20));

    control.poke(MEM1_START + 0x42, &[0x12, 0x34]);
    control.poke(MEM1_START + 0x1FE, &[0xFF, 0xFF]);
    let count = scanner
        .next_scan(&mut accessor, ScanFilter::Changed, None, None)
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(results(&scanner), vec![MEM1_START + 0x42, MEM1_START + 0x1FE]);
    assert_eq!(scanner.formatted_scanned_value_at(1), "65535");
}

#[test]
fn scan_range_limits_candidates() {
    let (mut accessor, control) = hooked(RamLayout::new(0x400, 0x400), false);
    control.poke_u32(MEM1_START + 0x10, 9);
    control.poke_u32(MEM1_START + 0x100, 9);

    let mut scanner = MemScanner::new(8);
    scanner
        .set_settings(ScanSettings {
            range: Some((MEM1_START + 0x80, MEM1_START + 0x104)),
            ..ScanSettings::default()
        })
        .unwrap();
    scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("9"), None)
        .unwrap();
    assert_eq!(results(&scanner), vec![MEM1_START + 0x100]);

    // Settings are frozen while the session is active
    let err = scanner.set_settings(ScanSettings::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    scanner.reset();
    assert!(scanner.set_settings(ScanSettings::default()).is_ok());
}

#[test]
fn next_scan_requires_a_session() {
    let (mut accessor, _) = hooked(RamLayout::new(0x400, 0x400), false);
    let mut scanner = MemScanner::new(8);
    let err = scanner
        .next_scan(&mut accessor, ScanFilter::Changed, None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn backend_failure_unhooks_and_keeps_results() {
    let (mut accessor, control) = hooked(RamLayout::new(0x400, 0x400), false);
    control.poke_u32(MEM1_START + 8, 77);

    let mut scanner = MemScanner::new(8);
    scanner
        .first_scan(&mut accessor, ScanFilter::Exact, Some("77"), None)
        .unwrap();

    control.set_failing(true);
    let err = scanner
        .next_scan(&mut accessor, ScanFilter::Unchanged, None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationFailed);
    assert!(!accessor.is_hooked());
    assert_eq!(results(&scanner), vec![MEM1_START + 8]);
}
