use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dolphin_memory::core::types::{ScanFilter, DEFAULT_MEM1_SIZE, MEM1_START};
use dolphin_memory::memory::{MemScanner, RamLayout};
use dolphin_memory::process::{DolphinAccessor, SnapshotProcess};

fn hooked() -> (DolphinAccessor, SnapshotProcess) {
    let process = SnapshotProcess::new(RamLayout::new(DEFAULT_MEM1_SIZE, 0x0400_0000));
    let control = process.clone();
    for i in 0..4096u32 {
        control.poke_u32(MEM1_START + i * 0x1000, 1000 + i % 7);
    }
    let mut accessor = DolphinAccessor::new(Box::new(process));
    accessor.hook();
    (accessor, control)
}

fn benchmark_first_scan(c: &mut Criterion) {
    let (mut accessor, _control) = hooked();
    let mut scanner = MemScanner::new(4);

    c.bench_function("first_scan_exact_word", |b| {
        b.iter(|| {
            let count = scanner
                .first_scan(&mut accessor, ScanFilter::Exact, Some("1003"), None)
                .unwrap_or(0);
            black_box(count);
        });
    });
}

fn benchmark_unknown_then_changed(c: &mut Criterion) {
    let (mut accessor, control) = hooked();
    let mut scanner = MemScanner::new(4);

    c.bench_function("unknown_initial_then_changed", |b| {
        b.iter(|| {
            scanner
                .first_scan(&mut accessor, ScanFilter::UnknownInitial, None, None)
                .unwrap_or(0);
            control.poke_u32(MEM1_START + 0x40, 7);
            let count = scanner
                .next_scan(&mut accessor, ScanFilter::Changed, None, None)
                .unwrap_or(0);
            control.poke_u32(MEM1_START + 0x40, 0);
            black_box(count);
        });
    });
}

criterion_group!(benches, benchmark_first_scan, benchmark_unknown_then_changed);
criterion_main!(benches);
