//! Benchmarks for the per-instruction and per-access debugger paths

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rd_core::{Architecture, MemoryReadFn};
use rd_debug::watchpoint::WatchpointRequest;
use rd_debug::{AccessType, BreakpointManager, DataType, DisassemblyViewer, WatchpointManager};
use std::sync::Arc;

fn bench_should_break(c: &mut Criterion) {
    let mut group = c.benchmark_group("should_break");

    for count in [0usize, 16, 256].iter() {
        let mut manager = BreakpointManager::new();
        for i in 0..*count {
            manager.add_breakpoint(0x10_0000 + (i as u32) * 4, Architecture::M68K, "", "");
        }

        group.bench_with_input(BenchmarkId::new("miss", count), count, |b, _| {
            b.iter(|| manager.should_break(black_box(0x2000), Architecture::M68K));
        });
    }

    let mut manager = BreakpointManager::new();
    manager.add_breakpoint(0x2000, Architecture::M68K, "$value == 0", "");
    group.bench_function("conditional_hit", |b| {
        b.iter(|| manager.should_break(black_box(0x2000), Architecture::M68K));
    });

    group.finish();
}

fn bench_check_memory_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_memory_write");
    group.throughput(Throughput::Elements(1));

    for count in [0u32, 8, 64].iter() {
        let manager = WatchpointManager::new();
        for i in 0..*count {
            manager.add_watchpoint(WatchpointRequest::new(
                0x8000 + i * 0x10,
                DataType::DWord,
                AccessType::Write,
            ));
        }

        group.bench_with_input(BenchmarkId::new("unwatched_page", count), count, |b, _| {
            b.iter(|| manager.check_memory_write(black_box(0x40_0000), 1, 4, None));
        });
        group.bench_with_input(BenchmarkId::new("watched_page", count), count, |b, _| {
            b.iter(|| manager.check_memory_write(black_box(0x8004), 1, 4, None));
        });
    }

    group.finish();
}

fn bench_disassemble_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("disassemble_range");

    // NOP-sled style images for each decoder
    let images: [(Architecture, &[u8]); 3] = [
        (Architecture::M68K, &[0x4E, 0x71]),
        (Architecture::Z80, &[0x00]),
        (Architecture::M6502, &[0xEA]),
    ];

    for (arch, pattern) in images {
        let image: Arc<Vec<u8>> = Arc::new(pattern.iter().copied().cycle().take(0x10000).collect());
        let read: MemoryReadFn = Arc::new(move |addr: u32| image[(addr & 0xFFFF) as usize]);
        let mut viewer = DisassemblyViewer::new(arch);
        viewer.set_memory_read_function(read);

        for lines in [20usize, 200].iter() {
            group.throughput(Throughput::Elements(*lines as u64));
            group.bench_with_input(BenchmarkId::new(arch.as_str(), lines), lines, |b, &lines| {
                b.iter(|| black_box(viewer.disassemble_range(black_box(0x1000), lines)));
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_should_break,
    bench_check_memory_write,
    bench_disassemble_range
);
criterion_main!(benches);
