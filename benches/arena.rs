//! Region benchmarks
//!
//! Bump allocation against the system allocator, slice growth at and away
//! from the tip, and piecewise string building.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use region_arena::{AllocFlags, Arena, Slice, Str};

fn bench_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc");

    for size in [16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("arena", size), &size, |b, &size| {
            let mut arena = Arena::with_capacity(1 << 20).expect("arena");
            b.iter(|| {
                for _ in 0..1000 {
                    black_box(arena.alloc(size, 8, 1, AllocFlags::NO_INIT).expect("alloc"));
                }
                arena.reset();
            });
        });

        group.bench_with_input(BenchmarkId::new("box", size), &size, |b, &size| {
            b.iter(|| {
                for _ in 0..1000 {
                    black_box(vec![0u8; size].into_boxed_slice());
                }
            });
        });
    }

    group.finish();
}

fn bench_virtual_growth(c: &mut Criterion) {
    c.bench_function("virtual_commit_1mb", |b| {
        b.iter(|| {
            let arena = Arena::virtual_memory(16, 4096).expect("virtual arena");
            for _ in 0..256 {
                black_box(arena.alloc(4096, 16, 1, AllocFlags::NO_INIT).expect("alloc"));
            }
        });
    });
}

fn bench_slice_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_push");

    group.bench_function("at_tip", |b| {
        let mut arena = Arena::with_capacity(1 << 22).expect("arena");
        b.iter(|| {
            {
                let mut slice = Slice::new();
                for i in 0..10_000u32 {
                    slice.push(&arena, i).expect("push");
                }
                black_box(slice.len());
            }
            arena.reset();
        });
    });

    group.bench_function("interleaved", |b| {
        let mut arena = Arena::with_capacity(1 << 22).expect("arena");
        b.iter(|| {
            {
                let mut slice = Slice::new();
                for i in 0..10_000u32 {
                    slice.push(&arena, i).expect("push");
                    arena.alloc(1, 1, 1, AllocFlags::NO_INIT).expect("spacer");
                }
                black_box(slice.len());
            }
            arena.reset();
        });
    });

    group.finish();
}

fn bench_str_concat(c: &mut Criterion) {
    let words: Vec<String> = (0..1000).map(|i| format!("word{} ", i)).collect();

    c.bench_function("str_cat_1000", |b| {
        let mut arena = Arena::with_capacity(1 << 20).expect("arena");
        b.iter(|| {
            {
                let mut s = Str::empty();
                for word in &words {
                    s = s.cat_str(&arena, word).expect("cat");
                }
                black_box(s.hash64());
            }
            arena.reset();
        });
    });

    c.bench_function("string_push_str_1000", |b| {
        b.iter(|| {
            let mut s = String::new();
            for word in &words {
                s.push_str(word);
            }
            black_box(s.len());
        });
    });
}

criterion_group!(benches, bench_alloc, bench_virtual_growth, bench_slice_push, bench_str_concat);
criterion_main!(benches);
