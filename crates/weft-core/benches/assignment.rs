//! Benchmarks for expression assignment
//!
//! Measures end-to-end `assign` throughput on the host execution paths and
//! through the reference device, across sizes that land on each strategy.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use weft_core::{assign, assign_add, axpby, Engine, SimDevice, Tensor};

fn host_only_engine() -> Engine {
    Engine::with_device(Box::new(SimDevice::with_exports(Vec::new())))
}

fn filled(n: usize, value: f32) -> Tensor<f32> {
    let t = Tensor::new(&[n]);
    t.fill(value);
    t
}

fn benchmark_host_assignments(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_assignments");

    for size in [256, 1024, 3072, 16384, 100_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        // Binary add
        group.bench_with_input(BenchmarkId::new("add", size), size, |bencher, &size| {
            let engine = host_only_engine();
            let a = filled(size, 1.5);
            let b = filled(size, 2.5);
            let out = Tensor::<f32>::new(&[size]);

            bencher.iter(|| {
                assign(&engine, &out, &a + &b).unwrap();
            });
        });

        // Binary mul
        group.bench_with_input(BenchmarkId::new("mul", size), size, |bencher, &size| {
            let engine = host_only_engine();
            let a = filled(size, 1.5);
            let b = filled(size, 2.5);
            let out = Tensor::<f32>::new(&[size]);

            bencher.iter(|| {
                assign(&engine, &out, &a * &b).unwrap();
            });
        });

        // Fused alpha*x + beta*y
        group.bench_with_input(BenchmarkId::new("axpby", size), size, |bencher, &size| {
            let engine = host_only_engine();
            let x = filled(size, 1.5);
            let y = filled(size, 2.5);
            let out = Tensor::<f32>::new(&[size]);

            bencher.iter(|| {
                assign(&engine, &out, axpby(black_box(2.0), &x, black_box(-1.0), &y)).unwrap();
            });
        });

        // Softplus, the transcendental path
        group.bench_with_input(BenchmarkId::new("softplus", size), size, |bencher, &size| {
            let engine = host_only_engine();
            let a = filled(size, 0.5);
            let out = Tensor::<f32>::new(&[size]);

            bencher.iter(|| {
                assign(&engine, &out, a.as_expr().softplus()).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_device_assignments(c: &mut Criterion) {
    let mut group = c.benchmark_group("device_assignments");

    for size in [1024, 16384, 262_144].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        // Replacing launch; after the first iteration the source is resident
        // and no transfers remain in the loop.
        group.bench_with_input(BenchmarkId::new("scale", size), size, |bencher, &size| {
            let engine = Engine::new();
            let a = filled(size, 1.5);
            let out = Tensor::<f32>::new(&[size]);

            bencher.iter(|| {
                assign(&engine, &out, a.as_expr().scale(black_box(2.0))).unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("axpby", size), size, |bencher, &size| {
            let engine = Engine::new();
            let x = filled(size, 1.5);
            let y = filled(size, 2.5);
            let out = Tensor::<f32>::new(&[size]);

            bencher.iter(|| {
                assign(&engine, &out, axpby(black_box(2.0), &x, black_box(-1.0), &y)).unwrap();
            });
        });

        // Compound update: routine launch into scratch plus a combine launch.
        group.bench_with_input(
            BenchmarkId::new("add_assign_scaled", size),
            size,
            |bencher, &size| {
                let engine = Engine::new();
                let a = filled(size, 0.001);
                let out = Tensor::<f32>::new(&[size]);

                bencher.iter(|| {
                    assign_add(&engine, &out, a.as_expr().scale(black_box(0.5))).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn benchmark_strategy_boundaries(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_boundaries");

    // Straddles the parallel cutoff: the two smaller sizes run grouped on one
    // thread, the two larger ones split across the pool.
    for size in [4096, 10_000, 12_288, 1_000_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("add", size), size, |bencher, &size| {
            let engine = host_only_engine();
            let a = filled(size, 1.5);
            let b = filled(size, 2.5);
            let out = Tensor::<f32>::new(&[size]);

            bencher.iter(|| {
                assign(&engine, &out, &a + &b).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_host_assignments,
    benchmark_device_assignments,
    benchmark_strategy_boundaries
);
criterion_main!(benches);
