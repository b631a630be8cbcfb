//! Throughput benchmarks for `Table::convert` across both interpolation methods.

use std::convert::Infallible;
use std::hint::black_box;

use colortable::{Concurrency, Method, Table, TableConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use smallvec::SmallVec;

/// `(r, g, b) -> (r, g, b, 0)`, standing in for a real (expensive) device-color evaluator.
struct PassThroughRgb;

impl colortable::Evaluator for PassThroughRgb {
    type Error = Infallible;
    fn evaluate(&self, input: &[f64]) -> Result<SmallVec<[u16; 8]>, Infallible> {
        let mut out: SmallVec<[u16; 8]> = input.iter().map(|&v| v.round() as u16).collect();
        out.push(0);
        Ok(out)
    }
}

fn config(method: Method, grid_side: usize) -> TableConfig {
    TableConfig {
        input_dims: 3,
        output_dims: 4,
        grid_side,
        input_range: vec![(0.0, (grid_side as f64 - 1.0) * 256.0); 3],
        device_levels: vec![256; 4],
        method,
        smoothness: 0.0,
        error_tolerance: 4.0,
        cache_bits: None,
        memory_limit_bytes: None,
        concurrency: Concurrency::FrontEnd,
    }
}

/// Interior, off-grid scaled inputs cycling through a handful of mini-cubes, so the benchmark
/// exercises the interpolator rather than just the previous-input short-circuit.
fn sweep_inputs(grid_side: usize, n: usize) -> Vec<i32> {
    let max_component = ((grid_side - 1) * 256) as i32;
    let mut inputs = Vec::with_capacity(n * 3);
    for i in 0..n {
        let base = ((i as i32 * 97) % max_component.max(1)).clamp(0, max_component - 256);
        inputs.extend_from_slice(&[base + 37, base + 91, base + 150]);
    }
    inputs
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    let grid_side = 17;
    let ncolors = 4096;
    let inputs = sweep_inputs(grid_side, ncolors);

    for method in [Method::Cubic, Method::Tetrahedral] {
        let table = Table::new(config(method, grid_side), PassThroughRgb).unwrap();
        let mut outputs = vec![0u16; ncolors * 4];
        // Warm the grid so the benchmark measures steady-state lookup/interpolation, not the
        // one-time corner population cost.
        table.convert(&inputs, &mut outputs).unwrap();

        group.bench_function(BenchmarkId::new("warm", format!("{method:?}")), |b| {
            b.iter(|| {
                table
                    .convert(black_box(&inputs), black_box(&mut outputs))
                    .unwrap();
            })
        });
    }

    group.finish();
}

fn bench_cold_populate(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_populate");
    let grid_side = 17;

    for method in [Method::Cubic, Method::Tetrahedral] {
        group.bench_function(BenchmarkId::new("single_pixel", format!("{method:?}")), |b| {
            b.iter(|| {
                let table = Table::new(config(method, grid_side), PassThroughRgb).unwrap();
                let mut out = [0u16; 4];
                table
                    .convert(black_box(&[500, 600, 700]), black_box(&mut out))
                    .unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_convert, bench_cold_populate);
criterion_main!(benches);
