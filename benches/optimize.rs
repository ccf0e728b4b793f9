//! Optimizer Benchmark
//!
//! Benchmarks the optimize pipeline and evaluation before and after it on a
//! sum of N mixed terms.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use symb_opt::{Func, FunctionParser, ProgramBuilder};

// =============================================================================
// Program Generator
// =============================================================================

/// Sum of `n` terms over x, cycling through:
/// - `i*x*x + 0`
/// - `sin(x) * (i + 1)`
/// - `(x + i) * 1 - x`
/// - `exp(x) * exp(x)`
fn mixed_sum(n: u32) -> ProgramBuilder<f64> {
    let mut builder = ProgramBuilder::new(1);
    for i in 0..n {
        let k = f64::from(i);
        builder = match i % 4 {
            0 => builder
                .constant(k)
                .var(0)
                .op(Func::Mul)
                .var(0)
                .op(Func::Mul)
                .constant(0.0)
                .op(Func::Add),
            1 => builder
                .var(0)
                .op(Func::Sin)
                .constant(k)
                .constant(1.0)
                .op(Func::Add)
                .op(Func::Mul),
            2 => builder
                .var(0)
                .constant(k)
                .op(Func::Add)
                .constant(1.0)
                .op(Func::Mul)
                .var(0)
                .op(Func::Sub),
            _ => builder
                .var(0)
                .op(Func::Exp)
                .var(0)
                .op(Func::Exp)
                .op(Func::Mul),
        };
        if i > 0 {
            builder = builder.op(Func::Add);
        }
    }
    builder
}

fn parser(n: u32) -> FunctionParser<f64> {
    let program = mixed_sum(n).build().expect("generated program is valid");
    FunctionParser::from_program(program).expect("generated program is valid")
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    for n in [10, 100, 300] {
        let source = parser(n);
        group.bench_with_input(BenchmarkId::new("mixed_sum", n), &source, |b, source| {
            b.iter(|| {
                let mut p = source.clone();
                p.optimize();
                black_box(p)
            });
        });
    }
    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval_mixed_300");
    let original = parser(300);
    let mut optimized = original.clone();
    optimized.optimize();
    let points: Vec<[f64; 1]> = (0..1000).map(|i| [f64::from(i) / 1000.0]).collect();

    group.bench_function("unoptimized", |b| {
        b.iter(|| black_box(original.eval_batch(black_box(&points))));
    });
    group.bench_function("optimized", |b| {
        b.iter(|| black_box(optimized.eval_batch(black_box(&points))));
    });
    group.finish();
}

criterion_group!(benches, bench_optimize, bench_eval);
criterion_main!(benches);
