use RustedCalculus::numerical::polar_area::solve_polar_area;
use RustedCalculus::solver::supervisor::IntegralSolver;
use criterion::{Criterion, criterion_group, criterion_main};
use std::f64::consts::TAU;
use std::hint::black_box;

fn bench_technique_chain(c: &mut Criterion) {
    let solver = IntegralSolver::new();
    let mut group = c.benchmark_group("integral solver");
    for input in ["x**2", "2*x*exp(x**2)", "x*exp(x)", "(x + 3)/(x^2 - 3*x + 2)"] {
        group.bench_function(input, |b| {
            b.iter(|| solver.solve_integral(black_box(input), "x"))
        });
    }
    group.finish();
}

fn bench_polar_area(c: &mut Criterion) {
    c.bench_function("rose against the pole", |b| {
        b.iter(|| solve_polar_area(black_box("sin(2*theta)"), "0", "theta", 0.0, TAU, "auto"))
    });
    c.bench_function("cardioid outside circle, polar", |b| {
        b.iter(|| solve_polar_area(black_box("1 + cos(theta)"), "1", "theta", 0.0, TAU, "polar"))
    });
}

criterion_group!(benches, bench_technique_chain, bench_polar_area);
criterion_main!(benches);
