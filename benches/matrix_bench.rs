//! Benchmarks for matrix assembly and the linear solvers.
//!
//! Run with: `cargo bench --bench matrix_bench`
//!
//! Assembles a Laplacian on cubic block meshes and compares solver cost.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fv_rs::boundary::{FixedValue, ZeroGradient};
use fv_rs::field::GeometricField;
use fv_rs::fvm;
use fv_rs::linear_solver::SolverControls;
use fv_rs::matrix::FvMatrix;
use fv_rs::mesh::{FvMesh, HexBlock};
use fv_rs::types::{DIM_KINEMATIC_VISCOSITY, DIM_TIME, DIMLESS, Dimensioned};

fn cube(n: usize) -> FvMesh {
    HexBlock::new(n, n, n).build().expect("block mesh")
}

fn temperature(mesh: &FvMesh) -> GeometricField<f64> {
    GeometricField::builder("T", DIMLESS)
        .internal_uniform(0.0)
        .default_condition(ZeroGradient)
        .patch("left", FixedValue::uniform(0.0))
        .patch("right", FixedValue::uniform(1.0))
        .build(mesh)
        .expect("temperature field")
}

fn poisson(t: &GeometricField<f64>, mesh: &FvMesh) -> FvMatrix<f64> {
    let gamma = Dimensioned::new("gamma", DIM_KINEMATIC_VISCOSITY, 1.0);
    let s = Dimensioned::new("s", DIMLESS / DIM_TIME, 1.0);
    (-fvm::laplacian_uniform(&gamma, t, mesh, "Gauss linear corrected").expect("laplacian"))
        .equate_uniform(&s)
        .expect("source")
}

/// Benchmark Laplacian assembly for increasing mesh sizes.
fn bench_laplacian_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("laplacian_assembly");

    for n in [8, 16, 24] {
        let mesh = cube(n);
        let t = temperature(&mesh);
        // Warm the geometry cache so only assembly is timed
        let _ = mesh.geometry();

        group.bench_with_input(BenchmarkId::new("cells", n * n * n), &n, |b, _| {
            b.iter(|| poisson(black_box(&t), black_box(&mesh)));
        });
    }

    group.finish();
}

/// Benchmark the solvers on the same symmetric system.
fn bench_linear_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_solvers");
    group.sample_size(20);

    let mesh = cube(16);
    let seed = temperature(&mesh);
    let eqn = poisson(&seed, &mesh);

    let solvers = [
        ("PCG_DIC", SolverControls::pcg(1e-8, 0.0)),
        ("PCG_diagonal", SolverControls::pcg(1e-8, 0.0).with_preconditioner("diagonal")),
        ("PBiCGStab_DILU", SolverControls::pbicgstab(1e-8, 0.0)),
        ("GAMG", SolverControls::gamg(1e-8, 0.0)),
    ];

    for (label, controls) in &solvers {
        group.bench_function(*label, |b| {
            b.iter(|| {
                let mut t = seed.clone();
                eqn.solve(black_box(&mut t), &mesh, controls)
                    .expect("solve")
                    .n_iterations
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_laplacian_assembly, bench_linear_solvers);
criterion_main!(benches);
