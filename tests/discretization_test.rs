//! Properties of the discretized operators.
//!
//! Dimension checking of assembled equations, discrete conservation of the
//! Laplacian, boundedness of limited interpolation, exactness of the
//! least-squares gradient, idempotent boundary evaluation and the time
//! derivative of an unchanged field.

use fv_rs::boundary::{FixedGradient, FixedValue, Mixed, PatchValue, ZeroGradient};
use fv_rs::control::{Time, TimeControls};
use fv_rs::ddt::{Backward, Euler};
use fv_rs::field::{GeometricField, SurfaceField};
use fv_rs::interpolation::{InterpolationContext, create_interpolation_scheme};
use fv_rs::matrix::FvMatrix;
use fv_rs::mesh::{BlockSide, FvMesh, HexBlock, PatchKind, line_mesh};
use fv_rs::types::{
    CellIndex, DIM_AREA, DIM_KINEMATIC_VISCOSITY, DIM_LENGTH, DIM_TIME, DIM_VELOCITY, DIMLESS,
    Dimensioned, FieldValue, PatchIndex, Vector,
};
use fv_rs::{create_gradient_scheme, fvc, fvm};

const TOL: f64 = 1e-12;

/// `diag + Σ off-diagonals` per row, boundary coefficients included.
fn row_sums(m: &FvMatrix<f64>, mesh: &FvMesh) -> Vec<f64> {
    let ldu = m.ldu();
    let addr = ldu.addressing();
    let mut sums = ldu.diag().to_vec();
    for f in 0..addr.n_faces() {
        sums[addr.lower()[f]] += ldu.upper()[f];
        sums[addr.upper()[f]] += ldu.lower()[f];
    }
    for i in 0..mesh.patches().len() {
        let index = PatchIndex::new(i);
        for (&c, ic) in mesh.face_cells(index).iter().zip(m.internal_coeffs(index)) {
            sums[c] += ic;
        }
    }
    sums
}

fn arbitrary_field(mesh: &FvMesh) -> GeometricField<f64> {
    GeometricField::builder("T", DIMLESS)
        .internal_from_centres(|c| (3.0 * c.x).sin() + c.y * c.y - 2.0 * c.z)
        .default_condition(ZeroGradient)
        .build(mesh)
        .unwrap()
}

// =============================================================================
// Dimensional consistency
// =============================================================================

#[test]
fn test_transport_equation_terms_share_dimensions() {
    let mesh = line_mesh(10, 1.0).unwrap();
    let t = GeometricField::uniform("T", &mesh, DIMLESS, 0.0, "zeroGradient").unwrap();
    let phi = SurfaceField::uniform("phi", &mesh, DIM_VELOCITY * DIM_AREA, 0.2);
    let nu = Dimensioned::new("nu", DIM_KINEMATIC_VISCOSITY, 0.01);
    let time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();
    let source = Dimensioned::new("S", DIMLESS / DIM_TIME, 1.0);

    let eqn = (fvm::ddt(&Euler, None, &t, &mesh, &time).unwrap()
        + fvm::div(&phi, &t, &mesh, "Gauss upwind").unwrap())
    .unwrap()
    .equate(fvm::laplacian_uniform(&nu, &t, &mesh, "Gauss linear corrected").unwrap())
    .unwrap()
    .equate_uniform(&source)
    .unwrap();
    assert_eq!(eqn.dimensions(), DIM_LENGTH * DIM_LENGTH * DIM_LENGTH / DIM_TIME);

    // Each term of the source times the cell volume carries the matrix dimensions.
    let explicit = fvc::laplacian_uniform(&nu, &t, &mesh, "Gauss linear corrected").unwrap();
    let ddt = fvm::ddt(&Euler, None, &t, &mesh, &time).unwrap();
    assert!(ddt.equate_field(&explicit).is_ok());
}

#[test]
fn test_mismatched_terms_are_rejected() {
    let mesh = line_mesh(4, 1.0).unwrap();
    let t = GeometricField::uniform("T", &mesh, DIMLESS, 0.0, "zeroGradient").unwrap();
    let time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();

    // Diffusivity without the kinematic viscosity dimensions
    let k = Dimensioned::new("k", DIMLESS, 1.0);
    let bad = fvm::laplacian_uniform(&k, &t, &mesh, "Gauss linear uncorrected").unwrap();
    let ddt = fvm::ddt(&Euler, None, &t, &mesh, &time).unwrap();
    let err = (ddt.clone() + bad.clone()).unwrap_err();
    assert!(err.to_string().contains("Dimension mismatch"), "{err}");
    assert!(ddt.clone().equate(bad).is_err());

    // Explicit source in the wrong units
    let wrong_source = GeometricField::uniform("S", &mesh, DIMLESS, 1.0, "zeroGradient").unwrap();
    assert!(ddt.clone().add_field(&wrong_source).is_err());
    assert!(ddt.equate_uniform(&Dimensioned::new("s", DIM_VELOCITY, 1.0)).is_err());
}

// =============================================================================
// Conservation
// =============================================================================

#[test]
fn test_laplacian_rows_sum_to_zero_on_closed_cube() {
    let mesh = HexBlock::new(2, 2, 2).build().unwrap();
    let t = arbitrary_field(&mesh);
    let gamma = SurfaceField::uniform("gamma", &mesh, DIMLESS, 1.0);

    let lap = fvm::laplacian(&gamma, &t, &mesh, "Gauss linear corrected").unwrap();
    let diffusion = -fvm::laplacian(&gamma, &t, &mesh, "Gauss linear corrected").unwrap();

    for m in [&lap, &diffusion] {
        for s in row_sums(m, &mesh) {
            assert!(s.abs() < TOL, "row sum {s}");
        }
        // Σ_cells (A T)_c vanishes for any T.
        let mut at = vec![0.0; mesh.n_cells()];
        m.ldu().amul(t.internal(), &mut at);
        assert!(at.iter().sum::<f64>().abs() < 1e-12);
    }

    // Diffusion term form: off-diagonal -Γ|Sf|/|d|, diagonal the negated sum.
    let off = -0.25 / 0.5;
    assert!(diffusion.ldu().upper().iter().all(|&u| (u - off).abs() < TOL));
    assert!(diffusion.diag().iter().all(|&d| (d + 3.0 * off).abs() < TOL));
    assert!(lap.ldu().upper().iter().all(|&u| (u + off).abs() < TOL));
}

#[test]
fn test_closed_domain_keeps_total_content() {
    let mesh = HexBlock::new(3, 3, 3).build().unwrap();
    let mut t = arbitrary_field(&mesh);
    let nu = Dimensioned::new("nu", DIM_KINEMATIC_VISCOSITY, 0.5);
    let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();
    let initial = fvc::domain_integrate(&t, &mesh).unwrap().value;

    for _ in 0..5 {
        time.advance();
        t.store_old_times(time.time_index());
        let eqn = fvm::ddt(&Euler, None, &t, &mesh, &time)
            .unwrap()
            .equate(fvm::laplacian_uniform(&nu, &t, &mesh, "Gauss linear corrected").unwrap())
            .unwrap();
        eqn.solve(&mut t, &mesh, &fv_rs::SolverControls::pcg(1e-14, 0.0)).unwrap();
    }
    let total = fvc::domain_integrate(&t, &mesh).unwrap().value;
    assert!((total - initial).abs() < 1e-9, "{initial} -> {total}");
}

// =============================================================================
// Interpolation boundedness
// =============================================================================

#[test]
fn test_limited_schemes_do_not_create_extrema_across_a_step() {
    let mesh = line_mesh(10, 1.0).unwrap();
    let step: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
        .internal_from_centres(|c| if c.x < 0.5 { 1.0 } else { 0.0 })
        .default_condition(ZeroGradient)
        .patch("left", FixedValue::uniform(1.0))
        .build(&mesh)
        .unwrap();
    let mut phi = SurfaceField::uniform("phi", &mesh, DIM_VELOCITY * DIM_AREA, 1.0);
    phi.boundary_mut()[mesh.patch_by_name("left").unwrap().get()].fill(-1.0);
    phi.boundary_mut()[mesh.patch_by_name("frontAndBack").unwrap().get()].fill(0.0);
    let ctx = InterpolationContext::new(&mesh).with_flux(Some(&phi));

    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    for scheme in [
        "Minmod",
        "vanLeer",
        "SuperBee",
        "MUSCL",
        "vanAlbada",
        "UMIST",
        "QUICK",
        "limitedLinear 1",
        "Gamma 1",
    ] {
        let face = create_interpolation_scheme::<f64>(scheme)
            .unwrap()
            .interpolate(&ctx, &step)
            .unwrap();
        for (f, &v) in face.internal().iter().enumerate() {
            let p = step.internal()[owner[f]];
            let n = step.internal()[neighbour[f]];
            assert!(
                v >= p.min(n) - TOL && v <= p.max(n) + TOL,
                "{scheme}: face {f} value {v} outside [{}, {}]",
                p.min(n),
                p.max(n)
            );
        }
    }
}

// =============================================================================
// Least-squares gradient
// =============================================================================

#[test]
fn test_least_squares_gradient_is_exact_for_linear_fields() {
    let mesh = HexBlock::new(4, 4, 4)
        .size(2.0, 1.0, 1.5)
        .grading(2.0, 1.0, 0.5)
        .build()
        .unwrap();
    let b = Vector::new(1.5, -2.0, 0.25);
    let phi: GeometricField<f64> = GeometricField::builder("phi", DIMLESS)
        .internal_from_centres(move |c| 3.0 + b.dot(&c))
        .default_condition(ZeroGradient)
        .build(&mesh)
        .unwrap();

    for scheme in ["leastSquares", "pointCellsLeastSquares"] {
        let grad = create_gradient_scheme::<f64>(scheme).unwrap().grad(&phi, &mesh).unwrap();
        let mut checked = 0;
        for c in 0..mesh.n_cells() {
            if mesh.cell_cells(CellIndex::new(c)).len() < 6 {
                continue;
            }
            let g = grad.internal()[c];
            assert!((g - b).mag() < 1e-10, "{scheme}: cell {c} gradient {g:?}");
            checked += 1;
        }
        assert_eq!(checked, 8);
    }
}

// =============================================================================
// Boundary evaluation
// =============================================================================

#[test]
fn test_repeated_boundary_correction_is_idempotent() {
    let mesh = HexBlock::new(3, 3, 2)
        .patch(BlockSide::Back, "symm", PatchKind::Symmetry)
        .cyclic(BlockSide::Bottom, BlockSide::Top)
        .build()
        .unwrap();
    let mut u: GeometricField<Vector> = GeometricField::builder("U", DIM_VELOCITY)
        .internal_from_centres(|c| Vector::new(1.0 + c.y, c.x * c.z, 0.5 - c.x))
        .default_condition(ZeroGradient)
        .patch("left", FixedValue::uniform(Vector::new(1.0, 0.0, 0.0)))
        .patch("right", FixedGradient::uniform(Vector::new(0.0, 2.0, 0.0)))
        .patch(
            "front",
            Mixed::new(
                PatchValue::Uniform(Vector::new(0.0, 0.0, 1.0)),
                PatchValue::Uniform(Vector::ZERO),
                PatchValue::Uniform(0.4),
            ),
        )
        .build(&mesh)
        .unwrap();

    let snapshot = |u: &GeometricField<Vector>| -> Vec<Vec<Vector>> {
        u.boundary_field().iter().map(|p| p.values().to_vec()).collect()
    };
    let first = snapshot(&u);
    u.correct_boundary_conditions(&mesh).unwrap();
    let second = snapshot(&u);
    u.correct_boundary_conditions(&mesh).unwrap();
    assert_eq!(first, second);
    assert_eq!(second, snapshot(&u));
}

// =============================================================================
// Time derivative
// =============================================================================

#[test]
fn test_ddt_of_unchanged_field_vanishes() {
    let mesh = HexBlock::new(3, 2, 1).build().unwrap();
    let mut t = arbitrary_field(&mesh);
    let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.05)).unwrap();
    for _ in 0..2 {
        time.advance();
        t.store_old_times(time.time_index());
    }
    assert_eq!(t.n_old_times(), 2);

    let rate = fvc::ddt(&Euler, None, &t, &mesh, &time).unwrap();
    assert!(rate.internal().iter().all(|v| v.abs() < TOL));
    assert_eq!(rate.dimensions(), DIMLESS / DIM_TIME);

    for m in [
        fvm::ddt(&Euler, None, &t, &mesh, &time).unwrap(),
        fvm::ddt(&Backward, None, &t, &mesh, &time).unwrap(),
    ] {
        let residual = m.residual(&t, &mesh).unwrap();
        assert!(residual.iter().all(|r| r.abs() < 1e-9), "{residual:?}");
    }
}
