//! Second-order backward differencing with variable step size.

use super::{DdtScheme, Level, combine_levels, ddt_matrix_dimensions, rate_dimensions};
use crate::control::Time;
use crate::error::Result;
use crate::field::{GeometricField, VolScalarField};
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::types::{FieldValue, GREAT};

/// Three-level backward scheme.
///
/// With `Δt` the current and `Δt⁰` the previous step:
///
/// ```text
/// c   = 1 + Δt/(Δt + Δt⁰)
/// c00 = Δt²/(Δt⁰ (Δt + Δt⁰))
/// c0  = c + c00
/// ddt = (c ρψ - c0 ρ⁰ψ⁰ + c00 ρ⁰⁰ψ⁰⁰)/Δt
/// ```
///
/// While fewer than two old levels are stored `Δt⁰` is taken as infinite,
/// which reduces the scheme to Euler.
#[derive(Clone, Copy, Debug, Default)]
pub struct Backward;

/// `(c, c0, c00)` for the current step.
fn coefficients<T: FieldValue>(psi: &GeometricField<T>, time: &Time) -> (f64, f64, f64) {
    let dt = time.delta_t();
    let dt0 = if psi.n_old_times() < 2 { GREAT } else { time.delta_t0() };
    let coefft = 1.0 + dt / (dt + dt0);
    let coefft00 = dt * dt / (dt0 * (dt + dt0));
    (coefft, coefft + coefft00, coefft00)
}

impl<T: FieldValue> DdtScheme<T> for Backward {
    fn name(&self) -> &'static str {
        "backward"
    }

    fn fvm_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<FvMatrix<T>> {
        let (coefft, coefft0, coefft00) = coefficients(psi, time);
        let r_delta_t = 1.0 / time.delta_t();
        let geo = mesh.geometry();
        let mut fvm = FvMatrix::new(psi, mesh, ddt_matrix_dimensions(rho, psi))?;
        let current = Level::of(psi, rho, 0);
        let old = Level::of(psi, rho, 1);
        let old_old = Level::of(psi, rho, 2);
        for c in 0..mesh.n_cells() {
            let v = r_delta_t * geo.cell_volumes[c];
            fvm.ldu_mut().diag_mut()[c] = coefft * v * current.rho_cell(c);
            fvm.source_mut()[c] = (old.cell(c) * coefft0 - old_old.cell(c) * coefft00) * v;
        }
        Ok(fvm)
    }

    fn fvc_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<GeometricField<T>> {
        let (coefft, coefft0, coefft00) = coefficients(psi, time);
        let r_delta_t = 1.0 / time.delta_t();
        let levels = [
            Level::of(psi, rho, 0),
            Level::of(psi, rho, 1),
            Level::of(psi, rho, 2),
        ];
        combine_levels(
            format!("ddt({})", psi.name()),
            mesh,
            rate_dimensions(rho, psi),
            &levels,
            |v| (v[0] * coefft - v[1] * coefft0 + v[2] * coefft00) * r_delta_t,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ZeroGradient;
    use crate::control::TimeControls;
    use crate::ddt::Euler;
    use crate::mesh::line_mesh;
    use crate::types::DIMLESS;

    const TOL: f64 = 1e-10;

    /// Advance `psi(t) = t²` through three unequal steps.
    fn quadratic_history() -> (FvMesh, GeometricField<f64>, Time) {
        let mesh = line_mesh(3, 1.0).unwrap();
        let mut psi = GeometricField::builder("T", DIMLESS)
            .internal_uniform(0.0)
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let mut time = Time::new(TimeControls::new(0.0, 10.0, 0.1)).unwrap();
        for dt in [0.1, 0.2, 0.3] {
            time.set_delta_t(dt).unwrap();
            time.advance();
            psi.store_old_times(time.time_index());
            let t = time.value();
            psi.internal_mut().fill(t * t);
            psi.correct_boundary_conditions(&mesh).unwrap();
        }
        (mesh, psi, time)
    }

    #[test]
    fn test_exact_for_quadratic_in_time() {
        let (mesh, psi, time) = quadratic_history();
        let ddt = Backward.fvc_ddt(None, &psi, &mesh, &time).unwrap();
        // d(t²)/dt at t = 0.6
        for v in ddt.internal().iter() {
            assert!((v - 1.2).abs() < TOL, "{v}");
        }
        let euler = Euler.fvc_ddt(None, &psi, &mesh, &time).unwrap();
        assert!((euler.internal()[0] - 1.2).abs() > 0.1);
    }

    #[test]
    fn test_matrix_matches_explicit_rate() {
        let (mesh, psi, time) = quadratic_history();
        let fvm = Backward.fvm_ddt(None, &psi, &mesh, &time).unwrap();
        let explicit = Backward.fvc_ddt(None, &psi, &mesh, &time).unwrap();
        let residual = fvm.residual(&psi, &mesh).unwrap();
        let geo = mesh.geometry();
        for c in 0..mesh.n_cells() {
            let a_psi = fvm.diag()[c] * psi.internal()[c] - fvm.source()[c];
            assert!((a_psi - explicit.internal()[c] * geo.cell_volumes[c]).abs() < TOL);
            assert!(residual[c].is_finite());
        }
    }

    #[test]
    fn test_first_step_reduces_to_euler() {
        let mesh = line_mesh(2, 1.0).unwrap();
        let mut psi = GeometricField::builder("T", DIMLESS)
            .internal_uniform(1.0)
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.5)).unwrap();
        time.advance();
        psi.store_old_times(time.time_index());
        assert_eq!(psi.n_old_times(), 1);
        let backward = Backward.fvm_ddt(None, &psi, &mesh, &time).unwrap();
        let euler = Euler.fvm_ddt(None, &psi, &mesh, &time).unwrap();
        for c in 0..2 {
            assert!((backward.diag()[c] - euler.diag()[c]).abs() < 1e-12);
            assert!((backward.source()[c] - euler.source()[c]).abs() < 1e-12);
        }
    }
}
