//! First-order schemes: `steadyState`, `Euler` and local time stepping.

use std::sync::Mutex;

use super::{DdtScheme, Level, combine_levels, ddt_matrix_dimensions, rate_dimensions};
use crate::control::Time;
use crate::control::courant::sum_mag_flux;
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField, VolScalarField};
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::types::{FieldValue, GREAT, PatchIndex};

/// Zero time derivative.
#[derive(Clone, Copy, Debug, Default)]
pub struct SteadyState;

impl<T: FieldValue> DdtScheme<T> for SteadyState {
    fn name(&self) -> &'static str {
        "steadyState"
    }

    fn fvm_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        _time: &Time,
    ) -> Result<FvMatrix<T>> {
        FvMatrix::new(psi, mesh, ddt_matrix_dimensions(rho, psi))
    }

    fn fvc_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        _time: &Time,
    ) -> Result<GeometricField<T>> {
        let patch_values = mesh.patches().iter().map(|p| Field::zeros(p.size)).collect();
        GeometricField::calculated(
            format!("ddt({})", psi.name()),
            mesh,
            rate_dimensions(rho, psi),
            Field::zeros(mesh.n_cells()),
            patch_values,
        )
    }
}

/// Implicit Euler with per-cell reciprocal time steps.
fn euler_matrix<T: FieldValue>(
    rho: Option<&VolScalarField>,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
    r_delta_t: impl Fn(usize) -> f64,
) -> Result<FvMatrix<T>> {
    let geo = mesh.geometry();
    let mut fvm = FvMatrix::new(psi, mesh, ddt_matrix_dimensions(rho, psi))?;
    let current = Level::of(psi, rho, 0);
    let old = Level::of(psi, rho, 1);
    for c in 0..mesh.n_cells() {
        let coeff = r_delta_t(c) * geo.cell_volumes[c];
        fvm.ldu_mut().diag_mut()[c] = coeff * current.rho_cell(c);
        fvm.source_mut()[c] = old.cell(c) * coeff;
    }
    Ok(fvm)
}

/// First-order implicit `(ρψ - ρ⁰ψ⁰)/Δt`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Euler;

impl<T: FieldValue> DdtScheme<T> for Euler {
    fn name(&self) -> &'static str {
        "Euler"
    }

    fn fvm_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<FvMatrix<T>> {
        let r_delta_t = 1.0 / time.delta_t();
        euler_matrix(rho, psi, mesh, |_| r_delta_t)
    }

    fn fvc_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<GeometricField<T>> {
        let r_delta_t = 1.0 / time.delta_t();
        let levels = [Level::of(psi, rho, 0), Level::of(psi, rho, 1)];
        combine_levels(
            format!("ddt({})", psi.name()),
            mesh,
            rate_dimensions(rho, psi),
            &levels,
            |v| (v[0] - v[1]) * r_delta_t,
        )
    }
}

/// Euler with a local time step per cell, for pseudo-transient iteration
/// towards a steady state.
///
/// `1/Δt_c = max(1/maxDeltaT, Σ_f |φ_f| / (2 maxCo V_c))`, recomputed by
/// [`DdtScheme::update`] from the current face flux. Before the first update
/// the global `Δt` is used.
#[derive(Debug)]
pub struct LocalEuler {
    max_co: f64,
    max_delta_t: f64,
    r_delta_t: Mutex<Option<Vec<f64>>>,
}

impl Default for LocalEuler {
    fn default() -> Self {
        Self {
            max_co: 0.9,
            max_delta_t: GREAT,
            r_delta_t: Mutex::new(None),
        }
    }
}

impl LocalEuler {
    pub fn with_max_co(mut self, max_co: f64) -> Self {
        self.max_co = max_co;
        self
    }

    pub fn with_max_delta_t(mut self, max_delta_t: f64) -> Self {
        self.max_delta_t = max_delta_t;
        self
    }

    pub fn max_co(&self) -> f64 {
        self.max_co
    }

    /// Current per-cell `1/Δt`, if computed.
    pub fn r_delta_t(&self) -> Option<Vec<f64>> {
        match self.r_delta_t.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl<T: FieldValue> DdtScheme<T> for LocalEuler {
    fn name(&self) -> &'static str {
        "localEuler"
    }

    fn fvm_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<FvMatrix<T>> {
        let stored = self.r_delta_t();
        let fallback = 1.0 / time.delta_t();
        euler_matrix(rho, psi, mesh, |c| {
            stored.as_ref().and_then(|r| r.get(c).copied()).unwrap_or(fallback)
        })
    }

    fn fvc_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<GeometricField<T>> {
        let stored = self.r_delta_t();
        let fallback = 1.0 / time.delta_t();
        let current = Level::of(psi, rho, 0);
        let old = Level::of(psi, rho, 1);
        let internal: Field<T> = (0..mesh.n_cells())
            .map(|c| {
                let r = stored.as_ref().and_then(|r| r.get(c).copied()).unwrap_or(fallback);
                (current.cell(c) - old.cell(c)) * r
            })
            .collect();
        // Patch values take the rate of the adjacent cell.
        let patch_values = (0..mesh.patches().len())
            .map(|p| {
                mesh.face_cells(PatchIndex::new(p))
                    .iter()
                    .map(|&c| internal[c])
                    .collect()
            })
            .collect();
        let mut field = GeometricField::calculated(
            format!("ddt({})", psi.name()),
            mesh,
            rate_dimensions(rho, psi),
            internal,
            patch_values,
        )?;
        field.correct_boundary_conditions(mesh)?;
        Ok(field)
    }

    fn update(&mut self, mesh: &FvMesh, phi: &SurfaceField<f64>, _time: &Time) -> Result<()> {
        if !(self.max_co > 0.0) {
            return Err(FvError::InvalidConfig(format!(
                "localEuler maxCo must be positive, got {}",
                self.max_co
            )));
        }
        let sum_phi = sum_mag_flux(mesh, phi);
        let geo = mesh.geometry();
        let floor = 1.0 / self.max_delta_t;
        let r: Vec<f64> = sum_phi
            .iter()
            .zip(&geo.cell_volumes)
            .map(|(s, v)| (s / (2.0 * self.max_co * v)).max(floor))
            .collect();
        log::debug!(
            "localEuler deltaT range [{}, {}]",
            1.0 / r.iter().copied().fold(f64::MIN, f64::max),
            1.0 / r.iter().copied().fold(f64::MAX, f64::min)
        );
        let slot = match self.r_delta_t.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(r);
        Ok(())
    }
}
