//! Off-centred Crank-Nicolson.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{DdtScheme, Level, ddt_matrix_dimensions, rate_dimensions};
use crate::control::Time;
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, VolScalarField};
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::types::{FieldValue, PatchIndex};

/// Stored old-time rate `ddt0` of one field.
#[derive(Clone, Debug)]
struct Ddt0<T> {
    values: Vec<T>,
    /// Step at which the state was created
    start_time_index: usize,
    /// Step at which `values` were last advanced
    time_index: usize,
}

/// Crank-Nicolson with off-centering coefficient `ψ`.
///
/// `ψ = 1` is pure Crank-Nicolson, `ψ = 0` is Euler. The scheme keeps the
/// time derivative at the old time level (`ddt0`) per field between steps:
///
/// ```text
/// (1 + ψ)(ρψ - ρ⁰ψ⁰)/Δt - ψ ddt0 = ∂(ρψ)/∂t
/// ddt0 ← (1 + ψ)(ρ⁰ψ⁰ - ρ⁰⁰ψ⁰⁰)/Δt⁰ - ψ ddt0
/// ```
///
/// The first step after the state is created is Euler, and the update of
/// `ddt0` on the second step uses the Euler coefficient as well.
#[derive(Debug)]
pub struct CrankNicolson<T> {
    off_centre: f64,
    ddt0: Mutex<HashMap<String, Ddt0<T>>>,
}

impl<T: FieldValue> CrankNicolson<T> {
    pub fn new(off_centre: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&off_centre) {
            return Err(FvError::InvalidConfig(format!(
                "CrankNicolson off-centering coefficient {off_centre} is outside [0, 1]"
            )));
        }
        Ok(Self {
            off_centre,
            ddt0: Mutex::new(HashMap::new()),
        })
    }

    pub fn off_centre(&self) -> f64 {
        self.off_centre
    }

    fn coef(&self, state: &Ddt0<T>, time_index: usize) -> f64 {
        if time_index > state.start_time_index {
            1.0 + self.off_centre
        } else {
            1.0
        }
    }

    fn coef0(&self, state: &Ddt0<T>, time_index: usize) -> f64 {
        if time_index > state.start_time_index + 1 {
            1.0 + self.off_centre
        } else {
            1.0
        }
    }

    /// Advance the stored `ddt0` of `key` to the current step and return
    /// `(rDtCoef, ψ ddt0)`.
    fn advance_ddt0(
        &self,
        key: String,
        n_cells: usize,
        old: &Level<'_, T>,
        old_old: &Level<'_, T>,
        time: &Time,
    ) -> (f64, Vec<T>) {
        let mut states = match self.ddt0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let time_index = time.time_index();
        let state = states.entry(key).or_insert_with(|| Ddt0 {
            values: vec![T::zero(); n_cells],
            start_time_index: time_index,
            time_index,
        });
        if state.values.len() != n_cells {
            state.values = vec![T::zero(); n_cells];
        }
        if state.time_index != time_index {
            let r_dt_coef0 = self.coef0(state, time_index) / time.delta_t0();
            for (c, d) in state.values.iter_mut().enumerate() {
                *d = (old.cell(c) - old_old.cell(c)) * r_dt_coef0 - *d * self.off_centre;
            }
            state.time_index = time_index;
        }
        let r_dt_coef = self.coef(state, time_index) / time.delta_t();
        let off_centred = state.values.iter().map(|&d| d * self.off_centre).collect();
        (r_dt_coef, off_centred)
    }
}

fn ddt0_key<T: FieldValue>(rho: Option<&VolScalarField>, psi: &GeometricField<T>) -> String {
    match rho {
        Some(rho) => format!("ddt0({},{})", rho.name(), psi.name()),
        None => format!("ddt0({})", psi.name()),
    }
}

impl<T: FieldValue> DdtScheme<T> for CrankNicolson<T> {
    fn name(&self) -> &'static str {
        "CrankNicolson"
    }

    fn fvm_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<FvMatrix<T>> {
        let current = Level::of(psi, rho, 0);
        let old = Level::of(psi, rho, 1);
        let old_old = Level::of(psi, rho, 2);
        let (r_dt_coef, off_centred) =
            self.advance_ddt0(ddt0_key(rho, psi), mesh.n_cells(), &old, &old_old, time);

        let geo = mesh.geometry();
        let mut fvm = FvMatrix::new(psi, mesh, ddt_matrix_dimensions(rho, psi))?;
        for c in 0..mesh.n_cells() {
            let v = geo.cell_volumes[c];
            fvm.ldu_mut().diag_mut()[c] = r_dt_coef * current.rho_cell(c) * v;
            fvm.source_mut()[c] = (old.cell(c) * r_dt_coef + off_centred[c]) * v;
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
        let current = Level::of(psi, rho, 0);
        let old = Level::of(psi, rho, 1);
        let old_old = Level::of(psi, rho, 2);
        let (r_dt_coef, off_centred) =
            self.advance_ddt0(ddt0_key(rho, psi), mesh.n_cells(), &old, &old_old, time);

        let internal: Field<T> = (0..mesh.n_cells())
            .map(|c| (current.cell(c) - old.cell(c)) * r_dt_coef - off_centred[c])
            .collect();
        // The old-time rate is only kept on cells; faces extrapolate.
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

    fn uniform_field(mesh: &FvMesh, value: f64) -> GeometricField<f64> {
        GeometricField::builder("T", DIMLESS)
            .internal_uniform(value)
            .default_condition(ZeroGradient)
            .build(mesh)
            .unwrap()
    }

    /// Solve `dψ/dt = -ψ` on a single value through `n` steps.
    fn decay(scheme: &dyn DdtScheme<f64>, n: usize, dt: f64) -> f64 {
        let mesh = line_mesh(1, 1.0).unwrap();
        let mut psi = uniform_field(&mesh, 1.0);
        let mut time = Time::new(TimeControls::new(0.0, 100.0, dt)).unwrap();
        for _ in 0..n {
            time.advance();
            psi.store_old_times(time.time_index());
            let fvm = scheme.fvm_ddt(None, &psi, &mesh, &time).unwrap();
            // d ψ + V ψ = s
            let v = mesh.geometry().cell_volumes[0];
            let value = fvm.source()[0] / (fvm.diag()[0] + v);
            psi.internal_mut().fill(value);
            psi.correct_boundary_conditions(&mesh).unwrap();
        }
        psi.internal()[0]
    }

    #[test]
    fn test_first_step_is_euler() {
        let cn = CrankNicolson::<f64>::new(1.0).unwrap();
        let mesh = line_mesh(2, 1.0).unwrap();
        let mut psi = uniform_field(&mesh, 2.0);
        let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.25)).unwrap();
        time.advance();
        psi.store_old_times(time.time_index());
        let cn_matrix = cn.fvm_ddt(None, &psi, &mesh, &time).unwrap();
        let euler = Euler.fvm_ddt(None, &psi, &mesh, &time).unwrap();
        for c in 0..2 {
            assert!((cn_matrix.diag()[c] - euler.diag()[c]).abs() < TOL);
            assert!((cn_matrix.source()[c] - euler.source()[c]).abs() < TOL);
        }
    }

    #[test]
    fn test_second_order_decay() {
        let exact = (-1.0f64).exp();
        let cn = CrankNicolson::<f64>::new(1.0).unwrap();
        let err_cn = (decay(&cn, 20, 0.05) - exact).abs();
        let err_euler = (decay(&Euler, 20, 0.05) - exact).abs();
        assert!(err_cn < 0.2 * err_euler, "cn {err_cn}, euler {err_euler}");
    }

    #[test]
    fn test_zero_off_centre_is_euler() {
        let cn = CrankNicolson::<f64>::new(0.0).unwrap();
        let a = decay(&cn, 5, 0.1);
        let b = decay(&Euler, 5, 0.1);
        assert!((a - b).abs() < TOL);
    }

    #[test]
    fn test_repeated_assembly_in_one_step_keeps_state() {
        let cn = CrankNicolson::<f64>::new(1.0).unwrap();
        let mesh = line_mesh(1, 1.0).unwrap();
        let mut psi = uniform_field(&mesh, 1.0);
        let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();
        for value in [0.9, 0.8] {
            time.advance();
            psi.store_old_times(time.time_index());
            psi.internal_mut().fill(value);
            psi.correct_boundary_conditions(&mesh).unwrap();
        }
        let first = cn.fvc_ddt(None, &psi, &mesh, &time).unwrap();
        let second = cn.fvc_ddt(None, &psi, &mesh, &time).unwrap();
        assert!((first.internal()[0] - second.internal()[0]).abs() < TOL);
    }
}
