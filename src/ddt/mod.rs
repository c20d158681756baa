//! Time derivative schemes.
//!
//! Each scheme supplies the implicit form (`fvm_ddt`: diagonal `ρV/Δt`-like
//! coefficients and an old-time source) and the explicit form (`fvc_ddt`) of
//! `∂(ρψ)/∂t`. Old time levels come from the field itself, so callers must
//! run `store_old_times(time.time_index())` on every field once per step.
//!
//! | Selection          | Order | Old levels |
//! |--------------------|-------|------------|
//! | `steadyState`      | -     | 0          |
//! | `Euler`            | 1     | 1          |
//! | `backward`         | 2     | 2          |
//! | `CrankNicolson ψ`  | 2     | 2 + stored `ddt0` |
//! | `localEuler`       | 1     | 1, per-cell `Δt` |

mod backward;
mod crank_nicolson;
mod euler;

pub use backward::Backward;
pub use crank_nicolson::CrankNicolson;
pub use euler::{Euler, LocalEuler, SteadyState};

use crate::control::Time;
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField, VolScalarField};
use crate::interpolation::SchemeSpec;
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::types::{DIM_TIME, DIM_VOLUME, DimensionSet, FieldValue};

/// Time derivative of a cell field, optionally density-weighted.
pub trait DdtScheme<T: FieldValue>: Send + Sync {
    /// Scheme name as selected by text.
    fn name(&self) -> &'static str;

    /// Implicit `∂(ρψ)/∂t`.
    fn fvm_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<FvMatrix<T>>;

    /// Explicit `∂(ρψ)/∂t` from the stored time levels.
    fn fvc_ddt(
        &self,
        rho: Option<&VolScalarField>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        time: &Time,
    ) -> Result<GeometricField<T>>;

    /// Refresh flux-dependent state before assembly. Only local time
    /// stepping uses this.
    fn update(&mut self, _mesh: &FvMesh, _phi: &SurfaceField<f64>, _time: &Time) -> Result<()> {
        Ok(())
    }
}

/// Scheme names accepted by [`create_ddt_scheme`].
pub const DDT_SCHEMES: &[&str] = &["CrankNicolson", "Euler", "backward", "localEuler", "steadyState"];

/// Create a ddt scheme from its text selection.
///
/// `localEuler` takes optional `maxCo` and `maxDeltaT` arguments.
pub fn create_ddt_scheme<T: FieldValue>(selection: &str) -> Result<Box<dyn DdtScheme<T>>> {
    let spec = SchemeSpec::parse(selection)?;
    let scheme: Box<dyn DdtScheme<T>> = match spec.name() {
        "steadyState" => Box::new(SteadyState),
        "Euler" => Box::new(Euler),
        "backward" => Box::new(Backward),
        "CrankNicolson" => Box::new(CrankNicolson::<T>::new(spec.scalar_arg(0, "off-centering coefficient")?)?),
        "localEuler" => {
            let mut lts = LocalEuler::default();
            if spec.arg(0).is_some() {
                lts = lts.with_max_co(spec.scalar_arg(0, "maxCo")?);
            }
            if spec.arg(1).is_some() {
                lts = lts.with_max_delta_t(spec.scalar_arg(1, "maxDeltaT")?);
            }
            Box::new(lts)
        }
        other => {
            return Err(FvError::unknown_type("ddt scheme", other, DDT_SCHEMES.iter().copied()));
        }
    };
    log::debug!("Selected ddt scheme '{selection}'");
    Ok(scheme)
}

/// Integrated dimensions of `∂(ρψ)/∂t`.
pub(crate) fn ddt_matrix_dimensions<T: FieldValue>(
    rho: Option<&VolScalarField>,
    psi: &GeometricField<T>,
) -> DimensionSet {
    rate_dimensions(rho, psi) * DIM_VOLUME
}

/// Dimensions of `∂(ρψ)/∂t`.
pub(crate) fn rate_dimensions<T: FieldValue>(
    rho: Option<&VolScalarField>,
    psi: &GeometricField<T>,
) -> DimensionSet {
    let base = psi.dimensions() / DIM_TIME;
    match rho {
        Some(rho) => rho.dimensions() * base,
        None => base,
    }
}

/// `ρψ` (or `ψ`) of one time level on cells and patch faces.
pub(crate) struct Level<'a, T: FieldValue> {
    psi: &'a GeometricField<T>,
    rho: Option<&'a VolScalarField>,
}

impl<'a, T: FieldValue> Level<'a, T> {
    /// Time level `n` (0 current, 1 old, 2 old-old) of `psi` and `rho`.
    pub(crate) fn of(psi: &'a GeometricField<T>, rho: Option<&'a VolScalarField>, n: usize) -> Self {
        let pick_psi = |f: &'a GeometricField<T>| match n {
            0 => f,
            1 => f.old_time(),
            _ => f.old_old_time(),
        };
        let pick_rho = |f: &'a VolScalarField| match n {
            0 => f,
            1 => f.old_time(),
            _ => f.old_old_time(),
        };
        Self {
            psi: pick_psi(psi),
            rho: rho.map(pick_rho),
        }
    }

    pub(crate) fn cell(&self, c: usize) -> T {
        let v = self.psi.internal()[c];
        match self.rho {
            Some(rho) => v * rho.internal()[c],
            None => v,
        }
    }

    pub(crate) fn rho_cell(&self, c: usize) -> f64 {
        self.rho.map_or(1.0, |rho| rho.internal()[c])
    }

    fn face(&self, patch: usize, i: usize) -> T {
        let v = self.psi.boundary_field()[patch].values()[i];
        match self.rho {
            Some(rho) => v * rho.boundary_field()[patch].values()[i],
            None => v,
        }
    }
}

/// Explicit rate field combining time levels location by location:
/// `f(&[level0, level1, ...])` on every cell and patch face.
pub(crate) fn combine_levels<T: FieldValue>(
    name: String,
    mesh: &FvMesh,
    dimensions: DimensionSet,
    levels: &[Level<'_, T>],
    f: impl Fn(&[T]) -> T,
) -> Result<GeometricField<T>> {
    let mut buffer = vec![T::zero(); levels.len()];
    let internal: Field<T> = (0..mesh.n_cells())
        .map(|c| {
            for (b, level) in buffer.iter_mut().zip(levels) {
                *b = level.cell(c);
            }
            f(&buffer)
        })
        .collect();
    let patch_values = mesh
        .patches()
        .iter()
        .enumerate()
        .map(|(p, patch)| {
            (0..patch.size)
                .map(|i| {
                    for (b, level) in buffer.iter_mut().zip(levels) {
                        *b = level.face(p, i);
                    }
                    f(&buffer)
                })
                .collect()
        })
        .collect();
    let mut field = GeometricField::calculated(name, mesh, dimensions, internal, patch_values)?;
    field.correct_boundary_conditions(mesh)?;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory() {
        for sel in ["steadyState", "Euler", "backward", "CrankNicolson 0.9", "localEuler", "localEuler 0.5 0.1"] {
            let scheme = create_ddt_scheme::<f64>(sel).unwrap();
            assert_eq!(scheme.name(), sel.split_whitespace().next().unwrap());
        }
        assert!(create_ddt_scheme::<f64>("CrankNicolson").is_err());
        assert!(create_ddt_scheme::<f64>("CrankNicolson 1.5").is_err());
        let err = create_ddt_scheme::<f64>("RK4").err().unwrap();
        assert!(err.to_string().contains("backward"));
    }
}
