//! Non-orthogonal corrections.

use super::{SnGradScheme, sn_grad_with};
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField};
use crate::gradient::{GaussGradient, GradientScheme};
use crate::interpolation::{InterpolationContext, Linear, SchemeSpec, SurfaceInterpolationScheme};
use crate::mesh::{FvMesh, MeshGeometry};
use crate::types::{Differentiable, SMALL};

/// Explicit correction `k_f · (∇φ)_f` with `k = n - d Δ_f`, using a
/// linearly interpolated Gauss gradient.
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrectedSnGrad;

impl CorrectedSnGrad {
    /// The full correction on internal and coupled faces.
    pub fn full_correction<T: Differentiable>(
        vf: &GeometricField<T>,
        mesh: &FvMesh,
    ) -> Result<SurfaceField<T>> {
        let grad = GaussGradient::linear().grad(vf, mesh)?;
        let ctx = InterpolationContext::new(mesh);
        let grad_f = Linear.interpolate(&ctx, &grad)?;
        let k = &ctx.geometry.non_orth_correction;

        let internal: Field<T> = grad_f
            .internal()
            .iter()
            .enumerate()
            .map(|(f, g)| T::directional(k[f], g))
            .collect();
        let boundary = mesh
            .patches()
            .iter()
            .zip(grad_f.boundary())
            .map(|(patch, gb)| {
                if patch.is_coupled() {
                    patch.faces().zip(gb.iter()).map(|(f, g)| T::directional(k[f], g)).collect()
                } else {
                    Field::zeros(patch.size)
                }
            })
            .collect();

        Ok(SurfaceField::new(
            format!("snGradCorr({})", vf.name()),
            vf.dimensions() / crate::types::DIM_LENGTH,
            internal,
            boundary,
        ))
    }
}

impl<T: Differentiable> SnGradScheme<T> for CorrectedSnGrad {
    fn name(&self) -> &'static str {
        "corrected"
    }

    fn delta_coeffs<'g>(&self, geometry: &'g MeshGeometry) -> &'g [f64] {
        &geometry.non_orth_delta_coeffs
    }

    fn corrected(&self) -> bool {
        true
    }

    fn correction(&self, vf: &GeometricField<T>, mesh: &FvMesh) -> Result<Option<SurfaceField<T>>> {
        Ok(Some(Self::full_correction(vf, mesh)?))
    }
}

/// Corrected scheme whose correction is capped at `ψ/(1-ψ)` times the
/// uncorrected gradient. `ψ = 0` is uncorrected, `ψ = 1` fully corrected.
#[derive(Clone, Copy, Debug)]
pub struct LimitedSnGrad {
    limit_coeff: f64,
}

impl LimitedSnGrad {
    pub fn new(limit_coeff: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&limit_coeff) {
            return Err(FvError::InvalidConfig(format!(
                "limited snGrad coefficient {limit_coeff} is outside [0, 1]"
            )));
        }
        Ok(Self { limit_coeff })
    }

    /// `limited ψ` or `limited corrected ψ`.
    pub fn from_spec(spec: &SchemeSpec) -> Result<Self> {
        let index = if spec.arg(0) == Some("corrected") { 1 } else { 0 };
        Self::new(spec.scalar_arg(index, "limiter coefficient")?)
    }

    pub fn limit_coeff(&self) -> f64 {
        self.limit_coeff
    }
}

impl<T: Differentiable> SnGradScheme<T> for LimitedSnGrad {
    fn name(&self) -> &'static str {
        "limited"
    }

    fn delta_coeffs<'g>(&self, geometry: &'g MeshGeometry) -> &'g [f64] {
        &geometry.non_orth_delta_coeffs
    }

    fn corrected(&self) -> bool {
        self.limit_coeff > 0.0
    }

    fn correction(&self, vf: &GeometricField<T>, mesh: &FvMesh) -> Result<Option<SurfaceField<T>>> {
        let corr = CorrectedSnGrad::full_correction(vf, mesh)?;
        let geo = mesh.geometry();
        let uncorrected = sn_grad_with(vf, mesh, &geo.non_orth_delta_coeffs)?;
        let psi = self.limit_coeff;
        let limit = |c: T, u: T| {
            let limiter = (psi * u.mag() / ((1.0 - psi) * c.mag() + SMALL)).min(1.0);
            c * limiter
        };
        let internal = corr.internal().zip_map(uncorrected.internal(), limit)?;
        let boundary = corr
            .boundary()
            .iter()
            .zip(uncorrected.boundary())
            .map(|(c, u)| c.zip_map(u, limit))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(SurfaceField::new(
            corr.name(),
            corr.dimensions(),
            internal,
            boundary,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ZeroGradient;
    use crate::mesh::{BlockSide, HexBlock, PatchKind};
    use crate::sn_grad::UncorrectedSnGrad;
    use crate::types::{DIMLESS, PatchIndex, Vector};

    const TOL: f64 = 1e-10;

    fn skewed_linear() -> (FvMesh, GeometricField<f64>) {
        let mesh = HexBlock::new(6, 6, 1)
            .skew(0.5)
            .patch(BlockSide::Back, "frontAndBack", PatchKind::Empty)
            .patch(BlockSide::Front, "frontAndBack", PatchKind::Empty)
            .build()
            .unwrap();
        let vf = GeometricField::builder("T", DIMLESS)
            .internal_from_centres(|c| 2.0 * c.x + c.y)
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        (mesh, vf)
    }

    /// Internal faces between cells without wall faces.
    fn interior_faces(mesh: &FvMesh) -> Vec<usize> {
        let mut at_wall = vec![false; mesh.n_cells()];
        for (i, patch) in mesh.patches().iter().enumerate() {
            if !patch.kind.is_empty_kind() {
                for &c in mesh.face_cells(PatchIndex::new(i)) {
                    at_wall[c] = true;
                }
            }
        }
        (0..mesh.n_internal_faces())
            .filter(|&f| !at_wall[mesh.owner()[f]] && !at_wall[mesh.neighbour()[f]])
            .collect()
    }

    #[test]
    fn test_corrected_recovers_normal_gradient_on_skewed_mesh() {
        let (mesh, vf) = skewed_linear();
        let geo = mesh.geometry();
        let corrected = CorrectedSnGrad.sn_grad(&vf, &mesh).unwrap();
        let uncorrected = UncorrectedSnGrad.sn_grad(&vf, &mesh).unwrap();
        let exact = Vector::new(2.0, 1.0, 0.0);
        let faces = interior_faces(&mesh);
        assert!(!faces.is_empty());
        let mut max_uncorrected_error: f64 = 0.0;
        for f in faces {
            let expected = geo.face_normal(f).dot(&exact);
            assert!((corrected.internal()[f] - expected).abs() < TOL, "face {f}");
            max_uncorrected_error = max_uncorrected_error.max((uncorrected.internal()[f] - expected).abs());
        }
        assert!(max_uncorrected_error > 1e-3);
    }

    #[test]
    fn test_limited_bounds() {
        let (mesh, vf) = skewed_linear();
        let none = LimitedSnGrad::new(0.0).unwrap().sn_grad(&vf, &mesh).unwrap();
        let uncorrected = UncorrectedSnGrad.sn_grad(&vf, &mesh).unwrap();
        let full = LimitedSnGrad::new(1.0).unwrap().sn_grad(&vf, &mesh).unwrap();
        let corrected = CorrectedSnGrad.sn_grad(&vf, &mesh).unwrap();
        let half = LimitedSnGrad::new(0.5).unwrap().correction(&vf, &mesh).unwrap().unwrap();
        let corr = CorrectedSnGrad::full_correction(&vf, &mesh).unwrap();
        for f in 0..mesh.n_internal_faces() {
            assert!((none.internal()[f] - uncorrected.internal()[f]).abs() < TOL);
            assert!((full.internal()[f] - corrected.internal()[f]).abs() < TOL);
            // psi = 0.5: |correction| never exceeds the uncorrected gradient.
            assert!(half.internal()[f].abs() <= uncorrected.internal()[f].abs() + TOL);
            assert!(half.internal()[f].abs() <= corr.internal()[f].abs() + TOL);
        }
        assert!(LimitedSnGrad::new(1.5).is_err());
    }
}
