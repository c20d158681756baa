//! Gauss Laplacian scheme.

use std::fmt;

use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField, VolScalarField};
use crate::fvc::surface_integrate;
use crate::interpolation::{
    InterpolationContext, SchemeSpec, SurfaceInterpolationScheme, create_interpolation_scheme,
};
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::sn_grad::{SnGradScheme, create_sn_grad_scheme};
use crate::types::{DIM_AREA, DIM_LENGTH, Differentiable, PatchIndex};

/// Scheme names accepted as the first word of a Laplacian selection.
pub const LAPLACIAN_SCHEMES: &[&str] = &["Gauss"];

/// `∇·(Γ∇ψ) = Σ_f Γ_f |S_f| snGrad(ψ)_f`.
///
/// Selected as `Gauss <interpolation> <snGrad...>`, e.g.
/// `"Gauss linear corrected"` or `"Gauss linear limited 0.5"`. The
/// interpolation (one word) is applied to cell-centred diffusivities only.
pub struct GaussLaplacianScheme<T: Differentiable> {
    gamma_interpolation: Box<dyn SurfaceInterpolationScheme<f64>>,
    sn_grad: Box<dyn SnGradScheme<T>>,
}

impl<T: Differentiable> fmt::Debug for GaussLaplacianScheme<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaussLaplacianScheme")
            .field("gamma_interpolation", &self.gamma_interpolation.name())
            .field("sn_grad", &self.sn_grad.name())
            .finish()
    }
}

impl<T: Differentiable> GaussLaplacianScheme<T> {
    pub fn new(
        gamma_interpolation: Box<dyn SurfaceInterpolationScheme<f64>>,
        sn_grad: Box<dyn SnGradScheme<T>>,
    ) -> Self {
        Self {
            gamma_interpolation,
            sn_grad,
        }
    }

    /// Parse a full selection such as `"Gauss linear corrected"`.
    pub fn parse(selection: &str) -> Result<Self> {
        let spec = SchemeSpec::parse(selection)?;
        if spec.name() != "Gauss" {
            return Err(FvError::unknown_type(
                "laplacian scheme",
                spec.name(),
                LAPLACIAN_SCHEMES.iter().copied(),
            ));
        }
        let scheme = Self::from_spec(&spec)?;
        log::debug!("Selected laplacian scheme '{selection}'");
        Ok(scheme)
    }

    /// `Gauss <interpolation> <snGrad...>`
    pub fn from_spec(spec: &SchemeSpec) -> Result<Self> {
        let interpolation = spec.rest()?;
        let sn_grad = interpolation.rest().map_err(|_| {
            FvError::InvalidConfig(format!(
                "laplacian scheme '{spec}' needs an snGrad scheme after '{}'",
                interpolation.name()
            ))
        })?;
        Ok(Self::new(
            create_interpolation_scheme::<f64>(interpolation.name())?,
            create_sn_grad_scheme::<T>(&sn_grad.to_string())?,
        ))
    }

    pub fn sn_grad_scheme(&self) -> &dyn SnGradScheme<T> {
        self.sn_grad.as_ref()
    }

    /// Face values of a cell-centred diffusivity.
    pub fn interpolate_gamma(
        &self,
        gamma: &VolScalarField,
        mesh: &FvMesh,
    ) -> Result<SurfaceField<f64>> {
        let ctx = InterpolationContext::new(mesh);
        self.gamma_interpolation.interpolate(&ctx, gamma)
    }

    /// `Γ_f |S_f|` on every face.
    fn gamma_mag_sf(gamma: &SurfaceField<f64>, mesh: &FvMesh) -> Result<SurfaceField<f64>> {
        gamma.check_mesh(mesh)?;
        let geo = mesh.geometry();
        let internal: Field<f64> = gamma
            .internal()
            .iter()
            .zip(&geo.mag_face_areas)
            .map(|(g, a)| g * a)
            .collect();
        let boundary = mesh
            .patches()
            .iter()
            .zip(gamma.boundary())
            .map(|(patch, g)| {
                patch
                    .faces()
                    .zip(g.iter())
                    .map(|(f, g)| g * geo.mag_face_areas[f])
                    .collect()
            })
            .collect();
        Ok(SurfaceField::new(
            format!("{}*magSf", gamma.name()),
            gamma.dimensions() * DIM_AREA,
            internal,
            boundary,
        ))
    }

    /// Implicit Laplacian with face diffusivity `gamma`.
    ///
    /// Off-diagonals are `Γ_f|S_f|Δ_f`, the diagonal their negative sum plus
    /// the boundary gradient coefficients. With a corrected snGrad scheme the
    /// explicit correction enters the source and the face flux correction.
    pub fn fvm_laplacian(
        &self,
        gamma: &SurfaceField<f64>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
    ) -> Result<FvMatrix<T>> {
        let gamma_mag_sf = Self::gamma_mag_sf(gamma, mesh)?;
        let geo = mesh.geometry();
        let delta_coeffs = self.sn_grad.delta_coeffs(&geo);

        let mut fvm = FvMatrix::new(
            psi,
            mesh,
            gamma.dimensions() * psi.dimensions() * DIM_LENGTH,
        )?;
        for ((u, &gm), &dc) in fvm
            .ldu_mut()
            .upper_mut()
            .iter_mut()
            .zip(gamma_mag_sf.internal().iter())
            .zip(delta_coeffs)
        {
            *u = gm * dc;
        }
        fvm.ldu_mut().neg_sum_diag();

        for (i, (patch, pf)) in mesh.patches().iter().zip(psi.boundary_field().iter()).enumerate() {
            let index = PatchIndex::new(i);
            let p_gamma = gamma_mag_sf.patch(index);
            if pf.is_coupled() {
                let coeffs: Vec<T> = patch
                    .faces()
                    .zip(p_gamma)
                    .map(|(f, &g)| T::splat(-g * delta_coeffs[f]))
                    .collect();
                fvm.internal_coeffs_mut(index).copy_from_slice(&coeffs);
                fvm.boundary_coeffs_mut(index).copy_from_slice(&coeffs);
            } else {
                let ctx = psi.patch_context(mesh, &geo, index);
                let gic = pf.condition().gradient_internal_coeffs(&ctx)?;
                let gbc = pf.condition().gradient_boundary_coeffs(&ctx, pf.values())?;
                let ics = fvm.internal_coeffs_mut(index);
                for ((ic, g), &pg) in ics.iter_mut().zip(gic).zip(p_gamma) {
                    *ic = g * pg;
                }
                let bcs = fvm.boundary_coeffs_mut(index);
                for ((bc, g), &pg) in bcs.iter_mut().zip(gbc).zip(p_gamma) {
                    *bc = g * (-pg);
                }
            }
        }

        if self.sn_grad.corrected() {
            if let Some(correction) = self.sn_grad.correction(psi, mesh)? {
                let face_flux_correction = correction.scaled_by(&gamma_mag_sf)?;
                let div = surface_integrate(&face_flux_correction, mesh)?;
                for ((s, &d), &v) in fvm
                    .source_mut()
                    .iter_mut()
                    .zip(div.internal().iter())
                    .zip(&geo.cell_volumes)
                {
                    *s -= d * v;
                }
                fvm.set_face_flux_correction(face_flux_correction)?;
            }
        }
        Ok(fvm)
    }

    /// Explicit Laplacian `Σ_f Γ_f|S_f| snGrad(ψ)_f / V`.
    pub fn fvc_laplacian(
        &self,
        gamma: &SurfaceField<f64>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
    ) -> Result<GeometricField<T>> {
        let gamma_mag_sf = Self::gamma_mag_sf(gamma, mesh)?;
        let face_flux = self.sn_grad.sn_grad(psi, mesh)?.scaled_by(&gamma_mag_sf)?;
        let mut lap = surface_integrate(&face_flux, mesh)?;
        lap.rename(format!("laplacian({},{})", gamma.name(), psi.name()));
        Ok(lap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{FixedValue, ZeroGradient};
    use crate::fvm::row_sums;
    use crate::linear_solver::SolverControls;
    use crate::mesh::line_mesh;
    use crate::types::{DIM_KINEMATIC_VISCOSITY, DIMLESS};

    const TOL: f64 = 1e-10;

    fn temperature(mesh: &FvMesh) -> GeometricField<f64> {
        GeometricField::builder("T", DIMLESS)
            .internal_uniform(0.0)
            .default_condition(ZeroGradient)
            .patch("left", FixedValue::uniform(0.0))
            .patch("right", FixedValue::uniform(1.0))
            .build(mesh)
            .unwrap()
    }

    #[test]
    fn test_parse() {
        let scheme = GaussLaplacianScheme::<f64>::parse("Gauss linear corrected").unwrap();
        assert_eq!(scheme.sn_grad_scheme().name(), "corrected");
        assert!(GaussLaplacianScheme::<f64>::parse("Gauss linear limited 0.5").is_ok());
        assert!(GaussLaplacianScheme::<f64>::parse("Gauss linear").is_err());
        let err = GaussLaplacianScheme::<f64>::parse("linear corrected").unwrap_err();
        assert!(err.to_string().contains("Gauss"));
    }

    #[test]
    fn test_coefficients() {
        // h = 0.25, unit cross-section: Γ|S|/h = 4, boundary half cell 8.
        let mesh = line_mesh(4, 1.0).unwrap();
        let t = temperature(&mesh);
        let gamma = SurfaceField::uniform("nu", &mesh, DIM_KINEMATIC_VISCOSITY, 1.0);
        let scheme = GaussLaplacianScheme::<f64>::parse("Gauss linear uncorrected").unwrap();
        let fvm = scheme.fvm_laplacian(&gamma, &t, &mesh).unwrap();
        assert_eq!(fvm.dimensions(), DIM_KINEMATIC_VISCOSITY * DIMLESS * DIM_LENGTH);
        assert!(fvm.ldu().upper().iter().all(|&u| (u - 4.0).abs() < TOL));
        assert!((fvm.diag()[1] + 8.0).abs() < TOL);
        assert!((fvm.diag()[0] + 4.0).abs() < TOL);
        let right = mesh.patch_by_name("right").unwrap();
        assert!((fvm.internal_coeffs(right)[0] + 8.0).abs() < TOL);
        assert!((fvm.boundary_coeffs(right)[0] + 8.0).abs() < TOL);
        assert!(fvm.face_flux_correction().is_none());
    }

    #[test]
    fn test_steady_conduction_is_linear() {
        let mesh = line_mesh(4, 1.0).unwrap();
        let mut t = temperature(&mesh);
        let gamma = SurfaceField::uniform("k", &mesh, DIMLESS, 2.0);
        let scheme = GaussLaplacianScheme::<f64>::parse("Gauss linear corrected").unwrap();
        let fvm = -scheme.fvm_laplacian(&gamma, &t, &mesh).unwrap();
        fvm.solve(&mut t, &mesh, &SolverControls::pcg(1e-14, 0.0)).unwrap();
        let geo = mesh.geometry();
        for (v, c) in t.internal().iter().zip(&geo.cell_centres) {
            assert!((v - c.x).abs() < 1e-9);
        }
        let lap = scheme.fvc_laplacian(&gamma, &t, &mesh).unwrap();
        assert!(lap.internal().iter().all(|v| v.abs() < 1e-8));
    }

    #[test]
    fn test_zero_gradient_rows_sum_to_zero() {
        let mesh = line_mesh(5, 1.0).unwrap();
        let t: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_values(vec![1.0, 3.0, -2.0, 0.5, 4.0])
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let gamma = SurfaceField::uniform("k", &mesh, DIMLESS, 0.3);
        let scheme = GaussLaplacianScheme::<f64>::parse("Gauss linear corrected").unwrap();
        let fvm = scheme.fvm_laplacian(&gamma, &t, &mesh).unwrap();
        assert!(row_sums(&fvm).iter().all(|s| s.abs() < TOL));
    }

    #[test]
    fn test_interpolated_gamma() {
        let mesh = line_mesh(2, 1.0).unwrap();
        let nu = GeometricField::builder("nu", DIMLESS)
            .internal_values(vec![1.0, 3.0])
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let scheme = GaussLaplacianScheme::<f64>::parse("Gauss linear uncorrected").unwrap();
        let gamma = scheme.interpolate_gamma(&nu, &mesh).unwrap();
        assert!((gamma.internal()[0] - 2.0).abs() < TOL);
    }
}
