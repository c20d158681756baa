//! Gauss convection scheme.

use std::fmt;

use crate::error::{FvError, Result};
use crate::field::{GeometricField, SurfaceField};
use crate::fvc::surface_integrate;
use crate::interpolation::{
    InterpolationContext, SchemeSpec, SurfaceInterpolationScheme, create_interpolation_scheme,
};
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::types::{Differentiable, PatchIndex};

/// Scheme names accepted as the first word of a convection selection.
pub const CONVECTION_SCHEMES: &[&str] = &["Gauss"];

/// `∇·(φψ) = Σ_f F_f ψ_f` with `ψ_f` from a flux-aware interpolation.
///
/// Selected as `Gauss <interpolation...>`, e.g. `"Gauss upwind"`,
/// `"Gauss limitedLinear 1"` or `"Gauss linearUpwind grad(U)"`.
pub struct GaussConvectionScheme<T: Differentiable> {
    interpolation: Box<dyn SurfaceInterpolationScheme<T>>,
}

impl<T: Differentiable> fmt::Debug for GaussConvectionScheme<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaussConvectionScheme")
            .field("interpolation", &self.interpolation.name())
            .finish()
    }
}

impl<T: Differentiable> GaussConvectionScheme<T> {
    pub fn new(interpolation: Box<dyn SurfaceInterpolationScheme<T>>) -> Self {
        Self { interpolation }
    }

    /// Parse a full selection such as `"Gauss vanLeer"`.
    pub fn parse(selection: &str) -> Result<Self> {
        let spec = SchemeSpec::parse(selection)?;
        if spec.name() != "Gauss" {
            return Err(FvError::unknown_type(
                "convection scheme",
                spec.name(),
                CONVECTION_SCHEMES.iter().copied(),
            ));
        }
        let scheme = Self::from_spec(&spec)?;
        log::debug!("Selected convection scheme '{selection}'");
        Ok(scheme)
    }

    /// `Gauss <interpolation...>`
    pub fn from_spec(spec: &SchemeSpec) -> Result<Self> {
        Ok(Self::new(create_interpolation_scheme::<T>(&spec.rest()?.to_string())?))
    }

    pub fn interpolation(&self) -> &dyn SurfaceInterpolationScheme<T> {
        self.interpolation.as_ref()
    }

    /// Face values of `psi` for the face flux `flux`.
    pub fn interpolate(
        &self,
        flux: &SurfaceField<f64>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
    ) -> Result<SurfaceField<T>> {
        let ctx = InterpolationContext::new(mesh).with_flux(Some(flux));
        self.interpolation.interpolate(&ctx, psi)
    }

    /// Implicit convection.
    ///
    /// `lower = -w F`, `upper = lower + F`, diagonal the negative column sum.
    /// Patch faces use the boundary value coefficients weighted by the patch
    /// flux. An explicit interpolation correction goes to the source and the
    /// face flux correction.
    pub fn fvm_div(
        &self,
        flux: &SurfaceField<f64>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
    ) -> Result<FvMatrix<T>> {
        flux.check_mesh(mesh)?;
        let ctx = InterpolationContext::new(mesh).with_flux(Some(flux));
        let weights = self.interpolation.weights(&ctx, psi)?;
        let geo = mesh.geometry();

        let mut fvm = FvMatrix::new(psi, mesh, flux.dimensions() * psi.dimensions())?;
        {
            let ldu = fvm.ldu_mut();
            let lower: Vec<f64> = weights
                .internal()
                .iter()
                .zip(flux.internal().iter())
                .map(|(w, f)| -w * f)
                .collect();
            let upper = ldu.upper_mut();
            for ((u, l), f) in upper.iter_mut().zip(&lower).zip(flux.internal().iter()) {
                *u = l + f;
            }
            ldu.lower_mut().copy_from_slice(&lower);
            ldu.neg_sum_diag();
        }

        for (i, pf) in psi.boundary_field().iter().enumerate() {
            let index = PatchIndex::new(i);
            let ctx = psi.patch_context(mesh, &geo, index);
            let pw = weights.patch(index);
            let p_flux = flux.patch(index);
            let vic = pf.condition().value_internal_coeffs(&ctx, pw)?;
            let vbc = pf.condition().value_boundary_coeffs(&ctx, pf.values(), pw)?;
            let ics = fvm.internal_coeffs_mut(index);
            for ((ic, v), &f) in ics.iter_mut().zip(vic).zip(p_flux) {
                *ic = v * f;
            }
            let bcs = fvm.boundary_coeffs_mut(index);
            for ((bc, v), &f) in bcs.iter_mut().zip(vbc).zip(p_flux) {
                *bc = v * (-f);
            }
        }

        if self.interpolation.corrected() {
            if let Some(correction) = self.interpolation.correction(&ctx, psi)? {
                let mut face_flux_correction = correction.scaled_by(flux)?;
                face_flux_correction.rename(format!("faceFluxCorrection({})", psi.name()));
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

    /// Explicit convection `Σ_f F_f ψ_f / V`.
    pub fn fvc_div(
        &self,
        flux: &SurfaceField<f64>,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
    ) -> Result<GeometricField<T>> {
        let face_values = self.interpolate(flux, psi, mesh)?;
        let face_flux = face_values.scaled_by(flux)?;
        let mut div = surface_integrate(&face_flux, mesh)?;
        div.rename(format!("div({},{})", flux.name(), psi.name()));
        Ok(div)
    }
}
