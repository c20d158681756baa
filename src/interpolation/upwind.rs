//! Flux-directed schemes.

use super::{InterpolationContext, SchemeSpec, SurfaceInterpolationScheme, build_weights};
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField};
use crate::gradient::{GRADIENT_SCHEMES, GaussGradient, GradientScheme, create_gradient_scheme};
use crate::types::{Differentiable, FieldValue, PatchIndex};

/// Owner-side weights: 1 where the flux leaves the owner (or is zero), 0 otherwise.
pub(crate) fn upwind_weights<T: FieldValue>(
    ctx: &InterpolationContext<'_>,
    vf: &GeometricField<T>,
    scheme: &str,
) -> Result<SurfaceField<f64>> {
    let flux = ctx.require_flux(scheme)?.face_values();
    let pos0 = |f: usize| if flux[f] >= 0.0 { 1.0 } else { 0.0 };
    Ok(build_weights(ctx.mesh, vf, scheme, pos0, pos0))
}

/// First-order upwind.
#[derive(Clone, Copy, Debug, Default)]
pub struct Upwind;

impl<T: FieldValue> SurfaceInterpolationScheme<T> for Upwind {
    fn name(&self) -> &'static str {
        "upwind"
    }

    fn weights(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<SurfaceField<f64>> {
        upwind_weights(ctx, vf, "upwind")
    }
}

/// Upwind plus the upwind-cell gradient extrapolated to the face centre.
pub struct LinearUpwind<T: Differentiable> {
    gradient: Box<dyn GradientScheme<T>>,
}

impl<T: Differentiable> std::fmt::Debug for LinearUpwind<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearUpwind")
            .field("gradient", &self.gradient.name())
            .finish()
    }
}

impl<T: Differentiable> LinearUpwind<T> {
    pub fn new(gradient: Box<dyn GradientScheme<T>>) -> Self {
        Self { gradient }
    }

    /// `linearUpwind <gradient scheme>`; a field name such as `grad(U)`
    /// selects Gauss linear.
    pub fn from_spec(spec: &SchemeSpec) -> Result<Self> {
        let gradient = match spec.rest() {
            Ok(sub) if GRADIENT_SCHEMES.contains(&sub.name()) => {
                create_gradient_scheme::<T>(&sub.to_string())?
            }
            _ => Box::new(GaussGradient::linear()) as Box<dyn GradientScheme<T>>,
        };
        Ok(Self::new(gradient))
    }
}

impl<T: Differentiable> SurfaceInterpolationScheme<T> for LinearUpwind<T> {
    fn name(&self) -> &'static str {
        "linearUpwind"
    }

    fn weights(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<SurfaceField<f64>> {
        upwind_weights(ctx, vf, "linearUpwind")
    }

    fn corrected(&self) -> bool {
        true
    }

    fn correction(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<Option<SurfaceField<T>>> {
        let mesh = ctx.mesh;
        let flux = ctx.require_flux("linearUpwind")?.face_values();
        let grad = self.gradient.grad(vf, mesh)?;
        let g = grad.internal();
        let geo = &ctx.geometry;
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();

        let internal: Field<T> = (0..mesh.n_internal_faces())
            .map(|f| {
                let cf = geo.face_centres[f];
                if flux[f] >= 0.0 {
                    T::directional(cf - geo.cell_centres[owner[f]], &g[owner[f]])
                } else {
                    T::directional(cf - geo.cell_centres[neighbour[f]], &g[neighbour[f]])
                }
            })
            .collect();

        let mut boundary = Vec::with_capacity(mesh.patches().len());
        for (i, (patch, pf)) in mesh.patches().iter().zip(vf.boundary_field().iter()).enumerate() {
            if !pf.is_coupled() {
                boundary.push(Field::zeros(patch.size));
                continue;
            }
            let index = PatchIndex::new(i);
            let grad_nbr = grad.patch_neighbour_field(mesh, index)?.ok_or_else(|| {
                FvError::InvalidConfig(format!(
                    "coupled patch '{}' has no neighbour gradient",
                    patch.name
                ))
            })?;
            let values: Field<T> = patch
                .faces()
                .zip(mesh.face_cells(index))
                .zip(&grad_nbr)
                .map(|((f, &c), gn)| {
                    let to_face = geo.face_centres[f] - geo.cell_centres[c];
                    if flux[f] >= 0.0 {
                        T::directional(to_face, &g[c])
                    } else {
                        T::directional(to_face - geo.delta[f], gn)
                    }
                })
                .collect();
            boundary.push(values);
        }

        Ok(Some(SurfaceField::new(
            format!("linearUpwindCorrection({})", vf.name()),
            vf.dimensions(),
            internal,
            boundary,
        )))
    }
}
