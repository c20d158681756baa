//! Gauss (divergence theorem) gradient.

use super::{GradientScheme, gradient_field};
use crate::error::Result;
use crate::field::{Field, GeometricField};
use crate::interpolation::{
    InterpolationContext, Linear, SchemeSpec, SurfaceInterpolationScheme,
    create_interpolation_scheme,
};
use crate::mesh::FvMesh;
use crate::types::{Differentiable, FieldValue, PatchIndex};

/// `grad(φ) = Σ_f S_f ⊗ φ_f / V` with a selectable face interpolation.
pub struct GaussGradient<T: Differentiable> {
    interpolation: Box<dyn SurfaceInterpolationScheme<T>>,
}

impl<T: Differentiable> std::fmt::Debug for GaussGradient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaussGradient")
            .field("interpolation", &self.interpolation.name())
            .finish()
    }
}

impl<T: Differentiable> GaussGradient<T> {
    pub fn new(interpolation: Box<dyn SurfaceInterpolationScheme<T>>) -> Self {
        Self { interpolation }
    }

    /// Gauss linear.
    pub fn linear() -> Self {
        Self::new(Box::new(Linear))
    }

    /// `Gauss <interpolation...>`
    pub fn from_spec(spec: &SchemeSpec) -> Result<Self> {
        let interpolation = create_interpolation_scheme::<T>(&spec.rest()?.to_string())?;
        Ok(Self::new(interpolation))
    }

    /// Surface integral of `S_f ⊗ φ_f` per cell, divided by the cell volume.
    pub fn gauss_grad(
        mesh: &FvMesh,
        face_values: &crate::field::SurfaceField<T>,
    ) -> Field<T::Grad> {
        let geo = mesh.geometry();
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let mut igg = vec![T::Grad::zero(); mesh.n_cells()];

        for (f, &value) in face_values.internal().iter().enumerate() {
            let s = T::outer(geo.face_areas[f], value);
            igg[owner[f]] += s;
            igg[neighbour[f]] -= s;
        }
        for (i, patch) in mesh.patches().iter().enumerate() {
            if patch.kind.is_empty_kind() {
                continue;
            }
            let index = PatchIndex::new(i);
            for ((f, &c), &value) in patch
                .faces()
                .zip(mesh.face_cells(index))
                .zip(face_values.patch(index))
            {
                igg[c] += T::outer(geo.face_areas[f], value);
            }
        }

        igg.iter()
            .zip(&geo.cell_volumes)
            .map(|(&g, &v)| g / v)
            .collect()
    }
}

impl<T: Differentiable> GradientScheme<T> for GaussGradient<T> {
    fn name(&self) -> &'static str {
        "Gauss"
    }

    fn grad(&self, vf: &GeometricField<T>, mesh: &FvMesh) -> Result<GeometricField<T::Grad>> {
        let ctx = InterpolationContext::new(mesh);
        let face_values = self.interpolation.interpolate(&ctx, vf)?;
        gradient_field(vf, mesh, Self::gauss_grad(mesh, &face_values))
    }
}
