use super::SnGradScheme;
use crate::mesh::MeshGeometry;
use crate::types::Differentiable;

/// Normal gradient without non-orthogonal correction.
#[derive(Clone, Copy, Debug, Default)]
pub struct UncorrectedSnGrad;

impl<T: Differentiable> SnGradScheme<T> for UncorrectedSnGrad {
    fn name(&self) -> &'static str {
        "uncorrected"
    }

    fn delta_coeffs<'g>(&self, geometry: &'g MeshGeometry) -> &'g [f64] {
        &geometry.non_orth_delta_coeffs
    }
}

/// Plain `(φ_N - φ_P)/|d|`, for orthogonal meshes.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrthogonalSnGrad;

impl<T: Differentiable> SnGradScheme<T> for OrthogonalSnGrad {
    fn name(&self) -> &'static str {
        "orthogonal"
    }

    fn delta_coeffs<'g>(&self, geometry: &'g MeshGeometry) -> &'g [f64] {
        &geometry.delta_coeffs
    }
}
