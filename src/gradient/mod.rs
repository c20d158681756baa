//! Cell-centred gradient schemes.
//!
//! | Selection                 | Scheme                                          |
//! |---------------------------|-------------------------------------------------|
//! | `Gauss <interpolation>`   | `Σ_f S_f ⊗ φ_f / V` with any interpolation      |
//! | `leastSquares`            | weighted fit over face neighbours               |
//! | `pointCellsLeastSquares`  | weighted fit over point neighbours              |
//!
//! Every scheme returns a `calculated` gradient field whose non-coupled patch
//! values carry the field's own face-normal gradient (see
//! [`correct_boundary_gradient`]).

mod gauss;
mod least_squares;

pub use gauss::GaussGradient;
pub use least_squares::{LeastSquaresGradient, LeastSquaresVectors, Stencil, StencilNeighbour};

use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField};
use crate::interpolation::SchemeSpec;
use crate::mesh::FvMesh;
use crate::types::{DIM_LENGTH, Differentiable, PatchIndex};

/// Gradient of a cell field.
pub trait GradientScheme<T: Differentiable>: Send + Sync {
    /// Scheme name as selected by text.
    fn name(&self) -> &'static str;

    /// `grad(vf)` with boundary values set.
    fn grad(&self, vf: &GeometricField<T>, mesh: &FvMesh) -> Result<GeometricField<T::Grad>>;
}

/// Scheme names accepted by [`create_gradient_scheme`].
pub const GRADIENT_SCHEMES: &[&str] = &["Gauss", "leastSquares", "pointCellsLeastSquares"];

/// Create a gradient scheme from its text selection.
pub fn create_gradient_scheme<T: Differentiable>(
    selection: &str,
) -> Result<Box<dyn GradientScheme<T>>> {
    let spec = SchemeSpec::parse(selection)?;
    let scheme: Box<dyn GradientScheme<T>> = match spec.name() {
        "Gauss" => Box::new(GaussGradient::from_spec(&spec)?),
        "leastSquares" => Box::new(LeastSquaresGradient::new(Stencil::FaceNeighbours)),
        "pointCellsLeastSquares" => Box::new(LeastSquaresGradient::new(Stencil::PointNeighbours)),
        other => {
            return Err(FvError::unknown_type(
                "gradient scheme",
                other,
                GRADIENT_SCHEMES.iter().copied(),
            ));
        }
    };
    log::debug!("Selected gradient scheme '{selection}'");
    Ok(scheme)
}

/// Wrap cell gradients in a `calculated` field, evaluate its constraint
/// patches and apply the boundary normal correction.
pub(crate) fn gradient_field<T: Differentiable>(
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    internal: Field<T::Grad>,
) -> Result<GeometricField<T::Grad>> {
    let patch_values = mesh
        .patches()
        .iter()
        .enumerate()
        .map(|(i, _)| {
            mesh.face_cells(PatchIndex::new(i))
                .iter()
                .map(|&c| internal[c])
                .collect()
        })
        .collect();
    let mut grad = GeometricField::calculated(
        format!("grad({})", vf.name()),
        mesh,
        vf.dimensions() / DIM_LENGTH,
        internal,
        patch_values,
    )?;
    grad.correct_boundary_conditions(mesh)?;
    correct_boundary_gradient(vf, mesh, &mut grad)?;
    Ok(grad)
}

/// Replace the normal component of the boundary gradient on non-coupled
/// patches by the field's own face-normal gradient:
/// `g_b += n ⊗ (snGrad(φ) - n · g_b)`.
pub fn correct_boundary_gradient<T: Differentiable>(
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    grad: &mut GeometricField<T::Grad>,
) -> Result<()> {
    let geo = mesh.geometry();
    for (i, patch) in mesh.patches().iter().enumerate() {
        if patch.is_coupled() || patch.kind.is_empty_kind() {
            continue;
        }
        let index = PatchIndex::new(i);
        let sn_grad = vf.patch_sn_grad(mesh, index)?;
        let values = grad.boundary_field_mut()[index].values_mut();
        for ((g, f), sg) in values.iter_mut().zip(patch.faces()).zip(sn_grad) {
            let n = geo.face_normal(f);
            *g += T::outer(n, sg - T::directional(n, g));
        }
    }
    Ok(())
}
