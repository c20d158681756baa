//! Boundary condition capability trait and evaluation context.

use std::any::Any;
use std::fmt::Debug;

use crate::error::{FvError, Result};
use crate::matrix::LduInterface;
use crate::mesh::{FvMesh, MeshGeometry, Patch};
use crate::types::{FieldValue, PatchIndex, Vector};

/// Everything a boundary condition may read while it is evaluated.
///
/// The context borrows the owning field's internal values, so a condition
/// never holds a reference to its field.
#[derive(Clone, Copy)]
pub struct PatchContext<'a, T> {
    /// Mesh the field lives on
    pub mesh: &'a FvMesh,
    /// Geometry for the current mesh generation
    pub geometry: &'a MeshGeometry,
    /// Patch being evaluated
    pub patch: PatchIndex,
    /// Internal (cell) values of the owning field
    pub internal: &'a [T],
    /// Face flux on this patch, when the caller has one
    pub patch_flux: Option<&'a [f64]>,
}

impl<'a, T: FieldValue> PatchContext<'a, T> {
    pub fn new(
        mesh: &'a FvMesh,
        geometry: &'a MeshGeometry,
        patch: PatchIndex,
        internal: &'a [T],
    ) -> Self {
        Self {
            mesh,
            geometry,
            patch,
            internal,
            patch_flux: None,
        }
    }

    /// Attach the patch face flux (used by flux-switched conditions).
    pub fn with_flux(mut self, flux: Option<&'a [f64]>) -> Self {
        self.patch_flux = flux;
        self
    }

    /// Mesh patch description.
    pub fn patch_info(&self) -> &'a Patch {
        self.mesh.patch(self.patch)
    }

    /// Number of faces.
    pub fn size(&self) -> usize {
        self.patch_info().size
    }

    /// Owner cells of the patch faces.
    pub fn face_cells(&self) -> &'a [usize] {
        self.mesh.face_cells(self.patch)
    }

    /// Internal values next to each patch face.
    pub fn patch_internal_field(&self) -> Vec<T> {
        self.face_cells().iter().map(|&c| self.internal[c]).collect()
    }

    /// `1/|d|` per patch face.
    pub fn delta_coeffs(&self) -> &'a [f64] {
        &self.geometry.delta_coeffs[self.patch_info().faces()]
    }

    /// Owner-side interpolation weights per patch face.
    pub fn weights(&self) -> &'a [f64] {
        &self.geometry.weights[self.patch_info().faces()]
    }

    /// Face area magnitudes.
    pub fn mag_sf(&self) -> &'a [f64] {
        &self.geometry.mag_face_areas[self.patch_info().faces()]
    }

    /// Outward unit normals.
    pub fn normals(&self) -> Vec<Vector> {
        self.patch_info()
            .faces()
            .map(|f| self.geometry.face_normal(f))
            .collect()
    }
}

/// Per-face parameter of a condition: one value for all faces or one per face.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchValue<T> {
    Uniform(T),
    NonUniform(Vec<T>),
}

impl<T: Copy> PatchValue<T> {
    /// Value on face `i`.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        match self {
            PatchValue::Uniform(v) => *v,
            PatchValue::NonUniform(values) => values[i],
        }
    }

    /// Expand to `n` faces.
    pub fn to_vec(&self, n: usize) -> Vec<T> {
        match self {
            PatchValue::Uniform(v) => vec![*v; n],
            PatchValue::NonUniform(values) => values.clone(),
        }
    }

    /// Check a non-uniform list covers `n` faces.
    pub fn check_size(&self, what: &str, n: usize) -> Result<()> {
        match self {
            PatchValue::NonUniform(values) if values.len() != n => {
                Err(FvError::size_mismatch(what, n, values.len()))
            }
            _ => Ok(()),
        }
    }

    /// Gather through a new-to-old face map.
    pub fn map_faces(&mut self, face_map: &[usize]) {
        if let PatchValue::NonUniform(values) = self {
            *values = face_map.iter().map(|&old| values[old]).collect();
        }
    }
}

/// A boundary condition bound to one patch of one field.
///
/// Conditions produce face values (`evaluate`) and the linearisation used by
/// implicit operators:
///
/// - value coefficients: `face value = vIC * cell value + vBC`
/// - gradient coefficients: `face snGrad = gIC * cell value + gBC`
///
/// For coupled conditions the "boundary" coefficient multiplies the
/// neighbour-side cell value instead of a constant.
pub trait BoundaryCondition<T: FieldValue>: Send + Sync + Debug {
    /// Registered type name (`fixedValue`, `zeroGradient`, ...).
    fn type_name(&self) -> &'static str;

    /// Refresh state that depends on time or other fields.
    fn update_coeffs(&mut self, _ctx: &PatchContext<'_, T>) -> Result<()> {
        Ok(())
    }

    /// Recompute the face values of the patch.
    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()>;

    /// Face-normal gradient for the current face values.
    fn sn_grad(&self, ctx: &PatchContext<'_, T>, values: &[T]) -> Result<Vec<T>> {
        let pif = ctx.patch_internal_field();
        Ok(values
            .iter()
            .zip(pif.iter())
            .zip(ctx.delta_coeffs())
            .map(|((&vf, &vc), &dc)| (vf - vc) * dc)
            .collect())
    }

    /// Implicit part of the face value.
    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, weights: &[f64]) -> Result<Vec<T>>;

    /// Explicit part of the face value.
    fn value_boundary_coeffs(
        &self,
        ctx: &PatchContext<'_, T>,
        values: &[T],
        weights: &[f64],
    ) -> Result<Vec<T>>;

    /// Implicit part of the face-normal gradient.
    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>>;

    /// Explicit part of the face-normal gradient.
    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, values: &[T]) -> Result<Vec<T>>;

    /// Whether faces couple to cells beyond the patch (cyclic, processor).
    fn is_coupled(&self) -> bool {
        false
    }

    /// Whether the condition pins the level of the solution.
    fn fixes_value(&self) -> bool {
        false
    }

    /// Whether plain assignment to the patch values is meaningful.
    fn assignable(&self) -> bool {
        true
    }

    /// Cell values on the far side of a coupled patch.
    fn patch_neighbour_field(&self, _ctx: &PatchContext<'_, T>) -> Result<Option<Vec<T>>> {
        Ok(None)
    }

    /// Matrix interface for coupled patches.
    fn interface(&self, _ctx: &PatchContext<'_, T>) -> Option<Box<dyn LduInterface>> {
        None
    }

    /// `(keyword, value text)` entries written to field files, `type` excluded.
    fn write_entries(&self, values: &[T]) -> Vec<(String, String)>;

    /// Overwrite prescribed data with `values` (the `==` assignment).
    fn force_assign(&mut self, _values: &[T]) {}

    /// Remap per-face state after a topology change.
    fn auto_map(&mut self, _face_map: &[usize]) {}

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: FieldValue> Clone for Box<dyn BoundaryCondition<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Error for conditions that cannot be linearised.
pub(crate) fn no_coefficients(type_name: &str, ctx_patch: &Patch) -> FvError {
    FvError::InvalidConfig(format!(
        "'{type_name}' condition on patch '{}' has no matrix coefficients; \
         choose a condition such as fixedValue or zeroGradient for a solved field",
        ctx_patch.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_value_access() {
        let u = PatchValue::Uniform(2.0);
        assert_eq!(u.get(5), 2.0);
        assert_eq!(u.to_vec(3), vec![2.0; 3]);
        let mut n = PatchValue::NonUniform(vec![1.0, 2.0, 3.0]);
        assert!(n.check_size("refValue", 2).is_err());
        n.map_faces(&[2, 2, 0, 1]);
        assert_eq!(n, PatchValue::NonUniform(vec![3.0, 3.0, 1.0, 2.0]));
    }
}
