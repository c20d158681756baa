//! Flux-switched condition: fixed value where flow enters, zero gradient where it leaves.

use std::any::Any;

use super::basic::Mixed;
use super::condition::{BoundaryCondition, PatchContext, PatchValue};
use crate::error::Result;
use crate::io::format::{format_field, format_patch_value};
use crate::types::FieldValue;

/// `inletOutlet`: a [`Mixed`] condition whose value fraction is 1 on faces
/// with inflow (negative flux) and 0 elsewhere.
///
/// The fraction is refreshed in `update_coeffs` from the patch flux supplied
/// by the caller; without a flux the previous fraction is kept (initially
/// zero gradient everywhere).
#[derive(Clone, Debug)]
pub struct InletOutlet<T> {
    inner: Mixed<T>,
}

impl<T: FieldValue> InletOutlet<T> {
    pub fn new(inlet_value: PatchValue<T>) -> Self {
        Self {
            inner: Mixed::new(
                inlet_value,
                PatchValue::Uniform(T::zero()),
                PatchValue::Uniform(0.0),
            ),
        }
    }

    /// Current value fraction per face.
    pub fn value_fraction(&self) -> &PatchValue<f64> {
        &self.inner.value_fraction
    }
}

impl<T: FieldValue> BoundaryCondition<T> for InletOutlet<T> {
    fn type_name(&self) -> &'static str {
        "inletOutlet"
    }

    fn update_coeffs(&mut self, ctx: &PatchContext<'_, T>) -> Result<()> {
        if let Some(flux) = ctx.patch_flux {
            self.inner.value_fraction = PatchValue::NonUniform(
                flux.iter().map(|&phi| if phi >= 0.0 { 0.0 } else { 1.0 }).collect(),
            );
        }
        Ok(())
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        self.inner.evaluate(ctx, values)
    }

    fn sn_grad(&self, ctx: &PatchContext<'_, T>, values: &[T]) -> Result<Vec<T>> {
        self.inner.sn_grad(ctx, values)
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, w: &[f64]) -> Result<Vec<T>> {
        self.inner.value_internal_coeffs(ctx, w)
    }

    fn value_boundary_coeffs(
        &self,
        ctx: &PatchContext<'_, T>,
        values: &[T],
        w: &[f64],
    ) -> Result<Vec<T>> {
        self.inner.value_boundary_coeffs(ctx, values, w)
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
        self.inner.gradient_internal_coeffs(ctx)
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, values: &[T]) -> Result<Vec<T>> {
        self.inner.gradient_boundary_coeffs(ctx, values)
    }

    fn write_entries(&self, values: &[T]) -> Vec<(String, String)> {
        vec![
            ("inletValue".into(), format_patch_value(&self.inner.ref_value)),
            ("value".into(), format_field(values)),
        ]
    }

    fn auto_map(&mut self, face_map: &[usize]) {
        self.inner.auto_map(face_map);
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::HexBlock;

    #[test]
    fn test_switches_on_flux_sign() {
        let mesh = HexBlock::new(1, 2, 1).build().unwrap();
        let geo = mesh.geometry();
        let right = mesh.patch_by_name("right").unwrap();
        let internal = [7.0, 8.0];
        let flux = [-1.0, 2.0];
        let ctx = PatchContext::new(&mesh, &geo, right, &internal).with_flux(Some(&flux));
        let mut bc = InletOutlet::new(PatchValue::Uniform(1.0));
        bc.update_coeffs(&ctx).unwrap();
        let mut values = vec![0.0; 2];
        bc.evaluate(&ctx, &mut values).unwrap();
        assert_eq!(values, vec![1.0, 8.0]);
        assert_eq!(bc.value_fraction(), &PatchValue::NonUniform(vec![1.0, 0.0]));
    }
}
