//! Conditions implied by the patch geometry: symmetry planes and empty patches.

use std::any::Any;

use super::condition::{BoundaryCondition, PatchContext};
use crate::error::Result;
use crate::types::{FieldValue, Vector};

/// Diagonal of the snGrad transform: the per-component share of `φ_P` that
/// the reflection through `n` removes.
fn transform_diag<T: FieldValue>(n: Vector) -> T {
    T::from_fn(|c| {
        let e = T::from_fn(|k| if k == c { 1.0 } else { 0.0 });
        ((e - e.reflect(n)) * 0.5).component(c)
    })
}

/// Mirror plane: the face value is the mean of the cell value and its reflection.
///
/// Scalars behave as zero gradient; vectors lose their normal component.
#[derive(Clone, Debug, Default)]
pub struct Symmetry;

impl Symmetry {
    fn reflected_sn_grad<T: FieldValue>(ctx: &PatchContext<'_, T>) -> Vec<T> {
        let pif = ctx.patch_internal_field();
        ctx.normals()
            .into_iter()
            .zip(pif)
            .zip(ctx.delta_coeffs())
            .map(|((n, p), &dc)| (p.reflect(n) - p) * (0.5 * dc))
            .collect()
    }
}

impl<T: FieldValue> BoundaryCondition<T> for Symmetry {
    fn type_name(&self) -> &'static str {
        "symmetryPlane"
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        let pif = ctx.patch_internal_field();
        for ((v, n), p) in values.iter_mut().zip(ctx.normals()).zip(pif) {
            *v = (p + p.reflect(n)) * 0.5;
        }
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(Self::reflected_sn_grad(ctx))
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, _w: &[f64]) -> Result<Vec<T>> {
        Ok(ctx
            .normals()
            .into_iter()
            .map(|n| T::splat(1.0) - transform_diag::<T>(n))
            .collect())
    }

    fn value_boundary_coeffs(
        &self,
        ctx: &PatchContext<'_, T>,
        values: &[T],
        w: &[f64],
    ) -> Result<Vec<T>> {
        let vic = self.value_internal_coeffs(ctx, w)?;
        let pif = ctx.patch_internal_field();
        Ok(values
            .iter()
            .zip(vic.iter().zip(pif.iter()))
            .map(|(&v, (c, p))| v - c.cmpt_multiply(p))
            .collect())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
        Ok(ctx
            .normals()
            .into_iter()
            .zip(ctx.delta_coeffs())
            .map(|(n, &dc)| transform_diag::<T>(n) * -dc)
            .collect())
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        let gic = self.gradient_internal_coeffs(ctx)?;
        let pif = ctx.patch_internal_field();
        Ok(Self::reflected_sn_grad(ctx)
            .into_iter()
            .zip(gic.iter().zip(pif.iter()))
            .map(|(sn, (c, p))| sn - c.cmpt_multiply(p))
            .collect())
    }

    fn write_entries(&self, _values: &[T]) -> Vec<(String, String)> {
        Vec::new()
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Out-of-plane faces of reduced-dimension meshes. Contributes nothing.
#[derive(Clone, Debug, Default)]
pub struct Empty;

impl<T: FieldValue> BoundaryCondition<T> for Empty {
    fn type_name(&self) -> &'static str {
        "empty"
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        for (v, &c) in values.iter_mut().zip(ctx.face_cells()) {
            *v = ctx.internal[c];
        }
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(vec![T::zero(); ctx.size()])
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, _w: &[f64]) -> Result<Vec<T>> {
        Ok(vec![T::zero(); ctx.size()])
    }

    fn value_boundary_coeffs(
        &self,
        ctx: &PatchContext<'_, T>,
        _values: &[T],
        _w: &[f64],
    ) -> Result<Vec<T>> {
        Ok(vec![T::zero(); ctx.size()])
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
        Ok(vec![T::zero(); ctx.size()])
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(vec![T::zero(); ctx.size()])
    }

    fn write_entries(&self, _values: &[T]) -> Vec<(String, String)> {
        Vec::new()
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
