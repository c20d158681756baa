//! Value, gradient and blended conditions.
//!
//! | Condition      | face value                               | snGrad                          |
//! |----------------|------------------------------------------|---------------------------------|
//! | calculated     | as assigned                              | `(φ_b - φ_P)/|d|`               |
//! | fixedValue     | `φ_b`                                    | `(φ_b - φ_P)/|d|`               |
//! | fixedGradient  | `φ_P + g|d|`                             | `g`                             |
//! | zeroGradient   | `φ_P`                                    | `0`                             |
//! | mixed          | `f φ_ref + (1-f)(φ_P + g_ref|d|)`        | `f(φ_ref - φ_P)/|d| + (1-f)g_ref` |

use std::any::Any;

use super::condition::{BoundaryCondition, PatchContext, PatchValue, no_coefficients};
use crate::error::Result;
use crate::io::format::{format_field, format_patch_value};
use crate::types::FieldValue;

// =============================================================================
// calculated
// =============================================================================

/// Values are whatever the producing operation assigned.
#[derive(Clone, Debug, Default)]
pub struct Calculated;

impl<T: FieldValue> BoundaryCondition<T> for Calculated {
    fn type_name(&self) -> &'static str {
        "calculated"
    }

    fn evaluate(&mut self, _ctx: &PatchContext<'_, T>, _values: &mut [T]) -> Result<()> {
        Ok(())
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, _w: &[f64]) -> Result<Vec<T>> {
        Err(no_coefficients("calculated", ctx.patch_info()))
    }

    fn value_boundary_coeffs(
        &self,
        ctx: &PatchContext<'_, T>,
        _values: &[T],
        _w: &[f64],
    ) -> Result<Vec<T>> {
        Err(no_coefficients("calculated", ctx.patch_info()))
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
        Err(no_coefficients("calculated", ctx.patch_info()))
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Err(no_coefficients("calculated", ctx.patch_info()))
    }

    fn write_entries(&self, values: &[T]) -> Vec<(String, String)> {
        vec![("value".into(), format_field(values))]
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// fixedValue
// =============================================================================

/// Dirichlet condition.
#[derive(Clone, Debug)]
pub struct FixedValue<T> {
    pub value: PatchValue<T>,
}

impl<T: FieldValue> FixedValue<T> {
    pub fn new(value: PatchValue<T>) -> Self {
        Self { value }
    }

    /// Same value on every face.
    pub fn uniform(value: T) -> Self {
        Self::new(PatchValue::Uniform(value))
    }
}

impl<T: FieldValue> BoundaryCondition<T> for FixedValue<T> {
    fn type_name(&self) -> &'static str {
        "fixedValue"
    }

    fn evaluate(&mut self, _ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        for (i, v) in values.iter_mut().enumerate() {
            *v = self.value.get(i);
        }
        Ok(())
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, _w: &[f64]) -> Result<Vec<T>> {
        Ok(vec![T::zero(); ctx.size()])
    }

    fn value_boundary_coeffs(
        &self,
        _ctx: &PatchContext<'_, T>,
        values: &[T],
        _w: &[f64],
    ) -> Result<Vec<T>> {
        Ok(values.to_vec())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
        Ok(ctx.delta_coeffs().iter().map(|&dc| T::splat(-dc)).collect())
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, values: &[T]) -> Result<Vec<T>> {
        Ok(values
            .iter()
            .zip(ctx.delta_coeffs())
            .map(|(&v, &dc)| v * dc)
            .collect())
    }

    fn fixes_value(&self) -> bool {
        true
    }

    fn assignable(&self) -> bool {
        false
    }

    fn write_entries(&self, _values: &[T]) -> Vec<(String, String)> {
        vec![("value".into(), format_patch_value(&self.value))]
    }

    fn force_assign(&mut self, values: &[T]) {
        self.value = PatchValue::NonUniform(values.to_vec());
    }

    fn auto_map(&mut self, face_map: &[usize]) {
        self.value.map_faces(face_map);
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// fixedGradient / zeroGradient
// =============================================================================

/// Neumann condition with a prescribed normal gradient.
#[derive(Clone, Debug)]
pub struct FixedGradient<T> {
    pub gradient: PatchValue<T>,
}

impl<T: FieldValue> FixedGradient<T> {
    pub fn new(gradient: PatchValue<T>) -> Self {
        Self { gradient }
    }

    pub fn uniform(gradient: T) -> Self {
        Self::new(PatchValue::Uniform(gradient))
    }
}

impl<T: FieldValue> BoundaryCondition<T> for FixedGradient<T> {
    fn type_name(&self) -> &'static str {
        "fixedGradient"
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        let pif = ctx.patch_internal_field();
        for (i, (v, &dc)) in values.iter_mut().zip(ctx.delta_coeffs()).enumerate() {
            *v = pif[i] + self.gradient.get(i) / dc;
        }
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(self.gradient.to_vec(ctx.size()))
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, _w: &[f64]) -> Result<Vec<T>> {
        Ok(vec![T::splat(1.0); ctx.size()])
    }

    fn value_boundary_coeffs(
        &self,
        ctx: &PatchContext<'_, T>,
        _values: &[T],
        _w: &[f64],
    ) -> Result<Vec<T>> {
        Ok(ctx
            .delta_coeffs()
            .iter()
            .enumerate()
            .map(|(i, &dc)| self.gradient.get(i) / dc)
            .collect())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
        Ok(vec![T::zero(); ctx.size()])
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(self.gradient.to_vec(ctx.size()))
    }

    fn write_entries(&self, values: &[T]) -> Vec<(String, String)> {
        vec![
            ("gradient".into(), format_patch_value(&self.gradient)),
            ("value".into(), format_field(values)),
        ]
    }

    fn auto_map(&mut self, face_map: &[usize]) {
        self.gradient.map_faces(face_map);
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Zero normal gradient: face value copies the adjacent cell.
#[derive(Clone, Debug, Default)]
pub struct ZeroGradient;

impl<T: FieldValue> BoundaryCondition<T> for ZeroGradient {
    fn type_name(&self) -> &'static str {
        "zeroGradient"
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
        Ok(vec![T::splat(1.0); ctx.size()])
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

// =============================================================================
// mixed
// =============================================================================

/// Blend of fixedValue and fixedGradient by a per-face value fraction.
#[derive(Clone, Debug)]
pub struct Mixed<T> {
    pub ref_value: PatchValue<T>,
    pub ref_grad: PatchValue<T>,
    /// 1 = fixed value, 0 = fixed gradient
    pub value_fraction: PatchValue<f64>,
}

impl<T: FieldValue> Mixed<T> {
    pub fn new(
        ref_value: PatchValue<T>,
        ref_grad: PatchValue<T>,
        value_fraction: PatchValue<f64>,
    ) -> Self {
        Self {
            ref_value,
            ref_grad,
            value_fraction,
        }
    }

    fn blend(&self, ctx: &PatchContext<'_, T>) -> Vec<T> {
        let pif = ctx.patch_internal_field();
        ctx.delta_coeffs()
            .iter()
            .enumerate()
            .map(|(i, &dc)| {
                let f = self.value_fraction.get(i);
                self.ref_value.get(i) * f + (pif[i] + self.ref_grad.get(i) / dc) * (1.0 - f)
            })
            .collect()
    }
}

impl<T: FieldValue> BoundaryCondition<T> for Mixed<T> {
    fn type_name(&self) -> &'static str {
        "mixed"
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        values.copy_from_slice(&self.blend(ctx));
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        let pif = ctx.patch_internal_field();
        Ok(ctx
            .delta_coeffs()
            .iter()
            .enumerate()
            .map(|(i, &dc)| {
                let f = self.value_fraction.get(i);
                (self.ref_value.get(i) - pif[i]) * (f * dc) + self.ref_grad.get(i) * (1.0 - f)
            })
            .collect())
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_, T>, _w: &[f64]) -> Result<Vec<T>> {
        Ok((0..ctx.size())
            .map(|i| T::splat(1.0 - self.value_fraction.get(i)))
            .collect())
    }

    fn value_boundary_coeffs(
        &self,
        ctx: &PatchContext<'_, T>,
        _values: &[T],
        _w: &[f64],
    ) -> Result<Vec<T>> {
        Ok(ctx
            .delta_coeffs()
            .iter()
            .enumerate()
            .map(|(i, &dc)| {
                let f = self.value_fraction.get(i);
                self.ref_value.get(i) * f + self.ref_grad.get(i) * ((1.0 - f) / dc)
            })
            .collect())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
        Ok(ctx
            .delta_coeffs()
            .iter()
            .enumerate()
            .map(|(i, &dc)| T::splat(-self.value_fraction.get(i) * dc))
            .collect())
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(ctx
            .delta_coeffs()
            .iter()
            .enumerate()
            .map(|(i, &dc)| {
                let f = self.value_fraction.get(i);
                self.ref_value.get(i) * (f * dc) + self.ref_grad.get(i) * (1.0 - f)
            })
            .collect())
    }

    fn write_entries(&self, values: &[T]) -> Vec<(String, String)> {
        vec![
            ("refValue".into(), format_patch_value(&self.ref_value)),
            ("refGradient".into(), format_patch_value(&self.ref_grad)),
            ("valueFraction".into(), format_patch_value(&self.value_fraction)),
            ("value".into(), format_field(values)),
        ]
    }

    fn auto_map(&mut self, face_map: &[usize]) {
        self.ref_value.map_faces(face_map);
        self.ref_grad.map_faces(face_map);
        self.value_fraction.map_faces(face_map);
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
