//! Tensor-rank value types stored in fields.
//!
//! - [`Vector`]: rank-1, three components
//! - [`Tensor`]: rank-2, nine components (row-major)
//! - [`SymmTensor`]: symmetric rank-2, six components
//! - [`FieldValue`]: what a field element must provide
//! - [`Differentiable`]: value types with a gradient type

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Index, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Operations every field element type supports.
///
/// Scalars, vectors and tensors are treated uniformly as a fixed number of
/// `f64` components. Segregated solvers work one component at a time.
pub trait FieldValue:
    Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign<f64>
{
    /// Name used in field files and typed lookups (`scalar`, `vector`, ...).
    const TYPE_NAME: &'static str;

    /// Number of scalar components.
    const N_COMPONENTS: usize;

    /// Zero value.
    fn zero() -> Self {
        Self::default()
    }

    /// Value with every component set to `v`.
    fn splat(v: f64) -> Self {
        Self::from_fn(|_| v)
    }

    /// Build from a component generator.
    fn from_fn(f: impl FnMut(usize) -> f64) -> Self;

    /// Component `i`.
    fn component(&self, i: usize) -> f64;

    /// Set component `i`.
    fn set_component(&mut self, i: usize, v: f64);

    /// Full contraction with another value (`a & b` for vectors, `a && b` for tensors).
    fn inner(&self, other: &Self) -> f64;

    /// Squared magnitude.
    fn mag_sqr(&self) -> f64 {
        self.inner(self)
    }

    /// Magnitude.
    fn mag(&self) -> f64 {
        self.mag_sqr().sqrt()
    }

    /// Component-wise product.
    fn cmpt_multiply(&self, other: &Self) -> Self {
        Self::from_fn(|i| self.component(i) * other.component(i))
    }

    /// Component-wise maximum.
    fn cmpt_max(&self, other: &Self) -> Self {
        Self::from_fn(|i| self.component(i).max(other.component(i)))
    }

    /// Component-wise minimum.
    fn cmpt_min(&self, other: &Self) -> Self {
        Self::from_fn(|i| self.component(i).min(other.component(i)))
    }

    /// Mirror image through the plane with unit normal `n`.
    fn reflect(&self, n: Vector) -> Self;

    /// Whether every component is finite.
    fn is_finite(&self) -> bool {
        (0..Self::N_COMPONENTS).all(|i| self.component(i).is_finite())
    }
}

/// Value types that have a cell gradient.
pub trait Differentiable: FieldValue {
    /// Type of `grad(self)`.
    type Grad: FieldValue;

    /// Outer product `v ⊗ value` (e.g. `Sf ⊗ phi_f` in Gauss gradients).
    fn outer(v: Vector, value: Self) -> Self::Grad;

    /// Directional derivative `d & grad`.
    fn directional(d: Vector, grad: &Self::Grad) -> Self;
}

// =============================================================================
// Scalar
// =============================================================================

impl FieldValue for f64 {
    const TYPE_NAME: &'static str = "scalar";
    const N_COMPONENTS: usize = 1;

    fn from_fn(mut f: impl FnMut(usize) -> f64) -> Self {
        f(0)
    }

    #[inline]
    fn component(&self, _i: usize) -> f64 {
        *self
    }

    #[inline]
    fn set_component(&mut self, _i: usize, v: f64) {
        *self = v;
    }

    #[inline]
    fn inner(&self, other: &Self) -> f64 {
        self * other
    }

    #[inline]
    fn mag(&self) -> f64 {
        self.abs()
    }

    fn reflect(&self, _n: Vector) -> Self {
        *self
    }
}

impl Differentiable for f64 {
    type Grad = Vector;

    #[inline]
    fn outer(v: Vector, value: f64) -> Vector {
        v * value
    }

    #[inline]
    fn directional(d: Vector, grad: &Vector) -> f64 {
        d.dot(grad)
    }
}

// =============================================================================
// Component-wise arithmetic
// =============================================================================

macro_rules! impl_componentwise_ops {
    ($ty:ident { $($c:ident),+ }) => {
        impl Add for $ty {
            type Output = Self;
            #[inline]
            fn add(self, rhs: Self) -> Self {
                Self { $($c: self.$c + rhs.$c),+ }
            }
        }

        impl Sub for $ty {
            type Output = Self;
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                Self { $($c: self.$c - rhs.$c),+ }
            }
        }

        impl Neg for $ty {
            type Output = Self;
            #[inline]
            fn neg(self) -> Self {
                Self { $($c: -self.$c),+ }
            }
        }

        impl Mul<f64> for $ty {
            type Output = Self;
            #[inline]
            fn mul(self, s: f64) -> Self {
                Self { $($c: self.$c * s),+ }
            }
        }

        impl Mul<$ty> for f64 {
            type Output = $ty;
            #[inline]
            fn mul(self, v: $ty) -> $ty {
                v * self
            }
        }

        impl Div<f64> for $ty {
            type Output = Self;
            #[inline]
            fn div(self, s: f64) -> Self {
                Self { $($c: self.$c / s),+ }
            }
        }

        impl AddAssign for $ty {
            #[inline]
            fn add_assign(&mut self, rhs: Self) {
                $(self.$c += rhs.$c;)+
            }
        }

        impl SubAssign for $ty {
            #[inline]
            fn sub_assign(&mut self, rhs: Self) {
                $(self.$c -= rhs.$c;)+
            }
        }

        impl MulAssign<f64> for $ty {
            #[inline]
            fn mul_assign(&mut self, s: f64) {
                $(self.$c *= s;)+
            }
        }
    };
}

// =============================================================================
// Vector
// =============================================================================

/// Three-component vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl_componentwise_ops!(Vector { x, y, z });

impl Vector {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit x.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit y.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit z.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Inner product.
    #[inline]
    pub fn dot(&self, other: &Vector) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[inline]
    pub fn cross(&self, other: &Vector) -> Vector {
        Vector::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Outer product `self ⊗ other`.
    pub fn outer(&self, other: &Vector) -> Tensor {
        Tensor::new([
            self.x * other.x,
            self.x * other.y,
            self.x * other.z,
            self.y * other.x,
            self.y * other.y,
            self.y * other.z,
            self.z * other.x,
            self.z * other.y,
            self.z * other.z,
        ])
    }

    /// Symmetric outer product `self ⊗ self`.
    pub fn sqr(&self) -> SymmTensor {
        SymmTensor::new([
            self.x * self.x,
            self.x * self.y,
            self.x * self.z,
            self.y * self.y,
            self.y * self.z,
            self.z * self.z,
        ])
    }

    /// Vector magnitude.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalised(&self) -> Vector {
        let m = self.norm();
        if m > 0.0 { *self / m } else { Vector::ZERO }
    }

    /// Component `i` as an array-style accessor.
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Index<usize> for Vector {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

impl FieldValue for Vector {
    const TYPE_NAME: &'static str = "vector";
    const N_COMPONENTS: usize = 3;

    fn from_fn(mut f: impl FnMut(usize) -> f64) -> Self {
        Vector::new(f(0), f(1), f(2))
    }

    #[inline]
    fn component(&self, i: usize) -> f64 {
        self[i]
    }

    fn set_component(&mut self, i: usize, v: f64) {
        match i {
            0 => self.x = v,
            1 => self.y = v,
            _ => self.z = v,
        }
    }

    #[inline]
    fn inner(&self, other: &Self) -> f64 {
        self.dot(other)
    }

    fn reflect(&self, n: Vector) -> Self {
        *self - n * (2.0 * n.dot(self))
    }
}

impl Differentiable for Vector {
    type Grad = Tensor;

    #[inline]
    fn outer(v: Vector, value: Vector) -> Tensor {
        v.outer(&value)
    }

    #[inline]
    fn directional(d: Vector, grad: &Tensor) -> Vector {
        grad.transpose_dot(d)
    }
}

// =============================================================================
// Tensor
// =============================================================================

/// Nine-component second-rank tensor, row-major (`xx xy xz yx yy yz zx zy zz`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub c: [f64; 9],
}

impl Tensor {
    /// Identity tensor.
    pub const I: Self = Self::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub const fn new(c: [f64; 9]) -> Self {
        Self { c }
    }

    /// Tensor with the given diagonal.
    pub fn diagonal(d: Vector) -> Self {
        Self::new([d.x, 0.0, 0.0, 0.0, d.y, 0.0, 0.0, 0.0, d.z])
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.c[3 * row + col]
    }

    pub fn transpose(&self) -> Tensor {
        let c = &self.c;
        Tensor::new([c[0], c[3], c[6], c[1], c[4], c[7], c[2], c[5], c[8]])
    }

    pub fn trace(&self) -> f64 {
        self.c[0] + self.c[4] + self.c[8]
    }

    pub fn det(&self) -> f64 {
        let c = &self.c;
        c[0] * (c[4] * c[8] - c[5] * c[7]) - c[1] * (c[3] * c[8] - c[5] * c[6])
            + c[2] * (c[3] * c[7] - c[4] * c[6])
    }

    /// Inverse via the adjugate; `None` for a singular tensor.
    pub fn inv(&self) -> Option<Tensor> {
        let det = self.det();
        if det.abs() < f64::MIN_POSITIVE {
            return None;
        }
        let c = &self.c;
        let adj = [
            c[4] * c[8] - c[5] * c[7],
            c[2] * c[7] - c[1] * c[8],
            c[1] * c[5] - c[2] * c[4],
            c[5] * c[6] - c[3] * c[8],
            c[0] * c[8] - c[2] * c[6],
            c[2] * c[3] - c[0] * c[5],
            c[3] * c[7] - c[4] * c[6],
            c[1] * c[6] - c[0] * c[7],
            c[0] * c[4] - c[1] * c[3],
        ];
        Some(Tensor::new(adj.map(|a| a / det)))
    }

    /// `self & v`.
    pub fn dot_vector(&self, v: Vector) -> Vector {
        let c = &self.c;
        Vector::new(
            c[0] * v.x + c[1] * v.y + c[2] * v.z,
            c[3] * v.x + c[4] * v.y + c[5] * v.z,
            c[6] * v.x + c[7] * v.y + c[8] * v.z,
        )
    }

    /// `v & self`.
    pub fn transpose_dot(&self, v: Vector) -> Vector {
        let c = &self.c;
        Vector::new(
            v.x * c[0] + v.y * c[3] + v.z * c[6],
            v.x * c[1] + v.y * c[4] + v.z * c[7],
            v.x * c[2] + v.y * c[5] + v.z * c[8],
        )
    }

    /// Tensor product `self & other`.
    pub fn dot(&self, other: &Tensor) -> Tensor {
        let mut out = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                out[3 * i + j] = (0..3).map(|k| self.get(i, k) * other.get(k, j)).sum();
            }
        }
        Tensor::new(out)
    }

    /// Symmetric part.
    pub fn symm(&self) -> SymmTensor {
        let c = &self.c;
        SymmTensor::new([
            c[0],
            0.5 * (c[1] + c[3]),
            0.5 * (c[2] + c[6]),
            c[4],
            0.5 * (c[5] + c[7]),
            c[8],
        ])
    }
}

impl Add for Tensor {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Tensor::new(std::array::from_fn(|i| self.c[i] + rhs.c[i]))
    }
}

impl Sub for Tensor {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Tensor::new(std::array::from_fn(|i| self.c[i] - rhs.c[i]))
    }
}

impl Neg for Tensor {
    type Output = Self;
    fn neg(self) -> Self {
        Tensor::new(self.c.map(|a| -a))
    }
}

impl Mul<f64> for Tensor {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Tensor::new(self.c.map(|a| a * s))
    }
}

impl Mul<Tensor> for f64 {
    type Output = Tensor;
    fn mul(self, t: Tensor) -> Tensor {
        t * self
    }
}

impl Div<f64> for Tensor {
    type Output = Self;
    fn div(self, s: f64) -> Self {
        Tensor::new(self.c.map(|a| a / s))
    }
}

impl AddAssign for Tensor {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.c.iter_mut().zip(rhs.c) {
            *a += b;
        }
    }
}

impl SubAssign for Tensor {
    fn sub_assign(&mut self, rhs: Self) {
        for (a, b) in self.c.iter_mut().zip(rhs.c) {
            *a -= b;
        }
    }
}

impl MulAssign<f64> for Tensor {
    fn mul_assign(&mut self, s: f64) {
        for a in self.c.iter_mut() {
            *a *= s;
        }
    }
}

impl FieldValue for Tensor {
    const TYPE_NAME: &'static str = "tensor";
    const N_COMPONENTS: usize = 9;

    fn from_fn(f: impl FnMut(usize) -> f64) -> Self {
        Tensor::new(std::array::from_fn(f))
    }

    #[inline]
    fn component(&self, i: usize) -> f64 {
        self.c[i]
    }

    fn set_component(&mut self, i: usize, v: f64) {
        self.c[i] = v;
    }

    fn inner(&self, other: &Self) -> f64 {
        self.c.iter().zip(other.c.iter()).map(|(a, b)| a * b).sum()
    }

    fn reflect(&self, n: Vector) -> Self {
        let r = Tensor::I - n.outer(&n) * 2.0;
        r.dot(self).dot(&r)
    }
}

// =============================================================================
// SymmTensor
// =============================================================================

/// Symmetric second-rank tensor (`xx xy xz yy yz zz`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SymmTensor {
    pub c: [f64; 6],
}

impl SymmTensor {
    /// Identity.
    pub const I: Self = Self::new([1.0, 0.0, 0.0, 1.0, 0.0, 1.0]);

    pub const fn new(c: [f64; 6]) -> Self {
        Self { c }
    }

    /// Expand to a full tensor.
    pub fn to_tensor(&self) -> Tensor {
        let c = &self.c;
        Tensor::new([c[0], c[1], c[2], c[1], c[3], c[4], c[2], c[4], c[5]])
    }

    pub fn trace(&self) -> f64 {
        self.c[0] + self.c[3] + self.c[5]
    }

    /// `self & v`.
    pub fn dot_vector(&self, v: Vector) -> Vector {
        self.to_tensor().dot_vector(v)
    }

    /// Inverse, `None` when singular.
    pub fn inv(&self) -> Option<SymmTensor> {
        self.to_tensor().inv().map(|t| t.symm())
    }
}

impl Add for SymmTensor {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        SymmTensor::new(std::array::from_fn(|i| self.c[i] + rhs.c[i]))
    }
}

impl Sub for SymmTensor {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        SymmTensor::new(std::array::from_fn(|i| self.c[i] - rhs.c[i]))
    }
}

impl Neg for SymmTensor {
    type Output = Self;
    fn neg(self) -> Self {
        SymmTensor::new(self.c.map(|a| -a))
    }
}

impl Mul<f64> for SymmTensor {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        SymmTensor::new(self.c.map(|a| a * s))
    }
}

impl Div<f64> for SymmTensor {
    type Output = Self;
    fn div(self, s: f64) -> Self {
        SymmTensor::new(self.c.map(|a| a / s))
    }
}

impl AddAssign for SymmTensor {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.c.iter_mut().zip(rhs.c) {
            *a += b;
        }
    }
}

impl SubAssign for SymmTensor {
    fn sub_assign(&mut self, rhs: Self) {
        for (a, b) in self.c.iter_mut().zip(rhs.c) {
            *a -= b;
        }
    }
}

impl MulAssign<f64> for SymmTensor {
    fn mul_assign(&mut self, s: f64) {
        for a in self.c.iter_mut() {
            *a *= s;
        }
    }
}

impl FieldValue for SymmTensor {
    const TYPE_NAME: &'static str = "symmTensor";
    const N_COMPONENTS: usize = 6;

    fn from_fn(f: impl FnMut(usize) -> f64) -> Self {
        SymmTensor::new(std::array::from_fn(f))
    }

    #[inline]
    fn component(&self, i: usize) -> f64 {
        self.c[i]
    }

    fn set_component(&mut self, i: usize, v: f64) {
        self.c[i] = v;
    }

    fn inner(&self, other: &Self) -> f64 {
        let (a, b) = (&self.c, &other.c);
        a[0] * b[0] + a[3] * b[3] + a[5] * b[5] + 2.0 * (a[1] * b[1] + a[2] * b[2] + a[4] * b[4])
    }

    fn reflect(&self, n: Vector) -> Self {
        self.to_tensor().reflect(n).symm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_vector_products() {
        let a = Vector::new(1.0, 2.0, 3.0);
        let b = Vector::new(-2.0, 0.5, 1.0);
        assert!((a.dot(&b) - 2.0).abs() < TOL);
        let c = a.cross(&b);
        assert!(c.dot(&a).abs() < TOL);
        assert!(c.dot(&b).abs() < TOL);
    }

    #[test]
    fn test_tensor_inverse() {
        let t = Tensor::new([4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0]);
        let inv = t.inv().unwrap();
        let id = t.dot(&inv);
        for i in 0..9 {
            assert!((id.c[i] - Tensor::I.c[i]).abs() < TOL);
        }
        assert!(Tensor::default().inv().is_none());
    }

    #[test]
    fn test_directional_derivative_of_vector() {
        // grad(U) for U = (2x, 3y, 0): d & grad(U) along x gives (2, 0, 0)
        let grad = Tensor::diagonal(Vector::new(2.0, 3.0, 0.0));
        let d = Vector::X;
        let v = <Vector as Differentiable>::directional(d, &grad);
        assert!((v.x - 2.0).abs() < TOL);
        assert!(v.y.abs() < TOL);
    }

    #[test]
    fn test_reflection() {
        let n = Vector::X;
        let v = Vector::new(1.0, 2.0, 3.0);
        assert_eq!(v.reflect(n), Vector::new(-1.0, 2.0, 3.0));
        assert_eq!(5.0_f64.reflect(n), 5.0);

        let t = Vector::new(1.0, 2.0, 0.0).outer(&Vector::new(1.0, 2.0, 0.0));
        let r = t.reflect(n);
        // xy component flips sign under x-reflection
        assert!((r.get(0, 1) + t.get(0, 1)).abs() < TOL);
        assert!((r.get(1, 1) - t.get(1, 1)).abs() < TOL);
    }

    #[test]
    fn test_symm_tensor_inner_matches_full() {
        let s = SymmTensor::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = s.to_tensor();
        assert!((s.inner(&s) - t.inner(&t)).abs() < TOL);
    }

    #[test]
    fn test_field_value_components() {
        let mut v = Vector::splat(1.5);
        v.set_component(2, -1.0);
        assert_eq!(v.component(0), 1.5);
        assert_eq!(v.component(2), -1.0);
        assert_eq!(<Vector as FieldValue>::N_COMPONENTS, 3);
        assert_eq!(<f64 as FieldValue>::TYPE_NAME, "scalar");
    }
}
