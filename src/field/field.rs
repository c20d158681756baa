//! Contiguous value arrays.
//!
//! [`Field<T>`] is a thin owner of a `Vec<T>`. Arithmetic consumes its left
//! operand and reuses the buffer, so chained expressions like
//! `a * 2.0 + &b - &c` allocate once:
//!
//! ```
//! use fv_rs::field::Field;
//!
//! let a = Field::new(vec![1.0, 2.0, 3.0]);
//! let b = Field::uniform(3, 1.0);
//! let c = a * 2.0 + &b;
//! assert_eq!(c.as_slice(), &[3.0, 5.0, 7.0]);
//! ```

use std::ops::{Add, Deref, DerefMut, Mul, Neg, Sub};

use crate::error::{FvError, Result};
use crate::parallel::{Communicator, ReduceOp};
use crate::types::FieldValue;

/// Dense array of values, one per cell or face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Field<T> {
    values: Vec<T>,
}

impl<T: FieldValue> Field<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }

    /// Field of `n` copies of `value`.
    pub fn uniform(n: usize, value: T) -> Self {
        Self {
            values: vec![value; n],
        }
    }

    /// Field of `n` zeros.
    pub fn zeros(n: usize) -> Self {
        Self::uniform(n, T::zero())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values
    }

    /// Apply `f` element-wise into a new field.
    pub fn map<U: FieldValue>(&self, f: impl Fn(T) -> U) -> Field<U> {
        Field::new(self.values.iter().map(|&v| f(v)).collect())
    }

    /// Combine with another field element-wise.
    pub fn zip_map<U: FieldValue, V: FieldValue>(
        &self,
        other: &[U],
        f: impl Fn(T, U) -> V,
    ) -> Result<Field<V>> {
        self.check_len("zip_map", other.len())?;
        Ok(Field::new(
            self.values
                .iter()
                .zip(other.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        ))
    }

    /// Multiply element-wise by a scalar field, in place.
    pub fn scale_by(&mut self, s: &[f64]) -> Result<()> {
        self.check_len("scale_by", s.len())?;
        for (v, &k) in self.values.iter_mut().zip(s.iter()) {
            *v *= k;
        }
        Ok(())
    }

    /// Assign every element.
    pub fn fill(&mut self, value: T) {
        self.values.iter_mut().for_each(|v| *v = value);
    }

    /// Sum of elements, accumulated in index order.
    pub fn sum(&self) -> T {
        self.values.iter().fold(T::zero(), |acc, &v| acc + v)
    }

    /// Arithmetic mean; zero for an empty field.
    pub fn average(&self) -> T {
        if self.values.is_empty() {
            T::zero()
        } else {
            self.sum() / self.values.len() as f64
        }
    }

    /// Mean weighted by `weights` (e.g. cell volumes).
    pub fn weighted_average(&self, weights: &[f64]) -> Result<T> {
        self.check_len("weighted_average", weights.len())?;
        let total: f64 = weights.iter().sum();
        if total.abs() <= 0.0 {
            return Ok(T::zero());
        }
        let acc = self
            .values
            .iter()
            .zip(weights.iter())
            .fold(T::zero(), |acc, (&v, &w)| acc + v * w);
        Ok(acc / total)
    }

    /// Element magnitudes.
    pub fn mag(&self) -> Field<f64> {
        self.map(|v| v.mag())
    }

    /// Component-wise maximum over all elements.
    pub fn cmpt_max(&self) -> Option<T> {
        self.values.iter().copied().reduce(|a, b| a.cmpt_max(&b))
    }

    /// Component-wise minimum over all elements.
    pub fn cmpt_min(&self) -> Option<T> {
        self.values.iter().copied().reduce(|a, b| a.cmpt_min(&b))
    }

    /// Sum over all domains.
    pub fn gsum(&self, comm: &dyn Communicator) -> Result<T> {
        let local = self.sum();
        let mut out = T::zero();
        for c in 0..T::N_COMPONENTS {
            out.set_component(c, comm.global_reduce(local.component(c), ReduceOp::Sum)?);
        }
        Ok(out)
    }

    /// Component-wise maximum over all domains.
    pub fn gmax(&self, comm: &dyn Communicator) -> Result<T> {
        self.global_extreme(comm, ReduceOp::Max)
    }

    /// Component-wise minimum over all domains.
    pub fn gmin(&self, comm: &dyn Communicator) -> Result<T> {
        self.global_extreme(comm, ReduceOp::Min)
    }

    fn global_extreme(&self, comm: &dyn Communicator, op: ReduceOp) -> Result<T> {
        let start = match op {
            ReduceOp::Max => f64::NEG_INFINITY,
            _ => f64::INFINITY,
        };
        let mut out = T::zero();
        for c in 0..T::N_COMPONENTS {
            let local = self
                .values
                .iter()
                .map(|v| v.component(c))
                .fold(start, |a, b| op.combine(a, b));
            out.set_component(c, comm.global_reduce(local, op)?);
        }
        Ok(out)
    }

    /// Copy out one component as a scalar field.
    pub fn component(&self, c: usize) -> Field<f64> {
        self.map(|v| v.component(c))
    }

    /// Overwrite one component from a scalar slice.
    pub fn replace_component(&mut self, c: usize, values: &[f64]) -> Result<()> {
        self.check_len("replace_component", values.len())?;
        for (v, &s) in self.values.iter_mut().zip(values.iter()) {
            v.set_component(c, s);
        }
        Ok(())
    }

    fn check_len(&self, op: &str, other: usize) -> Result<()> {
        if other != self.values.len() {
            return Err(FvError::size_mismatch(
                format!("field operand of {op}"),
                self.values.len(),
                other,
            ));
        }
        Ok(())
    }
}

impl Field<f64> {
    /// Largest element.
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Smallest element.
    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }
}

impl<T> Deref for Field<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.values
    }
}

impl<T> DerefMut for Field<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.values
    }
}

impl<T: FieldValue> From<Vec<T>> for Field<T> {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

impl<T: FieldValue> FromIterator<T> for Field<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// =============================================================================
// Arithmetic (left operand buffer is reused)
// =============================================================================

impl<T: FieldValue> Add<&Field<T>> for Field<T> {
    type Output = Field<T>;

    /// # Panics
    /// Panics if lengths differ.
    fn add(mut self, rhs: &Field<T>) -> Field<T> {
        assert_eq!(self.len(), rhs.len(), "field length mismatch in +");
        for (a, &b) in self.values.iter_mut().zip(rhs.values.iter()) {
            *a += b;
        }
        self
    }
}

impl<T: FieldValue> Sub<&Field<T>> for Field<T> {
    type Output = Field<T>;

    /// # Panics
    /// Panics if lengths differ.
    fn sub(mut self, rhs: &Field<T>) -> Field<T> {
        assert_eq!(self.len(), rhs.len(), "field length mismatch in -");
        for (a, &b) in self.values.iter_mut().zip(rhs.values.iter()) {
            *a -= b;
        }
        self
    }
}

impl<T: FieldValue> Add<&Field<T>> for &Field<T> {
    type Output = Field<T>;
    fn add(self, rhs: &Field<T>) -> Field<T> {
        self.clone() + rhs
    }
}

impl<T: FieldValue> Sub<&Field<T>> for &Field<T> {
    type Output = Field<T>;
    fn sub(self, rhs: &Field<T>) -> Field<T> {
        self.clone() - rhs
    }
}

impl<T: FieldValue> Mul<f64> for Field<T> {
    type Output = Field<T>;
    fn mul(mut self, s: f64) -> Field<T> {
        for v in self.values.iter_mut() {
            *v *= s;
        }
        self
    }
}

impl<T: FieldValue> Neg for Field<T> {
    type Output = Field<T>;
    fn neg(mut self) -> Field<T> {
        for v in self.values.iter_mut() {
            *v = -*v;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;
    use crate::types::Vector;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_reductions() {
        let f = Field::new(vec![1.0, -2.0, 4.0]);
        assert!((f.sum() - 3.0).abs() < TOL);
        assert!((f.average() - 1.0).abs() < TOL);
        assert_eq!(f.max(), Some(4.0));
        assert_eq!(f.min(), Some(-2.0));
        let w = f.weighted_average(&[1.0, 0.0, 1.0]).unwrap();
        assert!((w - 2.5).abs() < TOL);
        assert!(f.weighted_average(&[1.0]).is_err());
    }

    #[test]
    fn test_vector_field_ops() {
        let a: Field<Vector> = vec![Vector::X, Vector::Y].into();
        let b = Field::uniform(2, Vector::Z);
        let c = a.clone() + &b;
        assert_eq!(c[0], Vector::new(1.0, 0.0, 1.0));
        let d = -(c * 2.0);
        assert_eq!(d[1], Vector::new(0.0, -2.0, -2.0));
        assert_eq!(a.mag().as_slice(), &[1.0, 1.0]);
        assert_eq!(a.cmpt_max(), Some(Vector::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_buffer_reuse() {
        let a = Field::new(vec![1.0; 4]);
        let ptr = a.as_slice().as_ptr();
        let b = Field::new(vec![2.0; 4]);
        let c = a * 3.0 + &b;
        assert_eq!(c.as_slice().as_ptr(), ptr);
        assert_eq!(c[0], 5.0);
    }

    #[test]
    fn test_component_access_and_global_reductions() {
        let mut f: Field<Vector> = vec![Vector::new(1.0, 2.0, 3.0), Vector::new(-1.0, 5.0, 0.0)].into();
        assert_eq!(f.component(1).as_slice(), &[2.0, 5.0]);
        f.replace_component(2, &[7.0, 8.0]).unwrap();
        assert_eq!(f[1].z, 8.0);
        let comm = SerialComm;
        assert_eq!(f.gsum(&comm).unwrap(), Vector::new(0.0, 7.0, 15.0));
        assert_eq!(f.gmax(&comm).unwrap(), Vector::new(1.0, 5.0, 8.0));
        assert_eq!(f.gmin(&comm).unwrap(), Vector::new(-1.0, 2.0, 7.0));
    }
}
