//! Physical dimension sets and dimensioned values.
//!
//! A [`DimensionSet`] holds the exponents of the seven SI base dimensions:
//! mass, length, time, temperature, moles, current and luminous intensity.
//! Multiplication and division combine exponents; addition, subtraction and
//! comparison require identical sets and fail with
//! [`FvError::DimensionMismatch`] otherwise.
//!
//! ```
//! use fv_rs::types::{Dimensioned, DIM_LENGTH, DIM_TIME};
//!
//! let l = Dimensioned::new("L", DIM_LENGTH, 2.0);
//! let t = Dimensioned::new("t", DIM_TIME, 4.0);
//! let u = l.clone() / t.clone();
//! assert_eq!(u.value, 0.5);
//! assert!((l + t).is_err());
//! ```

use std::fmt;
use std::ops::{Div, Mul};

use serde::{Deserialize, Serialize};

use super::tensor::FieldValue;
use crate::error::{FvError, Result};

/// Exponents closer than this are considered equal.
const SMALL_EXPONENT: f64 = 1e-10;

/// Number of base dimensions.
pub const N_DIMENSIONS: usize = 7;

/// Exponents of the seven SI base dimensions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DimensionSet {
    exponents: [f64; N_DIMENSIONS],
}

impl DimensionSet {
    /// Create from the seven exponents in SI order.
    pub const fn new(
        mass: f64,
        length: f64,
        time: f64,
        temperature: f64,
        moles: f64,
        current: f64,
        luminous_intensity: f64,
    ) -> Self {
        Self {
            exponents: [
                mass,
                length,
                time,
                temperature,
                moles,
                current,
                luminous_intensity,
            ],
        }
    }

    /// Create from an exponent array.
    pub const fn from_array(exponents: [f64; N_DIMENSIONS]) -> Self {
        Self { exponents }
    }

    /// Exponent array.
    pub fn exponents(&self) -> &[f64; N_DIMENSIONS] {
        &self.exponents
    }

    /// True when every exponent is zero.
    pub fn is_dimensionless(&self) -> bool {
        self.exponents.iter().all(|e| e.abs() < SMALL_EXPONENT)
    }

    /// Return `Ok` when `other` matches, otherwise a mismatch error naming `operation`.
    pub fn check_same(&self, operation: &str, other: &DimensionSet) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(FvError::dimension_mismatch(operation, *self, *other))
        }
    }

    /// Raise to a power.
    pub fn pow(&self, p: f64) -> DimensionSet {
        DimensionSet::from_array(self.exponents.map(|e| e * p))
    }

    /// Square root.
    pub fn sqrt(&self) -> DimensionSet {
        self.pow(0.5)
    }

    /// Reciprocal dimensions.
    pub fn inv(&self) -> DimensionSet {
        self.pow(-1.0)
    }
}

impl PartialEq for DimensionSet {
    fn eq(&self, other: &Self) -> bool {
        self.exponents
            .iter()
            .zip(other.exponents.iter())
            .all(|(a, b)| (a - b).abs() < SMALL_EXPONENT)
    }
}

impl Default for DimensionSet {
    fn default() -> Self {
        DIMLESS
    }
}

impl Mul for DimensionSet {
    type Output = DimensionSet;
    fn mul(self, rhs: DimensionSet) -> DimensionSet {
        DimensionSet::from_array(std::array::from_fn(|i| self.exponents[i] + rhs.exponents[i]))
    }
}

impl Div for DimensionSet {
    type Output = DimensionSet;
    fn div(self, rhs: DimensionSet) -> DimensionSet {
        DimensionSet::from_array(std::array::from_fn(|i| self.exponents[i] - rhs.exponents[i]))
    }
}

impl fmt::Display for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.exponents.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{e}")?;
        }
        write!(f, "]")
    }
}

impl std::str::FromStr for DimensionSet {
    type Err = FvError;

    /// Parse `[m l t T n i j]`.
    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| FvError::parse(0, format!("dimension set must be bracketed: {s}")))?;
        let values: Vec<f64> = inner
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| FvError::parse(0, format!("bad dimension exponent '{t}'")))
            })
            .collect::<Result<_>>()?;
        if values.len() != N_DIMENSIONS {
            return Err(FvError::parse(
                0,
                format!("expected {N_DIMENSIONS} exponents, got {}", values.len()),
            ));
        }
        Ok(DimensionSet::from_array(std::array::from_fn(|i| values[i])))
    }
}

// =============================================================================
// Named dimension sets
// =============================================================================

pub const DIMLESS: DimensionSet = DimensionSet::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_MASS: DimensionSet = DimensionSet::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_LENGTH: DimensionSet = DimensionSet::new(0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_TIME: DimensionSet = DimensionSet::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_TEMPERATURE: DimensionSet = DimensionSet::new(0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0);
pub const DIM_MOLES: DimensionSet = DimensionSet::new(0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0);
pub const DIM_CURRENT: DimensionSet = DimensionSet::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0);
pub const DIM_LUMINOUS_INTENSITY: DimensionSet =
    DimensionSet::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0);

pub const DIM_AREA: DimensionSet = DimensionSet::new(0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_VOLUME: DimensionSet = DimensionSet::new(0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_VELOCITY: DimensionSet = DimensionSet::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_DENSITY: DimensionSet = DimensionSet::new(1.0, -3.0, 0.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_PRESSURE: DimensionSet = DimensionSet::new(1.0, -1.0, -2.0, 0.0, 0.0, 0.0, 0.0);
pub const DIM_KINEMATIC_VISCOSITY: DimensionSet =
    DimensionSet::new(0.0, 2.0, -1.0, 0.0, 0.0, 0.0, 0.0);

// =============================================================================
// Dimensioned values
// =============================================================================

/// A named value tagged with its physical dimensions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensioned<T> {
    pub name: String,
    pub dimensions: DimensionSet,
    pub value: T,
}

impl<T: FieldValue> Dimensioned<T> {
    pub fn new(name: impl Into<String>, dimensions: DimensionSet, value: T) -> Self {
        Self {
            name: name.into(),
            dimensions,
            value,
        }
    }

    /// Dimensionless value.
    pub fn dimless(name: impl Into<String>, value: T) -> Self {
        Self::new(name, DIMLESS, value)
    }

    /// Checked addition.
    pub fn try_add(&self, rhs: &Dimensioned<T>) -> Result<Dimensioned<T>> {
        let op = format!("{} + {}", self.name, rhs.name);
        self.dimensions.check_same(&op, &rhs.dimensions)?;
        Ok(Dimensioned::new(op, self.dimensions, self.value + rhs.value))
    }

    /// Checked subtraction.
    pub fn try_sub(&self, rhs: &Dimensioned<T>) -> Result<Dimensioned<T>> {
        let op = format!("{} - {}", self.name, rhs.name);
        self.dimensions.check_same(&op, &rhs.dimensions)?;
        Ok(Dimensioned::new(op, self.dimensions, self.value - rhs.value))
    }

    /// Magnitude with the same dimensions.
    pub fn mag(&self) -> Dimensioned<f64> {
        Dimensioned::new(format!("mag({})", self.name), self.dimensions, self.value.mag())
    }
}

impl Dimensioned<f64> {
    /// Checked comparison; fails when the dimensions differ.
    pub fn try_partial_cmp(&self, rhs: &Dimensioned<f64>) -> Result<Option<std::cmp::Ordering>> {
        let op = format!("{} <=> {}", self.name, rhs.name);
        self.dimensions.check_same(&op, &rhs.dimensions)?;
        Ok(self.value.partial_cmp(&rhs.value))
    }
}

impl<T: FieldValue> std::ops::Add for Dimensioned<T> {
    type Output = Result<Dimensioned<T>>;
    fn add(self, rhs: Dimensioned<T>) -> Self::Output {
        self.try_add(&rhs)
    }
}

impl<T: FieldValue> std::ops::Sub for Dimensioned<T> {
    type Output = Result<Dimensioned<T>>;
    fn sub(self, rhs: Dimensioned<T>) -> Self::Output {
        self.try_sub(&rhs)
    }
}

impl<T: FieldValue> Mul<Dimensioned<f64>> for Dimensioned<T> {
    type Output = Dimensioned<T>;
    fn mul(self, rhs: Dimensioned<f64>) -> Dimensioned<T> {
        Dimensioned::new(
            format!("{}*{}", self.name, rhs.name),
            self.dimensions * rhs.dimensions,
            self.value * rhs.value,
        )
    }
}

impl<T: FieldValue> Div<Dimensioned<f64>> for Dimensioned<T> {
    type Output = Dimensioned<T>;
    fn div(self, rhs: Dimensioned<f64>) -> Dimensioned<T> {
        Dimensioned::new(
            format!("{}|{}", self.name, rhs.name),
            self.dimensions / rhs.dimensions,
            self.value / rhs.value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector;

    #[test]
    fn test_combination_rules() {
        assert_eq!(DIM_LENGTH / DIM_TIME, DIM_VELOCITY);
        assert_eq!(DIM_LENGTH * DIM_LENGTH, DIM_AREA);
        assert_eq!(DIM_MASS / DIM_VOLUME, DIM_DENSITY);
        assert_eq!(DIM_AREA.sqrt(), DIM_LENGTH);
        assert!((DIM_VELOCITY * DIM_VELOCITY.inv()).is_dimensionless());
    }

    #[test]
    fn test_mismatched_add_fails() {
        let p = Dimensioned::new("p", DIM_PRESSURE, 1.0);
        let u = Dimensioned::new("U", DIM_VELOCITY, 1.0);
        let err = (p + u).unwrap_err();
        match err {
            FvError::DimensionMismatch { lhs, rhs, .. } => {
                assert_eq!(lhs, DIM_PRESSURE);
                assert_eq!(rhs, DIM_VELOCITY);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_matching_add_and_sub() {
        let a = Dimensioned::new("a", DIM_VELOCITY, Vector::new(1.0, 0.0, 0.0));
        let b = Dimensioned::new("b", DIM_VELOCITY, Vector::new(0.0, 2.0, 0.0));
        let c = (a.clone() + b.clone()).unwrap();
        assert_eq!(c.value, Vector::new(1.0, 2.0, 0.0));
        let d = (a - b).unwrap();
        assert_eq!(d.value, Vector::new(1.0, -2.0, 0.0));
        assert_eq!(d.dimensions, DIM_VELOCITY);
    }

    #[test]
    fn test_comparison_requires_same_dimensions() {
        let a = Dimensioned::new("a", DIM_LENGTH, 1.0);
        let b = Dimensioned::new("b", DIM_LENGTH, 2.0);
        let t = Dimensioned::new("t", DIM_TIME, 2.0);
        assert_eq!(
            a.try_partial_cmp(&b).unwrap(),
            Some(std::cmp::Ordering::Less)
        );
        assert!(a.try_partial_cmp(&t).is_err());
    }

    #[test]
    fn test_display_and_parse() {
        let s = DIM_KINEMATIC_VISCOSITY.to_string();
        assert_eq!(s, "[0 2 -1 0 0 0 0]");
        let parsed: DimensionSet = s.parse().unwrap();
        assert_eq!(parsed, DIM_KINEMATIC_VISCOSITY);
        assert!("[1 2 3]".parse::<DimensionSet>().is_err());
    }
}
