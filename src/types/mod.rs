//! Primitive value types for the discretization core.
//!
//! - Tensor-rank values ([`Vector`], [`Tensor`], [`SymmTensor`]) and the
//!   [`FieldValue`] / [`Differentiable`] traits that fields are generic over
//! - Physical dimensions ([`DimensionSet`], [`Dimensioned`])
//! - Mesh label newtypes ([`CellIndex`], [`FaceIndex`], [`PatchIndex`], [`PointIndex`])
//!
//! # Example
//!
//! ```
//! use fv_rs::types::{DimensionSet, Vector, DIM_LENGTH, DIM_TIME, DIM_VELOCITY};
//!
//! let d = Vector::new(1.0, 0.0, 0.0);
//! assert_eq!(d.norm(), 1.0);
//! assert_eq!(DIM_LENGTH / DIM_TIME, DIM_VELOCITY);
//! ```

mod dimensions;
mod indices;
mod tensor;

pub use dimensions::{
    DIM_AREA, DIM_CURRENT, DIM_DENSITY, DIM_KINEMATIC_VISCOSITY, DIM_LENGTH,
    DIM_LUMINOUS_INTENSITY, DIM_MASS, DIM_MOLES, DIM_PRESSURE, DIM_TEMPERATURE, DIM_TIME,
    DIM_VELOCITY, DIM_VOLUME, DIMLESS, DimensionSet, Dimensioned, N_DIMENSIONS,
};
pub use indices::{CellIndex, FaceIndex, PatchIndex, PointIndex};
pub use tensor::{Differentiable, FieldValue, SymmTensor, Tensor, Vector};

/// Small number used to stabilise divisions.
pub const SMALL: f64 = 1e-15;

/// Very small number, near the bottom of the `f64` range.
pub const VSMALL: f64 = 1e-300;

/// Square root of [`VSMALL`].
pub const ROOT_VSMALL: f64 = 1e-150;

/// Large number used as an "infinite" bound.
pub const GREAT: f64 = 1e15;

/// Divide-safe denominator: `x` pushed away from zero by `small`, keeping its sign.
#[inline]
pub fn stabilise(x: f64, small: f64) -> f64 {
    if x >= 0.0 { x + small } else { x - small }
}
