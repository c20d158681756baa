//! Field containers.
//!
//! - [`Field`]: contiguous values with element-wise arithmetic and reductions
//! - [`SurfaceField`]: one value per face, split into internal faces and patches
//! - [`GeometricField`]: cell values bound to boundary conditions and old time levels
//! - [`ObjectRegistry`]: shared, name-keyed objects with typed lookup
//!
//! Temporaries use move semantics: `field + &other` reuses the left buffer,
//! `&a + &b` allocates a new one.

#[allow(clippy::module_inception)]
mod field;
mod geometric_field;
mod registry;
mod surface_field;

pub use field::Field;
pub use geometric_field::{BoundaryField, GeometricField, GeometricFieldBuilder, PatchField};
pub use registry::{ObjectRegistry, Shared};
pub use surface_field::SurfaceField;

/// Cell-centred scalar field.
pub type VolScalarField = GeometricField<f64>;

/// Cell-centred vector field.
pub type VolVectorField = GeometricField<crate::types::Vector>;

/// Face scalar field (fluxes, face coefficients).
pub type SurfaceScalarField = SurfaceField<f64>;
