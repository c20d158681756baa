//! Boundary conditions for geometric fields.
//!
//! Each patch of a [`GeometricField`](crate::field::GeometricField) owns one
//! boxed [`BoundaryCondition`]. Conditions compute face values (`evaluate`)
//! and the coefficients implicit operators fold into the matrix.
//!
//! # Available Boundary Conditions
//!
//! | Type name        | Struct          | Notes |
//! |------------------|-----------------|-------|
//! | `calculated`     | [`Calculated`]  | Values set by the producing operation; no coefficients |
//! | `fixedValue`     | [`FixedValue`]  | Dirichlet, `value` entry |
//! | `fixedGradient`  | [`FixedGradient`] | Neumann, `gradient` entry |
//! | `zeroGradient`   | [`ZeroGradient`] | Neumann with zero gradient |
//! | `mixed`          | [`Mixed`]       | `refValue`, `refGradient`, `valueFraction` |
//! | `inletOutlet`    | [`InletOutlet`] | Mixed switched by the sign of the patch flux |
//! | `symmetryPlane`  | [`Symmetry`]    | Forced on symmetry patches |
//! | `empty`          | [`Empty`]       | Forced on empty patches |
//! | `cyclic`         | [`Cyclic`]      | Coupled, forced on cyclic patches |
//! | `processor`      | [`Processor`]   | Coupled through the communicator |
//!
//! # Evaluation protocol
//!
//! `GeometricField::correct_boundary_conditions` runs, per patch,
//! `update_coeffs` (skipped if the patch is already marked updated) followed
//! by `evaluate`, then clears the mark. Call it after every change to the
//! internal values and before anything reads boundary values.
//!
//! # Example
//!
//! ```
//! use fv_rs::boundary::{BoundaryConditionRegistry, BoundaryCondition};
//! use fv_rs::io::Dictionary;
//! use fv_rs::mesh::{Patch, PatchKind};
//!
//! let registry = BoundaryConditionRegistry::<f64>::with_standard_conditions();
//! let inlet = Patch::new("inlet", 10, 4, PatchKind::Patch);
//! let dict = Dictionary::from_pairs(&[("value", "uniform 300")]).unwrap();
//! let bc = registry.create("fixedValue", &inlet, &dict).unwrap();
//! assert!(bc.fixes_value());
//! ```

mod basic;
mod condition;
mod constraint;
mod coupled;
mod inlet_outlet;
mod registry;

pub use basic::{Calculated, FixedGradient, FixedValue, Mixed, ZeroGradient};
pub use condition::{BoundaryCondition, PatchContext, PatchValue};
pub use constraint::{Empty, Symmetry};
pub use coupled::{Cyclic, Processor};
pub use inlet_outlet::InletOutlet;
pub use registry::{
    BoundaryConditionRegistry, BoundaryFactory, constraint_condition, constraint_type,
};
