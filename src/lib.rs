//! # fv-rs
//!
//! A finite-volume discretization core for collocated, unstructured
//! polyhedral meshes.
//!
//! This crate provides the building blocks of a segregated finite-volume
//! solver:
//! - Tensor-rank values and physical dimension checking
//! - Face-addressed (LDU) meshes with demand-driven geometry
//! - Geometric fields with runtime-selected boundary conditions
//! - Interpolation, gradient, snGrad and ddt schemes selected by name
//! - Implicit (`fvm`) and explicit (`fvc`) operators
//! - `FvMatrix` equations and PCG, PBiCGStab, smoothSolver and GAMG solvers
//! - Coupled processor patches over a communicator
//! - Time and SIMPLE/PIMPLE solution control
//! - ASCII field I/O
//!
//! ```
//! use fv_rs::boundary::{FixedValue, ZeroGradient};
//! use fv_rs::field::GeometricField;
//! use fv_rs::linear_solver::SolverControls;
//! use fv_rs::mesh::line_mesh;
//! use fv_rs::types::{DIMLESS, DIM_KINEMATIC_VISCOSITY, Dimensioned};
//! use fv_rs::fvm;
//!
//! let mesh = line_mesh(10, 1.0).unwrap();
//! let mut t: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
//!     .internal_uniform(0.0)
//!     .default_condition(ZeroGradient)
//!     .patch("left", FixedValue::uniform(0.0))
//!     .patch("right", FixedValue::uniform(1.0))
//!     .build(&mesh)
//!     .unwrap();
//! let nu = Dimensioned::new("nu", DIM_KINEMATIC_VISCOSITY, 1.0);
//! let eqn = -fvm::laplacian_uniform(&nu, &t, &mesh, "Gauss linear corrected").unwrap();
//! eqn.solve(&mut t, &mesh, &SolverControls::pcg(1e-10, 0.0)).unwrap();
//! assert!((t.internal()[0] - 0.05).abs() < 1e-8);
//! ```

pub mod boundary;
pub mod control;
pub mod ddt;
pub mod error;
pub mod field;
pub mod fvc;
pub mod fvm;
pub mod gradient;
pub mod interpolation;
pub mod io;
pub mod linear_solver;
pub mod matrix;
pub mod mesh;
pub mod parallel;
pub mod sn_grad;
pub mod types;

// Re-export main types for convenience
pub use error::{FvError, Result};
pub use types::{
    DimensionSet, Dimensioned, Differentiable, FieldValue, SymmTensor, Tensor, Vector,
};

// Fields and mesh
pub use field::{
    Field, GeometricField, ObjectRegistry, SurfaceField, SurfaceScalarField, VolScalarField,
    VolVectorField,
};
pub use mesh::{FvMesh, HexBlock, MeshGeometry, Patch, PatchKind, line_mesh};

// Boundary conditions
pub use boundary::{BoundaryCondition, BoundaryConditionRegistry};

// Schemes
pub use ddt::{DdtScheme, create_ddt_scheme};
pub use gradient::{GradientScheme, create_gradient_scheme};
pub use interpolation::{SchemeSpec, SurfaceInterpolationScheme, create_interpolation_scheme};
pub use sn_grad::{SnGradScheme, create_sn_grad_scheme};

// Matrices and solvers
pub use linear_solver::{LinearSolver, SolverControls, SolverPerformance, create_linear_solver};
pub use matrix::{FvMatrix, FvScalarMatrix, FvVectorMatrix, LduMatrix};

// Parallel and control
pub use control::{PimpleControl, SimpleControl, SolutionControls, Time, TimeControls};
pub use parallel::{Communicator, LocalComm, SerialComm};
