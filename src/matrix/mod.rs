//! Sparse matrices on face (LDU) addressing.
//!
//! - [`LduMatrix`]: diagonal, upper and optional lower coefficients, one
//!   off-diagonal pair per internal face
//! - [`LduInterface`]: coupling through cyclic and processor patches
//! - [`LduSystem`]: a matrix, its interfaces and a communicator, as seen by
//!   linear solvers
//! - [`FvMatrix`]: an equation for one field, with source and per-patch
//!   boundary coefficients, solved component by component

mod fv_matrix;
mod interfaces;
mod ldu;

pub use fv_matrix::FvMatrix;
pub use interfaces::{
    CyclicInterface, InterfaceCoupling, LduInterface, LduSystem, ProcessorInterface,
};
pub use ldu::{DominanceReport, LduAddressing, LduMatrix};

/// Scalar equation.
pub type FvScalarMatrix = FvMatrix<f64>;

/// Vector equation.
pub type FvVectorMatrix = FvMatrix<crate::types::Vector>;
