//! Parallel communication interface.
//!
//! The discretization core needs exactly two operations from the parallel
//! layer:
//!
//! - [`Communicator::exchange`]: swap a boundary-face-ordered array with the
//!   facing patch on a neighbouring domain (halo exchange). The facing patch
//!   is identified by the neighbour rank and an interface tag shared by both
//!   sides, so one domain may face the same neighbour across several patches.
//! - [`Communicator::global_reduce`]: combine a value across all domains
//!
//! [`SerialComm`] is the single-process implementation. [`LocalComm`] runs a
//! group of ranks inside one process, connected by channels; each rank
//! typically lives on its own thread and owns its own sub-mesh. With the
//! `mpi` feature, `MpiComm` runs each rank as its own MPI process.
//!
//! Reductions combine contributions in rank order, so every rank sees the
//! same floating-point result.

mod local;
#[cfg(feature = "mpi")]
mod mpi_comm;

pub use local::LocalComm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{FvError, Result};
use crate::types::FieldValue;

/// Reduction operator for [`Communicator::global_reduce`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    /// Combine two partial results.
    #[inline]
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Halo exchange and global reductions between decomposed domains.
pub trait Communicator: Send + Sync + Debug {
    /// This domain's rank.
    fn rank(&self) -> usize;

    /// Number of domains.
    fn n_procs(&self) -> usize;

    /// Send `values` to the patch tagged `tag` on `neighbour` and receive the
    /// array that patch sends back.
    ///
    /// The send does not block; the call returns once the neighbour's data
    /// for `tag` arrives. Callers walking several patches use
    /// [`FvMesh::patch_exchange_order`](crate::mesh::FvMesh::patch_exchange_order)
    /// so that every rank meets its interfaces in the same order.
    fn exchange(&self, values: &[f64], neighbour: usize, tag: usize) -> Result<Vec<f64>>;

    /// Combine `value` across all domains.
    fn global_reduce(&self, value: f64, op: ReduceOp) -> Result<f64>;

    /// Whether more than one domain takes part.
    fn is_parallel(&self) -> bool {
        self.n_procs() > 1
    }
}

/// Single-process communicator.
///
/// Exchanges with rank 0 loop back to the caller whatever the tag, which
/// lets a processor patch face itself in serial tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn n_procs(&self) -> usize {
        1
    }

    fn exchange(&self, values: &[f64], neighbour: usize, _tag: usize) -> Result<Vec<f64>> {
        if neighbour != 0 {
            return Err(FvError::Communication(format!(
                "serial run cannot exchange with rank {neighbour}"
            )));
        }
        Ok(values.to_vec())
    }

    fn global_reduce(&self, value: f64, _op: ReduceOp) -> Result<f64> {
        Ok(value)
    }
}

/// Exchange a typed array by flattening it into components.
pub fn exchange_values<T: FieldValue>(
    comm: &dyn Communicator,
    values: &[T],
    neighbour: usize,
    tag: usize,
) -> Result<Vec<T>> {
    let n_cmpt = T::N_COMPONENTS;
    let mut flat = Vec::with_capacity(values.len() * n_cmpt);
    for v in values {
        for c in 0..n_cmpt {
            flat.push(v.component(c));
        }
    }
    let received = comm.exchange(&flat, neighbour, tag)?;
    if received.len() != flat.len() {
        return Err(FvError::size_mismatch(
            format!("halo exchange with rank {neighbour} (tag {tag})"),
            flat.len(),
            received.len(),
        ));
    }
    Ok(received
        .chunks_exact(n_cmpt)
        .map(|chunk| T::from_fn(|c| chunk[c]))
        .collect())
}

/// Global sum.
pub fn global_sum(comm: &dyn Communicator, value: f64) -> Result<f64> {
    comm.global_reduce(value, ReduceOp::Sum)
}

/// Global maximum.
pub fn global_max(comm: &dyn Communicator, value: f64) -> Result<f64> {
    comm.global_reduce(value, ReduceOp::Max)
}

/// Global minimum.
pub fn global_min(comm: &dyn Communicator, value: f64) -> Result<f64> {
    comm.global_reduce(value, ReduceOp::Min)
}
