//! Communicator over MPI processes.

use ::mpi::Tag;
use ::mpi::collective::SystemOperation;
use ::mpi::topology::{Rank, SimpleCommunicator};
use ::mpi::traits::{Communicator as _, CommunicatorCollectives, Destination, Source};

use super::{Communicator, ReduceOp};
use crate::error::{FvError, Result};

/// One rank of the MPI world communicator.
///
/// The caller initialises MPI with `mpi::initialize()` and keeps the returned
/// universe alive while any `MpiComm` is in use. Halo messages carry the
/// interface tag as their MPI tag.
#[derive(Clone, Copy, Debug)]
pub struct MpiComm {
    rank: usize,
    n_procs: usize,
}

impl MpiComm {
    /// Wrap the world communicator of an initialised universe.
    pub fn new(world: &SimpleCommunicator) -> Self {
        Self {
            rank: world.rank() as usize,
            n_procs: world.size() as usize,
        }
    }

    fn to_mpi(value: usize, what: &str) -> Result<i32> {
        i32::try_from(value)
            .map_err(|_| FvError::Communication(format!("{what} {value} exceeds the MPI range")))
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_procs(&self) -> usize {
        self.n_procs
    }

    fn exchange(&self, values: &[f64], neighbour: usize, tag: usize) -> Result<Vec<f64>> {
        if neighbour >= self.n_procs {
            return Err(FvError::Communication(format!(
                "rank {neighbour} out of range for {} ranks",
                self.n_procs
            )));
        }
        let rank: Rank = Self::to_mpi(neighbour, "rank")?;
        let tag: Tag = Self::to_mpi(tag, "tag")?;
        let world = SimpleCommunicator::world();
        let process = world.process_at_rank(rank);
        let received = ::mpi::request::scope(|scope| {
            let send = process.immediate_send_with_tag(scope, values, tag);
            let (received, _status) = process.receive_vec_with_tag::<f64>(tag);
            send.wait();
            received
        });
        Ok(received)
    }

    fn global_reduce(&self, value: f64, op: ReduceOp) -> Result<f64> {
        let operation = match op {
            ReduceOp::Sum => SystemOperation::sum(),
            ReduceOp::Min => SystemOperation::min(),
            ReduceOp::Max => SystemOperation::max(),
        };
        let mut result = 0.0_f64;
        SimpleCommunicator::world().all_reduce_into(&value, &mut result, operation);
        Ok(result)
    }
}
