//! In-process communicator group backed by channels.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, Sender, channel};

use super::{Communicator, ReduceOp};
use crate::error::{FvError, Result};

/// A halo message: interface tag and values.
type HaloMessage = (usize, Vec<f64>);

/// Halo messages from one source rank. Messages for other tags that arrive
/// while waiting are parked until asked for.
struct Mailbox {
    rx: Receiver<HaloMessage>,
    parked: HashMap<usize, VecDeque<Vec<f64>>>,
}

impl Mailbox {
    fn new(rx: Receiver<HaloMessage>) -> Self {
        Self {
            rx,
            parked: HashMap::new(),
        }
    }

    /// Next message for `tag`, or `None` once the sender has hung up.
    fn take(&mut self, tag: usize) -> Option<Vec<f64>> {
        if let Some(values) = self.parked.get_mut(&tag).and_then(VecDeque::pop_front) {
            return Some(values);
        }
        loop {
            let (t, values) = self.rx.recv().ok()?;
            if t == tag {
                return Some(values);
            }
            self.parked.entry(t).or_default().push_back(values);
        }
    }
}

/// One rank of an in-process communicator group.
///
/// Created with [`LocalComm::group`]; each member is moved to its own thread.
pub struct LocalComm {
    rank: usize,
    n_procs: usize,
    /// Halo senders, indexed by destination rank.
    halo_tx: Vec<Sender<HaloMessage>>,
    /// Halo mailboxes, indexed by source rank.
    halo_rx: Vec<Mutex<Mailbox>>,
    reduce_tx: Vec<Sender<f64>>,
    reduce_rx: Vec<Mutex<Receiver<f64>>>,
}

impl fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("n_procs", &self.n_procs)
            .finish()
    }
}

impl LocalComm {
    /// Create `n_procs` connected ranks.
    pub fn group(n_procs: usize) -> Vec<LocalComm> {
        // halo[src][dst] channel pairs
        let mut halo_tx: Vec<Vec<Option<Sender<HaloMessage>>>> = (0..n_procs)
            .map(|_| (0..n_procs).map(|_| None).collect())
            .collect();
        let mut halo_rx: Vec<Vec<Option<Receiver<HaloMessage>>>> = (0..n_procs)
            .map(|_| (0..n_procs).map(|_| None).collect())
            .collect();
        let mut reduce_tx: Vec<Vec<Option<Sender<f64>>>> = (0..n_procs)
            .map(|_| (0..n_procs).map(|_| None).collect())
            .collect();
        let mut reduce_rx: Vec<Vec<Option<Receiver<f64>>>> = (0..n_procs)
            .map(|_| (0..n_procs).map(|_| None).collect())
            .collect();

        for src in 0..n_procs {
            for dst in 0..n_procs {
                let (tx, rx) = channel();
                halo_tx[src][dst] = Some(tx);
                halo_rx[dst][src] = Some(rx);
                let (tx, rx) = channel();
                reduce_tx[src][dst] = Some(tx);
                reduce_rx[dst][src] = Some(rx);
            }
        }

        (0..n_procs)
            .map(|rank| LocalComm {
                rank,
                n_procs,
                halo_tx: halo_tx[rank].iter_mut().filter_map(Option::take).collect(),
                halo_rx: halo_rx[rank]
                    .iter_mut()
                    .filter_map(Option::take)
                    .map(|rx| Mutex::new(Mailbox::new(rx)))
                    .collect(),
                reduce_tx: reduce_tx[rank].iter_mut().filter_map(Option::take).collect(),
                reduce_rx: reduce_rx[rank]
                    .iter_mut()
                    .filter_map(Option::take)
                    .map(Mutex::new)
                    .collect(),
            })
            .collect()
    }

    fn check_rank(&self, other: usize) -> Result<()> {
        if other >= self.n_procs {
            return Err(FvError::Communication(format!(
                "rank {other} out of range for {} ranks",
                self.n_procs
            )));
        }
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_procs(&self) -> usize {
        self.n_procs
    }

    fn exchange(&self, values: &[f64], neighbour: usize, tag: usize) -> Result<Vec<f64>> {
        self.check_rank(neighbour)?;
        self.halo_tx[neighbour]
            .send((tag, values.to_vec()))
            .map_err(|_| FvError::Communication(format!("rank {neighbour} hung up")))?;
        let mut mailbox = self.halo_rx[neighbour]
            .lock()
            .map_err(|_| FvError::Communication("halo receiver poisoned".into()))?;
        mailbox.take(tag).ok_or_else(|| {
            FvError::Communication(format!("no halo data from rank {neighbour} for tag {tag}"))
        })
    }

    fn global_reduce(&self, value: f64, op: ReduceOp) -> Result<f64> {
        for (dst, tx) in self.reduce_tx.iter().enumerate() {
            if dst != self.rank {
                tx.send(value)
                    .map_err(|_| FvError::Communication(format!("rank {dst} hung up")))?;
            }
        }
        let mut result: Option<f64> = None;
        for src in 0..self.n_procs {
            let contribution = if src == self.rank {
                value
            } else {
                let rx = self.reduce_rx[src]
                    .lock()
                    .map_err(|_| FvError::Communication("reduce receiver poisoned".into()))?;
                rx.recv().map_err(|_| {
                    FvError::Communication(format!("no reduction data from rank {src}"))
                })?
            };
            result = Some(match result {
                Some(acc) => op.combine(acc, contribution),
                None => contribution,
            });
        }
        Ok(result.unwrap_or(value))
    }
}
