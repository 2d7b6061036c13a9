//! Global reductions across mesh partitions.
//!
//! Each partition owns one [`Communicator`]. Every reduction is a
//! blocking barrier: no rank returns from `all_reduce_*` until every rank
//! has contributed. Stages that need a global quantity (Courant numbers,
//! the velocity-cap maximum, continuity errors) call these explicitly so
//! the synchronisation point is visible in the calling code.

use crossbeam_channel::{Receiver, Sender};

use crate::error::CommError;

/// Blocking collective operations over a fixed group of partitions.
pub trait Communicator: Send {
    /// Rank of this partition, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of partitions in the group.
    fn size(&self) -> usize;

    /// Global maximum of one value per rank.
    fn all_reduce_max(&self, local: f64) -> Result<f64, CommError>;

    /// Global minimum of one value per rank.
    fn all_reduce_min(&self, local: f64) -> Result<f64, CommError>;

    /// Global sum of one value per rank.
    fn all_reduce_sum(&self, local: f64) -> Result<f64, CommError>;

    /// Wait until every rank reaches this point.
    fn barrier(&self) -> Result<(), CommError> {
        self.all_reduce_sum(0.0).map(|_| ())
    }

    /// True on the rank that owns logging and checkpoint output.
    fn is_master(&self) -> bool {
        self.rank() == 0
    }
}

// ── SerialComm ──────────────────────────────────────────────────

/// Single-partition communicator: every reduction is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_max(&self, local: f64) -> Result<f64, CommError> {
        Ok(local)
    }

    fn all_reduce_min(&self, local: f64) -> Result<f64, CommError> {
        Ok(local)
    }

    fn all_reduce_sum(&self, local: f64) -> Result<f64, CommError> {
        Ok(local)
    }
}

// ── ThreadComm ──────────────────────────────────────────────────

/// Communicator for partitions running on separate threads.
///
/// Ranks are connected all-to-all with one unbounded channel per ordered
/// pair. Every reduction sends exactly one value to each peer and receives
/// exactly one from each peer, so per-pair FIFO ordering keeps successive
/// reductions from interleaving. All ranks must issue the same sequence of
/// collective calls.
pub struct ThreadComm {
    rank: usize,
    /// `senders[p]` delivers to rank `p`; `None` at our own rank.
    senders: Vec<Option<Sender<f64>>>,
    /// `receivers[p]` carries values from rank `p`; `None` at our own rank.
    receivers: Vec<Option<Receiver<f64>>>,
}

impl ThreadComm {
    /// Create `n` connected communicators, one per rank, in rank order.
    pub fn group(n: usize) -> Vec<ThreadComm> {
        let mut senders: Vec<Vec<Option<Sender<f64>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();
        let mut receivers: Vec<Vec<Option<Receiver<f64>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();

        for from in 0..n {
            for to in 0..n {
                if from == to {
                    continue;
                }
                let (tx, rx) = crossbeam_channel::unbounded();
                senders[from][to] = Some(tx);
                receivers[to][from] = Some(rx);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                senders,
                receivers,
            })
            .collect()
    }

    fn exchange(&self, local: f64, op: fn(f64, f64) -> f64) -> Result<f64, CommError> {
        for (peer, tx) in self.senders.iter().enumerate() {
            if let Some(tx) = tx {
                tx.send(local).map_err(|_| CommError::Disconnected {
                    rank: self.rank,
                    peer,
                })?;
            }
        }
        // Fold in rank order so every rank computes a bit-identical result.
        let mut acc: Option<f64> = None;
        for peer in 0..self.receivers.len() {
            let v = match &self.receivers[peer] {
                Some(rx) => rx.recv().map_err(|_| CommError::Disconnected {
                    rank: self.rank,
                    peer,
                })?,
                None => local,
            };
            acc = Some(match acc {
                Some(a) => op(a, v),
                None => v,
            });
        }
        Ok(acc.unwrap_or(local))
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn all_reduce_max(&self, local: f64) -> Result<f64, CommError> {
        self.exchange(local, f64::max)
    }

    fn all_reduce_min(&self, local: f64) -> Result<f64, CommError> {
        self.exchange(local, f64::min)
    }

    fn all_reduce_sum(&self, local: f64) -> Result<f64, CommError> {
        self.exchange(local, |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn serial_reductions_are_identity() {
        let c = SerialComm;
        assert_eq!(c.all_reduce_max(3.0).unwrap(), 3.0);
        assert_eq!(c.all_reduce_sum(-1.5).unwrap(), -1.5);
        assert!(c.is_master());
    }

    #[test]
    fn thread_group_reduces_across_ranks() {
        let comms = ThreadComm::group(4);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                thread::spawn(move || {
                    let r = c.rank() as f64;
                    let max = c.all_reduce_max(r).unwrap();
                    let min = c.all_reduce_min(r).unwrap();
                    let sum = c.all_reduce_sum(r).unwrap();
                    c.barrier().unwrap();
                    (max, min, sum)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), (3.0, 0.0, 6.0));
        }
    }

    #[test]
    fn successive_reductions_do_not_interleave() {
        let comms = ThreadComm::group(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                thread::spawn(move || {
                    (0..50)
                        .map(|i| c.all_reduce_sum(i as f64 + c.rank() as f64).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let expected: Vec<f64> = (0..50).map(|i| 3.0 * i as f64 + 3.0).collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }

    #[test]
    fn dropped_peer_reports_disconnect() {
        let mut comms = ThreadComm::group(2);
        let survivor = comms.remove(0);
        drop(comms);
        match survivor.all_reduce_max(1.0) {
            Err(CommError::Disconnected { rank: 0, peer: 1 }) => {}
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }
}
