//! Termination handshake.
//!
//! A worker that has exhausted its iteration budget announces `FINISHED`
//! to every present neighbour and posts the matching receive. It keeps
//! servicing questions until every announcement has drained *and* every
//! neighbour's announcement has arrived; only then is it safe to stop,
//! because a neighbour that is still iterating may still need answers.

use crate::comm::{Communicator, Probe};
use crate::error::DenoiseError;
use crate::field::SubImage;
use crate::grid::neighbours::NeighbourTable;
use crate::halo::answer::AnswerEngine;
use crate::halo::wire;

/// The per-neighbour `FINISHED` send/receive pairs, used once per worker.
pub struct FinishExchange<C: Communicator> {
    pending: Vec<(C::SendHandle, C::RecvHandle)>,
}

impl<C: Communicator> FinishExchange<C> {
    /// Announce termination to every present neighbour.
    pub fn announce(comm: &C, table: &NeighbourTable) -> Self {
        let pending = table
            .present()
            .map(|(_d, peer)| {
                let send = comm.isend(peer, wire::FINISHED, &[]);
                let recv = comm.irecv(peer, wire::FINISHED, 0);
                (send, recv)
            })
            .collect();
        FinishExchange { pending }
    }

    /// Pump the answer engine until the handshake closes on every edge.
    pub fn wait_closure(
        mut self,
        comm: &C,
        answers: &mut AnswerEngine<C>,
        image: &SubImage,
    ) -> Result<(), DenoiseError> {
        loop {
            let mut all_done = true;
            for (send, recv) in &mut self.pending {
                if !send.probe() {
                    all_done = false;
                }
                if !recv.probe() {
                    all_done = false;
                }
            }
            if all_done {
                return Ok(());
            }
            answers.service_cycle(comm, image)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::direction::Direction;

    #[test]
    fn lone_worker_closes_immediately() {
        let comm = crate::comm::NoComm;
        let image = SubImage::new(1, 1, vec![1]).unwrap();
        let table = NeighbourTable::empty();
        let mut answers = AnswerEngine::new(&comm, &table);
        let fin = FinishExchange::announce(&comm, &table);
        fin.wait_closure(&comm, &mut answers, &image).unwrap();
    }

    #[test]
    fn closes_once_both_sides_announce() {
        use crate::comm::ThreadComm;
        let comms = ThreadComm::fabric(2);
        let image = SubImage::new(1, 1, vec![1]).unwrap();

        let mut t0 = NeighbourTable::empty();
        t0.set(Direction::East, Some(1));
        let mut t1 = NeighbourTable::empty();
        t1.set(Direction::West, Some(0));

        let c1 = comms[1].clone();
        let img1 = image.clone();
        let peer = std::thread::spawn(move || {
            let mut answers = AnswerEngine::new(&c1, &t1);
            let fin = FinishExchange::announce(&c1, &t1);
            fin.wait_closure(&c1, &mut answers, &img1).unwrap();
        });

        let mut answers = AnswerEngine::new(&comms[0], &t0);
        let fin = FinishExchange::announce(&comms[0], &t0);
        fin.wait_closure(&comms[0], &mut answers, &image).unwrap();
        peer.join().unwrap();
    }
}
