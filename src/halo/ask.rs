//! Querying side of the halo protocol.
//!
//! When a sampled pixel touches a sub-image edge, the sampler posts one
//! question per external direction into an [`AskSet`]. Draining the set
//! polls every outstanding send and reply and pumps the
//! [`AnswerEngine`](crate::halo::AnswerEngine) between polls; two workers
//! that question each other in the same step therefore unblock each other.

use crate::comm::{Communicator, Probe};
use crate::error::DenoiseError;
use crate::field::SubImage;
use crate::grid::direction::{Direction, DIRECTIONS};
use crate::grid::neighbours::NeighbourTable;
use crate::halo::answer::AnswerEngine;
use crate::halo::wire;

struct OutstandingAsk<C: Communicator> {
    direction: Direction,
    peer: usize,
    send: C::SendHandle,
    reply: C::RecvHandle,
    value: Option<i32>,
}

/// The outstanding boundary questions of one sampler step.
///
/// Never more than one ask per direction is pending, so capacity is the
/// direction count.
pub struct AskSet<C: Communicator> {
    pending: Vec<OutstandingAsk<C>>,
    asked: [u64; DIRECTIONS],
}

impl<C: Communicator> AskSet<C> {
    pub fn new() -> Self {
        AskSet {
            pending: Vec::with_capacity(DIRECTIONS),
            asked: [0; DIRECTIONS],
        }
    }

    /// Questions posted so far, per direction.
    pub fn asked(&self) -> &[u64; DIRECTIONS] {
        &self.asked
    }

    /// Number of asks currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Pose `position` to the neighbour in direction `d`, if present.
    ///
    /// The reply receive is posted together with the question send, so the
    /// pairing needs no sequence numbers: per (peer, tag) there is at most
    /// one message in flight and delivery is ordered.
    pub fn post(&mut self, comm: &C, table: &NeighbourTable, d: Direction, position: i32) {
        let Some(peer) = table.get(d) else {
            return;
        };
        let send = comm.isend(peer, wire::QUESTION, &wire::encode_i32(position));
        let reply = comm.irecv(peer, wire::ANSWER, wire::SCALAR_LEN);
        self.pending.push(OutstandingAsk {
            direction: d,
            peer,
            send,
            reply,
            value: None,
        });
        self.asked[d.index()] += 1;
    }

    /// Drain every outstanding ask and return the sum of the replies.
    ///
    /// Suspension point: loops over non-blocking probes and pumps the
    /// answer engine on every pass until each question send has completed
    /// and each reply has arrived. Resets the set to empty.
    pub fn drain(
        &mut self,
        comm: &C,
        answers: &mut AnswerEngine<C>,
        image: &SubImage,
    ) -> Result<i32, DenoiseError> {
        loop {
            let mut all_done = true;
            for ask in &mut self.pending {
                if !ask.send.probe() {
                    all_done = false;
                }
                if ask.value.is_none() {
                    if ask.reply.probe() {
                        let bytes = ask.reply.take().ok_or_else(|| DenoiseError::Comm {
                            peer: ask.peer,
                            reason: format!(
                                "answer receive from direction {:?} completed without payload",
                                ask.direction
                            ),
                        })?;
                        ask.value = Some(wire::decode_i32(ask.peer, &bytes)?);
                    } else {
                        all_done = false;
                    }
                }
            }
            if all_done {
                break;
            }
            answers.service_cycle(comm, image)?;
        }
        let mut total = 0i32;
        for ask in self.pending.drain(..) {
            // probe() returned true for every reply above.
            total += ask.value.unwrap_or(0);
        }
        Ok(total)
    }
}

impl<C: Communicator> Default for AskSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{ThreadComm, Wait};

    #[test]
    fn absent_direction_posts_nothing() {
        let comms = ThreadComm::fabric(2);
        let mut asks: AskSet<ThreadComm> = AskSet::new();
        asks.post(&comms[0], &NeighbourTable::empty(), Direction::North, 0);
        assert_eq!(asks.outstanding(), 0);
        assert_eq!(asks.asked()[Direction::North.index()], 0);
    }

    #[test]
    fn drain_sums_replies_and_resets() {
        let comms = ThreadComm::fabric(3);
        let image = SubImage::new(1, 1, vec![1]).unwrap();
        let mut table = NeighbourTable::empty();
        table.set(Direction::North, Some(1));
        table.set(Direction::South, Some(2));

        let mut asks = AskSet::new();
        let mut answers = AnswerEngine::new(&comms[0], &NeighbourTable::empty());
        asks.post(&comms[0], &table, Direction::North, 0);
        asks.post(&comms[0], &table, Direction::South, 0);
        assert_eq!(asks.outstanding(), 2);

        // Both neighbours reply by hand.
        for (peer, sum) in [(1usize, 5i32), (2, -2)] {
            let q = comms[peer].irecv(0, wire::QUESTION, wire::SCALAR_LEN);
            assert_eq!(wire::decode_i32(0, &q.wait().unwrap()).unwrap(), 0);
            let _ = comms[peer].isend(0, wire::ANSWER, &wire::encode_i32(sum));
        }

        let total = asks.drain(&comms[0], &mut answers, &image).unwrap();
        assert_eq!(total, 3);
        assert_eq!(asks.outstanding(), 0);
        assert_eq!(asks.asked()[Direction::North.index()], 1);
        assert_eq!(asks.asked()[Direction::South.index()], 1);

        // The set is reusable after a drain.
        asks.post(&comms[0], &table, Direction::North, 4);
        let q = comms[1].irecv(0, wire::QUESTION, wire::SCALAR_LEN);
        assert_eq!(wire::decode_i32(0, &q.wait().unwrap()).unwrap(), 4);
        let _ = comms[1].isend(0, wire::ANSWER, &wire::encode_i32(9));
        let total = asks.drain(&comms[0], &mut answers, &image).unwrap();
        assert_eq!(total, 9);
        assert_eq!(asks.asked()[Direction::North.index()], 2);
    }

    #[test]
    fn drain_services_incoming_questions_while_waiting() {
        // The peer only replies after its own question has been answered.
        // A drain that failed to pump the answer engine between polls
        // would leave both sides stuck.
        let comms = ThreadComm::fabric(2);
        let c1 = comms[1].clone();
        let peer = std::thread::spawn(move || {
            let _ = c1.isend(0, wire::QUESTION, &wire::encode_i32(0));
            let reply = c1.irecv(0, wire::ANSWER, wire::SCALAR_LEN);
            let got = wire::decode_i32(0, &reply.wait().unwrap()).unwrap();
            let _ = c1.isend(0, wire::ANSWER, &wire::encode_i32(11));
            got
        });

        let image = SubImage::new(1, 2, vec![1, -1]).unwrap();
        let mut table = NeighbourTable::empty();
        table.set(Direction::East, Some(1));
        let mut asks = AskSet::new();
        let mut answers = AnswerEngine::new(&comms[0], &table);

        asks.post(&comms[0], &table, Direction::East, 0);
        let total = asks.drain(&comms[0], &mut answers, &image).unwrap();
        assert_eq!(total, 11);

        // Row 0, column 2 (east frame): rank 0's window shows (0,1) = -1.
        assert_eq!(peer.join().unwrap(), -1);
        assert_eq!(answers.served()[Direction::East.index()], 1);
    }
}
