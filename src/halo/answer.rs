//! Servicing side of the halo protocol.
//!
//! One standing `QUESTION` receive per present direction. Serving a
//! question re-arms the receive immediately, drains the previous reply
//! send if it is still in flight, computes the partial sum and posts the
//! reply. Per direction there is therefore at most one outstanding
//! question receive and at most one outstanding answer send at any time.

use crate::comm::{Communicator, Probe, Wait};
use crate::error::DenoiseError;
use crate::field::SubImage;
use crate::grid::direction::{Direction, DIRECTIONS};
use crate::grid::neighbours::NeighbourTable;
use crate::halo::wire;

struct AnswerSlot<C: Communicator> {
    peer: usize,
    /// Standing receive for the next question from `peer`.
    question: C::RecvHandle,
    /// Reply send still draining from the previous question, if any.
    reply: Option<C::SendHandle>,
}

/// Standing service engine over every live neighbour direction.
pub struct AnswerEngine<C: Communicator> {
    slots: [Option<AnswerSlot<C>>; DIRECTIONS],
    served: [u64; DIRECTIONS],
}

impl<C: Communicator> AnswerEngine<C> {
    /// Post the standing question receives for every present direction.
    pub fn new(comm: &C, table: &NeighbourTable) -> Self {
        let slots = std::array::from_fn(|i| {
            let d = Direction::ALL[i];
            table.get(d).map(|peer| AnswerSlot {
                peer,
                question: comm.irecv(peer, wire::QUESTION, wire::SCALAR_LEN),
                reply: None,
            })
        });
        AnswerEngine {
            slots,
            served: [0; DIRECTIONS],
        }
    }

    /// Poll every standing receive once and serve whatever has arrived.
    ///
    /// Returns the number of questions served this pump.
    pub fn service_cycle(&mut self, comm: &C, image: &SubImage) -> Result<usize, DenoiseError> {
        let mut served = 0usize;
        for d in Direction::ALL {
            let Some(slot) = self.slots[d.index()].as_mut() else {
                continue;
            };
            if !slot.question.probe() {
                continue;
            }
            let bytes = slot.question.take().ok_or_else(|| DenoiseError::Comm {
                peer: slot.peer,
                reason: "question receive completed without payload".into(),
            })?;
            let position = wire::decode_i32(slot.peer, &bytes)?;
            // Re-arm before serving so the next question can already land.
            slot.question = comm.irecv(slot.peer, wire::QUESTION, wire::SCALAR_LEN);
            if let Some(prev) = slot.reply.take() {
                prev.wait();
            }
            let (row_center, col_center) = question_center(d, position, image);
            let sum = image.window_sum(row_center, col_center);
            slot.reply = Some(comm.isend(slot.peer, wire::ANSWER, &wire::encode_i32(sum)));
            self.served[d.index()] += 1;
            served += 1;
        }
        Ok(served)
    }

    /// Questions served so far, per direction.
    pub fn served(&self) -> &[u64; DIRECTIONS] {
        &self.served
    }
}

/// Centre of the requested 3x3 window in this worker's coordinate frame.
///
/// The requester's pixel lies just outside this worker's array: one row
/// above (`-1`) when the question came in from the north, one row below
/// (`rows`) from the south, and so on. Axial questions carry the missing
/// coordinate as `position`; corner questions determine both coordinates
/// from the direction alone.
fn question_center(d: Direction, position: i32, image: &SubImage) -> (isize, isize) {
    use Direction::*;
    let row_center = match d {
        North | NorthWest | NorthEast => -1,
        South | SouthWest | SouthEast => image.rows() as isize,
        East | West => position as isize,
    };
    let col_center = match d {
        West | NorthWest | SouthWest => -1,
        East | NorthEast | SouthEast => image.cols() as isize,
        North | South => position as isize,
    };
    (row_center, col_center)
}
