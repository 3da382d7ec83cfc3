//! Worker lifecycle: receive the assignment, sample under the halo
//! protocol, run the termination handshake, ship the result back.

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::comm::{Communicator, Wait};
use crate::error::DenoiseError;
use crate::field::SubImage;
use crate::grid::direction::Direction;
use crate::grid::layout::COORDINATOR;
use crate::grid::neighbours::NeighbourTable;
use crate::halo::{wire, AnswerEngine, AskSet, FinishExchange};
use crate::sampler::{metropolis_step, HaloStats, Params};

/// A worker wired to its neighbours, ready to sample.
///
/// Constructing the worker posts the standing question receives, so the
/// answer engine is live from the first sampler step.
pub struct Worker<C: Communicator> {
    image: SubImage,
    table: NeighbourTable,
    answers: AnswerEngine<C>,
    asks: AskSet<C>,
    stats: HaloStats,
}

impl<C: Communicator> Worker<C> {
    pub fn new(comm: &C, image: SubImage, table: NeighbourTable) -> Self {
        let answers = AnswerEngine::new(comm, &table);
        Worker {
            image,
            table,
            answers,
            asks: AskSet::new(),
            stats: HaloStats::default(),
        }
    }

    /// Run `budget` sampler steps, servicing neighbour questions throughout.
    pub fn sample<R: Rng>(
        &mut self,
        comm: &C,
        params: &Params,
        budget: u64,
        rng: &mut R,
    ) -> Result<(), DenoiseError> {
        for done in 0..budget {
            if done > 0 && done % 1_000_000 == 0 {
                info!(
                    "worker {}: {} of {} proposals done",
                    comm.rank(),
                    done,
                    budget
                );
            }
            metropolis_step(
                comm,
                &mut self.image,
                &self.table,
                &mut self.answers,
                &mut self.asks,
                params,
                rng,
                &mut self.stats,
            )?;
        }
        Ok(())
    }

    /// Announce termination and keep answering until every neighbour has
    /// announced too.
    pub fn finish(&mut self, comm: &C) -> Result<(), DenoiseError> {
        let fin = FinishExchange::announce(comm, &self.table);
        fin.wait_closure(comm, &mut self.answers, &self.image)
    }

    pub fn image(&self) -> &SubImage {
        &self.image
    }

    /// Counters across sampling and termination, merged.
    pub fn stats(&self) -> HaloStats {
        HaloStats {
            questions_asked: *self.asks.asked(),
            questions_served: *self.answers.served(),
            ..self.stats
        }
    }
}

fn recv_scalar<C: Communicator>(
    comm: &C,
    tag: crate::comm::CommTag,
) -> Result<i32, DenoiseError> {
    let bytes = comm
        .irecv(COORDINATOR, tag, wire::SCALAR_LEN)
        .wait()
        .ok_or_else(|| DenoiseError::Comm {
            peer: COORDINATOR,
            reason: format!("no payload on tag {}", tag.get()),
        })?;
    wire::decode_i32(COORDINATOR, &bytes)
}

/// Blocking startup handshake: shape, neighbour table, initial pixels.
pub fn receive_assignment<C: Communicator>(
    comm: &C,
) -> Result<(SubImage, NeighbourTable), DenoiseError> {
    let rows = recv_scalar(comm, wire::ROWS)?;
    let cols = recv_scalar(comm, wire::COLUMNS)?;
    if rows <= 0 || cols <= 0 {
        return Err(DenoiseError::Comm {
            peer: COORDINATOR,
            reason: format!("invalid sub-image shape {rows}x{cols}"),
        });
    }
    let (rows, cols) = (rows as usize, cols as usize);

    let mut table_wire = [0i32; crate::grid::direction::DIRECTIONS];
    for d in Direction::ALL {
        table_wire[d.index()] = recv_scalar(comm, wire::neighbour_tag(d))?;
    }
    let table = NeighbourTable::from_wire(&table_wire);

    let mut pixels = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        let bytes = comm
            .irecv(COORDINATOR, wire::IMAGE_BASE.offset(r as u16), cols)
            .wait()
            .ok_or_else(|| DenoiseError::Comm {
                peer: COORDINATOR,
                reason: format!("no payload for image row {r}"),
            })?;
        if bytes.len() != cols {
            return Err(DenoiseError::BufferSize {
                peer: COORDINATOR,
                expected: cols,
                got: bytes.len(),
            });
        }
        pixels.extend_from_slice(wire::bytes_as_pixels(&bytes));
    }
    Ok((SubImage::new(rows, cols, pixels)?, table))
}

/// Ship the final sub-image back, one row per message.
pub fn send_result<C: Communicator>(comm: &C, image: &SubImage) -> Result<(), DenoiseError> {
    let mut pending = Vec::with_capacity(image.rows());
    for r in 0..image.rows() {
        pending.push(comm.isend(
            COORDINATOR,
            wire::RESULT_BASE.offset(r as u16),
            wire::pixels_as_bytes(image.row(r)),
        ));
    }
    for h in pending {
        h.wait();
    }
    Ok(())
}

/// Full worker-rank entry point.
pub fn run_worker<C: Communicator>(
    comm: &C,
    params: &Params,
    total_iterations: u64,
    seed: u64,
) -> Result<(), DenoiseError> {
    let workers = comm.size().saturating_sub(1);
    if workers == 0 {
        return Err(DenoiseError::NoWorkers);
    }
    let budget = total_iterations / workers as u64;

    let (image, table) = receive_assignment(comm)?;
    info!(
        "worker {} starting: {}x{} tile, {} neighbours, {} iterations",
        comm.rank(),
        image.rows(),
        image.cols(),
        table.present_count(),
        budget
    );

    let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(comm.rank() as u64));
    let mut worker = Worker::new(comm, image, table);
    worker.sample(comm, params, budget, &mut rng)?;
    worker.finish(comm)?;
    send_result(comm, worker.image())?;

    let stats = worker.stats();
    debug!(
        "worker {}: {} accepted of {} proposals, asked {:?}, served {:?}",
        comm.rank(),
        stats.accepted,
        stats.proposals,
        stats.questions_asked,
        stats.questions_served
    );
    info!("worker {} finished", comm.rank());
    Ok(())
}
