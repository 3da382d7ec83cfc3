//! Metropolis-Hastings sampling over the Ising energy.
//!
//! One step draws a uniform pixel, gathers the 3x3 neighbour sum (locally
//! and, on sub-image edges, from the neighbouring workers), and accepts
//! the flip with probability `exp(dE)` via the overflow-safe comparison
//! `ln u <= dE`.

use rand::Rng;

use crate::comm::Communicator;
use crate::error::DenoiseError;
use crate::field::SubImage;
use crate::grid::direction::{Direction, DIRECTIONS};
use crate::grid::neighbours::NeighbourTable;
use crate::halo::answer::AnswerEngine;
use crate::halo::ask::AskSet;

/// Energy weights of the sampler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Params {
    /// Coupling strength between adjacent pixels.
    pub beta: f64,
    /// Data-fidelity weight, `0.5 * ln((1 - pi) / pi)`.
    pub gamma: f64,
}

impl Params {
    /// Derive the weights from the CLI parameters.
    pub fn from_beta_pi(beta: f64, pi: f64) -> Result<Self, DenoiseError> {
        if !beta.is_finite() {
            return Err(DenoiseError::BadBeta(beta));
        }
        if !(pi > 0.0 && pi < 1.0) {
            return Err(DenoiseError::BadPi(pi));
        }
        Ok(Params {
            beta,
            gamma: ((1.0 - pi) / pi).ln() / 2.0,
        })
    }
}

/// Energy change of flipping `(r, c)` given the current pixel, its frozen
/// initial value and the 3x3 neighbour sum.
///
/// Linear in `current`, so flipping the same pixel twice with unchanged
/// neighbours negates the value.
#[inline]
pub fn delta_energy(params: &Params, initial: i8, current: i8, neighbour_sum: i32) -> f64 {
    let initial = f64::from(initial);
    let current = f64::from(current);
    -2.0 * params.gamma * initial * current - 2.0 * params.beta * current * f64::from(neighbour_sum)
}

/// Counters kept by one worker across its whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HaloStats {
    /// Proposals evaluated (accepted or rejected).
    pub proposals: u64,
    /// Proposals that flipped the pixel.
    pub accepted: u64,
    /// Questions posted to each direction.
    pub questions_asked: [u64; DIRECTIONS],
    /// Questions served for each direction.
    pub questions_served: [u64; DIRECTIONS],
}

/// Post the boundary questions for pixel `(r, c)`.
///
/// Axial questions carry the coordinate the neighbour cannot know (the
/// column for north/south, the row for east/west); corner questions carry
/// a placeholder since the direction alone pins the window. A corner
/// pixel touches up to three external directions, an edge pixel one; a
/// one-pixel sub-image touches all that exist.
fn post_boundary_asks<C: Communicator>(
    asks: &mut AskSet<C>,
    comm: &C,
    table: &NeighbourTable,
    image: &SubImage,
    r: usize,
    c: usize,
) {
    let (rows, cols) = (image.rows(), image.cols());
    if r == 0 {
        asks.post(comm, table, Direction::North, c as i32);
        if c == 0 {
            asks.post(comm, table, Direction::NorthWest, 0);
        }
        if c == cols - 1 {
            asks.post(comm, table, Direction::NorthEast, 0);
        }
    }
    if r == rows - 1 {
        asks.post(comm, table, Direction::South, c as i32);
        if c == 0 {
            asks.post(comm, table, Direction::SouthWest, 0);
        }
        if c == cols - 1 {
            asks.post(comm, table, Direction::SouthEast, 0);
        }
    }
    if c == 0 {
        asks.post(comm, table, Direction::West, r as i32);
    }
    if c == cols - 1 {
        asks.post(comm, table, Direction::East, r as i32);
    }
}

/// One full sampler step: draw, sum, exchange, accept or reject.
#[allow(clippy::too_many_arguments)]
pub fn metropolis_step<C: Communicator, R: Rng>(
    comm: &C,
    image: &mut SubImage,
    table: &NeighbourTable,
    answers: &mut AnswerEngine<C>,
    asks: &mut AskSet<C>,
    params: &Params,
    rng: &mut R,
    stats: &mut HaloStats,
) -> Result<(), DenoiseError> {
    let r = rng.gen_range(0..image.rows());
    let c = rng.gen_range(0..image.cols());

    let mut sum = image.window_sum(r as isize, c as isize);
    post_boundary_asks(asks, comm, table, image, r, c);
    sum += asks.drain(comm, answers, image)?;

    let de = delta_energy(params, image.initial_at(r, c), image.get(r, c), sum);
    // u in (0, 1]; ln 1 = 0 accepts every non-negative dE.
    let u = 1.0 - rng.gen::<f64>();
    stats.proposals += 1;
    if u.ln() <= de {
        image.flip(r, c);
        stats.accepted += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{NoComm, ThreadComm, Wait};
    use crate::halo::wire;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn gamma_matches_the_log_odds() {
        let p = Params::from_beta_pi(0.8, 0.5).unwrap();
        assert_eq!(p.gamma, 0.0);
        let p = Params::from_beta_pi(0.8, 0.2).unwrap();
        assert!((p.gamma - (4.0f64).ln() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        assert!(matches!(
            Params::from_beta_pi(f64::NAN, 0.5),
            Err(DenoiseError::BadBeta(_))
        ));
        for pi in [0.0, 1.0, -0.1, 1.1, f64::NAN] {
            assert!(matches!(
                Params::from_beta_pi(1.0, pi),
                Err(DenoiseError::BadPi(_))
            ));
        }
    }

    #[test]
    fn delta_energy_negates_under_a_flip() {
        let params = Params::from_beta_pi(1.3, 0.2).unwrap();
        for initial in [-1i8, 1] {
            for current in [-1i8, 1] {
                for sum in -8..=8 {
                    let de1 = delta_energy(&params, initial, current, sum);
                    let de2 = delta_energy(&params, initial, -current, sum);
                    assert!((de1 + de2).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn delta_energy_matches_the_closed_form() {
        let params = Params {
            beta: 2.0,
            gamma: 0.5,
        };
        // -2*0.5*1*(-1) - 2*2*(-1)*3 = 1 + 12
        assert_eq!(delta_energy(&params, 1, -1, 3), 13.0);
    }

    #[test]
    fn interior_step_stays_in_the_pixel_domain() {
        // gamma = 0 accepts freely; every pixel must remain +-1.
        let comm = NoComm;
        let mut image = SubImage::new(2, 2, vec![1, 1, 1, 1]).unwrap();
        let table = NeighbourTable::empty();
        let mut answers = AnswerEngine::new(&comm, &table);
        let mut asks = AskSet::new();
        let params = Params::from_beta_pi(0.0, 0.5).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut stats = HaloStats::default();
        for _ in 0..500 {
            metropolis_step(
                &comm,
                &mut image,
                &table,
                &mut answers,
                &mut asks,
                &params,
                &mut rng,
                &mut stats,
            )
            .unwrap();
        }
        assert_eq!(stats.proposals, 500);
        assert!(image.current_pixels().iter().all(|p| *p == 1 || *p == -1));
        assert!(image.initial_pixels().iter().all(|p| *p == 1));
    }

    #[test]
    fn corner_pixel_posts_three_questions() {
        // A 1x1 sub-image with north, west and north-west neighbours: the
        // only pixel is simultaneously a corner on all sides that exist.
        let comms = ThreadComm::fabric(4);
        let mut table = NeighbourTable::empty();
        table.set(Direction::North, Some(1));
        table.set(Direction::West, Some(2));
        table.set(Direction::NorthWest, Some(3));

        let image = SubImage::new(1, 1, vec![-1]).unwrap();
        let mut asks = AskSet::new();
        post_boundary_asks(&mut asks, &comms[0], &table, &image, 0, 0);
        assert_eq!(asks.outstanding(), 3);
        assert_eq!(asks.asked()[Direction::North.index()], 1);
        assert_eq!(asks.asked()[Direction::West.index()], 1);
        assert_eq!(asks.asked()[Direction::NorthWest.index()], 1);
        assert_eq!(asks.asked()[Direction::South.index()], 0);

        // Axial questions carry the missing coordinate, corners carry 0.
        for peer in 1..=3usize {
            let q = comms[peer].irecv(0, wire::QUESTION, wire::SCALAR_LEN);
            assert_eq!(wire::decode_i32(0, &q.wait().unwrap()).unwrap(), 0);
        }
    }
}
