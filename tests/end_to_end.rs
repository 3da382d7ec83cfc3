//! Whole-deployment tests: coordinator plus workers over `ThreadComm`,
//! exercising the startup scatter, the halo protocol and the final gather.

use std::path::PathBuf;
use std::thread;

use ising_denoise::comm::ThreadComm;
use ising_denoise::coordinator::run_coordinator;
use ising_denoise::error::DenoiseError;
use ising_denoise::field::text_io::{read_image, write_image, Image};
use ising_denoise::grid::GridLayout;
use ising_denoise::sampler::Params;
use ising_denoise::worker::run_worker;

fn tmp(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ising-denoise-e2e-{name}"))
}

/// Run a full deployment over threads and return the output image.
fn denoise(
    name: &str,
    input: &Image,
    workers: usize,
    beta: f64,
    pi: f64,
    iterations: u64,
) -> Image {
    let in_path = tmp(&format!("{name}-in"));
    let out_path = tmp(&format!("{name}-out"));
    write_image(&in_path, input).unwrap();

    let params = Params::from_beta_pi(beta, pi).unwrap();
    let mut comms = ThreadComm::fabric(workers + 1);
    let coordinator_comm = comms.remove(0);

    let mut joins = Vec::new();
    for comm in comms {
        joins.push(thread::spawn(move || {
            run_worker(&comm, &params, iterations, 1234)
        }));
    }
    run_coordinator(&coordinator_comm, &in_path, &out_path).unwrap();
    for j in joins {
        j.join().unwrap().unwrap();
    }

    let out = read_image(&out_path).unwrap();
    std::fs::remove_file(&in_path).unwrap();
    std::fs::remove_file(&out_path).unwrap();
    out
}

fn chessboard(rows: usize, cols: usize) -> Image {
    let pixels = (0..rows * cols)
        .map(|i| {
            let (r, c) = (i / cols, i % cols);
            if (r + c) % 2 == 0 {
                1i8
            } else {
                -1
            }
        })
        .collect();
    Image { rows, cols, pixels }
}

#[test]
fn single_worker_free_evolution_stays_in_domain() {
    // gamma = 0 and beta = 0: every proposal is accepted, the image walks
    // freely but must remain a +-1 image of the same shape.
    let input = Image {
        rows: 2,
        cols: 2,
        pixels: vec![1, 1, 1, 1],
    };
    let out = denoise("free", &input, 1, 0.0, 0.5, 2_000);
    assert_eq!((out.rows, out.cols), (2, 2));
    assert!(out.pixels.iter().all(|p| *p == 1 || *p == -1));
}

#[test]
fn strong_data_term_pins_the_image_exactly() {
    // With pi = 1e-300, gamma is about 345, so |dE| stays far below
    // ln(u) >= 53 * ln(1/2) for every representable u: not a single flip
    // can be accepted and the output must equal the input bit for bit.
    // This also checks the scatter/gather round-trip over 2x2 tiles.
    let input = chessboard(2, 4);
    let out = denoise("pinned", &input, 2, 10.0, 1e-300, 4_000);
    assert_eq!(out, input);
}

#[test]
fn four_worker_grid_round_trips_the_image() {
    let input = chessboard(4, 4);
    let out = denoise("grid4", &input, 4, 0.1, 1e-300, 2_000);
    assert_eq!(out, input);
}

#[test]
fn nine_worker_grid_round_trips_the_image() {
    let input = chessboard(9, 9);
    let out = denoise("grid9", &input, 9, 1.0, 1e-300, 9_000);
    assert_eq!(out, input);
}

#[test]
fn layout_prefers_side_by_side_split_for_wide_images() {
    // The pinned 2x4 run above relies on this: two workers split the
    // columns, giving each a square 2x2 tile with an east/west halo.
    let layout = GridLayout::derive(2, 4, 2).unwrap();
    assert_eq!((layout.grid_rows, layout.grid_cols), (1, 2));
}

#[test]
fn coordinator_aborts_on_an_indivisible_layout() {
    let in_path = tmp("indivisible-in");
    let out_path = tmp("indivisible-out");
    write_image(&in_path, &chessboard(4, 4)).unwrap();

    // 3 workers cannot tile a 4x4 image; the coordinator must fail before
    // any worker traffic, so no worker threads are needed here.
    let mut comms = ThreadComm::fabric(4);
    let coordinator_comm = comms.remove(0);
    let err = run_coordinator(&coordinator_comm, &in_path, &out_path).unwrap_err();
    assert!(matches!(err, DenoiseError::Topology { .. }));

    std::fs::remove_file(&in_path).unwrap();
}
