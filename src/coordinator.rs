//! Coordinator lifecycle: read the image, derive the worker grid, scatter
//! shape/neighbours/pixels, gather the denoised rows, write the output.
//!
//! The coordinator is rank 0 and never participates in the halo protocol;
//! its traffic is the startup scatter and the final gather only.

use std::path::Path;
use std::time::Instant;

use log::info;

use crate::comm::{Communicator, Wait};
use crate::error::DenoiseError;
use crate::field::text_io::{read_image, write_image, Image};
use crate::grid::direction::Direction;
use crate::grid::layout::GridLayout;
use crate::halo::wire;

/// Send shape, neighbour table and initial rows to every worker.
///
/// All sends are posted first and drained together, the way the halo
/// engines treat their own sends.
fn scatter<C: Communicator>(
    comm: &C,
    layout: &GridLayout,
    image: &Image,
) -> Result<(), DenoiseError> {
    let mut pending: Vec<C::SendHandle> = Vec::new();
    for w in 0..layout.worker_count() {
        let rank = w + 1;
        pending.push(comm.isend(rank, wire::ROWS, &wire::encode_i32(layout.tile_rows as i32)));
        pending.push(comm.isend(
            rank,
            wire::COLUMNS,
            &wire::encode_i32(layout.tile_cols as i32),
        ));
        let table = layout.neighbours(w).to_wire();
        for d in Direction::ALL {
            pending.push(comm.isend(
                rank,
                wire::neighbour_tag(d),
                &wire::encode_i32(table[d.index()]),
            ));
        }
    }
    for r in 0..image.rows {
        for gc in 0..layout.grid_cols {
            let (rank, local_row) = layout.route_row(r, gc);
            let chunk = image.row_chunk(r, gc * layout.tile_cols, layout.tile_cols);
            pending.push(comm.isend(
                rank,
                wire::IMAGE_BASE.offset(local_row as u16),
                wire::pixels_as_bytes(chunk),
            ));
        }
    }
    for h in pending {
        h.wait();
    }
    Ok(())
}

/// Collect every worker's final rows into a fresh image.
fn gather<C: Communicator>(
    comm: &C,
    layout: &GridLayout,
    rows: usize,
    cols: usize,
) -> Result<Image, DenoiseError> {
    let mut handles = Vec::with_capacity(rows * layout.grid_cols);
    for w in 0..layout.worker_count() {
        for lr in 0..layout.tile_rows {
            let h = comm.irecv(w + 1, wire::RESULT_BASE.offset(lr as u16), layout.tile_cols);
            handles.push((w, lr, h));
        }
    }

    let mut pixels = vec![0i8; rows * cols];
    for (w, lr, h) in handles {
        let bytes = h.wait().ok_or_else(|| DenoiseError::Comm {
            peer: w + 1,
            reason: format!("no payload for final row {lr}"),
        })?;
        if bytes.len() != layout.tile_cols {
            return Err(DenoiseError::BufferSize {
                peer: w + 1,
                expected: layout.tile_cols,
                got: bytes.len(),
            });
        }
        let (gr, gc) = layout.coords_of(w);
        let start = (gr * layout.tile_rows + lr) * cols + gc * layout.tile_cols;
        pixels[start..start + layout.tile_cols]
            .copy_from_slice(wire::bytes_as_pixels(&bytes));
    }
    Ok(Image { rows, cols, pixels })
}

/// Full coordinator-rank entry point.
pub fn run_coordinator<C: Communicator>(
    comm: &C,
    input: &Path,
    output: &Path,
) -> Result<(), DenoiseError> {
    let start = Instant::now();
    let image = read_image(input)?;
    let workers = comm.size().saturating_sub(1);
    let layout = GridLayout::derive(image.rows, image.cols, workers)?;
    info!(
        "coordinator: {}x{} image over a {}x{} worker grid ({}x{} tiles)",
        image.rows, image.cols, layout.grid_rows, layout.grid_cols, layout.tile_rows, layout.tile_cols
    );

    scatter(comm, &layout, &image)?;
    info!("coordinator: all workers received their sub-images");

    let final_image = gather(comm, &layout, image.rows, image.cols)?;
    info!(
        "coordinator: gathered all rows in {:.3}s, writing {}",
        start.elapsed().as_secs_f64(),
        output.display()
    );
    write_image(output, &final_image)?;
    Ok(())
}
