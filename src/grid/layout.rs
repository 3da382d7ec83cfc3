//! Coordinator-side layout arithmetic.
//!
//! The global image is tiled by a `grid_rows x grid_cols` grid of workers.
//! The grid shape is derived from the worker count and the image shape:
//! among all factorisations `grid_rows * grid_cols == workers` that divide
//! the image evenly, the one with the squarest tiles wins. When nothing
//! divides evenly the layout is rejected outright.
//!
//! Rank convention: the coordinator is rank 0; worker `w` (0-based grid
//! order, row-major) runs on rank `w + 1`.

use crate::error::DenoiseError;
use crate::grid::direction::Direction;
use crate::grid::neighbours::NeighbourTable;

/// Rank of the coordinator process.
pub const COORDINATOR: usize = 0;

/// Shape of the worker grid and of each worker's tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    pub grid_rows: usize,
    pub grid_cols: usize,
    pub tile_rows: usize,
    pub tile_cols: usize,
}

impl GridLayout {
    /// Pick the worker grid for an `image_rows x image_cols` image.
    pub fn derive(
        image_rows: usize,
        image_cols: usize,
        workers: usize,
    ) -> Result<Self, DenoiseError> {
        if workers == 0 {
            return Err(DenoiseError::NoWorkers);
        }
        let mut best: Option<GridLayout> = None;
        for grid_rows in 1..=workers {
            if workers % grid_rows != 0 {
                continue;
            }
            let grid_cols = workers / grid_rows;
            if image_rows % grid_rows != 0 || image_cols % grid_cols != 0 {
                continue;
            }
            let cand = GridLayout {
                grid_rows,
                grid_cols,
                tile_rows: image_rows / grid_rows,
                tile_cols: image_cols / grid_cols,
            };
            let gap = |l: &GridLayout| l.tile_rows.abs_diff(l.tile_cols);
            match &best {
                Some(b) if gap(b) <= gap(&cand) => {}
                _ => best = Some(cand),
            }
        }
        best.ok_or(DenoiseError::Topology {
            rows: image_rows,
            cols: image_cols,
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.grid_rows * self.grid_cols
    }

    /// Rank of the worker at grid position `(gr, gc)`.
    pub fn rank_at(&self, gr: usize, gc: usize) -> usize {
        gr * self.grid_cols + gc + 1
    }

    /// Grid position of worker index `w` in 0..worker_count.
    pub fn coords_of(&self, w: usize) -> (usize, usize) {
        (w / self.grid_cols, w % self.grid_cols)
    }

    /// Neighbour table for worker index `w`.
    ///
    /// A diagonal lies outside the grid exactly when one of its axial
    /// components does, so a single bounds check covers both the axial and
    /// corner absence rules.
    pub fn neighbours(&self, w: usize) -> NeighbourTable {
        let (gr, gc) = self.coords_of(w);
        let mut table = NeighbourTable::empty();
        for d in Direction::ALL {
            let (dr, dc) = d.offset();
            let nr = gr as isize + dr;
            let nc = gc as isize + dc;
            if (0..self.grid_rows as isize).contains(&nr)
                && (0..self.grid_cols as isize).contains(&nc)
            {
                table.set(d, Some(self.rank_at(nr as usize, nc as usize)));
            }
        }
        table
    }

    /// Destination of one row chunk: global row `r`, worker column `gc`
    /// map to `(rank, local_row)`; the chunk spans
    /// `gc * tile_cols .. (gc + 1) * tile_cols` of the global row.
    pub fn route_row(&self, r: usize, gc: usize) -> (usize, usize) {
        (self.rank_at(r / self.tile_rows, gc), r % self.tile_rows)
    }
}
