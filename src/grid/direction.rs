//! The eight compass directions of a rectangular tiling.
//!
//! The numbering is fixed and doubles as the index into every
//! per-direction handle array. It is never used directly as a transport
//! tag; tag ranges live in [`crate::halo::wire`].

/// Number of compass neighbours of a sub-image.
pub const DIRECTIONS: usize = 8;

/// One of the eight compass neighbours of a sub-image.
///
/// Axial directions come first so the common (edge, not corner) case scans
/// them early.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
    NorthEast = 4,
    SouthEast = 5,
    SouthWest = 6,
    NorthWest = 7,
}

impl Direction {
    /// All directions in index order.
    pub const ALL: [Direction; DIRECTIONS] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    /// Stable index in 0..8.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// `(Δrow, Δcol)` of the neighbouring tile, row axis growing downward.
    #[inline]
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
            Direction::NorthEast => (-1, 1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (1, -1),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// True for the four corner directions.
    #[inline]
    pub const fn is_diagonal(self) -> bool {
        let (dr, dc) = self.offset();
        dr != 0 && dc != 0
    }

    pub fn from_index(i: usize) -> Option<Direction> {
        Direction::ALL.get(i).copied()
    }
}
