//! Worker-grid topology: compass directions, per-worker neighbour tables,
//! and the coordinator-side layout arithmetic that produces them.

pub mod direction;
pub mod layout;
pub mod neighbours;

pub use direction::{Direction, DIRECTIONS};
pub use layout::GridLayout;
pub use neighbours::NeighbourTable;
