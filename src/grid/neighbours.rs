//! Per-worker neighbour table: `Direction -> Option<rank>`.
//!
//! `None` means the sub-image borders the corresponding global edge. On the
//! wire the coordinator encodes an absent neighbour as `-1`; in memory the
//! sentinel is gone.

use crate::grid::direction::{Direction, DIRECTIONS};

/// Static mapping from compass direction to the owning peer rank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NeighbourTable {
    peers: [Option<usize>; DIRECTIONS],
}

impl NeighbourTable {
    /// A table with every direction absent (single isolated worker).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&mut self, d: Direction, peer: Option<usize>) {
        self.peers[d.index()] = peer;
    }

    #[inline]
    pub fn get(&self, d: Direction) -> Option<usize> {
        self.peers[d.index()]
    }

    /// Directions that have a live peer, in index order.
    pub fn present(&self) -> impl Iterator<Item = (Direction, usize)> + '_ {
        Direction::ALL
            .iter()
            .filter_map(|&d| self.get(d).map(|peer| (d, peer)))
    }

    pub fn present_count(&self) -> usize {
        self.peers.iter().filter(|p| p.is_some()).count()
    }

    /// Wire form: one `i32` per direction, `-1` for absent.
    pub fn to_wire(&self) -> [i32; DIRECTIONS] {
        let mut out = [-1i32; DIRECTIONS];
        for (d, peer) in self.present() {
            out[d.index()] = peer as i32;
        }
        out
    }

    /// Rebuild from the coordinator's eight assignment messages.
    pub fn from_wire(wire: &[i32; DIRECTIONS]) -> Self {
        let mut table = NeighbourTable::empty();
        for d in Direction::ALL {
            let raw = wire[d.index()];
            table.set(d, (raw >= 0).then(|| raw as usize));
        }
        table
    }
}
