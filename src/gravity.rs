//! Column compaction.

use crate::playfield::Playfield;

impl Playfield {
    /// Let pieces fall to the bottom of their column, then recheck lighting.
    pub fn apply_gravity(&mut self) {
        self.compact_columns();
        self.check_connections();
    }

    /// Bottom-up, every empty cell swaps with the nearest occupied cell above
    /// it. The top row is never a destination.
    fn compact_columns(&mut self) {
        let (w, h) = (self.width(), self.height());
        for y in (1..h).rev() {
            for x in 0..w {
                let here = y * w + x;
                if !self.cells[here].is_empty() {
                    continue;
                }
                if let Some(above) = (0..y).rev().map(|py| py * w + x).find(|&i| !self.cells[i].is_empty()) {
                    self.cells.swap(here, above);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{BlockKind, Direction, PipeMask};
    use crate::playfield::{Cell, Rules};

    fn piece(kind: BlockKind) -> Cell {
        Cell::piece(kind, PipeMask::pair(Direction::North, Direction::East))
    }

    fn gravity_field(w: usize, h: usize) -> Playfield {
        let rules = Rules {
            gravity: true,
            ..Rules::default()
        };
        Playfield::with_seed(w, h, rules, 4).unwrap()
    }

    #[test]
    fn test_pieces_fall_in_order() {
        let mut pf = gravity_field(1, 4);
        pf.set_cell(0, 0, piece(BlockKind::Purple));
        pf.set_cell(0, 2, piece(BlockKind::Green));
        pf.apply_gravity();
        assert!(pf.cell(0, 0).unwrap().is_empty());
        assert!(pf.cell(0, 1).unwrap().is_empty());
        assert_eq!(pf.cell(0, 2).unwrap().block, Some(BlockKind::Purple));
        assert_eq!(pf.cell(0, 3).unwrap().block, Some(BlockKind::Green));
    }

    #[test]
    fn test_columns_are_independent() {
        let mut pf = gravity_field(2, 3);
        pf.set_cell(0, 0, piece(BlockKind::Blue));
        pf.set_cell(1, 2, piece(BlockKind::Orange));
        pf.apply_gravity();
        assert_eq!(pf.cell(0, 2).unwrap().block, Some(BlockKind::Blue));
        assert_eq!(pf.cell(1, 2).unwrap().block, Some(BlockKind::Orange));
        assert_eq!(pf.empty_count(), 4);
    }

    #[test]
    fn test_gravity_is_idempotent() {
        let mut pf = gravity_field(3, 5);
        for (x, y) in [(0, 0), (0, 3), (1, 1), (2, 0), (2, 1), (2, 4)] {
            pf.set_cell(x, y, piece(BlockKind::Purple));
        }
        pf.apply_gravity();
        let once = pf.cells().to_vec();
        pf.apply_gravity();
        assert_eq!(pf.cells(), once.as_slice());
    }
}
