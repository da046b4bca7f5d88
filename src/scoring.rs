//! Aging of lit cells and the score they yield when they clear.

use crate::pipe::LightState;
use crate::playfield::{Cell, Playfield};
use crate::signal::Signal;
use tracing::debug;

/// Ticks a lit or impossible cell survives before it clears.
pub const MAX_AGE: u32 = 60;

/// Points lost when an impossible cell clears.
pub const IMPOSSIBLE_PENALTY: i64 = 5;

/// Points per band-multiplier for a cleared lit cell.
pub const CLEAR_POINTS: i64 = 5;

/// Score change for clearing a cell in this light state.
pub fn clear_value(light: LightState) -> i64 {
    match light {
        LightState::Unlit => 0,
        LightState::Impossible => -IMPOSSIBLE_PENALTY,
        LightState::Lit(color) => CLEAR_POINTS * i64::from(color.multiplier()),
    }
}

impl Playfield {
    /// Age every lit or impossible cell by one tick, clearing and scoring the
    /// ones past [`MAX_AGE`], then settle the board. The score never drops
    /// below zero.
    pub fn advance_age(&mut self) {
        self.last_cleared.clear();
        let width = self.width();
        let mut delta = 0i64;

        for (i, cell) in self.cells.iter_mut().enumerate() {
            if cell.is_empty() || cell.light.is_unlit() {
                continue;
            }
            if cell.age > MAX_AGE {
                delta += clear_value(cell.light);
                *cell = Cell::EMPTY;
                self.last_cleared.push((i % width, i / width));
            } else {
                cell.age += 1;
            }
        }

        if !self.last_cleared.is_empty() {
            debug!(cleared = self.last_cleared.len(), delta, "cells aged out");
            self.signal(Signal::Clear);
        }

        self.settle();

        let score = (i64::from(self.score) + delta).max(0);
        self.score = u32::try_from(score).unwrap_or(u32::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{BlockKind, ColorSet, Direction, PipeMask};
    use crate::playfield::{Edge, Rules};

    fn lit_field() -> Playfield {
        let rules = Rules {
            placing: false,
            ..Rules::default()
        };
        let mut pf = Playfield::with_seed(2, 1, rules, 1).unwrap();
        pf.set_source(Edge::West, 0, ColorSet::RED);
        pf.set_source(Edge::East, 0, ColorSet::RED);
        let piece = Cell::piece(BlockKind::Orange, PipeMask::pair(Direction::West, Direction::East));
        pf.set_cell(0, 0, piece);
        pf.set_cell(1, 0, piece);
        pf.check_connections();
        pf.take_signals();
        pf
    }

    #[test]
    fn test_clear_value_table() {
        assert_eq!(clear_value(LightState::Unlit), 0);
        assert_eq!(clear_value(LightState::Impossible), -5);
        assert_eq!(clear_value(LightState::Lit(ColorSet::BLUE)), 5);
        assert_eq!(clear_value(LightState::Lit(ColorSet::YELLOW)), 10);
        assert_eq!(clear_value(LightState::Lit(ColorSet::WHITE)), 20);
    }

    #[test]
    fn test_lit_cells_age() {
        let mut pf = lit_field();
        pf.advance_age();
        assert_eq!(pf.cell(0, 0).unwrap().age, 1);
        assert_eq!(pf.score(), 0);
        assert!(pf.last_cleared().is_empty());
    }

    #[test]
    fn test_unlit_cells_do_not_age() {
        let mut pf = lit_field();
        pf.set_source(Edge::East, 0, ColorSet::GREEN);
        pf.check_connections();
        pf.advance_age();
        assert_eq!(pf.cell(0, 0).unwrap().age, 0);
    }

    #[test]
    fn test_old_cells_clear_and_score() {
        let mut pf = lit_field();
        for x in 0..2 {
            pf.cell_mut(x, 0).unwrap().age = MAX_AGE + 1;
        }
        pf.advance_age();
        assert_eq!(pf.score(), 10);
        assert_eq!(pf.empty_count(), 2);
        assert_eq!(pf.last_cleared(), &[(0, 0), (1, 0)]);
        assert_eq!(pf.take_signals(), vec![Signal::Clear]);
    }

    #[test]
    fn test_age_at_limit_survives() {
        let mut pf = lit_field();
        pf.cell_mut(0, 0).unwrap().age = MAX_AGE;
        pf.advance_age();
        assert_eq!(pf.cell(0, 0).unwrap().age, MAX_AGE + 1);
        assert_eq!(pf.empty_count(), 0);
    }

    #[test]
    fn test_penalty_clamps_at_zero() {
        let mut pf = lit_field();
        let cell = pf.cell_mut(0, 0).unwrap();
        cell.light = LightState::Impossible;
        cell.age = MAX_AGE + 1;
        pf.advance_age();
        assert_eq!(pf.score(), 0);
        assert!(pf.cell(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_clearing_reopens_neighbours() {
        let mut pf = lit_field();
        pf.cell_mut(0, 0).unwrap().age = MAX_AGE + 1;
        pf.advance_age();
        // The survivor lost its path to the west source.
        assert!(pf.cell(1, 0).unwrap().light.is_unlit());
        assert_eq!(pf.cell(1, 0).unwrap().age, 0);
        assert_eq!(pf.score(), 5);
    }

    #[test]
    fn test_clearing_compacts_columns_under_gravity() {
        let rules = Rules {
            gravity: true,
            placing: false,
            ..Rules::default()
        };
        let mut pf = Playfield::with_seed(1, 3, rules, 1).unwrap();
        let vertical = PipeMask::pair(Direction::North, Direction::South);
        pf.set_cell(0, 1, Cell::piece(BlockKind::Green, PipeMask::pair(Direction::West, Direction::East)));
        pf.set_cell(0, 2, Cell::piece(BlockKind::Orange, vertical));
        let bottom = pf.cell_mut(0, 2).unwrap();
        bottom.light = LightState::Lit(ColorSet::RED);
        bottom.age = MAX_AGE + 1;

        pf.advance_age();

        assert_eq!(pf.score(), 5);
        assert!(pf.cell(0, 0).unwrap().is_empty());
        assert!(pf.cell(0, 1).unwrap().is_empty());
        assert_eq!(pf.cell(0, 2).unwrap().block, Some(BlockKind::Green));
        assert_eq!(pf.last_cleared(), &[(0, 2)]);
    }
}
