//! Light propagation and impossibility analysis.
//!
//! Every placed piece has exactly two connections, so a chain entered from one
//! side has a single way out of each cell: the walks below never branch.
//! The impossibility analyzer does explore both ends of a chain and keeps an
//! explicit stack instead of recursing, so depth is bounded by the heap, not
//! the call stack.

use crate::pipe::{ColorSet, Direction, LightState, PipeMask};
use crate::playfield::{Playfield, Step};
use crate::signal::Signal;
use tracing::trace;

/// What an unlit chain needs from the sources it may eventually reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// No source constrains it yet; a future piece could still complete it.
    Free,
    /// Must end at sources carrying at least these bands.
    Bands(ColorSet),
    /// Loops back on itself or needs incompatible bands.
    Impossible,
}

impl Constraint {
    /// Combine two branch results. The narrower band set wins when one
    /// contains the other; unrelated sets cannot both be satisfied.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Impossible, _) | (_, Self::Impossible) => Self::Impossible,
            (Self::Free, c) | (c, Self::Free) => c,
            (Self::Bands(a), Self::Bands(b)) => {
                if a.is_subset_of(b) {
                    Self::Bands(a)
                } else if b.is_subset_of(a) {
                    Self::Bands(b)
                } else {
                    Self::Impossible
                }
            }
        }
    }

    fn from_source(color: ColorSet) -> Self {
        if color.is_empty() {
            Self::Impossible
        } else {
            Self::Bands(color)
        }
    }
}

/// Pending work for one cell of the constraint walk.
struct Frame {
    x: usize,
    y: usize,
    pending: PipeMask,
    acc: Constraint,
}

impl Playfield {
    /// Full recheck: clear all light, light every source chain, flag impossible
    /// chains when placing, then reset the age of every cell whose light
    /// changed and signal new colours or new impossibilities.
    pub fn check_connections(&mut self) {
        let before: Vec<LightState> = self.cells.iter().map(|c| c.light).collect();

        self.recheck_connections();
        if self.rules.placing {
            self.resolve_color_constraints();
        }

        let mut activated = false;
        let mut bad = false;
        for (cell, old) in self.cells.iter_mut().zip(before) {
            if cell.light != old {
                match cell.light {
                    LightState::Impossible => bad = true,
                    LightState::Lit(_) => activated = true,
                    LightState::Unlit => {}
                }
                cell.age = 0;
            }
        }
        trace!(activated, bad, "connections rechecked");
        if activated {
            self.signal(Signal::Activated);
        }
        if bad {
            self.signal(Signal::Bad);
        }
    }

    /// Unlight every cell, then light each chain that joins a source to a
    /// compatible source on another border slot.
    pub fn recheck_connections(&mut self) {
        for cell in &mut self.cells {
            cell.light = LightState::Unlit;
        }

        let (w, h) = (self.width(), self.height());
        for y in 0..h {
            self.light_from(0, y, Direction::West);
            self.light_from(w - 1, y, Direction::East);
        }
        for x in 0..w {
            self.light_from(x, h - 1, Direction::South);
            self.light_from(x, 0, Direction::North);
        }
    }

    /// Probe from the source beyond `side` of border cell (x, y); fill on success.
    fn light_from(&mut self, x: usize, y: usize, side: Direction) {
        let color = match self.step_from(x, y, side) {
            Step::Edge(c) => c,
            Step::Cell(..) => return,
        };
        if !color.is_empty() && self.touches_light(x, y, side, color) {
            self.fill_light(x, y, side, color);
        }
    }

    /// Follow the chain entering (x, y) through `incoming`. True when it ends at
    /// a source whose bands include all of `color`.
    pub fn touches_light(&self, x: usize, y: usize, incoming: Direction, color: ColorSet) -> bool {
        let (mut x, mut y, mut incoming) = (x, y, incoming);
        for _ in 0..=self.cells.len() {
            let Some(cell) = self.cell(x, y) else {
                return false;
            };
            let Some(out) = cell.pipe.through(incoming) else {
                return false;
            };
            match self.step_from(x, y, out) {
                Step::Edge(dest) => return color.is_subset_of(dest),
                Step::Cell(nx, ny) => {
                    (x, y, incoming) = (nx, ny, out.opposite());
                }
            }
        }
        false
    }

    /// Light the chain entering (x, y) through `incoming` with `color`. Only
    /// meaningful after [`Self::touches_light`] succeeded on the same chain.
    pub fn fill_light(&mut self, x: usize, y: usize, incoming: Direction, color: ColorSet) {
        let (mut x, mut y, mut incoming) = (x, y, incoming);
        for _ in 0..=self.cells.len() {
            let Some(cell) = self.cell_mut(x, y) else {
                return;
            };
            if !cell.pipe.has(incoming) {
                return;
            }
            cell.light = LightState::Lit(color);
            let Some(out) = cell.pipe.through(incoming) else {
                return;
            };
            match self.step_from(x, y, out) {
                Step::Edge(_) => return,
                Step::Cell(nx, ny) => {
                    (x, y, incoming) = (nx, ny, out.opposite());
                }
            }
        }
    }

    /// Mark every unlit chain that can never be satisfied.
    pub fn resolve_color_constraints(&mut self) {
        let mut visited = vec![false; self.cells.len()];
        for y in 0..self.height() {
            for x in 0..self.width() {
                let Some(cell) = self.cell(x, y) else { continue };
                if cell.is_empty() || !cell.light.is_unlit() {
                    continue;
                }
                visited.fill(false);
                if self.possible_color_in(x, y, None, &mut visited) == Constraint::Impossible {
                    trace!(x, y, "impossible chain");
                    self.mark_impossible(x, y, None);
                }
            }
        }
    }

    /// Constraint imposed on the chain through (x, y), entered via `incoming`
    /// (`None` explores every connection of the start cell). A chain that
    /// loops back on itself is impossible.
    pub fn possible_color(&self, x: usize, y: usize, incoming: Option<Direction>) -> Constraint {
        let mut visited = vec![false; self.cells.len()];
        self.possible_color_in(x, y, incoming, &mut visited)
    }

    /// [`Self::possible_color`] with a caller-owned visited buffer, one flag per
    /// cell. Cells already flagged count as part of the current walk.
    pub(crate) fn possible_color_in(
        &self,
        x: usize,
        y: usize,
        incoming: Option<Direction>,
        visited: &mut [bool],
    ) -> Constraint {
        debug_assert_eq!(visited.len(), self.cells.len(), "visited buffer must cover the grid");
        let mut stack = match self.enter(x, y, incoming, visited) {
            Ok(frame) => vec![frame],
            Err(done) => return done,
        };

        while let Some(top) = stack.last_mut() {
            let Some(dir) = top.pending.directions().next() else {
                let finished = top.acc;
                stack.pop();
                match stack.last_mut() {
                    None => return finished,
                    Some(parent) => {
                        parent.acc = parent.acc.merge(finished);
                        if parent.acc == Constraint::Impossible {
                            return Constraint::Impossible;
                        }
                    }
                }
                continue;
            };
            top.pending = top.pending.without(dir);
            let (cx, cy) = (top.x, top.y);

            let branch = match self.step_from(cx, cy, dir) {
                Step::Edge(color) => Constraint::from_source(color),
                Step::Cell(nx, ny) => match self.enter(nx, ny, Some(dir.opposite()), visited) {
                    Ok(frame) => {
                        stack.push(frame);
                        continue;
                    }
                    Err(done) => done,
                },
            };
            if let Some(top) = stack.last_mut() {
                top.acc = top.acc.merge(branch);
                if top.acc == Constraint::Impossible {
                    return Constraint::Impossible;
                }
            }
        }
        Constraint::Free
    }

    /// Visit (x, y): either an immediate answer or a frame to explore.
    fn enter(
        &self,
        x: usize,
        y: usize,
        incoming: Option<Direction>,
        visited: &mut [bool],
    ) -> Result<Frame, Constraint> {
        let Some(i) = self.index(x, y) else {
            return Err(Constraint::Free);
        };
        if visited[i] {
            return Err(Constraint::Impossible);
        }
        let cell = &self.cells[i];
        if cell.is_empty() {
            return Err(Constraint::Free);
        }
        if incoming.is_some_and(|d| !cell.pipe.has(d)) {
            return Err(Constraint::Free);
        }
        visited[i] = true;
        Ok(Frame {
            x,
            y,
            pending: incoming.map_or(cell.pipe, |d| cell.pipe.without(d)),
            acc: Constraint::Free,
        })
    }

    /// Flag the chain through (x, y) as impossible, stopping at empty cells,
    /// cells already flagged and cells not connected back.
    pub fn mark_impossible(&mut self, x: usize, y: usize, incoming: Option<Direction>) {
        let mut stack = vec![(x, y, incoming)];
        while let Some((x, y, incoming)) = stack.pop() {
            let Some(cell) = self.cell_mut(x, y) else { continue };
            if cell.light == LightState::Impossible || cell.is_empty() {
                continue;
            }
            if incoming.is_some_and(|d| !cell.pipe.has(d)) {
                continue;
            }
            cell.light = LightState::Impossible;
            let outs = incoming.map_or(cell.pipe, |d| cell.pipe.without(d));
            for dir in outs.directions() {
                if let Step::Cell(nx, ny) = self.step_from(x, y, dir) {
                    stack.push((nx, ny, Some(dir.opposite())));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::BlockKind;
    use crate::playfield::{Cell, Edge, Rules};
    use Direction::{East, North, South, West};

    fn piece(a: Direction, b: Direction) -> Cell {
        Cell::piece(BlockKind::Blue, PipeMask::pair(a, b))
    }

    fn field(w: usize, h: usize, placing: bool) -> Playfield {
        let rules = Rules {
            placing,
            ..Rules::default()
        };
        Playfield::with_seed(w, h, rules, 1).unwrap()
    }

    #[test]
    fn test_merge_table() {
        use Constraint::{Bands, Free, Impossible};
        assert_eq!(Free.merge(Bands(ColorSet::RED)), Bands(ColorSet::RED));
        assert_eq!(Bands(ColorSet::RED).merge(Free), Bands(ColorSet::RED));
        assert_eq!(
            Bands(ColorSet::MAGENTA).merge(Bands(ColorSet::RED)),
            Bands(ColorSet::RED)
        );
        assert_eq!(Bands(ColorSet::RED).merge(Bands(ColorSet::GREEN)), Impossible);
        assert_eq!(Bands(ColorSet::CYAN).merge(Bands(ColorSet::CYAN)), Bands(ColorSet::CYAN));
        assert_eq!(Free.merge(Impossible), Impossible);
    }

    #[test]
    fn test_straight_chain_lights() {
        let mut pf = field(2, 1, false);
        pf.set_source(Edge::West, 0, ColorSet::RED);
        pf.set_source(Edge::East, 0, ColorSet::RED);
        pf.set_cell(0, 0, piece(West, East));
        pf.set_cell(1, 0, piece(West, East));
        pf.check_connections();
        for x in 0..2 {
            let c = pf.cell(x, 0).unwrap();
            assert_eq!(c.light, LightState::Lit(ColorSet::RED));
            assert_eq!(c.age, 0);
        }
        assert!(pf.take_signals().contains(&Signal::Activated));
    }

    #[test]
    fn test_elbow_chain_to_bottom_source() {
        // West source row 0 -> (0,0) W-E -> (1,0) W-S -> bottom source column 1.
        let mut pf = field(2, 1, false);
        pf.set_source(Edge::West, 0, ColorSet::BLUE);
        pf.set_source(Edge::South, 1, ColorSet::CYAN);
        pf.set_cell(0, 0, piece(West, East));
        pf.set_cell(1, 0, piece(West, South));
        pf.check_connections();
        assert_eq!(pf.cell(1, 0).unwrap().light, LightState::Lit(ColorSet::BLUE));
        assert!(pf.touches_light(0, 0, West, ColorSet::BLUE));
        assert!(!pf.touches_light(0, 0, West, ColorSet::RED));
    }

    #[test]
    fn test_broken_chain_stays_unlit() {
        let mut pf = field(3, 1, false);
        pf.set_source(Edge::West, 0, ColorSet::RED);
        pf.set_source(Edge::East, 0, ColorSet::RED);
        pf.set_cell(0, 0, piece(West, East));
        pf.set_cell(1, 0, piece(North, South));
        pf.set_cell(2, 0, piece(West, East));
        pf.check_connections();
        assert!(pf.cells().iter().all(|c| c.light.is_unlit()));
    }

    #[test]
    fn test_closed_loop_is_impossible() {
        let mut pf = field(2, 2, true);
        pf.set_cell(0, 0, piece(East, South));
        pf.set_cell(1, 0, piece(West, South));
        pf.set_cell(0, 1, piece(North, East));
        pf.set_cell(1, 1, piece(North, West));
        assert_eq!(pf.possible_color(0, 0, None), Constraint::Impossible);

        pf.check_connections();
        assert!(pf.cells().iter().all(|c| c.light == LightState::Impossible));
        assert!(pf.take_signals().contains(&Signal::Bad));
    }

    #[test]
    fn test_revisited_cell_is_a_cycle() {
        let mut pf = field(3, 1, true);
        pf.set_cell(1, 0, piece(West, East));
        let mut visited = vec![false; 3];
        assert_eq!(pf.possible_color_in(1, 0, Some(West), &mut visited), Constraint::Free);

        // Entering a cell already on the current walk means the chain loops.
        let mut visited = vec![false, true, false];
        assert_eq!(pf.possible_color_in(1, 0, Some(West), &mut visited), Constraint::Impossible);
    }

    #[test]
    fn test_conflicting_bands_are_impossible() {
        // Red west source <- (0,0) W-E, (1,0) W-E -> green east source.
        let mut pf = field(2, 1, true);
        pf.set_source(Edge::West, 0, ColorSet::RED);
        pf.set_source(Edge::East, 0, ColorSet::GREEN);
        pf.set_cell(0, 0, piece(West, East));
        pf.set_cell(1, 0, piece(West, East));
        pf.check_connections();
        assert!(pf.cells().iter().all(|c| c.light == LightState::Impossible));
    }

    #[test]
    fn test_open_end_stays_free() {
        // Red source feeds a chain that ends next to an empty cell.
        let mut pf = field(3, 1, true);
        pf.set_source(Edge::West, 0, ColorSet::RED);
        pf.set_source(Edge::East, 0, ColorSet::GREEN);
        pf.set_cell(0, 0, piece(West, East));
        assert_eq!(pf.possible_color(0, 0, None), Constraint::Bands(ColorSet::RED));
        pf.check_connections();
        assert!(pf.cell(0, 0).unwrap().light.is_unlit());
    }

    #[test]
    fn test_uncoloured_source_slot_is_impossible() {
        let mut pf = field(1, 1, true);
        pf.set_source(Edge::West, 0, ColorSet::RED);
        pf.set_cell(0, 0, piece(West, North));
        pf.check_connections();
        assert_eq!(pf.cell(0, 0).unwrap().light, LightState::Impossible);
    }

    #[test]
    fn test_analyzer_skipped_without_placing() {
        let mut pf = field(2, 2, false);
        pf.set_cell(0, 0, piece(East, South));
        pf.set_cell(1, 0, piece(West, South));
        pf.set_cell(0, 1, piece(North, East));
        pf.set_cell(1, 1, piece(North, West));
        pf.check_connections();
        assert!(pf.cells().iter().all(|c| c.light.is_unlit()));
    }

    #[test]
    fn test_mark_impossible_stops_at_disconnected_cell() {
        let mut pf = field(3, 1, true);
        pf.set_cell(0, 0, piece(West, East));
        pf.set_cell(1, 0, piece(West, East));
        pf.set_cell(2, 0, piece(North, South));
        pf.mark_impossible(0, 0, None);
        assert_eq!(pf.cell(0, 0).unwrap().light, LightState::Impossible);
        assert_eq!(pf.cell(1, 0).unwrap().light, LightState::Impossible);
        assert!(pf.cell(2, 0).unwrap().light.is_unlit());
    }

    #[test]
    fn test_age_kept_when_light_unchanged() {
        let mut pf = field(2, 1, false);
        pf.set_source(Edge::West, 0, ColorSet::RED);
        pf.set_source(Edge::East, 0, ColorSet::RED);
        pf.set_cell(0, 0, piece(West, East));
        pf.set_cell(1, 0, piece(West, East));
        pf.check_connections();
        pf.cell_mut(0, 0).unwrap().age = 30;
        pf.take_signals();
        pf.check_connections();
        assert_eq!(pf.cell(0, 0).unwrap().age, 30);
        assert!(pf.take_signals().is_empty());
    }
}
