//! Cursor movement and the edits made at the cursor.
//!
//! Every edit is applied atomically within one tick and followed by a
//! connectivity recheck (compacting first when gravity is on).

use crate::pipe::Direction;
use crate::playfield::{Cell, Playfield, Rules, UPNEXT_LEN};
use crate::signal::Signal;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Cw,
    Ccw,
}

/// Which pair of neighbours a swap exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Left and right of the cursor.
    Horizontal,
    /// Above and below the cursor.
    Vertical,
}

/// One player request, queued by the host and applied on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Move(Direction),
    /// Move while carrying the piece under the cursor.
    Drag(Direction),
    Rotate(Turn),
    Swap(Axis),
    /// Place the head of the upnext queue at the cursor.
    Drop,
    /// Start a round; ignored while one is running.
    Start,
}

impl Rules {
    /// What the primary action button does under these rules.
    pub fn primary_action(self) -> Option<Intent> {
        if self.rotation {
            Some(Intent::Rotate(Turn::Ccw))
        } else if self.dragging {
            Some(Intent::Swap(Axis::Horizontal))
        } else if self.placing {
            Some(Intent::Drop)
        } else {
            None
        }
    }

    pub fn secondary_action(self) -> Option<Intent> {
        if self.rotation {
            Some(Intent::Rotate(Turn::Cw))
        } else if self.dragging {
            Some(Intent::Swap(Axis::Vertical))
        } else {
            None
        }
    }

    /// A directional press: a drag when the modifier is held and dragging is allowed.
    pub fn direction_action(self, dir: Direction, modifier: bool) -> Intent {
        if modifier && self.dragging {
            Intent::Drag(dir)
        } else {
            Intent::Move(dir)
        }
    }
}

impl Playfield {
    pub fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::Move(dir) => self.move_cursor(dir),
            Intent::Drag(dir) => self.drag(dir),
            Intent::Rotate(turn) => self.rotate(turn),
            Intent::Swap(axis) => self.swap(axis),
            Intent::Drop => {
                self.drop_piece();
            }
            Intent::Start => {}
        }
    }

    /// Cursor position one step in `dir`, if that stays on the board.
    fn neighbour(&self, (x, y): (usize, usize), dir: Direction) -> Option<(usize, usize)> {
        let (dx, dy) = dir.offset();
        let nx = x.checked_add_signed(dx as isize)?;
        let ny = y.checked_add_signed(dy as isize)?;
        (nx < self.width() && ny < self.height()).then_some((nx, ny))
    }

    fn occupied(&self, x: usize, y: usize) -> bool {
        self.cell(x, y).is_some_and(|c| !c.is_empty())
    }

    fn swap_cells(&mut self, a: (usize, usize), b: (usize, usize)) {
        if let (Some(i), Some(j)) = (self.index(a.0, a.1), self.index(b.0, b.1)) {
            self.cells.swap(i, j);
        }
    }

    /// Move the cursor one cell, stopping at the border. No recheck.
    pub fn move_cursor(&mut self, dir: Direction) {
        if let Some(next) = self.neighbour(self.cursor, dir) {
            self.cursor = next;
            self.signal(Signal::Scroll);
        }
    }

    /// Rotate the piece under the cursor; empty cells are left alone.
    pub fn rotate(&mut self, turn: Turn) {
        let (x, y) = self.cursor;
        if let Some(cell) = self.cell_mut(x, y) {
            if !cell.is_empty() {
                cell.pipe = match turn {
                    Turn::Cw => cell.pipe.rotated_cw(),
                    Turn::Ccw => cell.pipe.rotated_ccw(),
                };
                self.signal(Signal::Scroll);
            }
        }
        self.check_connections();
    }

    /// Exchange the two cells on either side of the cursor along `axis`.
    /// Needs both to exist and be occupied.
    pub fn swap(&mut self, axis: Axis) {
        let (before, after) = match axis {
            Axis::Horizontal => (Direction::West, Direction::East),
            Axis::Vertical => (Direction::North, Direction::South),
        };
        let pair = self
            .neighbour(self.cursor, before)
            .zip(self.neighbour(self.cursor, after));
        if let Some((a, b)) = pair {
            if self.occupied(a.0, a.1) && self.occupied(b.0, b.1) {
                self.swap_cells(a, b);
                self.signal(Signal::Scroll);
            }
        }
        self.check_connections();
    }

    /// Carry the piece under the cursor one cell in `dir`.
    ///
    /// Vertically, and horizontally without gravity, the neighbour must be
    /// occupied and the two trade places. With gravity a horizontal drag may
    /// also move into an empty column slot; the cursor then follows the piece
    /// down to where it will land.
    pub fn drag(&mut self, dir: Direction) {
        let from = self.cursor;
        if let Some(to) = self.neighbour(from, dir) {
            if self.occupied(from.0, from.1) {
                let horizontal = matches!(dir, Direction::East | Direction::West);
                if self.occupied(to.0, to.1) {
                    self.swap_cells(from, to);
                    self.cursor = to;
                    self.signal(Signal::Scroll);
                } else if horizontal && self.rules.gravity {
                    self.swap_cells(from, to);
                    let (x, mut y) = to;
                    while y + 1 < self.height() && !self.occupied(x, y + 1) {
                        y += 1;
                    }
                    self.cursor = (x, y);
                    self.signal(Signal::Scroll);
                }
            }
        }
        self.settle();
    }

    /// Take the head of the queue off and refill the tail.
    fn pop_upnext(&mut self) -> Cell {
        let head = self.upnext[0];
        self.upnext.rotate_left(1);
        self.upnext[UPNEXT_LEN - 1] = Cell::EMPTY;
        self.refill_upnext();
        head
    }

    /// Place the head piece at the cursor when that cell is empty. Returns
    /// whether a piece was placed. The board is settled either way.
    pub fn drop_piece(&mut self) -> bool {
        let (x, y) = self.cursor;
        let placed = self.place_head(x, y);
        self.settle();
        placed
    }

    fn place_head(&mut self, x: usize, y: usize) -> bool {
        let free = self.cell(x, y).is_some_and(Cell::is_empty);
        if !free || self.upnext[0].is_empty() {
            return false;
        }
        let head = self.pop_upnext();
        self.set_cell(x, y, head);
        self.signal(Signal::Drop);
        debug!(x, y, pipe = ?head.pipe, "piece placed");
        true
    }

    /// Forced placement once the placement timer has run out: at the cursor
    /// if possible, otherwise on a random empty cell.
    pub fn drop_anywhere(&mut self) {
        if !self.rules.place_timer || !self.time_left.is_zero() || self.upnext[0].is_empty() {
            return;
        }
        if self.drop_piece() {
            return;
        }

        let empty: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.is_empty().then_some(i))
            .collect();
        if empty.is_empty() {
            return;
        }
        let i = empty[self.spawner.pick(empty.len())];
        let (x, y) = (i % self.width(), i / self.width());
        debug!(x, y, "placement timer expired, forcing drop");
        self.place_head(x, y);
        self.settle();
    }

    /// Count the placement timer down by `elapsed`, stopping at zero.
    pub fn decrease_place_time(&mut self, elapsed: Duration) {
        if self.rules.place_timer {
            self.time_left = self.time_left.saturating_sub(elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{BlockKind, PipeMask};
    use crate::playfield::PLACE_TIME;
    use Direction::{East, North, South, West};

    fn piece(kind: BlockKind, a: Direction, b: Direction) -> Cell {
        Cell::piece(kind, PipeMask::pair(a, b))
    }

    fn field(w: usize, h: usize, rules: Rules) -> Playfield {
        Playfield::with_seed(w, h, rules, 21).unwrap()
    }

    #[test]
    fn test_move_clamps_at_border() {
        let mut pf = field(3, 3, Rules::default());
        pf.move_cursor(North);
        pf.move_cursor(North);
        assert_eq!(pf.cursor(), (1, 0));
        assert_eq!(pf.take_signals(), vec![Signal::Scroll]);
        pf.move_cursor(West);
        pf.move_cursor(West);
        assert_eq!(pf.cursor(), (0, 0));
    }

    #[test]
    fn test_rotate_four_times_is_identity() {
        let mut pf = field(3, 3, Rules::default());
        let start = piece(BlockKind::Green, North, East);
        pf.set_cell(1, 1, start);
        for _ in 0..4 {
            pf.rotate(Turn::Cw);
        }
        assert_eq!(pf.cell(1, 1).unwrap().pipe, start.pipe);
        pf.rotate(Turn::Cw);
        assert_eq!(pf.cell(1, 1).unwrap().pipe, PipeMask::pair(East, South));
        pf.rotate(Turn::Ccw);
        assert_eq!(pf.cell(1, 1).unwrap().pipe, start.pipe);
    }

    #[test]
    fn test_rotate_empty_cell_is_noop() {
        let mut pf = field(3, 3, Rules::default());
        pf.rotate(Turn::Ccw);
        assert!(pf.cell(1, 1).unwrap().is_empty());
        assert!(pf.take_signals().is_empty());
    }

    #[test]
    fn test_swap_needs_both_sides() {
        let mut pf = field(3, 3, Rules::default());
        let a = piece(BlockKind::Purple, North, South);
        let b = piece(BlockKind::Orange, East, West);
        pf.set_cell(0, 1, a);
        pf.swap(Axis::Horizontal);
        assert_eq!(pf.cell(0, 1).unwrap().block, Some(BlockKind::Purple));

        pf.set_cell(2, 1, b);
        pf.swap(Axis::Horizontal);
        assert_eq!(pf.cell(0, 1).unwrap().block, Some(BlockKind::Orange));
        assert_eq!(pf.cell(2, 1).unwrap().block, Some(BlockKind::Purple));
        assert!(pf.cell(1, 1).unwrap().is_empty());
    }

    #[test]
    fn test_swap_at_border_is_noop() {
        let mut pf = field(3, 3, Rules::default());
        pf.cursor = (1, 0);
        pf.set_cell(1, 1, piece(BlockKind::Blue, North, South));
        pf.swap(Axis::Vertical);
        assert_eq!(pf.cell(1, 1).unwrap().block, Some(BlockKind::Blue));
    }

    #[test]
    fn test_drag_swaps_with_occupied_neighbour() {
        let mut pf = field(3, 3, Rules::default());
        pf.set_cell(1, 1, piece(BlockKind::Green, North, South));
        pf.set_cell(2, 1, piece(BlockKind::Blue, East, West));
        pf.drag(East);
        assert_eq!(pf.cursor(), (2, 1));
        assert_eq!(pf.cell(2, 1).unwrap().block, Some(BlockKind::Green));
        assert_eq!(pf.cell(1, 1).unwrap().block, Some(BlockKind::Blue));
    }

    #[test]
    fn test_drag_into_empty_without_gravity_is_noop() {
        let mut pf = field(3, 3, Rules::default());
        pf.set_cell(1, 1, piece(BlockKind::Green, North, South));
        pf.drag(West);
        assert_eq!(pf.cursor(), (1, 1));
        assert_eq!(pf.cell(1, 1).unwrap().block, Some(BlockKind::Green));
    }

    #[test]
    fn test_drag_with_gravity_falls() {
        let rules = Rules {
            gravity: true,
            dragging: true,
            ..Rules::default()
        };
        let mut pf = field(2, 3, rules);
        pf.set_cell(0, 2, piece(BlockKind::Orange, North, South));
        pf.set_cell(0, 1, piece(BlockKind::Purple, East, West));
        pf.cursor = (0, 1);
        pf.drag(East);
        assert_eq!(pf.cursor(), (1, 2));
        assert_eq!(pf.cell(1, 2).unwrap().block, Some(BlockKind::Purple));
        assert!(pf.cell(0, 1).unwrap().is_empty());
    }

    #[test]
    fn test_drop_shifts_queue() {
        let mut pf = field(3, 3, Rules::default());
        pf.refill_upnext();
        let before = *pf.upnext();
        assert!(pf.drop_piece());
        let placed = *pf.cell(1, 1).unwrap();
        assert_eq!(placed.block, before[0].block);
        assert_eq!(placed.pipe, before[0].pipe);
        assert_eq!(pf.upnext()[..UPNEXT_LEN - 1], before[1..]);
        assert!(pf.upnext().iter().all(|c| !c.is_empty()));
        assert!(pf.take_signals().contains(&Signal::Drop));

        // Occupied now: nothing more happens.
        assert!(!pf.drop_piece());
    }

    #[test]
    fn test_drop_anywhere_waits_for_timer() {
        let mut pf = field(3, 3, Rules::default());
        pf.refill_upnext();
        pf.drop_anywhere();
        assert_eq!(pf.empty_count(), 9);

        pf.decrease_place_time(PLACE_TIME + Duration::from_secs(1));
        assert_eq!(pf.time_left(), Duration::ZERO);
        pf.drop_anywhere();
        assert_eq!(pf.empty_count(), 8);
        assert!(!pf.cell(1, 1).unwrap().is_empty());
        assert_eq!(pf.time_left(), PLACE_TIME);
    }

    #[test]
    fn test_drop_anywhere_picks_empty_cell() {
        let mut pf = field(2, 2, Rules::default());
        pf.refill_upnext();
        pf.cursor = (0, 0);
        pf.set_cell(0, 0, piece(BlockKind::Gray, North, South));
        pf.time_left = Duration::ZERO;
        pf.drop_anywhere();
        assert_eq!(pf.empty_count(), 2);
        assert_eq!(pf.cell(0, 0).unwrap().block, Some(BlockKind::Gray));
    }

    #[test]
    fn test_timer_ignored_without_rule() {
        let rules = Rules {
            place_timer: false,
            ..Rules::default()
        };
        let mut pf = field(2, 2, rules);
        pf.refill_upnext();
        pf.time_left = Duration::ZERO;
        pf.drop_anywhere();
        assert_eq!(pf.empty_count(), 4);
        pf.time_left = PLACE_TIME;
        pf.decrease_place_time(Duration::from_secs(1));
        assert_eq!(pf.time_left(), PLACE_TIME);
    }

    #[test]
    fn test_button_mapping_follows_rules() {
        let rules = Rules::default();
        assert_eq!(rules.primary_action(), Some(Intent::Drop));
        assert_eq!(rules.secondary_action(), None);
        assert_eq!(rules.direction_action(East, true), Intent::Move(East));

        let rotating = Rules { rotation: true, ..rules };
        assert_eq!(rotating.primary_action(), Some(Intent::Rotate(Turn::Ccw)));
        assert_eq!(rotating.secondary_action(), Some(Intent::Rotate(Turn::Cw)));

        let dragging = Rules { dragging: true, ..rules };
        assert_eq!(dragging.primary_action(), Some(Intent::Swap(Axis::Horizontal)));
        assert_eq!(dragging.direction_action(North, true), Intent::Drag(North));
    }
}
