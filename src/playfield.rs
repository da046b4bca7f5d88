//! Playfield: interior cells, edge sources, upnext queue, cursor, score and the
//! Idle/Running lifecycle.
//!
//! Coordinates are (x, y) with (0, 0) at the top-left; cells are stored
//! row-major. Sources sit outside the grid, one per border slot:
//! `2 * (width + height)` in total.

use crate::cursor::Intent;
use crate::error::{MAX_SIDE, PlayfieldError};
use crate::pipe::{BlockKind, ColorSet, Direction, LightState, PipeMask};
use crate::signal::{Signal, TRACK_COUNT};
use crate::spawn::Spawner;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_WIDTH: usize = 9;
pub const DEFAULT_HEIGHT: usize = 11;

/// Pieces waiting to be placed.
pub const UPNEXT_LEN: usize = 5;

/// Time allowed to place the head piece before it is dropped for the player.
pub const PLACE_TIME: Duration = Duration::from_secs(5);

/// Chance per cell of a pre-placed piece when the placing rule is off.
const PREFILL_CHANCE: f64 = 0.75;

/// One grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// `None` means the cell is empty.
    pub block: Option<BlockKind>,
    pub pipe: PipeMask,
    pub light: LightState,
    /// Ticks since `light` last changed.
    pub age: u32,
}

impl Cell {
    pub const EMPTY: Self = Self {
        block: None,
        pipe: PipeMask::NONE,
        light: LightState::Unlit,
        age: 0,
    };

    /// An unlit piece.
    pub const fn piece(block: BlockKind, pipe: PipeMask) -> Self {
        Self {
            block: Some(block),
            pipe,
            light: LightState::Unlit,
            age: 0,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.block.is_none()
    }
}

/// Border a source sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    West,
    East,
    South,
    North,
}

/// A coloured emitter on the border. `index` is the row for West/East and the
/// column for South/North.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub edge: Edge,
    pub index: usize,
    pub color: ColorSet,
}

/// Rule switches, fixed for the lifetime of a playfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    /// Compact columns after every edit and aging pass.
    pub gravity: bool,
    /// Action buttons rotate the cell under the cursor.
    pub rotation: bool,
    /// Drag modifier and swap buttons are active.
    pub dragging: bool,
    /// Pieces come from the upnext queue; unlit chains are checked for impossibility.
    pub placing: bool,
    /// The head piece is forced onto the board when the placement timer runs out.
    pub place_timer: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            gravity: false,
            rotation: false,
            dragging: false,
            placing: true,
            place_timer: true,
        }
    }
}

/// Where one step from a cell leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Cell(usize, usize),
    /// Off the grid: colour of the source on that border slot.
    Edge(ColorSet),
}

#[derive(Debug, Clone)]
pub struct Playfield {
    width: usize,
    height: usize,
    pub(crate) cells: Vec<Cell>,
    /// Layout: West rows, East rows, South columns, North columns.
    pub(crate) sources: Vec<ColorSet>,
    pub(crate) upnext: [Cell; UPNEXT_LEN],
    pub(crate) cursor: (usize, usize),
    pub(crate) score: u32,
    pub(crate) running: bool,
    pub(crate) time_left: Duration,
    pub(crate) rules: Rules,
    pub(crate) spawner: Spawner,
    pub(crate) signals: Vec<Signal>,
    pub(crate) last_cleared: Vec<(usize, usize)>,
    track: Option<usize>,
}

impl Playfield {
    /// Empty board with no sources, seeded from the OS.
    pub fn new(width: usize, height: usize, rules: Rules) -> Result<Self, PlayfieldError> {
        Self::with_seed(width, height, rules, rand::random())
    }

    /// Empty board with a deterministic piece generator.
    pub fn with_seed(
        width: usize,
        height: usize,
        rules: Rules,
        seed: u64,
    ) -> Result<Self, PlayfieldError> {
        if width == 0 || height == 0 || width > MAX_SIDE || height > MAX_SIDE {
            return Err(PlayfieldError::InvalidDimensions { width, height });
        }
        let mut cells = Vec::new();
        cells.try_reserve_exact(width * height)?;
        cells.resize(width * height, Cell::EMPTY);

        let mut sources = Vec::new();
        sources.try_reserve_exact(2 * (width + height))?;
        sources.resize(2 * (width + height), ColorSet::NONE);

        let mut signals = Vec::new();
        signals.try_reserve(16)?;
        let mut last_cleared = Vec::new();
        last_cleared.try_reserve(width * height)?;

        Ok(Self {
            width,
            height,
            cells,
            sources,
            upnext: [Cell::EMPTY; UPNEXT_LEN],
            cursor: (width / 2, height / 2),
            score: 0,
            running: false,
            time_left: PLACE_TIME,
            rules,
            spawner: Spawner::new(seed),
            signals,
            last_cleared,
            track: None,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    #[inline]
    pub(crate) fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    pub(crate) fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        self.index(x, y).map(|i| &mut self.cells[i])
    }

    /// Overwrite a cell. Empty cells are normalised to [`Cell::EMPTY`]; pieces
    /// with more than two connections are rejected so chains never branch.
    /// Returns whether the cell was written. Does not recheck connections.
    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) -> bool {
        if cell.block.is_some() && cell.pipe.count() > 2 {
            return false;
        }
        let cell = if cell.is_empty() { Cell::EMPTY } else { cell };
        match self.cell_mut(x, y) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn source_slot(&self, edge: Edge, index: usize) -> Option<usize> {
        let (w, h) = (self.width, self.height);
        match edge {
            Edge::West if index < h => Some(index),
            Edge::East if index < h => Some(h + index),
            Edge::South if index < w => Some(2 * h + index),
            Edge::North if index < w => Some(2 * h + w + index),
            _ => None,
        }
    }

    /// Source colour on a border slot; `NONE` when out of range.
    pub fn source(&self, edge: Edge, index: usize) -> ColorSet {
        self.source_slot(edge, index)
            .map_or(ColorSet::NONE, |i| self.sources[i])
    }

    pub fn set_source(&mut self, edge: Edge, index: usize, color: ColorSet) -> bool {
        match self.source_slot(edge, index) {
            Some(i) => {
                self.sources[i] = color;
                true
            }
            None => false,
        }
    }

    /// Every border slot, including uncoloured ones.
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        let rows = (0..self.height).flat_map(|i| [(Edge::West, i), (Edge::East, i)]);
        let cols = (0..self.width).flat_map(|i| [(Edge::South, i), (Edge::North, i)]);
        rows.chain(cols).map(|(edge, index)| Source {
            edge,
            index,
            color: self.source(edge, index),
        })
    }

    /// Neighbour of (x, y) in `dir`, or the source beyond the border.
    pub(crate) fn step_from(&self, x: usize, y: usize, dir: Direction) -> Step {
        match dir {
            Direction::North if y == 0 => Step::Edge(self.source(Edge::North, x)),
            Direction::South if y + 1 == self.height => Step::Edge(self.source(Edge::South, x)),
            Direction::East if x + 1 == self.width => Step::Edge(self.source(Edge::East, y)),
            Direction::West if x == 0 => Step::Edge(self.source(Edge::West, y)),
            Direction::North => Step::Cell(x, y - 1),
            Direction::South => Step::Cell(x, y + 1),
            Direction::East => Step::Cell(x + 1, y),
            Direction::West => Step::Cell(x - 1, y),
        }
    }

    pub fn upnext(&self) -> &[Cell; UPNEXT_LEN] {
        &self.upnext
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    /// Preview of the head piece at the cursor, when a drop there would succeed.
    pub fn ghost(&self) -> Option<Cell> {
        let (x, y) = self.cursor;
        let under = self.cell(x, y)?;
        let head = self.upnext[0];
        (self.rules.placing && under.is_empty() && !head.is_empty()).then_some(head)
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Remaining placement time (meaningful only with the placement timer rule).
    pub fn time_left(&self) -> Duration {
        self.time_left
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Cells cleared by the most recent aging pass.
    pub fn last_cleared(&self) -> &[(usize, usize)] {
        &self.last_cleared
    }

    /// Drain pending signals for the audio side.
    pub fn take_signals(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.signals)
    }

    pub(crate) fn signal(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_empty()).count()
    }

    /// Every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| !c.is_empty())
    }

    /// Stop the round if the board filled up. Returns whether it is still running.
    pub fn update_running(&mut self) -> bool {
        if self.running && self.is_full() {
            info!(score = self.score, "board full, round over");
            self.stop();
        }
        self.running
    }

    /// Start a round: clear the board, lay out sources, seed the queue, zero the score.
    pub fn run(&mut self) {
        self.cells.fill(Cell::EMPTY);
        self.sources.fill(ColorSet::NONE);
        self.upnext = [Cell::EMPTY; UPNEXT_LEN];
        self.last_cleared.clear();
        self.layout_sources();

        if self.rules.placing {
            self.refill_upnext();
        } else {
            self.prefill(PREFILL_CHANCE);
        }
        self.settle();

        self.score = 0;
        self.running = true;

        let track = self.spawner.pick(TRACK_COUNT);
        self.track = Some(track);
        self.signal(Signal::StartTrack(track));
        info!(
            width = self.width,
            height = self.height,
            rules = ?self.rules,
            track,
            "round started"
        );
    }

    /// Stop the round (board full or host request). The board is left as is.
    pub fn stop(&mut self) {
        if self.running {
            info!(score = self.score, "round stopped");
        }
        self.running = false;
        if self.track.take().is_some() {
            self.signal(Signal::StopTrack);
        }
    }

    /// One simulation tick.
    ///
    /// While running: apply `intents` in order, force a placement if the
    /// timer expired, age the board and count down the placement timer by
    /// `elapsed`. While idle only [`Intent::Start`] is honoured.
    pub fn step(&mut self, intents: &[Intent], elapsed: Duration) {
        if self.update_running() {
            for intent in intents {
                self.apply(*intent);
            }
            if self.rules.placing {
                self.drop_anywhere();
            }
        } else if intents.contains(&Intent::Start) {
            self.run();
        }

        if self.update_running() {
            self.advance_age();
            if self.rules.placing {
                self.decrease_place_time(elapsed);
            }
        }
    }

    /// Recompute lighting after an edit: compact first under gravity.
    pub(crate) fn settle(&mut self) {
        if self.rules.gravity {
            self.apply_gravity();
        } else {
            self.check_connections();
        }
    }

    /// Single-band sources on odd rows of the side edges (R, G, B mirrored),
    /// mixed-band sources on odd columns of the bottom and top edges.
    fn layout_sources(&mut self) {
        const PRIMARY: [ColorSet; 3] = [ColorSet::RED, ColorSet::GREEN, ColorSet::BLUE];
        const MIXED: [ColorSet; 4] = [
            ColorSet::CYAN,
            ColorSet::MAGENTA,
            ColorSet::YELLOW,
            ColorSet::WHITE,
        ];

        let rows = self.height / 2;
        for k in 0..rows {
            let color = PRIMARY[k.min(rows - 1 - k) % PRIMARY.len()];
            let y = 2 * k + 1;
            self.set_source(Edge::West, y, color);
            self.set_source(Edge::East, y, color);
        }

        let cols = self.width / 2;
        for k in 0..cols {
            let x = 2 * k + 1;
            self.set_source(Edge::South, x, MIXED[k % MIXED.len()]);
            self.set_source(Edge::North, x, MIXED[(cols - 1 - k) % MIXED.len()]);
        }
    }

    fn prefill(&mut self, chance: f64) {
        for i in 0..self.cells.len() {
            if self.spawner.chance(chance) {
                self.cells[i] = self.spawner.generate_cell();
            }
        }
    }
}
