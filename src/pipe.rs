//! Pipe topology and light colours: directions, connection masks, band sets.

use std::fmt;

/// Compass direction on the grid. y grows downward (South), x grows East.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Bit used for this direction inside a [`PipeMask`].
    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Self::North => 0x1,
            Self::East => 0x2,
            Self::South => 0x4,
            Self::West => 0x8,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Quarter turn clockwise: N→E, E→S, S→W, W→N.
    pub const fn cw(self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    pub const fn ccw(self) -> Self {
        match self {
            Self::North => Self::West,
            Self::East => Self::North,
            Self::South => Self::East,
            Self::West => Self::South,
        }
    }

    /// Grid offset (dx, dy) for one step in this direction.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

/// Set of pipe connections on a cell (bits N=1, E=2, S=4, W=8).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PipeMask(u8);

impl PipeMask {
    pub const NONE: Self = Self(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0xF)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mask connecting exactly the two given directions.
    pub const fn pair(a: Direction, b: Direction) -> Self {
        Self(a.bit() | b.bit())
    }

    #[inline]
    pub const fn has(self, dir: Direction) -> bool {
        self.0 & dir.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn without(self, dir: Direction) -> Self {
        Self(self.0 & !dir.bit())
    }

    /// Connected directions in N, E, S, W order.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.has(*d))
    }

    /// The single exit of a pipe entered from `incoming`.
    ///
    /// `None` when the pipe has no `incoming` connection, or when removing it
    /// does not leave exactly one connection (dead end or malformed mask).
    pub fn through(self, incoming: Direction) -> Option<Direction> {
        if !self.has(incoming) {
            return None;
        }
        let rest = self.without(incoming);
        if rest.count() != 1 {
            return None;
        }
        rest.directions().next()
    }

    pub fn rotated_cw(self) -> Self {
        self.directions().fold(Self::NONE, |acc, d| Self(acc.0 | d.cw().bit()))
    }

    pub fn rotated_ccw(self) -> Self {
        self.directions().fold(Self::NONE, |acc, d| Self(acc.0 | d.ccw().bit()))
    }

    /// True for a straight-through piece (N+S or E+W).
    pub fn is_straight(self) -> bool {
        self == Self::pair(Direction::North, Direction::South)
            || self == Self::pair(Direction::East, Direction::West)
    }
}

impl fmt::Debug for PipeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters: String = self
            .directions()
            .map(|d| match d {
                Direction::North => 'N',
                Direction::East => 'E',
                Direction::South => 'S',
                Direction::West => 'W',
            })
            .collect();
        write!(f, "PipeMask({letters})")
    }
}

/// Set of colour bands (Red=1, Green=2, Blue=4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorSet(u8);

impl ColorSet {
    pub const NONE: Self = Self(0);
    pub const RED: Self = Self(0x1);
    pub const GREEN: Self = Self(0x2);
    pub const BLUE: Self = Self(0x4);
    pub const YELLOW: Self = Self(0x1 | 0x2);
    pub const MAGENTA: Self = Self(0x1 | 0x4);
    pub const CYAN: Self = Self(0x2 | 0x4);
    pub const WHITE: Self = Self(0x7);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every band of `self` is present in `other`.
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & other.0 == self.0
    }

    pub const fn band_count(self) -> u32 {
        self.0.count_ones()
    }

    /// Clear-score multiplier: one band ×1, two bands ×2, white ×4.
    pub const fn multiplier(self) -> u32 {
        match self.band_count() {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        }
    }
}

impl fmt::Debug for ColorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::NONE => "none",
            Self::RED => "red",
            Self::GREEN => "green",
            Self::BLUE => "blue",
            Self::YELLOW => "yellow",
            Self::MAGENTA => "magenta",
            Self::CYAN => "cyan",
            _ => "white",
        };
        write!(f, "ColorSet({name})")
    }
}

/// Light state of a cell after the solvers ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightState {
    #[default]
    Unlit,
    Lit(ColorSet),
    /// The chain can never be satisfied (loop or conflicting bands).
    Impossible,
}

impl LightState {
    pub const fn is_unlit(self) -> bool {
        matches!(self, Self::Unlit)
    }
}

/// Cosmetic block variant; no gameplay effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Purple,
    Orange,
    Blue,
    Green,
    Gray,
}

impl BlockKind {
    /// Variants the spawn generator picks from (gray is never generated).
    pub const SPAWNABLE: [Self; 4] = [Self::Purple, Self::Orange, Self::Blue, Self::Green];
}
