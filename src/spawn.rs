//! Piece generator and upnext refill.

use crate::pipe::{BlockKind, Direction, PipeMask};
use crate::playfield::{Cell, PLACE_TIME, Playfield};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Random source for pieces and forced placements.
#[derive(Debug, Clone)]
pub struct Spawner {
    rng: ChaCha8Rng,
    /// Added to the first pipe direction so consecutive pieces don't repeat the same corner.
    salt: usize,
}

impl Spawner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            salt: 0,
        }
    }

    /// A fresh piece: random cosmetic block, elbow (2 in 3) or straight (1 in 3) pipe.
    pub fn generate_cell(&mut self) -> Cell {
        let block = BlockKind::SPAWNABLE[self.rng.gen_range(0..BlockKind::SPAWNABLE.len())];

        let first = self.rng.gen_range(0..4) + self.salt;
        let offset = if self.rng.gen_range(0..3) == 0 { 2 } else { 1 };
        let pipe = PipeMask::pair(Direction::ALL[first % 4], Direction::ALL[(first + offset) % 4]);
        self.salt = self.salt.wrapping_add(1);

        Cell::piece(block, pipe)
    }

    /// Uniform index in `0..n`; `n` must be non-zero.
    pub fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }
}

impl Playfield {
    /// Generate a piece for every empty queue slot and restart the placement timer.
    pub fn refill_upnext(&mut self) {
        for slot in &mut self.upnext {
            if slot.is_empty() {
                *slot = self.spawner.generate_cell();
                trace!(pipe = ?slot.pipe, "queued piece");
            }
        }
        if self.rules.place_timer {
            self.time_left = PLACE_TIME;
        }
    }
}
