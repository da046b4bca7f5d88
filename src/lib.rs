//! Beamtui core: the playfield simulation of a beam-routing pipe puzzle.
//!
//! Coloured sources sit on the border of a grid. The player places, rotates
//! and moves two-connection pipe pieces so that chains join compatible
//! sources; joined chains light up, age, and clear for points. Chains that
//! can never be completed are flagged impossible and cost points.
//!
//! The core is single-owner and frame-locked: the host feeds
//! [`Playfield::step`] a list of [`Intent`]s once per tick, then reads the
//! board back for rendering and drains [`Signal`]s for audio.

pub mod cursor;
pub mod error;
pub mod gravity;
pub mod pipe;
pub mod playfield;
pub mod scoring;
pub mod signal;
pub mod solver;
pub mod spawn;

pub use cursor::{Axis, Intent, Turn};
pub use error::PlayfieldError;
pub use pipe::{BlockKind, ColorSet, Direction, LightState, PipeMask};
pub use playfield::{Cell, Edge, Playfield, Rules, Source};
pub use signal::Signal;
pub use solver::Constraint;
