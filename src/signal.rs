//! Fire-and-forget notifications from the simulation to the audio side.

/// Number of background tracks the host can play.
pub const TRACK_COUNT: usize = 5;

/// Something the player should hear. The simulation never waits on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A cell newly lit with a real colour.
    Activated,
    /// A cell newly marked impossible.
    Bad,
    /// At least one lit cell aged out and scored.
    Clear,
    /// A piece was placed from the upnext queue.
    Drop,
    /// Cursor moved or a cell was rotated/swapped/dragged.
    Scroll,
    /// Start background track `0..TRACK_COUNT`.
    StartTrack(usize),
    /// Stop the running background track and join its player.
    StopTrack,
}

/// Name of a background track as the host's asset layout knows it.
pub fn track_name(index: usize) -> String {
    format!("music/ts{}.xm", index % TRACK_COUNT + 1)
}
