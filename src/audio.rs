//! Sound sink for the terminal host.
//!
//! A terminal has no mixer, so sound effects are only logged; the selected
//! background track is kept so the sidebar can show what would be playing.
//! Nothing here feeds back into the simulation.

use beamtui::Signal;
use beamtui::signal::track_name;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Audio {
    track: Option<String>,
    /// Most recent sound effect, for the debug overlay.
    last_effect: Option<Signal>,
    effects_played: u64,
}

impl Audio {
    pub fn play(&mut self, signal: Signal) {
        match signal {
            Signal::StartTrack(index) => {
                let name = track_name(index);
                debug!(track = %name, "start track");
                self.track = Some(name);
            }
            Signal::StopTrack => {
                if let Some(name) = self.track.take() {
                    debug!(track = %name, "stop track");
                }
            }
            effect => {
                debug!(sound = ?effect, "play sound");
                self.last_effect = Some(effect);
                self.effects_played += 1;
            }
        }
    }

    pub fn play_all(&mut self, signals: impl IntoIterator<Item = Signal>) {
        for signal in signals {
            self.play(signal);
        }
    }

    pub fn track(&self) -> Option<&str> {
        self.track.as_deref()
    }

    pub fn last_effect(&self) -> Option<Signal> {
        self.last_effect
    }

    pub fn effects_played(&self) -> u64 {
        self.effects_played
    }
}
