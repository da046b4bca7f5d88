//! Beamtui — route coloured beams through pipe pieces in the terminal.

mod app;
mod audio;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use beamtui::Rules;
use beamtui::playfield::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Options derived from the CLI that the host loop needs.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub rules: Rules,
    pub seed: Option<u64>,
    pub tick_rate: f64,
    pub frame_rate: f64,
    pub animation: bool,
}

impl GameConfig {
    fn from_args(args: &Args) -> Self {
        Self {
            width: args.width,
            height: args.height,
            rules: Rules {
                gravity: args.gravity,
                rotation: args.rotation,
                dragging: args.dragging,
                placing: !args.no_placing,
                place_timer: !args.no_place_timer,
            },
            seed: args.seed,
            tick_rate: args.tick_rate.max(1.0),
            frame_rate: args.frame_rate.max(1.0),
            animation: !args.no_animation,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path, &args.log_level)?;
    }
    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(theme) => theme,
        Err(e) => {
            tracing::warn!(error = %e, "theme not loaded, using defaults");
            theme::Theme::for_palette(args.palette)
        }
    };
    let config = GameConfig::from_args(&args);
    tracing::info!(?config, "starting");
    let mut app = App::new(config, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal belongs to the UI, so logs only go to a file when asked for.
fn init_logging(path: &Path, level: &str) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Beam-routing pipe puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "beamtui",
    version,
    about = "Beam-routing pipe puzzle in the terminal. Join coloured sources with pipe pieces before the board fills up.",
    long_about = "Beamtui is a terminal pipe puzzle.\n\n\
        Coloured sources sit around the board. Place pipe pieces so a chain joins a source to \
        another source carrying the same bands (or more). Lit chains clear after a while and \
        score: one band x1, two bands x2, white x4. Chains that can never be completed turn \
        impossible and cost points when they clear. The round ends when every cell is occupied.\n\n\
        CONTROLS:\n  Arrows / hjkl   Move cursor      Shift+move   Drag (with --dragging)\n  \
        Space / z       Primary action   x            Secondary action\n  \
        Enter           Start round      P            Pause   Q / Esc  Quit\n  \
        F1 / ?          Debug overlay\n\n\
        The primary action drops the next piece, or rotates with --rotation, or swaps with \
        --dragging. Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Playfield width in cells.
    #[arg(long, default_value_t = DEFAULT_WIDTH, value_name = "COLS")]
    pub width: usize,

    /// Playfield height in cells.
    #[arg(long, default_value_t = DEFAULT_HEIGHT, value_name = "ROWS")]
    pub height: usize,

    /// Simulation ticks per second (aging runs once per tick).
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Target render frames per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Seed for the piece generator (random if not set).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Pieces fall to the bottom of their column.
    #[arg(long)]
    pub gravity: bool,

    /// Action buttons rotate the piece under the cursor.
    #[arg(long)]
    pub rotation: bool,

    /// Shift+direction drags pieces; action buttons swap neighbours.
    #[arg(long)]
    pub dragging: bool,

    /// Start from a pre-filled board instead of placing pieces from the queue.
    #[arg(long)]
    pub no_placing: bool,

    /// Never force the next piece onto the board.
    #[arg(long)]
    pub no_place_timer: bool,

    /// Disable the fade when cells clear.
    #[arg(long)]
    pub no_animation: bool,

    /// Write logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log filter (e.g. info, debug, beamtui=trace).
    #[arg(long, default_value = "info", value_name = "FILTER")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
