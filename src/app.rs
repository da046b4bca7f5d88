//! App: terminal init, main loop, tick and key handling.

use crate::GameConfig;
use crate::audio::Audio;
use crate::input::{Action, Button, InputTracker, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, View};
use anyhow::{Context, Result};
use beamtui::{Playfield, Signal};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;
use tracing::{debug, info};

/// Longest gap a single tick will account for (e.g. after a stall).
const MAX_TICK_CATCHUP: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    EndRound,
    Exit,
}

impl QuitOption {
    const fn next(self) -> Self {
        match self {
            Self::Resume => Self::EndRound,
            Self::EndRound => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    const fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::EndRound => Self::Resume,
            Self::Exit => Self::EndRound,
        }
    }
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    playfield: Playfield,
    audio: Audio,
    input: InputTracker,
    screen: Screen,
    paused: bool,
    show_debug: bool,
    quit_selected: QuitOption,
    rounds: u32,
    ticks: u64,
    last_tick: Instant,
    /// Cells whose clear is being animated.
    clear_cells: Vec<(usize, usize)>,
    /// TachyonFX fade for `clear_cells` (created on first draw).
    clear_effect: Option<Effect>,
    clear_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let playfield = match config.seed {
            Some(seed) => Playfield::with_seed(config.width, config.height, config.rules, seed),
            None => Playfield::new(config.width, config.height, config.rules),
        }
        .context("creating playfield")?;
        Ok(Self {
            config,
            theme,
            playfield,
            audio: Audio::default(),
            input: InputTracker::default(),
            screen: Screen::Playing,
            paused: false,
            show_debug: false,
            quit_selected: QuitOption::Resume,
            rounds: 0,
            ticks: 0,
            last_tick: Instant::now(),
            clear_cells: Vec::new(),
            clear_effect: None,
            clear_effect_process_time: None,
        })
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.tick_rate)
    }

    /// One simulation step, if a tick is due.
    fn tick(&mut self) {
        let interval = self.tick_interval();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_tick);
        if elapsed < interval {
            return;
        }
        self.last_tick = now;
        self.ticks += 1;

        let snapshot = self.input.snapshot(now);
        if snapshot.pressed.contains(Button::Service) {
            self.show_debug = !self.show_debug;
        }
        let intents = snapshot.intents(self.playfield.rules());
        if !intents.is_empty() {
            debug!(?intents, "tick input");
        }
        self.playfield.step(&intents, elapsed.min(interval * MAX_TICK_CATCHUP));

        let signals = self.playfield.take_signals();
        if signals.iter().any(|s| matches!(s, Signal::StartTrack(_))) {
            self.rounds += 1;
            self.clear_animation();
        }
        if signals.contains(&Signal::StopTrack) {
            info!(score = self.playfield.score(), rounds = self.rounds, "round over");
        }
        self.audio.play_all(signals);

        if self.config.animation && !self.playfield.last_cleared().is_empty() {
            self.clear_cells = self.playfield.last_cleared().to_vec();
            self.clear_effect = None;
            self.clear_effect_process_time = None;
        }
    }

    fn clear_animation(&mut self) {
        self.clear_cells.clear();
        self.clear_effect = None;
        self.clear_effect_process_time = None;
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.input.clear();
        // Time spent paused must not count against the placement timer.
        self.last_tick = Instant::now();
    }

    /// Handle one key event. Returns false when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.screen {
            Screen::Playing => {
                let action = self.input.key_event(key, Instant::now());
                match action {
                    Action::Quit => {
                        self.screen = Screen::QuitMenu;
                        self.quit_selected = QuitOption::Resume;
                        self.input.clear();
                    }
                    Action::Pause if self.playfield.is_running() => self.set_paused(!self.paused),
                    _ => {}
                }
            }
            Screen::QuitMenu => {
                if key.kind != KeyEventKind::Press {
                    return true;
                }
                match key_to_action(key) {
                    Action::Button(Button::Down | Button::Right) => {
                        self.quit_selected = self.quit_selected.next();
                    }
                    Action::Button(Button::Up | Button::Left) => {
                        self.quit_selected = self.quit_selected.prev();
                    }
                    Action::Button(Button::Primary | Button::Start) => match self.quit_selected {
                        QuitOption::Resume => self.screen = Screen::Playing,
                        QuitOption::EndRound => {
                            self.playfield.stop();
                            self.audio.play_all(self.playfield.take_signals());
                            self.set_paused(false);
                            self.screen = Screen::Playing;
                        }
                        QuitOption::Exit => return false,
                    },
                    Action::Pause | Action::Quit => self.screen = Screen::Playing,
                    _ => {}
                }
                self.last_tick = Instant::now();
            }
        }
        true
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let held directions repeat on our own timer.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        if self.playfield.is_running() {
            self.playfield.stop();
            self.audio.play_all(self.playfield.take_signals());
        }
        info!(rounds = self.rounds, score = self.playfield.score(), "exiting");
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.config.frame_rate);
        loop {
            let now = Instant::now();
            let view = View {
                playfield: &self.playfield,
                theme: &self.theme,
                audio: &self.audio,
                screen: self.screen,
                paused: self.paused,
                quit_selected: self.quit_selected,
                show_debug: self.show_debug,
                rounds: self.rounds,
                ticks: self.ticks,
                clear_cells: &self.clear_cells,
                animation: self.config.animation,
            };
            let clear_effect = &mut self.clear_effect;
            let process_time = &mut self.clear_effect_process_time;
            terminal.draw(|f| ui::draw(f, &view, clear_effect, process_time, now))?;

            if self.clear_effect.as_ref().is_some_and(Effect::done) {
                self.clear_animation();
            }

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if !self.handle_key(key) {
                            return Ok(());
                        }
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                self.tick();
            }
        }
    }
}
