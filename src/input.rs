//! Key bindings and the per-tick button snapshot.
//!
//! Keys map to a fixed logical button set (four directions, two actions, a
//! drag modifier, start, service). Events arriving between ticks are folded
//! into an [`InputSnapshot`] of pressed / held / released edges.

use beamtui::{Direction, Intent, Rules};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};

/// Delay before a held direction starts repeating.
const REPEAT_DELAY: Duration = Duration::from_millis(500);
/// Time between repeats while a direction stays held.
const REPEAT_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Primary,
    Secondary,
    Modifier,
    Start,
    Service,
}

impl Button {
    const fn bit(self) -> u16 {
        1 << self as u16
    }

    const fn direction(self) -> Option<Direction> {
        match self {
            Self::Up => Some(Direction::North),
            Self::Down => Some(Direction::South),
            Self::Left => Some(Direction::West),
            Self::Right => Some(Direction::East),
            _ => None,
        }
    }
}

/// Set of buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons(u16);

impl Buttons {
    pub const fn contains(self, b: Button) -> bool {
        self.0 & b.bit() != 0
    }

    fn insert(&mut self, b: Button) {
        self.0 |= b.bit();
    }

    fn remove(&mut self, b: Button) {
        self.0 &= !b.bit();
    }
}

/// Host-level request from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Button(Button),
    Pause,
    Quit,
    None,
}

/// Map key event to an action. Arrows and hjkl move; with Shift they drag.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER) {
        return Action::None;
    }
    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Action::Quit,
            _ => Action::None,
        };
    }
    let button = match code {
        KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
        KeyCode::Char('p') => return Action::Pause,
        KeyCode::Up | KeyCode::Char('k' | 'K') => Button::Up,
        KeyCode::Down | KeyCode::Char('j' | 'J') => Button::Down,
        KeyCode::Left | KeyCode::Char('h' | 'H') => Button::Left,
        KeyCode::Right | KeyCode::Char('l' | 'L') => Button::Right,
        KeyCode::Char(' ' | 'z' | 'Z') => Button::Primary,
        KeyCode::Char('x' | 'X') => Button::Secondary,
        KeyCode::Enter => Button::Start,
        KeyCode::F(1) | KeyCode::Char('?') => Button::Service,
        _ => return Action::None,
    };
    Action::Button(button)
}

/// Edges and levels for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSnapshot {
    pub pressed: Buttons,
    pub held: Buttons,
    pub released: Buttons,
    /// Directions pressed by auto-repeat rather than a key edge.
    pub repeated: Buttons,
}

impl InputSnapshot {
    /// Simulation intents for this tick under `rules`.
    pub fn intents(&self, rules: Rules) -> Vec<Intent> {
        let modifier = self.held.contains(Button::Modifier) || self.pressed.contains(Button::Modifier);
        let dragging = modifier && rules.dragging;
        let mut intents = Vec::new();
        for button in [Button::Up, Button::Down, Button::Left, Button::Right] {
            // Drags only happen on key edges.
            if dragging && self.repeated.contains(button) {
                continue;
            }
            if let Some(dir) = button.direction().filter(|_| self.pressed.contains(button)) {
                intents.push(rules.direction_action(dir, modifier));
            }
        }
        // The drag modifier owns the action buttons while it is held.
        if !dragging {
            if self.pressed.contains(Button::Primary) {
                intents.extend(rules.primary_action());
            }
            if self.pressed.contains(Button::Secondary) {
                intents.extend(rules.secondary_action());
            }
        }
        if self.pressed.contains(Button::Start) {
            intents.push(Intent::Start);
        }
        intents
    }
}

/// Folds key events into snapshots and drives auto-repeat for directions.
///
/// Terminals without key-release reporting only send presses (including the
/// OS's own repeats); in that case every press is also released at the end of
/// the tick and our repeat timer stays off.
#[derive(Debug, Default)]
pub struct InputTracker {
    current: InputSnapshot,
    releases_reported: bool,
    /// Direction being held, when it went down, last synthetic repeat.
    repeat: Option<(Button, Instant, Option<Instant>)>,
}

impl InputTracker {
    /// Feed one key event. Returns the host action for non-button keys.
    pub fn key_event(&mut self, key: KeyEvent, now: Instant) -> Action {
        let action = key_to_action(key);
        let Action::Button(button) = action else {
            return if key.kind == KeyEventKind::Press { action } else { Action::None };
        };
        let shift = key.modifiers.contains(KeyModifiers::SHIFT)
            || matches!(key.code, KeyCode::Char(c) if c.is_ascii_uppercase());

        match key.kind {
            KeyEventKind::Press => {
                self.current.pressed.insert(button);
                self.current.held.insert(button);
                if button.direction().is_some() {
                    if shift {
                        self.current.pressed.insert(Button::Modifier);
                        self.current.held.insert(Button::Modifier);
                    }
                    self.repeat = Some((button, now, None));
                }
            }
            KeyEventKind::Release => {
                self.releases_reported = true;
                self.current.held.remove(button);
                self.current.released.insert(button);
                if button.direction().is_some() {
                    self.current.held.remove(Button::Modifier);
                }
                if self.repeat.is_some_and(|(b, ..)| b == button) {
                    self.repeat = None;
                }
            }
            // We time repeats ourselves once releases are known to arrive.
            KeyEventKind::Repeat => {
                if !self.releases_reported {
                    self.current.pressed.insert(button);
                    self.current.repeated.insert(button);
                    if shift && button.direction().is_some() {
                        self.current.held.insert(Button::Modifier);
                    }
                }
            }
        }
        Action::Button(button)
    }

    /// Take this tick's snapshot. Held levels carry over to the next tick.
    pub fn snapshot(&mut self, now: Instant) -> InputSnapshot {
        if self.releases_reported {
            if let Some((button, down, last)) = self.repeat {
                let due = match last {
                    None => now.saturating_duration_since(down) >= REPEAT_DELAY,
                    Some(t) => now.saturating_duration_since(t) >= REPEAT_INTERVAL,
                };
                if due && self.current.held.contains(button) {
                    self.current.pressed.insert(button);
                    self.current.repeated.insert(button);
                    self.repeat = Some((button, down, Some(now)));
                }
            }
        }

        let snapshot = self.current;
        self.current.pressed = Buttons::default();
        self.current.released = Buttons::default();
        self.current.repeated = Buttons::default();
        if !self.releases_reported {
            self.current.held = Buttons::default();
            self.repeat = None;
        }
        snapshot
    }

    /// Forget everything held, e.g. after pausing.
    pub fn clear(&mut self) {
        self.current = InputSnapshot::default();
        self.repeat = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind,
            state: KeyEventState::NONE,
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        key(code, KeyModifiers::NONE, KeyEventKind::Press)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key_to_action(press(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(key_to_action(press(KeyCode::Char('p'))), Action::Pause);
        assert_eq!(key_to_action(press(KeyCode::Left)), Action::Button(Button::Left));
        assert_eq!(key_to_action(press(KeyCode::Char('z'))), Action::Button(Button::Primary));
        assert_eq!(key_to_action(press(KeyCode::Enter)), Action::Button(Button::Start));
        assert_eq!(
            key_to_action(key(KeyCode::Char('c'), KeyModifiers::CONTROL, KeyEventKind::Press)),
            Action::Quit
        );
        assert_eq!(key_to_action(press(KeyCode::Tab)), Action::None);
    }

    #[test]
    fn test_shift_arrow_drags_when_allowed() {
        let mut tracker = InputTracker::default();
        let now = Instant::now();
        tracker.key_event(key(KeyCode::Right, KeyModifiers::SHIFT, KeyEventKind::Press), now);
        let snap = tracker.snapshot(now);
        let dragging = Rules {
            dragging: true,
            ..Rules::default()
        };
        assert_eq!(snap.intents(dragging), vec![Intent::Drag(Direction::East)]);
        assert_eq!(snap.intents(Rules::default()), vec![Intent::Move(Direction::East)]);
    }

    #[test]
    fn test_press_only_terminals_release_each_tick() {
        let mut tracker = InputTracker::default();
        let now = Instant::now();
        tracker.key_event(press(KeyCode::Up), now);
        let first = tracker.snapshot(now);
        assert!(first.pressed.contains(Button::Up));
        let later = tracker.snapshot(now + Duration::from_secs(1));
        assert_eq!(later, InputSnapshot::default());
    }

    #[test]
    fn test_held_direction_repeats_after_delay() {
        let mut tracker = InputTracker::default();
        let t0 = Instant::now();
        // A release seen earlier proves the terminal reports them.
        tracker.key_event(key(KeyCode::Char('x'), KeyModifiers::NONE, KeyEventKind::Release), t0);
        tracker.key_event(press(KeyCode::Left), t0);
        assert!(tracker.snapshot(t0).pressed.contains(Button::Left));

        let t1 = t0 + Duration::from_millis(100);
        let snap = tracker.snapshot(t1);
        assert!(!snap.pressed.contains(Button::Left));
        assert!(snap.held.contains(Button::Left));

        let t2 = t0 + REPEAT_DELAY;
        assert!(tracker.snapshot(t2).pressed.contains(Button::Left));
        assert!(!tracker.snapshot(t2 + Duration::from_millis(10)).pressed.contains(Button::Left));
        assert!(tracker.snapshot(t2 + REPEAT_INTERVAL).pressed.contains(Button::Left));

        tracker.key_event(key(KeyCode::Left, KeyModifiers::NONE, KeyEventKind::Release), t2);
        let snap = tracker.snapshot(t2 + Duration::from_secs(1));
        assert!(!snap.pressed.contains(Button::Left));
        assert!(!snap.held.contains(Button::Left));
    }

    #[test]
    fn test_drag_modifier_suppresses_action_buttons() {
        let mut tracker = InputTracker::default();
        let now = Instant::now();
        tracker.key_event(key(KeyCode::Right, KeyModifiers::SHIFT, KeyEventKind::Press), now);
        tracker.key_event(press(KeyCode::Char(' ')), now);
        tracker.key_event(press(KeyCode::Char('x')), now);
        let snap = tracker.snapshot(now);
        let dragging = Rules {
            dragging: true,
            ..Rules::default()
        };
        assert_eq!(snap.intents(dragging), vec![Intent::Drag(Direction::East)]);
        assert_eq!(
            snap.intents(Rules::default()),
            vec![Intent::Move(Direction::East), Intent::Drop]
        );
    }

    #[test]
    fn test_held_drag_does_not_repeat() {
        let mut tracker = InputTracker::default();
        let t0 = Instant::now();
        tracker.key_event(key(KeyCode::Char('x'), KeyModifiers::NONE, KeyEventKind::Release), t0);
        tracker.key_event(key(KeyCode::Left, KeyModifiers::SHIFT, KeyEventKind::Press), t0);
        let dragging = Rules {
            dragging: true,
            ..Rules::default()
        };
        assert_eq!(tracker.snapshot(t0).intents(dragging), vec![Intent::Drag(Direction::West)]);

        let snap = tracker.snapshot(t0 + REPEAT_DELAY);
        assert!(snap.repeated.contains(Button::Left));
        assert!(snap.intents(dragging).is_empty());
        assert_eq!(snap.intents(Rules::default()), vec![Intent::Move(Direction::West)]);
    }

    #[test]
    fn test_action_buttons_follow_rules() {
        let mut tracker = InputTracker::default();
        let now = Instant::now();
        tracker.key_event(press(KeyCode::Char(' ')), now);
        tracker.key_event(press(KeyCode::Enter), now);
        let snap = tracker.snapshot(now);
        assert_eq!(snap.intents(Rules::default()), vec![Intent::Drop, Intent::Start]);
    }
}
