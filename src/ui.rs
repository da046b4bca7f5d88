//! Layout and drawing: board with its source ring, sidebar, overlays.

use crate::app::{QuitOption, Screen};
use crate::audio::Audio;
use crate::theme::Theme;
use beamtui::playfield::PLACE_TIME;
use beamtui::{Cell, Edge, Playfield, PipeMask};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per grid cell; pipes need a centre column and two arms.
const CELL_WIDTH: u16 = 3;
const CELL_HEIGHT: u16 = 1;
const SIDEBAR_WIDTH: u16 = 24;

/// Fade of cleared cells (TachyonFX).
const CLEAR_FADE_MS: u32 = 350;

/// Everything the renderer reads for one frame.
pub struct View<'a> {
    pub playfield: &'a Playfield,
    pub theme: &'a Theme,
    pub audio: &'a Audio,
    pub screen: Screen,
    pub paused: bool,
    pub quit_selected: QuitOption,
    pub show_debug: bool,
    /// Rounds started this session; 0 means nothing has been played yet.
    pub rounds: u32,
    pub ticks: u64,
    pub clear_cells: &'a [(usize, usize)],
    pub animation: bool,
}

/// Glyph for a pipe mask, `CELL_WIDTH` columns wide.
pub fn pipe_glyph(mask: PipeMask) -> &'static str {
    match mask.bits() {
        0x0 => "   ",
        0x1 => " ╵ ",
        0x2 => " ╶─",
        0x4 => " ╷ ",
        0x8 => "─╴ ",
        0x3 => " └─",
        0x5 => " │ ",
        0x6 => " ┌─",
        0x9 => "─┘ ",
        0xA => "───",
        0xC => "─┐ ",
        _ => "─┼─",
    }
}

/// Board size in terminal cells: border, source ring, grid.
pub fn board_size(width: usize, height: usize) -> (u16, u16) {
    let w = (width as u16).saturating_mul(CELL_WIDTH);
    let h = (height as u16).saturating_mul(CELL_HEIGHT);
    (w + 4, h + 4)
}

/// Grid rect (no border, no source ring) inside the board's outer rect.
fn grid_rect(outer: Rect, pf: &Playfield) -> Rect {
    Rect {
        x: outer.x + 2,
        y: outer.y + 2,
        width: (pf.width() as u16 * CELL_WIDTH).min(outer.width.saturating_sub(4)),
        height: (pf.height() as u16 * CELL_HEIGHT).min(outer.height.saturating_sub(4)),
    }
}

/// Buffer positions covered by the given grid cells.
fn clearing_buffer_positions(grid: Rect, cells: &[(usize, usize)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(gx, gy) in cells {
        let x0 = grid.x + gx as u16 * CELL_WIDTH;
        let y0 = grid.y + gy as u16 * CELL_HEIGHT;
        for bx in x0..(x0 + CELL_WIDTH).min(grid.right()) {
            for by in y0..(y0 + CELL_HEIGHT).min(grid.bottom()) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Create or advance the fade over cells cleared on the last aging pass.
fn apply_clear_effect(
    frame: &mut Frame,
    view: &View,
    grid: Rect,
    effect: &mut Option<Effect>,
    process_time: &mut Option<Instant>,
    now: Instant,
) {
    let delta = process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *process_time = Some(now);

    if effect.is_none() {
        let clearing = clearing_buffer_positions(grid, view.clear_cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            clearing.contains(&(pos.x, pos.y))
        }));
        let bg = view.theme.bg;
        *effect = Some(
            fx::fade_to(bg, bg, (CLEAR_FADE_MS, Interpolation::Linear))
                .with_filter(filter)
                .with_area(grid),
        );
    }

    if let Some(effect) = effect {
        frame.render_effect(effect, grid, TfxDuration::from_millis(delta_ms));
    }
}

/// Draw the board, sidebar and whatever overlay the screen needs.
pub fn draw(
    frame: &mut Frame,
    view: &View,
    clear_effect: &mut Option<Effect>,
    clear_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    let board = draw_game(frame, view, area);

    let grid = grid_rect(board, view.playfield);
    if view.animation && !view.clear_cells.is_empty() {
        apply_clear_effect(frame, view, grid, clear_effect, clear_process_time, now);
    }

    if !view.playfield.is_running() {
        draw_idle_overlay(frame, view, area);
    } else if view.paused {
        draw_pause_overlay(frame, view, area);
    }
    if view.show_debug {
        draw_debug_overlay(frame, view, area);
    }
    if view.screen == Screen::QuitMenu {
        draw_quit_menu(frame, view);
    }
}

/// Board and sidebar, centred. Returns the board's outer rect.
fn draw_game(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let (pw, ph) = board_size(view.playfield.width(), view.playfield.height());
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph.max(22)),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let active = vert[1];

    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(active);
    let board_area = Rect {
        height: ph.min(inner[0].height),
        y: inner[0].y + inner[0].height.saturating_sub(ph) / 2,
        ..inner[0]
    };

    draw_board(frame, view, board_area);
    draw_sidebar(frame, view, inner[1]);
    board_area
}

fn put(frame: &mut Frame, x: u16, y: u16, symbol: &str, style: Style) {
    let bounds = frame.area();
    if x >= bounds.left() && x < bounds.right() && y >= bounds.top() && y < bounds.bottom() {
        frame.buffer_mut()[(x, y)].set_symbol(symbol).set_style(style);
    }
}

fn draw_board(frame: &mut Frame, view: &View, area: Rect) {
    let pf = view.playfield;
    let theme = view.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Beamtui ", Style::default().fg(theme.title)));
    let ring = block.inner(area);
    block.render(area, frame.buffer_mut());

    let bg = Style::default().bg(theme.bg);
    for y in ring.top()..ring.bottom() {
        for x in ring.left()..ring.right() {
            put(frame, x, y, " ", bg);
        }
    }

    let grid = grid_rect(area, pf);
    draw_sources(frame, view, grid);

    let (cx, cy) = pf.cursor();
    let ghost = pf.ghost();
    let flashing: HashSet<(usize, usize)> = if view.animation {
        view.clear_cells.iter().copied().collect()
    } else {
        HashSet::new()
    };

    for gy in 0..pf.height() {
        for gx in 0..pf.width() {
            let Some(cell) = pf.cell(gx, gy) else { continue };
            let is_cursor = (gx, gy) == (cx, cy) && pf.is_running();
            let (glyph, style) = if cell.is_empty() && flashing.contains(&(gx, gy)) {
                ("▒▒▒", Style::default().fg(Color::White).bg(theme.bg))
            } else if is_cursor && cell.is_empty() {
                match ghost {
                    Some(g) => (pipe_glyph(g.pipe), Style::default().fg(theme.inactive_fg).bg(theme.cursor)),
                    None => (" · ", Style::default().fg(theme.inactive_fg).bg(theme.cursor)),
                }
            } else {
                cell_glyph(cell, theme, is_cursor)
            };
            let x = grid.x + gx as u16 * CELL_WIDTH;
            let y = grid.y + gy as u16 * CELL_HEIGHT;
            if y >= grid.bottom() || x >= grid.right() {
                continue;
            }
            for (i, ch) in glyph.chars().enumerate() {
                let mut tmp = [0u8; 4];
                put(frame, x + i as u16, y, ch.encode_utf8(&mut tmp), style);
            }
        }
    }
}

fn cell_glyph(cell: &Cell, theme: &Theme, is_cursor: bool) -> (&'static str, Style) {
    let Some(kind) = cell.block else {
        return ("   ", Style::default().bg(if is_cursor { theme.cursor } else { theme.bg }));
    };
    let bg = if is_cursor { theme.cursor } else { theme.block(kind) };
    let mut style = Style::default().fg(theme.light(cell.light)).bg(bg);
    if !cell.light.is_unlit() {
        style = style.add_modifier(Modifier::BOLD);
    }
    (pipe_glyph(cell.pipe), style)
}

/// Sources sit in the ring between the border and the grid.
fn draw_sources(frame: &mut Frame, view: &View, grid: Rect) {
    let theme = view.theme;
    for source in view.playfield.sources() {
        let (x, y) = match source.edge {
            Edge::West => (grid.x.saturating_sub(1), grid.y + source.index as u16 * CELL_HEIGHT),
            Edge::East => (grid.right(), grid.y + source.index as u16 * CELL_HEIGHT),
            Edge::North => (grid.x + source.index as u16 * CELL_WIDTH + 1, grid.y.saturating_sub(1)),
            Edge::South => (grid.x + source.index as u16 * CELL_WIDTH + 1, grid.bottom()),
        };
        let (symbol, fg) = if source.color.is_empty() {
            ("·", theme.div_line)
        } else {
            ("■", theme.beam(source.color))
        };
        put(frame, x, y, symbol, Style::default().fg(fg).bg(theme.bg));
    }
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let pf = view.playfield;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // Next (border + title + 5 pieces)
            Constraint::Length(1),
            Constraint::Length(6), // Stats
            Constraint::Length(1),
            Constraint::Length(4), // Place timer
            Constraint::Length(1),
            Constraint::Length(3), // Music
        ])
        .split(area);

    // --- Next ---
    let next_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let mut next_lines = vec![Line::from(Span::styled("Next", title_style))];
    if pf.rules().placing {
        for (i, cell) in pf.upnext().iter().enumerate() {
            let (glyph, style) = cell_glyph(cell, theme, false);
            let marker = if i == 0 { "▶ " } else { "  " };
            next_lines.push(Line::from(vec![
                Span::styled(marker, title_style),
                Span::styled(glyph, style),
            ]));
        }
    } else {
        next_lines.push(Line::from(Span::styled("(pre-filled)", Style::default().fg(theme.inactive_fg))));
    }
    Paragraph::new(next_lines).render(next_inner, frame.buffer_mut());

    // --- Stats ---
    let stats_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let rules = pf.rules();
    let mut rule_names = Vec::new();
    for (on, name) in [
        (rules.gravity, "gravity"),
        (rules.rotation, "rotate"),
        (rules.dragging, "drag"),
        (rules.placing, "place"),
        (rules.place_timer && rules.placing, "timer"),
    ] {
        if on {
            rule_names.push(name);
        }
    }
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(pf.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Empty: ", title_style),
            Span::styled(format!("{}/{}", pf.empty_count(), pf.cells().len()), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Rules: ", title_style),
            Span::styled(rule_names.join(" "), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Round: ", title_style),
            Span::styled(view.rounds.to_string(), fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Place timer ---
    let timer_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let timer_inner = timer_block.inner(chunks[4]);
    timer_block.render(chunks[4], frame.buffer_mut());
    let timer_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(timer_inner);
    let timed = rules.placing && rules.place_timer;
    let ratio = if timed && pf.is_running() {
        (pf.time_left().as_secs_f64() / PLACE_TIME.as_secs_f64()).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let label = if timed {
        format!("Place {:.1}s", pf.time_left().as_secs_f64())
    } else {
        "Place --".to_string()
    };
    Paragraph::new(Line::from(Span::styled(label, title_style))).render(timer_layout[0], frame.buffer_mut());
    let bar_color = if ratio > 0.6 {
        Color::Green
    } else if ratio > 0.3 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(ratio)
        .label("")
        .gauge_style(Style::default().fg(bar_color).bg(theme.bg))
        .render(timer_layout[1], frame.buffer_mut());

    // --- Music ---
    let music_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" ♪ ", title_style));
    let music_inner = music_block.inner(chunks[6]);
    music_block.render(chunks[6], frame.buffer_mut());
    let track = view.audio.track().unwrap_or("-");
    Paragraph::new(Line::from(Span::styled(track, fg_style))).render(music_inner, frame.buffer_mut());
}

fn centered(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn popup_block(theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
}

fn draw_idle_overlay(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let mut lines = vec![Line::from("")];
    if view.rounds > 0 {
        lines.push(Line::from(Span::styled(
            " Board full ",
            Style::default().fg(Color::White).bg(Color::Red),
        )));
        lines.push(Line::from(Span::styled(
            format!(" Score: {} ", view.playfield.score()),
            Style::default().fg(theme.main_fg),
        )));
    } else {
        lines.push(Line::from(Span::styled(" Beamtui ", Style::default().fg(theme.title))));
        lines.push(Line::from(Span::styled(
            " Join sources of matching colour ",
            Style::default().fg(theme.main_fg),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Enter — Start    Q — Quit ",
        Style::default().fg(theme.main_fg),
    )));
    let popup = centered(area, 38, lines.len() as u16 + 2);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(popup_block(theme))
        .render(popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(popup_block(theme))
        .render(centered(area, 28, 6), frame.buffer_mut());
}

fn draw_debug_overlay(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let pf = view.playfield;
    let (cx, cy) = pf.cursor();
    let cursor_cell = pf.cell(cx, cy).copied().unwrap_or(Cell::EMPTY);
    let fg = Style::default().fg(theme.main_fg);
    let lines = vec![
        Line::from(Span::styled(format!("tick   {}", view.ticks), fg)),
        Line::from(Span::styled(format!("cursor {cx},{cy}"), fg)),
        Line::from(Span::styled(format!("pipe   {:?}", cursor_cell.pipe), fg)),
        Line::from(Span::styled(format!("light  {:?}", cursor_cell.light), fg)),
        Line::from(Span::styled(format!("age    {}", cursor_cell.age), fg)),
        Line::from(Span::styled(format!("sound  {:?}", view.audio.last_effect()), fg)),
        Line::from(Span::styled(format!("sounds {}", view.audio.effects_played()), fg)),
    ];
    let rect = Rect {
        x: area.x,
        y: area.y,
        width: 30.min(area.width),
        height: (lines.len() as u16 + 2).min(area.height),
    };
    Paragraph::new(lines)
        .style(Style::default().bg(theme.bg))
        .block(popup_block(theme).title(Span::styled(" Debug ", Style::default().fg(theme.title))))
        .render(rect, frame.buffer_mut());
}

pub fn draw_quit_menu(frame: &mut Frame, view: &View) {
    let theme = view.theme;
    let area = frame.area();
    let quit_rect = centered(area, 24, 8);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    for y in quit_rect.top()..quit_rect.bottom() {
        for x in quit_rect.left()..quit_rect.right() {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::EndRound, " End round "),
        (QuitOption::Exit, " Exit "),
    ];
    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == view.quit_selected {
            Style::default()
                .fg(theme.bg)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + inner.width.saturating_sub(label.len() as u16) / 2;
        let ry = inner.y + i as u16 * 2;
        if ry < inner.bottom() {
            frame.buffer_mut().set_string(rx, ry, label, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamtui::Direction::{East, North, South, West};

    #[test]
    fn test_glyphs_join_neighbours() {
        // An east arm ends in the last column, a west arm starts in the first.
        let ew = pipe_glyph(PipeMask::pair(East, West));
        assert!(ew.ends_with('─') && ew.starts_with('─'));
        assert!(pipe_glyph(PipeMask::pair(North, East)).ends_with('─'));
        assert!(pipe_glyph(PipeMask::pair(South, West)).starts_with('─'));
        assert_eq!(pipe_glyph(PipeMask::pair(North, South)), " │ ");
        for bits in 0..16 {
            assert_eq!(pipe_glyph(PipeMask::from_bits(bits)).chars().count(), CELL_WIDTH as usize);
        }
    }

    #[test]
    fn test_board_size() {
        assert_eq!(board_size(9, 11), (31, 15));
    }

    #[test]
    fn test_clearing_positions_cover_cell_width() {
        let grid = Rect::new(10, 5, 27, 11);
        let set = clearing_buffer_positions(grid, &[(1, 2)]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(&(13, 7)) && set.contains(&(15, 7)));
    }
}
