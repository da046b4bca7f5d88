//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use beamtui::{BlockKind, ColorSet, LightState};
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Beam, piece and UI colours.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Lit pipe colour per band set, indexed by `ColorSet::bits()` (0 unused).
    pub beams: [Color; 8],
    /// Unlit piece tint per block kind.
    pub blocks: [Color; 5],
    /// Pipes on an impossible chain.
    pub impossible: Color,
    /// Unlit pipe lines.
    pub pipe: Color,
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, timer).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Empty source slots, ghost preview.
    pub inactive_fg: Color,
    /// Cursor cell background.
    pub cursor: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

impl Theme {
    /// One Dark values, same hexes as onedark.theme.
    pub const fn onedark_default() -> Self {
        Self {
            beams: [
                rgb(0x3F444F),
                rgb(0xE06C75), // red
                rgb(0x98C379), // green
                rgb(0xE5C07B), // red+green
                rgb(0x61AFEF), // blue
                rgb(0xC678DD), // red+blue
                rgb(0x56B6C2), // green+blue
                rgb(0xFFFFFF), // white
            ],
            blocks: [
                rgb(0x8E6FA8), // purple
                rgb(0xB9855B), // orange
                rgb(0x5A7FA8), // blue
                rgb(0x6F9260), // green
                rgb(0x7F848E), // gray
            ],
            impossible: rgb(0xBE5046),
            pipe: rgb(0xABB2BF),
            bg: rgb(0x31353F),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
            cursor: rgb(0x4B5263),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// No path or a missing file gives the One Dark defaults; an unreadable file is an error.
    /// `palette` then swaps the beam colours for the high-contrast or colorblind set.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Built-in theme for a palette when no file is loaded.
    pub fn for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.beams = [
                    rgb(0x3F444F),
                    rgb(0xFF0000),
                    rgb(0x00FF00),
                    rgb(0xFFFF00),
                    rgb(0x0088FF),
                    rgb(0xFF00FF),
                    rgb(0x00FFFF),
                    rgb(0xFFFFFF),
                ];
                self.impossible = rgb(0xFF5F00);
            }
            crate::Palette::Colorblind => {
                // Paul Tol "bright": no red/green pair carries meaning alone.
                self.beams = [
                    rgb(0x3F444F),
                    rgb(0xEE6677),
                    rgb(0x228833),
                    rgb(0xCCBB44),
                    rgb(0x4477AA),
                    rgb(0xAA3377),
                    rgb(0x66CCEE),
                    rgb(0xFFFFFF),
                ];
                self.impossible = rgb(0xBBBBBB);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let d = Self::onedark_default();
        let mut beams = d.beams;
        for (bits, key, alt) in [
            (1, "cpu_end", "temp_end"),
            (2, "mem_box", "cpu_start"),
            (3, "title", "cpu_mid"),
            (4, "cpu_box", "cpu_box"),
            (5, "net_box", "net_box"),
            (6, "hi_fg", "proc_misc"),
        ] {
            if let Some(c) = get(key).or_else(|| get(alt)) {
                beams[bits] = c;
            }
        }
        Self {
            beams,
            blocks: d.blocks,
            impossible: get("temp_end").unwrap_or(d.impossible),
            pipe: get("main_fg").unwrap_or(d.pipe),
            bg: get("meter_bg").unwrap_or(d.bg),
            div_line: get("div_line").unwrap_or(d.div_line),
            main_fg: get("main_fg").unwrap_or(d.main_fg),
            title: get("title").unwrap_or(d.title),
            inactive_fg: get("inactive_fg").unwrap_or(d.inactive_fg),
            cursor: get("selected_bg").unwrap_or(d.cursor),
        }
    }

    #[inline]
    pub fn beam(&self, color: ColorSet) -> Color {
        self.beams[(color.bits() & 7) as usize]
    }

    pub fn block(&self, kind: BlockKind) -> Color {
        let i = match kind {
            BlockKind::Purple => 0,
            BlockKind::Orange => 1,
            BlockKind::Blue => 2,
            BlockKind::Green => 3,
            BlockKind::Gray => 4,
        };
        self.blocks[i]
    }

    /// Colour of the pipe lines drawn in a cell with this light.
    pub fn light(&self, light: LightState) -> Color {
        match light {
            LightState::Unlit => self.pipe,
            LightState::Lit(c) => self.beam(c),
            LightState::Impossible => self.impossible,
        }
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    if !s.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&s[range], 16).map_err(|_| invalid());
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
