use std::collections::VecDeque;
use std::fmt;

use crate::error::{PaintError, Result};

/// Number of recently used colours remembered.
pub const COLOR_HISTORY_LEN: usize = 12;

/// Opaque brush colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Parse `#rrggbb` (the `#` is optional, case-insensitive).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PaintError::InvalidFormat(format!("bad colour '{}'", hex)));
        }
        let val = u32::from_str_radix(digits, 16)
            .map_err(|_| PaintError::InvalidFormat(format!("bad colour '{}'", hex)))?;
        Ok(Self::new(
            ((val >> 16) & 0xFF) as u8,
            ((val >> 8) & 0xFF) as u8,
            (val & 0xFF) as u8,
        ))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ============================================================================
// RECENT COLOURS
// ============================================================================

/// Most recently used colours, newest first, without duplicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorHistory {
    colors: VecDeque<Color>,
}

impl ColorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `color` to the front, evicting the oldest past the limit.
    pub fn record(&mut self, color: Color) {
        self.colors.retain(|c| *c != color);
        self.colors.push_front(color);
        self.colors.truncate(COLOR_HISTORY_LEN);
    }

    pub fn colors(&self) -> impl Iterator<Item = &Color> {
        self.colors.iter()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Comma-separated hex list for the settings file.
    pub fn to_config_value(&self) -> String {
        self.colors.iter().map(|c| c.to_hex()).collect::<Vec<_>>().join(",")
    }

    /// Inverse of [`ColorHistory::to_config_value`].  Unparseable entries are
    /// skipped.
    pub fn from_config_value(value: &str) -> Self {
        let mut history = Self::new();
        for color in value.split(',').rev().filter_map(|s| Color::from_hex(s).ok()) {
            history.record(color);
        }
        history
    }
}
