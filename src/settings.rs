use std::path::{Path, PathBuf};

use crate::color::{Color, ColorHistory};
use crate::error::Result;
use crate::stroke::{BrushSettings, StrokeLimits};

// ============================================================================
// PAINTER SETTINGS - persisted as key=value lines
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct PainterSettings {
    pub history_limit: usize,
    /// 0 means no memory cap; only `history_limit` evicts.
    pub history_memory_mb: usize,
    pub brush_size: f32,
    pub brush_opacity: f32,
    pub brush_color: Color,
    pub eraser_size: f32,
    pub sticker_size: u32,
    pub paint_limits: StrokeLimits,
    pub erase_limits: StrokeLimits,
    /// Samples kept for the pointer velocity estimate.
    pub velocity_window: usize,
    /// 0 disables auto-save.
    pub autosave_seconds: u64,
    pub sticker_repeat_on_drag: bool,
    pub color_history: ColorHistory,
}

impl Default for PainterSettings {
    fn default() -> Self {
        let brush = BrushSettings::default();
        Self {
            history_limit: crate::history::DEFAULT_MAX_ENTRIES,
            history_memory_mb: 0,
            brush_size: brush.brush_size,
            brush_opacity: brush.opacity,
            brush_color: brush.color,
            eraser_size: brush.eraser_size,
            sticker_size: brush.sticker_size,
            paint_limits: StrokeLimits::default(),
            erase_limits: StrokeLimits::default(),
            velocity_window: crate::stroke::DEFAULT_VELOCITY_WINDOW,
            autosave_seconds: 30,
            sticker_repeat_on_drag: false,
            color_history: ColorHistory::new(),
        }
    }
}

impl PainterSettings {
    /// `skinpaint_settings.cfg` inside the per-user config directory, which is
    /// created on demand.  `None` when no such directory can be determined.
    pub fn settings_path() -> Option<PathBuf> {
        let dir = config_dir()?.join(CONFIG_DIR_NAME);
        let _ = std::fs::create_dir_all(&dir);
        Some(dir.join(SETTINGS_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }

    /// Unknown keys and unparseable values keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "history_limit" => {
                    s.history_limit = val.parse().unwrap_or(s.history_limit).max(1);
                }
                "history_memory_mb" => {
                    s.history_memory_mb = val.parse().unwrap_or(s.history_memory_mb);
                }
                "brush_size" => {
                    s.brush_size = parse_positive(val).unwrap_or(s.brush_size);
                }
                "brush_opacity" => {
                    s.brush_opacity = val.parse::<f32>().unwrap_or(s.brush_opacity).clamp(0.0, 1.0);
                }
                "brush_color" => {
                    if let Ok(c) = Color::from_hex(val) {
                        s.brush_color = c;
                    }
                }
                "eraser_size" => {
                    s.eraser_size = parse_positive(val).unwrap_or(s.eraser_size);
                }
                "sticker_size" => {
                    s.sticker_size = val.parse().unwrap_or(s.sticker_size);
                }
                "paint_max_uv_distance" => {
                    s.paint_limits.max_uv_distance = parse_positive(val).unwrap_or(s.paint_limits.max_uv_distance);
                }
                "paint_max_velocity" => {
                    s.paint_limits.max_velocity = parse_positive(val).unwrap_or(s.paint_limits.max_velocity);
                }
                "erase_max_uv_distance" => {
                    s.erase_limits.max_uv_distance = parse_positive(val).unwrap_or(s.erase_limits.max_uv_distance);
                }
                "erase_max_velocity" => {
                    s.erase_limits.max_velocity = parse_positive(val).unwrap_or(s.erase_limits.max_velocity);
                }
                "velocity_window" => {
                    s.velocity_window = val.parse().unwrap_or(s.velocity_window).max(2);
                }
                "autosave_seconds" => {
                    s.autosave_seconds = val.parse().unwrap_or(s.autosave_seconds);
                }
                "sticker_repeat_on_drag" => {
                    s.sticker_repeat_on_drag = val == "true";
                }
                "color_history" => {
                    s.color_history = ColorHistory::from_config_value(val);
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "history_limit={}\n\
             history_memory_mb={}\n\
             brush_size={}\n\
             brush_opacity={}\n\
             brush_color={}\n\
             eraser_size={}\n\
             sticker_size={}\n\
             paint_max_uv_distance={}\n\
             paint_max_velocity={}\n\
             erase_max_uv_distance={}\n\
             erase_max_velocity={}\n\
             velocity_window={}\n\
             autosave_seconds={}\n\
             sticker_repeat_on_drag={}\n\
             color_history={}\n",
            self.history_limit,
            self.history_memory_mb,
            self.brush_size,
            self.brush_opacity,
            self.brush_color,
            self.eraser_size,
            self.sticker_size,
            self.paint_limits.max_uv_distance,
            self.paint_limits.max_velocity,
            self.erase_limits.max_uv_distance,
            self.erase_limits.max_velocity,
            self.velocity_window,
            self.autosave_seconds,
            self.sticker_repeat_on_drag,
            self.color_history.to_config_value(),
        )
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    pub fn brush(&self) -> BrushSettings {
        BrushSettings {
            brush_size: self.brush_size,
            eraser_size: self.eraser_size,
            opacity: self.brush_opacity,
            color: self.brush_color,
            sticker_size: self.sticker_size,
        }
    }

    pub fn history_memory_bytes(&self) -> Option<usize> {
        if self.history_memory_mb == 0 {
            None
        } else {
            Some(self.history_memory_mb.saturating_mul(1024 * 1024))
        }
    }
}

#[cfg(target_os = "linux")]
const CONFIG_DIR_NAME: &str = "skinpaint";
#[cfg(not(target_os = "linux"))]
const CONFIG_DIR_NAME: &str = "SkinPaint";
const SETTINGS_FILE_NAME: &str = "skinpaint_settings.cfg";

/// Linux:   `$XDG_CONFIG_HOME` or `~/.config`
/// Windows: `%APPDATA%` or `%USERPROFILE%`
/// macOS:   `~/Library/Application Support`
/// Elsewhere the executable's directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
            && !xdg.is_empty()
        {
            return Some(PathBuf::from(xdg));
        }
        return std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".config"));
    }
    #[cfg(target_os = "windows")]
    {
        return std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);
    }
    #[cfg(target_os = "macos")]
    {
        return std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library").join("Application Support"));
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    }
}

fn parse_positive(val: &str) -> Option<f32> {
    val.parse::<f32>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = PainterSettings::default();
        assert_eq!(s.history_limit, 20);
        assert_eq!(s.history_memory_bytes(), None);
        assert_eq!(PainterSettings::parse("history_memory_mb=64").history_memory_bytes(), Some(64 * 1024 * 1024));
        assert_eq!(s.brush_size, 20.0);
        assert_eq!(s.eraser_size, 30.0);
        assert_eq!(s.brush_color, Color::new(255, 0, 0));
        assert_eq!(s.sticker_size, 100);
        assert_eq!(s.paint_limits.max_uv_distance, 0.1);
        assert_eq!(s.erase_limits.max_velocity, 2.0);
        assert_eq!(s.autosave_seconds, 30);
    }

    #[test]
    fn test_parse_falls_back_on_bad_values() {
        let s = PainterSettings::parse(
            "brush_size=abc\nbrush_opacity=7\nbrush_color=#12\neraser_size=-3\nnonsense\nunknown_key=1\n",
        );
        let d = PainterSettings::default();
        assert_eq!(s.brush_size, d.brush_size);
        assert_eq!(s.brush_opacity, 1.0);
        assert_eq!(s.brush_color, d.brush_color);
        assert_eq!(s.eraser_size, d.eraser_size);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skinpaint_settings.cfg");

        let mut s = PainterSettings::default();
        s.brush_size = 12.5;
        s.brush_color = Color::new(0, 128, 255);
        s.erase_limits = StrokeLimits { max_uv_distance: 0.05, max_velocity: 1.5 };
        s.sticker_repeat_on_drag = true;
        s.color_history.record(Color::new(1, 2, 3));
        s.color_history.record(Color::new(9, 9, 9));
        s.save_to(&path).unwrap();

        assert_eq!(PainterSettings::load_from(&path), s);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = PainterSettings::load_from(&dir.path().join("absent.cfg"));
        assert_eq!(s, PainterSettings::default());
    }

    #[test]
    fn test_settings_path_names_cfg_file() {
        if let Some(path) = PainterSettings::settings_path() {
            assert!(path.ends_with(Path::new(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME)));
            assert!(path.parent().is_some_and(Path::is_dir));
        }
    }
}
