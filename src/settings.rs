use std::path::{Path, PathBuf};

use image::Rgba;

use crate::error::EditorError;

/// Default translucent marker painted in erase-mark mode.
pub const DEFAULT_MARKER: Rgba<u8> = Rgba([255, 48, 96, 128]);
/// Pixels wide the standalone editor surface may grow to.
pub const DEFAULT_DISPLAY_CAP: u32 = 900;
/// Undo snapshots kept before the oldest is discarded.
pub const DEFAULT_MAX_UNDO: usize = 30;
/// Per-channel flood-fill tolerance (compared as a 3-channel sum).
pub const DEFAULT_FLOOD_TOLERANCE: u32 = 32;
/// Per-channel differences never exceed 255, so larger tolerances select everything.
pub const MAX_FLOOD_TOLERANCE: u32 = 255;
/// Painted alpha must exceed this to count as marked on export.
pub const DEFAULT_EXPORT_ALPHA_THRESHOLD: u8 = 10;

pub const MIN_BRUSH_DIAMETER: f32 = 5.0;
pub const MAX_BRUSH_DIAMETER: f32 = 200.0;

/// Editor settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Marker color used by erase-mark strokes and selection marking
    pub marker_color: Rgba<u8>,
    /// Brush diameter selected on startup (display pixels)
    pub brush_diameter: f32,
    /// Maximum number of undo steps
    pub max_undo_steps: usize,
    /// Width cap of the standalone editor surface
    pub display_cap: u32,
    pub flood_tolerance: u32,
    pub export_alpha_threshold: u8,
    /// Fill gaps between sparse pointer samples with intermediate stamps.
    /// Off reproduces sample-only stamping.
    pub interpolate_strokes: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            marker_color: DEFAULT_MARKER,
            brush_diameter: 40.0,
            max_undo_steps: DEFAULT_MAX_UNDO,
            display_cap: DEFAULT_DISPLAY_CAP,
            flood_tolerance: DEFAULT_FLOOD_TOLERANCE,
            export_alpha_threshold: DEFAULT_EXPORT_ALPHA_THRESHOLD,
            interpolate_strokes: true,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/maskfe/maskfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MaskFE\maskfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/MaskFE/maskfe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("MaskFE").join("maskfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("MaskFE")
                    .join("maskfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("maskfe").join("maskfe_settings.cfg"))
        }
    }

    /// Load settings from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the default location.
    pub fn save(&self) -> Result<(), EditorError> {
        let path = Self::settings_path()
            .ok_or_else(|| EditorError::Settings("no settings directory available".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), EditorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "marker_color={}\n\
             brush_diameter={}\n\
             max_undo_steps={}\n\
             display_cap={}\n\
             flood_tolerance={}\n\
             export_alpha_threshold={}\n\
             interpolate_strokes={}\n",
            Self::color_to_str(self.marker_color),
            self.brush_diameter,
            self.max_undo_steps,
            self.display_cap,
            self.flood_tolerance,
            self.export_alpha_threshold,
            self.interpolate_strokes,
        )
    }

    /// Parse `key=value` lines.  Unknown keys and bad values keep the default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "marker_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.marker_color = c;
                    }
                }
                "brush_diameter" => {
                    if let Ok(d) = val.parse::<f32>() {
                        s.brush_diameter = clamp_brush_diameter(d);
                    }
                }
                "max_undo_steps" => {
                    if let Ok(n) = val.parse::<usize>()
                        && n > 0
                    {
                        s.max_undo_steps = n;
                    }
                }
                "display_cap" => {
                    if let Ok(n) = val.parse::<u32>()
                        && n > 0
                    {
                        s.display_cap = n;
                    }
                }
                "flood_tolerance" => {
                    if let Ok(t) = val.parse::<u32>() {
                        s.flood_tolerance = t.min(MAX_FLOOD_TOLERANCE);
                    }
                }
                "export_alpha_threshold" => {
                    if let Ok(t) = val.parse::<u8>() {
                        s.export_alpha_threshold = t;
                    }
                }
                "interpolate_strokes" => {
                    if let Ok(b) = val.parse::<bool>() {
                        s.interpolate_strokes = b;
                    }
                }
                other => {
                    log::warn!("Ignoring unknown settings key '{}'", other);
                }
            }
        }
        s
    }

    /// Serialize a color as "r,g,b,a"
    fn color_to_str(c: Rgba<u8>) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse a color from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return None;
        }
        let r = parts[0].trim().parse::<u8>().ok()?;
        let g = parts[1].trim().parse::<u8>().ok()?;
        let b = parts[2].trim().parse::<u8>().ok()?;
        let a = parts[3].trim().parse::<u8>().ok()?;
        Some(Rgba([r, g, b, a]))
    }
}

/// Keep a brush diameter inside the supported range.
pub fn clamp_brush_diameter(d: f32) -> f32 {
    if d.is_nan() {
        return MIN_BRUSH_DIAMETER;
    }
    d.clamp(MIN_BRUSH_DIAMETER, MAX_BRUSH_DIAMETER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_config_text() {
        let mut s = EditorSettings::default();
        s.marker_color = Rgba([1, 2, 3, 200]);
        s.brush_diameter = 64.0;
        s.max_undo_steps = 12;
        s.interpolate_strokes = false;
        assert_eq!(EditorSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let s = EditorSettings::parse(
            "marker_color=1,2,3\nmax_undo_steps=0\ndisplay_cap=abc\nflood_tolerance=-4\nnot a line\n",
        );
        assert_eq!(s, EditorSettings::default());
    }

    #[test]
    fn flood_tolerance_is_clamped() {
        let s = EditorSettings::parse("flood_tolerance=2000000000");
        assert_eq!(s.flood_tolerance, MAX_FLOOD_TOLERANCE);
        let s = EditorSettings::parse("flood_tolerance=0");
        assert_eq!(s.flood_tolerance, 0);
    }

    #[test]
    fn unrecognised_bool_keeps_default() {
        for val in ["yes", "True", "1", ""] {
            let s = EditorSettings::parse(&format!("interpolate_strokes={}", val));
            assert!(s.interpolate_strokes, "'{}' changed the default", val);
        }
        assert!(!EditorSettings::parse("interpolate_strokes=false").interpolate_strokes);
    }

    #[test]
    fn brush_diameter_is_clamped() {
        let s = EditorSettings::parse("brush_diameter=900");
        assert_eq!(s.brush_diameter, MAX_BRUSH_DIAMETER);
        assert_eq!(clamp_brush_diameter(1.0), MIN_BRUSH_DIAMETER);
        assert_eq!(clamp_brush_diameter(f32::NAN), MIN_BRUSH_DIAMETER);
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("maskfe_settings.cfg");
        let mut s = EditorSettings::default();
        s.display_cap = 640;
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = EditorSettings::load_from(&dir.path().join("nope.cfg"));
        assert_eq!(s, EditorSettings::default());
    }
}
