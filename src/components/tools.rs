use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasState, MaskSurface, TRANSPARENT, blend_over};
use crate::components::history::HistoryManager;
use crate::settings::{EditorSettings, clamp_brush_diameter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Paint,
    Select,
    /// Host-side navigation; the editor ignores pointer input.
    Move,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Paint => "Paint",
            Tool::Select => "Smart select",
            Tool::Move => "Move",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Paint, Tool::Select, Tool::Move]
    }
}

/// What a paint stroke does to the mask surface.
/// EraseMark: marks the region for regeneration (translucent marker, source-over)
/// RestoreMark: removes earlier marks (destination-out)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintMode {
    #[default]
    #[serde(alias = "erase")]
    EraseMark,
    #[serde(alias = "restore")]
    RestoreMark,
}

impl PaintMode {
    pub fn label(&self) -> &'static str {
        match self {
            PaintMode::EraseMark => "Erase",
            PaintMode::RestoreMark => "Restore",
        }
    }

    pub fn all() -> &'static [PaintMode] {
        &[PaintMode::EraseMark, PaintMode::RestoreMark]
    }
}

/// How a flood-fill region merges into the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectMode {
    /// Union – add to the existing mask.
    #[default]
    Include,
    /// Difference – subtract from the existing mask.  Needs a selection.
    Exclude,
}

impl SelectMode {
    pub fn label(&self) -> &'static str {
        match self {
            SelectMode::Include => "Add",
            SelectMode::Exclude => "Subtract",
        }
    }

    pub fn all() -> &'static [SelectMode] {
        &[SelectMode::Include, SelectMode::Exclude]
    }
}

// ============================================================================
// BRUSH RASTERIZATION
// ============================================================================

/// Stamp a filled circle of `diameter` centered on `(cx, cy)`.
///
/// A pixel is covered when its center lies inside the circle.  EraseMark
/// blends `marker` source-over; RestoreMark clears covered pixels.
pub fn stamp(
    surface: &mut MaskSurface,
    cx: f32,
    cy: f32,
    diameter: f32,
    mode: PaintMode,
    marker: Rgba<u8>,
) {
    let radius = diameter / 2.0;
    if radius <= 0.0 || !cx.is_finite() || !cy.is_finite() {
        return;
    }
    let (width, height) = (surface.width(), surface.height());
    let radius_sq = radius * radius;

    let min_x = (cx - radius).floor().max(0.0) as u32;
    let min_y = (cy - radius).floor().max(0.0) as u32;
    let max_x = ((cx + radius).ceil().max(0.0) as u32).min(width);
    let max_y = ((cy + radius).ceil().max(0.0) as u32).min(height);

    let buf = surface.pixels_mut();
    for py in min_y..max_y {
        let dy = py as f32 + 0.5 - cy;
        let dy_sq = dy * dy;
        for px in min_x..max_x {
            let dx = px as f32 + 0.5 - cx;
            if dx * dx + dy_sq > radius_sq {
                continue;
            }
            let pixel = buf.get_pixel_mut(px, py);
            match mode {
                PaintMode::EraseMark => blend_over(&mut pixel.0, marker),
                PaintMode::RestoreMark => *pixel = TRANSPARENT,
            }
        }
    }
}

/// Stamp along the segment `from → to`, spaced a quarter diameter apart
/// (at least one pixel).  The start point is not stamped.
pub fn stamp_segment(
    surface: &mut MaskSurface,
    from: (f32, f32),
    to: (f32, f32),
    diameter: f32,
    mode: PaintMode,
    marker: Rgba<u8>,
) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let dist = (dx * dx + dy * dy).sqrt();
    let spacing = (diameter * 0.25).max(1.0);
    let steps = (dist / spacing).ceil().max(1.0) as usize;
    for s in 1..=steps {
        let t = s as f32 / steps as f32;
        stamp(surface, from.0 + dx * t, from.1 + dy * t, diameter, mode, marker);
    }
}

// ============================================================================
// STROKE STATE MACHINE
// ============================================================================

/// Paint gesture state: `Idle → Stroking → Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum StrokeState {
    #[default]
    Idle,
    Stroking { last: (f32, f32) },
}

/// Live tool configuration plus the stroke in progress.  The host writes the
/// public fields; the editor reads them on every gesture.
#[derive(Clone, Debug)]
pub struct ToolState {
    pub active_tool: Tool,
    pub paint_mode: PaintMode,
    pub select_mode: SelectMode,
    brush_diameter: f32,
    pub marker_color: Rgba<u8>,
    pub interpolate: bool,
    stroke: StrokeState,
}

impl Default for ToolState {
    fn default() -> Self {
        Self::from_settings(&EditorSettings::default())
    }
}

impl ToolState {
    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self {
            active_tool: Tool::Paint,
            paint_mode: PaintMode::EraseMark,
            select_mode: SelectMode::Include,
            brush_diameter: clamp_brush_diameter(settings.brush_diameter),
            marker_color: settings.marker_color,
            interpolate: settings.interpolate_strokes,
            stroke: StrokeState::Idle,
        }
    }

    pub fn brush_diameter(&self) -> f32 {
        self.brush_diameter
    }

    /// Set the brush diameter, clamped to the supported range.
    pub fn set_brush_diameter(&mut self, diameter: f32) {
        self.brush_diameter = clamp_brush_diameter(diameter);
    }

    pub fn is_stroking(&self) -> bool {
        matches!(self.stroke, StrokeState::Stroking { .. })
    }

    /// Begin a stroke: snapshot for undo, then stamp the first dab.
    /// Ignored unless the paint tool is active and no stroke is running.
    pub fn pointer_down(
        &mut self,
        canvas: &mut CanvasState,
        history: &mut HistoryManager,
        pos: (f32, f32),
    ) -> bool {
        if self.active_tool != Tool::Paint {
            return false;
        }
        if self.is_stroking() {
            log::debug!("Ignoring pointer-down while a stroke is active");
            return false;
        }
        let label = match self.paint_mode {
            PaintMode::EraseMark => "Erase stroke",
            PaintMode::RestoreMark => "Restore stroke",
        };
        history.record_before_change(label, &canvas.surface);
        stamp(
            &mut canvas.surface,
            pos.0,
            pos.1,
            self.brush_diameter,
            self.paint_mode,
            self.marker_color,
        );
        canvas.mark_surface_dirty();
        self.stroke = StrokeState::Stroking { last: pos };
        true
    }

    /// Extend the current stroke to `pos`.
    pub fn pointer_move(&mut self, canvas: &mut CanvasState, pos: (f32, f32)) -> bool {
        let StrokeState::Stroking { last } = self.stroke else {
            return false;
        };
        // Held still: restamping would keep darkening the marker
        if pos == last {
            return false;
        }
        if self.interpolate {
            stamp_segment(
                &mut canvas.surface,
                last,
                pos,
                self.brush_diameter,
                self.paint_mode,
                self.marker_color,
            );
        } else {
            stamp(
                &mut canvas.surface,
                pos.0,
                pos.1,
                self.brush_diameter,
                self.paint_mode,
                self.marker_color,
            );
        }
        canvas.mark_surface_dirty();
        self.stroke = StrokeState::Stroking { last: pos };
        true
    }

    /// Finish the stroke.  Pointer-up, pointer-leave and touch-end all land
    /// here; stamps are already committed so nothing is rolled back.
    pub fn pointer_up(&mut self) -> bool {
        let was_stroking = self.is_stroking();
        self.stroke = StrokeState::Idle;
        was_stroking
    }

    /// Drop any stroke in progress (surface reallocated, source switched).
    pub fn reset_stroke(&mut self) {
        self.stroke = StrokeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DisplaySize;

    const MARKER: Rgba<u8> = Rgba([255, 0, 0, 128]);

    fn surface(w: u32, h: u32) -> MaskSurface {
        MaskSurface::new(DisplaySize { width: w, height: h })
    }

    #[test]
    fn stamp_covers_circle_only() {
        let mut s = surface(40, 40);
        stamp(&mut s, 20.0, 20.0, 10.0, PaintMode::EraseMark, MARKER);
        assert_eq!(s.alpha_at(20, 20), 128);
        assert_eq!(s.alpha_at(16, 20), 128);
        assert_eq!(s.alpha_at(26, 20), 0);
        // Corner of the bounding square stays clear
        assert_eq!(s.alpha_at(15, 15), 0);
        assert_eq!(s.painted_bounds(0), Some((15, 15, 24, 24)));
    }

    #[test]
    fn stamp_at_edge_is_clipped() {
        let mut s = surface(10, 10);
        stamp(&mut s, 0.0, 0.0, 8.0, PaintMode::EraseMark, MARKER);
        stamp(&mut s, 12.0, 12.0, 8.0, PaintMode::EraseMark, MARKER);
        stamp(&mut s, -50.0, -50.0, 8.0, PaintMode::EraseMark, MARKER);
        assert_eq!(s.alpha_at(0, 0), 128);
        assert_eq!(s.alpha_at(9, 9), 128);
        assert_eq!(s.alpha_at(5, 5), 0);
    }

    #[test]
    fn restore_punches_hole() {
        let mut s = surface(20, 20);
        stamp(&mut s, 10.0, 10.0, 16.0, PaintMode::EraseMark, MARKER);
        stamp(&mut s, 10.0, 10.0, 6.0, PaintMode::RestoreMark, MARKER);
        assert_eq!(s.alpha_at(10, 10), 0);
        assert_eq!(s.alpha_at(4, 10), 128);
    }

    #[test]
    fn stationary_move_does_not_restamp() {
        let mut canvas = CanvasState::new(
            crate::canvas::SourceImage::new(image::RgbaImage::new(20, 20)).unwrap(),
            crate::canvas::ContainerBounds::new(20, 20),
            crate::canvas::SurfaceLayout::Embedded,
        )
        .unwrap();
        let mut history = HistoryManager::default();
        let mut tools = ToolState::default();
        tools.marker_color = MARKER;
        assert!(tools.pointer_down(&mut canvas, &mut history, (10.0, 10.0)));
        let generation = canvas.surface_generation;
        for _ in 0..5 {
            assert!(!tools.pointer_move(&mut canvas, (10.0, 10.0)));
        }
        assert_eq!(canvas.surface.alpha_at(10, 10), 128);
        assert_eq!(canvas.surface_generation, generation);
        assert!(tools.pointer_move(&mut canvas, (11.0, 10.0)));
        assert!(tools.is_stroking());
    }

    #[test]
    fn segment_leaves_no_gaps() {
        let mut s = surface(200, 20);
        stamp(&mut s, 10.0, 10.0, 6.0, PaintMode::EraseMark, MARKER);
        stamp_segment(&mut s, (10.0, 10.0), (190.0, 10.0), 6.0, PaintMode::EraseMark, MARKER);
        for x in 10..190 {
            assert!(s.alpha_at(x, 10) > 0, "gap at x={}", x);
        }
    }
}
