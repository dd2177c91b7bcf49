// ============================================================================
// Editing session: one source image, its mask surface, selection and history
// ============================================================================
//
// Both hosts (the egui app and the headless CLI) drive the editor through this
// type only.  Every operation is synchronous and degrades to a no-op while no
// image is loaded.

use image::RgbaImage;

use crate::canvas::{CanvasState, ContainerBounds, DisplaySize, SourceImage, SurfaceLayout};
use crate::components::history::HistoryManager;
use crate::components::tools::{SelectMode, Tool, ToolState};
use crate::error::EditorError;
use crate::ops::{flood_select, mask_export};
use crate::ops::mask_export::MaskArtifact;
use crate::settings::EditorSettings;

pub struct MaskEditor {
    settings: EditorSettings,
    canvas: Option<CanvasState>,
    history: HistoryManager,
    pub tools: ToolState,
    container: ContainerBounds,
    layout: SurfaceLayout,
}

impl MaskEditor {
    pub fn new(settings: EditorSettings, container: ContainerBounds) -> Self {
        let layout = SurfaceLayout::Standalone {
            cap: settings.display_cap,
        };
        Self {
            history: HistoryManager::new(settings.max_undo_steps),
            tools: ToolState::from_settings(&settings),
            settings,
            canvas: None,
            container,
            layout,
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn canvas(&self) -> Option<&CanvasState> {
        self.canvas.as_ref()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn layout(&self) -> SurfaceLayout {
        self.layout
    }

    pub fn container(&self) -> ContainerBounds {
        self.container
    }

    pub fn is_ready(&self) -> bool {
        self.canvas.is_some()
    }

    pub fn display_size(&self) -> Option<DisplaySize> {
        self.canvas.as_ref().map(|c| c.display_size())
    }

    // ========================================================================
    // LOADING & LAYOUT
    // ========================================================================

    /// Replace the source image.  Surfaces are reallocated and both history
    /// stacks are dropped.
    pub fn load_source(&mut self, source: SourceImage) -> Result<(), EditorError> {
        let canvas = CanvasState::new(source, self.container, self.layout)?;
        self.canvas = Some(canvas);
        self.history.clear();
        self.tools.reset_stroke();
        Ok(())
    }

    pub fn load_pixels(&mut self, pixels: RgbaImage) -> Result<(), EditorError> {
        self.load_source(SourceImage::new(pixels)?)
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), EditorError> {
        self.load_source(crate::io::decode_source_bytes(bytes)?)
    }

    pub fn load_path(&mut self, path: &std::path::Path) -> Result<(), EditorError> {
        self.load_source(crate::io::load_source(path)?)
    }

    /// The host container changed size.  Returns `true` when the surface was
    /// reallocated, in which case marks, selection and history are gone.
    pub fn resize_container(&mut self, container: ContainerBounds) -> Result<bool, EditorError> {
        self.container = container;
        self.reflow()
    }

    /// Switch between the standalone (width-capped) and embedded layouts.
    pub fn set_layout(&mut self, layout: SurfaceLayout) -> Result<bool, EditorError> {
        self.layout = layout;
        self.reflow()
    }

    fn reflow(&mut self) -> Result<bool, EditorError> {
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(false);
        };
        let reallocated = canvas.reflow(self.container, self.layout)?;
        if reallocated {
            self.history.clear();
            self.tools.reset_stroke();
        }
        Ok(reallocated)
    }

    // ========================================================================
    // POINTER INPUT
    // ========================================================================

    /// Pointer pressed at display coordinates `pos`.  Paint starts a stroke,
    /// select runs a flood fill, move does nothing.
    pub fn pointer_down(&mut self, pos: (f32, f32)) -> bool {
        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };
        match self.tools.active_tool {
            Tool::Paint => self.tools.pointer_down(canvas, &mut self.history, pos),
            Tool::Select => flood_select::select_at(
                canvas,
                pos,
                self.tools.select_mode,
                self.settings.flood_tolerance,
            ),
            Tool::Move => false,
        }
    }

    pub fn pointer_move(&mut self, pos: (f32, f32)) -> bool {
        match self.canvas.as_mut() {
            Some(canvas) => self.tools.pointer_move(canvas, pos),
            None => false,
        }
    }

    pub fn pointer_up(&mut self) -> bool {
        self.tools.pointer_up()
    }

    /// Leaving the surface ends the stroke exactly like releasing.
    pub fn pointer_leave(&mut self) -> bool {
        self.tools.pointer_up()
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    pub fn select_at(&mut self, pos: (f32, f32), mode: SelectMode) -> bool {
        match self.canvas.as_mut() {
            Some(canvas) => {
                flood_select::select_at(canvas, pos, mode, self.settings.flood_tolerance)
            }
            None => false,
        }
    }

    pub fn has_selection(&self) -> bool {
        self.canvas.as_ref().is_some_and(|c| c.has_selection())
    }

    pub fn invert_selection(&mut self) -> bool {
        self.canvas.as_mut().is_some_and(|c| c.invert_selection())
    }

    pub fn clear_selection(&mut self) -> bool {
        match self.canvas.as_mut() {
            Some(c) if c.has_selection() => {
                c.clear_selection();
                true
            }
            _ => false,
        }
    }

    /// Mark every selected pixel for regeneration, then drop the selection.
    pub fn mark_selection(&mut self) -> bool {
        self.mark_selected_region("Erase selection", false)
    }

    /// Mark every pixel outside the selection, then drop the selection.
    pub fn mark_background(&mut self) -> bool {
        self.mark_selected_region("Erase background", true)
    }

    fn mark_selected_region(&mut self, label: &str, invert: bool) -> bool {
        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };
        if !canvas.has_selection() {
            return false;
        }
        self.history.record_before_change(label, &canvas.surface);
        canvas.mark_selection(self.tools.marker_color, invert);
        canvas.clear_selection();
        log::debug!("{}", label);
        true
    }

    // ========================================================================
    // HISTORY & CLEAR
    // ========================================================================

    /// Wipe every mark.  Undoable.
    pub fn clear_mask(&mut self) -> bool {
        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };
        self.history.record_before_change("Clear mask", &canvas.surface);
        canvas.surface.clear();
        canvas.mark_surface_dirty();
        true
    }

    pub fn undo(&mut self) -> Option<String> {
        let canvas = self.canvas.as_mut()?;
        self.tools.reset_stroke();
        let label = self.history.undo(&mut canvas.surface)?;
        canvas.mark_surface_dirty();
        log::debug!("Undo: {}", label);
        Some(label)
    }

    pub fn redo(&mut self) -> Option<String> {
        let canvas = self.canvas.as_mut()?;
        self.tools.reset_stroke();
        let label = self.history.redo(&mut canvas.surface)?;
        canvas.mark_surface_dirty();
        log::debug!("Redo: {}", label);
        Some(label)
    }

    pub fn can_undo(&self) -> bool {
        self.canvas.is_some() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.canvas.is_some() && self.history.can_redo()
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    pub fn export_mask(&self) -> Option<MaskArtifact> {
        mask_export::export_mask(self.canvas.as_ref(), self.settings.export_alpha_threshold)
    }
}
