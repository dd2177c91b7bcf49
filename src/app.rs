use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, TextureHandle, TextureOptions, Vec2};

use crate::canvas::{ContainerBounds, SurfaceLayout};
use crate::components::tools::{PaintMode, SelectMode, Tool};
use crate::editor::MaskEditor;
use crate::io::FileHandler;
use crate::settings::{EditorSettings, MAX_BRUSH_DIAMETER, MIN_BRUSH_DIAMETER};

/// Padding kept free around the surface inside the central panel.
const CANVAS_MARGIN: f32 = 16.0;
/// Fixed panel heights, so the canvas area depends on the window size only.
const TOOLBAR_HEIGHT: f32 = 36.0;
const STATUS_HEIGHT: f32 = 24.0;
/// egui panel frames add inner margins and separators on top of the exact heights.
const PANEL_CHROME: f32 = 24.0;

/// Space available to the surface in a window of `screen` points.  Depends on
/// nothing but the window size: switching tools must never reflow the surface
/// because a reflow wipes marks and history.
pub fn container_for_screen(screen: Vec2) -> ContainerBounds {
    let w = screen.x - CANVAS_MARGIN * 2.0 - PANEL_CHROME;
    let h = screen.y - TOOLBAR_HEIGHT - STATUS_HEIGHT - CANVAS_MARGIN * 2.0 - PANEL_CHROME;
    ContainerBounds::new(w.max(1.0) as u32, h.max(1.0) as u32)
}

/// A GPU texture mirroring one of the editor's rasters, re-uploaded only when
/// the source generation moves.
#[derive(Default)]
struct SurfaceTexture {
    handle: Option<TextureHandle>,
    generation: Option<u64>,
}

impl SurfaceTexture {
    fn sync(&mut self, ctx: &egui::Context, name: &str, pixels: &image::RgbaImage, generation: u64) {
        if self.generation == Some(generation)
            && self
                .handle
                .as_ref()
                .is_some_and(|h| h.size() == [pixels.width() as usize, pixels.height() as usize])
        {
            return;
        }
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [pixels.width() as usize, pixels.height() as usize],
            pixels.as_raw(),
        );
        let options = TextureOptions::NEAREST;
        match self.handle.as_mut() {
            Some(tex) => tex.set(color_image, options),
            None => self.handle = Some(ctx.load_texture(name, color_image, options)),
        }
        self.generation = Some(generation);
    }

    fn reset(&mut self) {
        self.generation = None;
    }

    fn paint(&self, painter: &egui::Painter, rect: Rect) {
        if let Some(tex) = &self.handle {
            painter.image(
                tex.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
    }
}

pub struct MaskFEApp {
    editor: MaskEditor,
    settings: EditorSettings,
    file_handler: FileHandler,
    source_tex: SurfaceTexture,
    mask_tex: SurfaceTexture,
    overlay_tex: SurfaceTexture,
    /// Bumped on every load so the source texture re-uploads.
    source_generation: u64,
    pointer_inside: bool,
    status: String,
}

impl MaskFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = EditorSettings::load();
        let editor = MaskEditor::new(settings.clone(), ContainerBounds::new(1280, 720));
        Self {
            editor,
            settings,
            file_handler: FileHandler::new(),
            source_tex: SurfaceTexture::default(),
            mask_tex: SurfaceTexture::default(),
            overlay_tex: SurfaceTexture::default(),
            source_generation: 0,
            pointer_inside: false,
            status: "Open an image to start".to_string(),
        }
    }

    fn open_image(&mut self) {
        let Some(result) = self.file_handler.open_source() else {
            return;
        };
        let result = result.and_then(|src| self.editor.load_source(src));
        self.after_load(result);
    }

    /// Files dropped on the window: native hosts hand over a path, web hosts
    /// the raw bytes.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.first().cloned());
        let Some(file) = dropped else {
            return;
        };
        let result = if let Some(path) = &file.path {
            self.file_handler.current_path = Some(path.clone());
            self.editor.load_path(path)
        } else if let Some(bytes) = &file.bytes {
            self.editor.load_bytes(bytes)
        } else {
            return;
        };
        self.after_load(result);
    }

    fn after_load(&mut self, result: Result<(), crate::error::EditorError>) {
        match result {
            Ok(()) => {
                self.source_generation = self.source_generation.wrapping_add(1);
                self.source_tex.reset();
                self.mask_tex.reset();
                self.overlay_tex.reset();
                self.status = match self.editor.display_size() {
                    Some(s) => format!("Loaded ({}x{} on screen)", s.width, s.height),
                    None => "Loaded".to_string(),
                };
            }
            Err(e) => {
                log::error!("Open failed: {}", e);
                self.status = format!("Open failed: {}", e);
            }
        }
    }

    fn export_to_file(&mut self) {
        let Some(artifact) = self.editor.export_mask() else {
            return;
        };
        let Some(path) = self.file_handler.pick_mask_destination() else {
            return;
        };
        self.status = match artifact.save(&path) {
            Ok(()) => format!("Mask saved to {}", path.display()),
            Err(e) => {
                log::error!("Mask export failed: {}", e);
                format!("Export failed: {}", e)
            }
        };
    }

    fn copy_to_clipboard(&mut self) {
        let Some(artifact) = self.editor.export_mask() else {
            return;
        };
        let img = &artifact.image;
        let result = arboard::Clipboard::new().and_then(|mut clip| {
            clip.set_image(arboard::ImageData {
                width: img.width() as usize,
                height: img.height() as usize,
                bytes: std::borrow::Cow::Borrowed(img.as_raw()),
            })
        });
        self.status = match result {
            Ok(()) => "Mask copied to clipboard".to_string(),
            Err(e) => {
                log::warn!("Clipboard copy failed: {}", e);
                format!("Clipboard unavailable: {}", e)
            }
        };
    }

    fn toggle_layout(&mut self) {
        let next = match self.editor.layout() {
            SurfaceLayout::Standalone { .. } => SurfaceLayout::Embedded,
            SurfaceLayout::Embedded => SurfaceLayout::Standalone {
                cap: self.settings.display_cap,
            },
        };
        if let Err(e) = self.editor.set_layout(next) {
            self.status = format!("Layout change failed: {}", e);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (undo, redo) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            let shift = i.modifiers.shift;
            let z = i.key_pressed(egui::Key::Z);
            let y = i.key_pressed(egui::Key::Y);
            (cmd && z && !shift, cmd && ((z && shift) || y))
        });
        if redo {
            if let Some(label) = self.editor.redo() {
                self.status = format!("Redo: {}", label);
            }
        } else if undo && let Some(label) = self.editor.undo() {
            self.status = format!("Undo: {}", label);
        }
    }

    /// Single non-wrapping row; narrow windows scroll it sideways.
    fn toolbar(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::horizontal().show(ui, |ui| {
            ui.horizontal(|ui| self.toolbar_row(ui));
        });
    }

    fn toolbar_row(&mut self, ui: &mut egui::Ui) {
        {
            if ui.button("Open…").clicked() {
                self.open_image();
            }
            ui.separator();

            for tool in Tool::all() {
                ui.selectable_value(&mut self.editor.tools.active_tool, *tool, tool.label());
            }
            ui.separator();

            match self.editor.tools.active_tool {
                Tool::Paint => {
                    for mode in PaintMode::all() {
                        ui.selectable_value(&mut self.editor.tools.paint_mode, *mode, mode.label());
                    }
                    let mut diameter = self.editor.tools.brush_diameter();
                    let slider = ui.add(
                        egui::Slider::new(&mut diameter, MIN_BRUSH_DIAMETER..=MAX_BRUSH_DIAMETER)
                            .text("Brush"),
                    );
                    if slider.changed() {
                        self.editor.tools.set_brush_diameter(diameter);
                    }
                    if slider.drag_released() {
                        self.settings.brush_diameter = self.editor.tools.brush_diameter();
                        if let Err(e) = self.settings.save() {
                            log::warn!("Could not save settings: {}", e);
                        }
                    }
                }
                Tool::Select => {
                    let has_selection = self.editor.has_selection();
                    for mode in SelectMode::all() {
                        let enabled = *mode == SelectMode::Include || has_selection;
                        ui.add_enabled_ui(enabled, |ui| {
                            ui.selectable_value(
                                &mut self.editor.tools.select_mode,
                                *mode,
                                mode.label(),
                            );
                        });
                    }
                    if !has_selection {
                        self.editor.tools.select_mode = SelectMode::Include;
                    }
                }
                Tool::Move => {}
            }
            ui.separator();

            let has_selection = self.editor.has_selection();
            if ui.add_enabled(has_selection, egui::Button::new("Invert")).clicked() {
                self.editor.invert_selection();
            }
            if ui.add_enabled(has_selection, egui::Button::new("Deselect")).clicked() {
                self.editor.clear_selection();
            }
            if ui
                .add_enabled(has_selection, egui::Button::new("Erase selection"))
                .clicked()
            {
                self.editor.mark_selection();
            }
            if ui
                .add_enabled(has_selection, egui::Button::new("Erase background"))
                .clicked()
            {
                self.editor.mark_background();
            }
            ui.separator();

            if ui.add_enabled(self.editor.can_undo(), egui::Button::new("Undo")).clicked() {
                self.editor.undo();
            }
            if ui.add_enabled(self.editor.can_redo(), egui::Button::new("Redo")).clicked() {
                self.editor.redo();
            }
            if ui
                .add_enabled(self.editor.is_ready(), egui::Button::new("Clear"))
                .clicked()
            {
                self.editor.clear_mask();
            }
            ui.separator();

            let ready = self.editor.is_ready();
            if ui.add_enabled(ready, egui::Button::new("Export mask…")).clicked() {
                self.export_to_file();
            }
            if ui.add_enabled(ready, egui::Button::new("Copy mask")).clicked() {
                self.copy_to_clipboard();
            }
            let layout_label = match self.editor.layout() {
                SurfaceLayout::Standalone { .. } => "Layout: full",
                SurfaceLayout::Embedded => "Layout: panel",
            };
            if ui.button(layout_label).clicked() {
                self.toggle_layout();
            }
        }
    }

    /// Fit the surface to the panel, draw it and route pointer input.
    fn canvas(&mut self, ui: &mut egui::Ui) {
        let container = container_for_screen(ui.ctx().screen_rect().size());
        if container != self.editor.container() {
            if let Err(e) = self.editor.resize_container(container) {
                log::warn!("Container resize rejected: {}", e);
            }
        }

        let ctx = ui.ctx().clone();
        let Some(canvas) = self.editor.canvas() else {
            ui.centered_and_justified(|ui| {
                ui.label("No image loaded");
            });
            return;
        };

        let size = canvas.display_size();
        self.source_tex
            .sync(&ctx, "maskfe_source", &canvas.display_source, self.source_generation);
        self.mask_tex
            .sync(&ctx, "maskfe_mask", canvas.surface.pixels(), canvas.surface_generation);
        self.overlay_tex
            .sync(&ctx, "maskfe_overlay", &canvas.overlay, canvas.overlay_generation);

        ui.add_space(CANVAS_MARGIN);
        let (rect, _response) = ui.allocate_exact_size(
            Vec2::new(size.width as f32, size.height as f32),
            Sense::click_and_drag(),
        );
        let painter = ui.painter_at(rect);
        self.source_tex.paint(&painter, rect);
        self.mask_tex.paint(&painter, rect);
        self.overlay_tex.paint(&painter, rect);

        let (hover, pressed, down, released) = ui.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
            )
        });
        let inside = hover.is_some_and(|p| rect.contains(p));
        let to_display = |p: Pos2| {
            let local = p - rect.min;
            (local.x, local.y)
        };

        if pressed && inside && let Some(p) = hover {
            self.editor.pointer_down(to_display(p));
        } else if down && inside && let Some(p) = hover {
            self.editor.pointer_move(to_display(p));
        }
        if released {
            self.editor.pointer_up();
        }
        if self.pointer_inside && !inside {
            self.editor.pointer_leave();
        }
        self.pointer_inside = inside;

        // Brush outline
        if inside
            && self.editor.tools.active_tool == Tool::Paint
            && let Some(p) = hover
        {
            painter.circle_stroke(
                p,
                self.editor.tools.brush_diameter() / 2.0,
                egui::Stroke::new(1.0, Color32::WHITE),
            );
        }
    }
}

impl eframe::App for MaskFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_shortcuts(ctx);

        self.handle_dropped_files(ctx);

        egui::TopBottomPanel::top("toolbar")
            .exact_height(TOOLBAR_HEIGHT)
            .show(ctx, |ui| {
                self.toolbar(ui);
            });

        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(STATUS_HEIGHT)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(self.status.as_str());
                    let history = self.editor.history();
                    if let Some(label) = history.undo_description() {
                        ui.separator();
                        ui.label(format!("Undo: {}", label));
                    }
                    if let Some(label) = history.redo_description() {
                        ui.separator();
                        ui.label(format!("Redo: {}", label));
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                self.canvas(ui);
            });
        });
    }
}
