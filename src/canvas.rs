use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::EditorError;

/// Fully transparent pixel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Selection mask value for a selected pixel.
pub const SELECTED: u8 = 255;

/// Hatch period (display pixels) of the selection overlay.
const HATCH_PERIOD: u32 = 8;
/// Width of each diagonal hatch line inside one period.
const HATCH_LINE: u32 = 3;
const HATCH_COLOR: Rgba<u8> = Rgba([40, 120, 255, 110]);
const HATCH_FILL: Rgba<u8> = Rgba([40, 120, 255, 35]);

// ============================================================================
// SOURCE IMAGE
// ============================================================================

/// The bitmap being edited.  Immutable for the duration of a session and
/// shared read-only with the host, so clones are cheap.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pixels: Arc<RgbaImage>,
}

impl SourceImage {
    pub fn new(pixels: RgbaImage) -> Result<Self, EditorError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(EditorError::InvalidDimensions(format!(
                "source image is {}x{}",
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Self { pixels: Arc::new(pixels) })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Raster the source at display resolution so flood-fill seeds and the
    /// selection mask share one coordinate space.
    pub fn raster_at(&self, size: DisplaySize) -> RgbaImage {
        if size.width == self.width() && size.height == self.height() {
            return (*self.pixels).clone();
        }
        imageops::resize(&*self.pixels, size.width, size.height, FilterType::Triangle)
    }
}

// ============================================================================
// DISPLAY GEOMETRY
// ============================================================================

/// Space the host makes available for the editing canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl ContainerBounds {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self { max_width, max_height }
    }
}

/// How the host presents the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceLayout {
    /// Full editor page: the surface never grows wider than `cap`.
    Standalone { cap: u32 },
    /// Compact edit panel: bounded only by its container.
    Embedded,
}

impl SurfaceLayout {
    fn width_cap(&self, container: ContainerBounds) -> u32 {
        match self {
            SurfaceLayout::Standalone { cap } => container.max_width.min(*cap),
            SurfaceLayout::Embedded => container.max_width,
        }
    }
}

/// Integer pixel dimensions of the interactive surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

/// Fit a `native_w × native_h` image into `container`, aspect-locked.
///
/// Width is taken first (capped by the layout), height follows the aspect
/// ratio; if that overflows the container height the height is pinned and the
/// width reflowed.  Both sides are rounded and kept at least one pixel.
pub fn fit_display_size(
    native_w: u32,
    native_h: u32,
    container: ContainerBounds,
    layout: SurfaceLayout,
) -> Result<DisplaySize, EditorError> {
    if native_w == 0 || native_h == 0 {
        return Err(EditorError::InvalidDimensions(format!(
            "native size {}x{}",
            native_w, native_h
        )));
    }
    if container.max_width == 0 || container.max_height == 0 {
        return Err(EditorError::InvalidDimensions(format!(
            "container {}x{}",
            container.max_width, container.max_height
        )));
    }

    let ratio = native_h as f64 / native_w as f64;
    let max_h = container.max_height as f64;

    let mut w = layout.width_cap(container) as f64;
    let mut h = w * ratio;
    if h > max_h {
        h = max_h;
        w = h / ratio;
    }

    Ok(DisplaySize {
        width: (w.round() as u32).clamp(1, container.max_width),
        height: (h.round() as u32).clamp(1, container.max_height),
    })
}

// ============================================================================
// MASK SURFACE
// ============================================================================

/// The display-resolution paint surface.  All mutation goes through this
/// type; [`MaskSurface::snapshot`] always returns an independent copy.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskSurface {
    pixels: RgbaImage,
}

impl MaskSurface {
    /// Fully transparent surface.
    pub fn new(size: DisplaySize) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(size.width, size.height, TRANSPARENT),
        }
    }

    pub fn size(&self) -> DisplaySize {
        DisplaySize {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.pixels
            .get_pixel_checked(x, y)
            .map(|p| p.0[3])
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.pixels.pixels_mut().for_each(|p| *p = TRANSPARENT);
    }

    /// Deep copy of the current pixels.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.clone()
    }

    /// Replace the pixels with a snapshot.  A snapshot of another size is
    /// rejected and the surface left untouched.
    pub fn restore(&mut self, snapshot: RgbaImage) -> bool {
        if snapshot.dimensions() != self.pixels.dimensions() {
            log::warn!(
                "MaskSurface::restore: snapshot {:?} does not match surface {:?}",
                snapshot.dimensions(),
                self.pixels.dimensions()
            );
            return false;
        }
        self.pixels = snapshot;
        true
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of pixels with alpha above
    /// `threshold`, inclusive.
    pub fn painted_bounds(&self, threshold: u8) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, p) in self.pixels.enumerate_pixels() {
            if p.0[3] > threshold {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }

    /// Paint `color` source-over on every pixel where `mask` is set.
    pub fn mark_where(&mut self, mask: &GrayImage, want_selected: bool, color: Rgba<u8>) {
        if mask.dimensions() != self.pixels.dimensions() {
            return;
        }
        let width = self.pixels.width() as usize;
        let mask_raw = mask.as_raw();
        let raw: &mut [u8] = &mut self.pixels;
        raw.par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                let mask_row = &mask_raw[y * width..(y + 1) * width];
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    if (mask_row[x] == SELECTED) == want_selected {
                        blend_over(px, color);
                    }
                }
            });
    }
}

/// Straight-alpha source-over: `src` composited onto the 4-byte `dst`.
pub fn blend_over(dst: &mut [u8], src: Rgba<u8>) {
    let sa = src.0[3] as u32;
    if sa == 0 {
        return;
    }
    let da = dst[3] as u32;
    // alpha in 0..=255*255 fixed point
    let out_a = sa * 255 + da * (255 - sa);
    if out_a == 0 {
        return;
    }
    for c in 0..3 {
        let sc = src.0[c] as u32;
        let dc = dst[c] as u32;
        let num = sc * sa * 255 + dc * da * (255 - sa);
        dst[c] = ((num + out_a / 2) / out_a) as u8;
    }
    dst[3] = ((out_a + 127) / 255) as u8;
}

// ============================================================================
// SELECTION MASK
// ============================================================================

/// "Smart select" region at display resolution.
/// 0 = unselected, [`SELECTED`] = selected; never any other value.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionMask {
    mask: GrayImage,
}

impl SelectionMask {
    pub fn new(size: DisplaySize) -> Self {
        Self {
            mask: GrayImage::new(size.width, size.height),
        }
    }

    pub fn size(&self) -> DisplaySize {
        DisplaySize {
            width: self.mask.width(),
            height: self.mask.height(),
        }
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.mask
    }

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.mask
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == SELECTED)
    }

    pub fn set(&mut self, x: u32, y: u32, selected: bool) {
        if x < self.mask.width() && y < self.mask.height() {
            self.mask
                .put_pixel(x, y, Luma([if selected { SELECTED } else { 0 }]));
        }
    }

    pub fn selected_count(&self) -> usize {
        self.mask.as_raw().par_iter().filter(|&&v| v == SELECTED).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.mask.as_raw().par_iter().any(|&v| v == SELECTED)
    }

    /// Flip every pixel in place.
    pub fn invert(&mut self) {
        let raw: &mut [u8] = &mut self.mask;
        raw.par_iter_mut()
            .for_each(|v| *v = if *v == SELECTED { 0 } else { SELECTED });
    }
}

// ============================================================================
// CANVAS STATE
// ============================================================================

/// Everything one editing session owns: the source it reads, the display
/// surfaces it paints into and the active selection.
pub struct CanvasState {
    pub source: SourceImage,
    pub layout: SurfaceLayout,
    pub container: ContainerBounds,
    pub surface: MaskSurface,
    /// Source rastered at the surface size (flood-fill input).
    pub display_source: RgbaImage,
    /// Selection mask – `None` when nothing is selected.
    /// Dimensions always match the surface.
    pub selection_mask: Option<SelectionMask>,
    /// Hatched selection overlay, same size as the surface.
    pub overlay: RgbaImage,
    /// Bumped whenever `surface` changes so hosts can re-upload textures.
    pub surface_generation: u64,
    /// Bumped whenever `overlay` changes.
    pub overlay_generation: u64,
}

impl CanvasState {
    /// Allocate surfaces for `source` inside `container`.
    pub fn new(
        source: SourceImage,
        container: ContainerBounds,
        layout: SurfaceLayout,
    ) -> Result<Self, EditorError> {
        let size = fit_display_size(source.width(), source.height(), container, layout)?;
        log::info!(
            "Canvas allocated: native {}x{} -> display {}x{} ({:?})",
            source.width(),
            source.height(),
            size.width,
            size.height,
            layout
        );
        Ok(Self {
            display_source: source.raster_at(size),
            surface: MaskSurface::new(size),
            overlay: RgbaImage::from_pixel(size.width, size.height, TRANSPARENT),
            selection_mask: None,
            source,
            layout,
            container,
            surface_generation: 0,
            overlay_generation: 0,
        })
    }

    pub fn display_size(&self) -> DisplaySize {
        self.surface.size()
    }

    /// Re-fit for a new container / layout.  Returns `true` when the surface
    /// was reallocated (content, selection and overlay are then cleared).
    pub fn reflow(
        &mut self,
        container: ContainerBounds,
        layout: SurfaceLayout,
    ) -> Result<bool, EditorError> {
        let size = fit_display_size(self.source.width(), self.source.height(), container, layout)?;
        self.container = container;
        self.layout = layout;
        if size == self.display_size() {
            return Ok(false);
        }
        log::info!(
            "Canvas reflow: display {}x{} -> {}x{}",
            self.surface.width(),
            self.surface.height(),
            size.width,
            size.height
        );
        self.surface = MaskSurface::new(size);
        self.display_source = self.source.raster_at(size);
        self.selection_mask = None;
        self.overlay = RgbaImage::from_pixel(size.width, size.height, TRANSPARENT);
        self.mark_surface_dirty();
        self.overlay_generation = self.overlay_generation.wrapping_add(1);
        Ok(true)
    }

    pub fn mark_surface_dirty(&mut self) {
        self.surface_generation = self.surface_generation.wrapping_add(1);
    }

    // ========================================================================
    // SELECTION HELPERS
    // ========================================================================

    /// Returns `true` when at least one pixel is selected.
    pub fn has_selection(&self) -> bool {
        self.selection_mask.is_some()
    }

    /// Install `mask` as the selection, normalising an empty mask to `None`,
    /// and rebuild the overlay.
    pub fn set_selection(&mut self, mask: SelectionMask) {
        self.selection_mask = if mask.is_empty() { None } else { Some(mask) };
        self.rebuild_selection_overlay();
    }

    /// Remove the current selection and wipe the overlay.
    pub fn clear_selection(&mut self) {
        self.selection_mask = None;
        self.rebuild_selection_overlay();
    }

    /// Flip the selection.  With nothing selected this is a no-op.
    pub fn invert_selection(&mut self) -> bool {
        let Some(mut mask) = self.selection_mask.take() else {
            return false;
        };
        mask.invert();
        self.set_selection(mask);
        true
    }

    /// Re-render the hatched overlay from the selection mask: a tileable
    /// diagonal hatch clipped to the selected pixels.
    pub fn rebuild_selection_overlay(&mut self) {
        let width = self.overlay.width() as usize;
        match &self.selection_mask {
            None => {
                self.overlay.pixels_mut().for_each(|p| *p = TRANSPARENT);
            }
            Some(mask) => {
                let mask_raw = mask.as_gray().as_raw();
                let raw: &mut [u8] = &mut self.overlay;
                raw.par_chunks_mut(width * 4)
                    .enumerate()
                    .for_each(|(y, row)| {
                        for (x, px) in row.chunks_exact_mut(4).enumerate() {
                            let c = if mask_raw[y * width + x] != SELECTED {
                                TRANSPARENT
                            } else {
                                hatch_pixel(x as u32, y as u32)
                            };
                            px.copy_from_slice(&c.0);
                        }
                    });
            }
        }
        self.overlay_generation = self.overlay_generation.wrapping_add(1);
    }

    /// Paint the marker over the selected (or, with `invert`, unselected)
    /// pixels.  Returns `false` when there is no selection.
    pub fn mark_selection(&mut self, color: Rgba<u8>, invert: bool) -> bool {
        let Some(mask) = &self.selection_mask else {
            return false;
        };
        self.surface.mark_where(mask.as_gray(), !invert, color);
        self.mark_surface_dirty();
        true
    }
}

/// Hatch tile sample at `(x, y)`.
fn hatch_pixel(x: u32, y: u32) -> Rgba<u8> {
    if (x + y) % HATCH_PERIOD < HATCH_LINE {
        HATCH_COLOR
    } else {
        HATCH_FILL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 4]) -> SourceImage {
        SourceImage::new(RgbaImage::from_pixel(w, h, Rgba(c))).unwrap()
    }

    #[test]
    fn standalone_caps_width() {
        let size = fit_display_size(
            1024,
            1024,
            ContainerBounds::new(1600, 1200),
            SurfaceLayout::Standalone { cap: 900 },
        )
        .unwrap();
        assert_eq!(size, DisplaySize { width: 900, height: 900 });
    }

    #[test]
    fn tall_image_reflows_to_height() {
        let size = fit_display_size(
            500,
            2000,
            ContainerBounds::new(800, 600),
            SurfaceLayout::Embedded,
        )
        .unwrap();
        assert_eq!(size, DisplaySize { width: 150, height: 600 });
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let c = ContainerBounds::new(100, 100);
        assert!(fit_display_size(0, 10, c, SurfaceLayout::Embedded).is_err());
        assert!(
            fit_display_size(10, 10, ContainerBounds::new(0, 10), SurfaceLayout::Embedded)
                .is_err()
        );
        assert!(SourceImage::new(RgbaImage::new(0, 5)).is_err());
    }

    #[test]
    fn blend_over_transparent_takes_source() {
        let mut px = [0u8, 0, 0, 0];
        blend_over(&mut px, Rgba([200, 100, 50, 128]));
        assert_eq!(px, [200, 100, 50, 128]);
    }

    #[test]
    fn blend_over_accumulates_alpha() {
        let mut px = [0u8, 0, 0, 0];
        blend_over(&mut px, Rgba([255, 0, 0, 128]));
        blend_over(&mut px, Rgba([255, 0, 0, 128]));
        assert!(px[3] > 128);
        assert_eq!(px[0], 255);
    }

    #[test]
    fn restore_rejects_mismatched_snapshot() {
        let mut s = MaskSurface::new(DisplaySize { width: 4, height: 4 });
        assert!(!s.restore(RgbaImage::new(3, 3)));
        assert_eq!(s.width(), 4);
    }

    #[test]
    fn snapshot_is_independent() {
        let mut s = MaskSurface::new(DisplaySize { width: 2, height: 2 });
        let snap = s.snapshot();
        s.pixels_mut().put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        assert_eq!(snap.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn invert_without_selection_is_noop() {
        let mut c = CanvasState::new(
            solid(10, 10, [0, 0, 0, 255]),
            ContainerBounds::new(10, 10),
            SurfaceLayout::Embedded,
        )
        .unwrap();
        assert!(!c.invert_selection());
        assert!(!c.has_selection());
    }

    #[test]
    fn empty_selection_normalises_to_none() {
        let mut c = CanvasState::new(
            solid(4, 4, [0, 0, 0, 255]),
            ContainerBounds::new(4, 4),
            SurfaceLayout::Embedded,
        )
        .unwrap();
        c.set_selection(SelectionMask::new(c.display_size()));
        assert!(!c.has_selection());
    }

    #[test]
    fn overlay_is_clipped_to_selection() {
        let mut c = CanvasState::new(
            solid(8, 8, [0, 0, 0, 255]),
            ContainerBounds::new(8, 8),
            SurfaceLayout::Embedded,
        )
        .unwrap();
        let mut m = SelectionMask::new(c.display_size());
        m.set(2, 3, true);
        c.set_selection(m);
        assert!(c.overlay.get_pixel(2, 3).0[3] > 0);
        assert_eq!(c.overlay.get_pixel(3, 3).0[3], 0);
        c.clear_selection();
        assert!(c.overlay.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn reflow_to_same_size_keeps_content() {
        let mut c = CanvasState::new(
            solid(100, 50, [0, 0, 0, 255]),
            ContainerBounds::new(100, 100),
            SurfaceLayout::Embedded,
        )
        .unwrap();
        c.surface.pixels_mut().put_pixel(1, 1, Rgba([1, 1, 1, 255]));
        assert!(!c.reflow(ContainerBounds::new(100, 80), SurfaceLayout::Embedded).unwrap());
        assert_eq!(c.surface.alpha_at(1, 1), 255);
        assert!(c.reflow(ContainerBounds::new(50, 80), SurfaceLayout::Embedded).unwrap());
        assert_eq!(c.display_size(), DisplaySize { width: 50, height: 25 });
        assert_eq!(c.surface.alpha_at(1, 1), 0);
    }
}
