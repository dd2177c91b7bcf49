// ============================================================================
// Mask export: display-resolution marks -> native-resolution inpainting mask
// ============================================================================
//
// Output convention: opaque black everywhere, alpha 0 where the image should
// be regenerated.  Every marked display pixel clears a whole native block so
// upscaling never leaves unmarked seams between neighbouring marks.

use std::io::{BufWriter, Cursor};
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{CanvasState, MaskSurface};
use crate::error::EditorError;

/// Opaque black "keep" pixel.
pub const KEEP: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A native-resolution mask ready to hand to an inpainting backend.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskArtifact {
    pub image: RgbaImage,
}

impl MaskArtifact {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `true` when the pixel is marked for regeneration.
    pub fn is_transparent(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y).0[3] == 0
    }

    /// Number of pixels marked for regeneration.
    pub fn transparent_count(&self) -> usize {
        self.image
            .as_raw()
            .par_chunks_exact(4)
            .filter(|px| px[3] == 0)
            .count()
    }

    /// Inclusive `(x0, y0, x1, y1)` box around the transparent pixels.
    pub fn transparent_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, px) in self.image.enumerate_pixels() {
            if px.0[3] != 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds
    }

    /// Encode as a lossless RGBA PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, EditorError> {
        let mut out = Cursor::new(Vec::new());
        PngEncoder::new(&mut out)
            .write_image(
                self.image.as_raw(),
                self.image.width(),
                self.image.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|e| EditorError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }

    /// Write the PNG to `path`.
    pub fn save(&self, path: &Path) -> Result<(), EditorError> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        PngEncoder::new(writer)
            .write_image(
                self.image.as_raw(),
                self.image.width(),
                self.image.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|e| EditorError::Encode(e.to_string()))?;
        log::info!(
            "Mask written: {} ({}x{})",
            path.display(),
            self.image.width(),
            self.image.height()
        );
        Ok(())
    }
}

/// Upscale the marks on `surface` to a `native_w × native_h` mask.
///
/// A display pixel counts as marked when its alpha exceeds `threshold`.
/// Marked pixel `(dx, dy)` clears native columns
/// `floor(dx·sx) .. floor(dx·sx) + ceil(sx)` (likewise for rows), clamped to
/// the native bounds.
pub fn upscale_marks(
    surface: &MaskSurface,
    native_w: u32,
    native_h: u32,
    threshold: u8,
) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(native_w, native_h, KEEP);
    let (dw, dh) = (surface.width(), surface.height());
    if dw == 0 || dh == 0 || native_w == 0 || native_h == 0 {
        return out;
    }

    let sx = native_w as f64 / dw as f64;
    let sy = native_h as f64 / dh as f64;
    let block_w = sx.ceil() as u32;
    let block_h = sy.ceil() as u32;

    // Column spans per display x, shared by every row
    let col_spans: Vec<(u32, u32)> = (0..dw)
        .map(|dx| {
            let x0 = ((dx as f64 * sx).floor() as u32).min(native_w);
            (x0, (x0 + block_w).min(native_w))
        })
        .collect();

    let marks = surface.pixels().as_raw();
    let stride = native_w as usize * 4;

    for dy in 0..dh {
        let y0 = ((dy as f64 * sy).floor() as u32).min(native_h);
        let y1 = (y0 + block_h).min(native_h);
        if y0 >= y1 {
            continue;
        }
        let row = &marks[(dy * dw) as usize * 4..((dy + 1) * dw) as usize * 4];
        let spans: Vec<(u32, u32)> = row
            .chunks_exact(4)
            .zip(col_spans.iter())
            .filter(|(px, _)| px[3] > threshold)
            .map(|(_, span)| *span)
            .collect();
        if spans.is_empty() {
            continue;
        }

        let raw: &mut [u8] = &mut out;
        raw[y0 as usize * stride..y1 as usize * stride]
            .par_chunks_mut(stride)
            .for_each(|native_row| {
                for &(x0, x1) in &spans {
                    for x in x0..x1 {
                        native_row[x as usize * 4 + 3] = 0;
                    }
                }
            });
    }
    out
}

/// Build the native-resolution mask for `canvas`.  `None` when no surface
/// exists yet.
pub fn export_mask(canvas: Option<&CanvasState>, threshold: u8) -> Option<MaskArtifact> {
    let canvas = canvas?;
    let (nw, nh) = canvas.source.dimensions();
    let image = upscale_marks(&canvas.surface, nw, nh, threshold);
    let artifact = MaskArtifact { image };
    log::info!(
        "Mask exported: {}x{} from display {}x{}, {} px marked",
        nw,
        nh,
        canvas.surface.width(),
        canvas.surface.height(),
        artifact.transparent_count()
    );
    Some(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DisplaySize;

    fn surface(w: u32, h: u32) -> MaskSurface {
        MaskSurface::new(DisplaySize { width: w, height: h })
    }

    #[test]
    fn blank_surface_exports_fully_opaque() {
        let out = upscale_marks(&surface(10, 10), 37, 23, 10);
        assert_eq!(out.dimensions(), (37, 23));
        assert!(out.pixels().all(|p| *p == KEEP));
    }

    #[test]
    fn single_mark_clears_a_block() {
        let mut s = surface(10, 10);
        s.pixels_mut().put_pixel(2, 3, Rgba([255, 0, 0, 128]));
        let out = upscale_marks(&s, 40, 40, 10);
        let a = MaskArtifact { image: out };
        assert_eq!(a.transparent_count(), 16);
        assert_eq!(a.transparent_bounds(), Some((8, 12, 11, 15)));
    }

    #[test]
    fn faint_marks_are_ignored() {
        let mut s = surface(4, 4);
        s.pixels_mut().put_pixel(0, 0, Rgba([255, 0, 0, 10]));
        s.pixels_mut().put_pixel(1, 0, Rgba([255, 0, 0, 11]));
        let a = MaskArtifact { image: upscale_marks(&s, 4, 4, 10) };
        assert!(!a.is_transparent(0, 0));
        assert!(a.is_transparent(1, 0));
    }

    #[test]
    fn non_integer_scale_leaves_no_seams() {
        // 7 display px -> 10 native px: every native column must be covered
        let mut s = surface(7, 1);
        for x in 0..7 {
            s.pixels_mut().put_pixel(x, 0, Rgba([255, 0, 0, 255]));
        }
        let a = MaskArtifact { image: upscale_marks(&s, 10, 3, 10) };
        assert_eq!(a.transparent_count(), 30);
    }

    #[test]
    fn last_block_is_clamped() {
        let mut s = surface(3, 3);
        s.pixels_mut().put_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let a = MaskArtifact { image: upscale_marks(&s, 10, 10, 10) };
        assert_eq!(a.transparent_bounds(), Some((6, 6, 9, 9)));
    }

    #[test]
    fn no_canvas_exports_nothing() {
        assert!(export_mask(None, 10).is_none());
    }

    #[test]
    fn png_bytes_decode_back() {
        let mut s = surface(5, 5);
        s.pixels_mut().put_pixel(1, 1, Rgba([255, 0, 0, 200]));
        let a = MaskArtifact { image: upscale_marks(&s, 5, 5, 10) };
        let bytes = a.encode_png().unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let back = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(back, a.image);
    }
}
