// ============================================================================
// Smart select: colour-tolerance flood fill merged into the selection mask
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::canvas::{CanvasState, SelectionMask};
use crate::components::tools::SelectMode;

/// Does `color` fall within `tolerance` of `seed`?
///
/// Sum of absolute RGB differences against `3 × tolerance`; alpha is ignored.
pub fn within_tolerance(seed: &Rgba<u8>, color: &Rgba<u8>, tolerance: u32) -> bool {
    let diff: u32 = (0..3)
        .map(|c| (seed.0[c] as i32 - color.0[c] as i32).unsigned_abs())
        .sum();
    diff <= tolerance.saturating_mul(3)
}

/// Round a pointer position to a pixel, `None` when outside `w × h`.
pub fn seed_pixel(pos: (f32, f32), width: u32, height: u32) -> Option<(u32, u32)> {
    let x = pos.0.round();
    let y = pos.1.round();
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= width || y >= height {
        return None;
    }
    Some((x, y))
}

/// 4-connected flood fill from `seed` over `pixels`.
///
/// Iterative (explicit stack) so large regions cannot overflow the call
/// stack; every pixel is visited at most once.  Returns the region as a
/// fresh mask.
pub fn flood_region(pixels: &RgbaImage, seed: (u32, u32), tolerance: u32) -> SelectionMask {
    let (width, height) = pixels.dimensions();
    let mut region = SelectionMask::new(crate::canvas::DisplaySize { width, height });
    if seed.0 >= width || seed.1 >= height {
        return region;
    }

    let target = *pixels.get_pixel(seed.0, seed.1);
    let w = width as usize;
    let mut visited = vec![false; w * height as usize];
    let mut stack = Vec::with_capacity(1024);

    visited[seed.1 as usize * w + seed.0 as usize] = true;
    stack.push(seed);

    while let Some((x, y)) = stack.pop() {
        region.set(x, y, true);

        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            // wrapping_sub turns -1 into u32::MAX, caught here
            if nx >= width || ny >= height {
                continue;
            }
            let vi = ny as usize * w + nx as usize;
            if visited[vi] {
                continue;
            }
            visited[vi] = true;
            if within_tolerance(&target, pixels.get_pixel(nx, ny), tolerance) {
                stack.push((nx, ny));
            }
        }
    }

    region
}

/// Merge `region` into `base` according to `mode`.
pub fn merge_region(base: &mut SelectionMask, region: &SelectionMask, mode: SelectMode) {
    let size = base.size();
    if region.size() != size {
        return;
    }
    let keep = mode == SelectMode::Include;
    for y in 0..size.height {
        for x in 0..size.width {
            if region.is_selected(x, y) {
                base.set(x, y, keep);
            }
        }
    }
}

/// Click-to-select on the canvas.  Returns `true` when the selection changed
/// hands (the overlay was rebuilt).  Out-of-bounds clicks and Exclude with
/// nothing selected are no-ops.
pub fn select_at(
    canvas: &mut CanvasState,
    pos: (f32, f32),
    mode: SelectMode,
    tolerance: u32,
) -> bool {
    let size = canvas.display_size();
    let Some(seed) = seed_pixel(pos, size.width, size.height) else {
        return false;
    };
    if mode == SelectMode::Exclude && !canvas.has_selection() {
        return false;
    }

    let region = flood_region(&canvas.display_source, seed, tolerance);
    let mut mask = canvas
        .selection_mask
        .take()
        .unwrap_or_else(|| SelectionMask::new(size));
    merge_region(&mut mask, &region, mode);

    log::debug!(
        "Smart select {:?} at ({}, {}): region {} px",
        mode,
        seed.0,
        seed.1,
        region.selected_count()
    );
    canvas.set_selection(mask);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with(w: u32, h: u32, base: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(base))
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let seed = Rgba([100, 100, 100, 255]);
        assert!(within_tolerance(&seed, &Rgba([132, 132, 132, 255]), 32));
        assert!(within_tolerance(&seed, &Rgba([4, 100, 100, 0]), 32));
        assert!(!within_tolerance(&seed, &Rgba([133, 132, 132, 255]), 32));
    }

    #[test]
    fn huge_tolerance_matches_everything() {
        let seed = Rgba([0, 0, 0, 255]);
        assert!(within_tolerance(&seed, &Rgba([255, 255, 255, 255]), u32::MAX));
        assert!(within_tolerance(&seed, &Rgba([255, 255, 255, 255]), 2_000_000_000));
    }

    #[test]
    fn fill_is_four_connected() {
        // Two white pixels touching only at a corner
        let mut img = image_with(3, 3, [0, 0, 0, 255]);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let region = flood_region(&img, (0, 0), 32);
        assert!(region.is_selected(0, 0));
        assert!(!region.is_selected(1, 1));
        assert_eq!(region.selected_count(), 1);
    }

    #[test]
    fn fill_stops_at_colour_edge() {
        let mut img = image_with(10, 4, [10, 10, 10, 255]);
        for y in 0..4 {
            img.put_pixel(5, y, Rgba([250, 250, 250, 255]));
        }
        let region = flood_region(&img, (1, 1), 32);
        assert_eq!(region.selected_count(), 5 * 4);
        assert!(!region.is_selected(6, 0));
    }

    #[test]
    fn large_fill_does_not_recurse() {
        let img = image_with(1000, 1000, [7, 7, 7, 255]);
        let region = flood_region(&img, (500, 500), 32);
        assert_eq!(region.selected_count(), 1_000_000);
    }

    #[test]
    fn seed_rounding_and_bounds() {
        assert_eq!(seed_pixel((2.4, 2.6), 10, 10), Some((2, 3)));
        assert_eq!(seed_pixel((9.6, 0.0), 10, 10), None);
        assert_eq!(seed_pixel((-0.6, 1.0), 10, 10), None);
        assert_eq!(seed_pixel((-0.4, 1.0), 10, 10), Some((0, 1)));
        assert_eq!(seed_pixel((f32::NAN, 1.0), 10, 10), None);
    }
}
