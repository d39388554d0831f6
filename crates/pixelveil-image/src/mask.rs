// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Visual masking of sensitive rectangles.  Only the pixels inside the given
// rectangle change; the rest of the image is left byte-identical.

use image::RgbaImage;
use image::imageops;
use imageproc::filter::gaussian_blur_f32;
use pixelveil_core::{MaskStyle, PixelRect};
use tracing::{trace, warn};

/// Smallest pixelation cell.  A 1x1 cell would leave the region unchanged.
const MIN_CELL: u32 = 2;

/// Fill for a thin region with no neighbouring pixels to sample.
const FLAT_FILL: [u8; 4] = [128, 128, 128, 255];

/// Sigma used when a configured blur strength is unusable.
const FALLBACK_SIGMA: f32 = 8.0;

/// Mask `rect` in place.  Rectangles outside the image are clipped.
pub fn apply_mask(image: &mut RgbaImage, rect: PixelRect, style: MaskStyle) {
    let Some(rect) = clip(rect, image.width(), image.height()) else {
        return;
    };
    match style {
        MaskStyle::Pixelate { block_size } => pixelate(image, rect, block_size.max(MIN_CELL)),
        MaskStyle::GaussianBlur { sigma } => {
            let sigma = if sigma.is_finite() && sigma > 0.0 {
                sigma
            } else {
                warn!(sigma, "invalid blur sigma, using fallback");
                FALLBACK_SIGMA
            };
            blur(image, rect, sigma);
        }
    }
    trace!(x = rect.x, y = rect.y, width = rect.width, height = rect.height, "region masked");
}

fn clip(rect: PixelRect, width: u32, height: u32) -> Option<PixelRect> {
    if rect.x >= width || rect.y >= height {
        return None;
    }
    let w = rect.width.min(width - rect.x);
    let h = rect.height.min(height - rect.y);
    (w > 0 && h > 0).then_some(PixelRect {
        x: rect.x,
        y: rect.y,
        width: w,
        height: h,
    })
}

/// Split `len` pixels starting at `start` into runs of `cell`.  A trailing
/// run shorter than `MIN_CELL` is folded into the one before it.
fn cell_spans(start: u32, len: u32, cell: u32) -> Vec<(u32, u32)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    while offset < len {
        let remaining = len - offset;
        let mut size = cell.min(remaining);
        if remaining - size < MIN_CELL {
            size = remaining;
        }
        spans.push((start + offset, size));
        offset += size;
    }
    spans
}

fn average(image: &RgbaImage, rect: PixelRect) -> [u8; 4] {
    let mut sum = [0u64; 4];
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            for (acc, c) in sum.iter_mut().zip(image.get_pixel(x, y).0) {
                *acc += c as u64;
            }
        }
    }
    let n = rect.area().max(1);
    sum.map(|s| (s / n) as u8)
}

fn fill(image: &mut RgbaImage, rect: PixelRect, colour: [u8; 4]) {
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            image.get_pixel_mut(x, y).0 = colour;
        }
    }
}

/// Colour for a region less than `MIN_CELL` wide or tall.  Averaging the
/// region alone could return its own pixels, so the surrounding pixels are
/// sampled as well.
fn thin_region_colour(image: &RgbaImage, rect: PixelRect, cell: u32) -> [u8; 4] {
    let pad = cell / 2;
    let x0 = rect.x.saturating_sub(pad);
    let y0 = rect.y.saturating_sub(pad);
    let x1 = rect.right().saturating_add(pad).min(image.width());
    let y1 = rect.bottom().saturating_add(pad).min(image.height());
    let window = PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    };
    if window.area() <= rect.area() {
        return FLAT_FILL;
    }
    average(image, window)
}

/// Replace each `cell` x `cell` tile with its average colour.  No tile is
/// smaller than `MIN_CELL` on either side.
fn pixelate(image: &mut RgbaImage, rect: PixelRect, cell: u32) {
    if rect.width < MIN_CELL || rect.height < MIN_CELL {
        let colour = thin_region_colour(image, rect, cell);
        fill(image, rect, colour);
        return;
    }
    for (cy, ch) in cell_spans(rect.y, rect.height, cell) {
        for (cx, cw) in cell_spans(rect.x, rect.width, cell) {
            let tile = PixelRect {
                x: cx,
                y: cy,
                width: cw,
                height: ch,
            };
            let colour = average(image, tile);
            fill(image, tile, colour);
        }
    }
}

fn blur(image: &mut RgbaImage, rect: PixelRect, sigma: f32) {
    let patch = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
    let blurred = gaussian_blur_f32(&patch, sigma);
    imageops::replace(image, &blurred, rect.x as i64, rect.y as i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checkerboard(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    fn outside_unchanged(before: &RgbaImage, after: &RgbaImage, rect: PixelRect) -> bool {
        before.enumerate_pixels().all(|(x, y, px)| {
            let inside = x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom();
            inside || after.get_pixel(x, y) == px
        })
    }

    #[test]
    fn pixelate_averages_cells() {
        let before = checkerboard(32, 32);
        let mut after = before.clone();
        let rect = PixelRect { x: 4, y: 4, width: 8, height: 8 };
        apply_mask(&mut after, rect, MaskStyle::Pixelate { block_size: 4 });

        // Every 4x4 cell of a checkerboard averages to mid-grey.
        let px = after.get_pixel(5, 5);
        assert!((px.0[0] as i32 - 127).abs() <= 1);
        assert_eq!(after.get_pixel(4, 4), after.get_pixel(7, 7));
        assert!(outside_unchanged(&before, &after, rect));
    }

    fn distinct(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([
                (x * 37 + y * 11) as u8,
                ((x * 13) ^ (y * 29)) as u8,
                (x * y * 7 + 3) as u8,
                255,
            ])
        })
    }

    fn no_original_pixel_survives(before: &RgbaImage, after: &RgbaImage, rect: PixelRect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                assert_ne!(after.get_pixel(x, y), before.get_pixel(x, y), "({x}, {y})");
            }
        }
    }

    #[test]
    fn small_regions_are_fully_pixelated() {
        let before = distinct(40, 40);
        let style = MaskStyle::Pixelate { block_size: 12 };

        for rect in [
            PixelRect { x: 20, y: 20, width: 1, height: 1 },
            PixelRect { x: 0, y: 0, width: 1, height: 1 },
            PixelRect { x: 5, y: 5, width: 13, height: 13 },
        ] {
            let mut after = before.clone();
            apply_mask(&mut after, rect, style);
            no_original_pixel_survives(&before, &after, rect);
            assert!(outside_unchanged(&before, &after, rect));
        }
    }

    #[test]
    fn trailing_cells_are_merged() {
        assert_eq!(cell_spans(5, 13, 12), vec![(5, 13)]);
        assert_eq!(cell_spans(0, 25, 12), vec![(0, 12), (12, 13)]);
        assert_eq!(cell_spans(0, 24, 12), vec![(0, 12), (12, 12)]);
        assert_eq!(cell_spans(0, 3, 2), vec![(0, 3)]);
    }

    #[test]
    fn single_pixel_image_gets_flat_fill() {
        let mut image = RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 255]));
        apply_mask(
            &mut image,
            PixelRect { x: 0, y: 0, width: 1, height: 1 },
            MaskStyle::Pixelate { block_size: 8 },
        );
        assert_eq!(image.get_pixel(0, 0).0, FLAT_FILL);
    }

    #[test]
    fn blur_changes_only_the_region() {
        let before = checkerboard(40, 30);
        let mut after = before.clone();
        let rect = PixelRect { x: 10, y: 5, width: 12, height: 10 };
        apply_mask(&mut after, rect, MaskStyle::GaussianBlur { sigma: 3.0 });

        assert_ne!(after.get_pixel(15, 10), before.get_pixel(15, 10));
        assert!(outside_unchanged(&before, &after, rect));
    }

    #[test]
    fn degenerate_settings_still_mask() {
        let before = checkerboard(16, 16);
        let rect = PixelRect { x: 0, y: 0, width: 8, height: 8 };

        let mut a = before.clone();
        apply_mask(&mut a, rect, MaskStyle::Pixelate { block_size: 0 });
        assert_ne!(a, before);

        let mut b = before.clone();
        apply_mask(&mut b, rect, MaskStyle::GaussianBlur { sigma: f32::NAN });
        assert_ne!(b, before);
    }

    #[test]
    fn out_of_image_rect_is_clipped() {
        let before = checkerboard(10, 10);
        let mut after = before.clone();
        apply_mask(
            &mut after,
            PixelRect { x: 6, y: 6, width: 50, height: 50 },
            MaskStyle::default(),
        );
        assert_ne!(after, before);

        let mut untouched = before.clone();
        apply_mask(
            &mut untouched,
            PixelRect { x: 20, y: 0, width: 5, height: 5 },
            MaskStyle::default(),
        );
        assert_eq!(untouched, before);
    }
}
