// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Coordinate normalisation between detector space and pixel space.
//
// Detectors report boxes in a unit square whose origin is the BOTTOM-left
// corner of the image.  Pixel buffers are addressed from the TOP-left corner.
// Every rectangle that is sealed or restored goes through
// `PixelRectF::clamp_to_image`, so both legs of the round trip agree on the
// exact integer rectangle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rectangle in unit-normalised detector coordinates (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect01 {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A pixel-space rectangle before rounding (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An integer pixel rectangle fully contained in its image (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Why a region could not be turned into a usable pixel rectangle.
///
/// Always recoverable: the region is skipped and processing continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SkipReason {
    #[error("rectangle has zero or negative area")]
    Degenerate,
    #[error("rectangle lies outside the image")]
    OutOfBounds,
    #[error("rectangle has non-finite coordinates")]
    NonFinite,
}

impl Rect01 {
    /// Box with origin `(x, y)` at its bottom-left corner.  Values are not
    /// validated here; geometry checks happen when converting to pixels.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a normalised box from a top-left-origin pixel rectangle.
    ///
    /// Inverse of [`Rect01::to_pixel_rect`]; handy for detectors that report
    /// pixel boxes.
    pub fn from_top_left_pixels(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let iw = image_width.max(1) as f64;
        let ih = image_height.max(1) as f64;
        Self {
            x: x / iw,
            y: 1.0 - (y + height) / ih,
            width: width / iw,
            height: height / ih,
        }
    }

    /// Convert to pixel space for an image of `image_width` x `image_height`.
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> PixelRectF {
        let w = image_width as f64;
        let h = image_height as f64;
        PixelRectF {
            x: self.x * w,
            y: (1.0 - self.y - self.height) * h,
            width: self.width * w,
            height: self.height * h,
        }
    }

    /// Area as a fraction of the image.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-union with another box (0.0 when disjoint).
    pub fn iou(&self, other: &Rect01) -> f64 {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

impl PixelRectF {
    /// Expand by `margin` pixels on every side, snap outwards to whole pixels
    /// and intersect with `[0, image_width) x [0, image_height)`.
    pub fn clamp_to_image(
        &self,
        margin: u32,
        image_width: u32,
        image_height: u32,
    ) -> Result<PixelRect, SkipReason> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(SkipReason::NonFinite);
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(SkipReason::Degenerate);
        }

        let m = margin as f64;
        let x0 = (self.x - m).floor().max(0.0);
        let y0 = (self.y - m).floor().max(0.0);
        let x1 = (self.x + self.width + m).ceil().min(image_width as f64);
        let y1 = (self.y + self.height + m).ceil().min(image_height as f64);

        if x1 <= x0 || y1 <= y0 {
            return Err(SkipReason::OutOfBounds);
        }

        Ok(PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

impl PixelRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// One past the last column.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One past the last row.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}
