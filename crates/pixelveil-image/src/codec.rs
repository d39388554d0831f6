// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region codec: copies the exact pixels of a rectangle out of an image and
// draws them back later.
//
// Extraction and restoration both derive the integer rectangle through
// `PixelRectF::clamp_to_image` with the codec's margin.  As long as the two
// images share dimensions, the restored block lands on exactly the pixels it
// was taken from.

use image::RgbaImage;
use image::imageops;
use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::{PixelBlock, PixelRect, PixelRectF, SkipReason};
use tracing::{debug, trace};

/// Default margin absorbing rounding at mask edges.
pub const DEFAULT_MARGIN_PX: u32 = 2;

/// A block together with the rectangle it was taken from.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub rect: PixelRect,
    pub block: PixelBlock,
}

/// Extracts and restores raw RGBA blocks.
#[derive(Debug, Clone, Copy)]
pub struct RegionCodec {
    margin: u32,
}

impl Default for RegionCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN_PX)
    }
}

impl RegionCodec {
    pub fn new(margin: u32) -> Self {
        Self { margin }
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    /// The integer rectangle this codec uses for `rect` in a `width` x
    /// `height` image.
    pub fn resolve(
        &self,
        rect: &PixelRectF,
        width: u32,
        height: u32,
    ) -> std::result::Result<PixelRect, SkipReason> {
        rect.clamp_to_image(self.margin, width, height)
    }

    /// Copy the (margin-expanded, clamped) rectangle into a dense block.
    pub fn extract(
        &self,
        image: &RgbaImage,
        rect: &PixelRectF,
    ) -> std::result::Result<Extracted, SkipReason> {
        let resolved = self.resolve(rect, image.width(), image.height())?;
        let patch =
            imageops::crop_imm(image, resolved.x, resolved.y, resolved.width, resolved.height)
                .to_image();

        trace!(
            x = resolved.x,
            y = resolved.y,
            width = resolved.width,
            height = resolved.height,
            "region extracted"
        );
        Ok(Extracted {
            rect: resolved,
            block: PixelBlock {
                width: patch.width(),
                height: patch.height(),
                bytes_per_row: patch.width() * 4,
                rgba: patch.into_raw(),
            },
        })
    }

    /// Draw `block` back at the rectangle derived from `rect`.
    ///
    /// Fails without touching the image if the rectangle is unusable or the
    /// block has different dimensions than the rectangle.
    pub fn restore(
        &self,
        image: &mut RgbaImage,
        rect: &PixelRectF,
        block: &PixelBlock,
    ) -> Result<PixelRect> {
        let resolved = self.resolve(rect, image.width(), image.height())?;

        if block.width != resolved.width || block.height != resolved.height {
            return Err(PixelveilError::RegionSizeMismatch {
                expected_width: resolved.width,
                expected_height: resolved.height,
                actual_width: block.width,
                actual_height: block.height,
            });
        }

        let patch = RgbaImage::from_raw(block.width, block.height, block.rgba.clone())
            .ok_or_else(|| {
                PixelveilError::InvalidPixelBlock("buffer shorter than dimensions".into())
            })?;
        imageops::replace(image, &patch, resolved.x as i64, resolved.y as i64);

        debug!(
            x = resolved.x,
            y = resolved.y,
            width = resolved.width,
            height = resolved.height,
            "region restored"
        );
        Ok(resolved)
    }
}
