// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image decode/encode helpers.  Everything inside the pipeline works on
// `RgbaImage`; these functions are the only place where encoded formats
// appear.  PNG is used for output because it is lossless: a lossy format
// would alter the blurred image and the restored pixels would no longer sit
// on an identical background.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use pixelveil_core::error::{PixelveilError, Result};
use tracing::{debug, info, instrument};

/// Load an image file and convert it to RGBA8.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_rgba(path: impl AsRef<Path>) -> Result<RgbaImage> {
    let img = image::open(path.as_ref()).map_err(|err| {
        PixelveilError::ImageError(format!(
            "failed to open {}: {}",
            path.as_ref().display(),
            err
        ))
    })?;
    info!(width = img.width(), height = img.height(), "Image loaded");
    Ok(img.to_rgba8())
}

/// Decode encoded bytes (JPEG, PNG, ...) into RGBA8.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode_rgba(data: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory(data).map_err(|err| {
        PixelveilError::ImageError(format!("failed to decode image: {}", err))
    })?;
    debug!(
        width = img.width(),
        height = img.height(),
        "Image decoded from bytes"
    );
    Ok(img.to_rgba8())
}

/// Encode as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|err| PixelveilError::ImageError(format!("PNG encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Write a PNG file.
pub fn save_png(image: &RgbaImage, path: impl AsRef<Path>) -> Result<()> {
    let bytes = encode_png(image)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_is_lossless() {
        let img = RgbaImage::from_fn(17, 9, |x, y| {
            Rgba([(x * 13) as u8, (y * 29) as u8, (x ^ y) as u8, 200])
        });
        let bytes = encode_png(&img).unwrap();
        assert_eq!(decode_rgba(&bytes).unwrap(), img);
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = decode_rgba(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PixelveilError::ImageError(_)));
    }
}
