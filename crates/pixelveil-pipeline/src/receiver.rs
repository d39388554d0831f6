// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Receiver leg: decrypt each sealed region and draw it back into the blurred
// image.  A failing region is reported and skipped; the others are still
// restored.

use std::fmt;

use image::RgbaImage;
use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::{PixelBlock, Rect01};
use pixelveil_image::RegionCodec;
use pixelveil_security::{ImageKey, RegionSealer, region_aad};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::package::{ENCRYPTION_SCHEME, SealedRegion, SecurePackage};

/// Coarse reason a single region was not restored.  Deliberately carries no
/// cryptographic detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionFailureReason {
    /// Wrong key or tampered ciphertext, nonce or tag.
    Authentication,
    /// The rectangle does not fit the received image.
    Geometry,
    /// Decrypted payload is not a pixel block.
    CorruptBlock,
    /// Block dimensions differ from the rectangle.
    SizeMismatch,
}

impl fmt::Display for RegionFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authentication => "could not be decrypted",
            Self::Geometry => "does not fit the image",
            Self::CorruptBlock => "contains corrupt pixel data",
            Self::SizeMismatch => "has the wrong dimensions",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionFailure {
    pub region_id: String,
    pub reason: RegionFailureReason,
}

/// Best-effort reconstruction of one image.
#[derive(Debug, Clone)]
pub struct OpenOutcome {
    /// The blurred image with every restorable region drawn back in.
    pub image: RgbaImage,
    /// Regions restored successfully.
    pub restored: usize,
    /// Regions listed in the package.
    pub total: usize,
    /// One entry per region that was not restored, in package order.
    pub failures: Vec<RegionFailure>,
}

impl OpenOutcome {
    pub fn is_complete(&self) -> bool {
        self.restored == self.total
    }

    /// "N of M regions restored".
    pub fn summary(&self) -> String {
        format!("{} of {} regions restored", self.restored, self.total)
    }
}

#[derive(Debug, Clone)]
struct DecryptedRegion {
    id: String,
    normalized_box: Rect01,
    block: std::result::Result<PixelBlock, RegionFailureReason>,
}

/// Plaintext blocks recovered from a package, not yet drawn into an image.
#[derive(Debug, Clone)]
pub struct DecryptedRegions {
    regions: Vec<DecryptedRegion>,
    margin: u32,
}

impl DecryptedRegions {
    /// Regions whose block decrypted and parsed.
    pub fn decrypted(&self) -> usize {
        self.regions.iter().filter(|r| r.block.is_ok()).count()
    }

    pub fn total(&self) -> usize {
        self.regions.len()
    }
}

fn decrypt_region(
    region: &SealedRegion,
    asset_id: &str,
    sealer: &RegionSealer,
) -> std::result::Result<PixelBlock, RegionFailureReason> {
    let plaintext = sealer
        .open(
            &region.ciphertext,
            &region.nonce,
            &region.auth_tag,
            &region_aad(asset_id, &region.id),
        )
        .map_err(|_| RegionFailureReason::Authentication)?;
    PixelBlock::from_bytes(&plaintext).map_err(|_| RegionFailureReason::CorruptBlock)
}

/// First receiver pass: authenticate and decrypt every region of `package`.
///
/// Package-level problems (wrong key, unknown scheme) fail the whole call.
/// A region that does not decrypt is carried forward as a failure.
#[instrument(skip_all, fields(asset = %package.asset_id, regions = package.sealed_regions.len()))]
pub fn decrypt_regions(package: &SecurePackage, key: &ImageKey) -> Result<DecryptedRegions> {
    if package.scheme_tag != ENCRYPTION_SCHEME {
        return Err(PixelveilError::UnsupportedScheme(package.scheme_tag.clone()));
    }
    if package.image_key_id != key.id() {
        return Err(PixelveilError::KeyMismatch {
            expected: package.image_key_id.to_string(),
            actual: key.id().to_string(),
        });
    }

    let sealer = RegionSealer::new(key)?;
    let regions: Vec<_> = package
        .sealed_regions
        .iter()
        .map(|region| DecryptedRegion {
            id: region.id.clone(),
            normalized_box: region.normalized_box,
            block: decrypt_region(region, &package.asset_id, &sealer),
        })
        .collect();

    let decrypted = DecryptedRegions {
        regions,
        margin: package.region_margin_px,
    };
    debug!(decrypted = decrypted.decrypted(), total = decrypted.total(), "regions decrypted");
    Ok(decrypted)
}

/// Second receiver pass: draw every decrypted block into a copy of
/// `blurred`.
///
/// Rectangles are rebuilt with the margin recorded in the package, so the
/// receiver's own configuration does not matter.
pub fn restore_regions(blurred: &RgbaImage, decrypted: DecryptedRegions) -> OpenOutcome {
    let codec = RegionCodec::new(decrypted.margin);
    let (width, height) = blurred.dimensions();
    let mut image = blurred.clone();
    let mut failures = Vec::new();
    let total = decrypted.regions.len();

    for region in decrypted.regions {
        let restored = region.block.and_then(|block| {
            let rect = region.normalized_box.to_pixel_rect(width, height);
            codec
                .restore(&mut image, &rect, &block)
                .map(|_| ())
                .map_err(|e| match e {
                    PixelveilError::RegionSizeMismatch { .. } => RegionFailureReason::SizeMismatch,
                    PixelveilError::InvalidPixelBlock(_) => RegionFailureReason::CorruptBlock,
                    _ => RegionFailureReason::Geometry,
                })
        });
        if let Err(reason) = restored {
            warn!(region = %region.id, %reason, "region not restored");
            failures.push(RegionFailure {
                region_id: region.id,
                reason,
            });
        }
    }

    let outcome = OpenOutcome {
        image,
        restored: total - failures.len(),
        total,
        failures,
    };
    info!(restored = outcome.restored, total, "image opened");
    outcome
}

/// Restore every region of `package` into a copy of `blurred`.
pub fn open_image(
    blurred: &RgbaImage,
    package: &SecurePackage,
    key: &ImageKey,
) -> Result<OpenOutcome> {
    let decrypted = decrypt_regions(package, key)?;
    Ok(restore_regions(blurred, decrypted))
}
