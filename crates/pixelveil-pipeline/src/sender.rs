// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sender leg: extract, seal and mask every sensitive region of one image.
//
// All blocks are extracted from the untouched original before any mask is
// drawn, and the mask is drawn over exactly the rectangles that were sealed.
// The package and the blurred image therefore always describe the same set
// of rectangles, including when regions overlap.

use image::RgbaImage;
use pixelveil_core::error::Result;
use pixelveil_core::{
    ClassifiedTextRegion, DetectedObjectRegion, MaskStyle, PipelineConfig, Rect01, RegionType,
    SkipReason,
};
use pixelveil_image::{Extracted, RegionCodec, apply_mask};
use pixelveil_security::{ImageKey, RegionSealer, region_aad};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::package::{SealedRegion, SecurePackage};

/// Geometry and masking settings for the sender leg.
#[derive(Debug, Clone, Copy)]
pub struct SealOptions {
    pub margin: u32,
    pub mask_style: MaskStyle,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for SealOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            margin: config.region_margin_px,
            mask_style: config.mask_style,
        }
    }
}

/// A sensitive region that could not be sealed because of its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRegion {
    pub region_type: RegionType,
    pub normalized_box: Rect01,
    pub label: String,
    pub reason: SkipReason,
}

/// Result of sealing one image.
#[derive(Debug, Clone)]
pub struct SealOutcome {
    pub package: SecurePackage,
    pub blurred: RgbaImage,
    pub skipped: Vec<SkippedRegion>,
}

#[derive(Debug, Clone)]
struct Candidate {
    region_type: RegionType,
    normalized_box: Rect01,
    label: String,
}

fn sensitive_candidates(
    text_regions: &[ClassifiedTextRegion],
    object_regions: &[DetectedObjectRegion],
) -> Vec<Candidate> {
    let text = text_regions
        .iter()
        .filter(|r| r.is_sensitive())
        .map(|r| Candidate {
            region_type: RegionType::Text,
            normalized_box: r.region.normalized_box,
            label: r.verdict.category.label().to_owned(),
        });
    let objects = object_regions
        .iter()
        .filter(|r| r.is_sensitive)
        .map(|r| Candidate {
            region_type: RegionType::Object,
            normalized_box: r.normalized_box,
            label: r.class_name.clone(),
        });
    text.chain(objects).collect()
}

/// Plaintext blocks lifted from the untouched original, not yet sealed.
#[derive(Debug, Clone)]
pub struct ExtractedRegions {
    regions: Vec<(Candidate, Extracted)>,
    skipped: Vec<SkippedRegion>,
    margin: u32,
}

impl ExtractedRegions {
    /// Number of regions that will be sealed.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedRegion] {
        &self.skipped
    }
}

/// First sender pass: resolve every sensitive region against `original` and
/// copy its pixels out.  Regions with unusable geometry are recorded as
/// skipped.
#[instrument(skip_all, fields(width = original.width(), height = original.height()))]
pub fn extract_regions(
    original: &RgbaImage,
    text_regions: &[ClassifiedTextRegion],
    object_regions: &[DetectedObjectRegion],
    margin: u32,
) -> ExtractedRegions {
    let codec = RegionCodec::new(margin);
    let (width, height) = original.dimensions();
    let mut regions = Vec::new();
    let mut skipped = Vec::new();

    for candidate in sensitive_candidates(text_regions, object_regions) {
        let rect = candidate.normalized_box.to_pixel_rect(width, height);
        match codec.extract(original, &rect) {
            Ok(extracted) => regions.push((candidate, extracted)),
            Err(reason) => {
                debug!(label = %candidate.label, %reason, "region skipped");
                skipped.push(SkippedRegion {
                    region_type: candidate.region_type,
                    normalized_box: candidate.normalized_box,
                    label: candidate.label,
                    reason,
                });
            }
        }
    }

    debug!(extracted = regions.len(), skipped = skipped.len(), "regions extracted");
    ExtractedRegions {
        regions,
        skipped,
        margin,
    }
}

/// Second sender pass: encrypt each extracted block under `key` and mask the
/// same rectangles in a copy of `original`.
#[instrument(skip_all, fields(asset = asset_id, key_id = %key.id()))]
pub fn seal_extracted(
    asset_id: &str,
    original: &RgbaImage,
    extracted: ExtractedRegions,
    key: &ImageKey,
    mask_style: MaskStyle,
) -> Result<SealOutcome> {
    let sealer = RegionSealer::new(key)?;
    let mut sealed_regions = Vec::with_capacity(extracted.regions.len());
    let mut blurred = original.clone();

    for (candidate, region) in extracted.regions {
        let id = format!("region-{}", sealed_regions.len());
        let sealed = sealer.seal(&region.block.to_bytes(), &region_aad(asset_id, &id))?;
        sealed_regions.push(SealedRegion {
            id,
            region_type: candidate.region_type,
            normalized_box: candidate.normalized_box,
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            auth_tag: sealed.tag,
            sensitivity_label: Some(candidate.label),
        });
        apply_mask(&mut blurred, region.rect, mask_style);
    }

    info!(
        sealed = sealed_regions.len(),
        skipped = extracted.skipped.len(),
        "image sealed"
    );
    Ok(SealOutcome {
        package: SecurePackage::new(asset_id, key.id(), sealed_regions)
            .with_region_margin(extracted.margin),
        blurred,
        skipped: extracted.skipped,
    })
}

/// Seal every sensitive region of `original` under `key` and render the
/// shareable blurred image.
pub fn seal_image(
    asset_id: &str,
    original: &RgbaImage,
    text_regions: &[ClassifiedTextRegion],
    object_regions: &[DetectedObjectRegion],
    key: &ImageKey,
    options: &SealOptions,
) -> Result<SealOutcome> {
    let extracted = extract_regions(original, text_regions, object_regions, options.margin);
    seal_extracted(asset_id, original, extracted, key, options.mask_style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pixelveil_core::{
        ClassificationMethod, ClassificationVerdict, DetectedTextRegion, PiiCategory,
    };
    use std::collections::HashSet;
    use std::time::Duration;

    fn photo(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 5) as u8, (y * 3) as u8, ((x ^ y) * 7) as u8, 255])
        })
    }

    fn text(text: &str, category: PiiCategory, b: Rect01) -> ClassifiedTextRegion {
        ClassifiedTextRegion {
            region: DetectedTextRegion {
                text: text.into(),
                normalized_box: b,
                confidence: 0.9,
            },
            verdict: ClassificationVerdict {
                category,
                confidence: 0.95,
                method: ClassificationMethod::Regex,
                latency: Duration::ZERO,
            },
        }
    }

    #[test]
    fn only_sensitive_regions_are_sealed() {
        let key = ImageKey::generate().unwrap();
        let texts = vec![
            text("S1234567A", PiiCategory::NationalId, Rect01::new(0.1, 0.1, 0.2, 0.1)),
            text("Hello", PiiCategory::NonSensitive, Rect01::new(0.5, 0.5, 0.2, 0.1)),
        ];
        let objects = vec![
            DetectedObjectRegion::new("person", Rect01::new(0.6, 0.1, 0.3, 0.5), 0.9),
            DetectedObjectRegion::new("bicycle", Rect01::new(0.0, 0.6, 0.3, 0.3), 0.9),
        ];

        let options = SealOptions::default();
        let outcome =
            seal_image("asset", &photo(64, 64), &texts, &objects, &key, &options).unwrap();
        let regions = &outcome.package.sealed_regions;
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].region_type, RegionType::Text);
        assert_eq!(regions[0].sensitivity_label.as_deref(), Some("national_id"));
        assert_eq!(regions[1].region_type, RegionType::Object);
        assert_eq!(regions[1].sensitivity_label.as_deref(), Some("person"));
        assert_eq!(outcome.package.image_key_id, key.id());
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn blurred_image_changes_exactly_the_sealed_rectangles() {
        let key = ImageKey::generate().unwrap();
        let original = photo(80, 60);
        let b = Rect01::new(0.25, 0.25, 0.25, 0.25);
        let texts = vec![text("a@b.co", PiiCategory::Email, b)];
        let options = SealOptions::default();

        let outcome = seal_image("asset", &original, &texts, &[], &key, &options).unwrap();
        let rect = RegionCodec::new(options.margin)
            .resolve(&b.to_pixel_rect(80, 60), 80, 60)
            .unwrap();

        for (x, y, px) in original.enumerate_pixels() {
            let inside = x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom();
            if !inside {
                assert_eq!(outcome.blurred.get_pixel(x, y), px);
            }
        }
        assert_ne!(outcome.blurred, original);
    }

    #[test]
    fn unusable_geometry_is_reported_not_fatal() {
        let key = ImageKey::generate().unwrap();
        let texts = vec![
            text("a@b.co", PiiCategory::Email, Rect01::new(2.0, 2.0, 0.1, 0.1)),
            text("a@b.co", PiiCategory::Email, Rect01::new(0.1, 0.1, 0.0, 0.1)),
            text("a@b.co", PiiCategory::Email, Rect01::new(f64::NAN, 0.1, 0.1, 0.1)),
            text("a@b.co", PiiCategory::Email, Rect01::new(0.1, 0.1, 0.2, 0.2)),
        ];
        let options = SealOptions::default();
        let outcome = seal_image("asset", &photo(32, 32), &texts, &[], &key, &options).unwrap();
        assert_eq!(outcome.package.sealed_regions.len(), 1);
        let reasons: Vec<_> = outcome.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::OutOfBounds, SkipReason::Degenerate, SkipReason::NonFinite]
        );
    }

    #[test]
    fn nonces_are_unique_within_a_package() {
        let key = ImageKey::generate().unwrap();
        let texts: Vec<_> = (0..50)
            .map(|i| {
                let x = (i % 10) as f64 * 0.1;
                let y = (i / 10) as f64 * 0.2;
                text("a@b.co", PiiCategory::Email, Rect01::new(x, y, 0.08, 0.15))
            })
            .collect();
        let options = SealOptions::default();
        let outcome = seal_image("asset", &photo(100, 100), &texts, &[], &key, &options).unwrap();
        let regions = &outcome.package.sealed_regions;
        let nonces: HashSet<_> = regions.iter().map(|r| r.nonce).collect();
        assert_eq!(nonces.len(), regions.len());
        let ids: HashSet<_> = regions.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn extraction_reads_the_original_without_a_key() {
        let original = photo(64, 48);
        let texts = vec![
            text("a@b.co", PiiCategory::Email, Rect01::new(0.1, 0.1, 0.3, 0.2)),
            text("a@b.co", PiiCategory::Email, Rect01::new(3.0, 0.1, 0.3, 0.2)),
        ];
        let extracted = extract_regions(&original, &texts, &[], 3);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted.skipped()[0].reason, SkipReason::OutOfBounds);

        let key = ImageKey::generate().unwrap();
        let outcome =
            seal_extracted("asset", &original, extracted, &key, MaskStyle::default()).unwrap();
        assert_eq!(outcome.package.sealed_regions.len(), 1);
        assert_eq!(outcome.package.region_margin_px, 3);
        assert_eq!(outcome.skipped.len(), 1);
    }
}
