// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pixelveil sensitive-region pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PixelveilError, Result};
use crate::geometry::Rect01;

/// Object classes that are always treated as sensitive when detected.
pub const SENSITIVE_OBJECT_CLASSES: &[&str] = &[
    "person",
    "face",
    "tv",
    "laptop",
    "cell phone",
    "monitor",
    "screen",
    "book",
    "document",
    "passport",
    "id card",
    "credit card",
];

/// Whether an object-detector class label belongs to the sensitive set.
///
/// Matching ignores ASCII case and surrounding whitespace.
pub fn is_sensitive_object_class(class_name: &str) -> bool {
    let needle = class_name.trim();
    SENSITIVE_OBJECT_CLASSES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(needle))
}

/// PII category assigned to a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    NonSensitive,
    Name,
    Email,
    Phone,
    NationalId,
    CreditCard,
    Birthday,
    Address,
    Login,
}

impl PiiCategory {
    /// Every category, in declaration order.
    pub const ALL: [PiiCategory; 9] = [
        Self::NonSensitive,
        Self::Name,
        Self::Email,
        Self::Phone,
        Self::NationalId,
        Self::CreditCard,
        Self::Birthday,
        Self::Address,
        Self::Login,
    ];

    /// Stable label used in packages and model files.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NonSensitive => "non_sensitive",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::NationalId => "national_id",
            Self::CreditCard => "credit_card",
            Self::Birthday => "birthday",
            Self::Address => "address",
            Self::Login => "login",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label)
    }

    pub fn is_sensitive(&self) -> bool {
        !matches!(self, Self::NonSensitive)
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which tier of the classifier produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Regex,
    Model,
    Fallback,
}

/// Result of classifying one text span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub category: PiiCategory,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub method: ClassificationMethod,
    pub latency: Duration,
}

impl ClassificationVerdict {
    pub fn is_sensitive(&self) -> bool {
        self.category.is_sensitive()
    }
}

/// Text span reported by the external OCR detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTextRegion {
    pub text: String,
    pub normalized_box: Rect01,
    pub confidence: f32,
}

/// A detection paired with its classification verdict.
///
/// The detection is never modified; classification produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTextRegion {
    pub region: DetectedTextRegion,
    pub verdict: ClassificationVerdict,
}

impl ClassifiedTextRegion {
    pub fn is_sensitive(&self) -> bool {
        self.verdict.is_sensitive()
    }
}

/// Labelled box reported by the external object detector.
///
/// `is_sensitive` is always derived from [`SENSITIVE_OBJECT_CLASSES`], also
/// when deserialising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ObjectDetectionRecord")]
pub struct DetectedObjectRegion {
    pub class_name: String,
    pub normalized_box: Rect01,
    pub confidence: f32,
    pub is_sensitive: bool,
}

/// Wire shape of an object detection; sensitivity is recomputed on load.
#[derive(Deserialize)]
struct ObjectDetectionRecord {
    class_name: String,
    normalized_box: Rect01,
    confidence: f32,
}

impl From<ObjectDetectionRecord> for DetectedObjectRegion {
    fn from(record: ObjectDetectionRecord) -> Self {
        Self::new(record.class_name, record.normalized_box, record.confidence)
    }
}

impl DetectedObjectRegion {
    pub fn new(class_name: impl Into<String>, normalized_box: Rect01, confidence: f32) -> Self {
        let class_name = class_name.into();
        let is_sensitive = is_sensitive_object_class(&class_name);
        Self {
            class_name,
            normalized_box,
            confidence,
            is_sensitive,
        }
    }
}

/// Kind of region a sealed payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    Text,
    Object,
}

/// Dense, row-major RGBA8 pixels for one rectangular region.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBlock {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

/// Size of the `width | height` header in a serialised block.
const BLOCK_HEADER_LEN: usize = 8;

impl PixelBlock {
    /// Wrap tightly-packed RGBA8 pixels, checking the buffer length.
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let (bytes_per_row, expected) = Self::layout(width, height)?;
        if rgba.len() != expected {
            return Err(PixelveilError::InvalidPixelBlock(format!(
                "{width}x{height} block needs {expected} bytes, got {}",
                rgba.len()
            )));
        }
        Ok(Self {
            rgba,
            width,
            height,
            bytes_per_row,
        })
    }

    /// Row stride and total length for a `width` x `height` block, or an
    /// error if either does not fit.
    fn layout(width: u32, height: u32) -> Result<(u32, usize)> {
        let too_large =
            || PixelveilError::InvalidPixelBlock(format!("{width}x{height} block is too large"));
        let bytes_per_row = width.checked_mul(4).ok_or_else(too_large)?;
        let total = usize::try_from(bytes_per_row)
            .ok()
            .and_then(|row| row.checked_mul(usize::try_from(height).ok()?))
            .ok_or_else(too_large)?;
        Ok((bytes_per_row, total))
    }

    /// Serialise as `width u32 BE | height u32 BE | rgba`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_HEADER_LEN + self.rgba.len());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.rgba);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < BLOCK_HEADER_LEN {
            return Err(PixelveilError::InvalidPixelBlock(
                "block shorter than header".into(),
            ));
        }
        let (header, pixels) = bytes.split_at(BLOCK_HEADER_LEN);
        let width = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let height = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let (_, expected) = Self::layout(width, height)?;
        if pixels.len() != expected {
            return Err(PixelveilError::InvalidPixelBlock(format!(
                "{width}x{height} block needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Self::new(pixels.to_vec(), width, height)
    }
}

impl std::fmt::Debug for PixelBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel contents are sensitive by definition.
        f.debug_struct("PixelBlock")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_row", &self.bytes_per_row)
            .finish_non_exhaustive()
    }
}
