// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// How a sensitive rectangle is obscured in the shareable image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaskStyle {
    /// Replace each `block_size` x `block_size` cell with its mean colour.
    Pixelate { block_size: u32 },
    /// Gaussian blur restricted to the rectangle.
    GaussianBlur { sigma: f32 },
}

impl Default for MaskStyle {
    fn default() -> Self {
        Self::Pixelate { block_size: 12 }
    }
}

/// Persistent pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pixels added on every side of a region before extraction and masking.
    pub region_margin_px: u32,
    /// Visual mask applied to sealed regions.
    pub mask_style: MaskStyle,
    /// Confidence reported for regex-tier matches.
    pub regex_confidence: f32,
    /// Confidence reported when neither tier fires.
    pub fallback_confidence: f32,
    /// Minimum softmax probability for a model verdict to be used.
    pub model_min_confidence: f32,
    /// Optional path to a JSON classifier model.
    pub model_path: Option<PathBuf>,
    /// Object detections below this confidence are ignored.
    pub object_confidence_threshold: f32,
    /// IoU above which a lower-confidence box of the same class is suppressed.
    pub nms_iou_threshold: f64,
    /// Record seal/open outcomes in the audit trail.
    pub audit_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region_margin_px: 2,
            mask_style: MaskStyle::default(),
            regex_confidence: 0.95,
            fallback_confidence: 0.5,
            model_min_confidence: 0.5,
            model_path: None,
            object_confidence_threshold: 0.5,
            nms_iou_threshold: 0.5,
            audit_enabled: true,
        }
    }
}

impl PipelineConfig {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        debug!(path = %path.as_ref().display(), "pipeline config loaded");
        Ok(config)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}
