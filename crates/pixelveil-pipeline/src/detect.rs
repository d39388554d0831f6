// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detector interfaces.  OCR and object detection run outside this crate; the
// pipeline only sees their results through these async traits.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use image::RgbaImage;
use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::{DetectedObjectRegion, DetectedTextRegion};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Source of text spans (OCR).
#[async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect_text(&self, image: &RgbaImage) -> Result<Vec<DetectedTextRegion>>;
}

/// Source of labelled object boxes.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect_objects(&self, image: &RgbaImage) -> Result<Vec<DetectedObjectRegion>>;
}

/// Precomputed detections, typically loaded from a JSON file produced by an
/// external detector.
///
/// ```json
/// {
///   "text":    [{ "text": "S1234567A", "normalized_box": {..}, "confidence": 0.9 }],
///   "objects": [{ "class_name": "person", "normalized_box": {..}, "confidence": 0.8 }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDetections {
    #[serde(default)]
    pub text: Vec<DetectedTextRegion>,
    #[serde(default)]
    pub objects: Vec<DetectedObjectRegion>,
}

impl StaticDetections {
    pub fn new(text: Vec<DetectedTextRegion>, objects: Vec<DetectedObjectRegion>) -> Self {
        Self { text, objects }
    }

    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| PixelveilError::Detection(format!("invalid detections JSON: {e}")))
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let detections = Self::from_json(&data)?;
        debug!(
            text = detections.text.len(),
            objects = detections.objects.len(),
            "detections loaded"
        );
        Ok(detections)
    }
}

#[async_trait]
impl TextDetector for StaticDetections {
    async fn detect_text(&self, _image: &RgbaImage) -> Result<Vec<DetectedTextRegion>> {
        Ok(self.text.clone())
    }
}

#[async_trait]
impl ObjectDetector for StaticDetections {
    async fn detect_objects(&self, _image: &RgbaImage) -> Result<Vec<DetectedObjectRegion>> {
        Ok(self.objects.clone())
    }
}

/// Drop object detections below `threshold`.
pub fn filter_by_confidence(
    regions: Vec<DetectedObjectRegion>,
    threshold: f32,
) -> Vec<DetectedObjectRegion> {
    regions
        .into_iter()
        .filter(|r| r.confidence >= threshold)
        .collect()
}

/// Per-class non-maximum suppression.
///
/// Within each class, boxes are visited by descending confidence and a box is
/// dropped when its IoU with an already kept box exceeds `iou_threshold`.
/// Survivors keep their input order.
pub fn non_max_suppression(
    regions: Vec<DetectedObjectRegion>,
    iou_threshold: f64,
) -> Vec<DetectedObjectRegion> {
    let mut by_class: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, region) in regions.iter().enumerate() {
        by_class.entry(region.class_name.as_str()).or_default().push(idx);
    }

    let mut keep = vec![false; regions.len()];
    for indices in by_class.values_mut() {
        indices.sort_by(|a, b| regions[*b].confidence.total_cmp(&regions[*a].confidence));
        let mut kept: Vec<usize> = Vec::new();
        for &candidate in indices.iter() {
            let suppressed = kept.iter().any(|&k| {
                regions[k].normalized_box.iou(&regions[candidate].normalized_box) > iou_threshold
            });
            if !suppressed {
                kept.push(candidate);
                keep[candidate] = true;
            }
        }
    }

    let before = regions.len();
    let survivors: Vec<_> = regions
        .into_iter()
        .zip(keep)
        .filter_map(|(region, k)| k.then_some(region))
        .collect();
    debug!(before, after = survivors.len(), "non-max suppression applied");
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelveil_core::Rect01;

    fn object(class: &str, x: f64, confidence: f32) -> DetectedObjectRegion {
        DetectedObjectRegion::new(class, Rect01::new(x, 0.2, 0.3, 0.3), confidence)
    }

    #[test]
    fn sensitivity_comes_from_class_set() {
        assert!(object("person", 0.0, 0.9).is_sensitive);
        assert!(!object("bicycle", 0.0, 0.9).is_sensitive);
    }

    #[test]
    fn overlapping_boxes_of_same_class_are_suppressed() {
        let regions = vec![
            object("person", 0.10, 0.6),
            object("person", 0.12, 0.9),
            object("person", 0.60, 0.5),
        ];
        let kept = non_max_suppression(regions, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.5);
    }

    #[test]
    fn different_classes_never_suppress_each_other() {
        let regions = vec![object("person", 0.1, 0.9), object("laptop", 0.1, 0.8)];
        assert_eq!(non_max_suppression(regions, 0.5).len(), 2);
    }

    #[test]
    fn nms_is_idempotent() {
        let regions = vec![
            object("face", 0.10, 0.7),
            object("face", 0.11, 0.8),
            object("face", 0.50, 0.6),
            object("tv", 0.40, 0.9),
        ];
        let once = non_max_suppression(regions, 0.5);
        let twice = non_max_suppression(once.clone(), 0.5);
        assert_eq!(once, twice);
    }

    #[test]
    fn confidence_filter() {
        let regions = vec![object("person", 0.1, 0.3), object("person", 0.6, 0.7)];
        let kept = filter_by_confidence(regions, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.7);
    }

    #[test]
    fn static_detections_parse_and_derive_sensitivity() {
        let json = r#"{
            "text": [{"text": "S1234567A",
                      "normalized_box": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.05},
                      "confidence": 0.9}],
            "objects": [{"class_name": "person",
                         "normalized_box": {"x": 0.5, "y": 0.5, "width": 0.2, "height": 0.3},
                         "confidence": 0.8,
                         "is_sensitive": false}]
        }"#;
        let detections = StaticDetections::from_json(json).unwrap();
        assert_eq!(detections.text.len(), 1);
        assert!(detections.objects[0].is_sensitive);

        assert!(StaticDetections::from_json("{}").unwrap().objects.is_empty());
        assert!(matches!(
            StaticDetections::from_json("[1, 2"),
            Err(PixelveilError::Detection(_))
        ));
    }

    #[test]
    fn static_detections_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.json");
        let detections = StaticDetections::new(vec![], vec![object("face", 0.2, 0.9)]);
        std::fs::write(&path, serde_json::to_string(&detections).unwrap()).unwrap();

        let loaded = StaticDetections::load(&path).unwrap();
        assert_eq!(loaded.objects, detections.objects);
        assert!(matches!(
            StaticDetections::load(dir.path().join("missing.json")),
            Err(PixelveilError::Io(_))
        ));
    }

    #[tokio::test]
    async fn static_detections_serve_both_traits() {
        let detections = StaticDetections::new(vec![], vec![object("person", 0.1, 0.9)]);
        let image = RgbaImage::new(4, 4);
        assert!(detections.detect_text(&image).await.unwrap().is_empty());
        assert_eq!(detections.detect_objects(&image).await.unwrap().len(), 1);
    }
}
