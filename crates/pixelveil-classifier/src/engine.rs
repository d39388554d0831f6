// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text classifier engine: regex tier, then model tier, then fallback.
//
// The engine is built once (patterns compiled, model loaded) and is read-only
// afterwards, so a single instance can be shared across threads and every
// `classify` call is independent of every other.

use std::path::Path;
use std::time::Instant;

use pixelveil_core::error::Result;
use pixelveil_core::{
    ClassificationMethod, ClassificationVerdict, ClassifiedTextRegion, DetectedTextRegion,
    PiiCategory, PipelineConfig,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::model::LinearModel;
use crate::patterns::RegexTier;

/// Below this many regions a batch is classified on the calling thread.
const PARALLEL_BATCH_THRESHOLD: usize = 64;

/// Confidence knobs for the three tiers.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierSettings {
    pub regex_confidence: f32,
    pub fallback_confidence: f32,
    pub model_min_confidence: f32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self::from(&config)
    }
}

impl From<&PipelineConfig> for ClassifierSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            regex_confidence: config.regex_confidence.clamp(0.0, 1.0),
            fallback_confidence: config.fallback_confidence.clamp(0.0, 1.0),
            model_min_confidence: config.model_min_confidence.clamp(0.0, 1.0),
        }
    }
}

/// Hybrid PII classifier for detected text spans.
pub struct TextClassifier {
    regex: RegexTier,
    model: Option<LinearModel>,
    settings: ClassifierSettings,
}

impl TextClassifier {
    /// Regex-only classifier.
    pub fn new(settings: ClassifierSettings) -> Result<Self> {
        let regex = RegexTier::new()?;
        debug!(patterns = regex.pattern_count(), "regex tier compiled");
        Ok(Self {
            regex,
            model: None,
            settings,
        })
    }

    /// Build from pipeline config, loading the model if one is configured.
    ///
    /// A missing or corrupt model does not fail construction; check
    /// [`is_model_loaded`](Self::is_model_loaded).
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut classifier = Self::new(ClassifierSettings::from(config))?;
        if let Some(path) = &config.model_path {
            classifier.load_model(path);
        }
        Ok(classifier)
    }

    /// Attach an already-validated model.
    pub fn with_model(mut self, model: LinearModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Try to load a model file.  On failure the engine keeps running with
    /// the regex tier and fallback only.  Returns whether a model is loaded.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_model(&mut self, path: impl AsRef<Path>) -> bool {
        match LinearModel::load(path) {
            Ok(model) => {
                self.model = Some(model);
                true
            }
            Err(e) => {
                warn!(error = %e, "classifier model unavailable, using regex tier only");
                self.model = None;
                false
            }
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn settings(&self) -> ClassifierSettings {
        self.settings
    }

    /// Classify one text span.  Never fails: anything unrecognisable is
    /// `NonSensitive`.
    pub fn classify(&self, text: &str) -> ClassificationVerdict {
        let started = Instant::now();
        let (category, confidence, method) = self.decide(text);
        let verdict = ClassificationVerdict {
            category,
            confidence,
            method,
            latency: started.elapsed(),
        };
        trace!(
            category = %verdict.category,
            method = ?verdict.method,
            confidence = verdict.confidence,
            "text classified"
        );
        verdict
    }

    fn decide(&self, text: &str) -> (PiiCategory, f32, ClassificationMethod) {
        let fallback = (
            PiiCategory::NonSensitive,
            self.settings.fallback_confidence,
            ClassificationMethod::Fallback,
        );

        if text.trim().is_empty() {
            return fallback;
        }

        if let Some(category) = self.regex.first_match(text) {
            return (
                category,
                self.settings.regex_confidence,
                ClassificationMethod::Regex,
            );
        }

        if let Some(model) = &self.model {
            let prediction = model.predict(text, &self.regex.predicates(text));
            let probability = prediction.probability as f32;
            if probability >= self.settings.model_min_confidence {
                return (
                    prediction.category,
                    probability.clamp(0.0, 1.0),
                    ClassificationMethod::Model,
                );
            }
        }

        fallback
    }

    /// Pair a detection with its verdict.  The detection is moved, not mutated.
    pub fn classify_region(&self, region: DetectedTextRegion) -> ClassifiedTextRegion {
        let verdict = self.classify(&region.text);
        ClassifiedTextRegion { region, verdict }
    }

    /// Classify many detections.  Output order matches input order.
    ///
    /// Large batches are split across scoped worker threads; items share no
    /// mutable state.
    #[instrument(skip_all, fields(count = regions.len()))]
    pub fn classify_batch(&self, regions: &[DetectedTextRegion]) -> Vec<ClassifiedTextRegion> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(regions.len().max(1));

        let results: Vec<ClassifiedTextRegion> =
            if workers <= 1 || regions.len() < PARALLEL_BATCH_THRESHOLD {
                regions
                    .iter()
                    .cloned()
                    .map(|r| self.classify_region(r))
                    .collect()
            } else {
                let chunk_size = regions.len().div_ceil(workers);
                std::thread::scope(|scope| {
                    let handles: Vec<_> = regions
                        .chunks(chunk_size)
                        .map(|chunk| {
                            scope.spawn(move || {
                                chunk
                                    .iter()
                                    .cloned()
                                    .map(|r| self.classify_region(r))
                                    .collect::<Vec<_>>()
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .flat_map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
                        .collect()
                })
            };

        let sensitive = results.iter().filter(|r| r.is_sensitive()).count();
        info!(total = results.len(), sensitive, "text regions classified");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::toy_model_json;
    use pixelveil_core::Rect01;

    fn regex_only() -> TextClassifier {
        TextClassifier::new(ClassifierSettings::default()).unwrap()
    }

    fn with_toy_model() -> TextClassifier {
        regex_only().with_model(LinearModel::from_json(&toy_model_json()).unwrap())
    }

    fn region(text: &str) -> DetectedTextRegion {
        DetectedTextRegion {
            text: text.into(),
            normalized_box: Rect01::new(0.1, 0.1, 0.2, 0.05),
            confidence: 0.9,
        }
    }

    #[test]
    fn national_id_scenario() {
        let v = regex_only().classify("S1234567A");
        assert_eq!(v.category, PiiCategory::NationalId);
        assert_eq!(v.method, ClassificationMethod::Regex);
        assert!(v.confidence >= 0.9);
    }

    #[test]
    fn email_scenario() {
        let v = regex_only().classify("john.doe@example.com");
        assert_eq!(v.category, PiiCategory::Email);
        assert_eq!(v.method, ClassificationMethod::Regex);
    }

    #[test]
    fn plain_text_is_non_sensitive() {
        let v = regex_only().classify("Hello world");
        assert_eq!(v.category, PiiCategory::NonSensitive);
        assert_eq!(v.method, ClassificationMethod::Fallback);
        assert!(!v.is_sensitive());
    }

    #[test]
    fn empty_text_is_non_sensitive() {
        for text in ["", "   ", "\n\t"] {
            let v = with_toy_model().classify(text);
            assert_eq!(v.category, PiiCategory::NonSensitive);
            assert_eq!(v.method, ClassificationMethod::Fallback);
        }
    }

    #[test]
    fn model_catches_free_text() {
        let classifier = with_toy_model();
        assert!(classifier.is_model_loaded());
        let v = classifier.classify("corner of orchard avenue");
        assert_eq!(v.category, PiiCategory::Address);
        assert_eq!(v.method, ClassificationMethod::Model);
    }

    #[test]
    fn regex_wins_over_model() {
        let v = with_toy_model().classify("street mail a@b.co");
        assert_eq!(v.category, PiiCategory::Email);
        assert_eq!(v.method, ClassificationMethod::Regex);
    }

    #[test]
    fn low_confidence_model_falls_back() {
        let settings = ClassifierSettings {
            model_min_confidence: 0.999_999,
            ..ClassifierSettings::default()
        };
        let classifier = TextClassifier::new(settings)
            .unwrap()
            .with_model(LinearModel::from_json(&toy_model_json()).unwrap());
        // Unknown words: all scores equal bias, no class is near-certain.
        let v = classifier.classify("quarterly figures");
        assert_eq!(v.method, ClassificationMethod::Fallback);
    }

    #[test]
    fn missing_model_degrades_gracefully() {
        let mut classifier = regex_only();
        assert!(!classifier.load_model("/nonexistent/model.json"));
        assert!(!classifier.is_model_loaded());
        assert_eq!(classifier.classify("S1234567A").category, PiiCategory::NationalId);
    }

    #[test]
    fn corrupt_model_degrades_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{\"vocabulary\": 3}").unwrap();

        let config = PipelineConfig {
            model_path: Some(path),
            ..PipelineConfig::default()
        };
        let classifier = TextClassifier::from_config(&config).unwrap();
        assert!(!classifier.is_model_loaded());
    }

    #[test]
    fn model_file_loads_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, toy_model_json()).unwrap();

        let config = PipelineConfig {
            model_path: Some(path),
            ..PipelineConfig::default()
        };
        assert!(TextClassifier::from_config(&config).unwrap().is_model_loaded());
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = with_toy_model();
        for text in ["S1234567A", "orchard avenue", "Hello world", "mr named", ""] {
            let a = classifier.classify(text);
            let b = classifier.classify(text);
            assert_eq!(a.category, b.category);
            assert_eq!(a.method, b.method);
            assert_eq!(a.confidence, b.confidence);
        }
    }

    #[test]
    fn category_invariant_holds() {
        let classifier = with_toy_model();
        for text in ["S1234567A", "a@b.co", "street", "Hello world", "mr jones"] {
            let v = classifier.classify(text);
            assert_eq!(v.category != PiiCategory::NonSensitive, v.is_sensitive());
        }
    }

    #[test]
    fn batch_preserves_order_and_input() {
        let classifier = regex_only();
        let texts = ["Hello world", "S1234567A", "john.doe@example.com"];
        let regions: Vec<_> = texts.iter().cycle().take(300).map(|t| region(t)).collect();

        let classified = classifier.classify_batch(&regions);
        assert_eq!(classified.len(), regions.len());
        for (input, output) in regions.iter().zip(&classified) {
            assert_eq!(&output.region, input);
            assert_eq!(output.verdict, {
                let mut v = classifier.classify(&input.text);
                v.latency = output.verdict.latency;
                v
            });
        }
    }

    #[test]
    fn classifier_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TextClassifier>();
    }
}
