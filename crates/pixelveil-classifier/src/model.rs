// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Model tier: multi-class logistic regression over TF-IDF term features plus
// the regex predicates as binary features.
//
// # Model file
//
// ```json
// {
//   "vocabulary": { "street": 0, "born": 1, ... },
//   "idf":        [1.7, 2.3, ...],
//   "categories": ["non_sensitive", "name", "address"],
//   "weights":    [[...], [...], [...]],
//   "bias":       [0.1, -0.2, 0.0]
// }
// ```
//
// Each weight row has `vocabulary.len() + REGEX_FEATURE_COUNT` columns.
// Weights are fixed after loading, so predictions are deterministic.

use std::collections::HashMap;
use std::path::Path;

use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::PiiCategory;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::patterns::REGEX_FEATURE_COUNT;

/// On-disk representation of a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    pub categories: Vec<PiiCategory>,
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

/// Arg-max output of the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub category: PiiCategory,
    /// Softmax probability of `category`.
    pub probability: f64,
}

/// A validated, ready-to-run linear model.
#[derive(Debug, Clone)]
pub struct LinearModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    categories: Vec<PiiCategory>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

fn model_err(detail: impl Into<String>) -> PixelveilError {
    PixelveilError::ClassifierModel(detail.into())
}

impl LinearModel {
    /// Load and validate a model from a JSON file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            model_err(format!("failed to read {}: {e}", path.as_ref().display()))
        })?;
        let model = Self::from_json(&data)?;
        info!(
            vocabulary = model.vocabulary.len(),
            categories = model.categories.len(),
            "classifier model loaded"
        );
        Ok(model)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let file: ModelFile =
            serde_json::from_str(data).map_err(|e| model_err(format!("invalid model JSON: {e}")))?;
        Self::from_file(file)
    }

    /// Validate dimensions and values of a parsed model file.
    pub fn from_file(file: ModelFile) -> Result<Self> {
        let vocab_len = file.vocabulary.len();
        let columns = vocab_len + REGEX_FEATURE_COUNT;

        if file.categories.is_empty() {
            return Err(model_err("model has no categories"));
        }
        if file.idf.len() != vocab_len {
            return Err(model_err(format!(
                "idf has {} entries for a vocabulary of {vocab_len}",
                file.idf.len()
            )));
        }
        if let Some((term, idx)) = file.vocabulary.iter().find(|(_, idx)| **idx >= vocab_len) {
            return Err(model_err(format!("term {term:?} has out-of-range index {idx}")));
        }
        if file.weights.len() != file.categories.len() || file.bias.len() != file.categories.len()
        {
            return Err(model_err("weights and bias must have one row per category"));
        }
        if let Some(row) = file.weights.iter().find(|row| row.len() != columns) {
            return Err(model_err(format!(
                "weight row has {} columns, expected {columns}",
                row.len()
            )));
        }
        let all_finite = file.idf.iter().all(|v| v.is_finite())
            && file.bias.iter().all(|v| v.is_finite())
            && file.weights.iter().flatten().all(|v| v.is_finite());
        if !all_finite {
            return Err(model_err("model contains non-finite values"));
        }

        debug!(columns, "classifier model validated");
        Ok(Self {
            vocabulary: file.vocabulary,
            idf: file.idf,
            categories: file.categories,
            weights: file.weights,
            bias: file.bias,
        })
    }

    /// Length of the feature vector the model expects.
    pub fn feature_count(&self) -> usize {
        self.vocabulary.len() + REGEX_FEATURE_COUNT
    }

    pub fn categories(&self) -> &[PiiCategory] {
        &self.categories
    }

    /// Build the feature vector: L2-normalised TF-IDF terms followed by the
    /// regex predicates as 0/1 values.
    pub fn features(&self, text: &str, predicates: &[bool; REGEX_FEATURE_COUNT]) -> Vec<f64> {
        let vocab_len = self.vocabulary.len();
        let mut features = vec![0.0; vocab_len + REGEX_FEATURE_COUNT];

        let tokens = tokenize(text);
        if !tokens.is_empty() {
            let total = tokens.len() as f64;
            for token in &tokens {
                if let Some(&idx) = self.vocabulary.get(token.as_str()) {
                    features[idx] += 1.0 / total;
                }
            }
            for (value, idf) in features[..vocab_len].iter_mut().zip(&self.idf) {
                *value *= idf;
            }
            let norm = features[..vocab_len]
                .iter()
                .map(|v| v * v)
                .sum::<f64>()
                .sqrt();
            if norm > 0.0 {
                for value in &mut features[..vocab_len] {
                    *value /= norm;
                }
            }
        }

        for (slot, hit) in features[vocab_len..].iter_mut().zip(predicates) {
            *slot = if *hit { 1.0 } else { 0.0 };
        }
        features
    }

    /// Softmax probabilities, one per category, in model order.
    pub fn probabilities(&self, features: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + bias)
            .collect();
        softmax(&scores)
    }

    /// Arg-max category and its probability.  Ties go to the earlier category.
    pub fn predict(&self, text: &str, predicates: &[bool; REGEX_FEATURE_COUNT]) -> Prediction {
        let probs = self.probabilities(&self.features(text, predicates));
        let mut best = 0;
        for (idx, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = idx;
            }
        }
        Prediction {
            category: self.categories[best],
            probability: probs[best],
        }
    }
}

/// Lowercase and split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
