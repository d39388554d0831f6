// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pixelveil-classifier: decides whether a detected text span is PII.
//
// Two tiers evaluated in strict order: a fixed regex table for structured
// identifiers (IDs, emails, cards, phones, dates, addresses, logins, names),
// then an optional linear model over TF-IDF terms for free text.  Anything
// neither tier claims is `NonSensitive`.

pub mod engine;
pub mod model;
pub mod patterns;

pub use engine::{ClassifierSettings, TextClassifier};
pub use model::{LinearModel, ModelFile, Prediction};
pub use patterns::{REGEX_CATEGORY_ORDER, RegexTier};
