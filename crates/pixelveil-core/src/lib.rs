// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixelveil: Core types, geometry and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod geometry;
pub mod human_errors;
pub mod types;

pub use config::{MaskStyle, PipelineConfig};
pub use error::PixelveilError;
pub use geometry::{PixelRect, PixelRectF, Rect01, SkipReason};
pub use types::*;
