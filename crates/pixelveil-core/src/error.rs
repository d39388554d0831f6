// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pixelveil.

use thiserror::Error;

use crate::geometry::SkipReason;

/// Top-level error type for all Pixelveil operations.
#[derive(Debug, Error)]
pub enum PixelveilError {
    // -- Detection (external collaborators) --
    #[error("detection failed: {0}")]
    Detection(String),

    // -- Classification --
    #[error("classifier model unavailable: {0}")]
    ClassifierModel(String),

    #[error("invalid classifier pattern: {0}")]
    InvalidPattern(String),

    // -- Geometry / pixels --
    #[error("region skipped: {0}")]
    InvalidRegion(SkipReason),

    #[error("region size mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    RegionSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("invalid pixel block: {0}")]
    InvalidPixelBlock(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Cryptography --
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// AEAD open failed. Deliberately carries no detail.
    #[error("authentication failed")]
    Authentication,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("key wrapping failed: {0}")]
    KeyWrap(String),

    #[error("key unwrapping failed")]
    KeyUnwrap,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("image key mismatch: package expects {expected}, got {actual}")]
    KeyMismatch { expected: String, actual: String },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Packages --
    #[error("malformed package: {0}")]
    PackageFormat(String),

    #[error("unsupported encryption scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SkipReason> for PixelveilError {
    fn from(reason: SkipReason) -> Self {
        Self::InvalidRegion(reason)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PixelveilError>;
