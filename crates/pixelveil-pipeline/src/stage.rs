// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-image lifecycle.  Sender and receiver each walk a fixed sequence of
// stages; a tracker refuses to move backwards or stay in place.

use std::fmt;

use pixelveil_core::error::{PixelveilError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sender side: detection through transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SenderStage {
    Detected,
    Classified,
    RegionsExtracted,
    RegionsSealed,
    Packaged,
    Transmitted,
}

/// Receiver side: receipt through reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReceiverStage {
    Received,
    KeyUnwrapped,
    RegionsDecrypted,
    ImageReconstructed,
}

/// Ordered lifecycle stages.
pub trait Stage: Copy + Ord + fmt::Debug {
    const INITIAL: Self;
}

impl Stage for SenderStage {
    const INITIAL: Self = SenderStage::Detected;
}

impl Stage for ReceiverStage {
    const INITIAL: Self = ReceiverStage::Received;
}

impl fmt::Display for SenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for ReceiverStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current stage of one image, tagged with its asset identifier for logs.
#[derive(Debug, Clone)]
pub struct StageTracker<S: Stage> {
    asset_identifier: String,
    current: S,
    history: Vec<S>,
}

impl<S: Stage> StageTracker<S> {
    pub fn new(asset_identifier: impl Into<String>) -> Self {
        Self {
            asset_identifier: asset_identifier.into(),
            current: S::INITIAL,
            history: vec![S::INITIAL],
        }
    }

    pub fn current(&self) -> S {
        self.current
    }

    /// Every stage reached so far, oldest first.
    pub fn history(&self) -> &[S] {
        &self.history
    }

    /// Move to a later stage.  Skipping ahead is allowed; going back or
    /// repeating a stage is not.
    pub fn advance(&mut self, next: S) -> Result<()> {
        if next <= self.current {
            return Err(PixelveilError::InvalidTransition {
                from: format!("{:?}", self.current),
                to: format!("{next:?}"),
            });
        }
        debug!(
            asset = %self.asset_identifier,
            from = ?self.current,
            to = ?next,
            "stage advanced"
        );
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}
