// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to a plain-language summary with a clear
// suggestion.  Cryptographic failures are deliberately collapsed into a single
// coarse message so nothing about keys, tags or padding reaches the caller.

use crate::error::PixelveilError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Temporary problem (detector unavailable, disk busy); retrying may help.
    Transient,
    /// The user must supply something (the right key, a different file).
    ActionRequired,
    /// Cannot be fixed by retrying: corrupted or tampered data.
    Permanent,
    /// Some regions worked, some did not.
    Partial,
}

/// A human-readable error with a plain message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same operation could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Describe a partially restored image ("7 of 9 regions restored").
pub fn partial_restore(restored: usize, total: usize) -> HumanError {
    HumanError {
        message: format!("{restored} of {total} hidden regions were restored."),
        suggestion: "Some regions could not be unlocked. The package may have been altered in transit; ask the sender to share it again.".into(),
        retriable: false,
        severity: Severity::Partial,
    }
}

/// Convert a `PixelveilError` into a `HumanError` that is safe to show.
pub fn humanize_error(err: &PixelveilError) -> HumanError {
    match err {
        PixelveilError::Detection(_) => HumanError {
            message: "We couldn't analyse this photo.".into(),
            suggestion: "The text or object detector did not respond. Try again in a moment.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PixelveilError::ClassifierModel(_) => HumanError {
            message: "Advanced text detection is unavailable.".into(),
            suggestion: "Structured details like emails and ID numbers are still detected. Reinstall the classifier model to restore full detection.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PixelveilError::InvalidPattern(_) => HumanError {
            message: "The text classifier is misconfigured.".into(),
            suggestion: "Please report this problem.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PixelveilError::InvalidRegion(_)
        | PixelveilError::RegionSizeMismatch { .. }
        | PixelveilError::InvalidPixelBlock(_) => HumanError {
            message: "A hidden region doesn't fit this photo.".into(),
            suggestion: "Make sure you are opening the package with the photo it was created for.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PixelveilError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // All cryptographic failures look the same from the outside.
        PixelveilError::Encryption(_)
        | PixelveilError::Authentication
        | PixelveilError::KeyDerivation(_)
        | PixelveilError::KeyWrap(_)
        | PixelveilError::KeyUnwrap => HumanError {
            message: "This content couldn't be unlocked.".into(),
            suggestion: "Check that you are using the key this package was shared with. If it still fails, ask the sender to share it again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PixelveilError::KeyNotFound(_) | PixelveilError::KeyMismatch { .. } => HumanError {
            message: "The key for this package isn't available.".into(),
            suggestion: "Open the package with the identity it was sent to.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PixelveilError::IntegrityMismatch { .. } => HumanError {
            message: "This package has been changed since it was created.".into(),
            suggestion: "Ask the sender to share the original package again.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PixelveilError::PackageFormat(_) | PixelveilError::UnsupportedScheme(_) => HumanError {
            message: "This doesn't look like a valid protected photo package.".into(),
            suggestion: "The file may be incomplete or from a newer version of the app.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PixelveilError::InvalidTransition { .. } => HumanError {
            message: "The app had an internal processing problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PixelveilError::Database(_) => HumanError {
            message: "The activity log couldn't be updated.".into(),
            suggestion: "Your photos are unaffected. Try closing and reopening the app.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PixelveilError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The app doesn't have permission to use that file.".into(),
                    suggestion: "Check the file permissions, or copy the file somewhere else first.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        PixelveilError::Serialization(_) => HumanError {
            message: "The app had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}
