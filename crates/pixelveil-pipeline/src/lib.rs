// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pixelveil-pipeline: Secure package orchestration.
//
// Detector interfaces, per-image lifecycle tracking, the sender leg
// (extract, seal, mask), the receiver leg (decrypt, restore), the wire
// format, and `PrivacyPipeline` which ties them together.

pub mod detect;
pub mod package;
pub mod pipeline;
pub mod receiver;
pub mod sender;
pub mod stage;

pub use detect::{
    ObjectDetector, StaticDetections, TextDetector, filter_by_confidence, non_max_suppression,
};
pub use package::{
    ENCRYPTION_SCHEME, EncryptedRegionRecord, MAX_REGION_MARGIN_PX, SealedRegion,
    SecureMetadataPackage, SecurePackage, TransmissionEnvelope, TransmissionPackage,
};
pub use pipeline::{PrivacyPipeline, ProtectOutcome};
pub use receiver::{
    DecryptedRegions, OpenOutcome, RegionFailure, RegionFailureReason, decrypt_regions, open_image,
    restore_regions,
};
pub use sender::{
    ExtractedRegions, SealOptions, SealOutcome, SkippedRegion, extract_regions, seal_extracted,
    seal_image,
};
pub use stage::{ReceiverStage, SenderStage, Stage, StageTracker};
