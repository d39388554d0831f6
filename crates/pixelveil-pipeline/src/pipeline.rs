// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end orchestration: detect, classify, seal and wrap on the sending
// side; verify, unwrap and restore on the receiving side.
//
// Each image is an independent future.  Both detectors for one image are
// joined before classification starts.  Classification, extraction, sealing,
// decryption and restoration run on the blocking pool so several images can
// proceed in parallel.  The key store is the only shared mutable state.

use std::sync::{Arc, Mutex};

use image::RgbaImage;
use pixelveil_classifier::TextClassifier;
use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::PipelineConfig;
use pixelveil_image::{decode_rgba, encode_png};
use pixelveil_security::{
    AuditAction, AuditLog, ImageKey, KeyPair, KeyStore, unwrap_image_key, wrap_image_key,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::detect::{ObjectDetector, TextDetector, filter_by_confidence, non_max_suppression};
use crate::package::{SecurePackage, TransmissionPackage};
use crate::receiver::{OpenOutcome, decrypt_regions, restore_regions};
use crate::sender::{SkippedRegion, extract_regions, seal_extracted};
use crate::stage::{ReceiverStage, SenderStage, StageTracker};

/// Everything the sender gets back for one image.
#[derive(Debug, Clone)]
pub struct ProtectOutcome {
    /// Ready to hand to the recipient.
    pub envelope: TransmissionPackage,
    /// The shareable image, also PNG-encoded inside the envelope.
    pub blurred: RgbaImage,
    /// Id of the image key, which stays in the pipeline's key store.
    pub key_id: Uuid,
    pub sealed: usize,
    pub skipped: Vec<SkippedRegion>,
    pub tracker: StageTracker<SenderStage>,
}

impl ProtectOutcome {
    /// Record that the envelope has been handed to the transport.
    pub fn mark_transmitted(&mut self) -> Result<()> {
        self.tracker.advance(SenderStage::Transmitted)
    }
}

pub struct PrivacyPipeline {
    config: PipelineConfig,
    classifier: Arc<TextClassifier>,
    text_detector: Arc<dyn TextDetector>,
    object_detector: Arc<dyn ObjectDetector>,
    key_store: Arc<KeyStore>,
    audit: Option<Mutex<AuditLog>>,
}

impl PrivacyPipeline {
    /// Build a pipeline.  The classifier is configured from `config`,
    /// including its optional model file.
    pub fn new(
        config: PipelineConfig,
        text_detector: Arc<dyn TextDetector>,
        object_detector: Arc<dyn ObjectDetector>,
        key_store: Arc<KeyStore>,
    ) -> Result<Self> {
        let classifier = TextClassifier::from_config(&config)?;
        info!(
            model_loaded = classifier.is_model_loaded(),
            audit = config.audit_enabled,
            "privacy pipeline ready"
        );
        Ok(Self {
            config,
            classifier: Arc::new(classifier),
            text_detector,
            object_detector,
            key_store,
            audit: None,
        })
    }

    /// Replace the classifier built from config.
    pub fn with_classifier(mut self, classifier: TextClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Attach an audit trail.  Ignored when auditing is disabled in config.
    pub fn with_audit_log(mut self, log: AuditLog) -> Self {
        if self.config.audit_enabled {
            self.audit = Some(Mutex::new(log));
        }
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &TextClassifier {
        self.classifier.as_ref()
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.key_store
    }

    /// Run `f` against the attached audit log, if any.
    pub fn with_audit<T>(&self, f: impl FnOnce(&AuditLog) -> Result<T>) -> Option<Result<T>> {
        self.audit.as_ref().map(|log| {
            let guard = log.lock().unwrap_or_else(|p| p.into_inner());
            f(&*guard)
        })
    }

    fn audit(
        &self,
        action: AuditAction,
        asset_identifier: &str,
        success: bool,
        details: Option<&str>,
    ) {
        if let Some(Err(e)) =
            self.with_audit(|log| log.record(action, asset_identifier, success, details))
        {
            error!(error = %e, "failed to record audit entry");
        }
    }

    // -- Sender ----------------------------------------------------------------

    /// Protect one image for `recipient_public_key`.
    #[instrument(
        skip(self, image, recipient_public_key),
        fields(width = image.width(), height = image.height())
    )]
    pub async fn protect(
        &self,
        asset_id: &str,
        image: &RgbaImage,
        recipient_public_key: &str,
    ) -> Result<ProtectOutcome> {
        let result = self.protect_inner(asset_id, image, recipient_public_key).await;
        match &result {
            Ok(outcome) => {
                let details = format!(
                    "{} regions sealed, {} skipped",
                    outcome.sealed,
                    outcome.skipped.len()
                );
                self.audit(AuditAction::Seal, asset_id, true, Some(&details));
            }
            Err(e) => {
                warn!(error = %e, "protect failed");
                self.audit(AuditAction::Seal, asset_id, false, Some(&e.to_string()));
            }
        }
        result
    }

    async fn protect_inner(
        &self,
        asset_id: &str,
        image: &RgbaImage,
        recipient_public_key: &str,
    ) -> Result<ProtectOutcome> {
        let (text, objects) = tokio::join!(
            self.text_detector.detect_text(image),
            self.object_detector.detect_objects(image),
        );
        let (text, objects) = (text?, objects?);
        let mut tracker = StageTracker::<SenderStage>::new(asset_id);

        let objects = non_max_suppression(
            filter_by_confidence(objects, self.config.object_confidence_threshold),
            self.config.nms_iou_threshold,
        );
        let classifier = Arc::clone(&self.classifier);
        let classified = tokio::task::spawn_blocking(move || classifier.classify_batch(&text))
            .await
            .map_err(|e| PixelveilError::Detection(format!("classification task failed: {e}")))?;
        tracker.advance(SenderStage::Classified)?;

        let original = Arc::new(image.clone());
        let extracted = {
            let original = Arc::clone(&original);
            let margin = self.config.region_margin_px;
            tokio::task::spawn_blocking(move || {
                extract_regions(&original, &classified, &objects, margin)
            })
            .await
            .map_err(|e| PixelveilError::ImageError(format!("extraction task failed: {e}")))?
        };
        tracker.advance(SenderStage::RegionsExtracted)?;

        let key = ImageKey::generate()?;
        let wrapped = wrap_image_key(&key, recipient_public_key)?;
        let key_id = self.key_store.store_image_key(key.clone());

        let sealed = {
            let asset_id = asset_id.to_owned();
            let mask_style = self.config.mask_style;
            tokio::task::spawn_blocking(move || {
                seal_extracted(&asset_id, &original, extracted, &key, mask_style)
            })
            .await
            .map_err(|e| PixelveilError::Encryption(format!("sealing task failed: {e}")))??
        };
        tracker.advance(SenderStage::RegionsSealed)?;

        let png = encode_png(&sealed.blurred)?;
        let envelope = TransmissionPackage::new(png, &sealed.package, wrapped)?;
        tracker.advance(SenderStage::Packaged)?;

        info!(
            %key_id,
            sealed = sealed.package.sealed_regions.len(),
            skipped = sealed.skipped.len(),
            "image protected"
        );
        Ok(ProtectOutcome {
            envelope,
            blurred: sealed.blurred,
            key_id,
            sealed: sealed.package.sealed_regions.len(),
            skipped: sealed.skipped,
            tracker,
        })
    }

    /// Protect several independent images concurrently.  Results are in input
    /// order; one image failing does not affect the others.
    pub async fn protect_many(
        &self,
        images: &[(String, RgbaImage)],
        recipient_public_key: &str,
    ) -> Vec<Result<ProtectOutcome>> {
        futures::future::join_all(
            images
                .iter()
                .map(|(asset_id, image)| self.protect(asset_id, image, recipient_public_key)),
        )
        .await
    }

    // -- Receiver --------------------------------------------------------------

    /// Restore the original image from an envelope addressed to `key_pair`.
    ///
    /// Integrity, package format and key unwrapping are checked before any
    /// region is decrypted; a failure there aborts.  Individual region
    /// failures are reported in the outcome.
    #[instrument(skip_all, fields(asset = %envelope.asset_identifier))]
    pub async fn reveal(
        &self,
        envelope: &TransmissionPackage,
        key_pair: &KeyPair,
    ) -> Result<OpenOutcome> {
        let asset_id = envelope.asset_identifier.as_str();
        let mut tracker = StageTracker::<ReceiverStage>::new(asset_id);

        let package = match envelope
            .verify_integrity()
            .and_then(|()| envelope.secure_package())
        {
            Ok(package) => {
                self.audit(AuditAction::Verify, asset_id, true, None);
                package
            }
            Err(e) => {
                warn!(error = %e, "envelope rejected");
                self.audit(AuditAction::Verify, asset_id, false, Some(&e.to_string()));
                return Err(e);
            }
        };

        let key = match unwrap_image_key(&envelope.encrypted_image_key, key_pair) {
            Ok(key) => {
                self.audit(AuditAction::Unwrap, asset_id, true, None);
                key
            }
            Err(e) => {
                self.audit(AuditAction::Unwrap, asset_id, false, None);
                return Err(e);
            }
        };
        tracker.advance(ReceiverStage::KeyUnwrapped)?;
        self.key_store.store_image_key(key.clone());

        let outcome = match self.open_regions(envelope, package, key, &mut tracker).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.audit(AuditAction::Open, asset_id, false, Some(&e.to_string()));
                return Err(e);
            }
        };

        self.audit(
            AuditAction::Open,
            asset_id,
            outcome.is_complete(),
            Some(&outcome.summary()),
        );
        Ok(outcome)
    }

    async fn open_regions(
        &self,
        envelope: &TransmissionPackage,
        package: SecurePackage,
        key: ImageKey,
        tracker: &mut StageTracker<ReceiverStage>,
    ) -> Result<OpenOutcome> {
        let decrypted = tokio::task::spawn_blocking(move || decrypt_regions(&package, &key))
            .await
            .map_err(|e| PixelveilError::Encryption(format!("decryption task failed: {e}")))??;
        tracker.advance(ReceiverStage::RegionsDecrypted)?;

        let png = envelope.blurred_image_bytes.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            decode_rgba(&png).map(|blurred| restore_regions(&blurred, decrypted))
        })
        .await
        .map_err(|e| PixelveilError::ImageError(format!("restore task failed: {e}")))??;
        tracker.advance(ReceiverStage::ImageReconstructed)?;
        Ok(outcome)
    }
}
