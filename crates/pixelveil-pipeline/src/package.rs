// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure packages and their wire formats.
//
// In memory, a `SecurePackage` holds decoded bytes and typed identifiers.  On
// the wire it becomes a `SecureMetadataPackage` (base64 strings, JSON), which
// in turn travels inside a `TransmissionEnvelope` together with the blurred
// PNG and the wrapped image key.
//
// Everything that can be checked without a key is checked while parsing, so a
// malformed package is rejected before any decryption is attempted.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use pixelveil_core::error::{PixelveilError, Result};
use pixelveil_core::{Rect01, RegionType};
use pixelveil_image::codec::DEFAULT_MARGIN_PX;
use pixelveil_security::{NONCE_LEN, TAG_LEN, sha256_hex, verify_sha256};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Scheme tag written into every package.
pub const ENCRYPTION_SCHEME: &str = "AES-GCM-256";

/// Largest region margin a package may declare.
pub const MAX_REGION_MARGIN_PX: u32 = 4096;

fn format_err(detail: impl Into<String>) -> PixelveilError {
    PixelveilError::PackageFormat(detail.into())
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| format_err(format!("{field} is not valid base64: {e}")))
}

// ---------------------------------------------------------------------------
// In-memory package
// ---------------------------------------------------------------------------

/// One encrypted region.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedRegion {
    pub id: String,
    pub region_type: RegionType,
    pub normalized_box: Rect01,
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub auth_tag: [u8; TAG_LEN],
    pub sensitivity_label: Option<String>,
}

/// All sealed regions of one image, bound to one image key.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurePackage {
    pub asset_id: String,
    pub sealed_regions: Vec<SealedRegion>,
    pub image_key_id: Uuid,
    pub scheme_tag: String,
    pub packaged_at: DateTime<Utc>,
    /// Margin the sender added around every region.  The receiver must
    /// rebuild rectangles with the same value.
    pub region_margin_px: u32,
}

impl SecurePackage {
    /// New package using the default region margin.  See
    /// [`with_region_margin`](Self::with_region_margin).
    pub fn new(
        asset_id: impl Into<String>,
        image_key_id: Uuid,
        sealed_regions: Vec<SealedRegion>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            sealed_regions,
            image_key_id,
            scheme_tag: ENCRYPTION_SCHEME.to_owned(),
            packaged_at: Utc::now(),
            region_margin_px: DEFAULT_MARGIN_PX,
        }
    }

    pub fn with_region_margin(mut self, margin: u32) -> Self {
        self.region_margin_px = margin;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&SecureMetadataPackage::from(self))?)
    }

    /// Parse and validate a serialised `SecureMetadataPackage`.
    pub fn from_json(data: &str) -> Result<Self> {
        let wire: SecureMetadataPackage = serde_json::from_str(data)
            .map_err(|e| format_err(format!("invalid package JSON: {e}")))?;
        Self::try_from(wire)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRegionRecord {
    pub id: String,
    pub region_type: RegionType,
    pub normalized_box: Rect01,
    pub ciphertext: String,
    pub nonce: String,
    pub tag: String,
    pub sensitivity_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureMetadataPackage {
    pub asset_identifier: String,
    pub encrypted_regions: Vec<EncryptedRegionRecord>,
    pub image_key_identifier: String,
    pub encryption_scheme: String,
    pub packaged_at: DateTime<Utc>,
    pub region_margin_px: u32,
}

impl From<&SealedRegion> for EncryptedRegionRecord {
    fn from(region: &SealedRegion) -> Self {
        Self {
            id: region.id.clone(),
            region_type: region.region_type,
            normalized_box: region.normalized_box,
            ciphertext: BASE64.encode(&region.ciphertext),
            nonce: BASE64.encode(region.nonce),
            tag: BASE64.encode(region.auth_tag),
            sensitivity_label: region.sensitivity_label.clone(),
        }
    }
}

impl TryFrom<EncryptedRegionRecord> for SealedRegion {
    type Error = PixelveilError;

    fn try_from(record: EncryptedRegionRecord) -> Result<Self> {
        if record.id.is_empty() {
            return Err(format_err("region with empty id"));
        }
        let nonce: [u8; NONCE_LEN] = decode_b64("nonce", &record.nonce)?
            .try_into()
            .map_err(|v: Vec<u8>| {
                format_err(format!(
                    "region {}: nonce is {} bytes, expected {NONCE_LEN}",
                    record.id,
                    v.len()
                ))
            })?;
        let auth_tag: [u8; TAG_LEN] = decode_b64("tag", &record.tag)?
            .try_into()
            .map_err(|v: Vec<u8>| {
                format_err(format!(
                    "region {}: tag is {} bytes, expected {TAG_LEN}",
                    record.id,
                    v.len()
                ))
            })?;
        let ciphertext = decode_b64("ciphertext", &record.ciphertext)?;

        Ok(Self {
            id: record.id,
            region_type: record.region_type,
            normalized_box: record.normalized_box,
            ciphertext,
            nonce,
            auth_tag,
            sensitivity_label: record.sensitivity_label,
        })
    }
}

impl From<&SecurePackage> for SecureMetadataPackage {
    fn from(package: &SecurePackage) -> Self {
        Self {
            asset_identifier: package.asset_id.clone(),
            encrypted_regions: package.sealed_regions.iter().map(Into::into).collect(),
            image_key_identifier: package.image_key_id.to_string(),
            encryption_scheme: package.scheme_tag.clone(),
            packaged_at: package.packaged_at,
            region_margin_px: package.region_margin_px,
        }
    }
}

impl TryFrom<SecureMetadataPackage> for SecurePackage {
    type Error = PixelveilError;

    fn try_from(wire: SecureMetadataPackage) -> Result<Self> {
        if wire.encryption_scheme != ENCRYPTION_SCHEME {
            return Err(PixelveilError::UnsupportedScheme(wire.encryption_scheme));
        }
        if wire.asset_identifier.is_empty() {
            return Err(format_err("empty asset identifier"));
        }
        if wire.region_margin_px > MAX_REGION_MARGIN_PX {
            return Err(format_err(format!(
                "region margin {} exceeds {MAX_REGION_MARGIN_PX}",
                wire.region_margin_px
            )));
        }
        let image_key_id = Uuid::parse_str(&wire.image_key_identifier)
            .map_err(|e| format_err(format!("invalid image key identifier: {e}")))?;

        let mut seen = HashSet::new();
        let mut sealed_regions = Vec::with_capacity(wire.encrypted_regions.len());
        for record in wire.encrypted_regions {
            if !seen.insert(record.id.clone()) {
                return Err(format_err(format!("duplicate region id {}", record.id)));
            }
            sealed_regions.push(SealedRegion::try_from(record)?);
        }

        Ok(Self {
            asset_id: wire.asset_identifier,
            sealed_regions,
            image_key_id,
            scheme_tag: wire.encryption_scheme,
            packaged_at: wire.packaged_at,
            region_margin_px: wire.region_margin_px,
        })
    }
}

// ---------------------------------------------------------------------------
// Transmission
// ---------------------------------------------------------------------------

/// The artifact handed from sender to receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionPackage {
    /// Blurred image, PNG-encoded.
    pub blurred_image_bytes: Vec<u8>,
    /// Serialised [`SecureMetadataPackage`].
    pub encrypted_metadata: String,
    /// Image key wrapped for the recipient.
    pub encrypted_image_key: Vec<u8>,
    pub asset_identifier: String,
    pub blurred_image_sha256: Option<String>,
}

/// JSON shape of a [`TransmissionPackage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionEnvelope {
    pub blurred_image_bytes: String,
    pub encrypted_metadata: String,
    pub encrypted_image_key: String,
    pub asset_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blurred_image_sha256: Option<String>,
}

impl TransmissionPackage {
    pub fn new(
        blurred_png: Vec<u8>,
        package: &SecurePackage,
        wrapped_key: Vec<u8>,
    ) -> Result<Self> {
        let blurred_image_sha256 = Some(sha256_hex(&blurred_png));
        Ok(Self {
            blurred_image_bytes: blurred_png,
            encrypted_metadata: package.to_json()?,
            encrypted_image_key: wrapped_key,
            asset_identifier: package.asset_id.clone(),
            blurred_image_sha256,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let envelope = TransmissionEnvelope {
            blurred_image_bytes: BASE64.encode(&self.blurred_image_bytes),
            encrypted_metadata: self.encrypted_metadata.clone(),
            encrypted_image_key: BASE64.encode(&self.encrypted_image_key),
            asset_identifier: self.asset_identifier.clone(),
            blurred_image_sha256: self.blurred_image_sha256.clone(),
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    #[instrument(skip_all, fields(len = data.len()))]
    pub fn from_json(data: &str) -> Result<Self> {
        let envelope: TransmissionEnvelope = serde_json::from_str(data)
            .map_err(|e| format_err(format!("invalid envelope JSON: {e}")))?;
        let package = Self {
            blurred_image_bytes: decode_b64("blurred_image_bytes", &envelope.blurred_image_bytes)?,
            encrypted_metadata: envelope.encrypted_metadata,
            encrypted_image_key: decode_b64("encrypted_image_key", &envelope.encrypted_image_key)?,
            asset_identifier: envelope.asset_identifier,
            blurred_image_sha256: envelope.blurred_image_sha256,
        };
        debug!(asset = %package.asset_identifier, "envelope parsed");
        Ok(package)
    }

    /// Check the blurred image against its digest, when one was sent.
    pub fn verify_integrity(&self) -> Result<()> {
        match &self.blurred_image_sha256 {
            Some(expected) => verify_sha256(&self.blurred_image_bytes, expected).inspect_err(|_| {
                warn!(asset = %self.asset_identifier, "blurred image digest mismatch");
            }),
            None => Ok(()),
        }
    }

    /// Parse the embedded package and check it belongs to this envelope.
    pub fn secure_package(&self) -> Result<SecurePackage> {
        let package = SecurePackage::from_json(&self.encrypted_metadata)?;
        if package.asset_id != self.asset_identifier {
            return Err(format_err(format!(
                "envelope is for {} but package is for {}",
                self.asset_identifier, package.asset_id
            )));
        }
        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: &str) -> SealedRegion {
        SealedRegion {
            id: id.into(),
            region_type: RegionType::Text,
            normalized_box: Rect01::new(0.1, 0.2, 0.3, 0.1),
            ciphertext: vec![1, 2, 3, 4, 5],
            nonce: [7; NONCE_LEN],
            auth_tag: [9; TAG_LEN],
            sensitivity_label: Some("email".into()),
        }
    }

    fn package() -> SecurePackage {
        SecurePackage::new("asset-42", Uuid::new_v4(), vec![region("r0"), region("r1")])
    }

    fn wire_json(pkg: &SecurePackage) -> serde_json::Value {
        serde_json::from_str(&pkg.to_json().unwrap()).unwrap()
    }

    #[test]
    fn wire_format_has_exact_field_names() {
        let json = wire_json(&package());
        for field in [
            "asset_identifier",
            "encrypted_regions",
            "image_key_identifier",
            "encryption_scheme",
            "packaged_at",
            "region_margin_px",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        let region = &json["encrypted_regions"][0];
        for field in [
            "id",
            "region_type",
            "normalized_box",
            "ciphertext",
            "nonce",
            "tag",
            "sensitivity_label",
        ] {
            assert!(region.get(field).is_some(), "missing region.{field}");
        }
        assert_eq!(region["region_type"], "text");
        assert_eq!(json["encryption_scheme"], ENCRYPTION_SCHEME);
    }

    #[test]
    fn package_survives_serialisation() {
        let pkg = package();
        let parsed = SecurePackage::from_json(&pkg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, pkg);
    }

    #[test]
    fn rejects_wrong_scheme() {
        let mut json = wire_json(&package());
        json["encryption_scheme"] = "ChaCha20".into();
        assert!(matches!(
            SecurePackage::from_json(&json.to_string()),
            Err(PixelveilError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn rejects_bad_nonce_tag_and_base64() {
        let mut json = wire_json(&package());
        json["encrypted_regions"][0]["nonce"] = BASE64.encode([0u8; 8]).into();
        assert!(matches!(
            SecurePackage::from_json(&json.to_string()),
            Err(PixelveilError::PackageFormat(_))
        ));

        let mut json = wire_json(&package());
        json["encrypted_regions"][1]["tag"] = BASE64.encode([0u8; 12]).into();
        assert!(SecurePackage::from_json(&json.to_string()).is_err());

        let mut json = wire_json(&package());
        json["encrypted_regions"][0]["ciphertext"] = "***".into();
        assert!(SecurePackage::from_json(&json.to_string()).is_err());
    }

    #[test]
    fn rejects_missing_fields_and_duplicates() {
        let mut json = wire_json(&package());
        json.as_object_mut().unwrap().remove("image_key_identifier");
        assert!(SecurePackage::from_json(&json.to_string()).is_err());

        let mut json = wire_json(&package());
        json["encrypted_regions"][1]["id"] = "r0".into();
        assert!(SecurePackage::from_json(&json.to_string()).is_err());

        assert!(SecurePackage::from_json("not json").is_err());
    }

    #[test]
    fn region_margin_travels_with_the_package() {
        let pkg = package().with_region_margin(4);
        let json = wire_json(&pkg);
        assert_eq!(json["region_margin_px"], 4);
        assert_eq!(SecurePackage::from_json(&json.to_string()).unwrap().region_margin_px, 4);

        let mut json = wire_json(&pkg);
        json["region_margin_px"] = (MAX_REGION_MARGIN_PX + 1).into();
        assert!(matches!(
            SecurePackage::from_json(&json.to_string()),
            Err(PixelveilError::PackageFormat(_))
        ));

        let mut json = wire_json(&pkg);
        json.as_object_mut().unwrap().remove("region_margin_px");
        assert!(SecurePackage::from_json(&json.to_string()).is_err());
    }

    #[test]
    fn envelope_round_trip_and_integrity() {
        let pkg = package();
        let envelope =
            TransmissionPackage::new(vec![0x89, b'P', b'N', b'G'], &pkg, vec![42; 10]).unwrap();
        let parsed = TransmissionPackage::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(parsed, envelope);
        parsed.verify_integrity().unwrap();
        assert_eq!(parsed.secure_package().unwrap(), pkg);

        let mut tampered = parsed.clone();
        tampered.blurred_image_bytes.push(0);
        assert!(matches!(
            tampered.verify_integrity(),
            Err(PixelveilError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn envelope_digest_is_optional() {
        let pkg = package();
        let mut envelope = TransmissionPackage::new(vec![1, 2, 3], &pkg, vec![4]).unwrap();
        envelope.blurred_image_sha256 = None;
        let json = envelope.to_json().unwrap();
        assert!(!json.contains("blurred_image_sha256"));
        TransmissionPackage::from_json(&json)
            .unwrap()
            .verify_integrity()
            .unwrap();
    }

    #[test]
    fn envelope_rejects_mismatched_asset() {
        let pkg = package();
        let mut envelope = TransmissionPackage::new(vec![1], &pkg, vec![2]).unwrap();
        envelope.asset_identifier = "someone-else".into();
        assert!(matches!(
            envelope.secure_package(),
            Err(PixelveilError::PackageFormat(_))
        ));
    }
}
