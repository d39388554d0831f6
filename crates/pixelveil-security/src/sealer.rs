// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region sealer: AES-256-GCM over pixel blocks and other region payloads.
//
// Every seal draws a fresh 96-bit nonce from the system CSPRNG.  A
// `RegionSealer` additionally remembers every nonce it has handed out for its
// key and draws again on a repeat, so no nonce is ever used twice under one
// image key.
//
// Associated data binds a region to its package:
//
//   aad = asset_identifier | 0x00 | region_id
//
// so a sealed region moved into another package, or renamed, fails to open.

use std::collections::HashSet;
use std::sync::Mutex;

use pixelveil_core::error::{PixelveilError, Result};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::keys::ImageKey;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Output of one seal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBytes {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

/// Associated data for a region within a package.
pub fn region_aad(asset_identifier: &str, region_id: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(asset_identifier.len() + 1 + region_id.len());
    aad.extend_from_slice(asset_identifier.as_bytes());
    aad.push(0);
    aad.extend_from_slice(region_id.as_bytes());
    aad
}

/// AEAD bound to one image key.
pub struct RegionSealer {
    key_id: Uuid,
    aead: LessSafeKey,
    rng: SystemRandom,
    issued: Mutex<HashSet<[u8; NONCE_LEN]>>,
}

impl RegionSealer {
    pub fn new(key: &ImageKey) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, key.expose())
            .map_err(|_| PixelveilError::Encryption("invalid AES-256 key".into()))?;
        Ok(Self {
            key_id: key.id(),
            aead: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
            issued: Mutex::new(HashSet::new()),
        })
    }

    pub fn key_id(&self) -> Uuid {
        self.key_id
    }

    /// Number of nonces issued so far.
    pub fn issued_nonces(&self) -> usize {
        self.issued.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn fresh_nonce(&self) -> Result<[u8; NONCE_LEN]> {
        let mut issued = self.issued.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            let mut nonce = [0u8; NONCE_LEN];
            self.rng.fill(&mut nonce).map_err(|_| {
                PixelveilError::Encryption("system random source unavailable".into())
            })?;
            if issued.insert(nonce) {
                return Ok(nonce);
            }
            warn!(key_id = %self.key_id, "nonce collision, drawing again");
        }
    }

    /// Encrypt `plaintext` under a fresh nonce.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<SealedBytes> {
        let nonce = self.fresh_nonce()?;
        let mut ciphertext = plaintext.to_vec();
        let tag = self
            .aead
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad),
                &mut ciphertext,
            )
            .map_err(|_| PixelveilError::Encryption("AES-GCM seal failed".into()))?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_ref());
        trace!(key_id = %self.key_id, len = plaintext.len(), "payload sealed");
        Ok(SealedBytes {
            ciphertext,
            nonce,
            tag: tag_bytes,
        })
    }

    /// Decrypt and authenticate.  Any mismatch in ciphertext, nonce, tag or
    /// associated data yields [`PixelveilError::Authentication`] and no
    /// plaintext.
    pub fn open(&self, ciphertext: &[u8], nonce: &[u8], tag: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| PixelveilError::Authentication)?;
        if tag.len() != TAG_LEN {
            return Err(PixelveilError::Authentication);
        }

        let mut in_out = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        in_out.extend_from_slice(ciphertext);
        in_out.extend_from_slice(tag);

        let plaintext_len = self
            .aead
            .open_in_place(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad),
                &mut in_out,
            )
            .map_err(|_| PixelveilError::Authentication)?
            .len();
        in_out.truncate(plaintext_len);
        Ok(in_out)
    }
}

/// One-shot seal under `key`.  Prefer a long-lived [`RegionSealer`] when
/// sealing several payloads under the same key.
pub fn seal(plaintext: &[u8], key: &ImageKey, aad: &[u8]) -> Result<SealedBytes> {
    RegionSealer::new(key)?.seal(plaintext, aad)
}

/// One-shot open under `key`.
pub fn open(
    ciphertext: &[u8],
    nonce: &[u8],
    tag: &[u8],
    key: &ImageKey,
    aad: &[u8],
) -> Result<Vec<u8>> {
    let result = RegionSealer::new(key)?.open(ciphertext, nonce, tag, aad);
    if result.is_err() {
        debug!(key_id = %key.id(), "authentication failed");
    }
    result
}
