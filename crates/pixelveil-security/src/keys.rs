// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key material: per-image AES keys and the X25519 key pairs used to wrap
// them for a recipient.
//
// An `ImageKey` is generated fresh for every image.  It travels to the
// receiver only as an age-encrypted blob addressed to the receiver's public
// key:
//
//   wrapped = age( key_id (16, uuid) | created_at millis (8, i64 BE) | key (32) )
//
// so the unwrapped key comes back with the identifier the package refers to.

use std::io::{Read, Write};
use std::str::FromStr;

use age::secrecy::{ExposeSecret, ExposeSecretMut, SecretBox, SecretString};
use chrono::{DateTime, Utc};
use pixelveil_core::error::{PixelveilError, Result};
use ring::hkdf::{HKDF_SHA256, Salt};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// AES-256 key length in bytes.
pub const IMAGE_KEY_LEN: usize = 32;

/// Salt length produced by [`generate_salt`] and required by
/// [`derive_image_key`].
pub const SALT_LEN: usize = 16;

const KEY_DERIVATION_INFO: &[u8] = b"pixelveil image key v1";

const WRAPPED_PAYLOAD_LEN: usize = 16 + 8 + IMAGE_KEY_LEN;

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| PixelveilError::KeyDerivation("system random source unavailable".into()))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Image keys
// ---------------------------------------------------------------------------

/// Per-image symmetric key.  The key bytes are zeroised on drop.
pub struct ImageKey {
    id: Uuid,
    created_at: DateTime<Utc>,
    bytes: SecretBox<[u8; IMAGE_KEY_LEN]>,
}

impl ImageKey {
    /// Fresh random key with a new identifier.
    pub fn generate() -> Result<Self> {
        let key = Self::from_parts(Uuid::new_v4(), Utc::now(), random_bytes()?);
        debug!(key_id = %key.id, "image key generated");
        Ok(key)
    }

    fn from_parts(id: Uuid, created_at: DateTime<Utc>, bytes: [u8; IMAGE_KEY_LEN]) -> Self {
        Self {
            id,
            created_at,
            bytes: SecretBox::new(Box::new(bytes)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn expose(&self) -> &[u8; IMAGE_KEY_LEN] {
        self.bytes.expose_secret()
    }
}

impl Clone for ImageKey {
    fn clone(&self) -> Self {
        Self::from_parts(self.id, self.created_at, *self.expose())
    }
}

impl std::fmt::Debug for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageKey")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Random salt for [`derive_image_key`].
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    random_bytes()
}

/// Derive an image key from a passphrase with HKDF-SHA256.
///
/// The salt must be at least [`SALT_LEN`] bytes and should come from
/// [`generate_salt`]; it is stored alongside whatever the key protects.
#[instrument(skip_all, fields(salt_len = salt.len()))]
pub fn derive_image_key(passphrase: &SecretString, salt: &[u8]) -> Result<ImageKey> {
    let secret = passphrase.expose_secret();
    if secret.is_empty() {
        return Err(PixelveilError::KeyDerivation("empty passphrase".into()));
    }
    if salt.len() < SALT_LEN {
        return Err(PixelveilError::KeyDerivation(format!(
            "salt must be at least {SALT_LEN} bytes"
        )));
    }

    let mut bytes = [0u8; IMAGE_KEY_LEN];
    Salt::new(HKDF_SHA256, salt)
        .extract(secret.as_bytes())
        .expand(&[KEY_DERIVATION_INFO], HKDF_SHA256)
        .and_then(|okm| okm.fill(&mut bytes))
        .map_err(|_| PixelveilError::KeyDerivation("HKDF expansion failed".into()))?;

    let key = ImageKey::from_parts(Uuid::new_v4(), Utc::now(), bytes);
    debug!(key_id = %key.id, "image key derived");
    Ok(key)
}

// ---------------------------------------------------------------------------
// Key pairs
// ---------------------------------------------------------------------------

/// X25519 key pair of one principal.  The public half is shared as an
/// `age1...` string; the private half never leaves the holder.
#[derive(Clone)]
pub struct KeyPair {
    identity: age::x25519::Identity,
    recipient: age::x25519::Recipient,
}

impl KeyPair {
    pub fn generate() -> Self {
        let identity = age::x25519::Identity::generate();
        let recipient = identity.to_public();
        Self {
            identity,
            recipient,
        }
    }

    /// Parse an `AGE-SECRET-KEY-1...` string.
    pub fn from_secret(secret: &str) -> Result<Self> {
        let identity = age::x25519::Identity::from_str(secret.trim())
            .map_err(|_| PixelveilError::KeyUnwrap)?;
        let recipient = identity.to_public();
        Ok(Self {
            identity,
            recipient,
        })
    }

    /// Public key as an `age1...` string.
    pub fn public_key(&self) -> String {
        self.recipient.to_string()
    }

    pub(crate) fn secret(&self) -> SecretString {
        self.identity.to_string()
    }

    pub(crate) fn identity(&self) -> &age::x25519::Identity {
        &self.identity
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Wrapping
// ---------------------------------------------------------------------------

/// Encrypt `key` so only the holder of `recipient_public_key` can recover it.
#[instrument(skip_all, fields(key_id = %key.id()))]
pub fn wrap_image_key(key: &ImageKey, recipient_public_key: &str) -> Result<Vec<u8>> {
    let recipient = age::x25519::Recipient::from_str(recipient_public_key.trim())
        .map_err(|e| PixelveilError::KeyWrap(format!("invalid recipient: {e}")))?;

    let mut payload = SecretBox::new(Box::new(Vec::with_capacity(WRAPPED_PAYLOAD_LEN)));
    {
        let buf = payload.expose_secret_mut();
        buf.extend_from_slice(key.id().as_bytes());
        buf.extend_from_slice(&key.created_at().timestamp_millis().to_be_bytes());
        buf.extend_from_slice(key.expose());
    }

    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
            .map_err(|e| PixelveilError::KeyWrap(e.to_string()))?;
    let mut wrapped = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut wrapped)
        .map_err(|e| PixelveilError::KeyWrap(e.to_string()))?;
    writer
        .write_all(payload.expose_secret())
        .map_err(|e| PixelveilError::KeyWrap(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| PixelveilError::KeyWrap(e.to_string()))?;

    debug!(wrapped_len = wrapped.len(), "image key wrapped");
    Ok(wrapped)
}

/// Recover an image key wrapped for `key_pair`.  Every failure collapses to
/// [`PixelveilError::KeyUnwrap`].
#[instrument(skip_all, fields(wrapped_len = wrapped.len()))]
pub fn unwrap_image_key(wrapped: &[u8], key_pair: &KeyPair) -> Result<ImageKey> {
    let payload = decrypt_payload(wrapped, key_pair).inspect_err(|_| {
        warn!("image key unwrap failed");
    })?;
    let bytes = payload.expose_secret();
    if bytes.len() != WRAPPED_PAYLOAD_LEN {
        warn!("unwrapped key payload has unexpected length");
        return Err(PixelveilError::KeyUnwrap);
    }

    let id = Uuid::from_slice(&bytes[..16]).map_err(|_| PixelveilError::KeyUnwrap)?;
    let mut millis = [0u8; 8];
    millis.copy_from_slice(&bytes[16..24]);
    let created_at = DateTime::from_timestamp_millis(i64::from_be_bytes(millis))
        .ok_or(PixelveilError::KeyUnwrap)?;
    let mut key_bytes = [0u8; IMAGE_KEY_LEN];
    key_bytes.copy_from_slice(&bytes[24..]);

    let key = ImageKey::from_parts(id, created_at, key_bytes);
    debug!(key_id = %id, "image key unwrapped");
    Ok(key)
}

fn decrypt_payload(wrapped: &[u8], key_pair: &KeyPair) -> Result<SecretBox<Vec<u8>>> {
    let decryptor = age::Decryptor::new(wrapped).map_err(|_| PixelveilError::KeyUnwrap)?;
    let mut reader = decryptor
        .decrypt(std::iter::once(key_pair.identity() as &dyn age::Identity))
        .map_err(|_| PixelveilError::KeyUnwrap)?;
    let mut payload = SecretBox::new(Box::new(Vec::with_capacity(WRAPPED_PAYLOAD_LEN)));
    reader
        .read_to_end(payload.expose_secret_mut())
        .map_err(|_| PixelveilError::KeyUnwrap)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passphrase(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn generated_keys_are_distinct() {
        let a = ImageKey::generate().unwrap();
        let b = ImageKey::generate().unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn debug_hides_key_bytes() {
        let key = ImageKey::generate().unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains(&key.id().to_string()));
        assert!(!rendered.contains("bytes"));
    }

    #[test]
    fn derivation_depends_on_passphrase_and_salt() {
        let salt = generate_salt().unwrap();
        let other_salt = generate_salt().unwrap();
        assert_ne!(salt, other_salt);

        let a = derive_image_key(&passphrase("correct horse"), &salt).unwrap();
        let b = derive_image_key(&passphrase("correct horse"), &salt).unwrap();
        let c = derive_image_key(&passphrase("correct horse"), &other_salt).unwrap();
        let d = derive_image_key(&passphrase("battery staple"), &salt).unwrap();

        assert_eq!(a.expose(), b.expose());
        assert_ne!(a.expose(), c.expose());
        assert_ne!(a.expose(), d.expose());
    }

    #[test]
    fn derivation_rejects_weak_inputs() {
        let salt = generate_salt().unwrap();
        assert!(matches!(
            derive_image_key(&passphrase(""), &salt),
            Err(PixelveilError::KeyDerivation(_))
        ));
        assert!(matches!(
            derive_image_key(&passphrase("pw"), &salt[..8]),
            Err(PixelveilError::KeyDerivation(_))
        ));
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let receiver = KeyPair::generate();
        let key = ImageKey::generate().unwrap();

        let wrapped = wrap_image_key(&key, &receiver.public_key()).unwrap();
        let unwrapped = unwrap_image_key(&wrapped, &receiver).unwrap();

        assert_eq!(unwrapped.id(), key.id());
        assert_eq!(
            unwrapped.created_at().timestamp_millis(),
            key.created_at().timestamp_millis()
        );
        assert_eq!(unwrapped.expose(), key.expose());
    }

    #[test]
    fn unwrap_with_wrong_pair_fails() {
        let receiver = KeyPair::generate();
        let eavesdropper = KeyPair::generate();
        let key = ImageKey::generate().unwrap();

        let wrapped = wrap_image_key(&key, &receiver.public_key()).unwrap();
        assert!(matches!(
            unwrap_image_key(&wrapped, &eavesdropper),
            Err(PixelveilError::KeyUnwrap)
        ));
    }

    #[test]
    fn unwrap_rejects_garbage() {
        let receiver = KeyPair::generate();
        assert!(matches!(
            unwrap_image_key(b"not an age file", &receiver),
            Err(PixelveilError::KeyUnwrap)
        ));
    }

    #[test]
    fn wrap_rejects_bad_recipient() {
        let key = ImageKey::generate().unwrap();
        assert!(matches!(
            wrap_image_key(&key, "age1notakey"),
            Err(PixelveilError::KeyWrap(_))
        ));
    }

    #[test]
    fn key_pair_secret_round_trip() {
        let pair = KeyPair::generate();
        let restored = KeyPair::from_secret(pair.secret().expose_secret()).unwrap();
        assert_eq!(restored.public_key(), pair.public_key());
        assert!(pair.public_key().starts_with("age1"));
        assert!(KeyPair::from_secret("AGE-SECRET-KEY-1NOPE").is_err());
    }
}
