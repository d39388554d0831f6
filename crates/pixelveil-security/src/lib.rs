// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pixelveil-security: Cryptographic foundation for region sealing.
//
// Per-image AES-256-GCM keys (ring), X25519 key wrapping and
// passphrase-protected identity files (age), an explicitly owned in-memory
// key store, SHA-256 integrity helpers and an append-only SQLite audit trail.

pub mod audit;
pub mod integrity;
pub mod key_store;
pub mod keyfile;
pub mod keys;
pub mod sealer;

pub use age::secrecy::SecretString;
pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use integrity::{sha256_hex, verify_sha256};
pub use key_store::KeyStore;
pub use keyfile::{PassphraseVault, load_key_pair, save_key_pair};
pub use keys::{
    IMAGE_KEY_LEN, ImageKey, KeyPair, SALT_LEN, derive_image_key, generate_salt,
    unwrap_image_key, wrap_image_key,
};
pub use ring::aead::NONCE_LEN;
pub use sealer::{RegionSealer, SealedBytes, TAG_LEN, open, region_aad, seal};
