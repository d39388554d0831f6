// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory key store.  Constructed explicitly and passed by reference; one
// store per session or test.  Image keys are indexed by key id, key pairs by
// a caller-chosen tag (e.g. "sender", "receiver").

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use pixelveil_core::error::{PixelveilError, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::keys::{ImageKey, KeyPair};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct KeyStore {
    image_keys: Mutex<HashMap<Uuid, ImageKey>>,
    key_pairs: Mutex<HashMap<String, KeyPair>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `key` for later lookup.  Returns its id.
    pub fn store_image_key(&self, key: ImageKey) -> Uuid {
        let id = key.id();
        lock(&self.image_keys).insert(id, key);
        debug!(key_id = %id, "image key stored");
        id
    }

    /// Copy of the stored key with this id, if any.
    pub fn image_key(&self, id: &Uuid) -> Option<ImageKey> {
        lock(&self.image_keys).get(id).cloned()
    }

    /// Like [`image_key`](Self::image_key) but a missing key is an error.
    pub fn require_image_key(&self, id: &Uuid) -> Result<ImageKey> {
        self.image_key(id)
            .ok_or_else(|| PixelveilError::KeyNotFound(id.to_string()))
    }

    /// Drop one image key.  Returns whether it was present.
    pub fn remove_image_key(&self, id: &Uuid) -> bool {
        lock(&self.image_keys).remove(id).is_some()
    }

    pub fn store_key_pair(&self, tag: impl Into<String>, pair: KeyPair) {
        let tag = tag.into();
        debug!(%tag, public_key = %pair.public_key(), "key pair stored");
        lock(&self.key_pairs).insert(tag, pair);
    }

    pub fn key_pair(&self, tag: &str) -> Option<KeyPair> {
        lock(&self.key_pairs).get(tag).cloned()
    }

    /// Drop every image key and key pair.  Image key bytes are zeroised as
    /// they are dropped.  Returns how many entries were removed.
    pub fn clear_all_keys(&self) -> usize {
        let mut image_keys = lock(&self.image_keys);
        let mut key_pairs = lock(&self.key_pairs);
        let removed = image_keys.len() + key_pairs.len();
        image_keys.clear();
        key_pairs.clear();
        info!(removed, "key store cleared");
        removed
    }

    /// Total number of stored entries (image keys plus key pairs).
    pub fn len(&self) -> usize {
        lock(&self.image_keys).len() + lock(&self.key_pairs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("image_keys", &lock(&self.image_keys).len())
            .field("key_pairs", &lock(&self.key_pairs).len())
            .finish()
    }
}
