// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identity files: a key pair's secret half stored on disk as an age file
// encrypted with a passphrase (scrypt).  The user only has to remember the
// passphrase; the file itself reveals nothing.

use std::io::{Read, Write};
use std::path::Path;

use age::secrecy::{ExposeSecret, SecretString};
use pixelveil_core::error::{PixelveilError, Result};
use tracing::{debug, info, instrument};

use crate::keys::KeyPair;

/// Passphrase-based sealing of small secrets.
///
/// The passphrase lives only as long as this value.
pub struct PassphraseVault {
    passphrase: SecretString,
}

impl PassphraseVault {
    pub fn new(passphrase: SecretString) -> Result<Self> {
        if passphrase.expose_secret().is_empty() {
            return Err(PixelveilError::KeyDerivation("empty passphrase".into()));
        }
        Ok(Self { passphrase })
    }

    /// Encrypt into a complete age file.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let encryptor = age::Encryptor::with_user_passphrase(self.passphrase.clone());
        let mut ciphertext = Vec::new();

        let mut writer = encryptor
            .wrap_output(&mut ciphertext)
            .map_err(|e| PixelveilError::Encryption(e.to_string()))?;
        writer
            .write_all(plaintext)
            .map_err(|e| PixelveilError::Encryption(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| PixelveilError::Encryption(e.to_string()))?;

        debug!(ciphertext_len = ciphertext.len(), "vault encryption complete");
        Ok(ciphertext)
    }

    /// Decrypt an age file.  A wrong passphrase or damaged file is reported
    /// as [`PixelveilError::Authentication`].
    #[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let decryptor =
            age::Decryptor::new(ciphertext).map_err(|_| PixelveilError::Authentication)?;
        let identity = age::scrypt::Identity::new(self.passphrase.clone());

        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|_| PixelveilError::Authentication)?;
        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|_| PixelveilError::Authentication)?;

        debug!(plaintext_len = plaintext.len(), "vault decryption complete");
        Ok(plaintext)
    }
}

/// Write `pair` to `path`, encrypted under `passphrase`.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_key_pair(
    path: impl AsRef<Path>,
    pair: &KeyPair,
    passphrase: SecretString,
) -> Result<()> {
    let vault = PassphraseVault::new(passphrase)?;
    let ciphertext = vault.encrypt(pair.secret().expose_secret().as_bytes())?;
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path.as_ref(), ciphertext)?;
    info!(public_key = %pair.public_key(), "identity saved");
    Ok(())
}

/// Read a key pair written by [`save_key_pair`].
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_key_pair(path: impl AsRef<Path>, passphrase: SecretString) -> Result<KeyPair> {
    let ciphertext = std::fs::read(path.as_ref())?;
    let plaintext = PassphraseVault::new(passphrase)?.decrypt(&ciphertext)?;
    let secret = SecretString::from(
        String::from_utf8(plaintext).map_err(|_| PixelveilError::KeyUnwrap)?,
    );
    let pair = KeyPair::from_secret(secret.expose_secret())?;
    info!(public_key = %pair.public_key(), "identity loaded");
    Ok(pair)
}
