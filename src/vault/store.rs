//! File-backed store for the encrypted secret set.
//!
//! The whole set is one JSON object encrypted into a single blob (see
//! [`codec`]). Writes go through a temp file and rename, so a reader never
//! observes a torn vault.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use crate::vault::codec::{self, CodecError};

/// Decrypted secret map, key to value.
pub type SecretSet = BTreeMap<String, String>;

/// A secret the caller requires: its key plus a generator that produces a
/// value when the vault does not hold the key yet.
///
/// Generators run at most once per process: only during the unlock attempt
/// that first finds the key absent. An existing value is never overwritten.
pub struct SecretDefinition {
    key: String,
    generator: Box<dyn Fn() -> String + Send + Sync>,
}

impl SecretDefinition {
    pub fn new(
        key: impl Into<String>,
        generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            generator: Box::new(generator),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn generate(&self) -> String {
        (self.generator)()
    }
}

impl fmt::Debug for SecretDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretDefinition")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Error from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("vault file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("decrypted vault payload is not a valid secret map: {0}")]
    Payload(#[from] serde_json::Error),
}

/// The on-disk vault: one encrypted file at a caller-chosen path.
#[derive(Debug, Clone)]
pub struct SecretsStore {
    path: PathBuf,
}

impl SecretsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// First-run initialization: if no vault file exists, mint a password
    /// via `initial_password` and write an empty encrypted set. A no-op when
    /// the file is already there.
    ///
    /// Returns whether the file was created. The minted password is never
    /// persisted; surfacing it to the operator is the provider's job.
    pub fn ensure_exists(
        &self,
        initial_password: impl FnOnce() -> SecretString,
    ) -> Result<bool, StoreError> {
        if self.path.exists() {
            return Ok(false);
        }
        let password = initial_password();
        self.write_set(password.expose_secret(), &SecretSet::new())?;
        Ok(true)
    }

    /// Decrypt the vault, fill in any keys the definitions declare that the
    /// set does not hold, and persist the enlarged set under the same
    /// password. When every declared key is already present the file is left
    /// untouched.
    pub fn load_and_reconcile(
        &self,
        password: &str,
        definitions: &[SecretDefinition],
    ) -> Result<SecretSet, StoreError> {
        let blob = fs::read_to_string(&self.path)?;
        let plaintext = codec::decrypt(&blob, password)?;
        let mut secrets: SecretSet = serde_json::from_slice(&plaintext)?;

        let mut inserted = false;
        for def in definitions {
            if !secrets.contains_key(def.key()) {
                secrets.insert(def.key().to_string(), def.generate());
                inserted = true;
            }
        }

        if inserted {
            self.write_set(password, &secrets)?;
        }

        Ok(secrets)
    }

    /// Encrypt and write the set with all-or-nothing visibility: temp file
    /// in the same directory, fsync, then rename over the target.
    fn write_set(&self, password: &str, secrets: &SecretSet) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(secrets)?;
        let blob = codec::encrypt(&plaintext, password);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("vault.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(blob.as_bytes())?;
            file.sync_all()?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
