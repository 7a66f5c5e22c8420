//! Master secret lifecycle: create once, load, fingerprint, regenerate on
//! explicit confirmation.
//!
//! The secret file holds 64 lowercase hex chars (256 bits) and a trailing
//! newline, mode 0600. Creation uses exclusive create so two concurrent
//! `initialize` calls cannot both succeed.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

use svault_core::fsutil;
use svault_core::{VaultError, VaultResult};

use crate::KEY_SIZE;

/// The root secret every key is derived from.
///
/// Not `Clone`; zeroized on drop; never printed.
pub struct MasterSecret {
    bytes: [u8; KEY_SIZE],
}

impl MasterSecret {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build from arbitrary-length input, rejecting anything that is not
    /// exactly 256 bits of non-zero entropy.
    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.is_empty() {
            return Err(VaultError::WeakSecret("master secret is empty".into()));
        }
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            VaultError::WeakSecret(format!(
                "master secret is {} bytes (expected {KEY_SIZE})",
                bytes.len()
            ))
        })?;
        if array.iter().all(|b| *b == 0) {
            return Err(VaultError::WeakSecret("master secret is all zeros".into()));
        }
        Ok(Self::from_bytes(array))
    }

    /// Fresh secret from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub(crate) fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    fn from_hex(s: &str) -> VaultResult<Self> {
        let mut raw = hex::decode(s.trim())
            .map_err(|e| VaultError::WeakSecret(format!("master secret is not valid hex: {e}")))?;
        let result = Self::from_slice(&raw);
        raw.zeroize();
        result
    }
}

impl Drop for MasterSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// SHA-256 of the raw secret, hex encoded. For out-of-band backup
/// verification only; never used as key material.
pub fn fingerprint(secret: &MasterSecret) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Proof that the operator confirmed a destructive regeneration.
///
/// Only obtainable by echoing back the first 8 characters of the current
/// fingerprint, so a stray `--yes` cannot wipe the root secret.
#[derive(Debug)]
pub struct DestructiveConfirmation {
    fingerprint_prefix: String,
}

impl DestructiveConfirmation {
    pub const PREFIX_LEN: usize = 8;

    pub fn new(typed: &str, current_fingerprint: &str) -> VaultResult<Self> {
        let typed = typed.trim().to_ascii_lowercase();
        let expected = &current_fingerprint[..Self::PREFIX_LEN.min(current_fingerprint.len())];
        if typed.len() < Self::PREFIX_LEN || typed != expected {
            return Err(VaultError::Config(format!(
                "regeneration not confirmed: expected fingerprint prefix {expected}, got {typed:?}"
            )));
        }
        Ok(Self {
            fingerprint_prefix: typed,
        })
    }
}

/// Owns the on-disk master secret at a fixed location.
#[derive(Debug, Clone)]
pub struct MasterSecretManager {
    path: PathBuf,
}

impl MasterSecretManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Generate and persist a new secret. Fails with `AlreadyInitialized`
    /// (leaving the existing file untouched) if one is already present.
    pub fn initialize(&self) -> VaultResult<MasterSecret> {
        let secret = MasterSecret::generate();
        self.persist_new(&secret)?;
        tracing::info!(
            op = "master.init",
            path = %self.path.display(),
            fingerprint = %&fingerprint(&secret)[..16],
            "master secret created"
        );
        Ok(secret)
    }

    /// Persist a caller-supplied secret (used by restore). Same create-once
    /// guarantee as `initialize`.
    pub fn install(&self, secret: &MasterSecret) -> VaultResult<()> {
        self.persist_new(secret)?;
        tracing::info!(op = "master.install", path = %self.path.display(), "master secret installed");
        Ok(())
    }

    fn persist_new(&self, secret: &MasterSecret) -> VaultResult<()> {
        fsutil::ensure_parent(&self.path)?;
        let mut content = format!("{}\n", secret.to_hex());
        let result = fsutil::create_new_private(&self.path, content.as_bytes());
        content.zeroize();

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(VaultError::AlreadyInitialized {
                    path: self.path.clone(),
                })
            }
            Err(e) => Err(VaultError::io(&self.path)(e)),
        }
    }

    /// Load the existing secret.
    pub fn load(&self) -> VaultResult<MasterSecret> {
        let mut content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::NotInitialized {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(VaultError::io(&self.path)(e)),
        };
        let secret = MasterSecret::from_hex(&content).map_err(|e| match e {
            VaultError::WeakSecret(reason) => {
                VaultError::WeakSecret(format!("{}: {reason}", self.path.display()))
            }
            other => other,
        });
        content.zeroize();
        secret
    }

    /// Creation time of the secret file (mtime when the platform lacks birth time).
    pub fn created_at(&self) -> VaultResult<DateTime<Utc>> {
        let meta = std::fs::metadata(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaultError::NotInitialized {
                    path: self.path.clone(),
                }
            } else {
                VaultError::io(&self.path)(e)
            }
        })?;
        let time = meta
            .created()
            .or_else(|_| meta.modified())
            .map_err(VaultError::io(&self.path))?;
        Ok(DateTime::<Utc>::from(time))
    }

    /// Replace the secret with a fresh one. Every previously derived key
    /// becomes unreproducible; the old file is kept as a timestamped backup.
    pub fn regenerate(&self, confirmation: DestructiveConfirmation) -> VaultResult<MasterSecret> {
        self.regenerate_at(confirmation, Utc::now())
    }

    fn regenerate_at(
        &self,
        confirmation: DestructiveConfirmation,
        now: DateTime<Utc>,
    ) -> VaultResult<MasterSecret> {
        let old = self.load()?;
        let old_fp = fingerprint(&old);
        if !old_fp.starts_with(&confirmation.fingerprint_prefix) {
            return Err(VaultError::Config(format!(
                "confirmation was issued for a different secret (current fingerprint {})",
                &old_fp[..DestructiveConfirmation::PREFIX_LEN]
            )));
        }

        let backup_path = self.backup_path(&old_fp, now);
        let mut backup = format!("{}\n", old.to_hex());
        let backed_up = fsutil::create_new_private(&backup_path, backup.as_bytes());
        backup.zeroize();
        backed_up.map_err(VaultError::io(&backup_path))?;

        let secret = MasterSecret::generate();
        let mut content = format!("{}\n", secret.to_hex());
        let result = fsutil::atomic_write(&self.path, content.as_bytes(), true);
        content.zeroize();
        result?;

        tracing::warn!(
            op = "master.regenerate",
            path = %self.path.display(),
            backup = %backup_path.display(),
            old_fingerprint = %&old_fp[..16],
            new_fingerprint = %&fingerprint(&secret)[..16],
            "master secret regenerated; keys derived from the old secret are orphaned"
        );
        Ok(secret)
    }

    /// `<file>.bak.<microsecond timestamp>.<old fingerprint prefix>`; created
    /// with `create_new`, so an existing backup is never replaced.
    fn backup_path(&self, old_fingerprint: &str, at: DateTime<Utc>) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(
            ".bak.{}.{}",
            at.format("%Y%m%dT%H%M%S%.6fZ"),
            &old_fingerprint[..DestructiveConfirmation::PREFIX_LEN]
        ));
        self.path.with_file_name(name)
    }
}
