//! Derived recipient keys on disk
//!
//! One file per derivation path, named after `DerivationPath::file_stem`
//! (`<purpose>-<scope>-<type>-<index>.txt`, hyphens inside segments escaped)
//! in age identity-file layout:
//!
//! ```text
//! # created: 2026-10-17T09:30:00Z
//! # path: session/ab12cd34/planning/0
//! # algorithm: age
//! # public key: age1...
//! AGE-SECRET-KEY-1...
//! ```
//!
//! Files are written with mode 0600 and never overwritten: because
//! derivation is deterministic, an existing file for the same path must hold
//! the same public key, and a mismatch means the master secret changed.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

use svault_core::fsutil;
use svault_core::{VaultError, VaultResult};
use svault_keys::{derive, DerivationPath, MasterSecret};

use crate::sealing::{Keypair, PrivateKey, SealingBackend};

/// A keypair together with the path it was derived for.
#[derive(Debug)]
pub struct DerivedKeypair {
    pub path: DerivationPath,
    pub algorithm: &'static str,
    pub keypair: Keypair,
}

/// Derive the recipient keypair for `path`. Pure: nothing touches disk.
pub fn derive_keypair(
    backend: &dyn SealingBackend,
    master: &MasterSecret,
    path: &DerivationPath,
) -> VaultResult<DerivedKeypair> {
    let material = derive(master, path)?;
    let keypair = backend
        .keypair_from_seed(material.as_bytes())
        .map_err(|e| VaultError::MissingCapability(format!("{} keypair generation: {e}", backend.algorithm())))?;
    Ok(DerivedKeypair {
        path: path.clone(),
        algorithm: backend.algorithm(),
        keypair,
    })
}

/// Header fields of a stored key file (no secret material).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFileInfo {
    pub file: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
    pub derivation_path: Option<String>,
    pub public_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for(&self, path: &DerivationPath) -> PathBuf {
        self.dir.join(format!("{}.txt", path.file_stem()))
    }

    /// Persist a derived keypair. Returns the file path and whether it was
    /// newly created.
    pub fn store(&self, derived: &DerivedKeypair) -> VaultResult<(PathBuf, bool)> {
        let file = self.file_for(&derived.path);

        if file.exists() {
            let info = read_info(&file)?;
            check_owner(&info, &derived.path)?;
            if info.public_key.as_deref() != Some(derived.keypair.public_key.as_str()) {
                return Err(VaultError::ChecksumMismatch {
                    path: file,
                    expected: derived.keypair.public_key.clone(),
                    actual: info.public_key.unwrap_or_else(|| "<none>".into()),
                });
            }
            tracing::debug!(op = "keystore.store", file = %file.display(), "key file already present");
            return Ok((file, false));
        }

        fsutil::ensure_parent(&file)?;
        let mut content = format!(
            "# created: {}\n# path: {}\n# algorithm: {}\n# public key: {}\n{}\n",
            Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            derived.path,
            derived.algorithm,
            derived.keypair.public_key,
            derived.keypair.private_key.expose(),
        );
        let written = fsutil::create_new_private(&file, content.as_bytes());
        content.zeroize();
        match written {
            Ok(()) => {}
            // Lost a race with a concurrent writer of the same deterministic key
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok((file, false)),
            Err(e) => return Err(VaultError::io(&file)(e)),
        }

        tracing::info!(
            op = "keystore.store",
            file = %file.display(),
            path = %derived.path,
            "derived key written"
        );
        Ok((file, true))
    }

    /// Load the private key stored for `path`. Fails if the file's
    /// `# path:` header names a different derivation path.
    pub fn load(&self, path: &DerivationPath) -> VaultResult<PrivateKey> {
        let file = self.file_for(path);
        let content = read_key_file(&file)?;
        check_owner(&parse_info(&file, &content), path)?;
        Ok(PrivateKey::new(content))
    }

    /// Header info for every key file in the store, sorted by file name.
    pub fn list(&self) -> VaultResult<Vec<KeyFileInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(VaultError::io(&self.dir))? {
            let entry = entry.map_err(VaultError::io(&self.dir))?;
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) == Some("txt") {
                out.push(read_info(&file)?);
            }
        }
        out.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(out)
    }

    /// Key files older than `days` (by their `# created:` header).
    pub fn due_for_rotation(&self, days: u32, now: DateTime<Utc>) -> VaultResult<Vec<KeyFileInfo>> {
        let window = chrono::Duration::days(i64::from(days));
        Ok(self
            .list()?
            .into_iter()
            .filter(|k| k.created_at.is_some_and(|c| now - c > window))
            .collect())
    }
}

/// Read a private key / identity file from disk.
pub fn load_private_key(file: &Path) -> VaultResult<PrivateKey> {
    read_key_file(file).map(PrivateKey::new)
}

fn read_key_file(file: &Path) -> VaultResult<String> {
    std::fs::read_to_string(file).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VaultError::NotFound(format!("key file {}", file.display()))
        } else {
            VaultError::io(file)(e)
        }
    })
}

/// A key file whose header names another derivation path is never used
/// for `path`.
fn check_owner(info: &KeyFileInfo, path: &DerivationPath) -> VaultResult<()> {
    let expected = path.canonical();
    match info.derivation_path.as_deref() {
        Some(actual) if actual != expected => Err(VaultError::Serialization {
            path: info.file.clone(),
            reason: format!("key file belongs to derivation path {actual}, expected {expected}"),
        }),
        _ => Ok(()),
    }
}

fn read_info(file: &Path) -> VaultResult<KeyFileInfo> {
    let mut content = std::fs::read_to_string(file).map_err(VaultError::io(file))?;
    let info = parse_info(file, &content);
    content.zeroize();
    Ok(info)
}

fn parse_info(file: &Path, content: &str) -> KeyFileInfo {
    let mut info = KeyFileInfo {
        file: file.to_path_buf(),
        created_at: None,
        derivation_path: None,
        public_key: None,
    };
    for line in content.lines().filter_map(|l| l.strip_prefix("# ")) {
        if let Some(v) = line.strip_prefix("created: ") {
            info.created_at = DateTime::parse_from_rfc3339(v.trim())
                .ok()
                .map(|d| d.with_timezone(&Utc));
        } else if let Some(v) = line.strip_prefix("path: ") {
            info.derivation_path = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("public key: ") {
            info.public_key = Some(v.trim().to_string());
        }
    }
    info
}
