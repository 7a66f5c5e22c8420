//! Session retrieval: locate, verify integrity, open.
//!
//! The checksum is always verified before the ciphertext reaches the
//! sealing backend, so tampering surfaces as `ChecksumMismatch` rather than
//! as an opaque decryption failure. Plaintext is returned to the caller and
//! never written by this module.

use std::path::{Path, PathBuf};

use svault_core::{SessionRecord, VaultError, VaultResult};

use crate::encrypt::checksum;
use crate::index::SessionIndex;
use crate::sealing::{PrivateKey, SealError, SealingBackend};

pub fn ciphertext_file(sessions_dir: &Path, record: &SessionRecord) -> PathBuf {
    sessions_dir.join(&record.encryption.encrypted_file_path)
}

/// Read a session's ciphertext and check it against the recorded checksum.
pub fn read_verified(sessions_dir: &Path, record: &SessionRecord) -> VaultResult<Vec<u8>> {
    let path = ciphertext_file(sessions_dir, record);
    let ciphertext = std::fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VaultError::NotFound(format!(
                "ciphertext for session {} ({})",
                record.session_id,
                path.display()
            ))
        } else {
            VaultError::io(&path)(e)
        }
    })?;

    let actual = checksum(&ciphertext);
    if actual != record.encryption.checksum {
        tracing::warn!(
            op = "session.verify",
            session_id = %record.session_id,
            path = %path.display(),
            "ciphertext checksum mismatch"
        );
        return Err(VaultError::ChecksumMismatch {
            path,
            expected: record.encryption.checksum.clone(),
            actual,
        });
    }
    Ok(ciphertext)
}

pub struct SessionDecryptor<'a> {
    backend: &'a dyn SealingBackend,
    index: &'a SessionIndex,
    sessions_dir: PathBuf,
}

impl<'a> SessionDecryptor<'a> {
    pub fn new(
        backend: &'a dyn SealingBackend,
        index: &'a SessionIndex,
        sessions_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            index,
            sessions_dir: sessions_dir.into(),
        }
    }

    pub fn decrypt(&self, session_id: &str, private_key: &PrivateKey) -> VaultResult<Vec<u8>> {
        let record = self.index.find(session_id)?;
        self.decrypt_record(&record, private_key)
    }

    pub fn decrypt_record(
        &self,
        record: &SessionRecord,
        private_key: &PrivateKey,
    ) -> VaultResult<Vec<u8>> {
        let failed = |reason: String| VaultError::DecryptionFailed {
            session_id: record.session_id.clone(),
            reason,
        };

        let ciphertext = read_verified(&self.sessions_dir, record)?;

        if record.encryption.algorithm != self.backend.algorithm() {
            return Err(failed(format!(
                "unsupported algorithm {:?} (backend is {:?})",
                record.encryption.algorithm,
                self.backend.algorithm()
            )));
        }

        let plaintext = self
            .backend
            .open(&ciphertext, private_key)
            .map_err(|e| match e {
                SealError::InvalidPrivateKey(reason) => failed(format!("unusable private key: {reason}")),
                other => failed(other.to_string()),
            })?;

        tracing::info!(
            op = "session.decrypt",
            session_id = %record.session_id,
            bytes = plaintext.len(),
            "session decrypted"
        );
        Ok(plaintext)
    }
}
