//! Session encryption: seal content, write ciphertext + metadata, return the
//! record. The index is not touched here; the caller registers the record.
//!
//! Write order matters: ciphertext is fsynced before the metadata document,
//! and the caller registers only after both exist. A crash can leave an
//! orphaned ciphertext (inert, reported by `verify`) but never an index entry
//! pointing at nothing.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use svault_core::fsutil;
use svault_core::{EncryptionInfo, MetadataDocument, SessionRecord, VaultError, VaultResult};
use svault_keys::DerivationPath;

use crate::keystore::DerivedKeypair;
use crate::sealing::{SealError, SealingBackend};

/// Who a session is sealed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub public_key: String,
    /// Set when the key was derived; recorded in metadata so the private
    /// half can be re-derived on decrypt.
    pub derivation_path: Option<DerivationPath>,
}

impl Recipient {
    /// A statically configured public key.
    pub fn static_key(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            derivation_path: None,
        }
    }

    pub fn derived(keypair: &DerivedKeypair) -> Self {
        Self {
            public_key: keypair.keypair.public_key.clone(),
            derivation_path: Some(keypair.path.clone()),
        }
    }
}

/// SHA-256 of `bytes`, hex encoded.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Allocate a session id: UUID v7, i.e. a millisecond timestamp followed by
/// random bits. Hyphenated v7 ids sort lexicographically by creation time.
pub fn new_session_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

pub fn metadata_file(sessions_dir: &Path, session_id: &str) -> PathBuf {
    sessions_dir.join(format!("{session_id}.json"))
}

fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub struct SessionEncryptor<'a> {
    backend: &'a dyn SealingBackend,
    sessions_dir: PathBuf,
}

impl<'a> SessionEncryptor<'a> {
    pub fn new(backend: &'a dyn SealingBackend, sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            sessions_dir: sessions_dir.into(),
        }
    }

    /// Seal `content` to `recipient` and write both session artifacts.
    pub fn encrypt<I, S>(
        &self,
        content: &[u8],
        recipient: &Recipient,
        tags: I,
        description: &str,
    ) -> VaultResult<SessionRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.backend.probe()?;

        let ciphertext = self
            .backend
            .seal(content, &recipient.public_key)
            .map_err(|e| match e {
                SealError::InvalidRecipient(r) => {
                    VaultError::Config(format!("invalid {} recipient: {r:?}", self.backend.algorithm()))
                }
                other => VaultError::EncryptionFailed {
                    algorithm: self.backend.algorithm().to_string(),
                    reason: other.to_string(),
                },
            })?;

        let session_id = new_session_id();
        let file_name = format!("{session_id}.{}", self.backend.algorithm());
        let ciphertext_path = self.sessions_dir.join(&file_name);

        fsutil::ensure_parent(&ciphertext_path)?;
        fsutil::create_new_private(&ciphertext_path, &ciphertext).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                VaultError::DuplicateId(session_id.clone())
            } else {
                VaultError::io(&ciphertext_path)(e)
            }
        })?;

        let now = Utc::now();
        let record = SessionRecord {
            session_id: session_id.clone(),
            created_at: now,
            updated_at: now,
            tags: normalize_tags(tags),
            description: description.to_string(),
            derivation_path: recipient.derivation_path.as_ref().map(|p| p.canonical()),
            encryption: EncryptionInfo {
                algorithm: self.backend.algorithm().to_string(),
                encrypted_file_path: file_name,
                checksum: checksum(&ciphertext),
                size: ciphertext.len() as u64,
            },
        };

        write_metadata(&self.sessions_dir, &record)?;

        tracing::info!(
            op = "session.encrypt",
            session_id = %record.session_id,
            bytes = content.len(),
            algorithm = %record.encryption.algorithm,
            derived = record.derivation_path.is_some(),
            "session encrypted"
        );
        Ok(record)
    }
}

/// Write (or rewrite) the per-session metadata document.
pub fn write_metadata(sessions_dir: &Path, record: &SessionRecord) -> VaultResult<()> {
    let path = metadata_file(sessions_dir, &record.session_id);
    let doc = MetadataDocument {
        metadata: record.clone(),
    };
    let json = serde_json::to_vec_pretty(&doc).map_err(|e| VaultError::Serialization {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    fsutil::atomic_write(&path, &json, false)
}

/// Read a per-session metadata document.
pub fn read_metadata(sessions_dir: &Path, session_id: &str) -> VaultResult<SessionRecord> {
    let path = metadata_file(sessions_dir, session_id);
    let data = std::fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VaultError::NotFound(session_id.to_string())
        } else {
            VaultError::io(&path)(e)
        }
    })?;
    let doc: MetadataDocument =
        serde_json::from_slice(&data).map_err(|e| VaultError::Serialization {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    Ok(doc.metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sealing::MemoryBackend;

    fn recipient() -> Recipient {
        let kp = MemoryBackend.keypair_from_seed(&[1u8; 32]).unwrap();
        Recipient::static_key(kp.public_key)
    }

    #[test]
    fn test_encrypt_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let enc = SessionEncryptor::new(&MemoryBackend, dir.path());

        let record = enc
            .encrypt(b"hello world", &recipient(), ["planning", " ", "planning", "db"], "first")
            .unwrap();

        let ciphertext = std::fs::read(dir.path().join(&record.encryption.encrypted_file_path)).unwrap();
        assert_eq!(record.encryption.checksum, checksum(&ciphertext));
        assert_eq!(record.encryption.size, ciphertext.len() as u64);
        assert_eq!(record.encryption.algorithm, "memory");
        assert_eq!(
            record.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            ["db", "planning"]
        );
        assert!(record.derivation_path.is_none());

        let meta = read_metadata(dir.path(), &record.session_id).unwrap();
        assert_eq!(meta, record);
    }

    #[test]
    fn test_metadata_has_no_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let enc = SessionEncryptor::new(&MemoryBackend, dir.path());
        let record = enc
            .encrypt(b"TOP-SECRET-PAYLOAD", &recipient(), Vec::<String>::new(), "")
            .unwrap();

        let meta = std::fs::read_to_string(metadata_file(dir.path(), &record.session_id)).unwrap();
        assert!(!meta.contains("TOP-SECRET-PAYLOAD"));
    }

    #[test]
    fn test_ids_unique_and_sortable() {
        let dir = tempfile::tempdir().unwrap();
        let enc = SessionEncryptor::new(&MemoryBackend, dir.path());

        let ids: Vec<String> = (0..50)
            .map(|_| {
                enc.encrypt(b"x", &recipient(), Vec::<String>::new(), "")
                    .unwrap()
                    .session_id
            })
            .collect();

        let unique: BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let first = &ids[0];
        let last = &ids[ids.len() - 1];
        assert!(first[..13] <= last[..13], "timestamp prefix must not go backwards");
    }

    #[test]
    fn test_invalid_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let enc = SessionEncryptor::new(&MemoryBackend, dir.path());
        let err = enc
            .encrypt(b"x", &Recipient::static_key("age1nope"), Vec::<String>::new(), "")
            .unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    struct FailingBackend;

    impl SealingBackend for FailingBackend {
        fn algorithm(&self) -> &'static str {
            "failing"
        }

        fn keypair_from_seed(&self, seed: &[u8; 32]) -> Result<crate::sealing::Keypair, SealError> {
            MemoryBackend.keypair_from_seed(seed)
        }

        fn seal(&self, _plaintext: &[u8], _recipient: &str) -> Result<Vec<u8>, SealError> {
            Err(SealError::Seal("stream closed early".into()))
        }

        fn open(&self, _ciphertext: &[u8], _key: &crate::sealing::PrivateKey) -> Result<Vec<u8>, SealError> {
            Err(SealError::Open("unused".into()))
        }
    }

    #[test]
    fn test_seal_failure_is_not_missing_capability() {
        let dir = tempfile::tempdir().unwrap();
        let enc = SessionEncryptor::new(&FailingBackend, dir.path());
        match enc.encrypt(b"x", &recipient(), Vec::<String>::new(), "") {
            Err(VaultError::EncryptionFailed { algorithm, reason }) => {
                assert_eq!(algorithm, "failing");
                assert!(reason.contains("stream closed early"));
            }
            other => panic!("expected EncryptionFailed, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_read_metadata_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_metadata(dir.path(), "nope").unwrap_err(),
            VaultError::NotFound(_)
        ));
    }
}
