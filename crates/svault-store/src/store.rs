//! `SessionStore`: the configured vault as one handle.
//!
//! Wires the master secret manager, derived key store, session index and a
//! sealing backend together from an `SvaultConfig`. The CLI only talks to
//! this type; the pieces stay usable on their own for tests.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use svault_core::{Policy, SessionRecord, SvaultConfig, VaultError, VaultResult};
use svault_keys::{fingerprint, DerivationPath, MasterSecret, MasterSecretManager};

use crate::decrypt::{ciphertext_file, read_verified, SessionDecryptor};
use crate::encrypt::{metadata_file, write_metadata, Recipient, SessionEncryptor};
use crate::index::{RecordEdit, SessionIndex};
use crate::keystore::{derive_keypair, DerivedKeypair, KeyFileInfo, KeyStore};
use crate::sealing::{backend_for, PrivateKey, SealingBackend};

/// Extensions that belong in the sessions directory besides ciphertexts.
const BOOKKEEPING_EXTENSIONS: &[&str] = &["json", "lock"];

/// One finding from [`SessionStore::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    MasterUnreadable { reason: String },
    MissingCiphertext { session_id: String, path: PathBuf },
    ChecksumMismatch { session_id: String, expected: String, actual: String },
    OrphanCiphertext { path: PathBuf },
    PlaintextFile { path: PathBuf },
    KeyDueForRotation { file: PathBuf, created_at: DateTime<Utc> },
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Finding::MasterUnreadable { reason } => write!(f, "master secret: {reason}"),
            Finding::MissingCiphertext { session_id, path } => {
                write!(f, "session {session_id}: ciphertext missing ({})", path.display())
            }
            Finding::ChecksumMismatch { session_id, expected, actual } => write!(
                f,
                "session {session_id}: checksum mismatch (expected {expected}, actual {actual})"
            ),
            Finding::OrphanCiphertext { path } => {
                write!(f, "orphaned ciphertext not in index: {}", path.display())
            }
            Finding::PlaintextFile { path } => {
                write!(f, "unencrypted file in sessions directory: {}", path.display())
            }
            Finding::KeyDueForRotation { file, created_at } => write!(
                f,
                "derived key due for rotation: {} (created {})",
                file.display(),
                created_at.format("%Y-%m-%d")
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Full SHA-256 fingerprint of the master secret, when it could be read
    pub master_fingerprint: Option<String>,
    pub sessions_checked: usize,
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

pub struct SessionStore {
    config: SvaultConfig,
    backend: Box<dyn SealingBackend>,
    master: MasterSecretManager,
    keys: KeyStore,
    index: SessionIndex,
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Open the store described by `config`. Nothing is created on disk.
    pub fn open(config: SvaultConfig) -> VaultResult<Self> {
        let backend = backend_for(&config.encryption.algorithm)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Open with an explicit backend instead of the one named in config.
    pub fn with_backend(config: SvaultConfig, backend: Box<dyn SealingBackend>) -> Self {
        Self {
            master: MasterSecretManager::new(config.master_secret_path()),
            keys: KeyStore::new(config.key_dir()),
            index: SessionIndex::new(config.index_path()),
            sessions_dir: config.sessions_dir(),
            backend,
            config,
        }
    }

    pub fn config(&self) -> &SvaultConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn SealingBackend {
        self.backend.as_ref()
    }

    pub fn master(&self) -> &MasterSecretManager {
        &self.master
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn index(&self) -> &SessionIndex {
        &self.index
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Create the master secret and an empty index. Fails with
    /// `AlreadyInitialized` if a master secret already exists.
    pub fn initialize(&self) -> VaultResult<MasterSecret> {
        self.backend.probe()?;
        let secret = self.master.initialize()?;
        self.ensure_layout()?;
        Ok(secret)
    }

    /// Create the key dir, sessions dir and index if missing.
    pub fn ensure_layout(&self) -> VaultResult<()> {
        for dir in [self.keys.dir(), self.sessions_dir.as_path()] {
            std::fs::create_dir_all(dir).map_err(VaultError::io(dir))?;
        }
        self.index.ensure()
    }

    // ── keys ──────────────────────────────────────────────────────────────

    /// Build a derivation path under the configured purpose. `scope` overrides
    /// `[scope] identifier`.
    pub fn derivation_path(
        &self,
        scope: Option<&str>,
        purpose: Option<&str>,
        session_type: &str,
        index: u32,
    ) -> VaultResult<DerivationPath> {
        let scope = scope
            .or(self.config.scope.identifier.as_deref())
            .ok_or_else(|| {
                VaultError::Config(
                    "no scope identifier: pass --scope or set [scope] identifier".into(),
                )
            })?;
        let purpose = purpose.unwrap_or_else(|| self.config.default_purpose());
        DerivationPath::build(purpose, scope, session_type, index)
    }

    /// Derive the keypair for `path` and persist its key file.
    pub fn derive_key(&self, path: &DerivationPath) -> VaultResult<(DerivedKeypair, PathBuf)> {
        let master = self.master.load()?;
        let derived = derive_keypair(self.backend(), &master, path)?;
        let (file, _) = self.keys.store(&derived)?;
        Ok((derived, file))
    }

    // ── sessions ──────────────────────────────────────────────────────────

    /// The glob in `policy.content_filters` that `input` matches, if any.
    pub fn matching_filter(&self, input: &Path) -> VaultResult<Option<String>> {
        let policy = self.index.policy()?;
        matching_filter(&policy, input)
    }

    /// Encrypt `content` and register the result in the index.
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
        let record = SessionEncryptor::new(self.backend(), &self.sessions_dir).encrypt(
            content,
            recipient,
            tags,
            description,
        )?;
        self.index.register(&record)?;
        Ok(record)
    }

    /// The recipient for a new session: derived when `path` is given,
    /// otherwise the configured static recipient.
    pub fn recipient(&self, path: Option<&DerivationPath>) -> VaultResult<Recipient> {
        match path {
            Some(path) => {
                let (derived, _) = self.derive_key(path)?;
                Ok(Recipient::derived(&derived))
            }
            None => self
                .config
                .encryption
                .recipient
                .as_deref()
                .map(Recipient::static_key)
                .ok_or_else(|| {
                    VaultError::Config(
                        "no recipient: pass --recipient, --type, or set [encryption] recipient"
                            .into(),
                    )
                }),
        }
    }

    /// Decrypt a session. Without an identity, the private key is re-derived
    /// from the master secret using the session's recorded derivation path.
    pub fn decrypt(&self, session_id: &str, identity: Option<&PrivateKey>) -> VaultResult<Vec<u8>> {
        let record = self.index.find(session_id)?;
        let decryptor = SessionDecryptor::new(self.backend(), &self.index, &self.sessions_dir);

        if let Some(key) = identity {
            return decryptor.decrypt_record(&record, key);
        }

        let path: DerivationPath = record
            .derivation_path
            .as_deref()
            .ok_or_else(|| {
                VaultError::Config(format!(
                    "session {session_id} was sealed to a static recipient; pass --identity"
                ))
            })?
            .parse()?;
        let master = self.master.load()?;
        let derived = derive_keypair(self.backend(), &master, &path)?;
        decryptor.decrypt_record(&record, &derived.keypair.private_key)
    }

    pub fn tag(&self, session_id: &str, edit: &RecordEdit) -> VaultResult<SessionRecord> {
        let record = self.index.update_record(session_id, edit)?;
        write_metadata(&self.sessions_dir, &record)?;
        Ok(record)
    }

    /// Remove a session: index entry first, then its files.
    pub fn remove(&self, session_id: &str) -> VaultResult<SessionRecord> {
        let record = self.index.remove_entry(session_id)?;
        for file in [
            ciphertext_file(&self.sessions_dir, &record),
            metadata_file(&self.sessions_dir, &record.session_id),
        ] {
            remove_if_present(&file)?;
        }
        Ok(record)
    }

    /// Drop index entries whose ciphertext no longer exists, along with
    /// their metadata documents.
    pub fn compact(&self) -> VaultResult<BTreeSet<String>> {
        let dir = self.sessions_dir.clone();
        let dropped = self
            .index
            .retain_present(|r| !ciphertext_file(&dir, r).exists())?;
        for id in &dropped {
            remove_if_present(&metadata_file(&self.sessions_dir, id))?;
        }
        Ok(dropped)
    }

    pub fn set_policy(&self, policy: Policy) -> VaultResult<()> {
        for pattern in &policy.content_filters {
            glob::Pattern::new(pattern).map_err(|e| {
                VaultError::Config(format!("invalid content filter {pattern:?}: {e}"))
            })?;
        }
        self.index.update_policy(policy)
    }

    // ── verification ──────────────────────────────────────────────────────

    pub fn verify(&self) -> VaultResult<VerifyReport> {
        let mut report = VerifyReport::default();

        match self.master.load() {
            Ok(secret) => report.master_fingerprint = Some(fingerprint(&secret)),
            Err(e) => report.findings.push(Finding::MasterUnreadable {
                reason: e.to_string(),
            }),
        }

        let doc = self.index.load()?;
        report.sessions_checked = doc.sessions.len();

        let mut integrity: Vec<Finding> = doc
            .sessions
            .par_iter()
            .filter_map(|record| match read_verified(&self.sessions_dir, record) {
                Ok(_) => None,
                Err(VaultError::ChecksumMismatch { expected, actual, .. }) => {
                    Some(Ok(Finding::ChecksumMismatch {
                        session_id: record.session_id.clone(),
                        expected,
                        actual,
                    }))
                }
                Err(VaultError::NotFound(_)) => Some(Ok(Finding::MissingCiphertext {
                    session_id: record.session_id.clone(),
                    path: ciphertext_file(&self.sessions_dir, record),
                })),
                Err(e) => Some(Err(e)),
            })
            .collect::<VaultResult<_>>()?;
        integrity.sort_by_key(|f| f.to_string());
        report.findings.extend(integrity);

        let known: BTreeSet<&str> = doc
            .sessions
            .iter()
            .map(|s| s.encryption.encrypted_file_path.as_str())
            .collect();
        report
            .findings
            .extend(self.scan_sessions_dir(&known, doc.policy.require_encryption)?);

        let now = Utc::now();
        report.findings.extend(
            self.keys
                .due_for_rotation(doc.policy.key_rotation_days, now)?
                .into_iter()
                .filter_map(|k: KeyFileInfo| {
                    k.created_at.map(|created_at| Finding::KeyDueForRotation {
                        file: k.file,
                        created_at,
                    })
                }),
        );

        tracing::info!(
            op = "store.verify",
            sessions = report.sessions_checked,
            findings = report.findings.len(),
            "verification finished"
        );
        Ok(report)
    }

    fn scan_sessions_dir(
        &self,
        known: &BTreeSet<&str>,
        require_encryption: bool,
    ) -> VaultResult<Vec<Finding>> {
        let dir = &self.sessions_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut findings = Vec::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(VaultError::io(dir))?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<_>>()
            .map_err(VaultError::io(dir))?;
        entries.sort();

        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // In-flight temp files from atomic writes
            if name.starts_with('.') || !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext == self.backend.algorithm() {
                if !known.contains(name) {
                    findings.push(Finding::OrphanCiphertext { path });
                }
            } else if require_encryption && !BOOKKEEPING_EXTENSIONS.contains(&ext) {
                findings.push(Finding::PlaintextFile { path });
            }
        }
        Ok(findings)
    }
}

/// The first pattern in `policy.content_filters` matching `input`, checked
/// against both the full path and the file name.
pub fn matching_filter(policy: &Policy, input: &Path) -> VaultResult<Option<String>> {
    let name = input.file_name().map(Path::new);
    for pattern in &policy.content_filters {
        let compiled = glob::Pattern::new(pattern)
            .map_err(|e| VaultError::Config(format!("invalid content filter {pattern:?}: {e}")))?;
        if compiled.matches_path(input) || name.is_some_and(|n| compiled.matches_path(n)) {
            return Ok(Some(pattern.clone()));
        }
    }
    Ok(None)
}

fn remove_if_present(path: &Path) -> VaultResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VaultError::io(path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_filter() {
        let policy = Policy {
            content_filters: vec!["*.env".into(), "*/secrets/*".into()],
            ..Policy::default()
        };
        assert_eq!(
            matching_filter(&policy, Path::new("/work/app/.env")).unwrap().as_deref(),
            Some("*.env")
        );
        assert_eq!(
            matching_filter(&policy, Path::new("/work/prod.env")).unwrap().as_deref(),
            Some("*.env")
        );
        assert_eq!(
            matching_filter(&policy, Path::new("/work/secrets/token")).unwrap().as_deref(),
            Some("*/secrets/*")
        );
        assert_eq!(matching_filter(&policy, Path::new("notes.md")).unwrap(), None);
    }

    #[test]
    fn test_invalid_filter_pattern() {
        let policy = Policy {
            content_filters: vec!["[".into()],
            ..Policy::default()
        };
        assert!(matches!(
            matching_filter(&policy, Path::new("a")),
            Err(VaultError::Config(_))
        ));
    }

    fn memory_store(root: &Path) -> SessionStore {
        let mut config = SvaultConfig::default();
        config.storage.root = root.to_path_buf();
        config.scope.identifier = Some("git@example.com:team/app.git".into());
        SessionStore::with_backend(config, Box::new(crate::sealing::MemoryBackend))
    }

    #[test]
    fn test_open_rejects_unsealed_backend_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SvaultConfig::default();
        config.storage.root = dir.path().to_path_buf();
        config.encryption.algorithm = "memory".into();
        assert!(matches!(
            SessionStore::open(config),
            Err(VaultError::MissingCapability(_))
        ));
    }

    #[test]
    fn test_injected_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store(dir.path());
        store.initialize().unwrap();
        assert_eq!(store.backend().algorithm(), "memory");

        let path = store.derivation_path(None, None, "design", 3).unwrap();
        let recipient = store.recipient(Some(&path)).unwrap();
        let record = store.encrypt(b"design doc", &recipient, ["design"], "").unwrap();
        assert!(record.encryption.encrypted_file_path.ends_with(".memory"));
        assert_eq!(store.decrypt(&record.session_id, None).unwrap(), b"design doc");

        // The backend's own extension counts as ciphertext, not plaintext
        std::fs::write(store.sessions_dir().join("stray.memory"), b"x").unwrap();
        let report = store.verify().unwrap();
        assert_eq!(report.findings.len(), 1, "{:?}", report.findings);
        assert!(matches!(report.findings[0], Finding::OrphanCiphertext { .. }));
    }

    #[test]
    fn test_finding_display() {
        let f = Finding::OrphanCiphertext {
            path: PathBuf::from("/s/x.age"),
        };
        assert_eq!(f.to_string(), "orphaned ciphertext not in index: /s/x.age");
    }
}
