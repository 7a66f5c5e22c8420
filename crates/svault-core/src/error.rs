use std::path::PathBuf;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Failure kinds surfaced by every svault operation.
///
/// Nothing here is retried or papered over: each variant reaches the caller
/// as-is, naming the artifact involved and, where it applies, the expected
/// versus actual state.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("master secret already exists at {path} (refusing to overwrite; every derived key depends on it)")]
    AlreadyInitialized { path: PathBuf },

    #[error("no master secret at {path}; run `svault init` first")]
    NotInitialized { path: PathBuf },

    #[error("weak master secret: {0}")]
    WeakSecret(String),

    #[error("invalid derivation path segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    #[error("session id already registered in index: {0}")]
    DuplicateId(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("decryption failed for session {session_id}: {reason}")]
    DecryptionFailed { session_id: String, reason: String },

    #[error("encryption failed with {algorithm}: {reason}")]
    EncryptionFailed { algorithm: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing capability: {0}")]
    MissingCapability(String),

    #[error("malformed document {path}: {reason}")]
    Serialization { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),
}

impl VaultError {
    /// Attach a path to an I/O error. Used as `.map_err(VaultError::io(&path))`.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> VaultError {
        let path = path.into();
        move |source| VaultError::Io { path, source }
    }

    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::AlreadyInitialized { .. } => "AlreadyInitialized",
            VaultError::NotInitialized { .. } => "NotInitialized",
            VaultError::WeakSecret(_) => "WeakSecret",
            VaultError::InvalidSegment { .. } => "InvalidSegment",
            VaultError::DuplicateId(_) => "DuplicateId",
            VaultError::NotFound(_) => "NotFound",
            VaultError::ChecksumMismatch { .. } => "ChecksumMismatch",
            VaultError::DecryptionFailed { .. } => "DecryptionFailed",
            VaultError::EncryptionFailed { .. } => "EncryptionFailed",
            VaultError::Io { .. } => "IOFailure",
            VaultError::MissingCapability(_) => "MissingCapability",
            VaultError::Serialization { .. } => "Serialization",
            VaultError::Config(_) => "Config",
        }
    }
}
