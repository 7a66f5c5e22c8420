//! Master secret backup and restore
//!
//! A backup bundle carries the raw secret twice (hex and as a 24-word BIP-39
//! mnemonic for writing down), the fingerprint for verification, and
//! provenance. Producing one requires a `BackupAcknowledgement`; nothing in
//! this crate ever sends a bundle anywhere.

use bip39::Mnemonic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use svault_core::{VaultError, VaultResult};

use crate::master::{fingerprint, DestructiveConfirmation, MasterSecret, MasterSecretManager};

/// Current backup bundle format
pub const BACKUP_FORMAT: u32 = 1;

/// Explicit operator acknowledgement that secret material is about to leave
/// the protected file.
#[derive(Debug)]
pub struct BackupAcknowledgement(());

impl BackupAcknowledgement {
    /// Accepts "yes" (any case). Anything else is a refusal.
    pub fn from_answer(answer: &str) -> VaultResult<Self> {
        if answer.trim().eq_ignore_ascii_case("yes") {
            Ok(Self(()))
        } else {
            Err(VaultError::Config(
                "backup export not acknowledged (answer \"yes\" to proceed)".into(),
            ))
        }
    }
}

/// Serialized backup of the master secret.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct BackupBundle {
    #[zeroize(skip)]
    pub format: u32,
    /// Raw secret, 64 hex chars
    pub secret_hex: String,
    /// Same secret as a 24-word BIP-39 mnemonic
    pub mnemonic: String,
    /// SHA-256 fingerprint of the raw secret (hex)
    pub fingerprint: String,
    #[zeroize(skip)]
    pub created_at: DateTime<Utc>,
    #[zeroize(skip)]
    pub exported_at: DateTime<Utc>,
    /// Scope identifier the installation was set up for, if known
    pub origin_scope: Option<String>,
    pub tool_version: String,
}

impl std::fmt::Debug for BackupBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupBundle")
            .field("format", &self.format)
            .field("fingerprint", &self.fingerprint)
            .field("created_at", &self.created_at)
            .field("secret_hex", &"[REDACTED]")
            .field("mnemonic", &"[REDACTED]")
            .finish()
    }
}

impl BackupBundle {
    /// Human-readable checksum block printed alongside the bundle.
    pub fn checksum_line(&self) -> String {
        format!("sha256:{}", self.fingerprint)
    }

    /// Decode and verify the secret carried by this bundle.
    pub fn secret(&self) -> VaultResult<MasterSecret> {
        let from_hex = hex::decode(self.secret_hex.trim())
            .map_err(|e| VaultError::WeakSecret(format!("backup secret is not valid hex: {e}")))
            .and_then(|raw| MasterSecret::from_slice(&raw))?;
        let from_words = secret_from_mnemonic(&self.mnemonic)?;

        if from_hex.as_bytes() != from_words.as_bytes() {
            return Err(VaultError::Serialization {
                path: "backup bundle".into(),
                reason: "hex secret and mnemonic disagree".into(),
            });
        }
        let actual = fingerprint(&from_hex);
        if actual != self.fingerprint {
            return Err(VaultError::ChecksumMismatch {
                path: "backup bundle".into(),
                expected: self.fingerprint.clone(),
                actual,
            });
        }
        Ok(from_hex)
    }
}

/// Encode a master secret as a 24-word BIP-39 mnemonic (256 bits of entropy).
pub fn secret_to_mnemonic(secret: &MasterSecret) -> VaultResult<String> {
    let mnemonic = Mnemonic::from_entropy(secret.as_bytes())
        .map_err(|e| VaultError::WeakSecret(format!("BIP-39 encoding failed: {e}")))?;
    Ok(mnemonic.to_string())
}

/// Recover a master secret from its 24-word mnemonic.
pub fn secret_from_mnemonic(words: &str) -> VaultResult<MasterSecret> {
    let mnemonic: Mnemonic = words
        .parse()
        .map_err(|e| VaultError::WeakSecret(format!("invalid BIP-39 mnemonic: {e}")))?;
    let mut entropy = mnemonic.to_entropy();
    let secret = MasterSecret::from_slice(&entropy);
    entropy.zeroize();
    secret
}

/// Check `actual` against an operator-supplied fingerprint or prefix. The
/// prefix must be at least `DestructiveConfirmation::PREFIX_LEN` hex chars.
pub fn check_fingerprint(artifact: &str, actual: &str, expected: &str) -> VaultResult<()> {
    let expected = expected.trim().to_ascii_lowercase();
    if expected.len() < DestructiveConfirmation::PREFIX_LEN {
        return Err(VaultError::Config(format!(
            "expected fingerprint {expected:?} is too short (need at least {} hex chars)",
            DestructiveConfirmation::PREFIX_LEN
        )));
    }
    if !actual.starts_with(&expected) {
        return Err(VaultError::ChecksumMismatch {
            path: artifact.into(),
            expected,
            actual: actual.to_string(),
        });
    }
    Ok(())
}

impl MasterSecretManager {
    /// Serialize the stored secret for offline backup.
    pub fn export_for_backup(
        &self,
        _ack: BackupAcknowledgement,
        origin_scope: Option<&str>,
    ) -> VaultResult<BackupBundle> {
        let secret = self.load()?;
        let bundle = BackupBundle {
            format: BACKUP_FORMAT,
            secret_hex: hex::encode(secret.as_bytes()),
            mnemonic: secret_to_mnemonic(&secret)?,
            fingerprint: fingerprint(&secret),
            created_at: self.created_at()?,
            exported_at: Utc::now(),
            origin_scope: origin_scope.map(str::to_string),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        tracing::warn!(
            op = "master.backup",
            path = %self.path().display(),
            "master secret exported for backup"
        );
        Ok(bundle)
    }

    /// Recreate the secret file from a backup bundle. Create-once applies.
    pub fn restore(&self, bundle: &BackupBundle) -> VaultResult<MasterSecret> {
        let secret = bundle.secret()?;
        self.install(&secret)?;
        Ok(secret)
    }

    /// Recreate the secret file from a written-down mnemonic, optionally
    /// checking it against a recorded fingerprint.
    pub fn restore_from_mnemonic(
        &self,
        words: &str,
        expected_fingerprint: Option<&str>,
    ) -> VaultResult<MasterSecret> {
        let secret = secret_from_mnemonic(words)?;
        if let Some(expected) = expected_fingerprint {
            check_fingerprint("mnemonic", &fingerprint(&secret), expected)?;
        }
        self.install(&secret)?;
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, MasterSecretManager) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = MasterSecretManager::new(dir.path().join("master.key"));
        (dir, mgr)
    }

    #[test]
    fn test_acknowledgement() {
        assert!(BackupAcknowledgement::from_answer("YES").is_ok());
        assert!(BackupAcknowledgement::from_answer(" yes\n").is_ok());
        assert!(BackupAcknowledgement::from_answer("y").is_err());
        assert!(BackupAcknowledgement::from_answer("").is_err());
    }

    #[test]
    fn test_export_contents() {
        let (_dir, mgr) = manager();
        let secret = mgr.initialize().unwrap();

        let ack = BackupAcknowledgement::from_answer("yes").unwrap();
        let bundle = mgr.export_for_backup(ack, Some("https://example.com/repo")).unwrap();

        assert_eq!(bundle.format, BACKUP_FORMAT);
        assert_eq!(bundle.secret_hex, hex::encode(secret.as_bytes()));
        assert_eq!(bundle.mnemonic.split_whitespace().count(), 24);
        assert_eq!(bundle.fingerprint, fingerprint(&secret));
        assert_eq!(bundle.origin_scope.as_deref(), Some("https://example.com/repo"));
        assert!(bundle.checksum_line().starts_with("sha256:"));
        assert!(!format!("{bundle:?}").contains(&bundle.secret_hex));
    }

    #[test]
    fn test_export_requires_secret() {
        let (_dir, mgr) = manager();
        let ack = BackupAcknowledgement::from_answer("yes").unwrap();
        assert!(matches!(
            mgr.export_for_backup(ack, None).unwrap_err(),
            VaultError::NotInitialized { .. }
        ));
    }

    #[test]
    fn test_restore_bundle_roundtrip() {
        let (_dir, mgr) = manager();
        let original = mgr.initialize().unwrap();
        let bundle = mgr
            .export_for_backup(BackupAcknowledgement::from_answer("yes").unwrap(), None)
            .unwrap();
        let json = serde_json::to_string(&bundle).unwrap();

        let (_dir2, fresh) = manager();
        let parsed: BackupBundle = serde_json::from_str(&json).unwrap();
        let restored = fresh.restore(&parsed).unwrap();
        assert_eq!(restored.as_bytes(), original.as_bytes());

        // create-once still applies to restore
        assert!(matches!(
            fresh.restore(&parsed).unwrap_err(),
            VaultError::AlreadyInitialized { .. }
        ));
    }

    #[test]
    fn test_tampered_bundle_rejected() {
        let (_dir, mgr) = manager();
        mgr.initialize().unwrap();
        let mut bundle = mgr
            .export_for_backup(BackupAcknowledgement::from_answer("yes").unwrap(), None)
            .unwrap();
        bundle.fingerprint = "0".repeat(64);

        assert!(matches!(
            bundle.secret().unwrap_err(),
            VaultError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_mnemonic_roundtrip_and_fingerprint_check() {
        let secret = MasterSecret::from_bytes([9u8; 32]);
        let words = secret_to_mnemonic(&secret).unwrap();
        let fp = fingerprint(&secret);

        let (_dir, mgr) = manager();
        assert!(matches!(
            mgr.restore_from_mnemonic(&words, Some("ffffffff")).unwrap_err(),
            VaultError::ChecksumMismatch { .. }
        ));
        assert!(!mgr.exists());

        let restored = mgr.restore_from_mnemonic(&words, Some(&fp[..8])).unwrap();
        assert_eq!(restored.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn test_short_expected_fingerprint_rejected() {
        let secret = MasterSecret::from_bytes([9u8; 32]);
        let words = secret_to_mnemonic(&secret).unwrap();
        let fp = fingerprint(&secret);

        let (_dir, mgr) = manager();
        for expected in ["", "   ", &fp[..7]] {
            assert!(matches!(
                mgr.restore_from_mnemonic(&words, Some(expected)).unwrap_err(),
                VaultError::Config(_)
            ));
        }
        assert!(!mgr.exists());

        assert!(check_fingerprint("bundle", &fp, &fp.to_uppercase()).is_ok());
    }

    #[test]
    fn test_invalid_mnemonic() {
        assert!(secret_from_mnemonic("not a valid mnemonic at all").is_err());
    }
}
