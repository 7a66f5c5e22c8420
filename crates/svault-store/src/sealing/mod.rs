//! Public-key sealing capability
//!
//! The store never touches a cipher directly: it seals and opens through a
//! `SealingBackend`, and turns derived entropy into a recipient keypair the
//! same way. Age (X25519) is the only backend reachable from config; unit
//! tests inject the in-memory double directly.

pub mod age;
#[cfg(test)]
pub mod memory;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use svault_core::{VaultError, VaultResult};

pub use self::age::AgeBackend;
#[cfg(test)]
pub use self::memory::MemoryBackend;

/// Backend-level failures. Callers translate these into `VaultError` kinds
/// with the session or key they were working on.
#[derive(Debug, Error)]
pub enum SealError {
    #[error("invalid recipient {0:?}")]
    InvalidRecipient(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("sealing failed: {0}")]
    Seal(String),

    #[error("opening failed: {0}")]
    Open(String),
}

/// Private half of a recipient keypair, in the backend's text encoding.
pub struct PrivateKey(SecretString);

impl PrivateKey {
    pub fn new(encoded: String) -> Self {
        Self(SecretString::from(encoded))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// A recipient keypair produced from seed material.
#[derive(Debug)]
pub struct Keypair {
    pub public_key: String,
    pub private_key: PrivateKey,
}

/// Sealing capability consumed by the session store.
pub trait SealingBackend: Send + Sync {
    /// Name recorded in session metadata (e.g. "age")
    fn algorithm(&self) -> &'static str;

    /// Check the capability is usable before any stateful work begins.
    fn probe(&self) -> VaultResult<()> {
        Ok(())
    }

    /// Deterministically turn 32 bytes of seed material into a keypair.
    fn keypair_from_seed(&self, seed: &[u8; 32]) -> Result<Keypair, SealError>;

    /// Encrypt `plaintext` to the recipient public key.
    fn seal(&self, plaintext: &[u8], recipient: &str) -> Result<Vec<u8>, SealError>;

    /// Decrypt `ciphertext` with the private key.
    fn open(&self, ciphertext: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>, SealError>;
}

/// Look up a backend by the algorithm name stored in config or metadata.
pub fn backend_for(algorithm: &str) -> VaultResult<Box<dyn SealingBackend>> {
    let backend: Box<dyn SealingBackend> = match algorithm {
        "age" => Box::new(AgeBackend),
        other => {
            return Err(VaultError::MissingCapability(format!(
                "no sealing backend for algorithm {other:?} (supported: age)"
            )))
        }
    };
    backend.probe()?;
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_lookup() {
        assert_eq!(backend_for("age").unwrap().algorithm(), "age");
        for name in ["memory", "rot13", ""] {
            assert!(
                matches!(backend_for(name), Err(VaultError::MissingCapability(_))),
                "{name:?} must not resolve to a backend"
            );
        }
    }

    #[test]
    fn test_private_key_debug_redacts() {
        let key = PrivateKey::new("AGE-SECRET-KEY-1SECRET".into());
        assert!(!format!("{key:?}").contains("SECRET-KEY"));
    }
}
