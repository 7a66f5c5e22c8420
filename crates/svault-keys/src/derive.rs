//! Key derivation: HMAC-SHA256(master secret, canonical path)
//!
//! Derivation is flat: every key comes straight from the root secret, never
//! from a sibling or parent key. The canonical path string is the only
//! context; nothing else (time, host, process state) feeds the MAC.

use hmac::{Hmac, Mac};
use rayon::prelude::*;
use sha2::Sha256;
use zeroize::Zeroize;

use svault_core::{VaultError, VaultResult};

use crate::master::MasterSecret;
use crate::path::DerivationPath;
use crate::KEY_SIZE;

type HmacSha256 = Hmac<Sha256>;

/// 256 bits of derived entropy, used as the seed for a recipient keypair.
///
/// Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKeyMaterial {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKeyMaterial {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive key material for `path` from the master secret.
pub fn derive(master: &MasterSecret, path: &DerivationPath) -> VaultResult<DerivedKeyMaterial> {
    let secret = master.as_bytes();
    if secret.iter().all(|b| *b == 0) {
        return Err(VaultError::WeakSecret(
            "master secret is all zeros".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| VaultError::WeakSecret(format!("HMAC key rejected: {e}")))?;
    mac.update(path.canonical().as_bytes());

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&mac.finalize().into_bytes());

    tracing::debug!(op = "derive", path = %path, "derived key material");
    Ok(DerivedKeyMaterial { bytes })
}

/// Derive a batch of paths in parallel. Output order matches input order.
pub fn derive_many(
    master: &MasterSecret,
    paths: &[DerivationPath],
) -> VaultResult<Vec<DerivedKeyMaterial>> {
    paths.par_iter().map(|p| derive(master, p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_secret() -> MasterSecret {
        let mut bytes = [0u8; KEY_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        MasterSecret::from_bytes(bytes)
    }

    fn path(index: u32) -> DerivationPath {
        DerivationPath::from_parts("session", "ab12cd34", "planning", index).unwrap()
    }

    #[test]
    fn test_known_answer_vectors() {
        // HMAC-SHA256(key = 00..1f, msg = canonical path)
        let master = counting_secret();
        let k0 = derive(&master, &path(0)).unwrap();
        let k1 = derive(&master, &path(1)).unwrap();

        assert_eq!(
            hex::encode(k0.as_bytes()),
            "8107b40528d85da6e24561516cca7719621a9a04beb8a2124703e1c1c9b6a71d"
        );
        assert_eq!(
            hex::encode(k1.as_bytes()),
            "c39b420ce13d7d2f8cb78d88d90fbf4d30cb61407c07ad1b45f012f0dbf48540"
        );
    }

    #[test]
    fn test_derive_deterministic() {
        let master = MasterSecret::from_bytes([42u8; KEY_SIZE]);
        let a = derive(&master, &path(0)).unwrap();
        let b = derive(&master, &path(0)).unwrap();
        assert_eq!(a, b, "derivation must be deterministic");
        assert_eq!(
            hex::encode(a.as_bytes()),
            "623d245b0ca3ebde67aa567da6427d8dc07a884fa2dedd5f42ca296092a0945d"
        );
    }

    #[test]
    fn test_different_masters_different_keys() {
        let a = derive(&MasterSecret::from_bytes([1u8; KEY_SIZE]), &path(0)).unwrap();
        let b = derive(&MasterSecret::from_bytes([2u8; KEY_SIZE]), &path(0)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_all_zero_secret_rejected() {
        let err = derive(&MasterSecret::from_bytes([0u8; KEY_SIZE]), &path(0)).unwrap_err();
        assert!(matches!(err, VaultError::WeakSecret(_)));
    }

    #[test]
    fn test_derived_key_is_not_master() {
        let master = counting_secret();
        let k = derive(&master, &path(0)).unwrap();
        assert_ne!(k.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_derive_many_preserves_order() {
        let master = counting_secret();
        let paths: Vec<_> = (0..16).map(path).collect();
        let batch = derive_many(&master, &paths).unwrap();

        for (p, k) in paths.iter().zip(&batch) {
            assert_eq!(k, &derive(&master, p).unwrap());
        }
    }

    #[test]
    fn test_debug_redacts() {
        let k = derive(&counting_secret(), &path(0)).unwrap();
        let dbg = format!("{k:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("8107b405"));
    }
}
