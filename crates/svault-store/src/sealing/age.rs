//! age (X25519) sealing backend, age 0.11 API
//!
//! Derived seeds become age identities by bech32-encoding the 32 bytes under
//! the `AGE-SECRET-KEY-` prefix, which is exactly what `age-keygen` writes.
//! Ciphertext is ASCII-armored so session files stay diff- and paste-safe.

use std::io::{Read, Write};

use ::age::armor::{ArmoredReader, ArmoredWriter, Format};
use bech32::{ToBase32, Variant};

use super::{Keypair, PrivateKey, SealError, SealingBackend};

const SECRET_KEY_HRP: &str = "age-secret-key-";

#[derive(Debug, Clone, Copy, Default)]
pub struct AgeBackend;

impl SealingBackend for AgeBackend {
    fn algorithm(&self) -> &'static str {
        "age"
    }

    fn keypair_from_seed(&self, seed: &[u8; 32]) -> Result<Keypair, SealError> {
        let encoded = bech32::encode(SECRET_KEY_HRP, seed.to_base32(), Variant::Bech32)
            .map_err(|e| SealError::InvalidPrivateKey(format!("bech32 encoding: {e}")))?
            .to_uppercase();

        let identity: ::age::x25519::Identity = encoded
            .parse()
            .map_err(|e| SealError::InvalidPrivateKey(format!("{e}")))?;

        Ok(Keypair {
            public_key: identity.to_public().to_string(),
            private_key: PrivateKey::new(encoded),
        })
    }

    fn seal(&self, plaintext: &[u8], recipient: &str) -> Result<Vec<u8>, SealError> {
        let recipient: ::age::x25519::Recipient = recipient
            .trim()
            .parse()
            .map_err(|_| SealError::InvalidRecipient(recipient.to_string()))?;

        let encryptor =
            ::age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn ::age::Recipient))
                .map_err(|e| SealError::Seal(e.to_string()))?;

        let mut ciphertext = Vec::with_capacity(plaintext.len() + 512);
        let armored = ArmoredWriter::wrap_output(&mut ciphertext, Format::AsciiArmor)
            .map_err(|e| SealError::Seal(format!("armor: {e}")))?;
        let mut writer = encryptor
            .wrap_output(armored)
            .map_err(|e| SealError::Seal(e.to_string()))?;
        writer
            .write_all(plaintext)
            .map_err(|e| SealError::Seal(e.to_string()))?;
        writer
            .finish()
            .and_then(|armor| armor.finish())
            .map_err(|e| SealError::Seal(format!("finalizing: {e}")))?;

        Ok(ciphertext)
    }

    fn open(&self, ciphertext: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>, SealError> {
        // Accept either a bare key or a full identity file with comment lines
        let identities = ::age::IdentityFile::from_buffer(std::io::BufReader::new(
            private_key.expose().as_bytes(),
        ))
        .map_err(|e| SealError::InvalidPrivateKey(e.to_string()))?
        .into_identities()
        .map_err(|e| SealError::InvalidPrivateKey(e.to_string()))?;

        let decryptor = ::age::Decryptor::new(ArmoredReader::new(ciphertext))
            .map_err(|e| SealError::Open(format!("reading age header: {e}")))?;

        if decryptor.is_scrypt() {
            return Err(SealError::Open(
                "passphrase-encrypted files are not session ciphertexts".into(),
            ));
        }

        let mut reader = decryptor
            .decrypt(identities.iter().map(|i| i.as_ref() as &dyn ::age::Identity))
            .map_err(|e| SealError::Open(e.to_string()))?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| SealError::Open(format!("reading payload: {e}")))?;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_from_seed_deterministic() {
        let a = AgeBackend.keypair_from_seed(&[7u8; 32]).unwrap();
        let b = AgeBackend.keypair_from_seed(&[7u8; 32]).unwrap();
        let c = AgeBackend.keypair_from_seed(&[8u8; 32]).unwrap();

        assert_eq!(a.public_key, b.public_key);
        assert_eq!(a.private_key.expose(), b.private_key.expose());
        assert_ne!(a.public_key, c.public_key);
        assert!(a.public_key.starts_with("age1"));
        assert!(a.private_key.expose().starts_with("AGE-SECRET-KEY-1"));
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let kp = AgeBackend.keypair_from_seed(&[1u8; 32]).unwrap();
        let sealed = AgeBackend.seal(b"hello world", &kp.public_key).unwrap();

        assert!(sealed.starts_with(b"-----BEGIN AGE ENCRYPTED FILE-----"));
        let opened = AgeBackend.open(&sealed, &kp.private_key).unwrap();
        assert_eq!(opened, b"hello world");
    }

    #[test]
    fn test_open_accepts_identity_file_with_comments() {
        let kp = AgeBackend.keypair_from_seed(&[2u8; 32]).unwrap();
        let sealed = AgeBackend.seal(b"payload", &kp.public_key).unwrap();
        let file = PrivateKey::new(format!(
            "# created: now\n# public key: {}\n{}\n",
            kp.public_key,
            kp.private_key.expose()
        ));
        assert_eq!(AgeBackend.open(&sealed, &file).unwrap(), b"payload");
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let right = AgeBackend.keypair_from_seed(&[3u8; 32]).unwrap();
        let wrong = AgeBackend.keypair_from_seed(&[4u8; 32]).unwrap();
        let sealed = AgeBackend.seal(b"secret", &right.public_key).unwrap();

        assert!(matches!(
            AgeBackend.open(&sealed, &wrong.private_key),
            Err(SealError::Open(_))
        ));
    }

    #[test]
    fn test_seal_rejects_bad_recipient() {
        assert!(matches!(
            AgeBackend.seal(b"x", "not-a-recipient"),
            Err(SealError::InvalidRecipient(_))
        ));
    }
}
