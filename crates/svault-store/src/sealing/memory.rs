//! In-memory sealing backend for tests.
//!
//! Not encryption in any meaningful sense: the payload is XORed with a
//! SHA-256 keystream of the recipient. It exists so store logic (ids,
//! checksums, index, wrong-key handling) can be exercised without age.

use sha2::{Digest, Sha256};

use super::{Keypair, PrivateKey, SealError, SealingBackend};

const MAGIC: &[u8] = b"svault-memory-v1\n";
const PUBLIC_PREFIX: &str = "mem1";
const PRIVATE_PREFIX: &str = "MEM-SECRET-";

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

fn public_for(seed_hex: &str) -> String {
    let digest = Sha256::new()
        .chain_update(b"svault-memory-public")
        .chain_update(seed_hex.as_bytes())
        .finalize();
    format!("{PUBLIC_PREFIX}{}", hex::encode(digest))
}

fn apply_keystream(recipient: &str, data: &mut [u8]) {
    for (counter, block) in data.chunks_mut(32).enumerate() {
        let pad = Sha256::new()
            .chain_update(recipient.as_bytes())
            .chain_update((counter as u64).to_be_bytes())
            .finalize();
        for (b, p) in block.iter_mut().zip(pad.iter()) {
            *b ^= p;
        }
    }
}

impl SealingBackend for MemoryBackend {
    fn algorithm(&self) -> &'static str {
        "memory"
    }

    fn keypair_from_seed(&self, seed: &[u8; 32]) -> Result<Keypair, SealError> {
        let seed_hex = hex::encode(seed);
        Ok(Keypair {
            public_key: public_for(&seed_hex),
            private_key: PrivateKey::new(format!("{PRIVATE_PREFIX}{seed_hex}")),
        })
    }

    fn seal(&self, plaintext: &[u8], recipient: &str) -> Result<Vec<u8>, SealError> {
        if !recipient.starts_with(PUBLIC_PREFIX) || recipient.contains('\n') {
            return Err(SealError::InvalidRecipient(recipient.to_string()));
        }
        let mut body = plaintext.to_vec();
        apply_keystream(recipient, &mut body);

        let mut out = Vec::with_capacity(MAGIC.len() + recipient.len() + 1 + body.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(recipient.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn open(&self, ciphertext: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>, SealError> {
        let seed_hex = private_key
            .expose()
            .lines()
            .map(str::trim)
            .find_map(|l| l.strip_prefix(PRIVATE_PREFIX))
            .ok_or_else(|| SealError::InvalidPrivateKey("no MEM-SECRET- line".into()))?;

        let rest = ciphertext
            .strip_prefix(MAGIC)
            .ok_or_else(|| SealError::Open("not a memory-backend ciphertext".into()))?;
        let newline = rest
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| SealError::Open("truncated header".into()))?;
        let (header, body) = rest.split_at(newline);

        let recipient = public_for(seed_hex);
        if header != recipient.as_bytes() {
            return Err(SealError::Open("no identity matched the recipient".into()));
        }

        let mut plaintext = body[1..].to_vec();
        apply_keystream(&recipient, &mut plaintext);
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let kp = MemoryBackend.keypair_from_seed(&[5u8; 32]).unwrap();
        let sealed = MemoryBackend.seal(b"hello world", &kp.public_key).unwrap();
        assert!(!sealed.windows(11).any(|w| w == b"hello world"));
        assert_eq!(MemoryBackend.open(&sealed, &kp.private_key).unwrap(), b"hello world");
    }

    #[test]
    fn test_wrong_key() {
        let a = MemoryBackend.keypair_from_seed(&[5u8; 32]).unwrap();
        let b = MemoryBackend.keypair_from_seed(&[6u8; 32]).unwrap();
        let sealed = MemoryBackend.seal(b"data", &a.public_key).unwrap();
        assert!(matches!(
            MemoryBackend.open(&sealed, &b.private_key),
            Err(SealError::Open(_))
        ));
    }

    #[test]
    fn test_rejects_foreign_recipient() {
        assert!(MemoryBackend.seal(b"x", "age1abc").is_err());
    }
}
