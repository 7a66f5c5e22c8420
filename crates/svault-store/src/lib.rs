//! svault-store: encrypted session artifacts
//!
//! ```text
//! <root>/keys/<purpose>-<scope>-<type>-<index>.txt   derived identities (0600)
//! <root>/sessions/<id>.age                           armored ciphertext (0600)
//! <root>/sessions/<id>.json                          public metadata
//! <root>/sessions/index.json                         index (source of truth)
//! ```
//!
//! Encryption writes ciphertext, then metadata, then registers in the index.
//! Decryption verifies the SHA-256 checksum before opening.

pub mod decrypt;
pub mod encrypt;
pub mod index;
pub mod keystore;
pub mod sealing;
pub mod store;

pub use decrypt::SessionDecryptor;
pub use encrypt::{checksum, Recipient, SessionEncryptor};
pub use index::{RecordEdit, SessionIndex, SessionList};
pub use keystore::{derive_keypair, load_private_key, DerivedKeypair, KeyFileInfo, KeyStore};
pub use sealing::{backend_for, AgeBackend, Keypair, PrivateKey, SealError, SealingBackend};
pub use store::{matching_filter, Finding, SessionStore, VerifyReport};
