//! svault-keys: deterministic key derivation from a single master secret
//!
//! ```text
//! Master Secret (256-bit, random, created once, master.key mode 0600)
//!   └── HMAC-SHA256(master, "purpose/scope_token/session_type/index")
//!         └── 32-byte seed → recipient keypair (see svault-store::sealing)
//! ```
//!
//! The master secret is passed explicitly into every derivation call; there
//! is no process-wide key state.

pub mod backup;
pub mod derive;
pub mod master;
pub mod path;

pub use backup::{
    check_fingerprint, secret_from_mnemonic, secret_to_mnemonic, BackupAcknowledgement, BackupBundle,
};
pub use derive::{derive, derive_many, DerivedKeyMaterial};
pub use master::{fingerprint, DestructiveConfirmation, MasterSecret, MasterSecretManager};
pub use path::{scope_token, DerivationPath};

/// Size of the master secret and of derived key material (256-bit)
pub const KEY_SIZE: usize = 32;
