//! svault-core: shared types, config schema, and the error taxonomy used by
//! every svault crate.

pub mod config;
pub mod error;
pub mod fsutil;
pub mod types;

pub use config::SvaultConfig;
pub use error::{VaultError, VaultResult};
pub use types::{EncryptionInfo, IndexDocument, MetadataDocument, Policy, SessionRecord, Statistics};
