//! Derivation paths: `purpose/scope_token/session_type/index`
//!
//! The canonical string is the only input to key derivation, so two paths
//! are equal exactly when their canonical strings are equal. Segments are
//! validated at construction; a `DerivationPath` that exists is well-formed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use svault_core::{VaultError, VaultResult};

/// Segment separator in the canonical form
pub const SEPARATOR: char = '/';

/// Width of the scope token in hex characters (32 bits of SHA-256)
pub const SCOPE_TOKEN_LEN: usize = 8;

/// A validated derivation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationPath {
    purpose: String,
    scope_token: String,
    session_type: String,
    index: u32,
}

impl DerivationPath {
    /// Build a path from an external scope identifier (e.g. a repository URL),
    /// which is hashed down to a fixed-width token.
    pub fn build(
        purpose: &str,
        scope_identifier: &str,
        session_type: &str,
        index: u32,
    ) -> VaultResult<Self> {
        check_segment(scope_identifier, "scope identifier", false)?;
        Self::from_parts(purpose, &scope_token(scope_identifier), session_type, index)
    }

    /// Build a path from an already-computed scope token.
    pub fn from_parts(
        purpose: &str,
        scope_token: &str,
        session_type: &str,
        index: u32,
    ) -> VaultResult<Self> {
        check_segment(purpose, "purpose", true)?;
        check_segment(session_type, "session type", true)?;
        check_scope_token(scope_token)?;

        Ok(Self {
            purpose: purpose.to_string(),
            scope_token: scope_token.to_string(),
            session_type: session_type.to_string(),
            index,
        })
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn scope_token(&self) -> &str {
        &self.scope_token
    }

    pub fn session_type(&self) -> &str {
        &self.session_type
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// The canonical string fed to the key derivation engine.
    pub fn canonical(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            self.purpose, self.scope_token, self.session_type, self.index
        )
    }

    /// Filesystem-safe name for artifacts keyed by this path.
    ///
    /// Segments are joined with `-`; a `-` or `%` inside a segment is
    /// percent-escaped, so distinct paths always get distinct stems.
    pub fn file_stem(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            escape_stem_segment(&self.purpose),
            self.scope_token,
            escape_stem_segment(&self.session_type),
            self.index
        )
    }

    /// The same path with a different index.
    pub fn with_index(&self, index: u32) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }
}

fn escape_stem_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            '-' => out.push_str("%2D"),
            c => out.push(c),
        }
    }
    out
}

/// Hash an external identifier down to the fixed-width scope token.
pub fn scope_token(identifier: &str) -> String {
    let digest = Sha256::digest(identifier.as_bytes());
    hex::encode(digest)[..SCOPE_TOKEN_LEN].to_string()
}

/// Reject empty segments. `strict` segments land verbatim in the canonical
/// string and must also be free of separators and whitespace; the scope
/// identifier is hashed first, so only emptiness matters for it.
fn check_segment(segment: &str, what: &str, strict: bool) -> VaultResult<()> {
    let invalid = |reason: String| VaultError::InvalidSegment {
        segment: segment.to_string(),
        reason,
    };

    if segment.is_empty() {
        return Err(invalid(format!("{what} must not be empty")));
    }
    if strict && segment.contains(SEPARATOR) {
        return Err(invalid(format!("{what} must not contain '{SEPARATOR}'")));
    }
    if strict && segment.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(format!("{what} must not contain whitespace")));
    }
    Ok(())
}

fn check_scope_token(token: &str) -> VaultResult<()> {
    let ok = token.len() == SCOPE_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if ok {
        Ok(())
    } else {
        Err(VaultError::InvalidSegment {
            segment: token.to_string(),
            reason: format!("scope token must be {SCOPE_TOKEN_LEN} lowercase hex chars"),
        })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for DerivationPath {
    type Err = VaultError;

    fn from_str(s: &str) -> VaultResult<Self> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [purpose, token, session_type, index] = parts.as_slice() else {
            return Err(VaultError::InvalidSegment {
                segment: s.to_string(),
                reason: format!("expected 4 segments, found {}", parts.len()),
            });
        };
        let bad_index = || VaultError::InvalidSegment {
            segment: index.to_string(),
            reason: "index must be a non-negative integer".into(),
        };
        if !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad_index());
        }
        let index: u32 = index.parse().map_err(|_| bad_index())?;
        Self::from_parts(purpose, token, session_type, index)
    }
}

impl TryFrom<String> for DerivationPath {
    type Error = VaultError;

    fn try_from(s: String) -> VaultResult<Self> {
        s.parse()
    }
}

impl From<DerivationPath> for String {
    fn from(path: DerivationPath) -> String {
        path.canonical()
    }
}
