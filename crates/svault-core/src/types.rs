use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current on-disk index format version
pub const INDEX_VERSION: &str = "1.0";

/// How a session's ciphertext was produced and where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    /// Sealing backend name (e.g. "age")
    pub algorithm: String,
    /// Ciphertext file, relative to the sessions directory
    pub encrypted_file_path: String,
    /// SHA-256 of the stored ciphertext bytes (hex)
    pub checksum: String,
    /// Ciphertext size in bytes
    #[serde(default)]
    pub size: u64,
}

/// Public metadata for one encrypted session.
///
/// Safe to publish: holds no plaintext and no key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    /// Canonical derivation path of the recipient key, when one was derived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_path: Option<String>,
    pub encryption: EncryptionInfo,
}

/// Per-session metadata document written next to the ciphertext
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub metadata: SessionRecord,
}

/// Policy block carried by the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Encrypt new sessions without being asked (consumed by hook wiring)
    pub auto_encrypt: bool,
    /// Flag plaintext files found in the sessions directory
    pub require_encryption: bool,
    /// Derived keys older than this many days are reported as due for rotation
    pub key_rotation_days: u32,
    /// Glob patterns of inputs that must never be encrypted into the store
    pub content_filters: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            auto_encrypt: false,
            require_encryption: true,
            key_rotation_days: 90,
            content_filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub total_sessions: usize,
    pub encrypted_sessions: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The session index document (sessions/index.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub index_version: String,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub statistics: Statistics,
}

impl Default for IndexDocument {
    fn default() -> Self {
        Self {
            index_version: INDEX_VERSION.into(),
            sessions: Vec::new(),
            policy: Policy::default(),
            statistics: Statistics::default(),
        }
    }
}

impl IndexDocument {
    /// Recompute the statistics block from the current session list.
    pub fn refresh_statistics(&mut self, now: DateTime<Utc>) {
        self.statistics = Statistics {
            total_sessions: self.sessions.len(),
            encrypted_sessions: self
                .sessions
                .iter()
                .filter(|s| !s.encryption.algorithm.is_empty() && !s.encryption.checksum.is_empty())
                .count(),
            last_updated: Some(now),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: id.into(),
            created_at: now,
            updated_at: now,
            tags: ["planning".to_string()].into_iter().collect(),
            description: "test".into(),
            derivation_path: None,
            encryption: EncryptionInfo {
                algorithm: "age".into(),
                encrypted_file_path: format!("{id}.age"),
                checksum: "00".repeat(32),
                size: 10,
            },
        }
    }

    #[test]
    fn test_metadata_document_shape() {
        let doc = MetadataDocument {
            metadata: record("s-1"),
        };
        let value: serde_json::Value = serde_json::to_value(&doc).unwrap();

        let meta = &value["metadata"];
        assert_eq!(meta["session_id"], "s-1");
        assert_eq!(meta["tags"][0], "planning");
        assert_eq!(meta["encryption"]["algorithm"], "age");
        assert_eq!(meta["encryption"]["encrypted_file_path"], "s-1.age");
        assert!(meta.get("derivation_path").is_none());
    }

    #[test]
    fn test_index_defaults_from_minimal_json() {
        let doc: IndexDocument = serde_json::from_str(r#"{"index_version":"1.0"}"#).unwrap();
        assert!(doc.sessions.is_empty());
        assert_eq!(doc.policy, Policy::default());
        assert_eq!(doc.statistics.total_sessions, 0);
    }

    #[test]
    fn test_refresh_statistics() {
        let mut doc = IndexDocument::default();
        doc.sessions.push(record("a"));
        doc.sessions.push(record("b"));
        let now = Utc::now();
        doc.refresh_statistics(now);

        assert_eq!(doc.statistics.total_sessions, 2);
        assert_eq!(doc.statistics.encrypted_sessions, 2);
        assert_eq!(doc.statistics.last_updated, Some(now));
    }
}
