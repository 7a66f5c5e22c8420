//! Session index (`sessions/index.json`)
//!
//! The index is the source of truth for which sessions exist. Every mutation
//! runs under an exclusive lock on a sibling `index.json.lock` file:
//! reload from disk, apply, write a temp file, rename, unlock. Reads take no
//! lock; renames make every snapshot a complete document.

use chrono::Utc;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use svault_core::fsutil;
use svault_core::{IndexDocument, Policy, SessionRecord, VaultError, VaultResult};

/// Metadata edit applied by [`SessionIndex::update_record`].
#[derive(Debug, Clone, Default)]
pub struct RecordEdit {
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub description: Option<String>,
}

impl RecordEdit {
    fn is_empty(&self) -> bool {
        self.add_tags.is_empty() && self.remove_tags.is_empty() && self.description.is_none()
    }
}

/// Snapshot of the index ordered by `created_at`, then `session_id`.
///
/// Iterating does not consume it, so a listing can be walked again from the
/// start without touching disk.
#[derive(Debug, Clone, Default)]
pub struct SessionList {
    records: Vec<SessionRecord>,
}

impl SessionList {
    fn new(mut records: Vec<SessionRecord>) -> Self {
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Self { records }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SessionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a SessionList {
    type Item = &'a SessionRecord;
    type IntoIter = std::slice::Iter<'a, SessionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for SessionList {
    type Item = SessionRecord;
    type IntoIter = std::vec::IntoIter<SessionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[derive(Debug, Clone)]
pub struct SessionIndex {
    path: PathBuf,
}

/// Holds the exclusive index lock; released on drop.
struct IndexLock {
    _file: File,
}

impl SessionIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "index.json".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn lock(&self) -> VaultResult<IndexLock> {
        let lock_path = self.lock_path();
        fsutil::ensure_parent(&lock_path)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(VaultError::io(&lock_path))?;
        file.lock().map_err(VaultError::io(&lock_path))?;
        Ok(IndexLock { _file: file })
    }

    /// Create an empty index if none exists yet.
    pub fn ensure(&self) -> VaultResult<()> {
        let _guard = self.lock()?;
        if self.path.exists() {
            return Ok(());
        }
        let mut doc = IndexDocument::default();
        doc.refresh_statistics(Utc::now());
        self.write(&doc)?;
        tracing::info!(op = "index.create", path = %self.path.display(), "session index created");
        Ok(())
    }

    /// Read the current document. A missing index reads as empty.
    pub fn load(&self) -> VaultResult<IndexDocument> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IndexDocument::default())
            }
            Err(e) => return Err(VaultError::io(&self.path)(e)),
        };
        serde_json::from_slice(&data).map_err(|e| VaultError::Serialization {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write(&self, doc: &IndexDocument) -> VaultResult<()> {
        let json = serde_json::to_vec_pretty(doc).map_err(|e| VaultError::Serialization {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        fsutil::atomic_write(&self.path, &json, false)
    }

    /// Lock, reload, apply `f`, refresh statistics, write back.
    fn mutate<T>(&self, f: impl FnOnce(&mut IndexDocument) -> VaultResult<T>) -> VaultResult<T> {
        let _guard = self.lock()?;
        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        doc.refresh_statistics(Utc::now());
        self.write(&doc)?;
        Ok(out)
    }

    /// Append a record produced by the encryptor.
    pub fn register(&self, record: &SessionRecord) -> VaultResult<()> {
        self.mutate(|doc| {
            if doc.sessions.iter().any(|s| s.session_id == record.session_id) {
                return Err(VaultError::DuplicateId(record.session_id.clone()));
            }
            doc.sessions.push(record.clone());
            Ok(())
        })?;
        tracing::info!(op = "index.register", session_id = %record.session_id, "session registered");
        Ok(())
    }

    pub fn list(&self) -> VaultResult<SessionList> {
        Ok(SessionList::new(self.load()?.sessions))
    }

    pub fn find(&self, session_id: &str) -> VaultResult<SessionRecord> {
        self.load()?
            .sessions
            .into_iter()
            .find(|s| s.session_id == session_id)
            .ok_or_else(|| VaultError::NotFound(session_id.to_string()))
    }

    pub fn find_by_tag(&self, tag: &str) -> VaultResult<SessionList> {
        let tag = tag.trim();
        Ok(SessionList::new(
            self.load()?
                .sessions
                .into_iter()
                .filter(|s| s.tags.contains(tag))
                .collect(),
        ))
    }

    pub fn policy(&self) -> VaultResult<Policy> {
        Ok(self.load()?.policy)
    }

    /// Replace the policy block; session entries are left alone.
    pub fn update_policy(&self, policy: Policy) -> VaultResult<()> {
        self.mutate(|doc| {
            doc.policy = policy;
            Ok(())
        })?;
        tracing::info!(op = "index.update_policy", "policy updated");
        Ok(())
    }

    /// Edit tags and description of one entry, bumping `updated_at`.
    pub fn update_record(&self, session_id: &str, edit: &RecordEdit) -> VaultResult<SessionRecord> {
        let record = self.mutate(|doc| {
            let record = doc
                .sessions
                .iter_mut()
                .find(|s| s.session_id == session_id)
                .ok_or_else(|| VaultError::NotFound(session_id.to_string()))?;
            if edit.is_empty() {
                return Ok(record.clone());
            }
            for tag in &edit.remove_tags {
                record.tags.remove(tag.trim());
            }
            record.tags.extend(
                edit.add_tags
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
            );
            if let Some(desc) = &edit.description {
                record.description = desc.clone();
            }
            record.updated_at = Utc::now();
            Ok(record.clone())
        })?;
        tracing::info!(op = "index.update_record", session_id, "session metadata updated");
        Ok(record)
    }

    /// Drop one entry and return it.
    pub fn remove_entry(&self, session_id: &str) -> VaultResult<SessionRecord> {
        let removed = self.mutate(|doc| {
            let pos = doc
                .sessions
                .iter()
                .position(|s| s.session_id == session_id)
                .ok_or_else(|| VaultError::NotFound(session_id.to_string()))?;
            Ok(doc.sessions.remove(pos))
        })?;
        tracing::info!(op = "index.remove", session_id, "session entry removed");
        Ok(removed)
    }

    /// Drop every entry for which `is_gone` holds. Returns the dropped ids.
    pub fn retain_present(
        &self,
        mut is_gone: impl FnMut(&SessionRecord) -> bool,
    ) -> VaultResult<BTreeSet<String>> {
        let dropped = self.mutate(|doc| {
            let mut dropped = BTreeSet::new();
            doc.sessions.retain(|s| {
                if is_gone(s) {
                    dropped.insert(s.session_id.clone());
                    false
                } else {
                    true
                }
            });
            Ok(dropped)
        })?;
        if !dropped.is_empty() {
            tracing::info!(op = "index.compact", dropped = dropped.len(), "index compacted");
        }
        Ok(dropped)
    }
}
