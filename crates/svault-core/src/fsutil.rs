//! Small filesystem helpers shared by the key and session stores.
//!
//! Every secret-bearing file is written with mode 0600; replacements go
//! through a sibling temp file and a rename so readers never observe a
//! half-written document.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::error::{VaultError, VaultResult};

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent(path: &Path) -> VaultResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(VaultError::io(parent))?;
        }
    }
    Ok(())
}

fn private_options() -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.write(true);
    #[cfg(unix)]
    opts.mode(0o600);
    opts
}

/// Atomically create `path` with `content`, failing with `AlreadyExists` if
/// anything is already there. Data is fsynced before returning.
pub fn create_new_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = private_options().create_new(true).open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

/// Write `content` to `path` durably (write + fsync), replacing any previous
/// file via temp + rename.
pub fn atomic_write(path: &Path, content: &[u8], private: bool) -> VaultResult<()> {
    ensure_parent(path)?;
    let tmp_path = tmp_sibling(path);

    let write_tmp = || -> std::io::Result<()> {
        let mut opts = if private {
            private_options()
        } else {
            let mut o = OpenOptions::new();
            o.write(true);
            o
        };
        let mut file = opts.create(true).truncate(true).open(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()
    };
    write_tmp().map_err(VaultError::io(&tmp_path))?;

    fs::rename(&tmp_path, path).map_err(VaultError::io(path))?;
    sync_parent(path);
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!(".{name}.{}-{seq}.tmp", std::process::id()))
}

/// Best-effort fsync of the containing directory so the rename itself is
/// durable. Not every platform allows opening a directory.
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
