//! Deterministic hashing of checked-out trees.
//!
//! Two snapshots of the same commit hash identically whether or not they
//! kept their `.git` directory and regardless of where they live on disk.

use std::fs;
use std::path::Path;

use crate::error::{GitError, Result};

const GIT_DIR: &str = ".git";

/// Compute a deterministic blake3 hash of the files under `path`.
///
/// # Algorithm
/// - Entries are visited in byte order of their names
/// - Directory: `path || 0xFF`, then its children
/// - File: `path || 0x00 || content`
/// - Symlink: `path || 0x01 || target` (never followed)
/// - `.git` entries are skipped at every level
///
/// # Example
/// ```no_run
/// use gitsnap_core::fs::tree_hash::hash_tree;
/// use std::path::Path;
///
/// let hash = hash_tree(Path::new("/path/to/checkout"))?;
/// assert_eq!(hash.len(), 64);
/// # Ok::<(), gitsnap_core::GitError>(())
/// ```
pub fn hash_tree(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hash_dir_recursive(&mut hasher, path, "")?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir_recursive(hasher: &mut blake3::Hasher, dir: &Path, base: &str) -> Result<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| GitError::io(format!("Failed to read directory: {}", dir.display()), e))?;

    let mut sorted_entries: Vec<_> = entries
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| {
            GitError::io(format!("Failed to read directory entries: {}", dir.display()), e)
        })?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        if name == GIT_DIR {
            continue;
        }
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let entry_path = entry.path();
        let ty = entry.file_type().map_err(|e| {
            GitError::io(format!("Failed to stat file: {}", entry_path.display()), e)
        })?;

        if ty.is_symlink() {
            let target = fs::read_link(&entry_path).map_err(|e| {
                GitError::io(format!("Failed to read link: {}", entry_path.display()), e)
            })?;
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x01]);
            hasher.update(target.to_string_lossy().as_bytes());
        } else if ty.is_dir() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0xFF]);
            hash_dir_recursive(hasher, &entry_path, &rel_path)?;
        } else if ty.is_file() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x00]);
            let content = fs::read(&entry_path).map_err(|e| {
                GitError::io(format!("Failed to read file: {}", entry_path.display()), e)
            })?;
            hasher.update(&content);
        }
    }

    Ok(())
}
