//! Materializing a resolved commit on disk.

mod materialize;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::digest::Digest;
use crate::error::{GitError, Result};
use crate::fs::hash_tree;

pub(crate) use materialize::materialize;

/// Options controlling what a snapshot contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeOptions {
    /// Strip the `.git` directory after checkout.
    pub discard_git_dir: bool,
}

impl TreeOptions {
    pub fn discard_git_dir() -> Self {
        Self {
            discard_git_dir: true,
        }
    }
}

/// The files of one commit, checked out into a directory.
///
/// Trees created through [`crate::GitRef::tree`] live in a temporary
/// directory removed on drop unless [`Tree::keep`] is called.
#[derive(Debug)]
pub struct Tree {
    path: PathBuf,
    commit: String,
    options: TreeOptions,
    digest: Digest,
    temp: Option<TempDir>,
}

impl Tree {
    pub(crate) fn new(
        path: PathBuf,
        commit: String,
        options: TreeOptions,
        digest: Digest,
        temp: Option<TempDir>,
    ) -> Self {
        Self {
            path,
            commit,
            options,
            digest,
            temp,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Options the tree was actually built with. A bare local source
    /// always reports `discard_git_dir`.
    pub fn options(&self) -> TreeOptions {
        self.options
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn has_git_dir(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Top-level entry names, sorted. Directories end with `/`.
    pub fn entries(&self) -> Result<Vec<String>> {
        let read = std::fs::read_dir(&self.path)
            .map_err(|e| GitError::io(format!("Failed to read {}", self.path.display()), e))?;
        let mut names = Vec::new();
        for entry in read {
            let entry = entry
                .map_err(|e| GitError::io(format!("Failed to read {}", self.path.display()), e))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Raw bytes of a file relative to the tree root.
    pub fn read_file(&self, rel: impl AsRef<Path>) -> Result<Vec<u8>> {
        let rel = rel.as_ref();
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(GitError::FileNotFound {
                path: rel.display().to_string(),
            });
        }
        let full = self.path.join(rel);
        std::fs::read(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory => {
                GitError::FileNotFound {
                    path: rel.display().to_string(),
                }
            }
            _ => GitError::io(format!("Failed to read {}", full.display()), e),
        })
    }

    /// A file's contents as UTF-8 text (lossy).
    pub fn file_contents(&self, rel: impl AsRef<Path>) -> Result<String> {
        let bytes = self.read_file(rel)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Hash of the checked-out files, ignoring `.git`.
    pub fn content_hash(&self) -> Result<String> {
        hash_tree(&self.path)
    }

    /// Keep the directory after the tree is dropped, returning its path.
    pub fn keep(mut self) -> PathBuf {
        if let Some(temp) = self.temp.take() {
            let _ = temp.keep();
        }
        self.path.clone()
    }
}
