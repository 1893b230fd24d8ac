//! Gitsnap Core Library
//!
//! Resolves a git repository location plus a ref selector into a commit,
//! a filesystem snapshot and a stable digest usable as a cache key.
//! Remote (https, ssh, file URLs) and local (worktree, bare, `.git`)
//! repositories go through the same [`Repository`] facade.

pub mod auth;
pub mod cancel;
pub mod checkout;
pub mod config;
pub mod digest;
pub mod error;
pub mod fs;
pub mod git;
pub mod refs;
pub mod repository;

pub use error::{GitError, Result};
pub use repository::{Connection, GitRef, Repository, ResolvedRef};

/// Re-exports of commonly used types
pub mod prelude {
    // Facade
    pub use crate::repository::{Connection, GitRef, Repository, ResolvedRef};

    // Selection
    pub use crate::refs::RefSelector;

    // Checkout and fingerprints
    pub use crate::checkout::{Tree, TreeOptions};
    pub use crate::digest::Digest;

    // Authentication
    pub use crate::auth::{AuthConfig, Secret, SecretProvider, SocketHandle};

    // Locations
    pub use crate::git::{RepositoryLocation, ServiceHost};

    // Settings and control
    pub use crate::cancel::CancelToken;
    pub use crate::config::GitConfig;
    pub use crate::error::{GitError, Result};
}
