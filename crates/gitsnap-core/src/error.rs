//! Error taxonomy for resolution and checkout.
//!
//! Every failure that originates in git (remote or local) keeps the raw
//! diagnostic text. Callers match on substrings such as `git error`,
//! `Authentication failed for '<url>'` or `not a git repository`, so the
//! `Display` strings below are part of the public contract.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while resolving or materializing a repository state.
#[derive(Debug, Error)]
pub enum GitError {
    /// SSH was requested but no agent socket is configured.
    #[error("unsupported transport for {url}: SSH URLs are not supported without an SSH socket")]
    UnsupportedTransport {
        /// The location that was requested
        url: String,
    },

    /// The remote rejected (or never received) credentials.
    #[error("git error: failed to fetch remote {url}: {message}")]
    AuthenticationFailed {
        /// Credential-free location
        url: String,
        /// Raw diagnostic from git / the hosting provider
        message: String,
    },

    /// The SSH host key was absent from, or did not match, the known hosts.
    #[error("git error: failed to fetch remote {url}: host key verification failed: {message}")]
    HostKeyMismatch {
        /// Credential-free location
        url: String,
        /// Raw diagnostic from ssh
        message: String,
    },

    /// The selector did not resolve to a commit.
    #[error("ref not found: {refname}{}", detail_suffix(.message))]
    RefNotFound {
        /// The ref, tag, branch or commit-ish that was requested
        refname: String,
        /// Raw diagnostic, when git produced one
        message: Option<String>,
    },

    /// A local path has no recognizable git structure.
    #[error("not a git repository: {path}")]
    NotAGitRepository {
        /// The path that was inspected
        path: PathBuf,
    },

    /// Network or remote-side failure.
    #[error("git error: failed to fetch remote {url}: {message}")]
    Transport {
        /// Credential-free location
        url: String,
        /// Raw diagnostic from git
        message: String,
    },

    /// A local git invocation failed.
    #[error("git error: {command}: {message}")]
    Command {
        /// The git subcommand that failed
        command: String,
        /// Raw diagnostic from git
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// A git process outlived its deadline.
    #[error("deadline exceeded after {}s", .0.as_secs())]
    DeadlineExceeded(Duration),

    /// The location string could not be understood.
    #[error("invalid repository location '{input}': {reason}")]
    InvalidLocation {
        /// The raw input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// A secret handle could not be revealed.
    #[error("failed to resolve secret '{name}': {message}")]
    Secret {
        /// The secret's name (never its value)
        name: String,
        /// Provider diagnostic
        message: String,
    },

    /// A path was requested from a materialized tree that does not exist.
    #[error("file not found in tree: {path}")]
    FileNotFound {
        /// Path relative to the tree root
        path: String,
    },

    /// Filesystem failure while preparing or reading a snapshot.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

fn detail_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(" ({})", m),
        _ => String::new(),
    }
}

impl GitError {
    /// Whether a caller may reasonably retry the same request.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GitError::Transport { .. } | GitError::Command { .. } | GitError::DeadlineExceeded(_)
        )
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GitError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn ref_not_found(refname: impl Into<String>) -> Self {
        GitError::RefNotFound {
            refname: refname.into(),
            message: None,
        }
    }

    /// Classify stderr from a git process that talked to `url`.
    ///
    /// `wanted` is the commit-ish being fetched, if any; missing-object
    /// diagnostics are reported against it.
    pub(crate) fn from_remote_stderr(url: &str, wanted: Option<&str>, stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("host key verification failed")
            || lower.contains("remote host identification has changed")
            || lower.contains("no matching host key")
        {
            return GitError::HostKeyMismatch {
                url: url.to_string(),
                message,
            };
        }

        if lower.contains("authentication failed")
            || lower.contains("could not read username")
            || lower.contains("could not read password")
            || lower.contains("permission denied (publickey")
            || lower.contains("the requested url returned error: 401")
            || lower.contains("the requested url returned error: 403")
            || lower.contains("invalid username or password")
        {
            return GitError::AuthenticationFailed {
                url: url.to_string(),
                message,
            };
        }

        if let Some(wanted) = wanted
            && (lower.contains("couldn't find remote ref")
                || lower.contains("not our ref")
                || lower.contains("no such remote ref")
                || lower.contains("unadvertised object")
                || lower.contains("bad object")
                || lower.contains("upload-pack: not our"))
        {
            return GitError::RefNotFound {
                refname: wanted.to_string(),
                message: Some(message),
            };
        }

        GitError::Transport {
            url: url.to_string(),
            message,
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Command {
            command: "libgit2".to_string(),
            message: err.message().to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = GitError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_keeps_provider_text() {
        let stderr = "remote: Invalid credentials\nfatal: Authentication failed for 'https://bitbucket.org/org/private.git/'\n";
        let err = GitError::from_remote_stderr("https://bitbucket.org/org/private.git", None, stderr);

        assert!(matches!(err, GitError::AuthenticationFailed { .. }));
        let text = err.to_string();
        assert!(text.contains("git error"));
        assert!(text.contains("failed to fetch remote"));
        assert!(text.contains("Authentication failed for 'https://bitbucket.org/org/private.git/'"));
    }

    #[test]
    fn prompt_refusal_is_an_authentication_failure() {
        let stderr = "fatal: could not read Username for 'https://example.com': terminal prompts disabled";
        let err = GitError::from_remote_stderr("https://example.com/org/repo", None, stderr);
        assert!(matches!(err, GitError::AuthenticationFailed { .. }));
    }

    #[test]
    fn host_key_failure_is_classified() {
        let stderr = "Host key verification failed.\nfatal: Could not read from remote repository.";
        let err = GitError::from_remote_stderr("ssh://git@example.com/repo", None, stderr);
        assert!(matches!(err, GitError::HostKeyMismatch { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_object_maps_to_ref_not_found_only_when_fetching() {
        let stderr = "fatal: couldn't find remote ref nope";
        let err = GitError::from_remote_stderr("https://example.com/r", Some("nope"), stderr);
        match err {
            GitError::RefNotFound { refname, message } => {
                assert_eq!(refname, "nope");
                assert!(message.unwrap().contains("couldn't find remote ref"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = GitError::from_remote_stderr("https://example.com/r", None, stderr);
        assert!(matches!(err, GitError::Transport { .. }));
    }

    #[test]
    fn network_failures_are_retryable() {
        let stderr = "fatal: unable to access 'https://example.invalid/': Could not resolve host: example.invalid";
        let err = GitError::from_remote_stderr("https://example.invalid/r", None, stderr);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Could not resolve host"));
    }

    #[test]
    fn unsupported_transport_message() {
        let err = GitError::UnsupportedTransport {
            url: "git@gitlab.com:org/repo.git".to_string(),
        };
        assert!(
            err.to_string()
                .contains("SSH URLs are not supported without an SSH socket")
        );
    }
}
