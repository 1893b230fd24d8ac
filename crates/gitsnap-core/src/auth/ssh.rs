//! SSH agent socket handling and host key pinning.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{GitError, Result};

/// Handle to an SSH agent's unix socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketHandle {
    path: PathBuf,
}

impl SocketHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dial the agent once and hang up, proving it is reachable before git
    /// spawns ssh against it.
    pub(crate) async fn probe(&self, url: &str) -> Result<()> {
        #[cfg(unix)]
        {
            let stream = tokio::net::UnixStream::connect(&self.path)
                .await
                .map_err(|e| GitError::Transport {
                    url: url.to_string(),
                    message: format!(
                        "failed to dial SSH auth socket {}: {}",
                        self.path.display(),
                        e
                    ),
                })?;
            drop(stream);
            Ok(())
        }
        #[cfg(not(unix))]
        {
            let _ = url;
            Ok(())
        }
    }
}

/// Known-hosts entries written to a private file for the lifetime of one
/// resolution.
#[derive(Debug)]
pub(crate) struct KnownHostsFile {
    file: NamedTempFile,
}

impl KnownHostsFile {
    pub(crate) fn write(entries: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("gitsnap-known-hosts-")
            .tempfile()
            .map_err(|e| GitError::io("Failed to create known hosts file", e))?;
        let mut content = entries.trim().to_string();
        content.push('\n');
        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| GitError::io("Failed to write known hosts file", e))?;
        Ok(Self { file })
    }

    pub(crate) fn path(&self) -> &Path {
        self.file.path()
    }
}

/// `GIT_SSH_COMMAND` that trusts only the pinned known hosts.
pub(crate) fn ssh_command(known_hosts: &Path, isolate_user_config: bool) -> String {
    let mut parts = vec!["ssh".to_string()];
    if isolate_user_config {
        parts.push("-F".to_string());
        parts.push("/dev/null".to_string());
    }
    for option in [
        "BatchMode=yes".to_string(),
        "StrictHostKeyChecking=yes".to_string(),
        format!("UserKnownHostsFile={}", known_hosts.display()),
        "GlobalKnownHostsFile=/dev/null".to_string(),
    ] {
        parts.push("-o".to_string());
        parts.push(shell_quote(&option));
    }
    parts.join(" ")
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
