//! Running the git CLI.
//!
//! Every git process is spawned with prompts disabled, a C locale (so
//! diagnostics can be classified by substring), the configured deadline
//! and the caller's cancellation token. Dropping an in-flight command
//! kills the child.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

use crate::auth::TransportCredentials;
use crate::cancel::CancelToken;
use crate::config::GitConfig;
use crate::error::{GitError, Result};

/// Spawns git processes with shared settings.
#[derive(Debug, Clone)]
pub(crate) struct GitRunner {
    binary: String,
    timeout: Duration,
    isolate_user_config: bool,
    cancel: CancelToken,
}

impl GitRunner {
    pub(crate) fn new(config: &GitConfig, cancel: CancelToken) -> Self {
        Self {
            binary: config.git_binary.clone(),
            timeout: config.timeout(),
            isolate_user_config: config.isolate_user_config,
            cancel,
        }
    }

    pub(crate) fn git<I, S>(&self, args: I) -> GitCommand<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        GitCommand {
            runner: self,
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            git_config: Vec::new(),
        }
    }
}

/// Captured result of a git process that ran to completion.
#[derive(Debug)]
pub(crate) struct GitOutput {
    pub(crate) success: bool,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

/// A single git invocation under construction.
pub(crate) struct GitCommand<'a> {
    runner: &'a GitRunner,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    git_config: Vec<(String, String)>,
}

impl GitCommand<'_> {
    pub(crate) fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub(crate) fn credentials(mut self, credentials: &TransportCredentials) -> Self {
        self.env.extend(credentials.env.iter().cloned());
        self.git_config.extend(credentials.git_config.iter().cloned());
        self
    }

    fn describe(&self) -> String {
        let sub = self
            .args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("git {}", sub)
    }

    /// Run to completion. A non-zero exit is not an error here; only
    /// spawn failure, deadline and cancellation are.
    pub(crate) async fn output(self) -> Result<GitOutput> {
        let runner = self.runner;
        let description = self.describe();
        if runner.cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let mut cmd = tokio::process::Command::new(&runner.binary);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ASKPASS", "true")
            .env("SSH_ASKPASS", "true")
            .env("LC_ALL", "C")
            .env("LANGUAGE", "C")
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE");
        if runner.isolate_user_config {
            cmd.env("GIT_CONFIG_NOSYSTEM", "1")
                .env("GIT_CONFIG_GLOBAL", "/dev/null");
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if !self.git_config.is_empty() {
            cmd.env("GIT_CONFIG_COUNT", self.git_config.len().to_string());
            for (i, (key, value)) in self.git_config.iter().enumerate() {
                cmd.env(format!("GIT_CONFIG_KEY_{}", i), key)
                    .env(format!("GIT_CONFIG_VALUE_{}", i), value);
            }
        }

        debug!(
            command = %description,
            args = ?self.args,
            cwd = ?self.cwd,
            "running git"
        );

        let child = cmd
            .spawn()
            .map_err(|e| GitError::io(format!("Failed to run {}", description), e))?;

        let output = tokio::select! {
            result = tokio::time::timeout(runner.timeout, child.wait_with_output()) => match result {
                Ok(output) => output
                    .map_err(|e| GitError::io(format!("Failed to wait for {}", description), e))?,
                Err(_) => {
                    warn!(command = %description, timeout = ?runner.timeout, "git deadline exceeded");
                    return Err(GitError::DeadlineExceeded(runner.timeout));
                }
            },
            _ = runner.cancel.cancelled() => {
                debug!(command = %description, "git cancelled");
                return Err(GitError::Cancelled);
            }
        };

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run a local git command, returning trimmed stdout.
    pub(crate) async fn run(self) -> Result<String> {
        let description = self.describe();
        let output = self.output().await?;
        if !output.success {
            return Err(GitError::Command {
                command: description,
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(config: &GitConfig) -> GitRunner {
        GitRunner::new(config, CancelToken::new())
    }

    #[tokio::test]
    async fn runs_git_version() {
        let config = GitConfig::default();
        let out = runner(&config).git(["--version"]).run().await.unwrap();
        assert!(out.starts_with("git version"), "{out}");
    }

    #[tokio::test]
    async fn failure_keeps_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = GitConfig::default();
        let err = runner(&config)
            .git(["rev-parse", "HEAD"])
            .current_dir(dir.path())
            .run()
            .await
            .unwrap_err();
        match err {
            GitError::Command { command, message } => {
                assert_eq!(command, "git rev-parse");
                assert!(message.contains("not a git repository"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_spawn() {
        let config = GitConfig::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = GitRunner::new(&config, cancel)
            .git(["--version"])
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::Cancelled));
    }

    #[tokio::test]
    async fn config_entries_reach_git() {
        let config = GitConfig::default();
        let runner = runner(&config);
        let creds = TransportCredentials::from_parts(
            Vec::new(),
            vec![("gitsnap.probe".to_string(), "on".to_string())],
        );
        let out = runner
            .git(["config", "--get", "gitsnap.probe"])
            .credentials(&creds)
            .run()
            .await
            .unwrap();
        assert_eq!(out, "on");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_is_io_error() {
        let config = GitConfig {
            git_binary: "/nonexistent/git-binary".to_string(),
            ..GitConfig::default()
        };
        let err = runner(&config).git(["--version"]).run().await.unwrap_err();
        assert!(matches!(err, GitError::Io { .. }));
    }
}
