//! Git repositories built with the git CLI for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

pub fn git_command() -> Command {
    let mut cmd = Command::new("git");
    for key in GIT_ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd
}

pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = git_command()
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to invoke git");
    assert!(
        output.status.success(),
        "git command failed: {:?}: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit_file(dir: &Path, name: &str, content: &str, message: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(&path, content).expect("Failed to write file");
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "-q", "-m", message]);
    run_git(dir, &["rev-parse", "HEAD"])
}

/// A worktree and a bare clone of it.
///
/// History on `main`: `first` (tagged `v1.0.0` annotated, `sdk/go/v1.0.0`
/// and `sdk/python/v1.0.0`) then `second` (tagged `v2.0.0`). Branch `dev`
/// adds `dev` on top of `second`. `pull` is reachable only through
/// `refs/pull/1/head` in the worktree.
pub struct Fixture {
    pub temp: TempDir,
    pub worktree: PathBuf,
    pub bare: PathBuf,
    pub first: String,
    pub second: String,
    pub dev: String,
    pub pull: String,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let worktree = temp.path().join("work");
        fs::create_dir_all(&worktree).expect("Failed to create worktree dir");

        run_git(&worktree, &["init", "-q"]);
        run_git(&worktree, &["checkout", "-q", "-b", "main"]);
        run_git(&worktree, &["config", "user.email", "test@example.com"]);
        run_git(&worktree, &["config", "user.name", "Test User"]);
        run_git(&worktree, &["config", "commit.gpgsign", "false"]);
        run_git(&worktree, &["config", "tag.gpgsign", "false"]);

        let first = commit_file(&worktree, "README.md", "hello\n", "first");
        run_git(&worktree, &["tag", "-a", "v1.0.0", "-m", "release 1.0.0"]);
        run_git(&worktree, &["tag", "sdk/go/v1.0.0"]);
        run_git(&worktree, &["tag", "sdk/python/v1.0.0"]);

        let second = commit_file(&worktree, "src/lib.txt", "library\n", "second");
        run_git(&worktree, &["tag", "v2.0.0"]);

        run_git(&worktree, &["checkout", "-q", "-b", "dev"]);
        let dev = commit_file(&worktree, "dev.txt", "dev\n", "dev");

        run_git(&worktree, &["checkout", "-q", "-b", "pr", "main"]);
        let pull = commit_file(&worktree, "pull.txt", "pull\n", "pull request");
        run_git(&worktree, &["update-ref", "refs/pull/1/head", &pull]);
        run_git(&worktree, &["checkout", "-q", "main"]);
        run_git(&worktree, &["branch", "-q", "-D", "pr"]);

        let bare = temp.path().join("repo.git");
        run_git(
            temp.path(),
            &[
                "clone",
                "-q",
                "--bare",
                worktree.to_str().expect("utf-8 temp path"),
                bare.to_str().expect("utf-8 temp path"),
            ],
        );
        // Expose the pull ref through the bare repository as well.
        run_git(&bare, &["fetch", "-q", worktree.to_str().expect("utf-8 temp path"), "refs/pull/1/head:refs/pull/1/head"]);

        Self {
            temp,
            worktree,
            bare,
            first,
            second,
            dev,
            pull,
        }
    }

    /// `file://` URL of the bare clone; takes the remote code path.
    pub fn remote_url(&self) -> String {
        url::Url::from_file_path(&self.bare)
            .expect("absolute path")
            .to_string()
    }

    /// An empty directory that is not a repository.
    pub fn empty_dir(&self) -> PathBuf {
        let dir = self.temp.path().join("empty");
        fs::create_dir_all(&dir).expect("Failed to create empty dir");
        dir
    }

    /// A git executable that fails `subcommand` and runs the real git for
    /// everything else.
    #[cfg(unix)]
    pub fn git_failing_on(&self, subcommand: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.temp.path().join(format!("git-failing-{subcommand}"));
        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"{subcommand}\" ]; then\n\
             \x20 echo \"fatal: {subcommand} refused\" >&2\n\
             \x20 exit 128\n\
             fi\n\
             exec git \"$@\"\n"
        );
        fs::write(&path, script).expect("Failed to write git wrapper");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to mark git wrapper executable");
        path
    }
}

const UNAUTHORIZED: &[u8] = b"HTTP/1.1 401 Unauthorized\r\n\
WWW-Authenticate: Basic realm=\"gitsnap\"\r\n\
Content-Type: text/plain\r\n\
Content-Length: 0\r\n\
Connection: close\r\n\
\r\n";

/// Serve HTTP on loopback, answering every request with a Basic auth
/// challenge. Returns a repository URL on that server.
pub async fn rejecting_http_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind loopback listener");
    let addr = listener.local_addr().expect("Listener has an address");

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&chunk[..n]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let _ = stream.write_all(UNAUTHORIZED).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{addr}/org/repo.git")
}
