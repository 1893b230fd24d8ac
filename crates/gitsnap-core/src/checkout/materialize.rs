use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use super::TreeOptions;
use crate::auth::TransportCredentials;
use crate::error::{GitError, Result};
use crate::git::command::GitRunner;
use crate::git::transport::Source;
use crate::refs::RefSelector;

/// Check out `commit` from `source` into `dest`.
///
/// `dest` must be absent or empty. The commit is fetched shallowly into a
/// staging repository next to `dest` and moved into place only once the
/// checkout is complete, so a failed or cancelled attempt leaves `dest`
/// as it was. A branch selector with a retained `.git` leaves that branch
/// checked out, anything else leaves HEAD detached.
pub(crate) async fn materialize(
    runner: &GitRunner,
    source: &Source,
    credentials: &TransportCredentials,
    commit: &str,
    selector: &RefSelector,
    options: TreeOptions,
    dest: &Path,
) -> Result<()> {
    let parent = prepare_destination(dest)?;
    let staging = tempfile::Builder::new()
        .prefix(".gitsnap-checkout-")
        .tempdir_in(&parent)
        .map_err(|e| {
            GitError::io(format!("Failed to create staging directory in {}", parent.display()), e)
        })?;

    populate(runner, source, credentials, commit, selector, options, staging.path()).await?;
    install(staging, dest)?;

    info!(
        url = %source.display(),
        commit,
        dest = %dest.display(),
        git_dir = !options.discard_git_dir,
        "materialized tree"
    );
    Ok(())
}

async fn populate(
    runner: &GitRunner,
    source: &Source,
    credentials: &TransportCredentials,
    commit: &str,
    selector: &RefSelector,
    options: TreeOptions,
    work: &Path,
) -> Result<()> {
    let shown_url = source.display();
    let url = source.fetch_url()?;

    runner
        .git(["init", "--quiet"])
        .arg(work)
        .run()
        .await?;

    debug!(url = %shown_url, commit, work = %work.display(), "fetching commit for checkout");
    let output = runner
        .git(["fetch", "--quiet", "--no-tags", "--depth", "1", "--"])
        .arg(&url)
        .arg(commit)
        .current_dir(work)
        .credentials(credentials)
        .output()
        .await?;
    if !output.success {
        return Err(GitError::from_remote_stderr(&shown_url, Some(commit), &output.stderr));
    }

    match selector {
        RefSelector::Branch(branch) if !options.discard_git_dir => {
            runner
                .git(["checkout", "--quiet", "-B"])
                .arg(branch)
                .arg(commit)
                .current_dir(work)
                .run()
                .await?;
        }
        _ => {
            runner
                .git(["checkout", "--quiet", "--detach"])
                .arg(commit)
                .current_dir(work)
                .run()
                .await?;
        }
    }

    let git_dir = work.join(".git");
    if options.discard_git_dir {
        tokio::fs::remove_dir_all(&git_dir)
            .await
            .map_err(|e| GitError::io(format!("Failed to remove {}", git_dir.display()), e))?;
    } else {
        runner
            .git(["remote", "add", "origin"])
            .arg(&shown_url)
            .current_dir(work)
            .run()
            .await?;
    }
    Ok(())
}

/// Check that `dest` is absent or empty and return the directory the
/// staging repository is created in.
fn prepare_destination(dest: &Path) -> Result<PathBuf> {
    match std::fs::read_dir(dest) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return Err(not_empty(dest));
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(GitError::io(format!("Failed to read {}", dest.display()), e)),
    }

    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .map_err(|e| GitError::io(format!("Failed to create {}", parent.display()), e))?;
    Ok(parent)
}

/// Move a finished staging directory to `dest`.
fn install(staging: TempDir, dest: &Path) -> Result<()> {
    match std::fs::remove_dir(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(_) => return Err(not_empty(dest)),
    }
    std::fs::rename(staging.path(), dest)
        .map_err(|e| GitError::io(format!("Failed to move checkout into {}", dest.display()), e))?;
    // Renamed away; nothing left for the guard to remove.
    let _ = staging.keep();
    Ok(())
}

fn not_empty(dest: &Path) -> GitError {
    GitError::io(
        format!("Checkout destination is not empty: {}", dest.display()),
        io::Error::from(io::ErrorKind::AlreadyExists),
    )
}
