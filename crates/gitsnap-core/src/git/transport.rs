//! Opening repositories and fetching objects, remote or local.

use std::future::Future;
use std::path::PathBuf;

use tracing::{debug, info};
use url::Url;

use super::advertisement::RefAdvertisement;
use super::command::GitRunner;
use super::local::{LocalRepo, RepoShape, run_blocking};
use super::location::{RepositoryLocation, ServiceHost};
use crate::auth::TransportCredentials;
use crate::error::{GitError, Result};

/// Where objects come from once a repository has been opened.
#[derive(Debug, Clone)]
pub(crate) enum Source {
    Remote {
        /// URL handed to git (service host applied, may embed a password)
        url: String,
        /// Credential-free URL for messages
        shown_url: String,
    },
    Local(LocalRepo),
}

impl Source {
    /// URL a fresh repository can fetch from.
    pub(crate) fn fetch_url(&self) -> Result<String> {
        match self {
            Source::Remote { url, .. } => Ok(url.clone()),
            Source::Local(local) => Url::from_file_path(local.git_dir())
                .map(|u| u.to_string())
                .map_err(|_| GitError::NotAGitRepository {
                    path: local.path().to_path_buf(),
                }),
        }
    }

    /// Credential-free description of the source.
    pub(crate) fn display(&self) -> String {
        match self {
            Source::Remote { shown_url, .. } => shown_url.clone(),
            Source::Local(local) => local.path().display().to_string(),
        }
    }

    pub(crate) fn is_local_bare(&self) -> bool {
        matches!(self, Source::Local(local) if local.shape() == RepoShape::Bare)
    }
}

/// Fetches a single commit-ish that may not be advertised.
pub(crate) trait ObjectFetcher {
    /// Resolve `commitish` to a full commit id, or fail with
    /// [`GitError::RefNotFound`] when the object does not exist.
    fn fetch_object(&self, commitish: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Open `location` and read its ref advertisement.
///
/// Remote locations are listed with `git ls-remote --symref`; no object
/// data is transferred. Local paths are detected and read through libgit2.
pub(crate) async fn open(
    runner: &GitRunner,
    location: &RepositoryLocation,
    service_host: Option<&ServiceHost>,
    credentials: &TransportCredentials,
) -> Result<(Source, RefAdvertisement)> {
    match location {
        RepositoryLocation::Local(path) => {
            let (local, adv) = run_blocking({
                let path = path.clone();
                move || {
                    let local = LocalRepo::detect(&path)?;
                    let adv = local.advertisement()?;
                    Ok((local, adv))
                }
            })
            .await?;
            info!(
                path = %path.display(),
                shape = ?local.shape(),
                refs = adv.len(),
                "opened local repository"
            );
            Ok((Source::Local(local), adv))
        }
        RepositoryLocation::Remote(remote) => {
            let url = remote.transport_url(service_host);
            let shown_url = remote.display_url();
            let output = runner
                .git(["ls-remote", "--symref", "--"])
                .arg(&url)
                .credentials(credentials)
                .output()
                .await?;
            if !output.success {
                return Err(GitError::from_remote_stderr(&shown_url, None, &output.stderr));
            }
            let adv = RefAdvertisement::parse_ls_remote(&output.stdout);
            info!(url = %shown_url, refs = adv.len(), "opened remote repository");
            Ok((Source::Remote { url, shown_url }, adv))
        }
    }
}

/// Object fetcher bound to one opened source and its credentials.
pub(crate) struct SourceFetcher<'a> {
    pub(crate) runner: &'a GitRunner,
    pub(crate) source: &'a Source,
    pub(crate) credentials: &'a TransportCredentials,
    pub(crate) scratch_root: Option<&'a PathBuf>,
}

impl ObjectFetcher for SourceFetcher<'_> {
    async fn fetch_object(&self, commitish: &str) -> Result<String> {
        match self.source {
            Source::Local(local) => {
                let local = local.clone();
                let commitish = commitish.to_string();
                run_blocking(move || local.lookup_commit(&commitish)).await
            }
            Source::Remote { url, shown_url } => {
                self.fetch_remote_object(url, shown_url, commitish).await
            }
        }
    }
}

impl SourceFetcher<'_> {
    /// Fetch `commitish` into a throwaway bare repository and report the
    /// commit it names.
    async fn fetch_remote_object(&self, url: &str, shown_url: &str, commitish: &str) -> Result<String> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("gitsnap-fetch-");
        let scratch = match self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| GitError::io("Failed to create scratch repository", e))?;

        self.runner
            .git(["init", "--bare", "--quiet"])
            .arg(scratch.path())
            .run()
            .await?;

        debug!(url = %shown_url, commitish, "fetching object");
        let output = self
            .runner
            .git(["fetch", "--quiet", "--no-tags", "--depth", "1", "--"])
            .arg(url)
            .arg(commitish)
            .current_dir(scratch.path())
            .credentials(self.credentials)
            .output()
            .await?;
        if !output.success {
            return Err(GitError::from_remote_stderr(shown_url, Some(commitish), &output.stderr));
        }

        self.runner
            .git(["rev-parse", "--verify", "FETCH_HEAD^{commit}"])
            .current_dir(scratch.path())
            .run()
            .await
            .map_err(|e| match e {
                GitError::Command { message, .. } => GitError::RefNotFound {
                    refname: commitish.to_string(),
                    message: Some(message),
                },
                other => other,
            })
    }
}
