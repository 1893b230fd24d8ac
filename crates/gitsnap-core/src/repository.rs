//! The public entry point: a repository location plus how to reach it.
//!
//! ```no_run
//! use gitsnap_core::prelude::*;
//!
//! # async fn run() -> gitsnap_core::Result<()> {
//! let repo = Repository::parse("https://github.com/org/repo")?
//!     .with_auth_token(Secret::from_env("GITHUB_TOKEN"));
//!
//! let tree = repo.branch("main").tree(TreeOptions::default()).await?;
//! println!("{} at {}", tree.path().display(), tree.commit());
//!
//! let releases = repo.tags(&["refs/tags/v*"]).await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::auth::{self, AuthConfig, Secret, SocketHandle, TransportCredentials};
use crate::cancel::CancelToken;
use crate::checkout::{self, Tree, TreeOptions};
use crate::config::GitConfig;
use crate::digest::Digest;
use crate::error::{GitError, Result};
use crate::git::command::GitRunner;
use crate::git::transport::{self, Source, SourceFetcher};
use crate::git::{RefAdvertisement, RepositoryLocation, ServiceHost};
use crate::refs::{self, RefSelector, resolver};

/// A repository location with its authentication and settings.
///
/// Every `with_*` method returns a new value; a `Repository` is never
/// mutated in place, so clones can be shared freely between tasks.
#[derive(Debug, Clone)]
pub struct Repository {
    location: RepositoryLocation,
    auth: AuthConfig,
    service_host: Option<ServiceHost>,
    config: Arc<GitConfig>,
    cancel: CancelToken,
}

impl Repository {
    pub fn new(location: RepositoryLocation) -> Self {
        Self {
            location,
            auth: AuthConfig::None,
            service_host: None,
            config: Arc::new(GitConfig::default()),
            cancel: CancelToken::new(),
        }
    }

    /// Parse a location string; see [`RepositoryLocation::parse`].
    pub fn parse(input: &str) -> Result<Self> {
        RepositoryLocation::parse(input).map(Self::new)
    }

    /// A repository on the local filesystem: a worktree, a bare
    /// repository or a `.git` directory.
    pub fn open_local(path: impl Into<PathBuf>) -> Self {
        Self::new(RepositoryLocation::local(path))
    }

    pub fn with_config(self, config: GitConfig) -> Self {
        Self {
            config: Arc::new(config),
            ..self
        }
    }

    /// Authenticate over HTTPS with a token as the basic-auth password.
    pub fn with_auth_token(self, token: Secret) -> Self {
        self.with_auth(AuthConfig::Token(token))
    }

    /// Authenticate over HTTPS with a raw `Authorization` header value.
    pub fn with_auth_header(self, header: Secret) -> Self {
        self.with_auth(AuthConfig::Header(header))
    }

    /// Authenticate over SSH through an agent socket, pinning the host
    /// keys the server may present.
    pub fn with_ssh_auth(self, socket: SocketHandle, known_hosts: impl Into<String>) -> Self {
        self.with_auth(AuthConfig::SshAgent {
            socket,
            known_hosts: known_hosts.into(),
        })
    }

    /// Replace whatever authentication was configured.
    pub fn with_auth(self, auth: AuthConfig) -> Self {
        Self { auth, ..self }
    }

    /// Reach the repository through `host` instead of the host in its
    /// location. Identity and digests are unchanged.
    pub fn with_service_host(self, host: ServiceHost) -> Self {
        Self {
            service_host: Some(host),
            ..self
        }
    }

    /// Abort in-flight git processes when `cancel` fires.
    pub fn with_cancellation(self, cancel: CancelToken) -> Self {
        Self { cancel, ..self }
    }

    pub fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    /// Normalized identity, shared by every [`ResolvedRef`] of this
    /// repository.
    pub fn identity(&self) -> String {
        self.location.identity()
    }

    pub fn head(&self) -> GitRef {
        self.selector(RefSelector::Head)
    }

    pub fn branch(&self, name: impl Into<String>) -> GitRef {
        self.selector(RefSelector::Branch(name.into()))
    }

    pub fn tag(&self, name: impl Into<String>) -> GitRef {
        self.selector(RefSelector::Tag(name.into()))
    }

    pub fn commit(&self, sha: impl Into<String>) -> GitRef {
        self.selector(RefSelector::Commit(sha.into()))
    }

    /// Any fully-qualified ref, e.g. `refs/pull/42/head`.
    pub fn reference(&self, refspec: impl Into<String>) -> GitRef {
        self.selector(RefSelector::Ref(refspec.into()))
    }

    pub fn selector(&self, selector: RefSelector) -> GitRef {
        GitRef {
            repo: self.clone(),
            selector,
        }
    }

    /// Tag names matched by at least one of `patterns`, sorted.
    /// An empty pattern list returns every tag.
    pub async fn tags<P: AsRef<str>>(&self, patterns: &[P]) -> Result<Vec<String>> {
        Ok(self.connect().await?.tags(patterns))
    }

    /// Authenticate and read the ref advertisement.
    ///
    /// The returned connection resolves any number of selectors, also
    /// concurrently, against that one advertisement.
    pub async fn connect(&self) -> Result<Connection> {
        let credentials = auth::authenticate(&self.location, &self.auth, &self.config).await?;
        let runner = GitRunner::new(&self.config, self.cancel.clone());
        let (source, advertisement) = transport::open(
            &runner,
            &self.location,
            self.service_host.as_ref(),
            &credentials,
        )
        .await?;
        info!(
            location = %self.location,
            auth = self.auth.kind(),
            refs = advertisement.len(),
            "connected"
        );
        Ok(Connection {
            identity: self.identity(),
            scratch_root: self.config.checkout_root.clone(),
            runner,
            credentials,
            source,
            advertisement,
        })
    }
}

/// An opened repository: credentials plus one ref advertisement.
#[derive(Debug)]
pub struct Connection {
    identity: String,
    scratch_root: Option<PathBuf>,
    runner: GitRunner,
    credentials: TransportCredentials,
    source: Source,
    advertisement: RefAdvertisement,
}

impl Connection {
    pub fn advertisement(&self) -> &RefAdvertisement {
        &self.advertisement
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn tags<P: AsRef<str>>(&self, patterns: &[P]) -> Vec<String> {
        refs::filter_tags(self.advertisement.tag_names(), patterns)
    }

    fn fetcher(&self) -> SourceFetcher<'_> {
        SourceFetcher {
            runner: &self.runner,
            source: &self.source,
            credentials: &self.credentials,
            scratch_root: self.scratch_root.as_ref(),
        }
    }

    pub async fn resolve(&self, selector: &RefSelector) -> Result<ResolvedRef> {
        let commit = resolver::resolve(&self.advertisement, selector, &self.fetcher()).await?;
        debug!(identity = %self.identity, %selector, commit = %commit, "resolved");
        Ok(ResolvedRef {
            identity: self.identity.clone(),
            selector: selector.clone(),
            commit,
            bare_source: self.source.is_local_bare(),
        })
    }

    /// Check out `resolved` into `dest`, which must be absent or empty.
    /// The directory is not removed when the returned tree is dropped.
    pub async fn checkout(
        &self,
        resolved: &ResolvedRef,
        options: TreeOptions,
        dest: &Path,
    ) -> Result<Tree> {
        self.materialize(resolved, options, dest.to_path_buf(), None)
            .await
    }

    /// Check out `resolved` into a temporary directory owned by the tree.
    pub async fn tree(&self, resolved: &ResolvedRef, options: TreeOptions) -> Result<Tree> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("gitsnap-tree-");
        let temp = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| GitError::io("Failed to create checkout directory", e))?;
        let path = temp.path().to_path_buf();
        self.materialize(resolved, options, path, Some(temp)).await
    }

    async fn materialize(
        &self,
        resolved: &ResolvedRef,
        options: TreeOptions,
        dest: PathBuf,
        temp: Option<tempfile::TempDir>,
    ) -> Result<Tree> {
        let effective = resolved.effective_options(options);
        checkout::materialize(
            &self.runner,
            &self.source,
            &self.credentials,
            &resolved.commit,
            &resolved.selector,
            effective,
            &dest,
        )
        .await?;
        Ok(Tree::new(
            dest,
            resolved.commit.clone(),
            effective,
            resolved.digest(options),
            temp,
        ))
    }
}

/// A selector bound to a repository, not yet resolved.
#[derive(Debug, Clone)]
pub struct GitRef {
    repo: Repository,
    selector: RefSelector,
}

impl GitRef {
    pub fn selector(&self) -> &RefSelector {
        &self.selector
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Resolve now. A moving ref resolved twice may give different results.
    pub async fn resolve(&self) -> Result<ResolvedRef> {
        self.repo.connect().await?.resolve(&self.selector).await
    }

    /// The commit id the selector currently names.
    pub async fn commit(&self) -> Result<String> {
        Ok(self.resolve().await?.commit)
    }

    /// Resolve and check out into a temporary directory.
    pub async fn tree(&self, options: TreeOptions) -> Result<Tree> {
        let conn = self.repo.connect().await?;
        let resolved = conn.resolve(&self.selector).await?;
        conn.tree(&resolved, options).await
    }

    /// Resolve and check out into `dest`.
    pub async fn checkout(&self, dest: impl AsRef<Path>, options: TreeOptions) -> Result<Tree> {
        let conn = self.repo.connect().await?;
        let resolved = conn.resolve(&self.selector).await?;
        conn.checkout(&resolved, options, dest.as_ref()).await
    }
}

/// A selector together with the commit it resolved to.
///
/// Two values are equal when repository identity, selector and commit
/// are equal; credentials never take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedRef {
    identity: String,
    selector: RefSelector,
    commit: String,
    #[serde(skip)]
    bare_source: bool,
}

impl ResolvedRef {
    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn selector(&self) -> &RefSelector {
        &self.selector
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Options a checkout will actually use. Bare local sources have no
    /// `.git` directory to keep.
    pub fn effective_options(&self, requested: TreeOptions) -> TreeOptions {
        if self.bare_source {
            TreeOptions::discard_git_dir()
        } else {
            requested
        }
    }

    /// Fingerprint of this state as checked out with `options`.
    pub fn digest(&self, options: TreeOptions) -> Digest {
        Digest::compute(&self.identity, &self.commit, self.effective_options(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT: &str = "1111111111111111111111111111111111111111";

    fn resolved(bare_source: bool) -> ResolvedRef {
        ResolvedRef {
            identity: "https://github.com/org/repo".to_string(),
            selector: RefSelector::Branch("main".to_string()),
            commit: COMMIT.to_string(),
            bare_source,
        }
    }

    #[test]
    fn builders_return_new_values() {
        let repo = Repository::parse("https://github.com/org/repo").unwrap();
        let authed = repo.clone().with_auth_token(Secret::from_plaintext("t", "x"));
        assert_eq!(repo.auth().kind(), "none");
        assert_eq!(authed.auth().kind(), "token");

        let replaced = authed.with_auth_header(Secret::from_plaintext("h", "Bearer y"));
        assert_eq!(replaced.auth().kind(), "header");
    }

    #[test]
    fn service_host_does_not_change_identity() {
        let repo = Repository::parse("https://github.com/org/repo").unwrap();
        let via_service = repo.clone().with_service_host(ServiceHost::new("gitea-1234"));
        assert_eq!(repo.identity(), via_service.identity());
    }

    #[test]
    fn bare_sources_always_discard_git_dir() {
        let keep = TreeOptions::default();
        assert!(resolved(true).effective_options(keep).discard_git_dir);
        assert!(!resolved(false).effective_options(keep).discard_git_dir);
        assert_eq!(
            resolved(true).digest(keep),
            resolved(true).digest(TreeOptions::discard_git_dir())
        );
    }

    #[test]
    fn resolved_refs_serialize_without_secrets() {
        let json = serde_json::to_value(resolved(false)).unwrap();
        assert_eq!(json["commit"], COMMIT);
        assert_eq!(json["selector"]["kind"], "branch");
        assert!(json.get("bare_source").is_none());
    }

    #[tokio::test]
    async fn ssh_without_socket_fails_before_connecting() {
        let repo = Repository::parse("git@github.com:org/repo.git").unwrap();
        let err = repo.tags(&[] as &[&str]).await.unwrap_err();
        assert!(matches!(err, GitError::UnsupportedTransport { .. }));
        let err = repo.head().commit().await.unwrap_err();
        assert!(matches!(err, GitError::UnsupportedTransport { .. }));
    }
}
