//! Local repositories opened through libgit2.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, ObjectType, Repository, RepositoryOpenFlags};
use tracing::debug;

use super::advertisement::RefAdvertisement;
use crate::error::{GitError, Result};

/// How a local path holds a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoShape {
    /// Checked-out files plus a `.git` directory (or gitlink file).
    Worktree,
    /// A bare repository root.
    Bare,
    /// The path is itself a worktree's `.git` directory.
    GitDir,
}

/// A local repository whose shape has been detected.
#[derive(Debug, Clone)]
pub struct LocalRepo {
    path: PathBuf,
    git_dir: PathBuf,
    shape: RepoShape,
}

impl LocalRepo {
    /// Detect the repository at exactly `path`, without searching parents.
    pub fn detect(path: &Path) -> Result<Self> {
        let not_a_repo = || GitError::NotAGitRepository {
            path: path.to_path_buf(),
        };
        if !path.is_dir() {
            return Err(not_a_repo());
        }

        if path.join(".git").exists() {
            let repo = Repository::open_ext(
                path,
                RepositoryOpenFlags::NO_SEARCH,
                std::iter::empty::<&std::ffi::OsStr>(),
            )
            .map_err(|e| {
                debug!(path = %path.display(), error = %e.message(), "worktree open failed");
                not_a_repo()
            })?;
            return Ok(Self {
                path: path.to_path_buf(),
                git_dir: repo.path().to_path_buf(),
                shape: RepoShape::Worktree,
            });
        }

        if path.join("HEAD").is_file() && path.join("objects").is_dir() {
            let repo = Repository::open_bare(path).map_err(|e| {
                debug!(path = %path.display(), error = %e.message(), "bare open failed");
                not_a_repo()
            })?;
            let shape = if path.file_name().is_some_and(|name| name == ".git") {
                RepoShape::GitDir
            } else {
                RepoShape::Bare
            };
            return Ok(Self {
                path: path.to_path_buf(),
                git_dir: repo.path().to_path_buf(),
                shape,
            });
        }

        Err(not_a_repo())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn shape(&self) -> RepoShape {
        self.shape
    }

    fn open(&self) -> Result<Repository> {
        Repository::open_bare(&self.git_dir).map_err(|_| GitError::NotAGitRepository {
            path: self.path.clone(),
        })
    }

    /// Every ref in the repository, annotated tags peeled to commits.
    pub fn advertisement(&self) -> Result<RefAdvertisement> {
        let repo = self.open()?;
        let mut adv = RefAdvertisement::default();

        if let Ok(head) = repo.find_reference("HEAD") {
            if let Some(target) = head.symbolic_target() {
                adv.set_head_symref(target);
            }
            if let Ok(commit) = head.peel_to_commit() {
                adv.insert("HEAD", &commit.id().to_string());
            }
        }

        for reference in repo.references()? {
            let reference = reference?;
            let Some(name) = reference.name() else {
                continue;
            };
            let name = name.to_string();
            let Ok(resolved) = reference.resolve() else {
                debug!(refname = %name, "skipping dangling symbolic ref");
                continue;
            };
            let Some(target) = resolved.target() else {
                continue;
            };
            adv.insert(&name, &target.to_string());

            if let Ok(object) = resolved.peel(ObjectType::Commit)
                && object.id() != target
            {
                adv.insert_peeled(&name, &object.id().to_string());
            }
        }

        Ok(adv)
    }

    /// Look up any commit-ish, including commits reachable only by id.
    pub fn lookup_commit(&self, commitish: &str) -> Result<String> {
        let repo = self.open()?;
        let found = repo
            .revparse_single(commitish)
            .and_then(|object| object.peel_to_commit());
        match found {
            Ok(commit) => Ok(commit.id().to_string()),
            Err(e)
                if matches!(
                    e.code(),
                    ErrorCode::NotFound | ErrorCode::InvalidSpec | ErrorCode::Ambiguous
                ) || e.class() == git2::ErrorClass::Object =>
            {
                Err(GitError::RefNotFound {
                    refname: commitish.to_string(),
                    message: Some(e.message().to_string()),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Run libgit2 and filesystem work on the blocking pool.
///
/// Opening a repository and walking its refs touches the disk for every
/// loose ref, so it stays off the async worker threads.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        GitError::io("Local repository task failed", std::io::Error::other(e))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str) -> git2::Oid {
        let workdir = repo.workdir().expect("non-bare test repo");
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        let tree_id = index.write_tree().unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| vec![repo.find_commit(oid).unwrap()])
            .unwrap_or_default();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn detects_worktree_and_git_dir() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        commit_file(&repo, "README.md", "hello");

        let worktree = LocalRepo::detect(tmp.path()).unwrap();
        assert_eq!(worktree.shape(), RepoShape::Worktree);

        let git_dir = LocalRepo::detect(&tmp.path().join(".git")).unwrap();
        assert_eq!(git_dir.shape(), RepoShape::GitDir);
    }

    #[test]
    fn detects_bare() {
        let tmp = TempDir::new().unwrap();
        Repository::init_bare(tmp.path().join("repo.git")).unwrap();
        let bare = LocalRepo::detect(&tmp.path().join("repo.git")).unwrap();
        assert_eq!(bare.shape(), RepoShape::Bare);
    }

    #[test]
    fn empty_directory_is_not_a_repository() {
        let tmp = TempDir::new().unwrap();
        let err = LocalRepo::detect(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
    }

    #[test]
    fn nested_directory_does_not_search_parents() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        commit_file(&repo, "README.md", "hello");
        let nested = tmp.path().join("sub");
        std::fs::create_dir_all(&nested).unwrap();

        assert!(LocalRepo::detect(&nested).is_err());
    }

    #[test]
    fn advertisement_includes_head_branches_and_peeled_tags() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let first = commit_file(&repo, "a.txt", "a");
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        let object = repo.find_object(first, None).unwrap();
        repo.tag("v1.0.0", &object, &sig, "release", false).unwrap();
        repo.tag_lightweight("sdk/go/v1.0.0", &object, false).unwrap();
        let second = commit_file(&repo, "b.txt", "b");

        let local = LocalRepo::detect(tmp.path()).unwrap();
        let adv = local.advertisement().unwrap();

        let head = second.to_string();
        assert_eq!(adv.head(), Some(head.as_str()));
        assert!(adv.head_symref().unwrap().starts_with("refs/heads/"));
        assert_eq!(adv.get("refs/tags/v1.0.0"), Some(first.to_string().as_str()));
        let tags: Vec<&str> = adv.tag_names().collect();
        assert_eq!(tags, vec!["sdk/go/v1.0.0", "v1.0.0"]);
    }

    #[tokio::test]
    async fn blocking_work_keeps_its_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().to_path_buf();
        let err = run_blocking(move || LocalRepo::detect(&path)).await.unwrap_err();
        assert!(matches!(err, GitError::NotAGitRepository { .. }));
    }

    #[test]
    fn lookup_commit_by_id_and_missing() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let oid = commit_file(&repo, "a.txt", "a");
        let local = LocalRepo::detect(tmp.path()).unwrap();

        assert_eq!(local.lookup_commit(&oid.to_string()).unwrap(), oid.to_string());
        let err = local
            .lookup_commit("0123456789012345678901234567890123456789")
            .unwrap_err();
        assert!(matches!(err, GitError::RefNotFound { .. }));
    }
}
