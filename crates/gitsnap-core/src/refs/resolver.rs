//! Turning a selector into a commit id.

use tracing::debug;

use super::RefSelector;
use crate::error::{GitError, Result};
use crate::git::RefAdvertisement;
use crate::git::transport::ObjectFetcher;

const HEADS_PREFIX: &str = "refs/heads/";
const TAGS_PREFIX: &str = "refs/tags/";

/// Resolve `selector` against `adv`, fetching objects through `fetcher`
/// only for commits and unadvertised tags.
pub(crate) async fn resolve<F: ObjectFetcher>(
    adv: &RefAdvertisement,
    selector: &RefSelector,
    fetcher: &F,
) -> Result<String> {
    match selector {
        RefSelector::Head => adv
            .head_symref()
            .and_then(|target| adv.get(target))
            .or_else(|| adv.head())
            .map(str::to_string)
            .ok_or_else(|| GitError::ref_not_found("HEAD")),
        RefSelector::Branch(name) => lookup(adv, &format!("{}{}", HEADS_PREFIX, name)),
        RefSelector::Ref(spec) => lookup(adv, spec),
        RefSelector::Tag(name) => {
            if let Some(commit) = adv.get(&format!("{}{}", TAGS_PREFIX, name)) {
                return Ok(commit.to_string());
            }
            if name.starts_with('-') {
                return Err(GitError::RefNotFound {
                    refname: format!("{}{}", TAGS_PREFIX, name),
                    message: Some("not a valid commit-ish".to_string()),
                });
            }
            debug!(tag = %name, "tag not advertised, fetching as commit-ish");
            fetcher.fetch_object(name).await.map_err(|e| match e {
                GitError::RefNotFound { message, .. } => GitError::RefNotFound {
                    refname: format!("{}{}", TAGS_PREFIX, name),
                    message,
                },
                other => other,
            })
        }
        RefSelector::Commit(sha) => {
            let sha = validate_commit_id(sha)?;
            fetcher.fetch_object(sha).await
        }
    }
}

fn lookup(adv: &RefAdvertisement, refname: &str) -> Result<String> {
    adv.get(refname)
        .map(str::to_string)
        .ok_or_else(|| GitError::ref_not_found(refname))
}

/// A commit selector takes a full object id as git prints it: 40 (SHA-1)
/// or 64 (SHA-256) lowercase hex digits. Abbreviations and other spellings
/// are rejected before touching the network, so the resolved commit is
/// always the input itself.
fn validate_commit_id(sha: &str) -> Result<&str> {
    let canonical = matches!(sha.len(), 40 | 64)
        && sha.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !canonical {
        return Err(GitError::RefNotFound {
            refname: sha.to_string(),
            message: Some("not a full commit id".to_string()),
        });
    }
    Ok(sha)
}
