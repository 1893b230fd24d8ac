//! Ref advertisements: the name → commit mapping a repository exposes.

use std::collections::BTreeMap;

const TAG_PREFIX: &str = "refs/tags/";
const PEELED_SUFFIX: &str = "^{}";

/// Refs exposed by a repository at the time it was opened.
///
/// Read-only after construction, so one advertisement can serve many
/// concurrent resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefAdvertisement {
    head_symref: Option<String>,
    refs: BTreeMap<String, String>,
    peeled: BTreeMap<String, String>,
}

impl RefAdvertisement {
    /// Parse `git ls-remote --symref` output.
    ///
    /// ```
    /// use gitsnap_core::git::RefAdvertisement;
    ///
    /// let adv = RefAdvertisement::parse_ls_remote(
    ///     "ref: refs/heads/main\tHEAD\n\
    ///      1111111111111111111111111111111111111111\tHEAD\n\
    ///      1111111111111111111111111111111111111111\trefs/heads/main\n",
    /// );
    /// assert_eq!(adv.head_symref(), Some("refs/heads/main"));
    /// assert_eq!(adv.head(), Some("1111111111111111111111111111111111111111"));
    /// ```
    pub fn parse_ls_remote(output: &str) -> Self {
        let mut adv = Self::default();
        for line in output.lines() {
            let Some((left, name)) = line.split_once('\t') else {
                continue;
            };
            let name = name.trim();
            if let Some(target) = left.strip_prefix("ref:") {
                if name == "HEAD" {
                    adv.head_symref = Some(target.trim().to_string());
                }
                continue;
            }
            let sha = left.trim();
            if sha.is_empty() || name.is_empty() {
                continue;
            }
            match name.strip_suffix(PEELED_SUFFIX) {
                Some(base) => adv.insert_peeled(base, sha),
                None => adv.insert(name, sha),
            }
        }
        adv
    }

    pub(crate) fn insert(&mut self, name: &str, sha: &str) {
        self.refs.insert(name.to_string(), sha.to_ascii_lowercase());
    }

    pub(crate) fn insert_peeled(&mut self, name: &str, sha: &str) {
        self.peeled.insert(name.to_string(), sha.to_ascii_lowercase());
    }

    pub(crate) fn set_head_symref(&mut self, target: &str) {
        self.head_symref = Some(target.to_string());
    }

    /// Branch HEAD points at, if the repository advertises it.
    pub fn head_symref(&self) -> Option<&str> {
        self.head_symref.as_deref()
    }

    /// Commit HEAD resolves to.
    pub fn head(&self) -> Option<&str> {
        self.get("HEAD")
            .or_else(|| self.head_symref.as_deref().and_then(|t| self.get(t)))
    }

    /// Commit a fully-qualified ref points at. Annotated tags yield the
    /// commit they peel to.
    pub fn get(&self, refname: &str) -> Option<&str> {
        self.peeled
            .get(refname)
            .or_else(|| self.refs.get(refname))
            .map(String::as_str)
    }

    /// Tag names without the `refs/tags/` prefix, sorted.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.refs
            .keys()
            .chain(self.peeled.keys())
            .filter_map(|name| name.strip_prefix(TAG_PREFIX))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
    }

    /// Every advertised ref with the commit it resolves to.
    pub fn refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.refs
            .keys()
            .filter_map(|name| self.get(name).map(|sha| (name.as_str(), sha)))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
