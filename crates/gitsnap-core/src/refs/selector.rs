use std::fmt;

use serde::{Deserialize, Serialize};

/// Which commit of a repository to resolve.
///
/// A selector holds no resolved value; see [`crate::ResolvedRef`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum RefSelector {
    /// The commit the repository's HEAD points at.
    Head,
    /// `refs/heads/<name>`.
    Branch(String),
    /// `refs/tags/<name>`, falling back to `<name>` as a raw commit-ish.
    Tag(String),
    /// A commit id, always fetched directly.
    Commit(String),
    /// Any fully-qualified ref, e.g. `refs/pull/1/head`.
    Ref(String),
}

impl RefSelector {
    pub fn kind(&self) -> &'static str {
        match self {
            RefSelector::Head => "head",
            RefSelector::Branch(_) => "branch",
            RefSelector::Tag(_) => "tag",
            RefSelector::Commit(_) => "commit",
            RefSelector::Ref(_) => "ref",
        }
    }

    /// The name carried by the selector, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            RefSelector::Head => None,
            RefSelector::Branch(name)
            | RefSelector::Tag(name)
            | RefSelector::Commit(name)
            | RefSelector::Ref(name) => Some(name),
        }
    }
}

impl fmt::Display for RefSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}:{}", self.kind(), name),
            None => f.write_str(self.kind()),
        }
    }
}
