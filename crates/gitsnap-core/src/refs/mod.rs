//! Ref selection: selectors, tag patterns and resolution.

pub mod pattern;
pub(crate) mod resolver;
mod selector;

pub use pattern::{filter_tags, matches};
pub use selector::RefSelector;
