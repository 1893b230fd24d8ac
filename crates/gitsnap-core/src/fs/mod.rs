//! Filesystem helpers for checked-out trees.

pub mod tree_hash;

pub use tree_hash::hash_tree;
