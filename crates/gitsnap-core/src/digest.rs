//! Stable fingerprints for resolved repository states.
//!
//! A digest depends only on the normalized repository identity, the
//! resolved commit and the effective tree options. Credentials, service
//! host substitution, timing and the process performing the resolution
//! never feed into it, so independent clients resolving the same state
//! agree on the value.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::checkout::TreeOptions;

const DOMAIN: &str = "gitsnap.digest.v1";

/// A 32-byte blake3 fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Fingerprint `(identity, commit, options)`.
    ///
    /// Fields are length-prefixed so no two distinct inputs can collide
    /// by concatenation.
    pub fn compute(identity: &str, commit: &str, options: TreeOptions) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN.as_bytes());
        for field in [identity, commit] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(&[u8::from(options.discard_git_dir)]);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
