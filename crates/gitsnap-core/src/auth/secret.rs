//! Opaque secret handles.

use std::fmt;
use std::sync::Arc;

use crate::error::{GitError, Result};

/// Source of a secret's plaintext, consulted only at transport time.
pub trait SecretProvider: Send + Sync {
    fn reveal(&self) -> anyhow::Result<String>;
}

/// A named secret whose value is never logged or fingerprinted.
#[derive(Clone)]
pub struct Secret {
    name: String,
    provider: Arc<dyn SecretProvider>,
}

impl Secret {
    pub fn new(name: impl Into<String>, provider: impl SecretProvider + 'static) -> Self {
        Self {
            name: name.into(),
            provider: Arc::new(provider),
        }
    }

    /// A secret held in memory.
    pub fn from_plaintext(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Plaintext(value.into()))
    }

    /// A secret read from an environment variable each time it is revealed.
    pub fn from_env(var: impl Into<String>) -> Self {
        let var = var.into();
        Self::new(var.clone(), EnvVar(var))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn reveal(&self) -> Result<String> {
        let value = self.provider.reveal().map_err(|e| GitError::Secret {
            name: self.name.clone(),
            message: e.to_string(),
        })?;
        Ok(value.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("value", &"***")
            .finish()
    }
}

struct Plaintext(String);

impl SecretProvider for Plaintext {
    fn reveal(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

struct EnvVar(String);

impl SecretProvider for EnvVar {
    fn reveal(&self) -> anyhow::Result<String> {
        std::env::var(&self.0)
            .map_err(|e| anyhow::anyhow!("environment variable {}: {}", self.0, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_shows_value() {
        let secret = Secret::from_plaintext("github_pat", "ghp_supersecret");
        let debug = format!("{:?}", secret);
        assert!(debug.contains("github_pat"));
        assert!(!debug.contains("ghp_supersecret"));
    }

    #[test]
    fn reveal_strips_trailing_newline() {
        let secret = Secret::from_plaintext("token", "abc\n");
        assert_eq!(secret.reveal().unwrap(), "abc");
    }

    #[test]
    fn missing_env_var_is_a_secret_error() {
        let secret = Secret::from_env("GITSNAP_TEST_DEFINITELY_UNSET_VAR");
        let err = secret.reveal().unwrap_err();
        assert!(matches!(err, GitError::Secret { .. }));
        assert!(err.to_string().contains("GITSNAP_TEST_DEFINITELY_UNSET_VAR"));
    }
}
