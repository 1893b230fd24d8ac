//! Configuration schema.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Username paired with a token for hosts without an explicit override.
pub const DEFAULT_TOKEN_USERNAME: &str = "x-access-token";

/// Settings that control how git is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Git executable to run
    pub git_binary: String,
    /// Per-process deadline for git invocations, in seconds
    pub timeout_secs: u64,
    /// Ignore the user's global and system git configuration
    pub isolate_user_config: bool,
    /// Username used for token auth when no provider override matches
    pub default_token_username: String,
    /// Parent directory for temporary checkouts (system temp dir if unset)
    pub checkout_root: Option<PathBuf>,
    /// Per-host overrides, keyed by lowercase hostname
    pub providers: HashMap<String, ProviderConfig>,
}

/// Per-host provider conventions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Username paired with a token for this host
    pub token_username: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            git_binary: "git".to_string(),
            timeout_secs: 300,
            isolate_user_config: true,
            default_token_username: DEFAULT_TOKEN_USERNAME.to_string(),
            checkout_root: None,
            providers: HashMap::new(),
        }
    }
}

impl GitConfig {
    /// Deadline applied to each git process.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Username to pair with a token when talking to `host`.
    ///
    /// Explicit provider entries win, then the well-known conventions of
    /// the large hosting providers, then `default_token_username`.
    pub fn token_username(&self, host: &str) -> &str {
        let host = host.to_ascii_lowercase();
        if let Some(username) = self
            .providers
            .get(&host)
            .and_then(|p| p.token_username.as_deref())
        {
            return username;
        }
        match host.as_str() {
            "bitbucket.org" => "x-token-auth",
            h if h == "gitlab.com" || h.starts_with("gitlab.") => "oauth2",
            "github.com" => DEFAULT_TOKEN_USERNAME,
            _ => &self.default_token_username,
        }
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.git_binary.trim().is_empty() {
            anyhow::bail!("git_binary must not be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.default_token_username.is_empty() {
            anyhow::bail!("default_token_username must not be empty");
        }
        for (host, provider) in &self.providers {
            if host.chars().any(|c| c.is_ascii_uppercase()) {
                anyhow::bail!("provider host '{}' must be lowercase", host);
            }
            if let Some(username) = &provider.token_username
                && username.is_empty()
            {
                return Err(anyhow::anyhow!("token_username is empty"))
                    .with_context(|| format!("Invalid provider configuration: '{}'", host));
            }
        }
        Ok(())
    }
}
