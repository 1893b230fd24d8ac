//! Authentication for a single fetch attempt.
//!
//! [`authenticate`] turns an [`AuthConfig`] into [`TransportCredentials`]:
//! environment and git config entries applied to the git processes of
//! one resolution, then dropped. Secrets are revealed here and nowhere
//! else.

mod secret;
mod ssh;

use std::fmt;

use tracing::debug;

pub use secret::{Secret, SecretProvider};
pub use ssh::SocketHandle;

use crate::config::GitConfig;
use crate::error::{GitError, Result};
use crate::git::location::{RepositoryLocation, Scheme};
use ssh::KnownHostsFile;

const TOKEN_ENV: &str = "GITSNAP_AUTH_TOKEN";
const USERNAME_ENV: &str = "GITSNAP_AUTH_USERNAME";

/// Credential helper reading the username and token from the child's
/// environment so the token never appears on a command line.
const TOKEN_HELPER: &str = "!f() { test \"$1\" = get || exit 0; echo \"username=${GITSNAP_AUTH_USERNAME}\"; echo \"password=${GITSNAP_AUTH_TOKEN}\"; }; f";

/// How to authenticate against a repository. At most one mechanism.
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// Anonymous access.
    #[default]
    None,
    /// Bearer token, sent as the password half of basic auth.
    Token(Secret),
    /// Raw `Authorization` header value, e.g. `Basic ...` or `Bearer ...`.
    Header(Secret),
    /// SSH agent plus the host keys the remote must present.
    SshAgent {
        socket: SocketHandle,
        known_hosts: String,
    },
}

impl AuthConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::Token(_) => "token",
            AuthConfig::Header(_) => "header",
            AuthConfig::SshAgent { .. } => "ssh-agent",
        }
    }
}

/// Transport-level credentials for one resolution.
#[derive(Default)]
pub struct TransportCredentials {
    pub(crate) env: Vec<(String, String)>,
    pub(crate) git_config: Vec<(String, String)>,
    _known_hosts: Option<KnownHostsFile>,
}

impl TransportCredentials {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.env.is_empty() && self.git_config.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_parts(env: Vec<(String, String)>, git_config: Vec<(String, String)>) -> Self {
        Self {
            env,
            git_config,
            _known_hosts: None,
        }
    }
}

impl fmt::Debug for TransportCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        let config_keys: Vec<&str> = self.git_config.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("TransportCredentials")
            .field("env", &env_keys)
            .field("git_config", &config_keys)
            .finish()
    }
}

/// Resolve `auth` into credentials usable against `location`.
///
/// SSH locations without an agent socket fail immediately with
/// [`GitError::UnsupportedTransport`], before any network attempt.
pub async fn authenticate(
    location: &RepositoryLocation,
    auth: &AuthConfig,
    config: &GitConfig,
) -> Result<TransportCredentials> {
    let remote = match location {
        RepositoryLocation::Local(_) => return Ok(TransportCredentials::none()),
        RepositoryLocation::Remote(remote) => remote,
    };
    let url = remote.display_url();

    if remote.is_ssh() {
        let AuthConfig::SshAgent {
            socket,
            known_hosts,
        } = auth
        else {
            return Err(GitError::UnsupportedTransport { url });
        };

        socket.probe(&url).await?;
        let known_hosts = KnownHostsFile::write(known_hosts)?;
        debug!(url = %url, socket = %socket.path().display(), "using SSH agent");

        let env = vec![
            (
                "SSH_AUTH_SOCK".to_string(),
                socket.path().display().to_string(),
            ),
            (
                "GIT_SSH_COMMAND".to_string(),
                ssh::ssh_command(known_hosts.path(), config.isolate_user_config),
            ),
        ];
        return Ok(TransportCredentials {
            env,
            git_config: Vec::new(),
            _known_hosts: Some(known_hosts),
        });
    }

    let is_http = matches!(remote.scheme(), Scheme::Https | Scheme::Http);
    match auth {
        AuthConfig::None => Ok(TransportCredentials::none()),
        AuthConfig::SshAgent { .. } => {
            debug!(url = %url, "SSH agent configured for a non-SSH location, ignoring");
            Ok(TransportCredentials::none())
        }
        AuthConfig::Token(_) | AuthConfig::Header(_) if !is_http => {
            debug!(url = %url, kind = auth.kind(), "credentials do not apply to this transport");
            Ok(TransportCredentials::none())
        }
        AuthConfig::Token(secret) => {
            let token = secret.reveal()?;
            let username = config.token_username(&remote.host()).to_string();
            debug!(url = %url, secret = secret.name(), username = %username, "using token auth");
            Ok(TransportCredentials {
                env: vec![
                    (USERNAME_ENV.to_string(), username),
                    (TOKEN_ENV.to_string(), token),
                ],
                git_config: vec![
                    // An empty value clears helpers inherited from other config.
                    ("credential.helper".to_string(), String::new()),
                    ("credential.helper".to_string(), TOKEN_HELPER.to_string()),
                ],
                _known_hosts: None,
            })
        }
        AuthConfig::Header(secret) => {
            let header = secret.reveal()?;
            debug!(url = %url, secret = secret.name(), "using header auth");
            Ok(TransportCredentials {
                env: Vec::new(),
                git_config: vec![(
                    "http.extraHeader".to_string(),
                    format!("Authorization: {}", header),
                )],
                _known_hosts: None,
            })
        }
    }
}
