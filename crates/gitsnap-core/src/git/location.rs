//! Repository location parsing and normalization.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{GitError, Result};

/// Transport scheme of a remote location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Https,
    Http,
    Ssh,
    Git,
    File,
}

impl Scheme {
    fn from_url_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "https" => Some(Scheme::Https),
            "http" => Some(Scheme::Http),
            "ssh" | "git+ssh" | "ssh+git" => Some(Scheme::Ssh),
            "git" => Some(Scheme::Git),
            "file" => Some(Scheme::File),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
            Scheme::Ssh => "ssh",
            Scheme::Git => "git",
            Scheme::File => "file",
        }
    }
}

/// A remote repository endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteUrl {
    scheme: Scheme,
    url: Url,
    /// Path exactly as written in `user@host:path` form.
    scp_path: Option<String>,
}

impl RemoteUrl {
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Lowercase hostname, empty for `file://` URLs.
    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or("").to_ascii_lowercase()
    }

    pub fn is_ssh(&self) -> bool {
        self.scheme == Scheme::Ssh
    }

    /// The URL handed to git, optionally with its host swapped for a
    /// service endpoint.
    pub fn transport_url(&self, service_host: Option<&ServiceHost>) -> String {
        let mut url = self.url.clone();
        if let Some(service) = service_host
            && url.set_host(Some(&service.hostname)).is_err()
        {
            tracing::warn!(
                hostname = %service.hostname,
                "service host is not a valid hostname, using the original host"
            );
        }

        match &self.scp_path {
            Some(path) => {
                let host = url.host_str().unwrap_or_default();
                if url.username().is_empty() {
                    format!("{}:{}", host, path)
                } else {
                    format!("{}@{}:{}", url.username(), host, path)
                }
            }
            None => url.to_string(),
        }
    }

    /// The location without any embedded password, for messages and origin.
    pub fn display_url(&self) -> String {
        let mut url = self.url.clone();
        let _ = url.set_password(None);
        match &self.scp_path {
            Some(path) => {
                let host = url.host_str().unwrap_or_default();
                if url.username().is_empty() {
                    format!("{}:{}", host, path)
                } else {
                    format!("{}@{}:{}", url.username(), host, path)
                }
            }
            None => url.to_string(),
        }
    }

    fn identity(&self) -> String {
        let mut out = format!("{}://", self.scheme.as_str());
        if self.scheme == Scheme::Ssh && !self.url.username().is_empty() {
            out.push_str(self.url.username());
            out.push('@');
        }
        out.push_str(&self.host());
        match (self.scheme, self.url.port()) {
            (Scheme::Ssh, Some(22)) | (_, None) => {}
            (_, Some(port)) => out.push_str(&format!(":{}", port)),
        }
        let path = match &self.scp_path {
            Some(path) => format!("/{}", path.trim_start_matches('/')),
            None => self.url.path().to_string(),
        };
        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        out.push_str(path);
        out
    }
}

/// A hostname that stands in for the host portion of a remote location
/// when connecting, e.g. a sandboxed service reachable under another name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHost {
    hostname: String,
}

impl ServiceHost {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

/// Where a repository lives.
///
/// Immutable once parsed; see [`RepositoryLocation::parse`] for accepted forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepositoryLocation {
    /// Reached through a git transport (https, ssh, git, file URLs).
    Remote(RemoteUrl),
    /// A directory on the local filesystem.
    Local(PathBuf),
}

impl RepositoryLocation {
    /// Parse a location string.
    ///
    /// Supports formats:
    /// - `https://github.com/org/repo` (also `http://`, `git://`, `file://`)
    /// - `ssh://git@github.com/org/repo.git`
    /// - `git@github.com:org/repo.git`
    /// - `github.com/org/repo` (implicit https)
    /// - `/path/to/repo`, `./repo`, `~/repo`
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(invalid(input, "location is empty"));
        }

        if raw.contains("://") {
            return Self::parse_url(raw);
        }

        if let Some(remote) = Self::parse_scp(raw)? {
            return Ok(RepositoryLocation::Remote(remote));
        }

        if Self::looks_like_path(raw) {
            return Ok(Self::local(expand_home(raw)));
        }

        if Self::looks_like_shorthand(raw) {
            return Self::parse_url(&format!("https://{}", raw));
        }

        Ok(Self::local(PathBuf::from(raw)))
    }

    /// A local path location. Relative paths are made absolute.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let absolute = std::path::absolute(&path).unwrap_or(path);
        RepositoryLocation::Local(absolute)
    }

    fn parse_url(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| invalid(raw, &e.to_string()))?;
        let scheme = Scheme::from_url_scheme(url.scheme())
            .ok_or_else(|| invalid(raw, &format!("unsupported scheme '{}'", url.scheme())))?;
        if scheme != Scheme::File && url.host_str().is_none_or(str::is_empty) {
            return Err(invalid(raw, "missing host"));
        }
        Ok(RepositoryLocation::Remote(RemoteUrl {
            scheme,
            url,
            scp_path: None,
        }))
    }

    /// `[user@]host:path`, as long as no `/` precedes the colon.
    fn parse_scp(raw: &str) -> Result<Option<RemoteUrl>> {
        let Some((authority, path)) = raw.split_once(':') else {
            return Ok(None);
        };
        if authority.contains('/') || authority.starts_with('.') || path.is_empty() {
            return Ok(None);
        }
        // Windows drive letters such as `C:\repo`.
        if authority.len() == 1 {
            return Ok(None);
        }

        let (user, host) = match authority.rsplit_once('@') {
            Some((user, host)) => (Some(user), host),
            None => (None, authority),
        };
        if host.is_empty() {
            return Err(invalid(raw, "missing host"));
        }

        let mut url = Url::parse(&format!("ssh://{}/", host)).map_err(|e| invalid(raw, &e.to_string()))?;
        if let Some(user) = user {
            url.set_username(user)
                .map_err(|_| invalid(raw, "invalid user name"))?;
        }
        Ok(Some(RemoteUrl {
            scheme: Scheme::Ssh,
            url,
            scp_path: Some(path.to_string()),
        }))
    }

    fn looks_like_path(raw: &str) -> bool {
        raw == "."
            || raw == ".."
            || raw.starts_with('/')
            || raw.starts_with("./")
            || raw.starts_with("../")
            || raw.starts_with('~')
            || Path::new(raw).is_absolute()
    }

    /// `host.tld/org/repo` where the host segment has a dot and nothing
    /// by that name exists locally.
    fn looks_like_shorthand(raw: &str) -> bool {
        let segments: Vec<&str> = raw.split('/').collect();
        segments.len() >= 3
            && segments[0].contains('.')
            && !segments[0].starts_with('.')
            && segments[1..].iter().all(|s| !s.is_empty())
            && !Path::new(raw).exists()
    }

    pub fn as_remote(&self) -> Option<&RemoteUrl> {
        match self {
            RepositoryLocation::Remote(remote) => Some(remote),
            RepositoryLocation::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            RepositoryLocation::Local(path) => Some(path),
            RepositoryLocation::Remote(_) => None,
        }
    }

    pub fn is_ssh(&self) -> bool {
        self.as_remote().is_some_and(RemoteUrl::is_ssh)
    }

    /// Normalized identity used for fingerprints and equality of resolved
    /// refs. Contains no credentials.
    pub fn identity(&self) -> String {
        match self {
            RepositoryLocation::Remote(remote) => remote.identity(),
            RepositoryLocation::Local(path) => {
                let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                format!("file://{}", path.display())
            }
        }
    }

    /// Human-readable location without credentials.
    pub fn display_url(&self) -> String {
        match self {
            RepositoryLocation::Remote(remote) => remote.display_url(),
            RepositoryLocation::Local(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_url())
    }
}

impl std::str::FromStr for RepositoryLocation {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

fn invalid(input: &str, reason: &str) -> GitError {
    GitError::InvalidLocation {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
