//! gitsnap - resolve and check out git repository states
//!
//! Usage:
//!   gitsnap tags github.com/org/repo --pattern 'v*'
//!   gitsnap resolve https://github.com/org/repo --branch main
//!   gitsnap checkout ./repo --tag v1.0.0 ./out --discard-git-dir
//!   gitsnap cat git@github.com:org/repo.git README.md --ssh-auth-sock "$SSH_AUTH_SOCK"

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gitsnap_core::config::load_config;
use gitsnap_core::prelude::*;

#[derive(Parser)]
#[command(name = "gitsnap")]
#[command(about = "Resolve git refs into commits, snapshots and digests", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/gitsnap/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deadline for each git process, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tags, optionally filtered by patterns
    ///
    /// Pattern forms:
    /// - refs/tags/v*  matches top-level tags only
    /// - sdk/go/v*     matches tags in that namespace
    /// - v*            matches the last segment of any tag
    Tags {
        #[command(flatten)]
        repo: RepoArgs,

        /// Tag pattern (repeatable, any match selects the tag)
        #[arg(long = "pattern", short, value_name = "PATTERN")]
        patterns: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Resolve a ref to a commit and digest
    Resolve {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Compute the digest for a tree without .git
        #[arg(long)]
        discard_git_dir: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Check out a ref into a directory
    Checkout {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Destination directory (must be absent or empty)
        dest: PathBuf,

        /// Strip the .git directory after checkout
        #[arg(long)]
        discard_git_dir: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print a file from a ref
    Cat {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Path relative to the repository root
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct RepoArgs {
    /// Repository URL, host/org/repo shorthand, or local path
    location: String,

    /// Environment variable holding an access token
    #[arg(long, value_name = "VAR", group = "auth")]
    token_env: Option<String>,

    /// Environment variable holding an Authorization header value
    #[arg(long, value_name = "VAR", group = "auth")]
    header_env: Option<String>,

    /// SSH agent socket for ssh:// and user@host:path locations
    #[arg(long, value_name = "PATH", group = "auth", requires = "ssh_known_hosts")]
    ssh_auth_sock: Option<PathBuf>,

    /// known_hosts file the SSH server key must appear in
    #[arg(long, value_name = "FILE")]
    ssh_known_hosts: Option<PathBuf>,

    /// Reach the repository through this host instead
    #[arg(long, value_name = "HOST")]
    service_host: Option<String>,
}

#[derive(Args)]
#[group(multiple = false)]
struct SelectorArgs {
    /// Branch name
    #[arg(long)]
    branch: Option<String>,

    /// Tag name, or a commit-ish when no such tag exists
    #[arg(long)]
    tag: Option<String>,

    /// Commit id
    #[arg(long)]
    commit: Option<String>,

    /// Fully-qualified ref, e.g. refs/pull/1/head
    #[arg(long = "ref", value_name = "REF")]
    reference: Option<String>,
}

impl SelectorArgs {
    fn selector(self) -> RefSelector {
        if let Some(name) = self.branch {
            RefSelector::Branch(name)
        } else if let Some(name) = self.tag {
            RefSelector::Tag(name)
        } else if let Some(sha) = self.commit {
            RefSelector::Commit(sha)
        } else if let Some(spec) = self.reference {
            RefSelector::Ref(spec)
        } else {
            RefSelector::Head
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }
    config.validate()?;
    tracing::debug!(
        git = %config.git_binary,
        timeout_secs = config.timeout_secs,
        isolate = config.isolate_user_config,
        "loaded configuration"
    );

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let session = Session { config, cancel };
    run(session, cli.command).await
}

struct Session {
    config: GitConfig,
    cancel: CancelToken,
}

impl Session {
    fn repository(&self, args: &RepoArgs) -> Result<Repository> {
        let mut repo = Repository::parse(&args.location)?
            .with_config(self.config.clone())
            .with_cancellation(self.cancel.clone());

        if let Some(var) = &args.token_env {
            repo = repo.with_auth_token(Secret::from_env(var));
        } else if let Some(var) = &args.header_env {
            repo = repo.with_auth_header(Secret::from_env(var));
        } else if let Some(sock) = &args.ssh_auth_sock {
            let known_hosts = match &args.ssh_known_hosts {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read known hosts: {}", path.display()))?,
                None => String::new(),
            };
            repo = repo.with_ssh_auth(SocketHandle::new(sock), known_hosts);
        }

        if let Some(host) = &args.service_host {
            repo = repo.with_service_host(ServiceHost::new(host));
        }
        Ok(repo)
    }
}

async fn run(session: Session, command: Commands) -> Result<()> {
    match command {
        Commands::Tags {
            repo,
            patterns,
            format,
        } => {
            let tags = session.repository(&repo)?.tags(&patterns).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tags)?),
                OutputFormat::Table => {
                    for tag in &tags {
                        println!("{tag}");
                    }
                }
            }
        }
        Commands::Resolve {
            repo,
            selector,
            discard_git_dir,
            format,
        } => {
            let options = TreeOptions { discard_git_dir };
            let resolved = session
                .repository(&repo)?
                .selector(selector.selector())
                .resolve()
                .await?;
            let digest = resolved.digest(options);
            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "identity": resolved.identity(),
                        "selector": resolved.selector(),
                        "commit": resolved.commit(),
                        "digest": digest,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Table => {
                    println!("Repository: {}", resolved.identity());
                    println!("Selector:   {}", resolved.selector());
                    println!("Commit:     {}", resolved.commit());
                    println!("Digest:     {digest}");
                }
            }
        }
        Commands::Checkout {
            repo,
            selector,
            dest,
            discard_git_dir,
            format,
        } => {
            let options = TreeOptions { discard_git_dir };
            let tree = session
                .repository(&repo)?
                .selector(selector.selector())
                .checkout(&dest, options)
                .await?;
            let content_hash = tree.content_hash()?;
            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "path": tree.path(),
                        "commit": tree.commit(),
                        "digest": tree.digest(),
                        "contentHash": content_hash,
                        "gitDir": tree.has_git_dir(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Table => {
                    println!("✓ Checked out {} into {}", tree.commit(), tree.path().display());
                    println!("  Digest:       {}", tree.digest());
                    println!("  Content hash: {content_hash}");
                    if !tree.has_git_dir() {
                        println!("  (.git discarded)");
                    }
                }
            }
        }
        Commands::Cat {
            repo,
            selector,
            path,
        } => {
            let tree = session
                .repository(&repo)?
                .selector(selector.selector())
                .tree(TreeOptions::discard_git_dir())
                .await?;
            let bytes = tree.read_file(&path)?;
            std::io::stdout()
                .write_all(&bytes)
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
