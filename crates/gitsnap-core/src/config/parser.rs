//! TOML parser with helpful error messages

use std::path::Path;

use anyhow::{Context, Result};

use super::paths::default_config_path;
use super::schema::GitConfig;

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the default config file is
/// used when present and [`GitConfig::default`] otherwise.
pub fn load_config(path: Option<&Path>) -> Result<GitConfig> {
    if let Some(path) = path {
        return parse_config_file(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => parse_config_file(&path),
        _ => Ok(GitConfig::default()),
    }
}

fn parse_config_file(path: &Path) -> Result<GitConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse configuration content from a string
pub fn parse_config_str(content: &str) -> Result<GitConfig> {
    let config: GitConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message().to_string();

    match error.span() {
        Some(span) => {
            let line_num = content[..span.start.min(content.len())]
                .matches('\n')
                .count()
                + 1;
            anyhow::anyhow!(
                "TOML parsing error at line {}:\n{}\n\nError: {}",
                line_num,
                get_line_context(content, line_num),
                message
            )
        }
        None => anyhow::anyhow!("TOML parsing error: {}", message),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &GitConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}
