//! Config path resolution helpers.

use std::path::PathBuf;

/// Location of the user-level config file, if a config dir exists.
///
/// `<config_dir>/gitsnap/config.toml`, e.g. `~/.config/gitsnap/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gitsnap").join("config.toml"))
}
