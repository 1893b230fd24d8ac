//! Configuration for git invocation and provider conventions.
//!
//! Configuration is optional: every field has a default, and a missing
//! default config file is not an error.

pub mod parser;
pub mod paths;
pub mod schema;

pub use parser::{load_config, parse_config_str, to_toml};
pub use paths::default_config_path;
pub use schema::{GitConfig, ProviderConfig};
