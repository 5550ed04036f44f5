//! Config CLI command.

use serde_json::{Value, json};

use crate::Result;
use crate::config::DiscoveryConfig;

/// `config --show`: the effective configuration, as TOML text and as the
/// resolved database path.
///
/// # Errors
///
/// Returns an error if the configuration cannot be rendered.
pub fn show_config(config: &DiscoveryConfig) -> Result<Value> {
    Ok(json!({
        "toml": config.to_toml()?,
        "sqlite_path": config.storage.sqlite_path().display().to_string(),
    }))
}
