//! Configuration file lookup for otter-bridge.toml.

use std::path::{Path, PathBuf};

use otter_bridge::BridgeConfig;

const CONFIG_NAMES: &[&str] = &["otter-bridge.toml", ".otter-bridge.toml"];

/// Load configuration from `path`, or from the nearest config file found by
/// walking up from the current directory. Defaults apply when there is none.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    if let Some(path) = path {
        return Ok(BridgeConfig::from_file(path)?);
    }

    match find_config_file() {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using config file");
            Ok(BridgeConfig::from_file(&path)?)
        }
        None => Ok(BridgeConfig::default()),
    }
}

fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_ancestors(&cwd)
}

fn find_config_in_ancestors(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }
    None
}
