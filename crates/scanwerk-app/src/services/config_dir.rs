// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-user configuration location and persistence.

use std::path::{Path, PathBuf};

use scanwerk_core::AppConfig;
use scanwerk_core::error::Result;
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "config.json";

/// Return the configuration directory (`$XDG_CONFIG_HOME/scanwerk`, falling
/// back to `~/.config/scanwerk`).
pub fn config_dir() -> PathBuf {
    dirs_fallback().join("scanwerk")
}

/// Default location of the config file.
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

fn dirs_fallback() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    PathBuf::from(".")
}

/// Load the config at `path`.  A missing or unreadable file yields defaults.
pub fn load_config(path: &Path) -> AppConfig {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no config file, using defaults");
            return AppConfig::default();
        }
    };
    match serde_json::from_str(&data) {
        Ok(config) => {
            info!(path = %path.display(), "config loaded");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
            AppConfig::default()
        }
    }
}

/// Write `config` to `path`, creating the parent directory if needed.
pub fn persist_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), "config saved");
    Ok(())
}
