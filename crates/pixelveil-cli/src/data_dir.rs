// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution and the files kept inside it.

use std::path::{Path, PathBuf};

use pixelveil_core::PipelineConfig;
use pixelveil_core::error::Result;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const AUDIT_DB: &str = "audit.db";
pub const IDENTITY_FILE: &str = "identity.age";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = resolve_base(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
    .join("pixelveil");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(path = %dir.display(), error = %e, "cannot create data directory");
    }
    dir
}

fn resolve_base(xdg_data_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(xdg) = xdg_data_home.filter(|p| !p.as_os_str().is_empty()) {
        return xdg;
    }
    if let Some(home) = home {
        return home.join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}

/// Load config from `explicit`, else from the data directory, else defaults.
///
/// An explicit path must exist and parse.  The data-directory file is
/// optional.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return PipelineConfig::load(path);
    }
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        debug!("no config file, using defaults");
        return Ok(PipelineConfig::default());
    }
    PipelineConfig::load(&path)
}
