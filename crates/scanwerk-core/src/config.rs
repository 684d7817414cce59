// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::ScanOptions;

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend name of the scanner used when none is given on the command line.
    pub default_device: Option<String>,
    /// Scan policy applied to new jobs.
    pub scan: ScanOptions,
    /// Where finished pages are written.  `None` means the current directory.
    pub output_dir: Option<PathBuf>,
    /// File name prefix for written pages.
    pub file_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_device: None,
            scan: ScanOptions::default(),
            output_dir: None,
            file_prefix: "scan".into(),
        }
    }
}
