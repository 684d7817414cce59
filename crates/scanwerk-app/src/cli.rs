// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scanwerk_core::types::{ScanMode, ScanOptions, ScanType};

#[derive(Debug, Parser)]
#[command(author, version, about = "Headless scanner front-end", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the per-user default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in simulated scanners instead of SANE.
    #[arg(long = "virtual", global = true)]
    pub use_virtual: bool,

    /// Sheets loaded into the simulated document feeder (with `--virtual`).
    #[arg(long, global = true, default_value_t = 3)]
    pub pages: u32,

    /// Simulate a scanner that delivers colour as separate red, green and
    /// blue passes (with `--virtual`).
    #[arg(long, global = true)]
    pub three_pass: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List detected scanners, best candidates first
    Devices,
    /// Scan one document and write its pages as PNG
    Scan(ScanArgs),
    /// Show the effective configuration, optionally updating it
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Backend device name (see `scanwerk devices`).  Defaults to the
    /// configured device, then the best-ranked detected one.
    #[arg(short, long)]
    pub device: Option<String>,

    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Resolution in dots per inch.
    #[arg(long)]
    pub dpi: Option<f64>,

    /// Bits per sample; 0 keeps the device default.
    #[arg(long)]
    pub depth: Option<u32>,

    #[arg(short = 't', long = "type", value_enum)]
    pub scan_type: Option<TypeArg>,

    /// Paper width in millimetres.
    #[arg(long)]
    pub paper_width: Option<f64>,

    /// Paper height in millimetres.
    #[arg(long)]
    pub paper_height: Option<f64>,

    /// Directory the pages are written to.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl ScanArgs {
    /// Overlay the flags that were given onto `options`.
    pub fn apply(&self, options: &mut ScanOptions) {
        if let Some(mode) = self.mode {
            options.mode = mode.into();
        }
        if let Some(dpi) = self.dpi {
            options.dpi = dpi;
        }
        if let Some(depth) = self.depth {
            options.depth = depth;
        }
        if let Some(scan_type) = self.scan_type {
            options.scan_type = scan_type.into();
        }
        if let Some(width) = self.paper_width {
            options.paper_width = width;
        }
        if let Some(height) = self.paper_height {
            options.paper_height = height;
        }
    }
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Remember this device as the default scanner.
    #[arg(long)]
    pub default_device: Option<String>,

    /// Remember this directory as the default output location.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// File name prefix for written pages.
    #[arg(long)]
    pub file_prefix: Option<String>,
}

impl ConfigArgs {
    pub fn has_changes(&self) -> bool {
        self.default_device.is_some() || self.output_dir.is_some() || self.file_prefix.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Whatever the device defaults to
    Default,
    Color,
    Gray,
    Lineart,
}

impl From<ModeArg> for ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Default => ScanMode::Default,
            ModeArg::Color => ScanMode::Color,
            ModeArg::Gray => ScanMode::Gray,
            ModeArg::Lineart => ScanMode::Lineart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Single,
    AdfFront,
    AdfBack,
    AdfDuplex,
}

impl From<TypeArg> for ScanType {
    fn from(scan_type: TypeArg) -> Self {
        match scan_type {
            TypeArg::Single => ScanType::Single,
            TypeArg::AdfFront => ScanType::AdfFront,
            TypeArg::AdfBack => ScanType::AdfBack,
            TypeArg::AdfDuplex => ScanType::AdfDuplex,
        }
    }
}
