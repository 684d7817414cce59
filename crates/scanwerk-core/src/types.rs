// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk acquisition engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scanner reported by the backend.
///
/// Rebuilt on every redetect; the list order is derived from the name and
/// label, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Opaque backend name used to open the device (e.g. `genesys:libusb:001:004`).
    pub name: String,
    /// Human label shown in device pickers.
    pub label: String,
}

/// Colour mode requested for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanMode {
    /// Leave the device's mode untouched.
    Default,
    #[default]
    Color,
    Gray,
    Lineart,
}

/// Paper source for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanType {
    /// One page from the flatbed (or whatever the device picks automatically).
    #[default]
    Single,
    AdfFront,
    AdfBack,
    AdfDuplex,
}

impl ScanType {
    /// Whether the job keeps feeding pages until the backend reports no more
    /// documents.
    pub fn is_multi_page(&self) -> bool {
        !matches!(self, Self::Single)
    }
}

/// Scan policy for one job.
///
/// `dpi` is rewritten by the worker to the resolution the device actually
/// applied.  Paper dimensions are in millimetres; `0.0` leaves the page
/// unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub dpi: f64,
    pub mode: ScanMode,
    /// Bits per sample; `0` keeps the device default.
    pub depth: u32,
    pub scan_type: ScanType,
    pub paper_width: f64,
    pub paper_height: f64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            dpi: 300.0,
            mode: ScanMode::Color,
            depth: 8,
            scan_type: ScanType::Single,
            paper_width: 0.0,
            paper_height: 0.0,
        }
    }
}

/// Layout of the samples in one acquisition frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    Gray,
    /// Interleaved red, green, blue samples in a single pass.
    Rgb,
    /// Single-channel passes of a three-pass colour scan.
    Red,
    Green,
    Blue,
}

impl FrameFormat {
    /// Samples per pixel within this frame.
    pub fn samples_per_pixel(&self) -> u32 {
        match self {
            Self::Rgb => 3,
            _ => 1,
        }
    }

    /// Channels of the assembled page this frame contributes to.
    pub fn page_channels(&self) -> u32 {
        match self {
            Self::Gray => 1,
            _ => 3,
        }
    }

    /// Channel index within the assembled page (0 for gray and interleaved RGB).
    pub fn channel(&self) -> u32 {
        match self {
            Self::Gray | Self::Rgb | Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }
}

/// Page geometry handed to a page handler before any line data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPageInfo {
    /// Pixels per line.
    pub width: u32,
    /// Number of lines, or `None` when the device cannot tell in advance
    /// (hand-held scanners, some feeders).
    pub height: Option<u32>,
    pub depth: u32,
    pub n_channels: u32,
    pub dpi: f64,
    pub device: String,
}

/// One fully assembled row of samples.
///
/// Rows are numbered per frame.  A three-pass colour page delivers rows
/// 0..n three times, once per pass; `format` and `channel` say which colour
/// a row belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLine {
    /// Row index within the current frame (not the page), starting at 0.
    pub number: u32,
    /// Rows covered by `data`.
    pub n_lines: u32,
    pub width: u32,
    pub depth: u32,
    pub format: FrameFormat,
    pub channel: u32,
    /// Bytes per row.
    pub data_length: usize,
    pub data: Vec<u8>,
}

/// Username/password pair supplied in answer to an authorisation request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_single_is_single_page() {
        assert!(!ScanType::Single.is_multi_page());
        assert!(ScanType::AdfFront.is_multi_page());
        assert!(ScanType::AdfBack.is_multi_page());
        assert!(ScanType::AdfDuplex.is_multi_page());
    }

    #[test]
    fn three_pass_frames_map_to_rgb_channels() {
        assert_eq!(FrameFormat::Red.channel(), 0);
        assert_eq!(FrameFormat::Green.channel(), 1);
        assert_eq!(FrameFormat::Blue.channel(), 2);
        assert_eq!(FrameFormat::Blue.page_channels(), 3);
        assert_eq!(FrameFormat::Gray.page_channels(), 1);
        assert_eq!(FrameFormat::Rgb.samples_per_pixel(), 3);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("scan", "hunter2");
        let printed = format!("{creds:?}");
        assert!(printed.contains("scan"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn scan_options_survive_json() {
        let opts = ScanOptions {
            dpi: 150.0,
            mode: ScanMode::Lineart,
            depth: 1,
            scan_type: ScanType::AdfDuplex,
            paper_width: 210.0,
            paper_height: 297.0,
        };
        let json = serde_json::to_string(&opts).expect("serialize");
        let back: ScanOptions = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, opts);
    }
}
