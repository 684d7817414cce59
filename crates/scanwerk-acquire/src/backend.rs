// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic scanner backend abstraction.
//
// Mirrors the shape of the SANE API: a backend lists devices and opens them;
// an open device exposes an indexed list of typed option descriptors, each
// with an optional range, word-list or string-list constraint, and produces
// frames through start / parameters / read.  Closing a device is dropping
// its handle.
//
// Handles are only ever used from the scan worker thread, so they need to be
// `Send` but not `Sync`.

use std::sync::Arc;

use scanwerk_core::status::ScanStatus;
use scanwerk_core::types::{Credentials, FrameFormat};

/// Result of a backend call.
pub type BackendResult<T> = std::result::Result<T, ScanStatus>;

/// A device as reported by the backend, before labelling and ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
    pub name: String,
    pub vendor: String,
    pub model: String,
    /// Device type as reported, e.g. "flatbed scanner".
    pub kind: String,
}

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    /// Fixed-point number, carried as `f64`.
    Fixed,
    String,
    Button,
    /// Structural grouping entry with no value.
    Group,
}

/// Restriction on the values an option accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionConstraint {
    None,
    /// Inclusive range; `quant` is the step size (0 means continuous).
    Range { min: f64, max: f64, quant: f64 },
    /// Discrete numeric values.
    WordList(Vec<f64>),
    /// Discrete string values.
    StringList(Vec<String>),
}

/// Capability flags of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionCaps {
    /// Settable by software.
    pub soft_select: bool,
    /// Currently not applicable (depends on other options).
    pub inactive: bool,
    /// The device can pick a value on its own.
    pub automatic: bool,
}

/// Descriptor of one device option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    /// Stable machine name (e.g. `resolution`).  Empty for anonymous entries.
    pub name: String,
    pub title: String,
    pub kind: OptionKind,
    /// Maximum byte length for string values, including the terminator.
    pub size: usize,
    pub caps: OptionCaps,
    pub constraint: OptionConstraint,
}

impl OptionDescriptor {
    pub fn is_active(&self) -> bool {
        !self.caps.inactive
    }
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Fixed(f64),
    String(String),
}

impl OptionValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(f64::from(*v)),
            Self::Fixed(v) => Some(*v),
            Self::Bool(_) | Self::String(_) => None,
        }
    }
}

/// Geometry and format of the frame about to be read.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParameters {
    pub format: FrameFormat,
    /// Whether this is the final frame of the page (false for the first two
    /// passes of a three-pass colour scan).
    pub last_frame: bool,
    pub bytes_per_line: usize,
    pub pixels_per_line: u32,
    /// Number of lines, `None` when unknown ahead of time.
    pub lines: Option<u32>,
    pub depth: u32,
}

/// Supplies credentials when a backend needs them mid-operation.
///
/// Called synchronously on the scan worker thread; implementations may block.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, resource: &str) -> Credentials;
}

/// Entry point of a scanner backend.
pub trait ScanBackend: Send {
    /// Initialise the backend.  Returns a version string for logging.
    fn init(&mut self, authenticator: Arc<dyn Authenticator>) -> BackendResult<String>;

    /// List currently attached devices.
    fn devices(&mut self) -> BackendResult<Vec<RawDevice>>;

    /// Open a device by backend name.
    fn open(&mut self, name: &str) -> BackendResult<Box<dyn ScanDevice>>;

    /// Release backend resources.  No device handles are open when called.
    fn exit(&mut self) {}
}

impl<B: ScanBackend + ?Sized> ScanBackend for Box<B> {
    fn init(&mut self, authenticator: Arc<dyn Authenticator>) -> BackendResult<String> {
        (**self).init(authenticator)
    }

    fn devices(&mut self) -> BackendResult<Vec<RawDevice>> {
        (**self).devices()
    }

    fn open(&mut self, name: &str) -> BackendResult<Box<dyn ScanDevice>> {
        (**self).open(name)
    }

    fn exit(&mut self) {
        (**self).exit()
    }
}

/// An open device handle.  Dropping it closes the device.
pub trait ScanDevice: Send {
    /// Descriptor at `index`, or `None` past the last option.
    fn option_descriptor(&self, index: usize) -> Option<OptionDescriptor>;

    /// Set an option and return the value the device actually applied.
    fn set_option(&mut self, index: usize, value: OptionValue) -> BackendResult<OptionValue>;

    /// Let the device choose the option value itself.
    fn set_option_auto(&mut self, index: usize) -> BackendResult<()>;

    /// Begin acquiring the next frame.  `Err(NoDocs)` means the feeder is empty.
    fn start(&mut self) -> BackendResult<()>;

    /// Parameters of the frame started by the last `start`.
    fn parameters(&self) -> BackendResult<FrameParameters>;

    /// Read up to `buf.len()` bytes.  `Err(Eof)` marks the end of the frame.
    fn read(&mut self, buf: &mut [u8]) -> BackendResult<usize>;

    /// Abort any acquisition in progress and return the device to idle.
    fn cancel(&mut self);
}
