// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Status codes reported by a scanner backend.
//
// The numeric values follow the SANE status table so that codes surfaced in
// failure notifications match what users see in backend logs.  Success is not
// a variant: backend calls return `Result<T, ScanStatus>` and `Ok` carries the
// good case.

use serde::{Deserialize, Serialize};

/// Non-success status reported by a scanner backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    Unsupported,
    Cancelled,
    DeviceBusy,
    Invalid,
    /// End of data for the current frame.  Not a failure when returned by `read`.
    Eof,
    Jammed,
    /// The document feeder has no more pages.  Not a failure when returned by `start`.
    NoDocs,
    CoverOpen,
    IoError,
    NoMem,
    AccessDenied,
}

impl ScanStatus {
    /// Numeric code, compatible with `SANE_Status`.
    pub fn code(&self) -> i32 {
        match self {
            Self::Unsupported => 1,
            Self::Cancelled => 2,
            Self::DeviceBusy => 3,
            Self::Invalid => 4,
            Self::Eof => 5,
            Self::Jammed => 6,
            Self::NoDocs => 7,
            Self::CoverOpen => 8,
            Self::IoError => 9,
            Self::NoMem => 10,
            Self::AccessDenied => 11,
        }
    }

    /// Map a raw backend code back to a status.  `0` (success) and unknown
    /// codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => Self::Unsupported,
            2 => Self::Cancelled,
            3 => Self::DeviceBusy,
            4 => Self::Invalid,
            5 => Self::Eof,
            6 => Self::Jammed,
            7 => Self::NoDocs,
            8 => Self::CoverOpen,
            9 => Self::IoError,
            10 => Self::NoMem,
            11 => Self::AccessDenied,
            _ => return None,
        })
    }

    /// Backend description of the status.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unsupported => "Operation not supported",
            Self::Cancelled => "Operation was cancelled",
            Self::DeviceBusy => "Device busy",
            Self::Invalid => "Invalid argument",
            Self::Eof => "End of file reached",
            Self::Jammed => "Document feeder jammed",
            Self::NoDocs => "Document feeder out of documents",
            Self::CoverOpen => "Scanner cover is open",
            Self::IoError => "Error during device I/O",
            Self::NoMem => "Out of memory",
            Self::AccessDenied => "Access to resource has been denied",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}
