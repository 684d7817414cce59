// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

use crate::status::ScanStatus;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Acquisition errors --
    #[error("{context}: {status}")]
    Backend { status: ScanStatus, context: String },

    #[error("no scanner specified")]
    NoDeviceSpecified,

    #[error("scan cancelled")]
    Cancelled,

    #[error("scanner worker error: {0}")]
    Worker(String),

    // -- Page output --
    #[error("image assembly failed: {0}")]
    ImageError(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanwerkError {
    /// Build a backend error with the user-facing context it occurred in.
    pub fn backend(status: ScanStatus, context: impl Into<String>) -> Self {
        Self::Backend {
            status,
            context: context.into(),
        }
    }

    /// Status code carried in a `scan_failed` notification for this error.
    pub fn status(&self) -> ScanStatus {
        match self {
            Self::Backend { status, .. } => *status,
            Self::NoDeviceSpecified => ScanStatus::Invalid,
            Self::Cancelled => ScanStatus::Cancelled,
            Self::Worker(_) | Self::ImageError(_) | Self::Io(_) => ScanStatus::IoError,
            Self::Config(_) | Self::Serialization(_) => ScanStatus::Invalid,
        }
    }

    /// Human-readable message carried in a `scan_failed` notification.
    ///
    /// Backend failures report only their context ("Unable to start scan");
    /// the status description travels separately with the code.
    pub fn failure_message(&self) -> String {
        match self {
            Self::Backend { context, .. } => context.clone(),
            Self::NoDeviceSpecified => "No scanner specified".into(),
            Self::Cancelled => "Scan cancelled".into(),
            other => other.to_string(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
