// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable scan failure messages.
//
// A `scan_failed` notification carries a backend status and a short context
// string.  This module turns that pair into plain English with a suggestion
// the front-end can show directly.

use crate::status::ScanStatus;

/// Severity of a failure from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Busy device, I/O blip: scanning again will probably work.
    Transient,
    /// User must do something (load paper, close the lid, clear a jam).
    ActionRequired,
    /// Retrying will not help: unsupported operation, denied access.
    Permanent,
    /// The user stopped the scan.
    Cancelled,
}

/// A human-readable failure with plain English message and suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether offering a "Scan again" button makes sense.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a failure notification into a `HumanError`.
pub fn humanize_failure(status: ScanStatus, context: &str) -> HumanError {
    match status {
        ScanStatus::Cancelled => HumanError {
            message: "Scan cancelled.".into(),
            suggestion: "Start a new scan whenever you are ready.".into(),
            retriable: true,
            severity: Severity::Cancelled,
        },
        ScanStatus::DeviceBusy => HumanError {
            message: "The scanner is busy.".into(),
            suggestion: format!(
                "Another program may be using it. Close it and try again. ({context})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },
        ScanStatus::Jammed => HumanError {
            message: "Paper is stuck in the document feeder.".into(),
            suggestion: "Open the feeder, remove the jammed page, and scan again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },
        ScanStatus::NoDocs => HumanError {
            message: "The document feeder is empty.".into(),
            suggestion: "Load the pages into the feeder, then scan again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },
        ScanStatus::CoverOpen => HumanError {
            message: "The scanner lid is open.".into(),
            suggestion: "Close the lid, then scan again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },
        ScanStatus::AccessDenied => HumanError {
            message: "Access to the scanner was denied.".into(),
            suggestion: "Check the username and password for this scanner.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
        ScanStatus::Unsupported => HumanError {
            message: "The scanner does not support this operation.".into(),
            suggestion: format!("Try a different paper source or colour mode. ({context})"),
            retriable: false,
            severity: Severity::Permanent,
        },
        ScanStatus::Invalid => HumanError {
            message: "The scan could not be set up.".into(),
            suggestion: format!("Choose a scanner from the list and try again. ({context})"),
            retriable: false,
            severity: Severity::Permanent,
        },
        ScanStatus::IoError | ScanStatus::Eof | ScanStatus::NoMem => HumanError {
            message: "Lost contact with the scanner.".into(),
            suggestion: format!(
                "Check that the scanner is switched on and its cable is connected. ({context})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jam_needs_user_action() {
        let human = humanize_failure(ScanStatus::Jammed, "Error communicating with scanner");
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.retriable);
    }

    #[test]
    fn cancellation_has_its_own_severity() {
        let human = humanize_failure(ScanStatus::Cancelled, "Scan cancelled");
        assert_eq!(human.severity, Severity::Cancelled);
    }

    #[test]
    fn io_error_mentions_context() {
        let human = humanize_failure(ScanStatus::IoError, "Unable to start scan");
        assert!(human.suggestion.contains("Unable to start scan"));
    }
}
