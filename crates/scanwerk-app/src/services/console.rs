// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Console observer — prints scanner notifications for a terminal user and
// queues them for the command that is driving the scanner.

use scanwerk_acquire::{EventQueue, ScannerObserver};
use scanwerk_core::human_errors::humanize_failure;
use scanwerk_core::status::ScanStatus;
use scanwerk_core::types::Device;
use tracing::info;

#[derive(Clone, Default)]
pub struct ConsoleObserver {
    events: EventQueue,
}

impl ConsoleObserver {
    pub fn new(events: EventQueue) -> Self {
        Self { events }
    }
}

impl ScannerObserver for ConsoleObserver {
    fn init_failed(&self) {
        eprintln!("The scanner backend could not be started.");
        self.events.init_failed();
    }

    fn update_devices(&self, devices: &[Device]) {
        info!(count = devices.len(), "device list updated");
        self.events.update_devices(devices);
    }

    fn request_authorization(&self, resource: &str) {
        eprintln!("{resource} requires a username and password.");
        self.events.request_authorization(resource);
    }

    fn scan_failed(&self, status: ScanStatus, message: &str) {
        eprintln!("{}", format_failure(status, message));
        self.events.scan_failed(status, message);
    }

    fn scanning_changed(&self, scanning: bool) {
        info!(scanning, "scanning state changed");
        self.events.scanning_changed(scanning);
    }
}

/// Failure notification as shown to the user.
pub fn format_failure(status: ScanStatus, message: &str) -> String {
    let human = humanize_failure(status, message);
    if human.suggestion.is_empty() {
        format!("{message}: {}", human.message)
    } else {
        format!("{message}: {}\n  {}", human.message, human.suggestion)
    }
}

/// Two-column device listing: backend name, then label.
pub fn format_devices(devices: &[Device]) -> String {
    if devices.is_empty() {
        return "No scanners detected.".into();
    }
    let width = devices.iter().map(|d| d.name.len()).max().unwrap_or(0);
    devices
        .iter()
        .map(|d| format!("{:width$}  {}", d.name, d.label))
        .collect::<Vec<_>>()
        .join("\n")
}
