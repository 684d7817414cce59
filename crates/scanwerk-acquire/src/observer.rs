// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Notifications from the scan worker to the controlling thread.

use std::sync::Arc;

use scanwerk_core::status::ScanStatus;
use scanwerk_core::types::Device;

use crate::queue::BlockingQueue;

/// Receives scanner notifications.  All methods run on the controlling
/// thread, in the order the worker emitted them.
pub trait ScannerObserver: Send + Sync {
    /// The backend could not be initialised; the worker has stopped.
    fn init_failed(&self) {}

    /// Result of a redetect, best candidates first.
    fn update_devices(&self, _devices: &[Device]) {}

    /// The backend needs credentials for `resource`.  Answer with
    /// [`Scanner::authorize`](crate::Scanner::authorize).
    fn request_authorization(&self, _resource: &str) {}

    /// A job was aborted.  Fired once per abort, after which every queued
    /// job has been discarded.
    fn scan_failed(&self, _status: ScanStatus, _message: &str) {}

    /// The worker started or stopped processing jobs.
    fn scanning_changed(&self, _scanning: bool) {}
}

/// Observer notifications as values.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    InitFailed,
    DevicesUpdated(Vec<Device>),
    AuthorizationRequested(String),
    ScanFailed { status: ScanStatus, message: String },
    ScanningChanged(bool),
}

/// Observer that queues every notification as a [`ScanEvent`].
#[derive(Clone, Default)]
pub struct EventQueue {
    events: Arc<BlockingQueue<ScanEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_next(&self) -> Option<ScanEvent> {
        self.events.try_pop()
    }

    /// Take everything queued so far.
    pub fn drain(&self) -> Vec<ScanEvent> {
        std::iter::from_fn(|| self.events.try_pop()).collect()
    }
}

impl ScannerObserver for EventQueue {
    fn init_failed(&self) {
        self.events.push(ScanEvent::InitFailed);
    }

    fn update_devices(&self, devices: &[Device]) {
        self.events.push(ScanEvent::DevicesUpdated(devices.to_vec()));
    }

    fn request_authorization(&self, resource: &str) {
        self.events
            .push(ScanEvent::AuthorizationRequested(resource.to_string()));
    }

    fn scan_failed(&self, status: ScanStatus, message: &str) {
        self.events.push(ScanEvent::ScanFailed {
            status,
            message: message.to_string(),
        });
    }

    fn scanning_changed(&self, scanning: bool) {
        self.events.push(ScanEvent::ScanningChanged(scanning));
    }
}
