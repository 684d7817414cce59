// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Acquire — the scan worker, backend abstraction, option negotiation
// and device discovery.  Everything talking to scanner hardware runs on one
// worker thread; results are handed back to the controlling thread through a
// pumped main loop.

pub mod auth;
pub mod backend;
pub mod devices;
pub mod dispatch;
pub mod negotiate;
pub mod observer;
pub mod page;
pub mod queue;
pub mod registry;
#[cfg(feature = "sane")]
pub mod sane;
pub mod scanner;
pub mod session;
pub mod virtual_device;

pub use auth::AuthRelay;
pub use backend::{Authenticator, ScanBackend, ScanDevice};
pub use dispatch::MainLoop;
pub use observer::{EventQueue, ScanEvent, ScannerObserver};
pub use page::{PageHandler, SharedPageHandler};
pub use queue::BlockingQueue;
pub use scanner::{Scanner, ScannerConfig};
pub use session::ScanState;
pub use virtual_device::{VirtualBackend, VirtualDeviceSpec};
