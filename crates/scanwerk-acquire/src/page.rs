// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Consumer side of a scan: page geometry and rows, delivered on the
// controlling thread.

use std::sync::{Arc, Mutex};

use scanwerk_core::types::{ScanLine, ScanPageInfo};

/// Receives the pages of one scan job.
///
/// Every method runs on the controlling thread while the scan worker waits
/// for it to return, so implementations must not block for long.  For each
/// page the worker calls `setup_page` once, then `handle_data` for every row
/// in increasing order, then `finalize_page` once.
pub trait PageHandler: Send {
    fn setup_page(&mut self, info: &ScanPageInfo);

    fn handle_data(&mut self, line: &ScanLine);

    fn finalize_page(&mut self);
}

/// Page handler shared between the caller and the scan worker.
pub type SharedPageHandler = Arc<Mutex<dyn PageHandler>>;

/// Wrap a handler for [`Scanner::scan`](crate::Scanner::scan).
pub fn shared(handler: impl PageHandler + 'static) -> SharedPageHandler {
    Arc::new(Mutex::new(handler))
}
