// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Public handle to the scan worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Credentials, JobId, ScanOptions};
use tracing::{debug, error, info};

use crate::auth::AuthRelay;
use crate::backend::{Authenticator, ScanBackend};
use crate::dispatch::MainLoop;
use crate::observer::ScannerObserver;
use crate::page::SharedPageHandler;
use crate::queue::BlockingQueue;
use crate::session::{Request, ScanJob, Session};

/// Worker tuning.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub thread_name: String,
    /// Upper bound on the buffer handed to a single backend read.
    pub max_read_size: usize,
    /// How long `stop` waits for a main-loop task before re-checking whether
    /// the worker has exited.
    pub shutdown_poll: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            thread_name: "scan-worker".into(),
            max_read_size: 64 * 1024,
            shutdown_poll: Duration::from_millis(10),
        }
    }
}

/// Owns the scan worker thread.
///
/// Every method is non-blocking apart from [`Scanner::stop`].  Results come
/// back through the observer and page handlers, which only run while the
/// controlling thread pumps the main loop ([`Scanner::pump`],
/// [`Scanner::pump_timeout`]).  Dropping the scanner stops the worker.
pub struct Scanner {
    requests: Arc<BlockingQueue<Request>>,
    main_loop: MainLoop,
    auth: AuthRelay,
    config: ScannerConfig,
    worker: Option<JoinHandle<()>>,
}

impl Scanner {
    /// Spawn a worker for `backend` with default tuning.
    pub fn start(
        backend: impl ScanBackend + 'static,
        observer: Arc<dyn ScannerObserver>,
    ) -> Result<Self> {
        Self::with_config(backend, observer, ScannerConfig::default())
    }

    pub fn with_config(
        backend: impl ScanBackend + 'static,
        observer: Arc<dyn ScannerObserver>,
        config: ScannerConfig,
    ) -> Result<Self> {
        let main_loop = MainLoop::new();
        let requests = Arc::new(BlockingQueue::new());
        let auth = AuthRelay::new(main_loop.clone(), Arc::clone(&observer));

        let session = Session::new(
            Box::new(backend),
            main_loop.clone(),
            observer,
            Arc::clone(&requests),
            config.clone(),
        );
        let authenticator: Arc<dyn Authenticator> = Arc::new(auth.clone());
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || session.run(authenticator))
            .map_err(|e| ScanwerkError::Worker(format!("failed to spawn scan worker: {e}")))?;

        info!(thread = %config.thread_name, "scan worker started");
        Ok(Self {
            requests,
            main_loop,
            auth,
            config,
            worker: Some(worker),
        })
    }

    /// Ask for a fresh device list.  Deferred until no job is active.
    pub fn redetect(&self) {
        self.requests.push(Request::Redetect);
    }

    /// Queue a scan of `device`.  Jobs run in the order queued.
    pub fn scan(
        &self,
        device: impl Into<String>,
        handler: SharedPageHandler,
        options: ScanOptions,
    ) -> JobId {
        let job = ScanJob::new(device, options, handler);
        let id = job.id;
        debug!(job = %id, device = %job.device, "queueing scan");
        self.requests.push(Request::StartScan(job));
        id
    }

    /// Abort the active job and drop every queued one.
    pub fn cancel(&self) {
        self.requests.push(Request::Cancel);
    }

    /// Answer a `request_authorization` notification.
    pub fn authorize(&self, username: impl Into<String>, password: impl Into<String>) {
        self.auth.authorize(Credentials::new(username, password));
    }

    pub fn main_loop(&self) -> &MainLoop {
        &self.main_loop
    }

    /// Run every pending notification and page-handler call.
    pub fn pump(&self) -> usize {
        self.main_loop.run_pending()
    }

    /// Wait up to `timeout` for one notification and run it.
    pub fn pump_timeout(&self, timeout: Duration) -> bool {
        self.main_loop.run_once_timeout(timeout)
    }

    /// Whether the worker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Shut the worker down and wait for it.
    ///
    /// Keeps pumping the main loop while waiting, so a worker blocked on a
    /// page handler or an authorisation request can still finish.  Tasks
    /// posted during shutdown are run before returning.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.requests.push(Request::Quit);
        while !worker.is_finished() {
            self.auth.abort_pending();
            self.main_loop.run_once_timeout(self.config.shutdown_poll);
        }
        if worker.join().is_err() {
            error!("scan worker panicked");
        }
        self.main_loop.run_pending();
        info!("scan worker joined");
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop();
    }
}
