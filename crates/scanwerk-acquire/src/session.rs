// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The scan worker: a state machine driving one backend device at a time.
//
// Requests from the controlling thread arrive on a blocking queue.  While a
// job is active the worker drains them between steps; while idle it sleeps
// on the queue.  Each step performs at most one backend call, so a cancel is
// noticed within one read.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::status::ScanStatus;
use scanwerk_core::types::{FrameFormat, JobId, ScanLine, ScanOptions, ScanPageInfo};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{Authenticator, FrameParameters, ScanBackend, ScanDevice};
use crate::devices::rank_devices;
use crate::dispatch::MainLoop;
use crate::negotiate::negotiate;
use crate::observer::ScannerObserver;
use crate::page::{PageHandler, SharedPageHandler};
use crate::queue::BlockingQueue;
use crate::registry::OptionRegistry;
use crate::scanner::ScannerConfig;

/// Failure message when the device cannot be opened.
pub const OPEN_FAILED: &str = "Unable to connect to scanner";
/// Failure message when a frame cannot be started.
pub const START_FAILED: &str = "Unable to start scan";
/// Failure message for parameter and read errors.
pub const IO_FAILED: &str = "Error communicating with scanner";

/// Where the worker is within the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Open,
    NegotiateOptions,
    Start,
    GetParameters,
    Read,
}

/// Work item sent from the controlling thread to the worker.
#[derive(Debug)]
pub enum Request {
    Redetect,
    StartScan(ScanJob),
    Cancel,
    Quit,
}

/// One queued scan: a device, what to scan, and who receives the pages.
pub struct ScanJob {
    pub id: JobId,
    pub device: String,
    pub options: ScanOptions,
    pub handler: SharedPageHandler,
    progress: JobProgress,
}

#[derive(Default)]
struct JobProgress {
    page: u32,
    pass: u32,
    line_count: u32,
    notified_page: Option<u32>,
    pages_done: u32,
    params: Option<FrameParameters>,
    buffer: Vec<u8>,
    filled: usize,
}

impl ScanJob {
    pub fn new(device: impl Into<String>, options: ScanOptions, handler: SharedPageHandler) -> Self {
        Self {
            id: JobId::new(),
            device: device.into(),
            options,
            handler,
            progress: JobProgress::default(),
        }
    }
}

impl fmt::Debug for ScanJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanJob")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("options", &self.options)
            .field("page", &self.progress.page)
            .field("pass", &self.progress.pass)
            .finish_non_exhaustive()
    }
}

struct OpenDevice {
    name: String,
    handle: Box<dyn ScanDevice>,
    /// Built on first negotiation, dropped with the handle.
    registry: Option<OptionRegistry>,
}

/// State owned by the worker thread.
pub(crate) struct Session {
    backend: Box<dyn ScanBackend>,
    main_loop: MainLoop,
    observer: Arc<dyn ScannerObserver>,
    requests: Arc<BlockingQueue<Request>>,
    config: ScannerConfig,
    jobs: VecDeque<ScanJob>,
    state: ScanState,
    device: Option<OpenDevice>,
    pending_redetects: usize,
    scanning: bool,
}

impl Session {
    pub(crate) fn new(
        backend: Box<dyn ScanBackend>,
        main_loop: MainLoop,
        observer: Arc<dyn ScannerObserver>,
        requests: Arc<BlockingQueue<Request>>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            backend,
            main_loop,
            observer,
            requests,
            config,
            jobs: VecDeque::new(),
            state: ScanState::Idle,
            device: None,
            pending_redetects: 0,
            scanning: false,
        }
    }

    /// Worker entry point.  Returns after a `Quit` request or a failed
    /// backend initialisation.
    pub(crate) fn run(mut self, authenticator: Arc<dyn Authenticator>) {
        match self.backend.init(authenticator) {
            Ok(version) => info!(%version, "scan backend initialised"),
            Err(status) => {
                error!(%status, "scan backend initialisation failed");
                self.notify(|o| o.init_failed());
                return;
            }
        }

        while self.handle_requests() {
            self.update_scanning();
            self.step();
            self.update_scanning();
        }

        self.close_device();
        self.jobs.clear();
        let unhandled = self.requests.len();
        if unhandled > 0 {
            debug!(unhandled, "discarding requests queued after quit");
            self.requests.clear();
        }
        self.state = ScanState::Idle;
        self.update_scanning();
        self.backend.exit();
        info!("scan worker stopped");
    }

    fn notify(&self, call: impl FnOnce(&dyn ScannerObserver) + Send + 'static) {
        let observer = Arc::clone(&self.observer);
        self.main_loop.post(move || call(observer.as_ref()));
    }

    // -- Requests ------------------------------------------------------------

    /// Process queued requests.  Returns `false` once `Quit` is seen.
    fn handle_requests(&mut self) -> bool {
        if self.state == ScanState::Idle && self.pending_redetects > 0 {
            self.redetect();
        }

        let mut handled = 0usize;
        loop {
            let request = if self.state == ScanState::Idle && self.jobs.is_empty() && handled == 0 {
                self.requests.pop()
            } else {
                match self.requests.try_pop() {
                    Some(request) => request,
                    None => return true,
                }
            };
            handled += 1;

            match request {
                Request::Redetect => self.pending_redetects += 1,
                Request::StartScan(job) => {
                    debug!(job = %job.id, device = %job.device, "scan queued");
                    self.jobs.push_back(job);
                }
                Request::Cancel => self.cancel(),
                Request::Quit => {
                    debug!("quit requested");
                    return false;
                }
            }
        }
    }

    /// Enumerate once and answer every redetect request received since the
    /// last enumeration.
    #[instrument(skip_all, fields(requests = self.pending_redetects))]
    fn redetect(&mut self) {
        let requests = std::mem::take(&mut self.pending_redetects);
        let devices = match self.backend.devices() {
            Ok(raw) => rank_devices(&raw),
            Err(status) => {
                warn!(%status, "device enumeration failed");
                Vec::new()
            }
        };
        info!(count = devices.len(), "devices detected");
        for _ in 0..requests {
            let devices = devices.clone();
            self.notify(move |o| o.update_devices(&devices));
        }
    }

    fn cancel(&mut self) {
        if self.state == ScanState::Idle && self.jobs.is_empty() {
            debug!("cancel with nothing queued");
            return;
        }
        self.fail(ScanwerkError::Cancelled);
    }

    /// Abort the active job and discard everything queued behind it.
    fn fail(&mut self, err: ScanwerkError) {
        let status = err.status();
        let message = err.failure_message();
        let discarded = self.jobs.len();
        if status == ScanStatus::Cancelled {
            info!(discarded, "scan cancelled");
        } else {
            warn!(%status, error = %err, discarded, "scan failed");
        }

        self.close_device();
        self.jobs.clear();
        self.state = ScanState::Idle;
        self.notify(move |o| o.scan_failed(status, &message));
    }

    fn update_scanning(&mut self) {
        let scanning = self.state != ScanState::Idle;
        if scanning != self.scanning {
            self.scanning = scanning;
            debug!(scanning, "scanning state changed");
            self.notify(move |o| o.scanning_changed(scanning));
        }
    }

    fn close_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.handle.cancel();
            info!(device = %device.name, "closing device");
        }
    }

    // -- State machine -------------------------------------------------------

    fn step(&mut self) {
        let result = match self.state {
            ScanState::Idle => {
                if !self.jobs.is_empty() {
                    self.state = ScanState::Open;
                }
                Ok(())
            }
            ScanState::Open => self.open(),
            ScanState::NegotiateOptions => self.negotiate_options(),
            ScanState::Start => self.start(),
            ScanState::GetParameters => self.get_parameters(),
            ScanState::Read => self.read(),
        };
        if let Err(err) = result {
            self.fail(err);
        }
    }

    #[instrument(skip_all)]
    fn open(&mut self) -> Result<()> {
        let job = current_job(&mut self.jobs)?;
        job.progress = JobProgress::default();
        let id = job.id;
        let name = job.device.clone();

        if name.is_empty() {
            return Err(ScanwerkError::NoDeviceSpecified);
        }

        if self.device.as_ref().is_some_and(|d| d.name == name) {
            debug!(job = %id, device = %name, "reusing open device");
        } else {
            self.close_device();
            info!(job = %id, device = %name, "opening device");
            let handle = self
                .backend
                .open(&name)
                .map_err(|status| ScanwerkError::backend(status, OPEN_FAILED))?;
            self.device = Some(OpenDevice {
                name,
                handle,
                registry: None,
            });
        }

        self.state = ScanState::NegotiateOptions;
        Ok(())
    }

    fn negotiate_options(&mut self) -> Result<()> {
        let (job, device) = active(&mut self.jobs, &mut self.device)?;
        let handle = &mut device.handle;
        let registry = device.registry.get_or_insert_with(|| {
            let registry = OptionRegistry::build(&**handle);
            debug!(options = registry.len(), "option registry built");
            registry
        });

        negotiate(&mut **handle, registry, &mut job.options);
        info!(
            job = %job.id,
            device = %device.name,
            dpi = job.options.dpi,
            mode = ?job.options.mode,
            depth = job.options.depth,
            scan_type = ?job.options.scan_type,
            "options negotiated"
        );

        self.state = ScanState::Start;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let (job, device) = active(&mut self.jobs, &mut self.device)?;
        debug!(job = %job.id, page = job.progress.page, pass = job.progress.pass, "starting frame");

        match device.handle.start() {
            Ok(()) => {
                self.state = ScanState::GetParameters;
                Ok(())
            }
            Err(ScanStatus::NoDocs) => {
                info!(job = %job.id, "document feeder empty");
                self.complete_document();
                Ok(())
            }
            Err(status) => Err(ScanwerkError::backend(status, START_FAILED)),
        }
    }

    fn get_parameters(&mut self) -> Result<()> {
        let (job, device) = active(&mut self.jobs, &mut self.device)?;
        let params = device
            .handle
            .parameters()
            .map_err(|status| ScanwerkError::backend(status, IO_FAILED))?;
        if params.bytes_per_line == 0 {
            return Err(ScanwerkError::backend(ScanStatus::Invalid, IO_FAILED));
        }
        debug!(
            format = ?params.format,
            last_frame = params.last_frame,
            bytes_per_line = params.bytes_per_line,
            pixels_per_line = params.pixels_per_line,
            lines = ?params.lines,
            depth = params.depth,
            "frame parameters"
        );

        let progress = &mut job.progress;
        if progress.notified_page != Some(progress.page) {
            let info = ScanPageInfo {
                width: params.pixels_per_line,
                height: params.lines,
                depth: params.depth,
                n_channels: params.format.page_channels(),
                dpi: job.options.dpi,
                device: job.device.clone(),
            };
            info!(job = %job.id, page = progress.page, width = info.width, height = ?info.height, "page started");
            deliver(&self.main_loop, &job.handler, move |h| h.setup_page(&info));
            progress.notified_page = Some(progress.page);
        }

        progress.line_count = 0;
        progress.buffer = vec![0; params.bytes_per_line];
        progress.filled = 0;
        progress.params = Some(params);

        self.state = ScanState::Read;
        Ok(())
    }

    fn read(&mut self) -> Result<()> {
        let (job, device) = active(&mut self.jobs, &mut self.device)?;
        let progress = &mut job.progress;
        let Some(params) = progress.params.as_ref() else {
            return Err(ScanwerkError::Worker("read without frame parameters".into()));
        };

        let end = progress
            .buffer
            .len()
            .min(progress.filled + self.config.max_read_size.max(1));
        match device.handle.read(&mut progress.buffer[progress.filled..end]) {
            Ok(n) => {
                progress.filled += n;
                if progress.filled == progress.buffer.len() {
                    let mut data =
                        std::mem::replace(&mut progress.buffer, vec![0; params.bytes_per_line]);
                    progress.filled = 0;
                    if params.format == FrameFormat::Gray && params.depth == 1 {
                        invert_lineart(&mut data);
                    }
                    let line = ScanLine {
                        number: progress.line_count,
                        n_lines: 1,
                        width: params.pixels_per_line,
                        depth: params.depth,
                        format: params.format,
                        channel: params.format.channel(),
                        data_length: data.len(),
                        data,
                    };
                    progress.line_count += 1;
                    deliver(&self.main_loop, &job.handler, move |h| h.handle_data(&line));
                }
                Ok(())
            }
            Err(ScanStatus::Eof) => {
                if progress.filled > 0 {
                    warn!(bytes = progress.filled, "frame ended mid-line, partial row dropped");
                }
                if let Some(expected) = params.lines {
                    if expected != progress.line_count {
                        warn!(expected, received = progress.line_count, "frame line count mismatch");
                    }
                }
                self.complete_frame()
            }
            Err(status) => Err(ScanwerkError::backend(status, IO_FAILED)),
        }
    }

    fn complete_frame(&mut self) -> Result<()> {
        let job = current_job(&mut self.jobs)?;
        let progress = &mut job.progress;
        let last_frame = progress.params.take().is_none_or(|p| p.last_frame);

        if !last_frame {
            progress.pass += 1;
            debug!(job = %job.id, pass = progress.pass, "next pass");
            self.state = ScanState::Start;
            return Ok(());
        }

        deliver(&self.main_loop, &job.handler, |h| h.finalize_page());
        progress.pages_done += 1;
        info!(job = %job.id, page = progress.page, "page complete");

        if job.options.scan_type.is_multi_page() {
            progress.page += 1;
            progress.pass = 0;
            self.state = ScanState::Start;
        } else {
            self.complete_document();
        }
        Ok(())
    }

    /// Retire the head job and move on to the next one, closing the device
    /// when the queue runs dry.
    fn complete_document(&mut self) {
        if let Some(job) = self.jobs.pop_front() {
            info!(job = %job.id, pages = job.progress.pages_done, "document complete");
        }

        if self.jobs.is_empty() {
            self.close_device();
            self.state = ScanState::Idle;
        } else {
            if let Some(device) = self.device.as_mut() {
                device.handle.cancel();
            }
            self.state = ScanState::Open;
        }
    }
}

fn current_job(jobs: &mut VecDeque<ScanJob>) -> Result<&mut ScanJob> {
    jobs.front_mut()
        .ok_or_else(|| ScanwerkError::Worker("no active scan job".into()))
}

fn active<'a>(
    jobs: &'a mut VecDeque<ScanJob>,
    device: &'a mut Option<OpenDevice>,
) -> Result<(&'a mut ScanJob, &'a mut OpenDevice)> {
    let device = device
        .as_mut()
        .ok_or_else(|| ScanwerkError::Worker("no open device".into()))?;
    Ok((current_job(jobs)?, device))
}

/// Run a page-handler call on the controlling thread and wait for it.
fn deliver(
    main_loop: &MainLoop,
    handler: &SharedPageHandler,
    call: impl FnOnce(&mut dyn PageHandler) + Send + 'static,
) {
    let handler = Arc::clone(handler);
    main_loop.invoke_blocking(move || {
        let mut guard = handler.lock().unwrap_or_else(PoisonError::into_inner);
        call(&mut *guard);
    });
}

/// SANE lineart uses 1 for black; page handlers expect 1 for white.
fn invert_lineart(data: &mut [u8]) {
    for byte in data {
        *byte = !*byte;
    }
}
