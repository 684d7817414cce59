// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command implementations.  Each command owns a scanner for its duration and
// pumps its main loop on the calling thread.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scanwerk_acquire::{EventQueue, ScanBackend, ScanEvent, Scanner, SharedPageHandler};
use scanwerk_core::AppConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::Device;
use tracing::{info, warn};

use crate::cli::{Cli, Commands, ConfigArgs, ScanArgs};
use crate::services::assembler::PageAssembler;
use crate::services::builtin::builtin_backend;
use crate::services::config_dir;
use crate::services::console::{ConsoleObserver, format_devices};

const POLL: Duration = Duration::from_millis(50);

/// Environment variables consulted when a scanner asks for credentials.
const USERNAME_VAR: &str = "SCANWERK_USERNAME";
const PASSWORD_VAR: &str = "SCANWERK_PASSWORD";

pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config_dir::config_path);
    let config = config_dir::load_config(&config_path);

    match &cli.command {
        Commands::Devices => {
            let devices = list_devices(backend(&cli)?)?;
            println!("{}", format_devices(&devices));
            Ok(())
        }
        Commands::Scan(args) => {
            for path in scan(backend(&cli)?, &config, args)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Config(args) => show_config(&config_path, config, args),
    }
}

/// The backend selected on the command line: SANE unless `--virtual`.
fn backend(cli: &Cli) -> Result<Box<dyn ScanBackend>> {
    if cli.use_virtual {
        info!(pages = cli.pages, three_pass = cli.three_pass, "using built-in virtual scanners");
        return Ok(Box::new(builtin_backend(cli.pages, cli.three_pass)));
    }
    sane_backend()
}

#[cfg(feature = "sane")]
fn sane_backend() -> Result<Box<dyn ScanBackend>> {
    Ok(Box::new(scanwerk_acquire::sane::SaneBackend::new()))
}

#[cfg(not(feature = "sane"))]
fn sane_backend() -> Result<Box<dyn ScanBackend>> {
    Err(ScanwerkError::Config(
        "this build has no SANE support; rebuild with `--features sane` or pass `--virtual`".into(),
    ))
}

fn start_scanner(backend: impl ScanBackend + 'static) -> Result<(Scanner, EventQueue)> {
    let events = EventQueue::new();
    let scanner = Scanner::start(backend, Arc::new(ConsoleObserver::new(events.clone())))?;
    Ok((scanner, events))
}

/// Pump the scanner until `accept` yields a value for one of its events.
fn wait_for<T>(
    scanner: &Scanner,
    events: &EventQueue,
    mut accept: impl FnMut(ScanEvent) -> Option<T>,
) -> Result<T> {
    loop {
        scanner.pump_timeout(POLL);
        while let Some(event) = events.try_next() {
            if event == ScanEvent::InitFailed {
                return Err(ScanwerkError::Worker("scanner backend failed to initialise".into()));
            }
            if let Some(value) = accept(event) {
                return Ok(value);
            }
        }
        if !scanner.is_running() && !scanner.main_loop().has_pending() {
            return Err(ScanwerkError::Worker("scan worker exited unexpectedly".into()));
        }
    }
}

fn detect(scanner: &Scanner, events: &EventQueue) -> Result<Vec<Device>> {
    scanner.redetect();
    wait_for(scanner, events, |event| match event {
        ScanEvent::DevicesUpdated(devices) => Some(devices),
        _ => None,
    })
}

/// Ranked devices offered by `backend`.
pub fn list_devices(backend: impl ScanBackend + 'static) -> Result<Vec<Device>> {
    let (scanner, events) = start_scanner(backend)?;
    detect(&scanner, &events)
}

/// Scan one document and return the files written.
pub fn scan(
    backend: impl ScanBackend + 'static,
    config: &AppConfig,
    args: &ScanArgs,
) -> Result<Vec<PathBuf>> {
    let (scanner, events) = start_scanner(backend)?;

    let device = match args.device.clone().or_else(|| config.default_device.clone()) {
        Some(device) => device,
        None => {
            let best = detect(&scanner, &events)?.into_iter().next();
            let device = best.ok_or(ScanwerkError::NoDeviceSpecified)?;
            info!(device = %device.name, label = %device.label, "using best-ranked scanner");
            device.name
        }
    };

    let mut options = config.scan.clone();
    args.apply(&mut options);
    let out_dir = args
        .out
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let assembler = Arc::new(Mutex::new(PageAssembler::new(out_dir, &config.file_prefix)?));
    let handler: SharedPageHandler = assembler.clone();
    let job = scanner.scan(device, handler, options);

    let mut failure = None;
    wait_for(&scanner, &events, |event| match event {
        ScanEvent::AuthorizationRequested(resource) => {
            let username = std::env::var(USERNAME_VAR).unwrap_or_default();
            let password = std::env::var(PASSWORD_VAR).unwrap_or_default();
            if username.is_empty() {
                warn!(%resource, "no {USERNAME_VAR} set, sending empty credentials");
            }
            scanner.authorize(username, password);
            None
        }
        ScanEvent::ScanFailed { status, message } => {
            failure = Some(ScanwerkError::backend(status, message));
            None
        }
        ScanEvent::ScanningChanged(false) => Some(()),
        _ => None,
    })?;

    let (written, write_error) = {
        let mut assembler = assembler.lock().unwrap_or_else(PoisonError::into_inner);
        (assembler.written().to_vec(), assembler.take_error())
    };
    if let Some(err) = failure.or(write_error) {
        return Err(err);
    }
    info!(job = %job, pages = written.len(), "scan finished");
    Ok(written)
}

fn show_config(path: &Path, mut config: AppConfig, args: &ConfigArgs) -> Result<()> {
    if let Some(device) = &args.default_device {
        config.default_device = Some(device.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if let Some(prefix) = &args.file_prefix {
        config.file_prefix = prefix.clone();
    }
    if args.has_changes() {
        config_dir::persist_config(path, &config)?;
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
