// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end tests driving the scan worker against the virtual backend.

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use scanwerk_acquire::backend::OptionValue;
use scanwerk_acquire::page::shared;
use scanwerk_acquire::virtual_device::{
    DeviceEvent, VirtualBackendControl, bool_option, int_range_option, option_count_entry,
    string_list_option,
};
use scanwerk_acquire::{EventQueue, PageHandler, ScanEvent, Scanner, VirtualBackend, VirtualDeviceSpec};
use scanwerk_core::status::ScanStatus;
use scanwerk_core::types::{FrameFormat, ScanLine, ScanMode, ScanOptions, ScanPageInfo, ScanType};

const TIMEOUT: Duration = Duration::from_secs(10);

// -- Recording page handler --------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum PageCall {
    Setup(ScanPageInfo),
    Line(ScanLine),
    Finalize,
}

/// Page handler that journals every call, tagged, into a log that can be
/// shared between several handlers.
#[derive(Clone)]
struct Recorder {
    tag: &'static str,
    journal: Arc<Mutex<Vec<(&'static str, PageCall)>>>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl Recorder {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            journal: Arc::default(),
            threads: Arc::default(),
        }
    }

    fn sibling(&self, tag: &'static str) -> Self {
        Self {
            tag,
            ..self.clone()
        }
    }

    fn record(&self, call: PageCall) {
        self.journal.lock().expect("journal").push((self.tag, call));
        self.threads
            .lock()
            .expect("threads")
            .push(thread::current().id());
    }

    fn calls(&self, tag: &str) -> Vec<PageCall> {
        self.journal
            .lock()
            .expect("journal")
            .iter()
            .filter(|(t, _)| *t == tag)
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn tags(&self) -> Vec<&'static str> {
        self.journal
            .lock()
            .expect("journal")
            .iter()
            .map(|(t, _)| *t)
            .collect()
    }

    fn ran_only_on(&self, id: ThreadId) -> bool {
        self.threads.lock().expect("threads").iter().all(|t| *t == id)
    }
}

impl PageHandler for Recorder {
    fn setup_page(&mut self, info: &ScanPageInfo) {
        self.record(PageCall::Setup(info.clone()));
    }

    fn handle_data(&mut self, line: &ScanLine) {
        self.record(PageCall::Line(line.clone()));
    }

    fn finalize_page(&mut self) {
        self.record(PageCall::Finalize);
    }
}

// -- Harness -----------------------------------------------------------------

struct Harness {
    scanner: Scanner,
    events: EventQueue,
    control: VirtualBackendControl,
    seen: Vec<ScanEvent>,
}

impl Harness {
    fn new(backend: VirtualBackend) -> Self {
        let control = backend.control();
        let events = EventQueue::new();
        let scanner = Scanner::start(backend, Arc::new(events.clone())).expect("scanner starts");
        Self {
            scanner,
            events,
            control,
            seen: Vec::new(),
        }
    }

    fn with_devices(devices: Vec<VirtualDeviceSpec>) -> Self {
        Self::new(VirtualBackend::new(devices))
    }

    fn scan(&self, device: &str, handler: &Recorder, options: ScanOptions) {
        self.scanner.scan(device, shared(handler.clone()), options);
    }

    fn pump_until(&mut self, what: &str, done: impl Fn(&Self) -> bool) {
        let deadline = Instant::now() + TIMEOUT;
        while !done(&*self) {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {what}; events so far: {:?}",
                self.seen
            );
            self.scanner.pump_timeout(Duration::from_millis(5));
            self.seen.extend(self.events.drain());
        }
    }

    /// Pump for a fixed period, collecting whatever arrives.
    fn pump_for(&mut self, period: Duration) {
        let deadline = Instant::now() + period;
        while Instant::now() < deadline {
            self.scanner.pump_timeout(Duration::from_millis(5));
            self.seen.extend(self.events.drain());
        }
    }

    fn count(&self, pred: impl Fn(&ScanEvent) -> bool) -> usize {
        self.seen.iter().filter(|e| pred(e)).count()
    }

    fn wait_scanning_stopped(&mut self, times: usize) {
        self.pump_until("scanning to stop", |h| {
            h.count(|e| *e == ScanEvent::ScanningChanged(false)) >= times
        });
    }

    fn failures(&self) -> Vec<(ScanStatus, String)> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                ScanEvent::ScanFailed { status, message } => Some((*status, message.clone())),
                _ => None,
            })
            .collect()
    }
}

fn gray() -> ScanOptions {
    ScanOptions {
        mode: ScanMode::Gray,
        ..ScanOptions::default()
    }
}

fn lines(calls: &[PageCall]) -> Vec<&ScanLine> {
    calls
        .iter()
        .filter_map(|c| match c {
            PageCall::Line(line) => Some(line),
            _ => None,
        })
        .collect()
}

fn sample(page: usize, offset: usize) -> u8 {
    ((page * 31 + offset * 7) & 0xff) as u8
}

// -- Single jobs -------------------------------------------------------------

#[test]
fn single_page_scan_delivers_setup_then_rows_then_finalize() {
    let mut h = Harness::with_devices(vec![VirtualDeviceSpec::flatbed("fb")]);
    let recorder = Recorder::new("a");
    h.scan(
        "fb",
        &recorder,
        ScanOptions {
            dpi: 333.0,
            ..gray()
        },
    );
    h.wait_scanning_stopped(1);

    let calls = recorder.calls("a");
    assert_eq!(calls.len(), 1 + 8 + 1);
    assert_eq!(
        calls[0],
        PageCall::Setup(ScanPageInfo {
            width: 16,
            height: Some(8),
            depth: 8,
            n_channels: 1,
            dpi: 300.0,
            device: "fb".into(),
        })
    );
    assert_eq!(calls[9], PageCall::Finalize);

    let rows = lines(&calls);
    let numbers: Vec<u32> = rows.iter().map(|l| l.number).collect();
    assert_eq!(numbers, (0..8).collect::<Vec<_>>());
    // Rows are assembled across reads that do not align with line ends.
    assert_eq!(rows[1].data_length, 16);
    assert_eq!(rows[1].data[0], sample(0, 16));
    assert_eq!(rows[1].data[15], sample(0, 31));

    assert!(recorder.ran_only_on(thread::current().id()));
    assert!(h.failures().is_empty());
    assert_eq!(
        h.seen,
        vec![ScanEvent::ScanningChanged(true), ScanEvent::ScanningChanged(false)]
    );
    assert_eq!(h.control.open_handles(), 0);
}

#[test]
fn unknown_page_height_is_reported_as_none() {
    let mut spec = VirtualDeviceSpec::flatbed("handheld");
    spec.announce_lines = false;
    let mut h = Harness::with_devices(vec![spec]);
    let recorder = Recorder::new("a");
    h.scan("handheld", &recorder, gray());
    h.wait_scanning_stopped(1);

    match &recorder.calls("a")[0] {
        PageCall::Setup(info) => assert_eq!(info.height, None),
        other => panic!("expected setup first, got {other:?}"),
    }
    assert_eq!(lines(&recorder.calls("a")).len(), 8);
}

#[test]
fn lineart_rows_use_one_for_white() {
    let mut h = Harness::with_devices(vec![VirtualDeviceSpec::flatbed("fb")]);
    let recorder = Recorder::new("a");
    h.scan(
        "fb",
        &recorder,
        ScanOptions {
            mode: ScanMode::Lineart,
            ..ScanOptions::default()
        },
    );
    h.wait_scanning_stopped(1);

    let calls = recorder.calls("a");
    let rows = lines(&calls);
    assert_eq!(rows[0].depth, 1);
    assert_eq!(rows[0].data, vec![!sample(0, 0), !sample(0, 1)]);
    assert_eq!(
        h.control.last_set("mode"),
        Some(OptionValue::String("Lineart".into()))
    );
}

#[test]
fn three_pass_colour_forms_one_page_of_three_channels() {
    let mut spec = VirtualDeviceSpec::flatbed("tp");
    spec.three_pass = true;
    let mut h = Harness::with_devices(vec![spec]);
    let recorder = Recorder::new("a");
    h.scan("tp", &recorder, ScanOptions::default());
    h.wait_scanning_stopped(1);

    let calls = recorder.calls("a");
    let setups = calls.iter().filter(|c| matches!(c, PageCall::Setup(_))).count();
    let finals = calls.iter().filter(|c| **c == PageCall::Finalize).count();
    assert_eq!((setups, finals), (1, 1));
    match &calls[0] {
        PageCall::Setup(info) => assert_eq!(info.n_channels, 3),
        other => panic!("expected setup first, got {other:?}"),
    }

    let rows = lines(&calls);
    assert_eq!(rows.len(), 24);
    for (pass, format) in [FrameFormat::Red, FrameFormat::Green, FrameFormat::Blue]
        .into_iter()
        .enumerate()
    {
        let pass_rows = &rows[pass * 8..pass * 8 + 8];
        assert!(pass_rows.iter().all(|l| l.format == format));
        assert!(pass_rows.iter().all(|l| l.channel == pass as u32));
        let numbers: Vec<u32> = pass_rows.iter().map(|l| l.number).collect();
        assert_eq!(numbers, (0..8).collect::<Vec<_>>());
    }
}

// -- Feeders -----------------------------------------------------------------

#[test]
fn adf_scan_produces_one_page_cycle_per_sheet() {
    let mut h = Harness::with_devices(vec![VirtualDeviceSpec::sheetfed("adf", 3)]);
    let recorder = Recorder::new("a");
    h.scan(
        "adf",
        &recorder,
        ScanOptions {
            scan_type: ScanType::AdfFront,
            ..gray()
        },
    );
    h.wait_scanning_stopped(1);

    let calls = recorder.calls("a");
    let shape: Vec<char> = calls
        .iter()
        .filter_map(|c| match c {
            PageCall::Setup(_) => Some('S'),
            PageCall::Finalize => Some('F'),
            PageCall::Line(_) => None,
        })
        .collect();
    assert_eq!(shape, vec!['S', 'F', 'S', 'F', 'S', 'F']);
    assert_eq!(lines(&calls).len(), 24);
    // Each page restarts its row numbering.
    assert!(lines(&calls).chunks(8).all(|page| page[0].number == 0 && page[7].number == 7));

    assert!(h.failures().is_empty());
    assert_eq!(
        h.control.last_set("source"),
        Some(OptionValue::String("ADF Front".into()))
    );
    assert_eq!(h.control.last_set("batch-scan"), Some(OptionValue::Bool(true)));
    assert_eq!(h.control.last_set("duplex"), Some(OptionValue::Bool(false)));
    assert_eq!(
        h.control.last_set("compression"),
        Some(OptionValue::String("None".into()))
    );
}

#[test]
fn duplex_request_on_feeder_without_duplex_option_still_batch_scans() {
    let spec = VirtualDeviceSpec::sheetfed("simplex", 2).with_options(vec![
        option_count_entry(),
        string_list_option("source", &["Flatbed", "ADF"]),
        string_list_option("mode", &["Color", "Gray"]),
        bool_option("batch-scan"),
    ]);
    let mut h = Harness::with_devices(vec![spec]);
    let recorder = Recorder::new("a");
    h.scan(
        "simplex",
        &recorder,
        ScanOptions {
            scan_type: ScanType::AdfDuplex,
            ..gray()
        },
    );
    h.wait_scanning_stopped(1);

    let finals = recorder
        .calls("a")
        .iter()
        .filter(|c| **c == PageCall::Finalize)
        .count();
    assert_eq!(finals, 2);
    assert_eq!(
        h.control.last_set("source"),
        Some(OptionValue::String("ADF".into()))
    );
    assert_eq!(h.control.last_set("batch-scan"), Some(OptionValue::Bool(true)));
    assert_eq!(h.control.last_set("duplex"), None);
}

// -- Queueing ----------------------------------------------------------------

#[test]
fn jobs_run_in_submission_order() {
    let mut h = Harness::with_devices(vec![
        VirtualDeviceSpec::flatbed("fb:a"),
        VirtualDeviceSpec::flatbed("fb:b"),
    ]);
    let a = Recorder::new("a");
    let b = a.sibling("b");
    h.scan("fb:a", &a, gray());
    h.scan("fb:b", &b, gray());
    h.wait_scanning_stopped(1);

    let tags = a.tags();
    assert_eq!(tags.len(), 20);
    let first_b = tags.iter().position(|t| *t == "b").expect("b ran");
    assert!(tags[..first_b].iter().all(|t| *t == "a"));
    assert!(tags[first_b..].iter().all(|t| *t == "b"));

    // A different device closes the previous handle before opening.
    assert_eq!(h.control.max_open_handles(), 1);
    let lifecycle: Vec<DeviceEvent> = h
        .control
        .events()
        .into_iter()
        .filter(|e| matches!(e, DeviceEvent::Opened(_) | DeviceEvent::Closed(_)))
        .collect();
    assert_eq!(
        lifecycle,
        vec![
            DeviceEvent::Opened("fb:a".into()),
            DeviceEvent::Closed("fb:a".into()),
            DeviceEvent::Opened("fb:b".into()),
            DeviceEvent::Closed("fb:b".into()),
        ]
    );
}

#[test]
fn back_to_back_jobs_on_one_device_share_a_handle() {
    let mut h = Harness::with_devices(vec![VirtualDeviceSpec::flatbed("fb")]);
    let a = Recorder::new("a");
    let b = a.sibling("b");
    h.scan("fb", &a, gray());
    h.scan("fb", &b, gray());
    h.wait_scanning_stopped(1);

    assert_eq!(a.calls("a").len(), 10);
    assert_eq!(a.calls("b").len(), 10);
    let opened = h
        .control
        .events()
        .iter()
        .filter(|e| matches!(e, DeviceEvent::Opened(_)))
        .count();
    assert_eq!(opened, 1);
    assert_eq!(h.control.open_handles(), 0);
}

#[test]
fn cancel_discards_active_and_queued_jobs() {
    let mut spec = VirtualDeviceSpec::flatbed("slow");
    spec.lines = 200;
    spec.read_delay = Some(Duration::from_millis(2));
    let mut h = Harness::with_devices(vec![spec]);
    let a = Recorder::new("a");
    let b = a.sibling("b");
    h.scan("slow", &a, gray());
    h.scan("slow", &b, gray());

    h.pump_until("first page setup", |_| !a.calls("a").is_empty());
    h.scanner.cancel();
    h.wait_scanning_stopped(1);

    assert_eq!(
        h.failures(),
        vec![(ScanStatus::Cancelled, "Scan cancelled".to_string())]
    );
    assert!(!a.calls("a").contains(&PageCall::Finalize));
    assert!(a.calls("b").is_empty());
    assert_eq!(h.control.open_handles(), 0);

    // Nothing left to run.
    h.pump_for(Duration::from_millis(50));
    assert!(a.calls("b").is_empty());
    assert_eq!(h.failures().len(), 1);
}

#[test]
fn cancel_while_idle_emits_nothing() {
    let mut h = Harness::with_devices(vec![VirtualDeviceSpec::flatbed("fb")]);
    h.scanner.cancel();
    h.pump_for(Duration::from_millis(50));
    assert!(h.seen.is_empty());
}

#[test]
fn open_failure_aborts_the_whole_queue() {
    let mut broken = VirtualDeviceSpec::flatbed("broken");
    broken.fail_open = Some(ScanStatus::DeviceBusy);
    let mut h = Harness::with_devices(vec![VirtualDeviceSpec::flatbed("fb"), broken]);

    // The first job holds the worker on its page calls until we pump, so
    // the later jobs are queued before the failing open.
    let gate = Recorder::new("gate");
    let after = gate.sibling("after");
    h.scan("fb", &gate, gray());
    h.scan("broken", &gate.sibling("broken"), gray());
    h.scan("fb", &after, gray());
    h.pump_until("a failure", |h| !h.failures().is_empty());
    h.wait_scanning_stopped(1);

    assert_eq!(gate.calls("gate").len(), 10);
    assert!(gate.calls("broken").is_empty());
    assert!(gate.calls("after").is_empty());
    assert_eq!(
        h.failures(),
        vec![(ScanStatus::DeviceBusy, "Unable to connect to scanner".to_string())]
    );

    h.pump_for(Duration::from_millis(50));
    assert!(gate.calls("after").is_empty());
}

// -- Failures ----------------------------------------------------------------

#[test]
fn missing_device_name_fails_with_invalid_status() {
    let mut h = Harness::with_devices(vec![VirtualDeviceSpec::flatbed("fb")]);
    let recorder = Recorder::new("a");
    h.scan("", &recorder, gray());
    h.wait_scanning_stopped(1);

    assert_eq!(
        h.failures(),
        vec![(ScanStatus::Invalid, "No scanner specified".to_string())]
    );
    assert!(recorder.calls("a").is_empty());
}

#[test]
fn start_failure_reports_unable_to_start() {
    let mut spec = VirtualDeviceSpec::flatbed("jam");
    spec.fail_start = Some((0, ScanStatus::Jammed));
    let mut h = Harness::with_devices(vec![spec]);
    h.scan("jam", &Recorder::new("a"), gray());
    h.wait_scanning_stopped(1);

    assert_eq!(
        h.failures(),
        vec![(ScanStatus::Jammed, "Unable to start scan".to_string())]
    );
    assert_eq!(h.control.open_handles(), 0);
}

#[test]
fn read_failure_reports_communication_error() {
    let mut spec = VirtualDeviceSpec::flatbed("flaky");
    spec.fail_read_after = Some((20, ScanStatus::IoError));
    let mut h = Harness::with_devices(vec![spec]);
    let recorder = Recorder::new("a");
    h.scan("flaky", &recorder, gray());
    h.wait_scanning_stopped(1);

    assert_eq!(
        h.failures(),
        vec![(ScanStatus::IoError, "Error communicating with scanner".to_string())]
    );
    let calls = recorder.calls("a");
    assert!(matches!(calls[0], PageCall::Setup(_)));
    assert_eq!(lines(&calls).len(), 1);
    assert!(!calls.contains(&PageCall::Finalize));
    assert_eq!(h.control.open_handles(), 0);
}

#[test]
fn backend_init_failure_notifies_and_stops_worker() {
    let mut backend = VirtualBackend::new(Vec::new());
    backend.fail_init = Some(ScanStatus::IoError);
    let mut h = Harness::new(backend);

    h.pump_until("init failure", |h| h.seen.contains(&ScanEvent::InitFailed));
    h.pump_until("worker exit", |h| !h.scanner.is_running());
}

#[test]
fn device_with_inverted_resolution_range_still_scans() {
    let spec = VirtualDeviceSpec::flatbed("odd").with_options(vec![
        option_count_entry(),
        string_list_option("mode", &["Color", "Gray"]),
        int_range_option("resolution", 600, 50, 0),
    ]);
    let mut h = Harness::with_devices(vec![spec]);
    let recorder = Recorder::new("a");
    h.scan("odd", &recorder, gray());
    h.wait_scanning_stopped(1);

    assert!(h.failures().is_empty());
    assert_eq!(lines(&recorder.calls("a")).len(), 8);
    assert_eq!(h.control.last_set("resolution"), None);
    assert!(h.scanner.is_running());

    // The worker keeps serving requests.
    h.scan("odd", &recorder.sibling("b"), gray());
    h.wait_scanning_stopped(2);
    assert_eq!(recorder.calls("b").len(), 10);
}

// -- Discovery and authorisation ---------------------------------------------

#[test]
fn redetect_during_a_scan_waits_until_the_worker_is_idle() {
    let mut spec = VirtualDeviceSpec::flatbed("slow");
    spec.lines = 100;
    spec.read_delay = Some(Duration::from_millis(1));
    let mut h = Harness::with_devices(vec![spec]);
    let recorder = Recorder::new("a");
    h.scan("slow", &recorder, gray());

    h.pump_until("first page setup", |_| !recorder.calls("a").is_empty());
    h.scanner.redetect();
    h.pump_until("device list", |h| {
        h.count(|e| matches!(e, ScanEvent::DevicesUpdated(_))) == 1
    });

    let position = |pred: &dyn Fn(&ScanEvent) -> bool| h.seen.iter().position(pred);
    let stopped = position(&|e| *e == ScanEvent::ScanningChanged(false)).expect("scan finished");
    let updated = position(&|e| matches!(e, ScanEvent::DevicesUpdated(_))).expect("devices");
    assert!(stopped < updated);
    assert!(recorder.calls("a").contains(&PageCall::Finalize));

    let device_log = h.control.events();
    let at = |wanted: &DeviceEvent| device_log.iter().position(|e| e == wanted);
    let closed = at(&DeviceEvent::Closed("slow".into())).expect("closed");
    let enumerated = at(&DeviceEvent::Enumerated).expect("enumerated");
    assert!(at(&DeviceEvent::Opened("slow".into())).expect("opened") < closed);
    assert!(closed < enumerated);
}

#[test]
fn redetect_reports_ranked_devices_once_per_call() {
    let mut webcam = VirtualDeviceSpec::flatbed("v4l:/dev/video0");
    webcam.vendor = "Generic".into();
    webcam.model = "Webcam".into();
    let mut usb = VirtualDeviceSpec::flatbed("epson2:libusb:001:002");
    usb.vendor = "Epson".into();
    usb.model = "Perfection_V39".into();
    let mut net = VirtualDeviceSpec::flatbed("airscan:e0:Office");
    net.vendor = "Hewlett-Packard".into();
    net.model = "LaserJet_MFP".into();
    let mut h = Harness::with_devices(vec![webcam, net, usb]);

    let updates = |h: &Harness| -> Vec<Vec<String>> {
        h.seen
            .iter()
            .filter_map(|e| match e {
                ScanEvent::DevicesUpdated(devices) => {
                    Some(devices.iter().map(|d| d.label.clone()).collect())
                }
                _ => None,
            })
            .collect()
    };

    h.scanner.redetect();
    h.pump_until("first device list", |h| updates(h).len() == 1);
    assert_eq!(
        updates(&h)[0],
        vec!["Epson Perfection V39", "HP LaserJet MFP", "Generic Webcam"]
    );

    h.control.detach("v4l:/dev/video0");
    h.scanner.redetect();
    h.pump_until("second device list", |h| updates(h).len() == 2);
    assert_eq!(updates(&h)[1], vec!["Epson Perfection V39", "HP LaserJet MFP"]);

    h.pump_for(Duration::from_millis(50));
    assert_eq!(updates(&h).len(), 2);
}

fn secured(name: &str) -> VirtualDeviceSpec {
    let mut spec = VirtualDeviceSpec::flatbed(name);
    spec.auth_resource = Some(format!("{name}$secure"));
    spec.expected_credentials = Some(scanwerk_core::types::Credentials::new("alice", "s3cret"));
    spec
}

#[test]
fn authorization_request_is_answered_from_the_controlling_thread() {
    let mut h = Harness::with_devices(vec![secured("net:office")]);
    let recorder = Recorder::new("a");
    h.scan("net:office", &recorder, gray());

    h.pump_until("authorization request", |h| {
        h.seen
            .contains(&ScanEvent::AuthorizationRequested("net:office$secure".into()))
    });
    h.scanner.authorize("alice", "s3cret");
    h.wait_scanning_stopped(1);

    assert!(h.failures().is_empty());
    assert_eq!(recorder.calls("a").len(), 10);
    assert!(h.control.events().contains(&DeviceEvent::Authenticated {
        resource: "net:office$secure".into(),
        username: "alice".into(),
    }));
}

#[test]
fn rejected_credentials_fail_the_open() {
    let mut h = Harness::with_devices(vec![secured("net:office")]);
    h.scan("net:office", &Recorder::new("a"), gray());

    h.pump_until("authorization request", |h| {
        h.count(|e| matches!(e, ScanEvent::AuthorizationRequested(_))) == 1
    });
    h.scanner.authorize("mallory", "guess");
    h.wait_scanning_stopped(1);

    assert_eq!(
        h.failures(),
        vec![(ScanStatus::AccessDenied, "Unable to connect to scanner".to_string())]
    );
}

// -- Shutdown ----------------------------------------------------------------

#[test]
fn stop_releases_a_worker_waiting_for_credentials() {
    let mut h = Harness::with_devices(vec![secured("net:office")]);
    h.scan("net:office", &Recorder::new("a"), gray());
    h.pump_until("authorization request", |h| {
        h.count(|e| matches!(e, ScanEvent::AuthorizationRequested(_))) == 1
    });

    h.scanner.stop();
    assert!(!h.scanner.is_running());
    assert_eq!(h.control.open_handles(), 0);
}

#[test]
fn dropping_the_scanner_mid_scan_closes_the_device() {
    let mut spec = VirtualDeviceSpec::flatbed("slow");
    spec.lines = 500;
    let mut h = Harness::with_devices(vec![spec]);
    let recorder = Recorder::new("a");
    h.scan("slow", &recorder, gray());
    h.pump_until("first page setup", |_| !recorder.calls("a").is_empty());

    let control = h.control.clone();
    drop(h);
    assert_eq!(control.open_handles(), 0);
}
