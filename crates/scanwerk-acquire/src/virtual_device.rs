// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process scanner backend.
//
// Behaves like a SANE test backend: it exposes configurable option sets,
// produces deterministic sample data, feeds a fixed number of pages, can
// split colour pages into three single-channel passes, and can be told to
// fail at open, start or read time or to demand credentials.  Every call is
// recorded in a shared `DeviceLog` so callers can assert on what the worker
// did to the device.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use scanwerk_core::status::ScanStatus;
use scanwerk_core::types::{Credentials, FrameFormat};
use tracing::debug;

use crate::backend::{
    Authenticator, BackendResult, FrameParameters, OptionCaps, OptionConstraint,
    OptionDescriptor, OptionKind, OptionValue, RawDevice, ScanBackend, ScanDevice,
};

// -- Descriptor helpers ------------------------------------------------------

fn descriptor(name: &str, kind: OptionKind, size: usize, constraint: OptionConstraint) -> OptionDescriptor {
    OptionDescriptor {
        name: name.into(),
        title: name.replace('-', " "),
        kind,
        size,
        caps: OptionCaps {
            soft_select: true,
            inactive: false,
            automatic: false,
        },
        constraint,
    }
}

/// The anonymous leading entry SANE devices report (the option count).
pub fn option_count_entry() -> OptionDescriptor {
    let mut entry = descriptor("", OptionKind::Int, 4, OptionConstraint::None);
    entry.caps.soft_select = false;
    entry
}

pub fn group_entry(title: &str) -> OptionDescriptor {
    let mut entry = descriptor("", OptionKind::Group, 0, OptionConstraint::None);
    entry.title = title.into();
    entry
}

pub fn bool_option(name: &str) -> OptionDescriptor {
    descriptor(name, OptionKind::Bool, 4, OptionConstraint::None)
}

pub fn string_list_option(name: &str, values: &[&str]) -> OptionDescriptor {
    let size = values.iter().map(|v| v.len() + 1).max().unwrap_or(1);
    descriptor(
        name,
        OptionKind::String,
        size,
        OptionConstraint::StringList(values.iter().map(|v| (*v).to_string()).collect()),
    )
}

pub fn int_list_option(name: &str, values: &[i32]) -> OptionDescriptor {
    descriptor(
        name,
        OptionKind::Int,
        4,
        OptionConstraint::WordList(values.iter().map(|v| f64::from(*v)).collect()),
    )
}

pub fn int_range_option(name: &str, min: i32, max: i32, quant: i32) -> OptionDescriptor {
    descriptor(
        name,
        OptionKind::Int,
        4,
        OptionConstraint::Range {
            min: f64::from(min),
            max: f64::from(max),
            quant: f64::from(quant),
        },
    )
}

pub fn fixed_range_option(name: &str, min: f64, max: f64) -> OptionDescriptor {
    descriptor(
        name,
        OptionKind::Fixed,
        4,
        OptionConstraint::Range { min, max, quant: 0.0 },
    )
}

// -- Device specification ----------------------------------------------------

/// Shape and behaviour of one simulated device.
#[derive(Debug, Clone)]
pub struct VirtualDeviceSpec {
    pub name: String,
    pub vendor: String,
    pub model: String,
    pub kind: String,
    pub options: Vec<OptionDescriptor>,
    /// Pages in the feeder at open time.  Each new page consumes one; a start
    /// with none left reports `NoDocs`.
    pub pages: u32,
    pub pixels_per_line: u32,
    pub lines: u32,
    /// Whether `parameters` reports the line count (false = unknown height).
    pub announce_lines: bool,
    /// Split colour pages into red, green and blue passes.
    pub three_pass: bool,
    /// Sample depth when no `depth` option is set.
    pub depth: u32,
    /// Largest number of bytes handed out per `read` call.
    pub read_chunk: usize,
    /// Pause before every `read`, to give cancellation a window.
    pub read_delay: Option<Duration>,
    pub fail_open: Option<ScanStatus>,
    /// Fail `start` for the given zero-based page.
    pub fail_start: Option<(u32, ScanStatus)>,
    /// Fail `read` once this many bytes have been delivered since open.
    pub fail_read_after: Option<(usize, ScanStatus)>,
    /// Resource name to request credentials for when opening.
    pub auth_resource: Option<String>,
    /// Credentials accepted for `auth_resource`; any pair is accepted if `None`.
    pub expected_credentials: Option<Credentials>,
}

impl Default for VirtualDeviceSpec {
    fn default() -> Self {
        Self {
            name: "test:0".into(),
            vendor: "Noname".into(),
            model: "frontend-tester".into(),
            kind: "virtual device".into(),
            options: Vec::new(),
            pages: 1,
            pixels_per_line: 16,
            lines: 8,
            announce_lines: true,
            three_pass: false,
            depth: 8,
            read_chunk: 7,
            read_delay: None,
            fail_open: None,
            fail_start: None,
            fail_read_after: None,
            auth_resource: None,
            expected_credentials: None,
        }
    }
}

impl VirtualDeviceSpec {
    /// A flatbed with the common SANE option set.  The glass never runs dry.
    pub fn flatbed(name: &str) -> Self {
        Self {
            name: name.into(),
            pages: u32::MAX,
            options: vec![
                option_count_entry(),
                group_entry("Scan Mode"),
                string_list_option("source", &["Flatbed", "Transparency Adapter"]),
                string_list_option("mode", &["Color", "Gray", "Lineart"]),
                int_list_option("resolution", &[75, 150, 300, 600, 1200]),
                int_list_option("depth", &[1, 8, 16]),
                group_entry("Geometry"),
                fixed_range_option("tl-x", 0.0, 215.9),
                fixed_range_option("tl-y", 0.0, 297.2),
                fixed_range_option("br-x", 0.0, 215.9),
                fixed_range_option("br-y", 0.0, 297.2),
            ],
            ..Self::default()
        }
    }

    /// A sheet-fed device with a duplex-capable feeder.
    pub fn sheetfed(name: &str, pages: u32) -> Self {
        Self {
            name: name.into(),
            pages,
            options: vec![
                option_count_entry(),
                string_list_option("source", &["Flatbed", "ADF Front", "ADF Back", "ADF Duplex"]),
                string_list_option("mode", &["Color", "Gray", "Lineart"]),
                int_range_option("resolution", 50, 600, 1),
                bool_option("duplex"),
                bool_option("batch-scan"),
                string_list_option("compression", &["None", "JPEG"]),
                fixed_range_option("br-x", 0.0, 215.9),
                fixed_range_option("br-y", 0.0, 355.6),
                fixed_range_option("page-width", 0.0, 215.9),
                fixed_range_option("page-height", 0.0, 355.6),
            ],
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: Vec<OptionDescriptor>) -> Self {
        self.options = options;
        self
    }

    fn raw_device(&self) -> RawDevice {
        RawDevice {
            name: self.name.clone(),
            vendor: self.vendor.clone(),
            model: self.model.clone(),
            kind: self.kind.clone(),
        }
    }
}

// -- Call log ----------------------------------------------------------------

/// One observable interaction with a simulated device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// The backend listed its devices.
    Enumerated,
    Opened(String),
    Closed(String),
    OptionSet { name: String, value: OptionValue },
    OptionAuto(String),
    Started { page: u32, pass: u32 },
    Cancelled,
    Authenticated { resource: String, username: String },
}

/// Shared record of device interactions.
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub events: Vec<DeviceEvent>,
    pub open_handles: usize,
    pub max_open_handles: usize,
}

type SharedLog = Arc<Mutex<DeviceLog>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// -- Backend -----------------------------------------------------------------

/// Handle for inspecting and reshaping a [`VirtualBackend`] after it has been
/// moved onto the worker thread.
#[derive(Clone, Default)]
pub struct VirtualBackendControl {
    devices: Arc<Mutex<Vec<VirtualDeviceSpec>>>,
    log: SharedLog,
}

impl VirtualBackendControl {
    /// Plug in a device; visible on the next device listing.
    pub fn attach(&self, spec: VirtualDeviceSpec) {
        lock(&self.devices).push(spec);
    }

    /// Unplug every device with `name`.
    pub fn detach(&self, name: &str) {
        lock(&self.devices).retain(|d| d.name != name);
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        lock(&self.log).events.clone()
    }

    pub fn open_handles(&self) -> usize {
        lock(&self.log).open_handles
    }

    pub fn max_open_handles(&self) -> usize {
        lock(&self.log).max_open_handles
    }

    /// Last value set for option `name`, if any.
    pub fn last_set(&self, name: &str) -> Option<OptionValue> {
        last_set_in(&lock(&self.log).events, name)
    }
}

fn last_set_in(events: &[DeviceEvent], name: &str) -> Option<OptionValue> {
    events.iter().rev().find_map(|e| match e {
        DeviceEvent::OptionSet { name: n, value } if n == name => Some(value.clone()),
        _ => None,
    })
}

/// Simulated backend serving the devices registered on its control handle.
pub struct VirtualBackend {
    control: VirtualBackendControl,
    authenticator: Option<Arc<dyn Authenticator>>,
    /// Make `init` fail with this status.
    pub fail_init: Option<ScanStatus>,
    /// Make `devices` fail with this status.
    pub fail_devices: Option<ScanStatus>,
}

impl VirtualBackend {
    pub fn new(devices: Vec<VirtualDeviceSpec>) -> Self {
        let control = VirtualBackendControl::default();
        for spec in devices {
            control.attach(spec);
        }
        Self {
            control,
            authenticator: None,
            fail_init: None,
            fail_devices: None,
        }
    }

    pub fn control(&self) -> VirtualBackendControl {
        self.control.clone()
    }
}

impl ScanBackend for VirtualBackend {
    fn init(&mut self, authenticator: Arc<dyn Authenticator>) -> BackendResult<String> {
        if let Some(status) = self.fail_init {
            return Err(status);
        }
        self.authenticator = Some(authenticator);
        Ok("virtual 1.0.0".into())
    }

    fn devices(&mut self) -> BackendResult<Vec<RawDevice>> {
        lock(&self.control.log).events.push(DeviceEvent::Enumerated);
        if let Some(status) = self.fail_devices {
            return Err(status);
        }
        Ok(lock(&self.control.devices)
            .iter()
            .map(VirtualDeviceSpec::raw_device)
            .collect())
    }

    fn open(&mut self, name: &str) -> BackendResult<Box<dyn ScanDevice>> {
        let spec = lock(&self.control.devices)
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or(ScanStatus::Invalid)?;

        if let Some(status) = spec.fail_open {
            return Err(status);
        }

        if let Some(resource) = &spec.auth_resource {
            let authenticator = self.authenticator.as_ref().ok_or(ScanStatus::AccessDenied)?;
            let credentials = authenticator.authenticate(resource);
            lock(&self.control.log).events.push(DeviceEvent::Authenticated {
                resource: resource.clone(),
                username: credentials.username.clone(),
            });
            if spec
                .expected_credentials
                .as_ref()
                .is_some_and(|expected| *expected != credentials)
            {
                return Err(ScanStatus::AccessDenied);
            }
        }

        Ok(Box::new(VirtualDevice::open(spec, Arc::clone(&self.control.log))))
    }
}

// -- Device ------------------------------------------------------------------

struct Frame {
    params: FrameParameters,
    page: u32,
    produced: usize,
    total: usize,
}

/// An open simulated device.
pub struct VirtualDevice {
    spec: VirtualDeviceSpec,
    values: Vec<Option<OptionValue>>,
    log: SharedLog,
    pages_left: u32,
    pages_fed: u32,
    pass: u32,
    frame: Option<Frame>,
    bytes_delivered: usize,
}

impl VirtualDevice {
    fn open(spec: VirtualDeviceSpec, log: SharedLog) -> Self {
        {
            let mut log = lock(&log);
            log.events.push(DeviceEvent::Opened(spec.name.clone()));
            log.open_handles += 1;
            log.max_open_handles = log.max_open_handles.max(log.open_handles);
        }
        debug!(device = %spec.name, "virtual device opened");
        Self {
            values: vec![None; spec.options.len()],
            pages_left: spec.pages,
            pages_fed: 0,
            pass: 0,
            frame: None,
            bytes_delivered: 0,
            spec,
            log,
        }
    }

    /// Open a device outside any backend, with a private log.
    pub fn detached(spec: VirtualDeviceSpec) -> Self {
        Self::open(spec, SharedLog::default())
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        lock(&self.log).events.clone()
    }

    /// Last value set for option `name` on this handle's log.
    pub fn last_set(&self, name: &str) -> Option<OptionValue> {
        last_set_in(&lock(&self.log).events, name)
    }

    /// Whether option `name` was handed to the device's automatic mode.
    pub fn was_set_auto(&self, name: &str) -> bool {
        lock(&self.log)
            .events
            .iter()
            .any(|e| matches!(e, DeviceEvent::OptionAuto(n) if n == name))
    }

    fn value_of(&self, name: &str) -> Option<&OptionValue> {
        let index = self.spec.options.iter().position(|o| o.name == name)?;
        self.values[index].as_ref()
    }

    /// Frame formats making up one page under the current option values.
    fn page_frames(&self) -> (Vec<FrameFormat>, u32) {
        let depth = match self.value_of("depth") {
            Some(OptionValue::Int(d)) => *d as u32,
            _ => self.spec.depth,
        };
        let mode = match self.value_of("mode") {
            Some(OptionValue::String(m)) => m.to_ascii_lowercase(),
            _ => "color".into(),
        };
        if mode.contains("color") {
            let depth = if depth == 1 { 8 } else { depth };
            if self.spec.three_pass {
                (vec![FrameFormat::Red, FrameFormat::Green, FrameFormat::Blue], depth)
            } else {
                (vec![FrameFormat::Rgb], depth)
            }
        } else if mode.contains("gray") {
            (vec![FrameFormat::Gray], if depth == 1 { 8 } else { depth })
        } else {
            (vec![FrameFormat::Gray], 1)
        }
    }

    fn sample(page: u32, offset: usize) -> u8 {
        ((page as usize * 31 + offset * 7) & 0xff) as u8
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        let mut log = lock(&self.log);
        log.events.push(DeviceEvent::Closed(self.spec.name.clone()));
        log.open_handles = log.open_handles.saturating_sub(1);
    }
}

impl ScanDevice for VirtualDevice {
    fn option_descriptor(&self, index: usize) -> Option<OptionDescriptor> {
        self.spec.options.get(index).cloned()
    }

    fn set_option(&mut self, index: usize, value: OptionValue) -> BackendResult<OptionValue> {
        let option = self.spec.options.get(index).ok_or(ScanStatus::Invalid)?;
        if !option.caps.soft_select || !option.is_active() {
            return Err(ScanStatus::Invalid);
        }
        let valid = match (&option.kind, &value) {
            (OptionKind::Bool, OptionValue::Bool(_)) => true,
            (OptionKind::Int, OptionValue::Int(_)) | (OptionKind::Fixed, OptionValue::Fixed(_)) => {
                let v = value.as_f64().unwrap_or_default();
                match &option.constraint {
                    OptionConstraint::Range { min, max, .. } => v >= *min && v <= *max,
                    OptionConstraint::WordList(words) => words.iter().any(|w| *w == v),
                    _ => true,
                }
            }
            (OptionKind::String, OptionValue::String(s)) => match &option.constraint {
                OptionConstraint::StringList(list) => list.contains(s),
                _ => s.len() < option.size,
            },
            _ => false,
        };
        if !valid {
            return Err(ScanStatus::Invalid);
        }
        lock(&self.log).events.push(DeviceEvent::OptionSet {
            name: option.name.clone(),
            value: value.clone(),
        });
        self.values[index] = Some(value.clone());
        Ok(value)
    }

    fn set_option_auto(&mut self, index: usize) -> BackendResult<()> {
        let option = self.spec.options.get(index).ok_or(ScanStatus::Invalid)?;
        if !option.caps.automatic {
            return Err(ScanStatus::Invalid);
        }
        lock(&self.log)
            .events
            .push(DeviceEvent::OptionAuto(option.name.clone()));
        self.values[index] = None;
        Ok(())
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.pass == 0 {
            if let Some((page, status)) = self.spec.fail_start {
                if page == self.pages_fed {
                    return Err(status);
                }
            }
            if self.pages_left == 0 {
                return Err(ScanStatus::NoDocs);
            }
            self.pages_left -= 1;
            self.pages_fed += 1;
        }
        let page = self.pages_fed - 1;
        let (frames, depth) = self.page_frames();
        let format = frames
            .get(self.pass as usize)
            .copied()
            .ok_or(ScanStatus::Invalid)?;
        let bits_per_line =
            self.spec.pixels_per_line as usize * format.samples_per_pixel() as usize * depth as usize;
        let bytes_per_line = bits_per_line.div_ceil(8);
        let params = FrameParameters {
            format,
            last_frame: self.pass as usize + 1 == frames.len(),
            bytes_per_line,
            pixels_per_line: self.spec.pixels_per_line,
            lines: self.spec.announce_lines.then_some(self.spec.lines),
            depth,
        };
        lock(&self.log).events.push(DeviceEvent::Started {
            page,
            pass: self.pass,
        });
        self.frame = Some(Frame {
            params,
            page,
            produced: 0,
            total: bytes_per_line * self.spec.lines as usize,
        });
        Ok(())
    }

    fn parameters(&self) -> BackendResult<FrameParameters> {
        self.frame
            .as_ref()
            .map(|f| f.params.clone())
            .ok_or(ScanStatus::Invalid)
    }

    fn read(&mut self, buf: &mut [u8]) -> BackendResult<usize> {
        if let Some(delay) = self.spec.read_delay {
            thread::sleep(delay);
        }
        if let Some((after, status)) = self.spec.fail_read_after {
            if self.bytes_delivered >= after {
                return Err(status);
            }
        }
        let frame = self.frame.as_mut().ok_or(ScanStatus::Invalid)?;
        if frame.produced == frame.total {
            let last = frame.params.last_frame;
            self.frame = None;
            self.pass = if last { 0 } else { self.pass + 1 };
            return Err(ScanStatus::Eof);
        }
        let n = buf
            .len()
            .min(self.spec.read_chunk.max(1))
            .min(frame.total - frame.produced);
        for (i, byte) in buf[..n].iter_mut().enumerate() {
            *byte = Self::sample(frame.page, frame.produced + i);
        }
        frame.produced += n;
        self.bytes_delivered += n;
        Ok(n)
    }

    fn cancel(&mut self) {
        self.frame = None;
        self.pass = 0;
        lock(&self.log).events.push(DeviceEvent::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoAuth;

    impl Authenticator for NoAuth {
        fn authenticate(&self, _resource: &str) -> Credentials {
            Credentials::new("", "")
        }
    }

    fn read_frame(device: &mut dyn ScanDevice) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match device.read(&mut buf) {
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(ScanStatus::Eof) => return out,
                Err(other) => panic!("unexpected status {other}"),
            }
        }
    }

    #[test]
    fn feeder_runs_dry_after_configured_pages() {
        let mut device = VirtualDevice::detached(VirtualDeviceSpec::sheetfed("adf", 2));
        for _ in 0..2 {
            device.start().expect("start");
            let params = device.parameters().expect("params");
            let data = read_frame(&mut device);
            assert_eq!(data.len(), params.bytes_per_line * 8);
        }
        assert_eq!(device.start(), Err(ScanStatus::NoDocs));
    }

    #[test]
    fn three_pass_colour_reports_last_frame_on_blue() {
        let mut spec = VirtualDeviceSpec::flatbed("tp");
        spec.three_pass = true;
        let mut device = VirtualDevice::detached(spec);
        let mut formats = Vec::new();
        loop {
            device.start().expect("start");
            let params = device.parameters().expect("params");
            formats.push(params.format);
            read_frame(&mut device);
            if params.last_frame {
                break;
            }
        }
        assert_eq!(
            formats,
            vec![FrameFormat::Red, FrameFormat::Green, FrameFormat::Blue]
        );
    }

    #[test]
    fn rejects_values_outside_constraints() {
        let mut device = VirtualDevice::detached(VirtualDeviceSpec::flatbed("fb"));
        // index 4 is "resolution" with a word list
        assert_eq!(
            device.set_option(4, OptionValue::Int(301)),
            Err(ScanStatus::Invalid)
        );
        assert_eq!(
            device.set_option(4, OptionValue::Int(300)),
            Ok(OptionValue::Int(300))
        );
    }

    #[test]
    fn lineart_mode_produces_packed_one_bit_lines() {
        let mut device = VirtualDevice::detached(VirtualDeviceSpec::flatbed("fb"));
        device
            .set_option(3, OptionValue::String("Lineart".into()))
            .expect("mode");
        device.start().expect("start");
        let params = device.parameters().expect("params");
        assert_eq!(params.depth, 1);
        assert_eq!(params.bytes_per_line, 2); // 16 pixels
    }

    #[test]
    fn mode_change_between_passes_fails_the_start() {
        let mut spec = VirtualDeviceSpec::flatbed("tp");
        spec.three_pass = true;
        let mut device = VirtualDevice::detached(spec);
        device.start().expect("red pass");
        read_frame(&mut device);
        // index 3 is "mode"; gray has a single frame, so there is no second pass
        device
            .set_option(3, OptionValue::String("Gray".into()))
            .expect("mode");
        assert_eq!(device.start(), Err(ScanStatus::Invalid));
    }

    #[test]
    fn backend_tracks_open_handles() {
        let mut backend = VirtualBackend::new(vec![VirtualDeviceSpec::flatbed("fb")]);
        let control = backend.control();
        backend.init(Arc::new(NoAuth)).expect("init");
        let device = backend.open("fb").expect("open");
        assert_eq!(control.open_handles(), 1);
        drop(device);
        assert_eq!(control.open_handles(), 0);
        assert_eq!(
            control.events(),
            vec![DeviceEvent::Opened("fb".into()), DeviceEvent::Closed("fb".into())]
        );
    }

    #[test]
    fn unknown_device_fails_to_open() {
        let mut backend = VirtualBackend::new(Vec::new());
        backend.init(Arc::new(NoAuth)).expect("init");
        assert_eq!(backend.open("missing").err(), Some(ScanStatus::Invalid));
    }
}
