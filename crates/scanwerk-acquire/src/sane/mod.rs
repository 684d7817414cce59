// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE backend — drives real scanners through the system `libsane`.
//
// Requires the `sane` cargo feature and the SANE development library at link
// time.  The C library keeps global state, so only one `SaneBackend` may be
// initialised per process; a second `init` reports `DeviceBusy`.  Every call
// happens on the scan worker thread, which satisfies SANE's requirement that
// calls be serialised.

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use scanwerk_core::status::ScanStatus;
use scanwerk_core::types::FrameFormat;
use tracing::{debug, info, warn};

use crate::backend::{
    Authenticator, BackendResult, FrameParameters, OptionCaps, OptionConstraint,
    OptionDescriptor, OptionKind, OptionValue, RawDevice, ScanBackend, ScanDevice,
};

pub mod sys;

/// Set while a `SaneBackend` holds the library initialised.
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Receiver of the library's authorisation callback, which carries no user
/// data pointer.
static AUTHENTICATOR: Mutex<Option<Arc<dyn Authenticator>>> = Mutex::new(None);

fn check(status: sys::SANE_Status) -> BackendResult<()> {
    if status == sys::SANE_STATUS_GOOD {
        Ok(())
    } else {
        Err(ScanStatus::from_code(status).unwrap_or(ScanStatus::IoError))
    }
}

/// Owned copy of a C string that may be null.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn owned(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        // SAFETY: non-null and NUL-terminated per the caller's contract.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

/// Copy `value` into a fixed-size C buffer, truncated and NUL-terminated.
///
/// # Safety
/// `dest` must be valid for writes of `capacity` bytes.
unsafe fn copy_credential(value: &str, dest: *mut c_char, capacity: usize) {
    if dest.is_null() || capacity == 0 {
        return;
    }
    let bytes = value.as_bytes();
    let len = bytes.len().min(capacity - 1);
    // SAFETY: `len + 1 <= capacity` and `dest` is writable for `capacity` bytes.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), dest.cast::<u8>(), len);
        *dest.add(len) = 0;
    }
}

unsafe extern "C" fn auth_callback(resource: sys::SANE_String_Const, username: *mut c_char, password: *mut c_char) {
    // SAFETY: the library passes a NUL-terminated resource name.
    let resource = unsafe { owned(resource) };
    let authenticator = AUTHENTICATOR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let Some(authenticator) = authenticator else {
        warn!(%resource, "credentials requested with no authenticator installed");
        return;
    };
    let credentials = authenticator.authenticate(&resource);
    // SAFETY: SANE hands out buffers of SANE_MAX_USERNAME_LEN and
    // SANE_MAX_PASSWORD_LEN bytes.
    unsafe {
        copy_credential(&credentials.username, username, sys::SANE_MAX_USERNAME_LEN);
        copy_credential(&credentials.password, password, sys::SANE_MAX_PASSWORD_LEN);
    }
}

/// Convert a library option descriptor.
///
/// # Safety
/// `raw` must come from `sane_get_option_descriptor` (or be laid out the same
/// way) with every pointer valid for its constraint type.
unsafe fn descriptor_from_raw(raw: &sys::SANE_Option_Descriptor) -> OptionDescriptor {
    let kind = match raw.type_ {
        sys::SANE_TYPE_BOOL => OptionKind::Bool,
        sys::SANE_TYPE_INT => OptionKind::Int,
        sys::SANE_TYPE_FIXED => OptionKind::Fixed,
        sys::SANE_TYPE_STRING => OptionKind::String,
        sys::SANE_TYPE_BUTTON => OptionKind::Button,
        _ => OptionKind::Group,
    };
    let word = |w: sys::SANE_Word| match kind {
        OptionKind::Fixed => sys::unfix(w),
        _ => f64::from(w),
    };

    // SAFETY: the union member read matches `constraint_type`, and the
    // library guarantees the pointed-to data for that type.
    let constraint = unsafe {
        match raw.constraint_type {
            sys::SANE_CONSTRAINT_RANGE if !raw.constraint.range.is_null() => {
                let range = &*raw.constraint.range;
                OptionConstraint::Range {
                    min: word(range.min),
                    max: word(range.max),
                    quant: word(range.quant),
                }
            }
            sys::SANE_CONSTRAINT_WORD_LIST if !raw.constraint.word_list.is_null() => {
                let list = raw.constraint.word_list;
                let count = usize::try_from(*list).unwrap_or(0);
                let words = (1..=count).map(|i| word(*list.add(i))).collect();
                OptionConstraint::WordList(words)
            }
            sys::SANE_CONSTRAINT_STRING_LIST if !raw.constraint.string_list.is_null() => {
                let mut values = Vec::new();
                let mut cursor = raw.constraint.string_list;
                while !(*cursor).is_null() {
                    values.push(owned(*cursor));
                    cursor = cursor.add(1);
                }
                OptionConstraint::StringList(values)
            }
            _ => OptionConstraint::None,
        }
    };

    OptionDescriptor {
        // SAFETY: name and title are null or NUL-terminated.
        name: unsafe { owned(raw.name) },
        title: unsafe { owned(raw.title) },
        kind,
        size: usize::try_from(raw.size).unwrap_or(0),
        caps: OptionCaps {
            soft_select: raw.cap & sys::SANE_CAP_SOFT_SELECT != 0,
            inactive: raw.cap & sys::SANE_CAP_INACTIVE != 0,
            automatic: raw.cap & sys::SANE_CAP_AUTOMATIC != 0,
        },
        constraint,
    }
}

fn parameters_from_raw(raw: &sys::SANE_Parameters) -> BackendResult<FrameParameters> {
    let format = match raw.format {
        sys::SANE_FRAME_GRAY => FrameFormat::Gray,
        sys::SANE_FRAME_RGB => FrameFormat::Rgb,
        sys::SANE_FRAME_RED => FrameFormat::Red,
        sys::SANE_FRAME_GREEN => FrameFormat::Green,
        sys::SANE_FRAME_BLUE => FrameFormat::Blue,
        other => {
            warn!(format = other, "unsupported frame format");
            return Err(ScanStatus::Unsupported);
        }
    };
    let non_negative = |v: c_int| u32::try_from(v).map_err(|_| ScanStatus::Invalid);
    Ok(FrameParameters {
        format,
        last_frame: raw.last_frame != 0,
        bytes_per_line: non_negative(raw.bytes_per_line)? as usize,
        pixels_per_line: non_negative(raw.pixels_per_line)?,
        // -1 means the device cannot tell in advance.
        lines: u32::try_from(raw.lines).ok(),
        depth: non_negative(raw.depth)?,
    })
}

/// Version string from a packed `SANE_VERSION_CODE`.
fn version_string(code: sys::SANE_Int) -> String {
    let code = code as u32;
    format!("{}.{}.{}", (code >> 24) & 0xff, (code >> 16) & 0xff, code & 0xffff)
}

// -- Backend -----------------------------------------------------------------

/// Backend backed by the system SANE library.
#[derive(Debug, Default)]
pub struct SaneBackend {
    initialised: bool,
    /// Only list devices attached to this machine.
    pub local_only: bool,
}

impl SaneBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScanBackend for SaneBackend {
    fn init(&mut self, authenticator: Arc<dyn Authenticator>) -> BackendResult<String> {
        if ACTIVE.swap(true, Ordering::SeqCst) {
            warn!("SANE is already initialised in this process");
            return Err(ScanStatus::DeviceBusy);
        }
        *AUTHENTICATOR.lock().unwrap_or_else(PoisonError::into_inner) = Some(authenticator);

        let mut version: sys::SANE_Int = 0;
        // SAFETY: `version` is a valid out-pointer and the callback matches
        // `SANE_Auth_Callback`.
        let status = unsafe { sys::sane_init(&mut version, Some(auth_callback)) };
        if let Err(status) = check(status) {
            AUTHENTICATOR.lock().unwrap_or_else(PoisonError::into_inner).take();
            ACTIVE.store(false, Ordering::SeqCst);
            return Err(status);
        }
        self.initialised = true;
        let version = version_string(version);
        info!(%version, "SANE initialised");
        Ok(version)
    }

    fn devices(&mut self) -> BackendResult<Vec<RawDevice>> {
        let mut list: *mut *const sys::SANE_Device = ptr::null_mut();
        // SAFETY: `list` is a valid out-pointer; the library owns the result
        // until the next `sane_get_devices` or `sane_exit`.
        check(unsafe { sys::sane_get_devices(&mut list, sys::SANE_Bool::from(self.local_only)) })?;

        let mut devices = Vec::new();
        if list.is_null() {
            return Ok(devices);
        }
        // SAFETY: the list is NULL-terminated and each entry is a valid device.
        unsafe {
            let mut cursor = list;
            while !(*cursor).is_null() {
                let device = &**cursor;
                devices.push(RawDevice {
                    name: owned(device.name),
                    vendor: owned(device.vendor),
                    model: owned(device.model),
                    kind: owned(device.type_),
                });
                cursor = cursor.add(1);
            }
        }
        debug!(count = devices.len(), "SANE devices listed");
        Ok(devices)
    }

    fn open(&mut self, name: &str) -> BackendResult<Box<dyn ScanDevice>> {
        let c_name = CString::new(name).map_err(|_| ScanStatus::Invalid)?;
        let mut handle: sys::SANE_Handle = ptr::null_mut();
        // SAFETY: `c_name` outlives the call and `handle` is a valid out-pointer.
        check(unsafe { sys::sane_open(c_name.as_ptr(), &mut handle) })?;
        let handle = NonNull::new(handle).ok_or(ScanStatus::IoError)?;
        debug!(device = %name, "SANE device opened");
        Ok(Box::new(SaneDevice {
            handle,
            name: name.to_string(),
        }))
    }

    fn exit(&mut self) {
        if !std::mem::take(&mut self.initialised) {
            return;
        }
        // SAFETY: the library was initialised by this backend and the worker
        // closes every handle before calling `exit`.
        unsafe { sys::sane_exit() };
        AUTHENTICATOR.lock().unwrap_or_else(PoisonError::into_inner).take();
        ACTIVE.store(false, Ordering::SeqCst);
        info!("SANE shut down");
    }
}

impl Drop for SaneBackend {
    fn drop(&mut self) {
        self.exit();
    }
}

// -- Device ------------------------------------------------------------------

/// An open SANE handle.  Dropping it calls `sane_close`.
pub struct SaneDevice {
    handle: NonNull<c_void>,
    name: String,
}

// SAFETY: a handle may move between threads as long as calls on it are
// serialised, which `&mut self` / single ownership guarantee.
unsafe impl Send for SaneDevice {}

impl SaneDevice {
    fn raw_descriptor(&self, index: usize) -> Option<&sys::SANE_Option_Descriptor> {
        let index = sys::SANE_Int::try_from(index).ok()?;
        // SAFETY: the handle is open; the library returns null past the last
        // option, and the descriptor stays valid while the handle is open.
        unsafe { sys::sane_get_option_descriptor(self.handle.as_ptr(), index).as_ref() }
    }

    fn control(&mut self, index: usize, action: c_int, value: *mut c_void) -> BackendResult<()> {
        let index = sys::SANE_Int::try_from(index).map_err(|_| ScanStatus::Invalid)?;
        let mut info: sys::SANE_Int = 0;
        // SAFETY: the handle is open and `value` is null (auto) or a buffer of
        // at least the option's size.
        check(unsafe { sys::sane_control_option(self.handle.as_ptr(), index, action, value, &mut info) })
    }
}

impl Drop for SaneDevice {
    fn drop(&mut self) {
        debug!(device = %self.name, "closing SANE handle");
        // SAFETY: the handle is open and never used after this.
        unsafe { sys::sane_close(self.handle.as_ptr()) };
    }
}

impl ScanDevice for SaneDevice {
    fn option_descriptor(&self, index: usize) -> Option<OptionDescriptor> {
        // SAFETY: the descriptor comes straight from the library.
        self.raw_descriptor(index).map(|raw| unsafe { descriptor_from_raw(raw) })
    }

    fn set_option(&mut self, index: usize, value: OptionValue) -> BackendResult<OptionValue> {
        let (kind, size) = {
            let raw = self.raw_descriptor(index).ok_or(ScanStatus::Invalid)?;
            (raw.type_, usize::try_from(raw.size).unwrap_or(0))
        };

        match (kind, value) {
            (sys::SANE_TYPE_STRING, OptionValue::String(text)) => {
                // The buffer must cover the whole option size; the library may
                // write the applied value back into it.
                let mut buffer = vec![0u8; size.max(text.len() + 1)];
                buffer[..text.len()].copy_from_slice(text.as_bytes());
                self.control(index, sys::SANE_ACTION_SET_VALUE, buffer.as_mut_ptr().cast())?;
                let applied = CStr::from_bytes_until_nul(&buffer)
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or(text);
                Ok(OptionValue::String(applied))
            }
            (sys::SANE_TYPE_BOOL | sys::SANE_TYPE_INT | sys::SANE_TYPE_FIXED, value) => {
                let word = match (kind, &value) {
                    (sys::SANE_TYPE_BOOL, OptionValue::Bool(b)) => sys::SANE_Word::from(*b),
                    (sys::SANE_TYPE_INT, OptionValue::Int(v)) => *v,
                    (sys::SANE_TYPE_FIXED, OptionValue::Fixed(v)) => sys::fix(*v),
                    _ => return Err(ScanStatus::Invalid),
                };
                // Array options are set element-wise to the same value.
                let count = (size / size_of::<sys::SANE_Word>()).max(1);
                let mut words = vec![word; count];
                self.control(index, sys::SANE_ACTION_SET_VALUE, words.as_mut_ptr().cast())?;
                let applied = words[0];
                Ok(match kind {
                    sys::SANE_TYPE_BOOL => OptionValue::Bool(applied != 0),
                    sys::SANE_TYPE_INT => OptionValue::Int(applied),
                    _ => OptionValue::Fixed(sys::unfix(applied)),
                })
            }
            _ => Err(ScanStatus::Invalid),
        }
    }

    fn set_option_auto(&mut self, index: usize) -> BackendResult<()> {
        self.control(index, sys::SANE_ACTION_SET_AUTO, ptr::null_mut())
    }

    fn start(&mut self) -> BackendResult<()> {
        // SAFETY: the handle is open.
        check(unsafe { sys::sane_start(self.handle.as_ptr()) })
    }

    fn parameters(&self) -> BackendResult<FrameParameters> {
        let mut raw = sys::SANE_Parameters::default();
        // SAFETY: the handle is open and `raw` is a valid out-pointer.
        check(unsafe { sys::sane_get_parameters(self.handle.as_ptr(), &mut raw) })?;
        parameters_from_raw(&raw)
    }

    fn read(&mut self, buf: &mut [u8]) -> BackendResult<usize> {
        let max = sys::SANE_Int::try_from(buf.len()).unwrap_or(sys::SANE_Int::MAX);
        let mut length: sys::SANE_Int = 0;
        // SAFETY: `buf` is writable for at least `max` bytes.
        check(unsafe { sys::sane_read(self.handle.as_ptr(), buf.as_mut_ptr(), max, &mut length) })?;
        Ok(usize::try_from(length).unwrap_or(0))
    }

    fn cancel(&mut self) {
        // SAFETY: the handle is open.
        unsafe { sys::sane_cancel(self.handle.as_ptr()) };
    }
}
