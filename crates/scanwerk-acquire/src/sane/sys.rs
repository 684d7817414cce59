// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw bindings to the SANE 1.x C API (`sane/sane.h`), linked against the
// system `libsane`.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

pub type SANE_Word = c_int;
pub type SANE_Int = SANE_Word;
pub type SANE_Bool = SANE_Word;
pub type SANE_Fixed = SANE_Word;
pub type SANE_Status = c_int;
pub type SANE_Handle = *mut c_void;
pub type SANE_String_Const = *const c_char;

pub const SANE_STATUS_GOOD: SANE_Status = 0;

pub const SANE_TYPE_BOOL: c_int = 0;
pub const SANE_TYPE_INT: c_int = 1;
pub const SANE_TYPE_FIXED: c_int = 2;
pub const SANE_TYPE_STRING: c_int = 3;
pub const SANE_TYPE_BUTTON: c_int = 4;
pub const SANE_TYPE_GROUP: c_int = 5;

pub const SANE_CAP_SOFT_SELECT: SANE_Int = 1 << 0;
pub const SANE_CAP_AUTOMATIC: SANE_Int = 1 << 4;
pub const SANE_CAP_INACTIVE: SANE_Int = 1 << 5;

pub const SANE_CONSTRAINT_NONE: c_int = 0;
pub const SANE_CONSTRAINT_RANGE: c_int = 1;
pub const SANE_CONSTRAINT_WORD_LIST: c_int = 2;
pub const SANE_CONSTRAINT_STRING_LIST: c_int = 3;

pub const SANE_ACTION_SET_VALUE: c_int = 1;
pub const SANE_ACTION_SET_AUTO: c_int = 2;

pub const SANE_FRAME_GRAY: c_int = 0;
pub const SANE_FRAME_RGB: c_int = 1;
pub const SANE_FRAME_RED: c_int = 2;
pub const SANE_FRAME_GREEN: c_int = 3;
pub const SANE_FRAME_BLUE: c_int = 4;

pub const SANE_FIXED_SCALE_SHIFT: u32 = 16;
pub const SANE_MAX_USERNAME_LEN: usize = 128;
pub const SANE_MAX_PASSWORD_LEN: usize = 128;

#[repr(C)]
pub struct SANE_Device {
    pub name: SANE_String_Const,
    pub vendor: SANE_String_Const,
    pub model: SANE_String_Const,
    pub type_: SANE_String_Const,
}

#[repr(C)]
pub struct SANE_Range {
    pub min: SANE_Word,
    pub max: SANE_Word,
    pub quant: SANE_Word,
}

/// The constraint union; which member is valid follows `constraint_type`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union SANE_Constraint {
    pub string_list: *const SANE_String_Const,
    pub word_list: *const SANE_Word,
    pub range: *const SANE_Range,
}

#[repr(C)]
pub struct SANE_Option_Descriptor {
    pub name: SANE_String_Const,
    pub title: SANE_String_Const,
    pub desc: SANE_String_Const,
    pub type_: c_int,
    pub unit: c_int,
    pub size: SANE_Int,
    pub cap: SANE_Int,
    pub constraint_type: c_int,
    pub constraint: SANE_Constraint,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SANE_Parameters {
    pub format: c_int,
    pub last_frame: SANE_Bool,
    pub bytes_per_line: SANE_Int,
    pub pixels_per_line: SANE_Int,
    pub lines: SANE_Int,
    pub depth: SANE_Int,
}

pub type SANE_Auth_Callback =
    Option<unsafe extern "C" fn(resource: SANE_String_Const, username: *mut c_char, password: *mut c_char)>;

#[link(name = "sane")]
unsafe extern "C" {
    pub fn sane_init(version_code: *mut SANE_Int, authorize: SANE_Auth_Callback) -> SANE_Status;
    pub fn sane_exit();
    pub fn sane_get_devices(device_list: *mut *mut *const SANE_Device, local_only: SANE_Bool) -> SANE_Status;
    pub fn sane_open(name: SANE_String_Const, handle: *mut SANE_Handle) -> SANE_Status;
    pub fn sane_close(handle: SANE_Handle);
    pub fn sane_get_option_descriptor(handle: SANE_Handle, option: SANE_Int) -> *const SANE_Option_Descriptor;
    pub fn sane_control_option(
        handle: SANE_Handle,
        option: SANE_Int,
        action: c_int,
        value: *mut c_void,
        info: *mut SANE_Int,
    ) -> SANE_Status;
    pub fn sane_get_parameters(handle: SANE_Handle, params: *mut SANE_Parameters) -> SANE_Status;
    pub fn sane_start(handle: SANE_Handle) -> SANE_Status;
    pub fn sane_read(handle: SANE_Handle, data: *mut u8, max_length: SANE_Int, length: *mut SANE_Int) -> SANE_Status;
    pub fn sane_cancel(handle: SANE_Handle);
}

/// `SANE_UNFIX`.
pub fn unfix(value: SANE_Fixed) -> f64 {
    f64::from(value) / f64::from(1u32 << SANE_FIXED_SCALE_SHIFT)
}

/// `SANE_FIX`.
pub fn fix(value: f64) -> SANE_Fixed {
    (value * f64::from(1u32 << SANE_FIXED_SCALE_SHIFT)) as SANE_Fixed
}
