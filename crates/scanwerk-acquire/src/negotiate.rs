// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Option negotiation: map one device-agnostic scan policy onto whatever
// options a concrete device exposes.
//
// Backends disagree on option values ("Flatbed" vs "FlatBed", "Gray" vs
// "True Gray") so every string dimension is an ordered list of candidate
// spellings and the first one the device offers wins.  Numeric values are
// clamped into the option's range or snapped to its nearest listed value.
// A missing option skips its dimension; nothing here fails a job.

use scanwerk_core::types::{ScanMode, ScanOptions, ScanType};
use tracing::{debug, warn};

use crate::backend::{OptionConstraint, OptionKind, OptionValue, ScanDevice};
use crate::registry::{OptionRegistry, RegisteredOption};

/// Well-known option names.
pub mod names {
    pub const SOURCE: &str = "source";
    pub const MODE: &str = "mode";
    pub const RESOLUTION: &str = "resolution";
    pub const DEPTH: &str = "depth";
    pub const DUPLEX: &str = "duplex";
    pub const BATCH_SCAN: &str = "batch-scan";
    pub const COMPRESSION: &str = "compression";
    pub const BR_X: &str = "br-x";
    pub const BR_Y: &str = "br-y";
    pub const PAGE_WIDTH: &str = "page-width";
    pub const PAGE_HEIGHT: &str = "page-height";
}

pub const FLATBED_SOURCES: &[&str] = &["Auto", "Flatbed", "FlatBed", "Normal"];

pub const ADF_SOURCES: &[&str] = &[
    "Automatic Document Feeder",
    "ADF",
    "Automatic Document Feeder(left aligned)",
    "Automatic Document Feeder(centrally aligned)",
];

pub const ADF_FRONT_SOURCES: &[&str] = &["ADF Front"];
pub const ADF_BACK_SOURCES: &[&str] = &["ADF Back"];
pub const ADF_DUPLEX_SOURCES: &[&str] = &["ADF Duplex"];

pub const COLOR_MODES: &[&str] = &["Color", "24bit Color"];
pub const GRAY_MODES: &[&str] = &["Gray", "Grayscale", "True Gray"];

/// Lineart spellings, falling back to gray when the device has no
/// binary mode at all.
pub const LINEART_MODES: &[&str] = &[
    "Lineart",
    "LineArt",
    "Black & White",
    "Binary",
    "Thresholded",
    "Gray",
    "Grayscale",
    "True Gray",
];

pub const COMPRESSION_OFF: &[&str] = &["None", "none"];

/// Apply `options` to `device`.
///
/// Numeric fields of `options` are overwritten with the values the device
/// actually accepted so later stages report ground truth.
pub fn negotiate(device: &mut dyn ScanDevice, registry: &OptionRegistry, options: &mut ScanOptions) {
    if let Some(option) = registry.lookup(names::SOURCE) {
        negotiate_source(device, option, options.scan_type);
    }

    // Mode before resolution: it tends to change the resolution list.
    if let Some(option) = registry.lookup(names::MODE) {
        let candidates = match options.mode {
            ScanMode::Color => Some(COLOR_MODES),
            ScanMode::Gray => Some(GRAY_MODES),
            ScanMode::Lineart => Some(LINEART_MODES),
            ScanMode::Default => None,
        };
        if let Some(candidates) = candidates {
            if set_constrained_string(device, option, candidates).is_none() {
                warn!(mode = ?options.mode, "unable to set scan mode");
            }
        }
    }

    if let Some(option) = registry.lookup(names::DUPLEX) {
        if option.descriptor.kind == OptionKind::Bool {
            set_bool(device, option, options.scan_type == ScanType::AdfDuplex);
        }
    }

    if let Some(option) = registry.lookup(names::BATCH_SCAN) {
        if option.descriptor.kind == OptionKind::Bool {
            set_bool(device, option, options.scan_type.is_multi_page());
        }
    }

    // Compression is applied after scanning, never by the device.
    if let Some(option) = registry.lookup(names::COMPRESSION) {
        if set_constrained_string(device, option, COMPRESSION_OFF).is_none() {
            warn!("unable to disable compression");
        }
    }

    if let Some(option) = registry.lookup(names::RESOLUTION) {
        if let Some(dpi) = set_numeric(device, option, options.dpi) {
            options.dpi = dpi;
        }
    }

    if options.depth > 0 {
        if let Some(option) = registry.lookup(names::DEPTH) {
            if let Some(depth) = set_numeric(device, option, f64::from(options.depth)) {
                options.depth = depth.round() as u32;
            }
        }
    }

    // Some devices default to a partial scan area.
    for name in [names::BR_X, names::BR_Y] {
        if let Some(option) = registry.lookup(name) {
            set_to_max(device, option);
        }
    }

    if options.paper_width > 0.0 {
        if let Some(option) = registry.lookup(names::PAGE_WIDTH) {
            if let Some(width) = set_numeric(device, option, options.paper_width) {
                options.paper_width = width;
            }
        }
    }
    if options.paper_height > 0.0 {
        if let Some(option) = registry.lookup(names::PAGE_HEIGHT) {
            if let Some(height) = set_numeric(device, option, options.paper_height) {
                options.paper_height = height;
            }
        }
    }
}

fn negotiate_source(device: &mut dyn ScanDevice, option: &RegisteredOption, scan_type: ScanType) {
    let (preferred, fallback): (&[&str], &[&str]) = match scan_type {
        ScanType::Single => {
            if option.descriptor.caps.automatic && device.set_option_auto(option.index).is_ok() {
                debug!("source left to the device");
                return;
            }
            (FLATBED_SOURCES, &[])
        }
        ScanType::AdfFront => (ADF_FRONT_SOURCES, ADF_SOURCES),
        ScanType::AdfBack => (ADF_BACK_SOURCES, ADF_SOURCES),
        ScanType::AdfDuplex => (ADF_DUPLEX_SOURCES, ADF_SOURCES),
    };
    if set_constrained_string(device, option, preferred).is_none()
        && set_constrained_string(device, option, fallback).is_none()
    {
        warn!(?scan_type, "unable to select a matching scan source");
    }
}

/// Set the first candidate offered by the option's string list.
///
/// Returns the value that was set.  Options without a string-list
/// constraint never match.
pub fn set_constrained_string(
    device: &mut dyn ScanDevice,
    option: &RegisteredOption,
    candidates: &[&str],
) -> Option<String> {
    let OptionConstraint::StringList(offered) = &option.descriptor.constraint else {
        return None;
    };
    for candidate in candidates {
        if !offered.iter().any(|o| o == candidate) {
            continue;
        }
        match device.set_option(option.index, OptionValue::String((*candidate).to_string())) {
            Ok(_) => {
                debug!(option = %option.descriptor.name, value = %candidate, "option set");
                return Some((*candidate).to_string());
            }
            Err(status) => {
                debug!(option = %option.descriptor.name, value = %candidate, %status, "device refused value");
            }
        }
    }
    None
}

pub fn set_bool(device: &mut dyn ScanDevice, option: &RegisteredOption, value: bool) -> bool {
    match device.set_option(option.index, OptionValue::Bool(value)) {
        Ok(_) => {
            debug!(option = %option.descriptor.name, value, "option set");
            true
        }
        Err(status) => {
            warn!(option = %option.descriptor.name, value, %status, "unable to set option");
            false
        }
    }
}

/// Fit `value` into a numeric constraint.
///
/// Ranges clamp to their bounds after snapping to the quantisation step;
/// word lists pick the nearest entry (the first one on a tie).  Returns
/// `None` for a range the device reported with non-finite bounds or with
/// `min > max`.
pub fn clamp_to_constraint(constraint: &OptionConstraint, value: f64) -> Option<f64> {
    match constraint {
        OptionConstraint::Range { min, max, quant } => {
            let (min, max) = (*min, *max);
            if !min.is_finite() || !max.is_finite() || min > max {
                return None;
            }
            let quant = if quant.is_finite() { *quant } else { 0.0 };
            let snapped = if quant > 0.0 {
                min + ((value - min) / quant).round() * quant
            } else {
                value
            };
            let clamped = snapped.clamp(min, max);
            // Snapping up to max can land off-grid; step back inside.
            if quant > 0.0 && clamped == max && snapped > max {
                Some(min + ((max - min) / quant).floor() * quant)
            } else {
                Some(clamped)
            }
        }
        OptionConstraint::WordList(words) => Some(
            words
                .iter()
                .copied()
                .fold(None, |best: Option<f64>, w| match best {
                    Some(b) if (b - value).abs() <= (w - value).abs() => Some(b),
                    _ => Some(w),
                })
                .unwrap_or(value),
        ),
        OptionConstraint::None | OptionConstraint::StringList(_) => Some(value),
    }
}

/// Set an integer or fixed-point option, fitted to its constraint.
///
/// Returns the value the device reports as applied.
pub fn set_numeric(device: &mut dyn ScanDevice, option: &RegisteredOption, value: f64) -> Option<f64> {
    let Some(fitted) = clamp_to_constraint(&option.descriptor.constraint, value) else {
        warn!(
            option = %option.descriptor.name,
            constraint = ?option.descriptor.constraint,
            "device reported an unusable range, option skipped"
        );
        return None;
    };
    let request = match option.descriptor.kind {
        OptionKind::Int => OptionValue::Int(fitted.round() as i32),
        OptionKind::Fixed => OptionValue::Fixed(fitted),
        _ => return None,
    };
    match device.set_option(option.index, request) {
        Ok(applied) => {
            let applied = applied.as_f64()?;
            debug!(option = %option.descriptor.name, requested = value, applied, "option set");
            Some(applied)
        }
        Err(status) => {
            warn!(option = %option.descriptor.name, requested = value, %status, "unable to set option");
            None
        }
    }
}

/// Set a ranged option to its maximum.  Other constraint kinds are left alone.
pub fn set_to_max(device: &mut dyn ScanDevice, option: &RegisteredOption) -> Option<f64> {
    let OptionConstraint::Range { max, .. } = &option.descriptor.constraint else {
        return None;
    };
    if !max.is_finite() {
        warn!(option = %option.descriptor.name, "device reported a non-finite maximum");
        return None;
    }
    set_numeric(device, option, *max)
}
