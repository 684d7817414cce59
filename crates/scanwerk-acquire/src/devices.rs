// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device labelling and ranking.
//
// Backends do not say how a device is attached, so ranking relies on naming
// trends: USB devices first, webcams last, everything else in between.

use std::cmp::Ordering;

use scanwerk_core::types::Device;

use crate::backend::RawDevice;

/// Vendor strings shortened for display, matching what is printed on the
/// hardware.
const VENDOR_ABBREVIATIONS: &[(&str, &str)] = &[("Hewlett-Packard", "HP")];

/// Webcam backends, used only as a last resort.
const WEBCAM_PREFIXES: &[&str] = &["v4l", "vfl"];

/// Human label: abbreviated vendor, then model, underscores as spaces.
pub fn build_label(raw: &RawDevice) -> String {
    let vendor = VENDOR_ABBREVIATIONS
        .iter()
        .find(|(long, _)| *long == raw.vendor)
        .map_or(raw.vendor.as_str(), |(_, short)| *short);
    format!("{vendor} {}", raw.model)
        .trim()
        .replace('_', " ")
}

/// Sort weight of a backend device name; lower ranks first.
pub fn device_weight(name: &str) -> u8 {
    if WEBCAM_PREFIXES.iter().any(|p| name.starts_with(*p)) {
        2
    } else if name.contains("usb") {
        0
    } else {
        1
    }
}

fn compare(a: &Device, b: &Device) -> Ordering {
    device_weight(&a.name)
        .cmp(&device_weight(&b.name))
        .then_with(|| a.label.cmp(&b.label))
}

/// Label and order raw backend devices.
pub fn rank_devices(raw: &[RawDevice]) -> Vec<Device> {
    let mut devices: Vec<Device> = raw
        .iter()
        .map(|r| Device {
            name: r.name.clone(),
            label: build_label(r),
        })
        .collect();
    devices.sort_by(compare);
    devices
}
