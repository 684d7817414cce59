// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in simulated scanners.

use scanwerk_acquire::{VirtualBackend, VirtualDeviceSpec};

pub const FLATBED: &str = "virtual:libusb:001:001";
pub const FEEDER: &str = "virtual:net:feeder";
pub const WEBCAM: &str = "v4l:/dev/video-virtual";

/// An A4 page at 50 dpi.
const PAGE_WIDTH: u32 = 413;
const PAGE_LINES: u32 = 585;

/// Backend offering a USB flatbed, a networked sheet feeder holding `pages`
/// sheets, and a webcam.
pub fn builtin_backend(pages: u32, three_pass: bool) -> VirtualBackend {
    let page = |mut spec: VirtualDeviceSpec| {
        spec.pixels_per_line = PAGE_WIDTH;
        spec.lines = PAGE_LINES;
        spec.three_pass = three_pass;
        spec.read_chunk = 32 * 1024;
        spec
    };

    let flatbed = VirtualDeviceSpec {
        vendor: "Hewlett-Packard".into(),
        model: "ScanJet_Virtual".into(),
        kind: "flatbed scanner".into(),
        ..page(VirtualDeviceSpec::flatbed(FLATBED))
    };
    let feeder = VirtualDeviceSpec {
        vendor: "Scanwerk".into(),
        model: "Virtual_Feeder".into(),
        kind: "sheetfed scanner".into(),
        ..page(VirtualDeviceSpec::sheetfed(FEEDER, pages))
    };
    let webcam = VirtualDeviceSpec {
        vendor: "Noname".into(),
        model: "Webcam".into(),
        kind: "webcam".into(),
        pixels_per_line: 320,
        lines: 240,
        read_chunk: 32 * 1024,
        ..VirtualDeviceSpec::flatbed(WEBCAM)
    };

    VirtualBackend::new(vec![webcam, feeder, flatbed])
}
