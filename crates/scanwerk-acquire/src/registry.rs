// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-handle option registry.
//
// Option indices are only meaningful for the handle they were read from, so
// a registry is built after a device is opened and thrown away with the
// handle.

use std::collections::HashMap;

use tracing::debug;

use crate::backend::{OptionDescriptor, OptionKind, ScanDevice};

/// A named option together with the index used to control it.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredOption {
    pub index: usize,
    pub descriptor: OptionDescriptor,
}

/// Name → option lookup for one open device.
#[derive(Debug, Default)]
pub struct OptionRegistry {
    options: HashMap<String, RegisteredOption>,
}

impl OptionRegistry {
    /// Enumerate the device's descriptors in index order.
    ///
    /// Group entries, inactive options and anonymous options are skipped.  If
    /// a device reports the same name twice the first index wins.
    pub fn build(device: &dyn ScanDevice) -> Self {
        let mut options = HashMap::new();
        let mut index = 0;
        while let Some(descriptor) = device.option_descriptor(index) {
            let skip = descriptor.kind == OptionKind::Group
                || !descriptor.is_active()
                || descriptor.name.is_empty();
            if !skip {
                debug!(index, name = %descriptor.name, "registered device option");
                options
                    .entry(descriptor.name.clone())
                    .or_insert(RegisteredOption { index, descriptor });
            }
            index += 1;
        }
        Self { options }
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredOption> {
        self.options.get(name)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
