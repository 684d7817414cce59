// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — config persistence, the built-in backend, and the consumers
// the commands attach to the scanner.

pub mod assembler;
pub mod builtin;
pub mod config_dir;
pub mod console;
