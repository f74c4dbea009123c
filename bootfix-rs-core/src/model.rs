// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The data model of the diagnosis core.
//!
//! At the moment, this includes the following:
//! - [`environment`]: the firmware, disk layout, ESP and partition table of the machine.
//! - [`install`]: a discovered Windows installation.
//! - [`chain`]: the Firmware → `BootManager` → BCD → Loader → Kernel boot chain.
//! - [`facts`]: the already-fetched facts that probes inspect.
//! - [`issue`]: typed issues produced by probes and critical checks.
//!
//! All of these are rebuilt fresh on every run, since a previous repair may have changed the disk.

pub mod chain;
pub mod environment;
pub mod facts;
pub mod install;
pub mod issue;
pub mod types;
