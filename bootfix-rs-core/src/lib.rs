// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The `bootfix-rs` library crate.
//!
//! This is the diagnosis core of a guided Windows boot-repair toolkit that runs from a pre-boot recovery
//! environment. It collects read-only facts about the boot chain of an installation, runs a fixed set of
//! probes over them, computes a boot verdict with a confidence level, ranks the most likely blockers, and
//! decides which repair commands are permitted in the current execution environment.
//!
//! Everything that touches the disk, the registry or the boot store lives behind the traits in [`system`].
//! The probes, the [`evidence`] aggregator, the [`verdict`] engine and the [`rank`]er are pure functions over
//! data that was already fetched, so a [`discovery::Survey`] captured on one machine can be replayed anywhere.
//!
//! A command line frontend for this crate can be found in `bootfix-rs-cli`.
//!
//! ## MSRV
//!
//! The minimum supported rust version is 1.88.0.

/// The primary result type that wraps around [`crate::error::DiagError`].
pub type DiagResult<T> = Result<T, crate::error::DiagError>;

pub mod blockers;
pub mod config;
pub mod discovery;
pub mod doctor;
pub mod error;
pub mod evidence;
pub mod gate;
pub mod model;
pub mod probe;
pub mod rank;
pub mod system;
pub mod verdict;
