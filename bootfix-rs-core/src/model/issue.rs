// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`Issue`], a typed finding produced by a probe or a critical check.
//!
//! Issues are never classified by inspecting their text. The [`IssueKind`] is decided where the issue is
//! raised, and the verdict engine picks its primary cause from the kinds alone.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The kind of an [`Issue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// The loader file is missing or empty.
    LoaderMissing,

    /// The BCD is missing, unreadable, or points somewhere it should not.
    BcdCorruption,

    /// The system partition is missing, unmounted, not FAT32, or lacks the boot manager.
    EspMissing,

    /// Secure Boot will refuse the configured loader.
    SecureBootBlock,

    /// No usable boot-critical storage driver is registered.
    DriverMissing,

    /// The installation itself is damaged, such as a missing kernel or hive.
    InstallCorrupt,

    /// The firmware type and the disk layout contradict each other.
    FirmwareMismatch,

    /// The OS volume is locked by BitLocker.
    BitLockerLock,

    /// A probe could not run its inspection at all.
    ProbeFailure,
}

/// A single finding with a human readable detail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// The kind of the finding.
    pub kind: IssueKind,

    /// A human readable description.
    pub detail: String,
}

impl Issue {
    /// Creates a new [`Issue`].
    pub fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}
