// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`OsInstallation`], a Windows installation found on a mounted volume.

use serde::{Deserialize, Serialize};

use crate::model::types::DriveId;

/// The Windows directory relative to the root of a volume.
pub const WINDOWS_DIR: &str = "\\Windows";

/// The offline SYSTEM hive relative to the root of a volume.
pub const SYSTEM_HIVE: &str = "\\Windows\\System32\\config\\SYSTEM";

/// The offline SOFTWARE hive relative to the root of a volume.
pub const SOFTWARE_HIVE: &str = "\\Windows\\System32\\config\\SOFTWARE";

/// The kernel relative to the root of a volume.
pub const KERNEL: &str = "\\Windows\\System32\\ntoskrnl.exe";

/// The directory holding the loaders, relative to the root of a volume.
pub const LOADER_DIR: &str = "\\Windows\\System32";

/// A discovered Windows installation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInstallation {
    /// The drive the installation lives on.
    pub drive: DriveId,

    /// The full path to the Windows directory.
    pub windows_path: String,

    /// The full path to the offline SYSTEM hive.
    pub system_hive_path: String,

    /// If this is the installation the toolkit was asked about, or the one currently running.
    pub is_current_os: bool,

    /// How sure discovery is that this is a complete installation, 0 to 100.
    pub confidence: u8,
}

impl OsInstallation {
    /// Creates a new [`OsInstallation`] on a drive with full confidence.
    #[must_use = "Has no effect if the result is unused"]
    pub fn new(drive: DriveId) -> Self {
        Self {
            windows_path: drive.join(WINDOWS_DIR),
            system_hive_path: drive.join(SYSTEM_HIVE),
            drive,
            is_current_os: false,
            confidence: 100,
        }
    }

    /// Returns the full path of the kernel.
    #[must_use = "Has no effect if the result is unused"]
    pub fn kernel_path(&self) -> String {
        self.drive.join(KERNEL)
    }

    /// Returns the full path of the offline SOFTWARE hive.
    #[must_use = "Has no effect if the result is unused"]
    pub fn software_hive_path(&self) -> String {
        self.drive.join(SOFTWARE_HIVE)
    }

    /// Returns the drive-relative path of a loader, such as `\Windows\System32\winload.efi`.
    #[must_use = "Has no effect if the result is unused"]
    pub fn loader_relative(loader: &str) -> String {
        format!("{LOADER_DIR}\\{loader}")
    }

    /// Returns the full path of a loader on this installation.
    #[must_use = "Has no effect if the result is unused"]
    pub fn loader_path(&self, loader: &str) -> String {
        self.drive.join(&Self::loader_relative(loader))
    }
}
