// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`Facts`], everything the probes look at, fetched once per run.
//!
//! A fact that could not be fetched is stored as a [`FetchFailure`] rather than as a negative fact. This is
//! what lets a probe tell "the file is not there" apart from "the file could not be checked".

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::model::environment::PartitionInfo;

/// Why a fact could not be fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure(pub String);

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<E: std::error::Error> From<E> for FetchFailure {
    fn from(value: E) -> Self {
        Self(value.to_string())
    }
}

/// A fact, or the reason it could not be fetched.
pub type Fetched<T> = Result<T, FetchFailure>;

/// The result of checking a single file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFact {
    /// The full path that was checked.
    pub path: String,

    /// If the file exists.
    pub exists: bool,

    /// The size of the file in bytes.
    pub size_bytes: u64,

    /// If the file could be opened for reading.
    pub readable: bool,

    /// If the fact is the result of a re-check after the first attempt came back negative.
    pub retried: bool,
}

impl FileFact {
    /// Creates a [`FileFact`] for a file that does not exist.
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Creates a [`FileFact`] for a readable file of a given size.
    pub fn present(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            exists: true,
            size_bytes,
            readable: true,
            retried: false,
        }
    }

    /// Checks if the file exists and is not empty.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn is_viable(&self) -> bool {
        self.exists && self.size_bytes > 0
    }

    /// Returns a one-line evidence string for this fact.
    #[must_use = "Has no effect if the result is unused"]
    pub fn evidence(&self) -> String {
        let retried = if self.retried { " (retried)" } else { "" };
        if self.exists {
            format!("{} exists, {} bytes{retried}", self.path, self.size_bytes)
        } else {
            format!("{} not found{retried}", self.path)
        }
    }
}

/// A device reference inside a BCD entry, such as `device` or `osdevice`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRef {
    /// `partition=C:`, or a volume path the boot store reader resolved to a partition.
    Partition(String),

    /// `boot`, the partition the boot manager was loaded from.
    Boot,

    /// The boot store could not resolve the device.
    Unknown,

    /// Any other form, such as `ramdisk=` or `locate=`, kept verbatim.
    Other(String),
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partition(id) => write!(f, "partition={id}"),
            Self::Boot => f.write_str("boot"),
            Self::Unknown => f.write_str("unknown"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// The logical fields of a Windows boot loader entry in the BCD.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BcdEntry {
    /// The `device` element.
    pub device: DeviceRef,

    /// The `osdevice` element.
    pub os_device: DeviceRef,

    /// The `path` element, if there is one.
    pub loader_path: Option<String>,
}

/// A storage driver service as registered in the offline SYSTEM hive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRegistration {
    /// The service name, such as `stornvme`.
    pub name: String,

    /// The `Start` value. `0` means boot start.
    pub start: Option<u32>,

    /// If a `StartOverride` key changes the start type behind the `Start` value.
    pub override_trap: bool,
}

impl DriverRegistration {
    /// Checks if the driver will load at boot start.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_usable(&self) -> bool {
        self.start == Some(0) && !self.override_trap
    }
}

/// The encryption lock state of a volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// The volume is locked and cannot be read without a key.
    Locked,

    /// The volume is unlocked or not encrypted.
    Unlocked,

    /// The query timed out or the tool was unavailable.
    #[default]
    Unknown,
}

/// Everything fetched about the selected installation and its boot path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    /// The boot manager file (`bootmgfw.efi` or `bootmgr`).
    pub boot_manager: Fetched<FileFact>,

    /// The BCD store file.
    pub bcd_file: Fetched<FileFact>,

    /// The default boot loader entry of the BCD.
    pub bcd_entry: Fetched<BcdEntry>,

    /// The loader file on the installation.
    pub loader: Fetched<FileFact>,

    /// The kernel on the installation.
    pub kernel: Fetched<FileFact>,

    /// The boot-critical storage drivers found in the SYSTEM hive.
    pub drivers: Fetched<Vec<DriverRegistration>>,

    /// The encryption lock state of the OS volume.
    pub lock_state: LockState,

    /// The partition table.
    pub partitions: Vec<PartitionInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viable() {
        assert!(FileFact::present("C:\\a", 1).is_viable());
        assert!(!FileFact::present("C:\\a", 0).is_viable());
        assert!(!FileFact::missing("C:\\a").is_viable());
    }

    #[test]
    fn test_retried_evidence() {
        let fact = FileFact {
            retried: true,
            ..FileFact::present("C:\\Windows\\System32\\winload.efi", 1_572_864)
        };
        assert_eq!(
            fact.evidence(),
            "C:\\Windows\\System32\\winload.efi exists, 1572864 bytes (retried)"
        );
    }

    #[test]
    fn test_driver_usable() {
        let mut driver = DriverRegistration {
            name: "stornvme".to_owned(),
            start: Some(0),
            override_trap: false,
        };
        assert!(driver.is_usable());
        driver.override_trap = true;
        assert!(!driver.is_usable());
        driver.override_trap = false;
        driver.start = Some(3);
        assert!(!driver.is_usable());
    }
}
