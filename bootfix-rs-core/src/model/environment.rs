// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`BootEnvironment`], the firmware and disk side of the boot chain.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::model::types::DriveId;

/// The partition type GUID of an EFI System Partition.
pub const ESP_TYPE_GUID: &str = "c12a7328-f81f-11d2-ba4b-00a0c93ec93b";

/// The firmware interface the machine boots through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmwareType {
    /// UEFI firmware, booting `bootmgfw.efi` from the ESP.
    Uefi,

    /// Legacy BIOS firmware, booting `bootmgr` from the active partition.
    LegacyBios,

    /// The firmware type could not be determined.
    #[default]
    Unknown,
}

impl FirmwareType {
    /// Returns the loader file name that a BCD entry is expected to point at.
    ///
    /// When the firmware type is unknown, the disk layout decides: MBR disks are assumed to boot through BIOS,
    /// everything else through UEFI.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn expected_loader(self, layout: DiskLayout) -> &'static str {
        match (self, layout) {
            (Self::LegacyBios, _) | (Self::Unknown, DiskLayout::Mbr) => "winload.exe",
            (Self::Uefi | Self::Unknown, _) => "winload.efi",
        }
    }

    /// Convert a [`FirmwareType`] into an [`&str`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uefi => "UEFI",
            Self::LegacyBios => "Legacy BIOS",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FirmwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The partitioning scheme of the system disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskLayout {
    /// GUID Partition Table.
    Gpt,

    /// Master Boot Record.
    Mbr,

    /// No partitions were found, so the layout is unknown.
    #[default]
    Unknown,
}

impl DiskLayout {
    /// Convert a [`DiskLayout`] into an [`&str`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gpt => "GPT",
            Self::Mbr => "MBR",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DiskLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filesystem as reported by the partition table collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filesystem {
    /// FAT32, the only filesystem UEFI firmware is required to read.
    Fat32,

    /// FAT16 or FAT12.
    Fat,

    /// NTFS.
    Ntfs,

    /// `ReFS`.
    Refs,

    /// exFAT.
    Exfat,

    /// A filesystem that is none of the above, kept verbatim.
    Other(String),

    /// The partition is unformatted or the filesystem could not be determined.
    #[default]
    Unknown,
}

impl Filesystem {
    /// Parses a filesystem name case-insensitively.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(name: &str) -> Self {
        match &*name.trim().to_ascii_lowercase() {
            "fat32" => Self::Fat32,
            "fat" | "fat16" | "fat12" => Self::Fat,
            "ntfs" => Self::Ntfs,
            "refs" => Self::Refs,
            "exfat" => Self::Exfat,
            "" | "raw" | "unknown" => Self::Unknown,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fat32 => f.write_str("FAT32"),
            Self::Fat => f.write_str("FAT"),
            Self::Ntfs => f.write_str("NTFS"),
            Self::Refs => f.write_str("ReFS"),
            Self::Exfat => f.write_str("exFAT"),
            Self::Other(name) => f.write_str(name),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// The health of a volume as reported by the partition table collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeHealth {
    /// The volume reports no problems.
    Healthy,

    /// The volume reports a recoverable problem, such as a dirty bit or a scan needed.
    Warning,

    /// The volume reports a failure.
    Failed,

    /// The health could not be read.
    #[default]
    Unknown,
}

impl VolumeHealth {
    /// Parses a health string case-insensitively.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(health: &str) -> Self {
        match &*health.trim().to_ascii_lowercase() {
            "healthy" | "ok" => Self::Healthy,
            "warning" | "scan needed" | "spot fix needed" => Self::Warning,
            "failed" | "unhealthy" | "full repair needed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// The Secure Boot state of the firmware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecureBootState {
    /// Secure Boot is enforcing.
    Enabled,

    /// Secure Boot is off, or the firmware is not UEFI.
    Disabled,

    /// The state could not be queried.
    #[default]
    Unknown,
}

/// One partition, as returned by the partition table collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// An identifier that is stable for the run, such as `disk0:part1`.
    pub partition_id: String,

    /// The GPT partition type GUID, lowercase without braces. Empty on MBR disks.
    pub type_guid: String,

    /// The drive the partition is mounted on, if any.
    pub mount_point: Option<DriveId>,

    /// The filesystem of the partition.
    pub filesystem: Filesystem,

    /// The health of the volume.
    pub health: VolumeHealth,

    /// If the partition is marked active (only meaningful on MBR disks).
    pub active: bool,
}

impl PartitionInfo {
    /// Checks if the partition is an EFI System Partition.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_esp(&self) -> bool {
        self.type_guid
            .trim_matches(['{', '}'])
            .eq_ignore_ascii_case(ESP_TYPE_GUID)
    }
}

/// The state of the EFI System Partition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EspInfo {
    /// If an ESP exists in the partition table at all.
    pub present: bool,

    /// If the ESP has a drive letter that files can be read through.
    pub mounted: bool,

    /// The drive the ESP is mounted on.
    pub drive: Option<DriveId>,

    /// The filesystem of the ESP.
    pub filesystem: Filesystem,

    /// The health of the ESP volume.
    pub health: VolumeHealth,
}

impl EspInfo {
    /// Builds an [`EspInfo`] from the first ESP found in a partition table.
    #[must_use = "Has no effect if the result is unused"]
    pub fn from_partitions(partitions: &[PartitionInfo]) -> Self {
        partitions
            .iter()
            .find(|x| x.is_esp())
            .map_or_else(Self::default, |esp| Self {
                present: true,
                mounted: esp.mount_point.is_some(),
                drive: esp.mount_point.clone(),
                filesystem: esp.filesystem.clone(),
                health: esp.health,
            })
    }
}

/// The firmware and disk side of a machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootEnvironment {
    /// The firmware type.
    pub firmware: FirmwareType,

    /// The disk layout of the system disk.
    pub layout: DiskLayout,

    /// The EFI System Partition.
    pub esp: EspInfo,

    /// The Secure Boot state.
    pub secure_boot: SecureBootState,
}

impl BootEnvironment {
    /// Returns the file name of the loader expected for this environment.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn expected_loader(&self) -> &'static str {
        self.firmware.expected_loader(self.layout)
    }

    /// Checks if the machine is expected to boot through UEFI, falling back to the disk layout when the
    /// firmware type is unknown.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn boots_uefi(&self) -> bool {
        match self.firmware {
            FirmwareType::Uefi => true,
            FirmwareType::LegacyBios => false,
            FirmwareType::Unknown => !matches!(self.layout, DiskLayout::Mbr),
        }
    }

    /// Checks if the firmware type and the disk layout contradict each other.
    ///
    /// UEFI firmware cannot boot Windows from an MBR disk, and BIOS firmware cannot boot it from a GPT disk.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn firmware_mismatch(&self) -> bool {
        matches!(
            (self.firmware, self.layout),
            (FirmwareType::Uefi, DiskLayout::Mbr) | (FirmwareType::LegacyBios, DiskLayout::Gpt)
        )
    }
}

/// Derives the disk layout from a partition table.
///
/// GPT partitions always carry a type GUID, so any partition with one means GPT.
#[must_use = "Has no effect if the result is unused"]
pub fn layout_of(partitions: &[PartitionInfo]) -> DiskLayout {
    if partitions.is_empty() {
        DiskLayout::Unknown
    } else if partitions.iter().any(|x| !x.type_guid.trim().is_empty()) {
        DiskLayout::Gpt
    } else {
        DiskLayout::Mbr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esp() -> PartitionInfo {
        PartitionInfo {
            partition_id: "disk0:part1".to_owned(),
            type_guid: "{C12A7328-F81F-11D2-BA4B-00A0C93EC93B}".to_owned(),
            mount_point: DriveId::new("S:").ok(),
            filesystem: Filesystem::Fat32,
            health: VolumeHealth::Healthy,
            active: false,
        }
    }

    #[test]
    fn test_expected_loader() {
        assert_eq!(
            FirmwareType::Uefi.expected_loader(DiskLayout::Gpt),
            "winload.efi"
        );
        assert_eq!(
            FirmwareType::LegacyBios.expected_loader(DiskLayout::Mbr),
            "winload.exe"
        );
        assert_eq!(
            FirmwareType::Unknown.expected_loader(DiskLayout::Mbr),
            "winload.exe"
        );
        assert_eq!(
            FirmwareType::Unknown.expected_loader(DiskLayout::Unknown),
            "winload.efi"
        );
    }

    #[test]
    fn test_esp_detection() {
        let parts = [esp()];
        let info = EspInfo::from_partitions(&parts);
        assert!(info.present);
        assert!(info.mounted);
        assert_eq!(info.filesystem, Filesystem::Fat32);
        assert_eq!(layout_of(&parts), DiskLayout::Gpt);
    }

    #[test]
    fn test_no_esp() {
        let info = EspInfo::from_partitions(&[]);
        assert!(!info.present);
        assert!(!info.mounted);
        assert_eq!(layout_of(&[]), DiskLayout::Unknown);
    }

    #[test]
    fn test_mbr_layout() {
        let part = PartitionInfo {
            type_guid: String::new(),
            active: true,
            ..esp()
        };
        assert_eq!(layout_of(&[part]), DiskLayout::Mbr);
    }

    #[test]
    fn test_parse_filesystem() {
        assert_eq!(Filesystem::parse("FAT32"), Filesystem::Fat32);
        assert_eq!(Filesystem::parse("ntfs"), Filesystem::Ntfs);
        assert_eq!(Filesystem::parse(""), Filesystem::Unknown);
        assert_eq!(
            Filesystem::parse("btrfs"),
            Filesystem::Other("btrfs".to_owned())
        );
    }

    #[test]
    fn test_firmware_mismatch() {
        let env = BootEnvironment {
            firmware: FirmwareType::Uefi,
            layout: DiskLayout::Mbr,
            ..BootEnvironment::default()
        };
        assert!(env.firmware_mismatch());
        let env = BootEnvironment {
            layout: DiskLayout::Gpt,
            ..env
        };
        assert!(!env.firmware_mismatch());
    }
}
