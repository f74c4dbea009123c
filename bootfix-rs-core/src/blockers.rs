// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The blocker sources besides the verdict: disk health, registry values and setup logs.
//!
//! Each source turns typed facts into [`BlockerCandidate`]s for the ranker. None of them perform I/O except
//! [`scan_registry`], which reads through a [`RegistryHiveReader`].

use log::warn;

use crate::{
    model::{
        environment::{PartitionInfo, VolumeHealth},
        install::OsInstallation,
    },
    rank::{BlockerCandidate, Category, Severity},
    system::{
        KeyValues, RegValue, RegistryHiveReader,
        hive::current_control_set,
        setup_log::{SetupLogBlocker, SetupLogLevel},
    },
};

/// The only `BootExecute` entry a healthy installation carries.
const DEFAULT_BOOT_EXECUTE: &str = "autocheck autochk *";

/// A setup result code with a known meaning.
struct KnownCode {
    /// The result code.
    code: u32,

    /// The category of the blocker.
    category: Category,

    /// The severity of the blocker.
    severity: Severity,

    /// How sure the code is about its meaning.
    confidence: u8,

    /// What the code means.
    meaning: &'static str,

    /// What to do about it.
    action: &'static str,
}

/// Setup result codes with a known meaning.
const KNOWN_CODES: &[KnownCode] = &[
    KnownCode {
        code: 0xC190_0101,
        category: Category::Compatibility,
        severity: Severity::Critical,
        confidence: 90,
        meaning: "A driver caused setup to roll back",
        action: "Remove or update third-party drivers, then retry the upgrade",
    },
    KnownCode {
        code: 0x8007_0070,
        category: Category::Hardware,
        severity: Severity::High,
        confidence: 90,
        meaning: "Not enough free disk space",
        action: "Free at least 20 GB on the system drive",
    },
    KnownCode {
        code: 0xC190_0208,
        category: Category::Compatibility,
        severity: Severity::High,
        confidence: 85,
        meaning: "An incompatible application blocks the upgrade",
        action: "Uninstall the application named in the compatibility report",
    },
    KnownCode {
        code: 0x8007_0005,
        category: Category::Compatibility,
        severity: Severity::Medium,
        confidence: 70,
        meaning: "Access denied while applying an operation",
        action: "Disable third-party security software and retry",
    },
    KnownCode {
        code: 0x800F_0922,
        category: Category::Compatibility,
        severity: Severity::High,
        confidence: 75,
        meaning: "The system reserved partition is too small or unreachable",
        action: "Extend the system reserved partition, or check the connection to the update service",
    },
    KnownCode {
        code: 0xC190_0200,
        category: Category::Hardware,
        severity: Severity::High,
        confidence: 85,
        meaning: "The machine does not meet the minimum requirements",
        action: "Check processor, memory and TPM requirements",
    },
    KnownCode {
        code: 0xC190_0202,
        category: Category::Hardware,
        severity: Severity::High,
        confidence: 85,
        meaning: "The machine does not meet the minimum requirements",
        action: "Check processor, memory and TPM requirements",
    },
];

/// Turns every unhealthy volume into a hardware blocker. Volumes of unknown health are skipped.
#[must_use = "Has no effect if the result is unused"]
pub fn disk_health(partitions: &[PartitionInfo]) -> Vec<BlockerCandidate> {
    partitions
        .iter()
        .filter_map(|partition| {
            let (severity, confidence, state) = match partition.health {
                VolumeHealth::Failed => (Severity::Critical, 90, "has failed"),
                VolumeHealth::Warning => (Severity::High, 70, "reports warnings"),
                VolumeHealth::Healthy | VolumeHealth::Unknown => return None,
            };
            let name = partition
                .mount_point
                .as_ref()
                .map_or(partition.partition_id.as_str(), |x| x.as_str());
            Some(BlockerCandidate::new(
                format!("Volume {name} {state}"),
                Category::Hardware,
                severity,
                confidence,
                "Back up the volume, then check the disk for errors or replace it",
            ))
        })
        .collect()
}

/// Looks for registry values in the offline SYSTEM hive that block boot or setup.
///
/// Keys that cannot be read are logged and skipped.
pub fn scan_registry(
    hives: &(impl RegistryHiveReader + ?Sized),
    install: &OsInstallation,
) -> Vec<BlockerCandidate> {
    let hive = &install.system_hive_path;
    let mut blockers = Vec::new();

    match hives.read_key(hive, "Setup") {
        Ok(values) => blockers.extend(pending_setup(&values)),
        Err(e) => warn!("Could not read the setup state of {}: {e}", install.drive),
    }

    let session_manager = current_control_set(hives, hive).and_then(|control_set| {
        hives.read_key(hive, &format!("{control_set}\\Control\\Session Manager"))
    });
    match session_manager {
        Ok(values) => {
            blockers.extend(boot_execute(&values));
            blockers.extend(pending_renames(&values));
        }
        Err(e) => warn!("Could not read the session manager of {}: {e}", install.drive),
    }

    blockers
}

/// A setup that never finished.
fn pending_setup(values: &KeyValues) -> Option<BlockerCandidate> {
    let setup_type = values.get("SetupType").and_then(RegValue::as_dword)?;
    (setup_type != 0).then(|| {
        BlockerCandidate::new(
            format!("Windows Setup is pending (SetupType={setup_type})"),
            Category::RegistryBlocker,
            Severity::High,
            85,
            "Reset Setup\\SetupType and Setup\\CmdLine once setup can no longer resume",
        )
    })
}

/// Programs other than `autochk` run before the session manager starts.
fn boot_execute(values: &KeyValues) -> Option<BlockerCandidate> {
    let entries: Vec<&str> = match values.get("BootExecute")? {
        RegValue::MultiString(x) => x.iter().map(|x| x.trim()).filter(|x| !x.is_empty()).collect(),
        RegValue::String(x) => vec![x.trim()],
        _ => return None,
    };
    let extra: Vec<&str> = entries
        .into_iter()
        .filter(|x| !x.eq_ignore_ascii_case(DEFAULT_BOOT_EXECUTE))
        .collect();
    (!extra.is_empty()).then(|| {
        BlockerCandidate::new(
            format!("Non-default BootExecute entries: {}", extra.join("; ")),
            Category::RegistryBlocker,
            Severity::Medium,
            70,
            format!("Restore BootExecute to \"{DEFAULT_BOOT_EXECUTE}\""),
        )
    })
}

/// File renames queued for the next boot.
fn pending_renames(values: &KeyValues) -> Option<BlockerCandidate> {
    let RegValue::MultiString(renames) = values.get("PendingFileRenameOperations")? else {
        return None;
    };
    // pairs of source and destination, an empty destination deletes the source
    let count = renames
        .chunks(2)
        .filter(|x| x.first().is_some_and(|x| !x.is_empty()))
        .count();
    (count > 0).then(|| {
        BlockerCandidate::new(
            format!("{count} file rename operations are pending"),
            Category::RegistryBlocker,
            Severity::Low,
            60,
            "Let the pending operations complete, or clear PendingFileRenameOperations",
        )
    })
}

/// Turns setup log errors into blockers, using the meaning of known result codes where there is one.
#[must_use = "Has no effect if the result is unused"]
pub fn setup_log(entries: &[SetupLogBlocker]) -> Vec<BlockerCandidate> {
    entries
        .iter()
        .map(|entry| {
            let known = entry
                .code
                .and_then(|code| KNOWN_CODES.iter().find(|x| x.code == code));
            match (known, entry.code) {
                (Some(known), Some(code)) => BlockerCandidate::new(
                    format!("{} (0x{code:08X}, {})", known.meaning, entry.component),
                    known.category,
                    known.severity,
                    known.confidence,
                    known.action,
                ),
                _ => {
                    let severity = match entry.level {
                        SetupLogLevel::Fatal => Severity::Critical,
                        SetupLogLevel::Error => Severity::Medium,
                        SetupLogLevel::Warning => Severity::Low,
                    };
                    BlockerCandidate::new(
                        format!("{}: {}", entry.component, entry.message),
                        Category::Compatibility,
                        severity,
                        50,
                        "Review setuperr.log and setupact.log around this entry",
                    )
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        model::{environment::Filesystem, types::DriveId},
        system::HiveError,
    };

    /// An in-memory set of hives, keyed by hive path and key path.
    #[derive(Default)]
    struct Hives(BTreeMap<(String, String), KeyValues>);

    impl Hives {
        fn with(mut self, hive: &str, key: &str, values: &[(&str, RegValue)]) -> Self {
            let values = values
                .iter()
                .map(|(name, value)| ((*name).to_owned(), value.clone()))
                .collect();
            self.0.insert((hive.to_owned(), key.to_owned()), values);
            self
        }
    }

    impl RegistryHiveReader for Hives {
        fn read_key(&self, hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError> {
            self.0
                .get(&(hive_path.to_owned(), key_path.to_owned()))
                .cloned()
                .ok_or_else(|| HiveError::NotFound(format!("{hive_path}\\{key_path}")))
        }
    }

    fn partition(mount: &str, health: VolumeHealth) -> PartitionInfo {
        PartitionInfo {
            partition_id: "Disk0Part3".to_owned(),
            type_guid: String::new(),
            mount_point: DriveId::new(mount).ok(),
            filesystem: Filesystem::Ntfs,
            health,
            active: false,
        }
    }

    #[test]
    fn test_disk_health() {
        let blockers = disk_health(&[
            partition("C:", VolumeHealth::Failed),
            partition("D:", VolumeHealth::Healthy),
            partition("E:", VolumeHealth::Warning),
            partition("F:", VolumeHealth::Unknown),
        ]);
        assert_eq!(blockers.len(), 2);
        assert_eq!(blockers[0].issue, "Volume C: has failed");
        assert_eq!(blockers[0].severity, Severity::Critical);
        assert_eq!(blockers[1].severity, Severity::High);
    }

    #[test]
    fn test_registry() {
        let install = OsInstallation::new(DriveId::new("C:").unwrap());
        let hive = install.system_hive_path.clone();
        let hives = Hives::default()
            .with(&hive, "Setup", &[("SetupType", RegValue::Dword(2))])
            .with(&hive, "Select", &[("Current", RegValue::Dword(1))])
            .with(
                &hive,
                "ControlSet001\\Control\\Session Manager",
                &[
                    (
                        "BootExecute",
                        RegValue::MultiString(vec![
                            "autocheck autochk *".to_owned(),
                            "sdnclean64.exe".to_owned(),
                        ]),
                    ),
                    (
                        "PendingFileRenameOperations",
                        RegValue::MultiString(vec![
                            "\\??\\C:\\Windows\\old.sys".to_owned(),
                            String::new(),
                        ]),
                    ),
                ],
            );

        let blockers = scan_registry(&hives, &install);
        assert_eq!(blockers.len(), 3);
        assert_eq!(blockers[0].issue, "Windows Setup is pending (SetupType=2)");
        assert_eq!(blockers[1].issue, "Non-default BootExecute entries: sdnclean64.exe");
        assert_eq!(blockers[2].issue, "1 file rename operations are pending");
    }

    #[test]
    fn test_healthy_registry() {
        let install = OsInstallation::new(DriveId::new("C:").unwrap());
        let hive = install.system_hive_path.clone();
        let hives = Hives::default()
            .with(&hive, "Setup", &[("SetupType", RegValue::Dword(0))])
            .with(&hive, "Select", &[("Current", RegValue::Dword(1))])
            .with(
                &hive,
                "ControlSet001\\Control\\Session Manager",
                &[(
                    "BootExecute",
                    RegValue::MultiString(vec!["autocheck autochk *".to_owned(), String::new()]),
                )],
            );
        assert!(scan_registry(&hives, &install).is_empty());
        assert!(scan_registry(&Hives::default(), &install).is_empty());
    }

    #[test]
    fn test_setup_log() {
        let entries = [
            SetupLogBlocker {
                level: SetupLogLevel::Error,
                component: "MOUPG".to_owned(),
                code: Some(0xC190_0101),
                message: "Result = 0xC1900101".to_owned(),
            },
            SetupLogBlocker {
                level: SetupLogLevel::Fatal,
                component: "SP".to_owned(),
                code: None,
                message: "Operation failed".to_owned(),
            },
        ];
        let blockers = setup_log(&entries);
        assert_eq!(blockers[0].issue, "A driver caused setup to roll back (0xC1900101, MOUPG)");
        assert_eq!(blockers[0].severity, Severity::Critical);
        assert_eq!(blockers[1].category, Category::Compatibility);
        assert_eq!(blockers[1].severity, Severity::Critical);
        assert_eq!(blockers[1].confidence, 50);
    }
}
