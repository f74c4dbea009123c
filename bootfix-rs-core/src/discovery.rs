// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Discovers the boot environment and the Windows installations on the machine, and fetches every fact the
//! probes look at.
//!
//! Nothing here is cached across runs. A repair between two runs may have changed the disk, so [`survey`]
//! always starts from the partition table again.
//!
//! The resulting [`Survey`] is plain data. It can be captured to a snapshot on one machine and replayed on
//! another, which is how a diagnosis is reproduced away from the broken machine.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    DiagResult, blockers,
    config::DoctorConfig,
    model::{
        environment::{BootEnvironment, EspInfo, PartitionInfo, layout_of},
        facts::{DriverRegistration, FetchFailure, Facts, FileFact, Fetched},
        install::{OsInstallation, SYSTEM_HIVE},
        types::DriveId,
    },
    probe::driver::BOOT_CRITICAL_DRIVERS,
    rank::OtherReports,
    system::{
        Environment, FileSystemProbe, HiveError, RegValue, RegistryHiveReader,
        fs::{inspect, recheck},
        hive::current_control_set,
        setup_log::SetupLogScanner,
    },
};

/// Where the boot manager and BCD live on the EFI System Partition.
const UEFI_BOOT_DIR: &str = "\\EFI\\Microsoft\\Boot";

/// The BCD entry diagnosed.
const DEFAULT_ENTRY: &str = "{default}";

/// The drive WinPE runs from. Its own `Windows` directory is not an installation.
const RAMDISK_DRIVE: &str = "X:";

/// Errors that stop a run before a verdict can be computed.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// No Windows installation was found on any drive.
    #[error("No Windows installation was found")]
    NoInstallation,

    /// The requested drive holds no Windows installation.
    #[error("No Windows installation was found on {0}")]
    TargetNotFound(DriveId),
}

/// Everything discovered about a machine in a single run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    /// The firmware and disk side of the machine.
    pub environment: BootEnvironment,

    /// Every installation found, in drive order.
    pub installs: Vec<OsInstallation>,

    /// The index of the installation being diagnosed.
    pub selected: usize,

    /// The facts fetched for the selected installation.
    pub facts: Facts,

    /// Blocker candidates besides the verdict.
    pub reports: OtherReports,
}

impl Survey {
    /// Returns the installation being diagnosed.
    #[must_use = "Has no effect if the result is unused"]
    pub fn install(&self) -> Option<&OsInstallation> {
        self.installs.get(self.selected)
    }

    /// Encodes the survey into a snapshot.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the survey could not be serialized.
    pub fn to_snapshot(&self) -> DiagResult<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Decodes a survey from a snapshot.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the snapshot is malformed, or does not select an installation.
    pub fn from_snapshot(bytes: &[u8]) -> DiagResult<Self> {
        let survey: Self = postcard::from_bytes(bytes)?;
        if survey.install().is_none() {
            return Err(ConfigurationError::NoInstallation.into());
        }
        Ok(survey)
    }
}

/// Surveys the machine.
///
/// `target` overrides the target of the configuration.
///
/// # Errors
///
/// May return an `Error` if no installation could be found, or the target holds none.
pub fn survey<E: Environment>(
    env: &E,
    config: &DoctorConfig,
    target: Option<&DriveId>,
) -> DiagResult<Survey> {
    let target = target.or(config.target.as_ref());
    env.forget(); // hives are read fresh every survey

    let partitions = env.partitions().unwrap_or_else(|e| {
        warn!("{e}, falling back to the system and target drives");
        Vec::new()
    });
    let environment = BootEnvironment {
        firmware: env.firmware_type(),
        layout: layout_of(&partitions),
        esp: EspInfo::from_partitions(&partitions),
        secure_boot: env.secure_boot(),
    };
    info!(
        "Firmware {}, {} layout, ESP {}",
        environment.firmware,
        environment.layout,
        environment
            .esp
            .drive
            .as_ref()
            .map_or("not mounted", |x| x.as_str())
    );

    let system_drive = env.system_drive();
    let installs = find_installs(env, &environment, &partitions, target, system_drive.as_ref());
    let selected = select(&installs, target)?;
    let install = &installs[selected];
    info!(
        "Diagnosing {} (confidence {}, {} installations found)",
        install.drive,
        install.confidence,
        installs.len()
    );

    let facts = fetch_facts(env, config, &environment, install, partitions);
    let reports = OtherReports {
        disk_health: blockers::disk_health(&facts.partitions),
        registry: blockers::scan_registry(env, install),
        setup_log: match SetupLogScanner::new(env).scan(&install.drive) {
            Ok(entries) => blockers::setup_log(&entries),
            Err(e) => {
                warn!("{e}");
                Vec::new()
            }
        },
    };

    Ok(Survey {
        environment,
        installs,
        selected,
        facts,
        reports,
    })
}

/// Finds every installation on the candidate drives, in drive order.
fn find_installs(
    fs: &impl FileSystemProbe,
    environment: &BootEnvironment,
    partitions: &[PartitionInfo],
    target: Option<&DriveId>,
    system_drive: Option<&DriveId>,
) -> Vec<OsInstallation> {
    let drives: BTreeSet<&DriveId> = partitions
        .iter()
        .filter_map(|x| x.mount_point.as_ref())
        .chain(target)
        .chain(system_drive)
        .collect();
    let winpe = system_drive.is_some_and(|x| x.as_str() == RAMDISK_DRIVE);

    drives
        .into_iter()
        .filter(|drive| !(winpe && drive.as_str() == RAMDISK_DRIVE))
        .filter_map(|drive| {
            let exists = |path: &str| match fs.stat(path) {
                Ok(stat) => stat.exists,
                Err(e) => {
                    warn!("{e}");
                    false
                }
            };
            if !exists(&drive.join(SYSTEM_HIVE)) {
                return None;
            }

            let mut install = OsInstallation::new(drive.clone());
            let kernel = exists(&install.kernel_path());
            let loader = exists(&install.loader_path(environment.expected_loader()));
            let missing = u8::from(!kernel) + u8::from(!loader);
            install.confidence = 100 - 30 * missing;
            install.is_current_os = system_drive == Some(drive);
            debug!("Found installation on {drive} (confidence {})", install.confidence);
            Some(install)
        })
        .collect()
}

/// Selects the installation to diagnose: the target, else the running OS, else the most complete one.
fn select(installs: &[OsInstallation], target: Option<&DriveId>) -> Result<usize, ConfigurationError> {
    if let Some(target) = target {
        return installs
            .iter()
            .position(|x| &x.drive == target)
            .ok_or_else(|| ConfigurationError::TargetNotFound(target.clone()));
    }

    installs
        .iter()
        .position(|x| x.is_current_os)
        .or_else(|| {
            installs
                .iter()
                .enumerate()
                .min_by_key(|(_, x)| core::cmp::Reverse(x.confidence))
                .map(|(i, _)| i)
        })
        .ok_or(ConfigurationError::NoInstallation)
}

/// Fetches every fact about the selected installation.
fn fetch_facts<E: Environment>(
    env: &E,
    config: &DoctorConfig,
    environment: &BootEnvironment,
    install: &OsInstallation,
    partitions: Vec<PartitionInfo>,
) -> Facts {
    let (boot_manager, bcd_file, bcd_entry) = match boot_paths(environment, &partitions, install) {
        Some((boot_manager, bcd)) => (
            inspect(env, &boot_manager).map_err(FetchFailure::from),
            inspect(env, &bcd).map_err(FetchFailure::from),
            env.read_entry(&bcd, DEFAULT_ENTRY)
                .map_err(FetchFailure::from),
        ),
        None => (
            Ok(FileFact::missing(format!("{UEFI_BOOT_DIR}\\bootmgfw.efi"))),
            Ok(FileFact::missing(format!("{UEFI_BOOT_DIR}\\BCD"))),
            Err(FetchFailure("The EFI System Partition is not mounted".to_owned())),
        ),
    };

    let loader = install.loader_path(environment.expected_loader());
    let file = |path: &str| -> Fetched<FileFact> {
        Ok(recheck(env, path, config.recheck_attempts, config.recheck_backoff)?)
    };

    Facts {
        boot_manager,
        bcd_file,
        bcd_entry,
        loader: file(&loader),
        kernel: file(&install.kernel_path()),
        drivers: drivers(env, install).map_err(FetchFailure::from),
        lock_state: env.lock_state(&install.drive, config.encryption_timeout),
        partitions,
    }
}

/// Returns the paths of the boot manager and the BCD store, or `None` if they live on an ESP that cannot be
/// read.
fn boot_paths(
    environment: &BootEnvironment,
    partitions: &[PartitionInfo],
    install: &OsInstallation,
) -> Option<(String, String)> {
    if environment.boots_uefi() {
        let esp = environment.esp.drive.as_ref()?;
        Some((
            esp.join(&format!("{UEFI_BOOT_DIR}\\bootmgfw.efi")),
            esp.join(&format!("{UEFI_BOOT_DIR}\\BCD")),
        ))
    } else {
        let drive = partitions
            .iter()
            .find(|x| x.active)
            .and_then(|x| x.mount_point.as_ref())
            .unwrap_or(&install.drive);
        Some((drive.join("\\bootmgr"), drive.join("\\Boot\\BCD")))
    }
}

/// Reads the boot-critical storage drivers registered in the SYSTEM hive of an installation.
fn drivers(
    hives: &impl RegistryHiveReader,
    install: &OsInstallation,
) -> Result<Vec<DriverRegistration>, HiveError> {
    let hive = &install.system_hive_path;
    let control_set = current_control_set(hives, hive)?;
    let mut found = Vec::new();

    for name in BOOT_CRITICAL_DRIVERS {
        let key = format!("{control_set}\\Services\\{name}");
        let values = match hives.read_key(hive, &key) {
            Ok(values) => values,
            Err(HiveError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        };

        // any non-zero start type under StartOverride wins over Start
        let override_trap = match hives.read_key(hive, &format!("{key}\\StartOverride")) {
            Ok(values) => values
                .values()
                .any(|x| x.as_dword().is_some_and(|x| x != 0)),
            Err(HiveError::NotFound(_)) => false,
            Err(e) => return Err(e),
        };

        found.push(DriverRegistration {
            name: (*name).to_owned(),
            start: values.get("Start").and_then(RegValue::as_dword),
            override_trap,
        });
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::{BTreeMap, BTreeSet},
        time::Duration,
    };

    use super::*;
    use crate::{
        error::DiagError,
        gate::EnvironmentSignals,
        model::{
            environment::{Filesystem, FirmwareType, SecureBootState, VolumeHealth},
            facts::{BcdEntry, DeviceRef, LockState},
            install::KERNEL,
        },
        system::{
            BootStoreReader, CommandDescriptor, CommandExecutor, CommandOutput,
            EncryptionStatusProbe, ExecError, FetchError, FileStat, HostProbe, KeyValues,
            PartitionTableProbe,
        },
    };

    /// A machine with files on drives and nothing else.
    #[derive(Default)]
    struct Machine {
        files: BTreeSet<String>,
        partitions: Vec<PartitionInfo>,
        system_drive: Option<DriveId>,
        hive_reads: RefCell<Vec<String>>,
    }

    impl Machine {
        fn install(mut self, drive: &str) -> Self {
            let drive = DriveId::new(drive).unwrap();
            for path in [SYSTEM_HIVE, KERNEL, "\\Windows\\System32\\winload.efi"] {
                self.files.insert(drive.join(path));
            }
            self.partitions.push(PartitionInfo {
                partition_id: format!("disk0:{drive}"),
                type_guid: "ebd0a0a2-b9e5-4433-87c0-68b6b72699c7".to_owned(),
                mount_point: Some(drive),
                filesystem: Filesystem::Ntfs,
                health: VolumeHealth::Healthy,
                active: false,
            });
            self
        }
    }

    impl FileSystemProbe for Machine {
        fn stat(&self, path: &str) -> Result<FileStat, FetchError> {
            let exists = self.files.contains(path);
            Ok(FileStat {
                exists,
                size_bytes: if exists { 4096 } else { 0 },
                readable: exists,
            })
        }

        fn read_text(&self, path: &str) -> Result<String, FetchError> {
            Err(FetchError::Io {
                path: path.to_owned(),
                source: std::io::ErrorKind::NotFound.into(),
            })
        }
    }

    impl PartitionTableProbe for Machine {
        fn partitions(&self) -> Result<Vec<PartitionInfo>, FetchError> {
            Ok(self.partitions.clone())
        }
    }

    impl BootStoreReader for Machine {
        fn read_entry(&self, _store_path: &str, _entry_id: &str) -> Result<BcdEntry, FetchError> {
            Ok(BcdEntry {
                device: DeviceRef::Boot,
                os_device: DeviceRef::Boot,
                loader_path: None,
            })
        }
    }

    impl RegistryHiveReader for Machine {
        fn read_key(&self, hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError> {
            self.hive_reads.borrow_mut().push(key_path.to_owned());
            match key_path {
                "Select" => Ok(BTreeMap::from([("Current".to_owned(), RegValue::Dword(1))])),
                "ControlSet001\\Services\\storahci" => {
                    Ok(BTreeMap::from([("Start".to_owned(), RegValue::Dword(0))]))
                }
                "ControlSet001\\Services\\storahci\\StartOverride" => {
                    Ok(BTreeMap::from([("0".to_owned(), RegValue::Dword(3))]))
                }
                _ => Err(HiveError::NotFound(format!("{hive_path}\\{key_path}"))),
            }
        }
    }

    impl EncryptionStatusProbe for Machine {
        fn lock_state(&self, _volume: &DriveId, _timeout: Duration) -> LockState {
            LockState::Unknown
        }
    }

    impl CommandExecutor for Machine {
        fn execute(&self, command: &CommandDescriptor) -> Result<CommandOutput, ExecError> {
            Err(ExecError::Spawn {
                program: command.program.clone(),
                source: std::io::ErrorKind::Unsupported.into(),
            })
        }
    }

    impl HostProbe for Machine {
        fn firmware_type(&self) -> FirmwareType {
            FirmwareType::Uefi
        }

        fn secure_boot(&self) -> SecureBootState {
            SecureBootState::Disabled
        }

        fn signals(&self) -> EnvironmentSignals {
            EnvironmentSignals::empty()
        }

        fn system_drive(&self) -> Option<DriveId> {
            self.system_drive.clone()
        }
    }

    fn drive(x: &str) -> DriveId {
        DriveId::new(x).unwrap()
    }

    #[test]
    fn test_selection() {
        let mut machine = Machine::default().install("C:").install("D:");
        machine.files.remove(&drive("C:").join(KERNEL));

        let survey = survey(&machine, &DoctorConfig::default(), None).unwrap();
        assert_eq!(survey.installs.len(), 2);
        assert_eq!(survey.installs[0].confidence, 70);
        assert_eq!(survey.install().unwrap().drive, drive("D:"));

        machine.system_drive = Some(drive("C:"));
        let survey = super::survey(&machine, &DoctorConfig::default(), None).unwrap();
        assert!(survey.install().unwrap().is_current_os);
        assert_eq!(survey.install().unwrap().drive, drive("C:"));
    }

    #[test]
    fn test_winpe_ramdisk_is_skipped() {
        let mut machine = Machine::default().install("X:");
        machine.system_drive = Some(drive("X:"));
        let err = survey(&machine, &DoctorConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            DiagError::Configuration(ConfigurationError::NoInstallation)
        ));
    }

    #[test]
    fn test_target_not_found() {
        let machine = Machine::default().install("C:");
        let err = survey(&machine, &DoctorConfig::default(), Some(&drive("E:"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration Error: No Windows installation was found on E:"
        );
    }

    #[test]
    fn test_unmounted_esp() {
        let machine = Machine::default().install("C:");
        let survey = survey(&machine, &DoctorConfig::default(), None).unwrap();
        assert_eq!(
            survey.facts.boot_manager,
            Ok(FileFact::missing("\\EFI\\Microsoft\\Boot\\bootmgfw.efi"))
        );
        assert!(survey.facts.bcd_entry.is_err());
    }

    #[test]
    fn test_driver_override_trap() {
        let machine = Machine::default().install("C:");
        let config = DoctorConfig {
            recheck_attempts: 0,
            ..DoctorConfig::default()
        };
        let survey = survey(&machine, &config, None).unwrap();
        assert_eq!(
            survey.facts.drivers,
            Ok(vec![DriverRegistration {
                name: "storahci".to_owned(),
                start: Some(0),
                override_trap: true,
            }])
        );
        assert!(
            machine
                .hive_reads
                .borrow()
                .iter()
                .any(|x| x == "ControlSet001\\Services\\stornvme")
        );
    }

    #[test]
    fn test_snapshot() {
        let machine = Machine::default().install("C:");
        let survey = survey(&machine, &DoctorConfig::default(), None).unwrap();
        let bytes = survey.to_snapshot().unwrap();
        assert_eq!(Survey::from_snapshot(&bytes).unwrap(), survey);
        assert!(Survey::from_snapshot(&bytes[..bytes.len() / 2]).is_err());
    }
}
