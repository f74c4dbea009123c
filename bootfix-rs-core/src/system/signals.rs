// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A [`HostProbe`] for the machine the toolkit runs on.
//!
//! The firmware type comes from the `PEFirmwareType` value of the live `Control` key, which Windows
//! and WinPE both set (`1` for BIOS, `2` for UEFI). If it cannot be queried, the `firmware_type`
//! variable is used, which is only set when a launcher script exported it.
//! The environment signals are gathered independently of each other:
//!
//! | Signal | Source |
//! |---|---|
//! | `SYSTEM_DRIVE_X` | `SystemDrive` is `X:` |
//! | `MININT_KEY` | `HKLM\SYSTEM\CurrentControlSet\Control\MiniNT` exists |
//! | `WINPE_TOOLS` | `%SystemRoot%\System32\wpeutil.exe` exists |
//! | `WINPE_SHELL` | `%SystemRoot%\System32\winpeshl.ini` or `startnet.cmd` exists |
//! | `EXPLORER_SHELL` | `%SystemRoot%\explorer.exe` exists |
//! | `USER_PROFILE` | `USERPROFILE` points at a real user, not `systemprofile` |
//! | `INSTALLED_SYSTEM_DRIVE` | `SystemDrive` is not `X:` and holds a SYSTEM hive |

use std::{collections::BTreeMap, time::Duration};

use log::debug;

use crate::{
    gate::EnvironmentSignals,
    model::{
        environment::{FirmwareType, SecureBootState},
        install::SYSTEM_HIVE,
        types::DriveId,
    },
    system::{
        CommandDescriptor, CommandExecutor, FileSystemProbe, HostProbe, command::run_for_stdout,
    },
};

/// The environment variables the probe looks at.
const VARS: [&str; 4] = ["firmware_type", "SystemDrive", "SystemRoot", "USERPROFILE"];

/// The time bound for the Secure Boot query.
const SECURE_BOOT_TIMEOUT: Duration = Duration::from_secs(5);

/// The time bound for `reg` queries.
const REG_TIMEOUT: Duration = Duration::from_secs(5);

/// The key holding `PEFirmwareType`.
const CONTROL_KEY: &str = "HKLM\\SYSTEM\\CurrentControlSet\\Control";

/// The key that only exists in WinPE.
const MININT_KEY: &str = "HKLM\\SYSTEM\\CurrentControlSet\\Control\\MiniNT";

/// [`HostProbe`] over environment variables, marker files and the live registry.
pub struct HostSignals<'a, X: CommandExecutor, F: FileSystemProbe> {
    /// The executor used for `reg` and `PowerShell`.
    executor: &'a X,

    /// The filesystem used for marker files.
    fs: &'a F,

    /// A snapshot of the environment variables in [`VARS`].
    vars: BTreeMap<String, String>,
}

impl<'a, X: CommandExecutor, F: FileSystemProbe> HostSignals<'a, X, F> {
    /// Creates a new [`HostSignals`] from the environment of the current process.
    pub fn new(executor: &'a X, fs: &'a F) -> Self {
        let vars = VARS
            .iter()
            .filter_map(|&name| std::env::var(name).ok().map(|x| (name.to_owned(), x)))
            .collect();
        Self::with_vars(executor, fs, vars)
    }

    /// Creates a new [`HostSignals`] with a given set of environment variables.
    pub const fn with_vars(executor: &'a X, fs: &'a F, vars: BTreeMap<String, String>) -> Self {
        Self { executor, fs, vars }
    }

    /// Returns an environment variable, ignoring case.
    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|x| !x.is_empty())
    }

    /// Checks if a file exists, treating an inspection failure as absence.
    fn exists(&self, path: &str) -> bool {
        self.fs.stat(path).is_ok_and(|x| x.exists)
    }

    /// Returns the Windows directory of the running system.
    fn system_root(&self) -> Option<String> {
        self.var("SystemRoot")
            .map(str::to_owned)
            .or_else(|| self.system_drive().map(|x| x.join("\\Windows")))
    }

    /// Checks if the `MiniNT` key exists in the live registry.
    fn minint_key(&self) -> bool {
        let command = CommandDescriptor::new("reg", ["query", MININT_KEY]).timeout(REG_TIMEOUT);
        matches!(run_for_stdout(self.executor, &command), Ok((true, _)))
    }

    /// Queries `PEFirmwareType` from the live registry.
    fn queried_firmware_type(&self) -> Option<FirmwareType> {
        let command = CommandDescriptor::new("reg", ["query", CONTROL_KEY, "/v", "PEFirmwareType"])
            .timeout(REG_TIMEOUT);
        match run_for_stdout(self.executor, &command) {
            Ok((true, text)) => parse_firmware_type(&text),
            Ok((false, text)) => {
                debug!("Firmware type query failed: {}", text.trim());
                None
            }
            Err(e) => {
                debug!("Firmware type query failed: {e}");
                None
            }
        }
    }
}

/// Parses the `PEFirmwareType` line of `reg query` output, such as `PEFirmwareType    REG_DWORD    0x2`.
#[must_use = "Has no effect if the result is unused"]
pub fn parse_firmware_type(text: &str) -> Option<FirmwareType> {
    let line = text
        .lines()
        .find(|x| x.trim_start().to_ascii_lowercase().starts_with("pefirmwaretype"))?;
    let value = line.split_whitespace().last()?;
    let value = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    match u32::from_str_radix(value, 16).ok()? {
        1 => Some(FirmwareType::LegacyBios),
        2 => Some(FirmwareType::Uefi),
        _ => None,
    }
}

impl<X: CommandExecutor, F: FileSystemProbe> HostProbe for HostSignals<'_, X, F> {
    fn firmware_type(&self) -> FirmwareType {
        if let Some(firmware) = self.queried_firmware_type() {
            return firmware;
        }
        match self.var("firmware_type").map(str::to_ascii_lowercase).as_deref() {
            Some("uefi") => FirmwareType::Uefi,
            Some("legacy" | "bios") => FirmwareType::LegacyBios,
            _ => FirmwareType::Unknown,
        }
    }

    fn secure_boot(&self) -> SecureBootState {
        let firmware = self.firmware_type();
        if firmware == FirmwareType::LegacyBios {
            return SecureBootState::Disabled;
        }
        let command = CommandDescriptor::new(
            "powershell",
            ["-NoProfile", "-NonInteractive", "-Command", "Confirm-SecureBootUEFI"],
        )
        .timeout(SECURE_BOOT_TIMEOUT);
        match run_for_stdout(self.executor, &command) {
            Ok((true, text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => SecureBootState::Enabled,
                "false" => SecureBootState::Disabled,
                _ => SecureBootState::Unknown,
            },
            Ok((false, text)) => {
                debug!("Secure Boot query failed: {}", text.trim());
                SecureBootState::Unknown
            }
            Err(e) => {
                debug!("Secure Boot query failed: {e}");
                SecureBootState::Unknown
            }
        }
    }

    fn signals(&self) -> EnvironmentSignals {
        let mut signals = EnvironmentSignals::empty();
        let drive = self.system_drive();
        let on_ramdisk = drive.as_ref().is_some_and(|x| x.as_str() == "X:");
        let root = self.system_root();

        signals.set(EnvironmentSignals::SYSTEM_DRIVE_X, on_ramdisk);
        signals.set(EnvironmentSignals::MININT_KEY, self.minint_key());

        if let Some(root) = &root {
            let system32 = format!("{root}\\System32");
            signals.set(
                EnvironmentSignals::WINPE_TOOLS,
                self.exists(&format!("{system32}\\wpeutil.exe")),
            );
            signals.set(
                EnvironmentSignals::WINPE_SHELL,
                self.exists(&format!("{system32}\\winpeshl.ini"))
                    || self.exists(&format!("{system32}\\startnet.cmd")),
            );
            signals.set(
                EnvironmentSignals::EXPLORER_SHELL,
                self.exists(&format!("{root}\\explorer.exe")),
            );
        }

        let real_profile = self.var("USERPROFILE").is_some_and(|x| {
            let x = x.to_ascii_lowercase();
            !x.starts_with("x:") && !x.ends_with("systemprofile")
        });
        signals.set(EnvironmentSignals::USER_PROFILE, real_profile);

        if let Some(drive) = &drive
            && !on_ramdisk
        {
            signals.set(
                EnvironmentSignals::INSTALLED_SYSTEM_DRIVE,
                self.exists(&drive.join(SYSTEM_HIVE)),
            );
        }

        debug!("Environment signals: {signals:?}");
        signals
    }

    fn system_drive(&self) -> Option<DriveId> {
        self.var("SystemDrive").and_then(|x| DriveId::new(x).ok())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        gate::{RepairMode, classify},
        system::{CommandOutput, ExecError, FetchError, FileStat},
    };

    /// A filesystem with a fixed set of files.
    struct Files(&'static [&'static str]);

    impl FileSystemProbe for Files {
        fn stat(&self, path: &str) -> Result<FileStat, FetchError> {
            let exists = self.0.iter().any(|x| x.eq_ignore_ascii_case(path));
            Ok(FileStat {
                exists,
                size_bytes: u64::from(exists),
                readable: exists,
            })
        }

        fn read_text(&self, _path: &str) -> Result<String, FetchError> {
            Ok(String::new())
        }
    }

    /// An executor where every command exits with a fixed code.
    struct Exits(i32);

    impl CommandExecutor for Exits {
        fn execute(&self, _command: &CommandDescriptor) -> Result<CommandOutput, ExecError> {
            Ok(CommandOutput {
                exit_code: Some(self.0),
                stdout: "True".to_owned(),
                stderr: String::new(),
            })
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_winpe() {
        let fs = Files(&["X:\\Windows\\System32\\wpeutil.exe", "X:\\Windows\\System32\\startnet.cmd"]);
        let probe = HostSignals::with_vars(
            &Exits(0),
            &fs,
            vars(&[
                ("SystemDrive", "X:"),
                ("SystemRoot", "X:\\Windows"),
                ("USERPROFILE", "X:\\windows\\system32\\config\\systemprofile"),
                ("firmware_type", "UEFI"),
            ]),
        );
        let signals = probe.signals();
        assert_eq!(signals.recovery_count(), 4);
        assert_eq!(signals.production_count(), 0);
        assert_eq!(classify(signals, false), RepairMode::RepairForce);
        assert_eq!(probe.firmware_type(), FirmwareType::Uefi);
        assert_eq!(probe.secure_boot(), SecureBootState::Enabled);
    }

    #[test]
    fn test_live_os() {
        let fs = Files(&["C:\\Windows\\explorer.exe", "C:\\Windows\\System32\\config\\SYSTEM"]);
        let probe = HostSignals::with_vars(
            &Exits(1),
            &fs,
            vars(&[
                ("SystemDrive", "C:"),
                ("SystemRoot", "C:\\WINDOWS"),
                ("USERPROFILE", "C:\\Users\\someone"),
                ("firmware_type", "Legacy"),
            ]),
        );
        let signals = probe.signals();
        assert_eq!(signals.recovery_count(), 0);
        assert_eq!(signals.production_count(), 3);
        assert_eq!(classify(signals, false), RepairMode::DiagnoseOnly);
        assert_eq!(probe.firmware_type(), FirmwareType::LegacyBios);
        assert_eq!(probe.secure_boot(), SecureBootState::Disabled);
    }

    /// An executor that answers the `PEFirmwareType` query and records every command.
    struct Registry {
        /// The value of `PEFirmwareType`.
        value: &'static str,

        /// Every command that was run.
        commands: RefCell<Vec<CommandDescriptor>>,
    }

    impl Registry {
        fn new(value: &'static str) -> Self {
            Self {
                value,
                commands: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandExecutor for Registry {
        fn execute(&self, command: &CommandDescriptor) -> Result<CommandOutput, ExecError> {
            self.commands.borrow_mut().push(command.clone());
            if command.args.iter().any(|x| x == "PEFirmwareType") {
                Ok(CommandOutput {
                    exit_code: Some(0),
                    stdout: format!(
                        "\r\nHKEY_LOCAL_MACHINE\\SYSTEM\\CurrentControlSet\\Control\r\n    PEFirmwareType    REG_DWORD    {}\r\n",
                        self.value
                    ),
                    stderr: String::new(),
                })
            } else {
                Err(ExecError::Timeout {
                    program: command.program.clone(),
                    timeout_ms: 5000,
                })
            }
        }
    }

    #[test]
    fn test_firmware_from_registry() {
        let uefi = Registry::new("0x2");
        let host = HostSignals::with_vars(&uefi, &Files(&[]), BTreeMap::new());
        assert_eq!(host.firmware_type(), FirmwareType::Uefi);

        // the registry wins over a stale variable
        let bios = Registry::new("0x1");
        let host =
            HostSignals::with_vars(&bios, &Files(&[]), vars(&[("firmware_type", "UEFI")]));
        assert_eq!(host.firmware_type(), FirmwareType::LegacyBios);
        assert_eq!(host.secure_boot(), SecureBootState::Disabled);
    }

    #[test]
    fn test_unknown_registry_value_falls_back() {
        let registry = Registry::new("0x7");
        let host =
            HostSignals::with_vars(&registry, &Files(&[]), vars(&[("firmware_type", "UEFI")]));
        assert_eq!(host.firmware_type(), FirmwareType::Uefi);
    }

    #[test]
    fn test_registry_queries_are_bounded() {
        let registry = Registry::new("0x2");
        let host = HostSignals::with_vars(&registry, &Files(&[]), vars(&[("SystemDrive", "X:")]));
        let _ = host.firmware_type();
        let signals = host.signals();
        assert!(!signals.contains(EnvironmentSignals::MININT_KEY));

        let commands = registry.commands.borrow();
        assert!(commands.iter().any(|x| x.args.iter().any(|x| x == MININT_KEY)));
        assert!(commands.iter().all(|x| x.timeout == Some(REG_TIMEOUT)));
    }

    #[test]
    fn test_parse_firmware_type() {
        assert_eq!(
            parse_firmware_type("    PEFirmwareType    REG_DWORD    0x2"),
            Some(FirmwareType::Uefi)
        );
        assert_eq!(
            parse_firmware_type("HKEY_LOCAL_MACHINE\\...\n    pefirmwaretype REG_DWORD 0X1\n"),
            Some(FirmwareType::LegacyBios)
        );
        assert_eq!(
            parse_firmware_type(
                "ERROR: The system was unable to find the specified registry key or value."
            ),
            None
        );
        assert_eq!(parse_firmware_type("    PEFirmwareType    REG_DWORD    2"), None);
    }

    #[test]
    fn test_no_vars_is_inconclusive() {
        let probe = HostSignals::with_vars(&Exits(1), &Files(&[]), BTreeMap::new());
        assert!(probe.signals().is_empty());
        assert_eq!(probe.system_drive(), None);
        assert_eq!(probe.firmware_type(), FirmwareType::Unknown);
    }
}
