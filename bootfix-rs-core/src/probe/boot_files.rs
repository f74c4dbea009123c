// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Checks that the boot manager and the BCD store exist where the firmware will look for them.
//!
//! On UEFI, these are `bootmgfw.efi` and `BCD` under `\EFI\Microsoft\Boot` on a mounted FAT32 ESP. On legacy
//! BIOS, these are `bootmgr` and `\Boot\BCD` on the active partition.

use crate::{
    model::{
        environment::Filesystem,
        issue::{Issue, IssueKind},
    },
    probe::{Probe, ProbeContext, ProbeError, ProbeId, ProbeResult, fetched},
};

/// The boot files probe.
pub struct BootFilesProbe;

impl Probe for BootFilesProbe {
    fn id(&self) -> ProbeId {
        ProbeId::BootFiles
    }

    fn run(&self, ctx: &ProbeContext<'_>) -> Result<ProbeResult, ProbeError> {
        let env = ctx.env;
        let mut result = ProbeResult::new(self.id());

        result.note(format!("Firmware: {}", env.firmware));
        if env.firmware_mismatch() {
            result.raise(Issue::new(
                IssueKind::FirmwareMismatch,
                format!("{} firmware cannot boot from a {} disk", env.firmware, env.layout),
            ));
        }

        if env.boots_uefi() {
            let esp = &env.esp;
            if !esp.present {
                result.raise(Issue::new(IssueKind::EspMissing, "No EFI System Partition found"));
                return Ok(result);
            }
            if !esp.mounted {
                result.raise(Issue::new(IssueKind::EspMissing, "EFI System Partition is not mounted"));
                return Ok(result);
            }
            result.note(format!("ESP filesystem: {}", esp.filesystem));
            if esp.filesystem != Filesystem::Fat32 {
                result.raise(Issue::new(
                    IssueKind::EspMissing,
                    format!("EFI System Partition is {}, not FAT32", esp.filesystem),
                ));
            }
        }

        let boot_manager = fetched(&ctx.facts.boot_manager, "the boot manager")?;
        let bcd = fetched(&ctx.facts.bcd_file, "the BCD store")?;

        result.note(boot_manager.evidence());
        if !boot_manager.is_viable() {
            result.raise(Issue::new(
                IssueKind::EspMissing,
                format!("Boot manager missing: {}", boot_manager.path),
            ));
        }

        result.note(bcd.evidence());
        if !bcd.is_viable() {
            result.raise(Issue::new(
                IssueKind::BcdCorruption,
                format!("BCD store missing or empty: {}", bcd.path),
            ));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::facts::{FetchFailure, FileFact},
        probe::tests::{healthy, run_probe},
    };

    #[test]
    fn test_unmounted_esp() {
        let (mut env, install, mut facts) = healthy();
        env.esp.mounted = false;
        facts.boot_manager = Err(FetchFailure("EFI System Partition is not mounted".to_owned()));
        let result = run_probe(&BootFilesProbe, &env, &install, &facts).unwrap();
        assert!(!result.passed);
        assert_eq!(result.issues[0].kind, IssueKind::EspMissing);
    }

    #[test]
    fn test_ntfs_esp_and_missing_bcd() {
        let (mut env, install, mut facts) = healthy();
        env.esp.filesystem = Filesystem::Ntfs;
        facts.bcd_file = Ok(FileFact::missing("S:\\EFI\\Microsoft\\Boot\\BCD"));
        let result = run_probe(&BootFilesProbe, &env, &install, &facts).unwrap();
        let kinds: Vec<_> = result.issues.iter().map(|x| x.kind).collect();
        assert_eq!(kinds, [IssueKind::EspMissing, IssueKind::BcdCorruption]);
    }

    #[test]
    fn test_legacy_ignores_esp() {
        let (mut env, install, mut facts) = healthy();
        env.firmware = crate::model::environment::FirmwareType::LegacyBios;
        env.layout = crate::model::environment::DiskLayout::Mbr;
        env.esp = crate::model::environment::EspInfo::default();
        facts.boot_manager = Ok(FileFact::present("C:\\bootmgr", 400_000));
        facts.bcd_file = Ok(FileFact::present("C:\\Boot\\BCD", 32_768));
        let result = run_probe(&BootFilesProbe, &env, &install, &facts).unwrap();
        assert!(result.passed, "{result:?}");
    }

    #[test]
    fn test_unreadable_store_is_execution_error() {
        let (env, install, mut facts) = healthy();
        facts.bcd_file = Err(FetchFailure("access denied".to_owned()));
        assert!(matches!(
            run_probe(&BootFilesProbe, &env, &install, &facts),
            Err(ProbeError::Execution { .. })
        ));
    }
}
