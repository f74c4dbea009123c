// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Checks that the BCD points at something real.
//!
//! A BCD can be perfectly readable and still be useless: `device` and `osdevice` may be `unknown` after a disk
//! clone, or name a partition that holds no Windows install at all. Both elements must resolve to a mounted
//! partition that was discovered as an installation.
//!
//! `boot` is accepted only when the installation lives on the active partition, which is where the boot
//! manager itself is loaded from on a single-partition legacy layout.
//!
//! While the entry is at hand, this probe also checks whether Secure Boot will refuse the configured loader,
//! which happens when the loader lies outside of `\Windows\System32`.

use crate::{
    model::{
        environment::SecureBootState,
        facts::DeviceRef,
        install::LOADER_DIR,
        issue::{Issue, IssueKind},
        types::{DriveId, normalize_path},
    },
    probe::{Probe, ProbeContext, ProbeError, ProbeId, ProbeResult, fetched},
};

/// The BCD reality probe.
pub struct BcdRealityProbe;

impl Probe for BcdRealityProbe {
    fn id(&self) -> ProbeId {
        ProbeId::BcdReality
    }

    fn run(&self, ctx: &ProbeContext<'_>) -> Result<ProbeResult, ProbeError> {
        let entry = fetched(&ctx.facts.bcd_entry, "the BCD default entry")?;
        let mut result = ProbeResult::new(self.id());

        for (element, device) in [("device", &entry.device), ("osdevice", &entry.os_device)] {
            match resolve(device, ctx) {
                Ok(drive) => result.note(format!(
                    "{element} {device} resolves to {drive}, which holds a Windows installation"
                )),
                Err(reason) => result.raise(Issue::new(
                    IssueKind::BcdCorruption,
                    format!("BCD {element} {device} {reason}"),
                )),
            }
        }

        match &entry.loader_path {
            None => result.raise(Issue::new(
                IssueKind::BcdCorruption,
                "BCD entry has no loader path",
            )),
            Some(path) => {
                result.note(format!("path {path}"));
                if ctx.env.secure_boot == SecureBootState::Enabled && !is_system_loader(path) {
                    result.raise(Issue::new(
                        IssueKind::SecureBootBlock,
                        format!("Secure Boot is enabled and {path} is outside of {LOADER_DIR}"),
                    ));
                }
            }
        }

        Ok(result)
    }
}

/// Resolves a device element to the drive of a discovered installation.
fn resolve(device: &DeviceRef, ctx: &ProbeContext<'_>) -> Result<DriveId, &'static str> {
    let drive = match device {
        DeviceRef::Partition(id) => {
            DriveId::new(id).map_err(|_| "is not a mounted partition")?
        }
        DeviceRef::Boot => {
            let active = ctx
                .facts
                .partitions
                .iter()
                .any(|x| x.active && x.mount_point.as_ref() == Some(&ctx.install.drive));
            if !active {
                return Err("is the boot partition, which holds no Windows installation");
            }
            ctx.install.drive.clone()
        }
        DeviceRef::Unknown => return Err("is unknown"),
        DeviceRef::Other(_) => return Err("is not a partition"),
    };

    if ctx.installs.iter().any(|x| x.drive == drive) {
        Ok(drive)
    } else {
        Err("does not contain a Windows installation")
    }
}

/// Checks if a loader path lies directly in `\Windows\System32`.
fn is_system_loader(path: &str) -> bool {
    let path = normalize_path(path).to_ascii_lowercase();
    let path = path.trim_start_matches('\\');
    let dir = LOADER_DIR.trim_start_matches('\\').to_ascii_lowercase();
    path.strip_prefix(&dir)
        .and_then(|x| x.strip_prefix('\\'))
        .is_some_and(|x| !x.is_empty() && !x.contains('\\'))
}
