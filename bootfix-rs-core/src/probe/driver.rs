// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Checks that at least one boot-critical storage driver will load at boot start.
//!
//! A driver counts when its service is registered, its `Start` value is `0`, and no `StartOverride` key
//! changes that behind its back. Without one, the kernel cannot read the disk it was loaded from and stops
//! with `INACCESSIBLE_BOOT_DEVICE`.

use crate::{
    model::issue::{Issue, IssueKind},
    probe::{Probe, ProbeContext, ProbeError, ProbeId, ProbeResult, fetched},
};

/// The storage controller drivers that can carry the boot volume.
pub const BOOT_CRITICAL_DRIVERS: &[&str] = &[
    "stornvme",
    "storahci",
    "iaStorVD",
    "iaStorAVC",
    "iaStorAC",
    "iaStorA",
    "iaStorV",
    "amdsata",
    "amdsbs",
    "megasas",
    "LSI_SAS",
    "vmbus",
    "storvsc",
    "viostor",
];

/// The storage driver probe.
pub struct DriverProbe;

impl Probe for DriverProbe {
    fn id(&self) -> ProbeId {
        ProbeId::Driver
    }

    fn run(&self, ctx: &ProbeContext<'_>) -> Result<ProbeResult, ProbeError> {
        let drivers = fetched(&ctx.facts.drivers, "the storage driver registrations")?;
        let mut result = ProbeResult::new(self.id());

        for driver in drivers {
            let start = driver
                .start
                .map_or_else(|| "no Start value".to_owned(), |x| format!("Start={x}"));
            let trap = if driver.override_trap {
                ", StartOverride trap"
            } else {
                ""
            };
            result.note(format!("{}: {start}{trap}", driver.name));
        }

        if !drivers.iter().any(|x| x.is_usable()) {
            let detail = if drivers.is_empty() {
                "No boot-critical storage driver is registered".to_owned()
            } else {
                format!(
                    "None of {} registered storage drivers loads at boot start",
                    drivers.len()
                )
            };
            result.raise(Issue::new(IssueKind::DriverMissing, detail));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::facts::DriverRegistration,
        probe::tests::{healthy, run_probe},
    };

    fn driver(name: &str, start: Option<u32>, override_trap: bool) -> DriverRegistration {
        DriverRegistration {
            name: name.to_owned(),
            start,
            override_trap,
        }
    }

    #[test]
    fn test_trap_is_not_usable() {
        let (env, install, mut facts) = healthy();
        facts.drivers = Ok(vec![
            driver("stornvme", Some(0), true),
            driver("storahci", Some(3), false),
        ]);
        let result = run_probe(&DriverProbe, &env, &install, &facts).unwrap();
        assert!(!result.passed);
        assert_eq!(result.evidence[0], "stornvme: Start=0, StartOverride trap");
        assert_eq!(result.issues[0].kind, IssueKind::DriverMissing);
    }

    #[test]
    fn test_one_usable_is_enough() {
        let (env, install, mut facts) = healthy();
        facts.drivers = Ok(vec![
            driver("iaStorVD", None, false),
            driver("storahci", Some(0), false),
        ]);
        let result = run_probe(&DriverProbe, &env, &install, &facts).unwrap();
        assert!(result.passed);
    }

    #[test]
    fn test_none_registered() {
        let (env, install, mut facts) = healthy();
        facts.drivers = Ok(Vec::new());
        let result = run_probe(&DriverProbe, &env, &install, &facts).unwrap();
        assert_eq!(
            result.issues[0].detail,
            "No boot-critical storage driver is registered"
        );
    }
}
