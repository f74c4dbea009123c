// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The machine-readable payload and the human-readable report of a diagnosis.

use core::fmt;

use bootfix_rs_core::{
    doctor::Diagnosis,
    error::DiagError,
    model::environment::FirmwareType,
    probe::ProbeId,
    rank::RankedBlocker,
    verdict::{Check, ConfidenceLevel},
};
use serde::Serialize;

/// The machine-readable payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Payload {
    /// If the installation will boot.
    pub bootable: bool,

    /// `YES` or `NO`.
    pub verdict: &'static str,

    /// `HIGH`, `MEDIUM` or `LOW`.
    pub confidence: &'static str,

    /// The firmware type of the machine.
    pub firmware: &'static str,

    /// If the EFI System Partition has a drive letter.
    pub esp_mounted: bool,

    /// If the BCD store is readable and its loader path is the expected one.
    pub bcd_valid: bool,

    /// If the loader file exists and is not empty.
    pub winload_present: bool,

    /// If a boot-critical storage driver is registered to start at boot.
    pub drivers_ok: bool,

    /// If every link of the boot chain resolved.
    pub chain_intact: bool,

    /// The issue that most likely blocks boot.
    pub blocking_issue: Option<String>,

    /// How many probes passed.
    pub checks_passed: usize,
}

impl Payload {
    /// Builds the payload of a diagnosis.
    pub fn new(diagnosis: &Diagnosis) -> Self {
        let evidence = &diagnosis.evidence;
        let verdict = &diagnosis.verdict;
        Self {
            bootable: verdict.will_boot,
            verdict: verdict.as_str(),
            confidence: verdict.confidence_level.as_str(),
            firmware: diagnosis.survey.environment.firmware.as_str(),
            esp_mounted: diagnosis.survey.environment.esp.mounted,
            bcd_valid: evidence.passed(ProbeId::BcdReality) && verdict.checks.logical.passed(),
            winload_present: evidence.passed(ProbeId::LoaderFile),
            drivers_ok: evidence.passed(ProbeId::Driver),
            chain_intact: evidence.passed(ProbeId::ChainLink),
            blocking_issue: verdict.primary_issue().map(|x| x.detail.clone()),
            checks_passed: evidence.passed_count(),
        }
    }

    /// Builds the explicit `NO` payload of a run that ended before a verdict.
    pub fn unavailable(error: &DiagError) -> Self {
        Self {
            bootable: false,
            verdict: "NO",
            confidence: ConfidenceLevel::Low.as_str(),
            firmware: FirmwareType::Unknown.as_str(),
            esp_mounted: false,
            bcd_valid: false,
            winload_present: false,
            drivers_ok: false,
            chain_intact: false,
            blocking_issue: Some(error.to_string()),
            checks_passed: 0,
        }
    }

    /// Serializes the payload as pretty printed JSON.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the payload could not be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// The human-readable report of a run.
pub enum Report<'a> {
    /// A run that produced a verdict.
    Diagnosis {
        /// The diagnosis.
        diagnosis: &'a Diagnosis,

        /// The ranked blockers of the diagnosis.
        blockers: &'a [RankedBlocker],
    },

    /// A run that ended before a verdict.
    Unavailable(&'a DiagError),
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagnosis {
                diagnosis,
                blockers,
            } => write_diagnosis(f, diagnosis, blockers),
            Self::Unavailable(error) => {
                writeln!(f, "Will it boot: NO")?;
                writeln!(f, "No verdict could be computed.")?;
                writeln!(f, "Reason: {error}")
            }
        }
    }
}

/// Writes the report of a run that produced a verdict.
fn write_diagnosis(
    f: &mut fmt::Formatter<'_>,
    diagnosis: &Diagnosis,
    blockers: &[RankedBlocker],
) -> fmt::Result {
    let survey = &diagnosis.survey;
    let verdict = &diagnosis.verdict;
    let env = &survey.environment;

    writeln!(
        f,
        "Will it boot: {} ({} confidence, {}/100)",
        verdict.as_str(),
        verdict.confidence_level,
        verdict.confidence_score
    )?;
    if let Some(install) = survey.install() {
        let current = if install.is_current_os { " (current OS)" } else { "" };
        writeln!(f, "Installation: {}{current}", install.windows_path)?;
    }
    if survey.installs.len() > 1 {
        writeln!(f, "Installations found: {}", survey.installs.len())?;
    }
    write!(f, "Firmware: {}, {} disk, ", env.firmware, env.layout)?;
    match &env.esp.drive {
        Some(drive) => writeln!(f, "ESP on {drive}")?,
        None => writeln!(f, "ESP not mounted")?,
    }
    writeln!(f, "Secure Boot: {:?}", env.secure_boot)?;

    writeln!(f)?;
    writeln!(
        f,
        "Probes ({}/{} passed):",
        diagnosis.evidence.passed_count(),
        diagnosis.evidence.len()
    )?;
    for result in diagnosis.evidence.iter() {
        let status = if result.passed { "PASS" } else { "FAIL" };
        writeln!(f, "  [{status}] {}", result.probe_id)?;
        for line in &result.evidence {
            writeln!(f, "      {line}")?;
        }
        for issue in &result.issues {
            writeln!(f, "      ! {issue}")?;
        }
    }

    writeln!(f)?;
    writeln!(f, "Critical checks:")?;
    write_check(f, "physical", &verdict.checks.physical)?;
    write_check(f, "logical", &verdict.checks.logical)?;
    write_check(f, "security", &verdict.checks.security)?;

    if let Some(cause) = verdict.primary_cause {
        writeln!(f)?;
        writeln!(f, "Primary cause: {cause}")?;
        writeln!(f, "Recommended action: {}", cause.recommended_action())?;
    }

    if !blockers.is_empty() {
        writeln!(f)?;
        writeln!(f, "Top blockers:")?;
        for blocker in blockers {
            let candidate = &blocker.candidate;
            writeln!(
                f,
                "  {}. [{}/{}] {} (confidence {}%)",
                blocker.rank,
                candidate.severity,
                candidate.category,
                candidate.issue,
                candidate.confidence
            )?;
            writeln!(f, "     -> {}", candidate.recommended_action)?;
        }
    }

    Ok(())
}

/// Writes one critical check.
fn write_check(f: &mut fmt::Formatter<'_>, name: &str, check: &Check) -> fmt::Result {
    match check {
        Check::Pass(detail) => writeln!(f, "  {name}: PASS ({detail})"),
        Check::Fail(issue) => writeln!(f, "  {name}: FAIL ({issue})"),
        Check::Inconclusive(detail) => writeln!(f, "  {name}: INCONCLUSIVE ({detail})"),
    }
}
