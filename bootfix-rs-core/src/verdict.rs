// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The verdict engine.
//!
//! [`evaluate`] turns an [`EvidenceSet`] and the [`CriticalChecks`] into a [`Verdict`]. It never performs I/O
//! and never formats a report; both belong to the caller.
//!
//! The rules, in order:
//!
//! 1. If the physical check fails, the machine will not boot and the confidence score is `0`, whatever every
//!    other probe says.
//! 2. The machine will boot if the physical and logical checks pass and the OS volume is not definitively
//!    locked. An inconclusive lock state only costs confidence.
//! 3. The confidence score is the share of probes that passed. More than one installation forces a low
//!    confidence, and a failed BCD reality probe forces a medium one.
//! 4. The primary cause of a NO verdict is the first [`PrimaryCause`] whose issue kind occurs among the
//!    blocking issues.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    evidence::EvidenceSet,
    model::issue::{Issue, IssueKind},
    probe::ProbeId,
};

pub mod checks;

pub use checks::{Check, CriticalChecks};

/// How much the score drops when the lock state of the OS volume is inconclusive.
const INCONCLUSIVE_SECURITY_PENALTY: u8 = 10;

/// The confidence band of a [`Verdict`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    /// The score is at least 80 with nothing forcing it lower.
    High,

    /// The score is at least 60, or the BCD reality probe failed.
    Medium,

    /// Anything else.
    #[default]
    Low,
}

impl ConfidenceLevel {
    /// Returns the band a plain score falls in.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn of(score: u8) -> Self {
        match score {
            80.. => Self::High,
            60.. => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Returns the name of the band.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The primary cause of a NO verdict.
///
/// The declaration order is the priority order: when several causes occur, the smallest one wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimaryCause {
    /// The loader file is missing or empty.
    MissingLoader,

    /// The BCD is corrupt or points at the wrong place.
    BcdCorruption,

    /// The system partition is missing or unusable.
    EspMissing,

    /// Secure Boot refuses the loader.
    SecureBootBlock,

    /// No boot-critical storage driver will load.
    DriverMissing,

    /// The installation itself is damaged.
    InstallCorrupt,

    /// The firmware type and disk layout contradict each other.
    FirmwareMismatch,

    /// The OS volume is locked by BitLocker.
    BitLockerLock,

    /// Nothing more specific could be found.
    Unknown,
}

impl PrimaryCause {
    /// Returns the cause an issue kind points to, if any.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn from_kind(kind: IssueKind) -> Option<Self> {
        match kind {
            IssueKind::LoaderMissing => Some(Self::MissingLoader),
            IssueKind::BcdCorruption => Some(Self::BcdCorruption),
            IssueKind::EspMissing => Some(Self::EspMissing),
            IssueKind::SecureBootBlock => Some(Self::SecureBootBlock),
            IssueKind::DriverMissing => Some(Self::DriverMissing),
            IssueKind::InstallCorrupt => Some(Self::InstallCorrupt),
            IssueKind::FirmwareMismatch => Some(Self::FirmwareMismatch),
            IssueKind::BitLockerLock => Some(Self::BitLockerLock),
            IssueKind::ProbeFailure => None,
        }
    }

    /// Selects the highest priority cause among a list of issues.
    pub fn select<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        issues
            .into_iter()
            .filter_map(|x| Self::from_kind(x.kind))
            .min()
            .unwrap_or(Self::Unknown)
    }

    /// Returns the human readable name of the cause.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingLoader => "Missing loader file",
            Self::BcdCorruption => "BCD corruption",
            Self::EspMissing => "Missing or unusable EFI system partition",
            Self::SecureBootBlock => "Secure Boot block",
            Self::DriverMissing => "Missing boot-critical storage driver",
            Self::InstallCorrupt => "Corrupt Windows installation",
            Self::FirmwareMismatch => "Firmware and disk layout mismatch",
            Self::BitLockerLock => "BitLocker lock",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns the repair usually recommended for the cause.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn recommended_action(self) -> &'static str {
        match self {
            Self::MissingLoader => "Restore the loader from the installation media, then rebuild the boot files",
            Self::BcdCorruption => "Rebuild the BCD so that it points at the installation's loader",
            Self::EspMissing => "Recreate or remount the EFI system partition and copy the boot files to it",
            Self::SecureBootBlock => "Point the BCD at the signed loader in \\Windows\\System32 or disable Secure Boot",
            Self::DriverMissing => "Inject the storage controller driver and set it to boot start",
            Self::InstallCorrupt => "Repair the system files of the installation",
            Self::FirmwareMismatch => "Switch the firmware boot mode to match the disk layout, or convert the disk",
            Self::BitLockerLock => "Unlock the volume with its recovery key before attempting any repair",
            Self::Unknown => "Review the evidence and rerun the diagnosis",
        }
    }
}

impl fmt::Display for PrimaryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boot verdict. Never mutated after [`evaluate`] creates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// If the installation will boot.
    pub will_boot: bool,

    /// How confident the engine is, from 0 to 100.
    pub confidence_score: u8,

    /// The confidence band.
    pub confidence_level: ConfidenceLevel,

    /// What stops the installation from booting. Empty for a YES verdict, never empty for a NO verdict.
    pub blocking_issues: Vec<Issue>,

    /// The primary cause of a NO verdict.
    pub primary_cause: Option<PrimaryCause>,

    /// The critical checks the verdict rests on.
    pub checks: CriticalChecks,
}

impl Verdict {
    /// Returns the blocking issue that decided the primary cause.
    #[must_use = "Has no effect if the result is unused"]
    pub fn primary_issue(&self) -> Option<&Issue> {
        let cause = self.primary_cause?;
        self.blocking_issues
            .iter()
            .find(|x| PrimaryCause::from_kind(x.kind) == Some(cause))
            .or_else(|| self.blocking_issues.first())
    }

    /// Returns `YES` or `NO`.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(&self) -> &'static str {
        if self.will_boot { "YES" } else { "NO" }
    }
}

/// Computes a [`Verdict`] from the evidence of a run.
#[must_use = "Has no effect if the result is unused"]
pub fn evaluate(evidence: &EvidenceSet, checks: CriticalChecks, install_count: usize) -> Verdict {
    let will_boot = checks.physical.passed() && checks.logical.passed() && !checks.security.failed();

    let (confidence_score, confidence_level) = if checks.physical.failed() {
        (0, ConfidenceLevel::Low)
    } else {
        score(evidence, &checks, install_count)
    };

    let (blocking_issues, primary_cause) = if will_boot {
        (Vec::new(), None)
    } else {
        let issues = blocking_issues(evidence, &checks);
        let cause = PrimaryCause::select(&issues);
        (issues, Some(cause))
    };

    Verdict {
        will_boot,
        confidence_score,
        confidence_level,
        blocking_issues,
        primary_cause,
        checks,
    }
}

/// Computes the confidence score and band when the physical check did not fail.
fn score(evidence: &EvidenceSet, checks: &CriticalChecks, install_count: usize) -> (u8, ConfidenceLevel) {
    let mut base = if evidence.is_empty() {
        0
    } else {
        u8::try_from(evidence.passed_count() * 100 / evidence.len()).unwrap_or(100)
    };
    if checks.security.inconclusive() {
        base = base.saturating_sub(INCONCLUSIVE_SECURITY_PENALTY);
    }

    if install_count > 1 {
        (base.min(base.saturating_sub(20).max(30)), ConfidenceLevel::Low)
    } else if evidence.failed(ProbeId::BcdReality) {
        (base.min(base.saturating_sub(15).max(40)), ConfidenceLevel::Medium)
    } else {
        (base, ConfidenceLevel::of(base))
    }
}

/// Collects the blocking issues of a NO verdict, critical checks first.
fn blocking_issues(evidence: &EvidenceSet, checks: &CriticalChecks) -> Vec<Issue> {
    let mut issues: Vec<Issue> = Vec::new();
    let found = [&checks.physical, &checks.logical, &checks.security]
        .into_iter()
        .filter_map(Check::issue)
        .chain(evidence.issues());
    for issue in found {
        if !issues.contains(issue) {
            issues.push(issue.clone());
        }
    }

    if issues.is_empty() {
        let reason = [&checks.physical, &checks.logical, &checks.security]
            .into_iter()
            .find_map(|x| match x {
                Check::Inconclusive(reason) => Some(reason.as_str()),
                _ => None,
            })
            .unwrap_or("no check passed");
        issues.push(Issue::new(
            IssueKind::ProbeFailure,
            format!("Boot viability could not be confirmed: {reason}"),
        ));
    }
    issues
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::probe::ProbeResult;

    fn evidence(passed: [bool; 5]) -> EvidenceSet {
        ProbeId::ALL
            .into_iter()
            .zip(passed)
            .map(|(id, passed)| {
                let mut result = ProbeResult::new(id);
                if !passed {
                    result.raise(Issue::new(IssueKind::DriverMissing, format!("{id} failed")));
                }
                result
            })
            .collect()
    }

    fn checks(physical: Check, logical: Check, security: Check) -> CriticalChecks {
        CriticalChecks {
            physical,
            logical,
            security,
        }
    }

    fn pass() -> Check {
        Check::Pass("ok".to_owned())
    }

    fn fail(kind: IssueKind) -> Check {
        Check::Fail(Issue::new(kind, "failed"))
    }

    fn check_strategy() -> impl Strategy<Value = Check> {
        prop_oneof![
            Just(pass()),
            Just(fail(IssueKind::BcdCorruption)),
            Just(Check::Inconclusive("timed out".to_owned())),
        ]
    }

    #[test]
    fn test_all_pass_is_high() {
        let verdict = evaluate(&evidence([true; 5]), checks(pass(), pass(), pass()), 1);
        assert!(verdict.will_boot);
        assert_eq!(verdict.confidence_score, 100);
        assert_eq!(verdict.confidence_level, ConfidenceLevel::High);
        assert!(verdict.blocking_issues.is_empty());
        assert_eq!(verdict.primary_cause, None);
    }

    #[test]
    fn test_cause_priority() {
        let issues = [
            Issue::new(IssueKind::BitLockerLock, "locked"),
            Issue::new(IssueKind::ProbeFailure, "panicked"),
            Issue::new(IssueKind::EspMissing, "no esp"),
            Issue::new(IssueKind::DriverMissing, "no driver"),
        ];
        assert_eq!(PrimaryCause::select(&issues), PrimaryCause::EspMissing);
        assert_eq!(PrimaryCause::select(&issues[1..2]), PrimaryCause::Unknown);
    }

    #[test]
    fn test_physical_issue_comes_first() {
        let verdict = evaluate(
            &evidence([true, true, false, true, false]),
            checks(fail(IssueKind::LoaderMissing), pass(), pass()),
            1,
        );
        assert_eq!(verdict.blocking_issues[0].kind, IssueKind::LoaderMissing);
        assert_eq!(verdict.primary_cause, Some(PrimaryCause::MissingLoader));
        assert_eq!(verdict.primary_cause.map(PrimaryCause::as_str), Some("Missing loader file"));
    }

    #[test]
    fn test_unconfirmed_no_still_has_issue() {
        let verdict = evaluate(
            &evidence([true; 5]),
            checks(pass(), Check::Inconclusive("BCD entry could not be read".to_owned()), pass()),
            1,
        );
        assert!(!verdict.will_boot);
        assert_eq!(verdict.blocking_issues.len(), 1);
        assert_eq!(
            verdict.blocking_issues[0].detail,
            "Boot viability could not be confirmed: BCD entry could not be read"
        );
        assert_eq!(verdict.primary_cause, Some(PrimaryCause::Unknown));
    }

    #[test]
    fn test_refinements() {
        let all = evidence([true; 5]);
        let verdict = evaluate(&all, checks(pass(), pass(), pass()), 2);
        assert_eq!((verdict.confidence_score, verdict.confidence_level), (80, ConfidenceLevel::Low));

        let bcd = evidence([true, false, true, true, true]);
        let verdict = evaluate(&bcd, checks(pass(), pass(), pass()), 1);
        assert_eq!((verdict.confidence_score, verdict.confidence_level), (65, ConfidenceLevel::Medium));

        let verdict = evaluate(
            &all,
            checks(pass(), pass(), Check::Inconclusive("timed out".to_owned())),
            1,
        );
        assert!(verdict.will_boot);
        assert_eq!((verdict.confidence_score, verdict.confidence_level), (90, ConfidenceLevel::High));
    }

    #[test]
    fn test_locked_is_no() {
        let verdict = evaluate(&evidence([true; 5]), checks(pass(), pass(), fail(IssueKind::BitLockerLock)), 1);
        assert!(!verdict.will_boot);
        assert_eq!(verdict.primary_cause, Some(PrimaryCause::BitLockerLock));
    }

    proptest! {
        #[test]
        fn physical_failure_overrides(
            passed in any::<[bool; 5]>(),
            logical in check_strategy(),
            security in check_strategy(),
            installs in 0_usize..4,
        ) {
            let verdict = evaluate(&evidence(passed), checks(fail(IssueKind::LoaderMissing), logical, security), installs);
            prop_assert!(!verdict.will_boot);
            prop_assert_eq!(verdict.confidence_score, 0);
            prop_assert!(!verdict.blocking_issues.is_empty());
            prop_assert!(verdict.primary_cause.is_some());
        }

        #[test]
        fn inconclusive_security_still_boots(passed in any::<[bool; 5]>(), installs in 0_usize..4) {
            let verdict = evaluate(
                &evidence(passed),
                checks(pass(), pass(), Check::Inconclusive("timed out".to_owned())),
                installs,
            );
            prop_assert!(verdict.will_boot);
        }

        #[test]
        fn no_always_explains_itself(
            passed in any::<[bool; 5]>(),
            physical in check_strategy(),
            logical in check_strategy(),
            security in check_strategy(),
        ) {
            let verdict = evaluate(&evidence(passed), checks(physical, logical, security), 1);
            prop_assert!(verdict.confidence_score <= 100);
            if !verdict.will_boot {
                prop_assert!(!verdict.blocking_issues.is_empty());
                prop_assert!(verdict.primary_cause.is_some());
            }
        }
    }
}
