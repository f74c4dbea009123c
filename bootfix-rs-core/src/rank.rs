// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The root-cause ranker.
//!
//! [`rank_blockers`] merges the primary cause of a verdict with the disk health, registry and setup log
//! findings into at most [`MAX_BLOCKERS`] [`RankedBlocker`]s, most urgent first.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    model::issue::Issue,
    verdict::{PrimaryCause, Verdict},
};

/// The most blockers ever reported.
pub const MAX_BLOCKERS: usize = 3;

/// How severe a blocker is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// The machine cannot boot or upgrade until this is fixed.
    Critical,

    /// Very likely to block.
    High,

    /// May block.
    Medium,

    /// Unlikely to block on its own.
    Low,

    /// The source did not say.
    Unspecified,
}

impl Severity {
    /// Returns the weight added to the priority score. Lower is more urgent.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Critical => 0,
            Self::High => 10,
            Self::Medium => 20,
            Self::Low => 30,
            Self::Unspecified => 15,
        }
    }

    /// Returns the name of the severity.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unspecified => "Unspecified",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a blocker comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// The boot chain itself is broken.
    BootFailure,

    /// A disk or volume is failing.
    Hardware,

    /// A driver, application or upgrade is incompatible.
    Compatibility,

    /// A registry value blocks boot or setup.
    RegistryBlocker,

    /// Anything else.
    Other,
}

impl Category {
    /// Returns the weight added to the priority score. Lower is more urgent.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn weight(self) -> u32 {
        match self {
            Self::BootFailure => 0,
            Self::Hardware => 5,
            Self::Compatibility => 10,
            Self::RegistryBlocker => 15,
            Self::Other => 20,
        }
    }

    /// Returns the name of the category.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BootFailure => "BootFailure",
            Self::Hardware => "Hardware",
            Self::Compatibility => "Compatibility",
            Self::RegistryBlocker => "RegistryBlocker",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A possible cause of a boot or setup failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockerCandidate {
    /// What is wrong.
    pub issue: String,

    /// Where it comes from.
    pub category: Category,

    /// How bad it is.
    pub severity: Severity,

    /// How sure the source is, from 0 to 100.
    pub confidence: u8,

    /// What to do about it.
    pub recommended_action: String,

    /// The computed priority. Lower is more urgent.
    pub priority_score: f64,
}

impl BlockerCandidate {
    /// Creates a new [`BlockerCandidate`] and computes its priority score.
    ///
    /// Confidence above 100 is clamped to 100.
    pub fn new(
        issue: impl Into<String>,
        category: Category,
        severity: Severity,
        confidence: u8,
        recommended_action: impl Into<String>,
    ) -> Self {
        let confidence = confidence.min(100);
        let priority_score = f64::from(severity.weight())
            + f64::from(100 - confidence) / 10.0
            + f64::from(category.weight());
        Self {
            issue: issue.into(),
            category,
            severity,
            confidence,
            recommended_action: recommended_action.into(),
            priority_score,
        }
    }
}

/// A [`BlockerCandidate`] with its rank, starting at 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedBlocker {
    /// The rank.
    pub rank: usize,

    /// The candidate.
    pub candidate: BlockerCandidate,
}

/// The candidate sources besides the verdict.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherReports {
    /// Failing or degraded volumes.
    pub disk_health: Vec<BlockerCandidate>,

    /// Registry values that block boot or setup.
    pub registry: Vec<BlockerCandidate>,

    /// Errors recorded by Windows Setup.
    pub setup_log: Vec<BlockerCandidate>,
}

impl OtherReports {
    /// Returns every candidate, in source order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockerCandidate> {
        self.disk_health
            .iter()
            .chain(&self.registry)
            .chain(&self.setup_log)
    }
}

/// Converts the primary cause of a NO verdict into a candidate.
#[must_use = "Has no effect if the result is unused"]
pub fn verdict_candidate(verdict: &Verdict) -> Option<BlockerCandidate> {
    if verdict.will_boot {
        return None;
    }
    let cause = verdict.primary_cause.unwrap_or(PrimaryCause::Unknown);
    let issue = verdict
        .primary_issue()
        .map_or_else(|| cause.to_string(), Issue::to_string);

    // the physical check is definitive, so its confidence is too
    let confidence = if verdict.checks.physical.failed() {
        100
    } else {
        verdict.confidence_score
    };

    Some(BlockerCandidate::new(
        issue,
        Category::BootFailure,
        Severity::Critical,
        confidence,
        cause.recommended_action(),
    ))
}

/// Ranks every candidate and returns the most urgent ones.
///
/// Candidates are sorted by ascending priority score. Ties keep the order the candidates were found in: the
/// verdict first, then disk health, registry and setup log.
#[must_use = "Has no effect if the result is unused"]
pub fn rank_blockers(verdict: &Verdict, reports: &OtherReports) -> Vec<RankedBlocker> {
    let mut candidates: Vec<BlockerCandidate> = verdict_candidate(verdict)
        .into_iter()
        .chain(reports.iter().cloned())
        .collect();
    candidates.sort_by(|a, b| a.priority_score.total_cmp(&b.priority_score));
    candidates.truncate(MAX_BLOCKERS);

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| RankedBlocker {
            rank: i + 1,
            candidate,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        model::issue::IssueKind,
        verdict::{Check, ConfidenceLevel, CriticalChecks},
    };

    fn no_verdict(physical: Check, score: u8) -> Verdict {
        let issue = Issue::new(IssueKind::BcdCorruption, "BCD path does not match");
        Verdict {
            will_boot: false,
            confidence_score: score,
            confidence_level: ConfidenceLevel::Low,
            blocking_issues: vec![issue],
            primary_cause: Some(PrimaryCause::BcdCorruption),
            checks: CriticalChecks {
                physical,
                logical: Check::Pass("ok".to_owned()),
                security: Check::Pass("ok".to_owned()),
            },
        }
    }

    fn candidate(severity: Severity, category: Category, confidence: u8) -> BlockerCandidate {
        BlockerCandidate::new("blocker", category, severity, confidence, "fix it")
    }

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Critical),
            Just(Severity::High),
            Just(Severity::Medium),
            Just(Severity::Low),
            Just(Severity::Unspecified),
        ]
    }

    fn category() -> impl Strategy<Value = Category> {
        prop_oneof![
            Just(Category::BootFailure),
            Just(Category::Hardware),
            Just(Category::Compatibility),
            Just(Category::RegistryBlocker),
            Just(Category::Other),
        ]
    }

    #[test]
    fn test_priority_score() {
        let x = candidate(Severity::High, Category::Hardware, 70);
        assert!((x.priority_score - 18.0).abs() < f64::EPSILON);
        let x = candidate(Severity::Unspecified, Category::Other, 255);
        assert_eq!(x.confidence, 100);
        assert!((x.priority_score - 35.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_verdict_first() {
        let verdict = no_verdict(Check::Pass("ok".to_owned()), 80);
        let reports = OtherReports {
            disk_health: vec![candidate(Severity::Critical, Category::Hardware, 90)],
            registry: vec![candidate(Severity::Medium, Category::RegistryBlocker, 70)],
            setup_log: vec![candidate(Severity::Critical, Category::Compatibility, 95)],
        };
        let ranked = rank_blockers(&verdict, &reports);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].candidate.category, Category::BootFailure);
        assert_eq!(ranked[0].candidate.issue, "BCD path does not match");
        assert_eq!(ranked[1].candidate.category, Category::Hardware);
        assert_eq!(ranked[2].candidate.category, Category::Compatibility);
    }

    #[test]
    fn test_definitive_confidence() {
        let verdict = no_verdict(Check::Fail(Issue::new(IssueKind::LoaderMissing, "gone")), 0);
        let x = verdict_candidate(&verdict).unwrap();
        assert_eq!(x.confidence, 100);
        assert!(x.priority_score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_ties_keep_order() {
        let verdict = no_verdict(Check::Pass("ok".to_owned()), 100);
        let mut first = candidate(Severity::Critical, Category::BootFailure, 100);
        first.issue = "disk".to_owned();
        let reports = OtherReports {
            disk_health: vec![first],
            ..OtherReports::default()
        };
        let ranked = rank_blockers(&verdict, &reports);
        assert_eq!(ranked[0].candidate.issue, "BCD path does not match");
        assert_eq!(ranked[1].candidate.issue, "disk");
    }

    proptest! {
        #[test]
        fn capped_and_sorted(
            items in prop::collection::vec((severity(), category(), any::<u8>()), 0..12),
            will_boot in any::<bool>(),
        ) {
            let mut verdict = no_verdict(Check::Pass("ok".to_owned()), 50);
            verdict.will_boot = will_boot;
            let reports = OtherReports {
                setup_log: items.into_iter().map(|(s, c, x)| candidate(s, c, x)).collect(),
                ..OtherReports::default()
            };
            let ranked = rank_blockers(&verdict, &reports);
            prop_assert!(ranked.len() <= MAX_BLOCKERS);
            for (i, x) in ranked.iter().enumerate() {
                prop_assert_eq!(x.rank, i + 1);
            }
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].candidate.priority_score <= pair[1].candidate.priority_score);
            }
        }
    }
}
