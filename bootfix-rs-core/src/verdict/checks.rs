// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The three critical checks the verdict engine rests on.
//!
//! - Physical: the loader and the kernel exist and are not empty.
//! - Logical: the BCD loader path names the loader the firmware expects, in `\Windows\System32`.
//! - Security: the OS volume is not locked by BitLocker.
//!
//! Each one either passes, fails with an [`Issue`], or is inconclusive because the fact behind it could not be
//! fetched. Only a failure is definitive.

use serde::{Deserialize, Serialize};

use crate::model::{
    environment::BootEnvironment,
    facts::{Facts, FileFact, LockState},
    install::OsInstallation,
    issue::{Issue, IssueKind},
    types::normalize_path,
};

/// The outcome of a single critical check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Check {
    /// The check passed, with a line of evidence.
    Pass(String),

    /// The check failed.
    Fail(Issue),

    /// The check could not be decided.
    Inconclusive(String),
}

impl Check {
    /// Checks if the check passed.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Pass(_))
    }

    /// Checks if the check definitively failed.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn failed(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    /// Checks if the check could not be decided.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive(_))
    }

    /// Returns the issue of a failed check.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn issue(&self) -> Option<&Issue> {
        match self {
            Self::Fail(issue) => Some(issue),
            _ => None,
        }
    }
}

/// The three critical checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalChecks {
    /// The loader and kernel exist.
    pub physical: Check,

    /// The BCD path matches the expected loader.
    pub logical: Check,

    /// The OS volume is not locked.
    pub security: Check,
}

impl CriticalChecks {
    /// Runs the critical checks over already-fetched facts.
    #[must_use = "Has no effect if the result is unused"]
    pub fn assess(env: &BootEnvironment, install: &OsInstallation, facts: &Facts) -> Self {
        Self {
            physical: physical(facts),
            logical: logical(env, facts),
            security: security(install, facts.lock_state),
        }
    }
}

/// The physical check.
fn physical(facts: &Facts) -> Check {
    let missing = |fact: &FileFact, kind, what: &str| {
        let detail = if fact.exists {
            format!("{what} is empty: {}", fact.path)
        } else {
            format!("Missing {} file: {}", what.to_lowercase(), fact.path)
        };
        Check::Fail(Issue::new(kind, detail))
    };

    // a definitive failure of either file wins over the other one being unknown
    match (&facts.loader, &facts.kernel) {
        (Ok(loader), _) if !loader.is_viable() => {
            missing(loader, IssueKind::LoaderMissing, "Loader")
        }
        (_, Ok(kernel)) if !kernel.is_viable() => {
            missing(kernel, IssueKind::InstallCorrupt, "Kernel")
        }
        (Err(e), _) | (_, Err(e)) => {
            Check::Inconclusive(format!("Boot files could not be inspected: {e}"))
        }
        (Ok(loader), Ok(kernel)) => Check::Pass(format!(
            "{} and {} present",
            loader.path, kernel.path
        )),
    }
}

/// The logical check.
fn logical(env: &BootEnvironment, facts: &Facts) -> Check {
    let entry = match &facts.bcd_entry {
        Ok(entry) => entry,
        Err(e) => return Check::Inconclusive(format!("BCD entry could not be read: {e}")),
    };
    let expected = OsInstallation::loader_relative(env.expected_loader());
    let Some(path) = &entry.loader_path else {
        return Check::Fail(Issue::new(
            IssueKind::BcdCorruption,
            format!("BCD entry has no loader path, expected {expected}"),
        ));
    };

    let normalized = normalize_path(path);
    let normalized = if normalized.starts_with('\\') {
        normalized
    } else {
        format!("\\{normalized}")
    };

    if normalized.eq_ignore_ascii_case(&expected) {
        Check::Pass(format!("BCD path {path} matches {expected}"))
    } else {
        Check::Fail(Issue::new(
            IssueKind::BcdCorruption,
            format!("BCD path {path} does not match the expected loader {expected}"),
        ))
    }
}

/// The security check.
fn security(install: &OsInstallation, lock_state: LockState) -> Check {
    match lock_state {
        LockState::Unlocked => Check::Pass(format!("{} is not locked", install.drive)),
        LockState::Locked => Check::Fail(Issue::new(
            IssueKind::BitLockerLock,
            format!("{} is locked by BitLocker", install.drive),
        )),
        LockState::Unknown => Check::Inconclusive(format!(
            "Encryption lock state of {} is inconclusive",
            install.drive
        )),
    }
}
