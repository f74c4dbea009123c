// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The boot-chain probes.
//!
//! A probe is a deterministic, read-only check over facts that were already fetched. It never touches the
//! disk, the registry or the boot store itself. The fixed set of probes, in the order they run, is:
//!
//! 1. [`boot_files::BootFilesProbe`]: the boot manager and BCD store exist on the system partition.
//! 2. [`bcd_reality::BcdRealityProbe`]: the BCD devices resolve to a partition holding a Windows install.
//! 3. [`loader_file::LoaderFileProbe`]: the loader file exists and is not empty.
//! 4. [`driver::DriverProbe`]: a boot-critical storage driver is registered for boot start.
//! 5. [`chain_link::ChainLinkProbe`]: the whole boot chain is present and the BCD is readable.
//!
//! A probe whose inspection cannot run returns a [`ProbeError`] instead of a result. This is kept apart from
//! an inspection that ran and found something wrong, which is a [`ProbeResult`] with `passed` unset.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    environment::BootEnvironment,
    facts::{Facts, Fetched},
    install::OsInstallation,
    issue::Issue,
};

pub mod bcd_reality;
pub mod boot_files;
pub mod chain_link;
pub mod driver;
pub mod loader_file;

/// The identifier of a probe. The ordering is the order probes run and are reported in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProbeId {
    /// [`boot_files::BootFilesProbe`].
    BootFiles,

    /// [`bcd_reality::BcdRealityProbe`].
    BcdReality,

    /// [`loader_file::LoaderFileProbe`].
    LoaderFile,

    /// [`driver::DriverProbe`].
    Driver,

    /// [`chain_link::ChainLinkProbe`].
    ChainLink,
}

impl ProbeId {
    /// Every probe, in order.
    pub const ALL: [Self; 5] = [
        Self::BootFiles,
        Self::BcdReality,
        Self::LoaderFile,
        Self::Driver,
        Self::ChainLink,
    ];

    /// Convert a [`ProbeId`] into an [`&str`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BootFiles => "BootFilesProbe",
            Self::BcdReality => "BCDRealityProbe",
            Self::LoaderFile => "LoaderFileProbe",
            Self::Driver => "DriverProbe",
            Self::ChainLink => "ChainLinkProbe",
        }
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `Error` meaning that a probe could not run its inspection at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// A fact the probe needs could not be fetched.
    #[error("Could not inspect {what}: {reason}")]
    Execution {
        /// What the probe tried to inspect.
        what: &'static str,

        /// Why it could not be inspected.
        reason: String,
    },
}

/// What a probe found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// The probe that produced this result.
    pub probe_id: ProbeId,

    /// If the probe found nothing wrong.
    pub passed: bool,

    /// One line per thing that was looked at.
    pub evidence: Vec<String>,

    /// Everything that was found wrong.
    pub issues: Vec<Issue>,
}

impl ProbeResult {
    /// Creates a new passing [`ProbeResult`] with no evidence yet.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new(probe_id: ProbeId) -> Self {
        Self {
            probe_id,
            passed: true,
            evidence: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Creates a failed [`ProbeResult`] with a single issue.
    #[must_use = "Has no effect if the result is unused"]
    pub fn failed(probe_id: ProbeId, issue: Issue) -> Self {
        let mut result = Self::new(probe_id);
        result.raise(issue);
        result
    }

    /// Records a line of evidence.
    pub fn note(&mut self, evidence: impl Into<String>) {
        self.evidence.push(evidence.into());
    }

    /// Records an issue, which fails the probe.
    pub fn raise(&mut self, issue: Issue) {
        self.passed = false;
        self.issues.push(issue);
    }
}

/// Everything a probe may look at.
#[derive(Clone, Copy, Debug)]
pub struct ProbeContext<'a> {
    /// The firmware and disk side of the machine.
    pub env: &'a BootEnvironment,

    /// The installation under diagnosis.
    pub install: &'a OsInstallation,

    /// Every installation that was discovered, including the one under diagnosis.
    pub installs: &'a [OsInstallation],

    /// The facts fetched for the installation under diagnosis.
    pub facts: &'a Facts,
}

/// A boot-chain probe.
pub trait Probe {
    /// Returns the identifier of the probe.
    fn id(&self) -> ProbeId;

    /// Runs the probe.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the inspection could not run, as opposed to having found something wrong.
    fn run(&self, ctx: &ProbeContext<'_>) -> Result<ProbeResult, ProbeError>;
}

/// Returns the fixed set of probes, in order.
#[must_use = "Has no effect if the result is unused"]
pub fn standard_probes() -> [&'static dyn Probe; 5] {
    [
        &boot_files::BootFilesProbe,
        &bcd_reality::BcdRealityProbe,
        &loader_file::LoaderFileProbe,
        &driver::DriverProbe,
        &chain_link::ChainLinkProbe,
    ]
}

/// Borrows a fetched fact, or returns the reason it could not be fetched as a [`ProbeError`].
///
/// # Errors
///
/// May return an `Error` if the fact could not be fetched.
pub(crate) fn fetched<'a, T>(fact: &'a Fetched<T>, what: &'static str) -> Result<&'a T, ProbeError> {
    fact.as_ref().map_err(|e| ProbeError::Execution {
        what,
        reason: e.to_string(),
    })
}
