// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`Doctor`], a struct which abstracts a whole diagnosis run over an [`Environment`].

use std::cell::OnceCell;

use log::{info, warn};

use crate::{
    DiagResult,
    config::DoctorConfig,
    discovery::{self, ConfigurationError, Survey},
    error::DiagError,
    evidence::{self, EvidenceSet},
    gate::{
        RepairMode,
        authorize::{self, Authorization, CommandRequest},
        classify,
    },
    model::types::DriveId,
    probe::{ProbeContext, standard_probes},
    rank::{self, OtherReports, RankedBlocker},
    system::{CommandDescriptor, CommandOutput, Environment},
    verdict::{self, CriticalChecks, Verdict},
};

/// The outcome of a diagnosis run.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnosis {
    /// Everything discovered about the machine.
    pub survey: Survey,

    /// The result of every probe.
    pub evidence: EvidenceSet,

    /// The boot verdict.
    pub verdict: Verdict,
}

impl Diagnosis {
    /// Ranks the blockers of this diagnosis.
    #[must_use = "Has no effect if the result is unused"]
    pub fn blockers(&self) -> Vec<RankedBlocker> {
        rank::rank_blockers(&self.verdict, &self.survey.reports)
    }
}

/// Diagnoses a survey. This never touches the machine, so a captured survey can be replayed anywhere.
///
/// # Errors
///
/// May return an `Error` if the survey does not select an installation.
pub fn diagnose(survey: Survey) -> DiagResult<Diagnosis> {
    let install = survey.install().ok_or(ConfigurationError::NoInstallation)?;
    let ctx = ProbeContext {
        env: &survey.environment,
        install,
        installs: &survey.installs,
        facts: &survey.facts,
    };

    let evidence = evidence::run(&standard_probes(), &ctx);
    let checks = CriticalChecks::assess(&survey.environment, install, &survey.facts);
    let verdict = verdict::evaluate(&evidence, checks, survey.installs.len());
    info!(
        "Verdict for {}: {} with {} confidence ({})",
        install.drive,
        verdict.as_str(),
        verdict.confidence_level,
        verdict.confidence_score
    );

    Ok(Diagnosis {
        survey,
        evidence,
        verdict,
    })
}

/// The diagnosis and repair gate of a single run.
///
/// The [`RepairMode`] is classified the first time it is needed and held for the lifetime of the [`Doctor`].
/// A new run should create a new [`Doctor`].
pub struct Doctor<E: Environment> {
    /// The machine.
    env: E,

    /// The configuration of the run.
    pub config: DoctorConfig,

    /// The repair mode, once classified.
    mode: OnceCell<RepairMode>,
}

impl<E: Environment> Doctor<E> {
    /// Creates a new [`Doctor`].
    pub const fn new(env: E, config: DoctorConfig) -> Self {
        Self {
            env,
            config,
            mode: OnceCell::new(),
        }
    }

    /// Returns a reference to the environment.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn environment(&self) -> &E {
        &self.env
    }

    /// Surveys the machine and diagnoses it.
    ///
    /// `target` overrides the target of the configuration.
    ///
    /// # Errors
    ///
    /// May return an `Error` if no installation could be found, or the target holds none.
    pub fn run_diagnosis(&self, target: Option<&DriveId>) -> DiagResult<Diagnosis> {
        let survey = discovery::survey(&self.env, &self.config, target)?;
        diagnose(survey)
    }

    /// Ranks the blockers of a verdict together with the other reports.
    #[must_use = "Has no effect if the result is unused"]
    pub fn rank_blockers(&self, verdict: &Verdict, reports: &OtherReports) -> Vec<RankedBlocker> {
        rank::rank_blockers(verdict, reports)
    }

    /// Classifies the execution environment into a [`RepairMode`]. Only the first call inspects the
    /// environment.
    pub fn classify_environment(&self) -> RepairMode {
        *self.mode.get_or_init(|| {
            let signals = self.env.signals();
            let mode = classify(signals, self.config.allow_repair_safe);
            info!(
                "Repair mode {mode} ({} recovery, {} production signals)",
                signals.recovery_count(),
                signals.production_count()
            );
            mode
        })
    }

    /// Decides if a command may run in the mode of this run.
    #[must_use = "Has no effect if the result is unused"]
    pub fn authorize(&self, request: &CommandRequest) -> Authorization {
        authorize::authorize(request, self.classify_environment(), &self.config.policy)
    }

    /// Runs a command if it is authorized. A denied command is never retried.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the command was denied, could not be started, or ran past its time bound.
    pub fn execute(
        &self,
        request: &CommandRequest,
        command: &CommandDescriptor,
    ) -> DiagResult<CommandOutput> {
        match self.authorize(request) {
            Authorization::Deny(rule) => {
                warn!("{rule}");
                Err(DiagError::AuthorizationDenied(rule))
            }
            Authorization::Allow(_) => {
                info!("Running {}", request.command_text);
                Ok(self.env.execute(command)?)
            }
        }
    }
}
