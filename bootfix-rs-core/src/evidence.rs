// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The evidence aggregator.
//!
//! [`run`] executes every probe and collects the results into an [`EvidenceSet`]. A probe that returns an
//! `Error`, or even panics, is turned into a failed result for that probe alone. The rest of the run goes on.

use std::{
    collections::BTreeMap,
    panic::{AssertUnwindSafe, catch_unwind},
};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{
    model::issue::{Issue, IssueKind},
    probe::{Probe, ProbeContext, ProbeId, ProbeResult},
};

/// The results of every probe, ordered by [`ProbeId`]. Immutable once produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSet {
    /// The results by probe.
    results: BTreeMap<ProbeId, ProbeResult>,
}

impl EvidenceSet {
    /// Returns the result of a probe, if it ran.
    #[must_use = "Has no effect if the result is unused"]
    pub fn get(&self, id: ProbeId) -> Option<&ProbeResult> {
        self.results.get(&id)
    }

    /// Checks if a probe ran and passed.
    #[must_use = "Has no effect if the result is unused"]
    pub fn passed(&self, id: ProbeId) -> bool {
        self.get(id).is_some_and(|x| x.passed)
    }

    /// Checks if a probe ran and failed.
    #[must_use = "Has no effect if the result is unused"]
    pub fn failed(&self, id: ProbeId) -> bool {
        self.get(id).is_some_and(|x| !x.passed)
    }

    /// Returns every result in order.
    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.values()
    }

    /// Returns how many probes ran.
    #[must_use = "Has no effect if the result is unused"]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Checks if no probe ran.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns how many probes passed.
    #[must_use = "Has no effect if the result is unused"]
    pub fn passed_count(&self) -> usize {
        self.iter().filter(|x| x.passed).count()
    }

    /// Returns the issues of every failed probe, in probe order.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.iter().filter(|x| !x.passed).flat_map(|x| &x.issues)
    }
}

impl FromIterator<ProbeResult> for EvidenceSet {
    /// Collects results. When two results share a probe, the later one wins.
    fn from_iter<T: IntoIterator<Item = ProbeResult>>(iter: T) -> Self {
        Self {
            results: iter.into_iter().map(|x| (x.probe_id, x)).collect(),
        }
    }
}

/// Runs every probe in order and aggregates the results.
#[must_use = "Has no effect if the result is unused"]
pub fn run(probes: &[&dyn Probe], ctx: &ProbeContext<'_>) -> EvidenceSet {
    probes.iter().map(|probe| run_isolated(*probe, ctx)).collect()
}

/// Runs a single probe, converting any failure into a failed result for that probe.
fn run_isolated(probe: &dyn Probe, ctx: &ProbeContext<'_>) -> ProbeResult {
    let id = probe.id();
    match catch_unwind(AssertUnwindSafe(|| probe.run(ctx))) {
        Ok(Ok(mut result)) => {
            result.probe_id = id;
            debug!("{id}: passed={} {:?}", result.passed, result.evidence);
            result
        }
        Ok(Err(e)) => {
            error!("{id} could not run: {e}");
            ProbeResult::failed(id, Issue::new(IssueKind::ProbeFailure, format!("{id} could not run: {e}")))
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|x| (*x).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            error!("{id} panicked: {reason}");
            ProbeResult::failed(id, Issue::new(IssueKind::ProbeFailure, format!("{id} panicked: {reason}")))
        }
    }
}
