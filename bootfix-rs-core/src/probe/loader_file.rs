// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Checks that the loader file exists and is not empty.

use crate::{
    model::issue::{Issue, IssueKind},
    probe::{Probe, ProbeContext, ProbeError, ProbeId, ProbeResult, fetched},
};

/// The loader file probe.
pub struct LoaderFileProbe;

impl Probe for LoaderFileProbe {
    fn id(&self) -> ProbeId {
        ProbeId::LoaderFile
    }

    fn run(&self, ctx: &ProbeContext<'_>) -> Result<ProbeResult, ProbeError> {
        let loader = fetched(&ctx.facts.loader, "the loader file")?;
        let mut result = ProbeResult::new(self.id());
        result.note(loader.evidence());

        if !loader.exists {
            result.raise(Issue::new(
                IssueKind::LoaderMissing,
                format!("Missing loader file: {}", loader.path),
            ));
        } else if loader.size_bytes == 0 {
            result.raise(Issue::new(
                IssueKind::LoaderMissing,
                format!("Loader file is empty: {}", loader.path),
            ));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::facts::FileFact,
        probe::tests::{healthy, run_probe},
    };

    #[test]
    fn test_missing_and_empty() {
        let (env, install, mut facts) = healthy();
        facts.loader = Ok(FileFact::missing("C:\\Windows\\System32\\winload.efi"));
        let result = run_probe(&LoaderFileProbe, &env, &install, &facts).unwrap();
        assert_eq!(
            result.issues[0].detail,
            "Missing loader file: C:\\Windows\\System32\\winload.efi"
        );

        facts.loader = Ok(FileFact::present("C:\\Windows\\System32\\winload.efi", 0));
        let result = run_probe(&LoaderFileProbe, &env, &install, &facts).unwrap();
        assert!(!result.passed);
        assert_eq!(result.issues[0].kind, IssueKind::LoaderMissing);
    }

    #[test]
    fn test_retried_pass_is_tagged() {
        let (env, install, mut facts) = healthy();
        facts.loader = Ok(FileFact {
            retried: true,
            ..FileFact::present("C:\\Windows\\System32\\winload.efi", 1_572_864)
        });
        let result = run_probe(&LoaderFileProbe, &env, &install, &facts).unwrap();
        assert!(result.passed);
        assert!(result.evidence[0].ends_with("(retried)"));
    }
}
