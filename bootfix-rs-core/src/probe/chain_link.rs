// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Checks the full Firmware → `BootManager` → BCD → Loader → Kernel sequence.

use crate::{
    model::{
        chain::{BootChain, ChainHop},
        issue::{Issue, IssueKind},
    },
    probe::{Probe, ProbeContext, ProbeError, ProbeId, ProbeResult, fetched},
};

/// The boot chain probe.
pub struct ChainLinkProbe;

impl Probe for ChainLinkProbe {
    fn id(&self) -> ProbeId {
        ProbeId::ChainLink
    }

    fn run(&self, ctx: &ProbeContext<'_>) -> Result<ProbeResult, ProbeError> {
        let facts = ctx.facts;
        fetched(&facts.boot_manager, "the boot manager")?;
        fetched(&facts.bcd_file, "the BCD store")?;
        fetched(&facts.loader, "the loader file")?;
        fetched(&facts.kernel, "the kernel")?;

        let chain = BootChain::assemble(ctx.env, facts);
        let mut result = ProbeResult::new(self.id());

        for link in chain.links() {
            let state = if link.present { "present" } else { "missing" };
            match &link.evidence_path {
                Some(path) => result.note(format!("{}: {state} ({path})", link.name)),
                None => result.note(format!("{}: {state}", link.name)),
            }
        }

        if let Some(link) = chain.first_break() {
            let (kind, detail) = match link.name {
                ChainHop::Firmware => (
                    IssueKind::ProbeFailure,
                    "Firmware type could not be determined".to_owned(),
                ),
                ChainHop::BootManager => (IssueKind::EspMissing, "Boot chain broken at the boot manager".to_owned()),
                ChainHop::Bcd => (IssueKind::BcdCorruption, "Boot chain broken at the BCD store".to_owned()),
                ChainHop::Loader => (IssueKind::LoaderMissing, "Boot chain broken at the loader".to_owned()),
                ChainHop::Kernel => (IssueKind::InstallCorrupt, "Boot chain broken at the kernel".to_owned()),
            };
            result.raise(Issue::new(kind, detail));
        }

        if let Some(bcd) = chain.link(ChainHop::Bcd)
            && bcd.present
        {
            if !bcd.readable {
                result.raise(Issue::new(IssueKind::BcdCorruption, "BCD store is not readable"));
            } else if let Err(e) = &facts.bcd_entry {
                result.raise(Issue::new(
                    IssueKind::BcdCorruption,
                    format!("BCD store is not readable: {e}"),
                ));
            }
        }

        Ok(result)
    }
}
