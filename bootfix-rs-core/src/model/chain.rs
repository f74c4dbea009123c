// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`BootChain`], the ordered dependency sequence a Windows boot walks through.
//!
//! Each hop is a [`ChainLink`]. A chain is broken as soon as one required link is missing, no matter what
//! comes after it.

use core::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::{
    environment::{BootEnvironment, FirmwareType},
    facts::{Facts, FileFact},
};

/// One hop of the boot chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainHop {
    /// The firmware interface.
    Firmware,

    /// `bootmgfw.efi` or `bootmgr`.
    BootManager,

    /// The BCD store.
    Bcd,

    /// `winload.efi` or `winload.exe`.
    Loader,

    /// `ntoskrnl.exe`.
    Kernel,
}

impl ChainHop {
    /// Convert a [`ChainHop`] into an [`&str`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Firmware => "Firmware",
            Self::BootManager => "BootManager",
            Self::Bcd => "BCD",
            Self::Loader => "Loader",
            Self::Kernel => "Kernel",
        }
    }
}

impl fmt::Display for ChainHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hop of the boot chain and what was found for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// The hop this link represents.
    pub name: ChainHop,

    /// If the boot cannot proceed without this link.
    pub required: bool,

    /// If the link was found.
    pub present: bool,

    /// If the link could be read.
    pub readable: bool,

    /// The path that was inspected for this link, if there is one.
    pub evidence_path: Option<String>,
}

impl ChainLink {
    /// Builds a link from a fetched file fact. A fact that could not be fetched counts as not present.
    fn from_file(name: ChainHop, fact: Option<&FileFact>) -> Self {
        Self {
            name,
            required: true,
            present: fact.is_some_and(FileFact::is_viable),
            readable: fact.is_some_and(|x| x.readable),
            evidence_path: fact.map(|x| x.path.clone()),
        }
    }

    /// Checks if this link breaks the chain.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn is_break(&self) -> bool {
        self.required && !self.present
    }
}

/// The Firmware → `BootManager` → BCD → Loader → Kernel sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootChain {
    /// The links, in boot order.
    links: SmallVec<[ChainLink; 5]>,
}

impl BootChain {
    /// Assembles the chain from the environment and the fetched facts.
    #[must_use = "Has no effect if the result is unused"]
    pub fn assemble(env: &BootEnvironment, facts: &Facts) -> Self {
        let firmware = ChainLink {
            name: ChainHop::Firmware,
            required: true,
            present: env.firmware != FirmwareType::Unknown,
            readable: env.firmware != FirmwareType::Unknown,
            evidence_path: None,
        };

        let links = [
            firmware,
            ChainLink::from_file(ChainHop::BootManager, facts.boot_manager.as_ref().ok()),
            ChainLink::from_file(ChainHop::Bcd, facts.bcd_file.as_ref().ok()),
            ChainLink::from_file(ChainHop::Loader, facts.loader.as_ref().ok()),
            ChainLink::from_file(ChainHop::Kernel, facts.kernel.as_ref().ok()),
        ];

        Self {
            links: links.into_iter().collect(),
        }
    }

    /// Returns the links in boot order.
    #[must_use = "Has no effect if the result is unused"]
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Returns a link by hop.
    #[must_use = "Has no effect if the result is unused"]
    pub fn link(&self, hop: ChainHop) -> Option<&ChainLink> {
        self.links.iter().find(|x| x.name == hop)
    }

    /// Checks if any required link is missing.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_broken(&self) -> bool {
        self.links.iter().any(ChainLink::is_break)
    }

    /// Returns the first link, in boot order, that breaks the chain.
    #[must_use = "Has no effect if the result is unused"]
    pub fn first_break(&self) -> Option<&ChainLink> {
        self.links.iter().find(|x| x.is_break())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::facts::{FetchFailure, LockState};

    fn facts() -> Facts {
        Facts {
            boot_manager: Ok(FileFact::present("S:\\EFI\\Microsoft\\Boot\\bootmgfw.efi", 1024)),
            bcd_file: Ok(FileFact::present("S:\\EFI\\Microsoft\\Boot\\BCD", 32768)),
            bcd_entry: Err(FetchFailure("not read".to_owned())),
            loader: Ok(FileFact::present("C:\\Windows\\System32\\winload.efi", 1024)),
            kernel: Ok(FileFact::present("C:\\Windows\\System32\\ntoskrnl.exe", 1024)),
            drivers: Ok(Vec::new()),
            lock_state: LockState::Unlocked,
            partitions: Vec::new(),
        }
    }

    #[test]
    fn test_intact_chain() {
        let env = BootEnvironment {
            firmware: FirmwareType::Uefi,
            ..BootEnvironment::default()
        };
        let chain = BootChain::assemble(&env, &facts());
        assert!(!chain.is_broken());
        assert_eq!(chain.links().len(), 5);
    }

    #[test]
    fn test_missing_link_breaks_chain() {
        let env = BootEnvironment {
            firmware: FirmwareType::Uefi,
            ..BootEnvironment::default()
        };
        let mut facts = facts();
        facts.loader = Ok(FileFact::missing("C:\\Windows\\System32\\winload.efi"));
        let chain = BootChain::assemble(&env, &facts);
        assert!(chain.is_broken());
        assert_eq!(
            chain.first_break().map(|x| x.name),
            Some(ChainHop::Loader)
        );
    }

    #[test]
    fn test_unknown_firmware_breaks_first() {
        let mut facts = facts();
        facts.kernel = Err(FetchFailure("access denied".to_owned()));
        let chain = BootChain::assemble(&BootEnvironment::default(), &facts);
        assert_eq!(
            chain.first_break().map(|x| x.name),
            Some(ChainHop::Firmware)
        );
    }
}
