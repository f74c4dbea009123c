// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The repair-mode gate.
//!
//! The gate classifies the execution environment into a [`RepairMode`] from several independent
//! [`EnvironmentSignals`]. No single signal is ever enough: a constrained recovery context needs at least two
//! recovery signals and no production signal, and a live production OS needs at least two production signals
//! and no recovery signal. Anything in between is inconclusive, and inconclusive always means
//! [`RepairMode::DiagnoseOnly`].
//!
//! The mode derives from what the environment looks like, never from what the caller says it is. The only
//! caller input is the explicit opt-in to [`RepairMode::RepairSafe`] on a live OS.
//!
//! [`authorize`] then decides, per command, what the mode permits.

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub mod authorize;
pub mod policy;

/// How many signals of one kind are needed for a conclusive classification.
const MIN_SIGNALS: u32 = 2;

bitflags! {
    /// Independent observations about the environment the toolkit runs in.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EnvironmentSignals: u16 {
        /// `SystemDrive` is `X:`, the RAM disk of a recovery environment.
        const SYSTEM_DRIVE_X = 1 << 0;

        /// The `MiniNT` control key exists.
        const MININT_KEY = 1 << 1;

        /// `wpeutil.exe` is present in the running system.
        const WINPE_TOOLS = 1 << 2;

        /// `winpeshl.ini` or `startnet.cmd` is present in the running system.
        const WINPE_SHELL = 1 << 3;

        /// The explorer shell is installed in the running system.
        const EXPLORER_SHELL = 1 << 8;

        /// A real user profile is loaded.
        const USER_PROFILE = 1 << 9;

        /// The running system lives on an installed, non-RAM disk drive.
        const INSTALLED_SYSTEM_DRIVE = 1 << 10;

        /// Every signal that points at a constrained recovery context.
        const RECOVERY = Self::SYSTEM_DRIVE_X.bits()
            | Self::MININT_KEY.bits()
            | Self::WINPE_TOOLS.bits()
            | Self::WINPE_SHELL.bits();

        /// Every signal that points at a live production OS.
        const PRODUCTION = Self::EXPLORER_SHELL.bits()
            | Self::USER_PROFILE.bits()
            | Self::INSTALLED_SYSTEM_DRIVE.bits();
    }
}

impl EnvironmentSignals {
    /// Returns how many recovery signals are set.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn recovery_count(self) -> u32 {
        self.intersection(Self::RECOVERY).bits().count_ones()
    }

    /// Returns how many production signals are set.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn production_count(self) -> u32 {
        self.intersection(Self::PRODUCTION).bits().count_ones()
    }
}

/// The kind of environment the signals describe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentKind {
    /// A constrained pre-boot recovery environment.
    Recovery,

    /// A live, installed, production OS.
    Production,

    /// The signals disagree or are too few.
    Inconclusive,
}

impl EnvironmentKind {
    /// Classifies a set of signals.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn of(signals: EnvironmentSignals) -> Self {
        let recovery = signals.recovery_count();
        let production = signals.production_count();
        if recovery >= MIN_SIGNALS && production == 0 {
            Self::Recovery
        } else if production >= MIN_SIGNALS && recovery == 0 {
            Self::Production
        } else {
            Self::Inconclusive
        }
    }
}

/// The safety state of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RepairMode {
    /// No writes at all.
    #[default]
    DiagnoseOnly,

    /// Reversible writes only.
    RepairSafe,

    /// All writes, including partition formats and BCD rewrites.
    RepairForce,
}

impl RepairMode {
    /// Convert a [`RepairMode`] into an [`&str`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiagnoseOnly => "DIAGNOSE_ONLY",
            Self::RepairSafe => "REPAIR_SAFE",
            Self::RepairForce => "REPAIR_FORCE",
        }
    }
}

impl fmt::Display for RepairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies the environment into a [`RepairMode`].
///
/// `allow_repair_safe` is the explicit opt-in to [`RepairMode::RepairSafe`], and only has an effect on a
/// conclusively classified production OS.
#[must_use = "Has no effect if the result is unused"]
pub const fn classify(signals: EnvironmentSignals, allow_repair_safe: bool) -> RepairMode {
    match EnvironmentKind::of(signals) {
        EnvironmentKind::Recovery => RepairMode::RepairForce,
        EnvironmentKind::Production if allow_repair_safe => RepairMode::RepairSafe,
        EnvironmentKind::Production | EnvironmentKind::Inconclusive => RepairMode::DiagnoseOnly,
    }
}
