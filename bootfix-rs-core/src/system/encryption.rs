// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! An [`EncryptionStatusProbe`] backed by `manage-bde`.
//!
//! `manage-bde` can take a long time to answer on some machines, so it always runs with a time bound. A
//! timeout, a missing tool, or output that cannot be understood all map to [`LockState::Unknown`]: an
//! inconclusive answer lowers the confidence of the verdict but never fails the run.

use std::time::Duration;

use log::warn;

use crate::{
    model::{facts::LockState, types::DriveId},
    system::{CommandDescriptor, CommandExecutor, EncryptionStatusProbe, command::run_for_stdout},
};

/// [`EncryptionStatusProbe`] that shells out to `manage-bde -status`.
pub struct ManageBde<'a, X: CommandExecutor> {
    /// The executor used to run `manage-bde`.
    executor: &'a X,
}

impl<'a, X: CommandExecutor> ManageBde<'a, X> {
    /// Creates a new [`ManageBde`].
    pub const fn new(executor: &'a X) -> Self {
        Self { executor }
    }
}

impl<X: CommandExecutor> EncryptionStatusProbe for ManageBde<'_, X> {
    fn lock_state(&self, volume: &DriveId, timeout: Duration) -> LockState {
        let command =
            CommandDescriptor::new("manage-bde", ["-status", volume.as_str()]).timeout(timeout);
        match run_for_stdout(self.executor, &command) {
            Ok((true, text)) => parse_lock_state(&text),
            Ok((false, text)) => {
                warn!("manage-bde failed for {volume}: {}", text.trim());
                LockState::Unknown
            }
            Err(e) => {
                warn!("Encryption status of {volume} is inconclusive: {e}");
                LockState::Unknown
            }
        }
    }
}

/// Parses the lock state out of `manage-bde -status` output.
///
/// The `Lock Status` line is authoritative. Without one, a fully decrypted volume is reported as unlocked
/// and anything else is unknown.
#[must_use = "Has no effect if the result is unused"]
pub fn parse_lock_state(text: &str) -> LockState {
    let mut decrypted = false;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        match &*key {
            "lock status" if value == "locked" => return LockState::Locked,
            "lock status" if value == "unlocked" => return LockState::Unlocked,
            "conversion status" if value == "fully decrypted" => decrypted = true,
            _ => (),
        }
    }
    if decrypted {
        LockState::Unlocked
    } else {
        LockState::Unknown
    }
}
