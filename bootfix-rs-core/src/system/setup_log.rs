// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Parses `setuperr.log` files left behind by Windows Setup.
//!
//! Each line looks like this:
//!
//! ```text
//! 2024-03-02 11:20:41, Error      [0x080831] MIG    Failed to apply operation 0x80070005
//! 2024-03-02 11:20:52, Error                 MOUPG  CSetupManager::Execute(245): Result = 0xC1900101
//! ```
//!
//! The fields are: timestamp, level, an optional bracketed message id, the component, and the message. The
//! first `0x` code with eight hex digits in the message is extracted as the result code. Lines that do not
//! fit are continuation lines and are skipped.

use serde::{Deserialize, Serialize};

use crate::{
    model::types::DriveId,
    system::{FetchError, FileSystemProbe},
};

/// Where `setuperr.log` files are found, relative to the root of the installation volume.
pub const SETUP_LOGS: [&str; 3] = [
    "\\$WINDOWS.~BT\\Sources\\Panther\\setuperr.log",
    "\\Windows\\Panther\\setuperr.log",
    "\\Windows\\Panther\\UnattendGC\\setuperr.log",
];

/// The level of a setup log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SetupLogLevel {
    /// Setup could not continue.
    Fatal,

    /// An operation failed.
    Error,

    /// Something looked wrong but setup went on.
    Warning,
}

/// One error out of a setup log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupLogBlocker {
    /// The level of the line.
    pub level: SetupLogLevel,

    /// The setup component that logged the line, such as `MOUPG` or `MIG`.
    pub component: String,

    /// The result code found in the message, if there was one.
    pub code: Option<u32>,

    /// The message, trimmed.
    pub message: String,
}

/// Reads setup logs off an installation volume.
pub struct SetupLogScanner<'a, F: FileSystemProbe> {
    /// The filesystem the logs are read from.
    fs: &'a F,
}

impl<'a, F: FileSystemProbe> SetupLogScanner<'a, F> {
    /// Creates a new [`SetupLogScanner`].
    pub const fn new(fs: &'a F) -> Self {
        Self { fs }
    }

    /// Scans every known setup log on a drive. Logs that do not exist are skipped.
    ///
    /// # Errors
    ///
    /// May return an `Error` if a log exists but could not be read.
    pub fn scan(&self, drive: &DriveId) -> Result<Vec<SetupLogBlocker>, FetchError> {
        let mut blockers = Vec::new();
        for log in SETUP_LOGS {
            let path = drive.join(log);
            if !self.fs.stat(&path)?.exists {
                continue;
            }
            let text = self.fs.read_text(&path)?;
            blockers.extend(parse_setup_log(&text));
        }
        Ok(blockers)
    }
}

/// Parses the contents of a `setuperr.log`.
///
/// Repeated lines with the same component and result code are collapsed into the first one.
#[must_use = "Has no effect if the result is unused"]
pub fn parse_setup_log(text: &str) -> Vec<SetupLogBlocker> {
    let mut blockers: Vec<SetupLogBlocker> = Vec::new();
    for blocker in text.lines().filter_map(parse_line) {
        let duplicate = blockers.iter().any(|x| {
            x.component == blocker.component
                && x.code == blocker.code
                && (x.code.is_some() || x.message == blocker.message)
        });
        if !duplicate {
            blockers.push(blocker);
        }
    }
    blockers
}

/// Parses a single line.
fn parse_line(line: &str) -> Option<SetupLogBlocker> {
    let (_timestamp, rest) = line.split_once(", ")?;
    let rest = rest.trim_start();
    let (level, rest) = rest.split_once(char::is_whitespace)?;
    let level = match &*level.to_ascii_lowercase() {
        "fatal" => SetupLogLevel::Fatal,
        "error" => SetupLogLevel::Error,
        "warning" => SetupLogLevel::Warning,
        _ => return None,
    };

    let mut rest = rest.trim_start();
    if rest.starts_with('[') {
        rest = rest.split_once(']').map_or("", |(_, x)| x).trim_start();
    }

    let (component, message) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if component.is_empty() {
        return None;
    }
    let message = message.trim();

    Some(SetupLogBlocker {
        level,
        component: component.to_owned(),
        code: result_code(message),
        message: message.to_owned(),
    })
}

/// Finds the first eight digit `0x` code in a message.
fn result_code(message: &str) -> Option<u32> {
    message
        .match_indices("0x")
        .chain(message.match_indices("0X"))
        .filter_map(|(i, _)| message.get(i + 2..i + 10))
        .filter(|x| x.chars().all(|c| c.is_ascii_hexdigit()))
        .find_map(|x| u32::from_str_radix(x, 16).ok())
}
