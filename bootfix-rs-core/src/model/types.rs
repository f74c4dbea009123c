// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! `newtype` definitions shared by the model.
//!
//! At the moment, this includes the following type definitions:
//! - [`DriveId`] (constructor enforces a single drive letter followed by a colon, and will uppercase)

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that may happen from invalid inputs to the respective constructors.
#[derive(Error, Debug)]
pub enum TypeError {
    /// The drive identifier was invalid.
    #[error("\"{0}\" is not a valid drive")]
    Drive(String),
}

/// A newtype wrapper around a valid drive identifier, such as `C:`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DriveId(String);

impl DriveId {
    /// Creates a new [`DriveId`].
    ///
    /// Accepts `C`, `c:`, `C:\` and `C:/`, and always stores the form `C:`.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the input is not a single ASCII letter, optionally followed by a colon and
    /// a path separator.
    pub fn new(drive: &str) -> Result<Self, TypeError> {
        let trimmed = drive
            .trim()
            .trim_end_matches(['\\', '/'])
            .trim_end_matches(':');
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => {
                Ok(Self(format!("{}:", letter.to_ascii_uppercase())))
            }
            _ => Err(TypeError::Drive(drive.to_owned())),
        }
    }

    /// Joins a drive-relative path onto this drive.
    ///
    /// Forward slashes are replaced with backslashes and a leading separator is added if missing.
    #[must_use = "Has no effect if the result is unused"]
    pub fn join(&self, path: &str) -> String {
        let path = normalize_path(path);
        if path.starts_with('\\') {
            format!("{}{path}", self.0)
        } else {
            format!("{}\\{path}", self.0)
        }
    }
}

impl Deref for DriveId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl core::fmt::Display for DriveId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a Windows path by replacing forward slashes with backslashes.
#[must_use = "Has no effect if the result is unused"]
pub fn normalize_path(path: &str) -> String {
    path.trim().replace('/', "\\")
}

/// Returns the final component of a Windows path.
#[must_use = "Has no effect if the result is unused"]
pub fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}
