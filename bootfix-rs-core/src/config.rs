// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`DoctorConfig`], the configuration file for the toolkit.
//!
//! This parses space separated key value pairs, the format of which is defined in the [`DoctorConfig`] struct.
//! Unknown keys are ignored, and values that do not parse keep their defaults with a warning.
//!
//! Example configuration:
//!
//! ```text
//! # Diagnose this installation instead of the running one
//! target D:
//!
//! # Give up on encryption lock queries after this many milliseconds
//! encryption_timeout 5000
//!
//! # Re-check missing boot files this many times, this many milliseconds apart
//! recheck_attempts 2
//! recheck_backoff 250
//!
//! # Allow reversible repairs on a live OS
//! allow_repair_safe false
//!
//! # Operation categories that count as reversible
//! reversible bcd_set_value registry_edit driver_injection
//!
//! # Mirror the log into a file
//! log_file X:\bootfix.log
//! ```

use std::{io, path::Path, time::Duration};

use log::warn;
use thiserror::Error;

use crate::{gate::policy::RepairPolicy, model::types::DriveId, system::fs::decode_text};

/// Errors that may result from loading a [`DoctorConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Could not read config \"{path}\": {source}")]
    Read {
        /// The path of the configuration file.
        path: String,

        /// The underlying error.
        source: io::Error,
    },
}

/// The configuration file for the toolkit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoctorConfig {
    /// The installation to diagnose, if not the running one.
    pub target: Option<DriveId>,

    /// The time bound of encryption lock queries.
    pub encryption_timeout: Duration,

    /// How many extra times a missing loader or kernel is re-checked.
    pub recheck_attempts: u32,

    /// The fixed delay between re-checks.
    pub recheck_backoff: Duration,

    /// Allows `REPAIR_SAFE` on a live production OS.
    pub allow_repair_safe: bool,

    /// Which destructive operations count as reversible.
    pub policy: RepairPolicy,

    /// Mirrors the log into this file, if set.
    pub log_file: Option<String>,
}

impl DoctorConfig {
    /// Loads a [`DoctorConfig`] from a file. A file that does not exist yields the defaults.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the file exists but could not be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) => Ok(Self::parse(&decode_text(&bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Parses the contents of a [`DoctorConfig`] format string.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let value = value.trim();
            match &*key.to_ascii_lowercase() {
                "target" => match DriveId::new(value) {
                    Ok(drive) => config.target = Some(drive),
                    Err(e) => warn!("Ignoring target: {e}"),
                },
                "encryption_timeout" => {
                    if let Some(value) = parse_value::<u64>(key, value) {
                        config.encryption_timeout = Duration::from_millis(value);
                    }
                }
                "recheck_attempts" => {
                    if let Some(value) = parse_value(key, value) {
                        config.recheck_attempts = value;
                    }
                }
                "recheck_backoff" => {
                    if let Some(value) = parse_value::<u64>(key, value) {
                        config.recheck_backoff = Duration::from_millis(value);
                    }
                }
                "allow_repair_safe" => {
                    if let Some(value) = parse_value(key, value) {
                        config.allow_repair_safe = value;
                    }
                }
                "reversible" => config.policy = RepairPolicy::parse(value),
                "log_file" if !value.is_empty() => config.log_file = Some(value.to_owned()),
                _ => (),
            }
        }

        config
    }
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            target: None,
            encryption_timeout: Duration::from_millis(5000),
            recheck_attempts: 2,
            recheck_backoff: Duration::from_millis(250),
            allow_repair_safe: false,
            policy: RepairPolicy::default(),
            log_file: None,
        }
    }
}

/// Parses a value, warning if it does not parse.
fn parse_value<T: core::str::FromStr>(key: &str, value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        warn!("Ignoring {key}: \"{value}\" is not a valid value");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::gate::policy::Operation;

    #[test]
    fn test_parse() {
        let config = DoctorConfig::parse(
            "# comment\n\
             target d:\n\
             ENCRYPTION_TIMEOUT 1500\n\
             recheck_attempts 0\n\
             allow_repair_safe true\n\
             reversible bcd_set_value boot_file_write\n\
             log_file X:\\bootfix.log\n\
             unknown_key 12\n",
        );
        assert_eq!(config.target.as_deref().map(String::as_str), Some("D:"));
        assert_eq!(config.encryption_timeout, Duration::from_millis(1500));
        assert_eq!(config.recheck_attempts, 0);
        assert_eq!(config.recheck_backoff, Duration::from_millis(250));
        assert!(config.allow_repair_safe);
        assert!(config.policy.is_reversible(Operation::BootFileWrite));
        assert!(!config.policy.is_reversible(Operation::RegistryEdit));
        assert_eq!(config.log_file.as_deref(), Some("X:\\bootfix.log"));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = DoctorConfig::parse("encryption_timeout soon\nallow_repair_safe yes\ntarget\n");
        assert_eq!(config, DoctorConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let config = DoctorConfig::load("this/config/does/not/exist.conf").unwrap();
        assert_eq!(config, DoctorConfig::default());
    }

    proptest! {
        #[test]
        fn doesnt_panic(x in "\\PC*") {
            let _ = DoctorConfig::parse(&x);
        }
    }
}
