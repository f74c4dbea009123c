// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`DiagError`], which encapsulates other errors

use thiserror::Error;

/// An `Error` resulting from the program.
#[derive(Error, Debug)]
pub enum DiagError {
    /// No usable Windows installation could be selected. This is terminal for a diagnosis run.
    #[error("Configuration Error: {0}")]
    Configuration(#[from] crate::discovery::ConfigurationError),

    /// A command was refused by the authorization filter.
    #[error("Authorization Denied: {0}")]
    AuthorizationDenied(crate::gate::authorize::DenyRule),

    /// An external command could not be run.
    #[error("Command Error: {0}")]
    Exec(#[from] crate::system::ExecError),

    /// An error occurred while fetching a fact from the environment.
    #[error("Fetch Error: {0}")]
    Fetch(#[from] crate::system::FetchError),

    /// An offline registry hive could not be read.
    #[error("Hive Error: {0}")]
    Hive(#[from] crate::system::HiveError),

    /// The configuration file could not be read.
    #[error("Config Error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A survey snapshot could not be encoded or decoded.
    #[error("Snapshot Error: {0}")]
    Snapshot(#[from] postcard::Error),

    /// An I/O error outside of any collaborator.
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}
