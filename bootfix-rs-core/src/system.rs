// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The collaborator layer between the diagnosis core and the machine.
//!
//! The core only ever sees the traits in this module. Everything that reads a disk, a hive, a boot store or
//! the output of an external tool is implemented here, and raw tool text never leaves this layer: the parsers
//! in [`bcdedit`], [`encryption`], [`partitions`] and [`setup_log`] hand typed values back to the core.
//!
//! [`host::HostEnvironment`] composes the host implementations into a single [`Environment`].

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    gate::EnvironmentSignals,
    model::{
        environment::{FirmwareType, PartitionInfo, SecureBootState},
        facts::{BcdEntry, LockState},
        types::DriveId,
    },
};

pub mod bcdedit;
pub mod command;
pub mod encryption;
pub mod fs;
pub mod hive;
pub mod host;
pub mod log_backend;
pub mod partitions;
pub mod setup_log;
pub mod signals;

/// An error that may result from fetching a fact.
#[derive(Error, Debug)]
pub enum FetchError {
    /// A path could not be inspected.
    #[error("Could not inspect \"{path}\": {source}")]
    Io {
        /// The path that was inspected.
        path: String,

        /// The underlying error.
        source: std::io::Error,
    },

    /// The boot store could not be read.
    #[error("Boot store \"{store}\" could not be read: {reason}")]
    BootStore {
        /// The path of the store.
        store: String,

        /// What the reader reported.
        reason: String,
    },

    /// A tool-backed query reported a failure.
    #[error("Could not query the {what}: {reason}")]
    Query {
        /// What was queried.
        what: &'static str,

        /// What the tool reported.
        reason: String,
    },

    /// The output of a tool could not be understood.
    #[error("Parse Error: {0}")]
    Parse(#[from] bcdedit::BcdParseError),

    /// The tool backing the fact could not be run.
    #[error("Command Error: {0}")]
    Exec(#[from] ExecError),
}

/// An error that may result from reading an offline registry hive.
#[derive(Error, Debug)]
pub enum HiveError {
    /// The hive file or the key does not exist.
    #[error("\"{0}\" not found")]
    NotFound(String),

    /// The hive file could not be opened.
    #[error("Access to \"{0}\" denied")]
    AccessDenied(String),

    /// The hive file is not a valid hive.
    #[error("Hive \"{0}\" is corrupt")]
    Corrupt(String),

    /// Hive support was not compiled in.
    #[error("Hive support is disabled")]
    Unsupported,
}

/// An error that may result from running an external command.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The command could not be started.
    #[error("Could not start \"{program}\": {source}")]
    Spawn {
        /// The program that was started.
        program: String,

        /// The underlying error.
        source: std::io::Error,
    },

    /// The command was killed after running past its time bound.
    #[error("\"{program}\" timed out after {timeout_ms}ms")]
    Timeout {
        /// The program that was started.
        program: String,

        /// The time bound in milliseconds.
        timeout_ms: u128,
    },
}

/// The result of inspecting a single path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileStat {
    /// If the path exists.
    pub exists: bool,

    /// The size of the file in bytes.
    pub size_bytes: u64,

    /// If the file could be opened for reading.
    pub readable: bool,
}

/// A single registry value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegValue {
    /// `REG_DWORD`.
    Dword(u32),

    /// `REG_QWORD`.
    Qword(u64),

    /// `REG_SZ` or `REG_EXPAND_SZ`.
    String(String),

    /// `REG_MULTI_SZ`.
    MultiString(Vec<String>),

    /// Any other type, which the core never needs to decode.
    Other,
}

impl RegValue {
    /// Returns the value as a `u32` if it is a `REG_DWORD`.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_dword(&self) -> Option<u32> {
        match self {
            Self::Dword(x) => Some(*x),
            _ => None,
        }
    }
}

/// The values of a registry key, by value name.
pub type KeyValues = BTreeMap<String, RegValue>;

/// A command to run through a [`CommandExecutor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// The program to run.
    pub program: String,

    /// The arguments to the program.
    pub args: Vec<String>,

    /// An optional bound on how long the command may run.
    pub timeout: Option<Duration>,
}

impl CommandDescriptor {
    /// Creates a new [`CommandDescriptor`] without a time bound.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    /// Sets the time bound of the command.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What a command produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// The exit code, if the process exited normally.
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Checks if the command exited with code 0.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Inspects files.
pub trait FileSystemProbe {
    /// Inspects a path. A path that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the path could not be inspected at all.
    fn stat(&self, path: &str) -> Result<FileStat, FetchError>;

    /// Reads a text file, decoding UTF-16 if it has a byte order mark.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the file could not be read.
    fn read_text(&self, path: &str) -> Result<String, FetchError>;
}

/// Lists the partitions of the machine.
pub trait PartitionTableProbe {
    /// Returns every partition.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the partition table could not be queried.
    fn partitions(&self) -> Result<Vec<PartitionInfo>, FetchError>;
}

/// Reads entries out of a BCD store.
pub trait BootStoreReader {
    /// Reads the logical fields of an entry, such as `{default}`.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the store could not be opened or the entry could not be found.
    fn read_entry(&self, store_path: &str, entry_id: &str) -> Result<BcdEntry, FetchError>;
}

/// Reads keys out of offline registry hives.
pub trait RegistryHiveReader {
    /// Reads the values of a key, given a path relative to the hive root.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the hive or the key does not exist, or the hive could not be read.
    fn read_key(&self, hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError>;

    /// Drops anything kept from earlier reads, so the next read sees the hive as it is on disk now.
    fn forget(&self) {}
}

/// Queries the encryption lock state of a volume.
pub trait EncryptionStatusProbe {
    /// Returns the lock state, or [`LockState::Unknown`] if the query does not finish within `timeout`.
    ///
    /// Implementations must never block past `timeout`.
    fn lock_state(&self, volume: &DriveId, timeout: Duration) -> LockState;
}

/// Runs external commands. Only ever invoked after authorization.
pub trait CommandExecutor {
    /// Runs a command to completion, or until its time bound.
    ///
    /// # Errors
    ///
    /// May return an `Error` if the command could not be started or ran past its time bound.
    fn execute(&self, command: &CommandDescriptor) -> Result<CommandOutput, ExecError>;
}

/// Answers questions about the machine the toolkit itself runs on.
pub trait HostProbe {
    /// Returns the firmware type the machine booted through.
    fn firmware_type(&self) -> FirmwareType;

    /// Returns the Secure Boot state.
    fn secure_boot(&self) -> SecureBootState;

    /// Returns the independent signals used to classify the execution environment.
    fn signals(&self) -> EnvironmentSignals;

    /// Returns the drive of the running OS, if it has one.
    fn system_drive(&self) -> Option<DriveId>;
}

/// Every collaborator the core needs, in a single bound.
pub trait Environment:
    FileSystemProbe
    + PartitionTableProbe
    + BootStoreReader
    + RegistryHiveReader
    + EncryptionStatusProbe
    + CommandExecutor
    + HostProbe
{
}

impl<T> Environment for T where
    T: FileSystemProbe
        + PartitionTableProbe
        + BootStoreReader
        + RegistryHiveReader
        + EncryptionStatusProbe
        + CommandExecutor
        + HostProbe
{
}
