// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`HostEnvironment`], the [`Environment`](super::Environment) of the machine the toolkit runs on.

use std::time::Duration;

use crate::{
    gate::EnvironmentSignals,
    model::{
        environment::{FirmwareType, PartitionInfo, SecureBootState},
        facts::{BcdEntry, LockState},
        types::DriveId,
    },
    system::{
        BootStoreReader, CommandDescriptor, CommandExecutor, CommandOutput, EncryptionStatusProbe,
        ExecError, FetchError, FileStat, FileSystemProbe, HiveError, HostProbe, KeyValues,
        PartitionTableProbe, RegistryHiveReader, bcdedit::BcdeditStore, command::HostExecutor,
        encryption::ManageBde, fs::HostFileSystem, hive::HiveFile, partitions::PowershellPartitions,
        signals::HostSignals,
    },
};

/// Every host collaborator, composed.
#[derive(Clone, Debug, Default)]
pub struct HostEnvironment {
    /// Runs external tools.
    executor: HostExecutor,

    /// Reads the host filesystem.
    fs: HostFileSystem,

    /// Reads offline hives.
    hives: HiveFile,
}

impl HostEnvironment {
    /// Creates a new [`HostEnvironment`].
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new() -> Self {
        Self {
            executor: HostExecutor,
            fs: HostFileSystem,
            hives: HiveFile::new(),
        }
    }

    /// Returns the signal probe over this environment.
    fn host(&self) -> HostSignals<'_, HostExecutor, HostFileSystem> {
        HostSignals::new(&self.executor, &self.fs)
    }
}

impl FileSystemProbe for HostEnvironment {
    fn stat(&self, path: &str) -> Result<FileStat, FetchError> {
        self.fs.stat(path)
    }

    fn read_text(&self, path: &str) -> Result<String, FetchError> {
        self.fs.read_text(path)
    }
}

impl PartitionTableProbe for HostEnvironment {
    fn partitions(&self) -> Result<Vec<PartitionInfo>, FetchError> {
        PowershellPartitions::new(&self.executor).partitions()
    }
}

impl BootStoreReader for HostEnvironment {
    fn read_entry(&self, store_path: &str, entry_id: &str) -> Result<BcdEntry, FetchError> {
        BcdeditStore::new(&self.executor).read_entry(store_path, entry_id)
    }
}

impl RegistryHiveReader for HostEnvironment {
    fn read_key(&self, hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError> {
        self.hives.read_key(hive_path, key_path)
    }

    fn forget(&self) {
        self.hives.forget();
    }
}

impl EncryptionStatusProbe for HostEnvironment {
    fn lock_state(&self, volume: &DriveId, timeout: Duration) -> LockState {
        ManageBde::new(&self.executor).lock_state(volume, timeout)
    }
}

impl CommandExecutor for HostEnvironment {
    fn execute(&self, command: &CommandDescriptor) -> Result<CommandOutput, ExecError> {
        self.executor.execute(command)
    }
}

impl HostProbe for HostEnvironment {
    fn firmware_type(&self) -> FirmwareType {
        self.host().firmware_type()
    }

    fn secure_boot(&self) -> SecureBootState {
        self.host().secure_boot()
    }

    fn signals(&self) -> EnvironmentSignals {
        self.host().signals()
    }

    fn system_drive(&self) -> Option<DriveId> {
        self.host().system_drive()
    }
}
