// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A [`PartitionTableProbe`] backed by the `Storage` `PowerShell` module.
//!
//! `Get-Partition` and `Get-Volume` are joined into one pipe-separated line per partition:
//!
//! ```text
//! disk0:part1|{c12a7328-f81f-11d2-ba4b-00a0c93ec93b}|S|FAT32|Healthy|False
//! disk0:part3|{ebd0a0a2-b9e5-4433-87c0-68b6b72699c7}|C|NTFS|Healthy|False
//! ```
//!
//! The fields are: identifier, GPT type, drive letter, filesystem, health status, and active flag. Malformed
//! lines are skipped with a warning.

use log::warn;

use crate::{
    model::{
        environment::{Filesystem, PartitionInfo, VolumeHealth},
        types::DriveId,
    },
    system::{
        CommandDescriptor, CommandExecutor, FetchError, PartitionTableProbe,
        command::run_for_stdout,
    },
};

/// The script that dumps the partition table.
const DUMP_SCRIPT: &str = "Get-Partition | ForEach-Object { \
    $v = $_ | Get-Volume -ErrorAction SilentlyContinue; \
    'disk{0}:part{1}|{2}|{3}|{4}|{5}|{6}' -f $_.DiskNumber, $_.PartitionNumber, $_.GptType, \
    $_.DriveLetter, $v.FileSystem, $v.HealthStatus, $_.IsActive }";

/// [`PartitionTableProbe`] that shells out to `PowerShell`.
pub struct PowershellPartitions<'a, X: CommandExecutor> {
    /// The executor used to run `PowerShell`.
    executor: &'a X,
}

impl<'a, X: CommandExecutor> PowershellPartitions<'a, X> {
    /// Creates a new [`PowershellPartitions`].
    pub const fn new(executor: &'a X) -> Self {
        Self { executor }
    }
}

impl<X: CommandExecutor> PartitionTableProbe for PowershellPartitions<'_, X> {
    fn partitions(&self) -> Result<Vec<PartitionInfo>, FetchError> {
        let command = CommandDescriptor::new(
            "powershell",
            ["-NoProfile", "-NonInteractive", "-Command", DUMP_SCRIPT],
        );
        let (ok, text) = run_for_stdout(self.executor, &command)?;
        if !ok {
            return Err(FetchError::Query {
                what: "partition table",
                reason: text.trim().to_owned(),
            });
        }
        Ok(parse_partition_table(&text))
    }
}

/// Parses the output of the partition dump script.
#[must_use = "Has no effect if the result is unused"]
pub fn parse_partition_table(text: &str) -> Vec<PartitionInfo> {
    text.lines()
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .filter_map(|line| {
            let parsed = parse_line(line);
            if parsed.is_none() {
                warn!("Skipping malformed partition line \"{line}\"");
            }
            parsed
        })
        .collect()
}

/// Parses a single line of the partition dump.
fn parse_line(line: &str) -> Option<PartitionInfo> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    let [id, guid, letter, fs, health, active] = fields.as_slice() else {
        return None;
    };
    if id.is_empty() {
        return None;
    }

    Some(PartitionInfo {
        partition_id: (*id).to_owned(),
        type_guid: guid.trim_matches(['{', '}']).to_ascii_lowercase(),
        mount_point: DriveId::new(letter).ok(),
        filesystem: Filesystem::parse(fs),
        health: VolumeHealth::parse(health),
        active: active.eq_ignore_ascii_case("true"),
    })
}
