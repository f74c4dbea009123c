// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Operation categories and the repair policy.
//!
//! Every command a dispatcher wants to run is tagged with an [`Operation`]. What each category means is fixed
//! in [`OPERATIONS`]. Which of the remaining categories count as reversible, and are therefore allowed under
//! [`RepairMode::RepairSafe`](super::RepairMode::RepairSafe), is policy data held in [`RepairPolicy`] and can
//! be changed through the `reversible` configuration key.

use core::fmt;
use std::collections::BTreeSet;

use log::warn;
use serde::{Deserialize, Serialize};

/// The category of a proposed command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Reads state and writes nothing, such as `bcdedit /enum`.
    Query,

    /// Sets or clears a single element of an existing BCD entry.
    BcdSetValue,

    /// Edits a value in an offline registry hive.
    RegistryEdit,

    /// Adds a driver package to an offline image.
    DriverInjection,

    /// Repairs system files from the component store.
    SystemFileRepair,

    /// Copies boot files onto the system partition of the same disk.
    BootFileWrite,

    /// Rebuilds or rewrites the BCD store.
    BcdRewrite,

    /// Deletes a BCD entry or the store itself.
    BcdDelete,

    /// Formats, cleans, or deletes a partition.
    PartitionWipe,

    /// Writes boot files or boot code onto a different disk than the installation.
    CrossDiskBootWrite,

    /// Adds, removes, or reorders firmware boot entries.
    FirmwareBootEntryEdit,

    /// A destructive command that fits no other category.
    Unclassified,
}

/// A row of the operation table.
pub struct OperationRule {
    /// The operation.
    pub operation: Operation,

    /// The configuration name of the operation.
    pub name: &'static str,

    /// If the operation writes anything.
    pub destructive: bool,

    /// If the operation is only ever allowed under `REPAIR_FORCE`.
    pub force_only: bool,
}

/// The fixed operation table, one row per [`Operation`] in declaration order.
pub const OPERATIONS: &[OperationRule] = &[
    rule(Operation::Query, "query", false, false),
    rule(Operation::BcdSetValue, "bcd_set_value", true, false),
    rule(Operation::RegistryEdit, "registry_edit", true, false),
    rule(Operation::DriverInjection, "driver_injection", true, false),
    rule(Operation::SystemFileRepair, "system_file_repair", true, false),
    rule(Operation::BootFileWrite, "boot_file_write", true, false),
    rule(Operation::BcdRewrite, "bcd_rewrite", true, false),
    rule(Operation::BcdDelete, "bcd_delete", true, true),
    rule(Operation::PartitionWipe, "partition_wipe", true, true),
    rule(Operation::CrossDiskBootWrite, "cross_disk_boot_write", true, true),
    rule(Operation::FirmwareBootEntryEdit, "firmware_boot_entry_edit", true, true),
    rule(Operation::Unclassified, "unclassified", true, false),
];

/// The categories that are reversible unless configured otherwise.
pub const DEFAULT_REVERSIBLE: &[Operation] = &[
    Operation::BcdSetValue,
    Operation::RegistryEdit,
    Operation::DriverInjection,
];

/// Shorthand for building a row of [`OPERATIONS`].
const fn rule(
    operation: Operation,
    name: &'static str,
    destructive: bool,
    force_only: bool,
) -> OperationRule {
    OperationRule {
        operation,
        name,
        destructive,
        force_only,
    }
}

impl Operation {
    /// Returns the row of this operation in [`OPERATIONS`].
    const fn rule(self) -> &'static OperationRule {
        // rows are in declaration order
        &OPERATIONS[self as usize]
    }

    /// Parses an operation from its configuration name, case-insensitively.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        OPERATIONS
            .iter()
            .find(|x| x.name.eq_ignore_ascii_case(name))
            .map(|x| x.operation)
    }

    /// Returns the configuration name of the operation.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn as_str(self) -> &'static str {
        self.rule().name
    }

    /// Checks if the operation writes anything.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn is_destructive(self) -> bool {
        self.rule().destructive
    }

    /// Checks if the operation is only ever allowed under `REPAIR_FORCE`.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn is_force_only(self) -> bool {
        self.rule().force_only
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which destructive operations count as reversible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPolicy {
    /// The reversible operations.
    reversible: BTreeSet<Operation>,
}

impl RepairPolicy {
    /// Creates a new [`RepairPolicy`] from a list of reversible operations.
    ///
    /// Force-only operations and [`Operation::Unclassified`] can never be reversible, and are dropped with a
    /// warning.
    pub fn new(reversible: impl IntoIterator<Item = Operation>) -> Self {
        let reversible = reversible
            .into_iter()
            .filter(|op| {
                let allowed = op.is_destructive()
                    && !op.is_force_only()
                    && *op != Operation::Unclassified;
                if !allowed {
                    warn!("Operation {op} cannot be marked reversible, ignoring");
                }
                allowed
            })
            .collect();
        Self { reversible }
    }

    /// Parses a space separated list of operation names, such as the `reversible` configuration value.
    ///
    /// Unknown names are skipped with a warning.
    #[must_use = "Has no effect if the result is unused"]
    pub fn parse(list: &str) -> Self {
        Self::new(list.split_whitespace().filter_map(|name| {
            let op = Operation::parse(name);
            if op.is_none() {
                warn!("Unknown operation \"{name}\" in reversible list");
            }
            op
        }))
    }

    /// Checks if an operation is reversible under this policy.
    #[must_use = "Has no effect if the result is unused"]
    pub fn is_reversible(&self, operation: Operation) -> bool {
        self.reversible.contains(&operation)
    }

    /// Returns the reversible operations.
    pub fn reversible(&self) -> impl Iterator<Item = Operation> + '_ {
        self.reversible.iter().copied()
    }
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REVERSIBLE.iter().copied())
    }
}
