// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! The command authorization filter.
//!
//! The filter is default-deny: every destructive command has to be explicitly permitted by the mode and the
//! [`RepairPolicy`]. A denial always names the [`DenyRule`] that triggered it. The filter only produces a
//! decision, running the command is up to the caller.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::gate::{
    RepairMode,
    policy::{Operation, RepairPolicy},
};

/// A command someone wants to run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// The command line as it would be shown to the user.
    pub command_text: String,

    /// If the caller says the command writes anything.
    pub is_destructive: bool,

    /// The category of the command.
    pub operation: Operation,
}

impl CommandRequest {
    /// Creates a new [`CommandRequest`], taking destructiveness from the operation category.
    pub fn new(operation: Operation, command_text: impl Into<String>) -> Self {
        Self {
            command_text: command_text.into(),
            is_destructive: operation.is_destructive(),
            operation,
        }
    }

    /// Checks if the request is destructive. The caller and the category both get a say, and either one
    /// makes it destructive.
    #[must_use = "Has no effect if the result is unused"]
    pub fn destructive(&self) -> bool {
        self.is_destructive || self.operation.is_destructive()
    }
}

/// The specific rule that denied a command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyRule {
    /// Destructive commands are never allowed in `DIAGNOSE_ONLY`.
    NoWritesInDiagnoseOnly {
        /// The denied command.
        command: String,
    },

    /// The operation is in the fixed force-only set.
    ForceOnly {
        /// The denied command.
        command: String,

        /// The category of the command.
        operation: Operation,

        /// The mode the run is in.
        mode: RepairMode,
    },

    /// The operation is not reversible under the current policy.
    NotReversible {
        /// The denied command.
        command: String,

        /// The category of the command.
        operation: Operation,
    },
}

impl fmt::Display for DenyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWritesInDiagnoseOnly { command } => write!(
                f,
                "\"{command}\" is destructive and {} permits no writes",
                RepairMode::DiagnoseOnly
            ),
            Self::ForceOnly {
                command,
                operation,
                mode,
            } => write!(
                f,
                "\"{command}\" is a {operation} operation, which requires {} (current mode is {mode})",
                RepairMode::RepairForce
            ),
            Self::NotReversible { command, operation } => write!(
                f,
                "\"{command}\" is a {operation} operation, which {} does not treat as reversible",
                RepairMode::RepairSafe
            ),
        }
    }
}

/// Why a command was allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowReason {
    /// The command writes nothing.
    NonDestructive,

    /// The operation is reversible under the policy, and the mode is `REPAIR_SAFE`.
    Reversible,

    /// The mode is `REPAIR_FORCE`.
    Forced,
}

/// The decision of the filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authorization {
    /// The command may run.
    Allow(AllowReason),

    /// The command must not run.
    Deny(DenyRule),
}

impl Authorization {
    /// Checks if the command may run.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    /// Returns a human readable reason for the decision.
    #[must_use = "Has no effect if the result is unused"]
    pub fn reason(&self) -> String {
        match self {
            Self::Allow(AllowReason::NonDestructive) => "Command is not destructive".to_owned(),
            Self::Allow(AllowReason::Reversible) => {
                format!("Reversible operation permitted by {}", RepairMode::RepairSafe)
            }
            Self::Allow(AllowReason::Forced) => {
                format!("All operations permitted by {}", RepairMode::RepairForce)
            }
            Self::Deny(rule) => rule.to_string(),
        }
    }
}

/// Decides if a command may run in a given mode.
#[must_use = "Has no effect if the result is unused"]
pub fn authorize(request: &CommandRequest, mode: RepairMode, policy: &RepairPolicy) -> Authorization {
    if !request.destructive() {
        return Authorization::Allow(AllowReason::NonDestructive);
    }

    let command = request.command_text.clone();
    let operation = request.operation;

    match mode {
        RepairMode::DiagnoseOnly => Authorization::Deny(DenyRule::NoWritesInDiagnoseOnly { command }),
        RepairMode::RepairForce => Authorization::Allow(AllowReason::Forced),
        RepairMode::RepairSafe if operation.is_force_only() => {
            Authorization::Deny(DenyRule::ForceOnly {
                command,
                operation,
                mode,
            })
        }
        RepairMode::RepairSafe if policy.is_reversible(operation) => {
            Authorization::Allow(AllowReason::Reversible)
        }
        RepairMode::RepairSafe => Authorization::Deny(DenyRule::NotReversible { command, operation }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::policy::OPERATIONS;
    use proptest::prelude::*;

    fn any_operation() -> impl Strategy<Value = Operation> {
        (0..OPERATIONS.len()).prop_map(|i| OPERATIONS[i].operation)
    }

    #[test]
    fn test_non_destructive_always_allowed() {
        let request = CommandRequest::new(Operation::Query, "bcdedit /enum all");
        let policy = RepairPolicy::default();
        assert!(authorize(&request, RepairMode::DiagnoseOnly, &policy).is_allowed());
    }

    #[test]
    fn test_format_esp_needs_force() {
        let request = CommandRequest::new(Operation::PartitionWipe, "format S: /FS:FAT32");
        let policy = RepairPolicy::default();
        let decision = authorize(&request, RepairMode::RepairSafe, &policy);
        assert!(matches!(
            decision,
            Authorization::Deny(DenyRule::ForceOnly {
                operation: Operation::PartitionWipe,
                ..
            })
        ));
        assert!(decision.reason().contains("REPAIR_FORCE"));
        assert!(authorize(&request, RepairMode::RepairForce, &policy).is_allowed());
    }

    #[test]
    fn test_safe_mode_follows_policy() {
        let policy = RepairPolicy::default();
        let set = CommandRequest::new(Operation::BcdSetValue, "bcdedit /set {default} recoveryenabled no");
        let rewrite = CommandRequest::new(Operation::BcdRewrite, "bootrec /rebuildbcd");
        assert_eq!(
            authorize(&set, RepairMode::RepairSafe, &policy),
            Authorization::Allow(AllowReason::Reversible)
        );
        assert!(matches!(
            authorize(&rewrite, RepairMode::RepairSafe, &policy),
            Authorization::Deny(DenyRule::NotReversible { .. })
        ));
    }

    #[test]
    fn test_caller_flag_makes_query_destructive() {
        let request = CommandRequest {
            command_text: "diskpart /s script.txt".to_owned(),
            is_destructive: true,
            operation: Operation::Query,
        };
        let decision = authorize(&request, RepairMode::DiagnoseOnly, &RepairPolicy::default());
        assert!(!decision.is_allowed());
    }

    proptest! {
        #[test]
        fn diagnose_only_denies_every_write(text in ".*", op in any_operation(), flag in any::<bool>()) {
            let request = CommandRequest { command_text: text, is_destructive: flag, operation: op };
            let decision = authorize(&request, RepairMode::DiagnoseOnly, &RepairPolicy::default());
            prop_assert_eq!(decision.is_allowed(), !request.destructive());
        }

        #[test]
        fn force_only_needs_force(text in ".*", op in any_operation()) {
            let request = CommandRequest::new(op, text);
            let decision = authorize(&request, RepairMode::RepairSafe, &RepairPolicy::default());
            if op.is_force_only() {
                prop_assert!(!decision.is_allowed());
            }
        }
    }
}
