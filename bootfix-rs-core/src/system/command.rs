// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Provides [`HostExecutor`], a [`CommandExecutor`] on top of [`duct`].
//!
//! Commands with a time bound are started in the background and polled. If the bound passes, the process is
//! killed and [`ExecError::Timeout`] is returned, so a hung tool can never hold up a diagnosis run.

use std::{
    process::Output,
    thread,
    time::{Duration, Instant},
};

use duct::{Handle, cmd};
use log::{debug, warn};

use crate::system::{CommandDescriptor, CommandExecutor, CommandOutput, ExecError};

/// How often a bounded command is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// [`CommandExecutor`] that runs commands on the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostExecutor;

impl CommandExecutor for HostExecutor {
    fn execute(&self, command: &CommandDescriptor) -> Result<CommandOutput, ExecError> {
        debug!("Running {} {}", command.program, command.args.join(" "));
        let spawn_err = |source| ExecError::Spawn {
            program: command.program.clone(),
            source,
        };

        let handle = cmd(command.program.as_str(), &command.args)
            .stdout_capture()
            .stderr_capture()
            .stdin_null()
            .unchecked() // a non-zero exit is reported through the exit code, not as an error
            .start()
            .map_err(spawn_err)?;

        let output = match command.timeout {
            Some(timeout) => wait_bounded(&handle, timeout, &command.program)?,
            None => handle.wait().map_err(spawn_err)?.clone(),
        };

        Ok(to_command_output(&output))
    }
}

/// Polls a running command until it exits, killing it once `timeout` has passed.
///
/// # Errors
///
/// May return an `Error` if the command ran past `timeout`, or its status could not be polled.
fn wait_bounded(handle: &Handle, timeout: Duration, program: &str) -> Result<Output, ExecError> {
    let deadline = Instant::now() + timeout;
    loop {
        match handle.try_wait() {
            Ok(Some(output)) => return Ok(output.clone()),
            Ok(None) => (),
            Err(source) => {
                return Err(ExecError::Spawn {
                    program: program.to_owned(),
                    source,
                });
            }
        }

        if Instant::now() >= deadline {
            if let Err(e) = handle.kill() {
                warn!("Failed to kill \"{program}\" after timeout: {e}");
            }
            return Err(ExecError::Timeout {
                program: program.to_owned(),
                timeout_ms: timeout.as_millis(),
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Converts a raw process [`Output`] into a [`CommandOutput`].
fn to_command_output(output: &Output) -> CommandOutput {
    CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Runs a command and returns whether it succeeded, along with its standard output or standard error.
///
/// This is a small helper for the tool-backed collaborators.
///
/// # Errors
///
/// May return an `Error` if the command could not be run.
pub(crate) fn run_for_stdout(
    executor: &impl CommandExecutor,
    command: &CommandDescriptor,
) -> Result<(bool, String), ExecError> {
    let output = executor.execute(command)?;
    let ok = output.success();
    let text = if output.stdout.trim().is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    Ok((ok, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_hung_command_is_killed_at_timeout() {
        let command = CommandDescriptor::new("sleep", ["5"]).timeout(Duration::from_millis(200));
        let start = Instant::now();
        let result = HostExecutor.execute(&command);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(matches!(
            result,
            Err(ExecError::Timeout { program, timeout_ms: 200 }) if program == "sleep"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_bounded_command_that_finishes() {
        let command =
            CommandDescriptor::new("sh", ["-c", "echo hi; exit 3"]).timeout(Duration::from_secs(5));
        let output = HostExecutor.execute(&command).unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "hi");
        assert!(!output.success());
    }

    #[cfg(windows)]
    #[test]
    fn test_hung_command_is_killed_at_timeout() {
        let command =
            CommandDescriptor::new("powershell", ["-NoProfile", "-Command", "Start-Sleep 5"])
                .timeout(Duration::from_millis(500));
        let start = Instant::now();
        let result = HostExecutor.execute(&command);
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(matches!(result, Err(ExecError::Timeout { timeout_ms: 500, .. })));
    }

    #[test]
    fn test_missing_program() {
        let command = CommandDescriptor::new("bootfix-rs-no-such-program", ["x"])
            .timeout(Duration::from_secs(1));
        assert!(matches!(
            HostExecutor.execute(&command),
            Err(ExecError::Spawn { .. })
        ));
    }
}
