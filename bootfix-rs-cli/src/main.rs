// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A command line interface frontend to `bootfix-rs`.

mod report;

use std::{fs, process::ExitCode};

use bootfix_rs_core::{
    DiagResult,
    config::DoctorConfig,
    discovery::Survey,
    doctor::{self, Doctor},
    error::DiagError,
    gate::{
        authorize::CommandRequest,
        policy::{OPERATIONS, Operation},
    },
    model::types::DriveId,
    system::{host::HostEnvironment, log_backend::ConsoleLogger},
};
use getargs::{Arg, Options};
use log::{LevelFilter, SetLoggerError};

use crate::report::{Payload, Report};

/// The configuration file that is read when `--config` is not given.
const DEFAULT_CONFIG: &str = "bootfix-rs.conf";

/// What the run was asked to do.
#[derive(Clone, Copy)]
enum Action {
    /// Diagnose an installation.
    Diagnose,

    /// Print the repair mode of the environment.
    Mode,

    /// Decide if a command of a category may run.
    Authorize(Operation),
}

/// Everything that was parsed from the command line.
#[derive(Default)]
struct Args<'a> {
    /// The requested action, if any.
    action: Option<Action>,

    /// Diagnose this drive instead of the configured one.
    target: Option<&'a str>,

    /// Write the payload into this file.
    json: Option<&'a str>,

    /// Write the report into this file.
    report: Option<&'a str>,

    /// Read the configuration from this file.
    config: Option<&'a str>,

    /// Write the survey snapshot into this file.
    capture: Option<&'a str>,

    /// Diagnose the survey snapshot in this file instead of the machine.
    replay: Option<&'a str>,

    /// Opt in to reversible repairs on a live OS.
    safe: bool,

    /// Print debug logs.
    verbose: bool,

    /// The command text of `--authorize`.
    command: Vec<&'a str>,
}

/// Parses the command line. Returns [`None`] if the usage text should be shown instead.
fn parse_args<'a>(args: impl Iterator<Item = &'a str>) -> Option<Args<'a>> {
    let mut parsed = Args::default();
    let mut opts = Options::new(args);
    while let Ok(Some(arg)) = opts.next_arg() {
        match arg {
            Arg::Short('d') | Arg::Long("diagnose") => parsed.action = Some(Action::Diagnose),
            Arg::Short('m') | Arg::Long("mode") => parsed.action = Some(Action::Mode),
            Arg::Short('a') | Arg::Long("authorize") => {
                let Ok(value) = opts.value() else {
                    println!("Error: A category was not passed into the authorize argument");
                    return None;
                };
                let Some(operation) = Operation::parse(value) else {
                    let names: Vec<_> = OPERATIONS.iter().map(|x| x.name).collect();
                    println!(
                        "Error: Unknown category \"{value}\" (expected one of {})",
                        names.join(", ")
                    );
                    return None;
                };
                parsed.action = Some(Action::Authorize(operation));
            }
            Arg::Short('t') | Arg::Long("target") => {
                parsed.target = Some(value_of(&mut opts, "target")?);
            }
            Arg::Short('j') | Arg::Long("json") => {
                parsed.json = Some(value_of(&mut opts, "json")?);
            }
            Arg::Short('r') | Arg::Long("report") => {
                parsed.report = Some(value_of(&mut opts, "report")?);
            }
            Arg::Short('c') | Arg::Long("config") => {
                parsed.config = Some(value_of(&mut opts, "config")?);
            }
            Arg::Long("capture") => parsed.capture = Some(value_of(&mut opts, "capture")?),
            Arg::Long("replay") => parsed.replay = Some(value_of(&mut opts, "replay")?),
            Arg::Long("safe") => parsed.safe = true,
            Arg::Short('v') | Arg::Long("verbose") => parsed.verbose = true,
            // ignore any other arguments when help is specified
            Arg::Short('h') | Arg::Long("help") => return None,
            Arg::Short(invalid) => println!("Error: Unknown short argument: -{invalid}"),
            Arg::Long(invalid) => println!("Error: Unknown long argument: --{invalid}"),
            Arg::Positional(command) => parsed.command.push(command),
        }
    }

    if !parsed.command.is_empty() && !matches!(parsed.action, Some(Action::Authorize(_))) {
        println!(
            "Error: Unknown positional argument: {}",
            parsed.command.join(" ")
        );
    }

    Some(parsed)
}

/// Takes the value of an argument, or prints an error.
fn value_of<'a, I: Iterator<Item = &'a str>>(
    opts: &mut Options<&'a str, I>,
    name: &str,
) -> Option<&'a str> {
    let value = opts.value().ok();
    if value.is_none() {
        println!("Error: A value was not passed into the {name} argument");
    }
    value
}

/// Prints the usage text.
fn usage(app_filename: &str) {
    println!(
        r"Usage: {app_filename} [OPTIONS] [-- COMMAND]...

-h, --help                 display this help and exit
-d, --diagnose             diagnose an installation and report if it will boot
-m, --mode                 display the repair mode of this environment and exit
-a, --authorize CATEGORY   decide if COMMAND, of the given category, may run here
-t, --target DRIVE         diagnose the installation on DRIVE
-j, --json FILE            write the machine-readable payload into FILE
-r, --report FILE          write the human-readable report into FILE
-c, --config FILE          read the configuration from FILE (default {DEFAULT_CONFIG})
    --capture FILE         write a snapshot of the surveyed facts into FILE
    --replay FILE          diagnose a captured snapshot instead of this machine
    --safe                 allow reversible repairs on a live OS
-v, --verbose              print debug logs
"
    );
}

/// Installs the global logger, mirroring into the configured log file if possible.
///
/// # Errors
///
/// May return an `Error` if a global logger was already installed.
fn init_logger(level: LevelFilter, log_file: Option<&str>) -> Result<(), SetLoggerError> {
    let logger = match log_file {
        Some(path) => ConsoleLogger::new(level).with_file(path).unwrap_or_else(|e| {
            eprintln!("Error: Could not open log file \"{path}\": {e}");
            ConsoleLogger::new(level)
        }),
        None => ConsoleLogger::new(level),
    };
    logger.install()
}

/// Diagnoses the machine, or a captured snapshot, then writes the report and the payload.
///
/// # Errors
///
/// May return an `Error` if a file could not be read or written, or the machine could not be
/// surveyed.
fn diagnose(
    doctor: &Doctor<HostEnvironment>,
    args: &Args<'_>,
    target: Option<&DriveId>,
) -> DiagResult<ExitCode> {
    let outcome = match args.replay {
        Some(path) => Survey::from_snapshot(&fs::read(path)?).and_then(doctor::diagnose),
        None => doctor.run_diagnosis(target),
    };

    // a missing installation is still an answer, anything else is a failure of the tool
    let (payload, report) = match outcome {
        Ok(diagnosis) => {
            if let Some(path) = args.capture {
                fs::write(path, diagnosis.survey.to_snapshot()?)?;
            }
            let blockers = diagnosis.blockers();
            let report = Report::Diagnosis {
                diagnosis: &diagnosis,
                blockers: &blockers,
            }
            .to_string();
            (Payload::new(&diagnosis), report)
        }
        Err(e @ DiagError::Configuration(_)) => {
            (Payload::unavailable(&e), Report::Unavailable(&e).to_string())
        }
        Err(e) => return Err(e),
    };

    print!("{report}");
    if let Some(path) = args.report {
        fs::write(path, &report)?;
    }
    if let Some(path) = args.json {
        let json = payload.to_json().map_err(std::io::Error::from)?;
        fs::write(path, json)?;
    }

    Ok(if payload.bootable {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// The actual main function of the program.
///
/// # Errors
///
/// May return an `Error` if the configuration could not be read, or the requested action failed.
fn main_func(args: &[String]) -> DiagResult<ExitCode> {
    let mut args = args.iter().map(String::as_str);
    let app_filename = args.next().unwrap_or("bootfix-rs-cli");

    let Some(args) = parse_args(args) else {
        usage(app_filename);
        return Ok(ExitCode::SUCCESS);
    };
    let Some(action) = args.action else {
        usage(app_filename);
        return Ok(ExitCode::SUCCESS);
    };

    let mut config = DoctorConfig::load(args.config.unwrap_or(DEFAULT_CONFIG))?;
    config.allow_repair_safe |= args.safe;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = init_logger(level, config.log_file.as_deref()) {
        eprintln!("Error: Could not install logger: {e}");
    }

    let target = match args.target.map(DriveId::new).transpose() {
        Ok(target) => target,
        Err(e) => {
            println!("Error: {e} (The value passed to the target argument is not a drive)");
            return Ok(ExitCode::FAILURE);
        }
    };

    let doctor = Doctor::new(HostEnvironment::new(), config);
    match action {
        Action::Diagnose => diagnose(&doctor, &args, target.as_ref()),
        Action::Mode => {
            println!("{}", doctor.classify_environment());
            Ok(ExitCode::SUCCESS)
        }
        Action::Authorize(operation) => {
            if args.command.is_empty() {
                println!("Error: No command was passed to authorize");
                return Ok(ExitCode::FAILURE);
            }
            let request = CommandRequest::new(operation, args.command.join(" "));
            let decision = doctor.authorize(&request);
            let verdict = if decision.is_allowed() { "ALLOW" } else { "DENY" };
            println!(
                "{verdict} ({}): {}",
                doctor.classify_environment(),
                decision.reason()
            );
            Ok(if decision.is_allowed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// The main function of the program.
///
/// Exits with 0 when the installation will boot or the command is allowed, 1 otherwise.
fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    main_func(&args).unwrap_or_else(|e| {
        println!("Error: {e}");
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<Args<'_>> {
        parse_args(line.split_whitespace())
    }

    #[test]
    fn test_diagnose_args() {
        let args = parse("-d -t d: --json out.json --safe -v").unwrap();
        assert!(matches!(args.action, Some(Action::Diagnose)));
        assert_eq!(args.target, Some("d:"));
        assert_eq!(args.json, Some("out.json"));
        assert!(args.safe && args.verbose);
        assert_eq!(args.config, None);
    }

    #[test]
    fn test_authorize_args() {
        let args = parse("-a partition_wipe -- format C: /q").unwrap();
        assert!(matches!(
            args.action,
            Some(Action::Authorize(Operation::PartitionWipe))
        ));
        assert_eq!(args.command, ["format", "C:", "/q"]);
    }

    #[test]
    fn test_help_and_bad_values() {
        assert!(parse("-d -h").is_none());
        assert!(parse("-a not_a_category x").is_none());
        assert!(parse("-d --target").is_none());
    }

    #[test]
    fn test_second_logger_is_refused() {
        let _ = init_logger(LevelFilter::Warn, None);
        assert!(init_logger(LevelFilter::Warn, None).is_err());
    }
}
