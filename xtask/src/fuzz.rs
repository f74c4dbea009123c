// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use clap::Subcommand;
use duct::cmd;

#[derive(Subcommand)]
pub enum Fuzz {
    /// Run bcdedit entry parser
    Bcdedit,

    /// Run configuration file parser
    Config,

    /// Run offline registry hive parser
    Hive,

    /// Run partition table parser
    Partitions,

    /// Run setup log parser
    SetupLog,

    /// Run survey snapshot decoder
    Snapshot,
}

pub fn fuzz_parsers(command: Fuzz) -> anyhow::Result<()> {
    let mut args = vec!["fuzz", "run"];
    match command {
        Fuzz::Bcdedit => args.push("bcdedit"),
        Fuzz::Config => args.push("config"),
        Fuzz::Hive => args.push("hive"),
        Fuzz::Partitions => args.push("partitions"),
        Fuzz::SetupLog => args.push("setup_log"),
        Fuzz::Snapshot => args.push("snapshot"),
    }

    cmd!("cargo", "install", "cargo-fuzz").run()?; // will not install if its already installed
    cmd("cargo", args).run()?;
    Ok(())
}
