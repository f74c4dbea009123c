// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use clap::Subcommand;
use duct::cmd;

#[derive(Subcommand)]
pub enum Test {
    /// Run clippy only
    Clippy,

    /// Run unit and scenario tests only
    Unit,

    /// Run tests without the hive parser
    NoHive,
}

pub fn test_crate(command: Option<Test>) -> anyhow::Result<()> {
    match command {
        Some(Test::Clippy) => clippy()?,
        Some(Test::Unit) => unit()?,
        Some(Test::NoHive) => {
            cmd!(
                "cargo",
                "test",
                "--package",
                "bootfix-rs-core",
                "--no-default-features"
            )
            .run()?;
        }
        None => {
            clippy()?;
            unit()?;
        }
    }
    Ok(())
}

fn clippy() -> anyhow::Result<()> {
    cmd!("cargo", "clippy", "--all-targets").run()?;
    Ok(())
}

fn unit() -> anyhow::Result<()> {
    cmd!("cargo", "test").run()?;
    Ok(())
}
