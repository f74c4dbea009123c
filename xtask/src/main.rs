// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};

use crate::{fuzz::Fuzz, test::Test};

mod build;
mod doc;
mod fuzz;
mod test;

#[derive(Parser)]
#[command(about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build all crates in workspace
    Build {
        /// Build with release profile
        #[arg(short, long, default_value_t = false)]
        release: bool,

        /// Build for a target triple other than the host, such as x86_64-pc-windows-msvc
        #[arg(short, long)]
        target: Option<String>,

        /// Space separated list of features
        #[arg(short, long)]
        features: Option<Vec<String>>,

        /// Build with no default features
        #[arg(long, default_value_t = false)]
        no_default_features: bool,
    },

    /// Build docs for bootfix-rs crates
    Doc {
        /// Document private items in crate
        #[arg(short, long, default_value_t = false)]
        private: bool,

        /// Open in web browser after documenting
        #[arg(short, long, default_value_t = false)]
        open: bool,

        /// Document the core crate instead of the command line frontend
        #[arg(long, default_value_t = true)]
        lib: bool,
    },

    /// Run clippy and tests on host
    Test {
        #[command(subcommand)]
        command: Option<Test>,
    },

    /// Fuzz a parser with cargo-fuzz
    Fuzz {
        #[command(subcommand)]
        command: Fuzz,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Build {
            release,
            target,
            features,
            no_default_features,
        } => build::build_all_crates(release, target.as_deref(), features, no_default_features)?,
        Commands::Doc { private, open, lib } => doc::doc_crate(private, open, lib)?,
        Commands::Test { command } => test::test_crate(command)?,
        Commands::Fuzz { command } => fuzz::fuzz_parsers(command)?,
    }
    Ok(())
}
