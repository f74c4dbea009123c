// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use duct::cmd;

pub fn doc_crate(private: bool, open: bool, lib: bool) -> anyhow::Result<()> {
    let package = if lib {
        "bootfix-rs-core"
    } else {
        "bootfix-rs-cli"
    };
    let mut build_args = vec!["doc", "--package", package];
    if private {
        build_args.push("--document-private-items");
    }
    if open {
        build_args.push("--open");
    }

    cmd("cargo", build_args).run()?;
    Ok(())
}
