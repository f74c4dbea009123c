// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

use duct::cmd;

pub fn build_all_crates(
    release: bool,
    target: Option<&str>,
    features: Option<Vec<String>>,
    no_default_features: bool,
) -> anyhow::Result<()> {
    let mut build_args = vec!["build"];

    if let Some(target) = target {
        build_args.extend(["--target", target]);
    }

    if release {
        build_args.extend(["--profile", "release-lto"]);
    }

    let features = features.map(|x| x.join(","));
    if let Some(features) = &features {
        build_args.extend(["--features", features]);
    }

    if no_default_features {
        build_args.push("--no-default-features");
    }

    cmd("cargo", build_args).run()?;
    Ok(())
}
