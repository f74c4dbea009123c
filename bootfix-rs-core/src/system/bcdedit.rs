// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A [`BootStoreReader`] backed by `bcdedit`.
//!
//! This runs `bcdedit /store <store> /enum <entry> /v` and parses its text output. Only the logical fields the
//! core needs are extracted: `device`, `osdevice` and `path`. The output is grouped into sections, each one
//! headed by a title and a line of dashes:
//!
//! ```text
//! Windows Boot Loader
//! -------------------
//! identifier              {c0ffee00-1234-11ee-8c90-0242ac120002}
//! device                  partition=C:
//! path                    \Windows\system32\winload.efi
//! description             Windows 11
//! osdevice                partition=C:
//! systemroot              \Windows
//! ```
//!
//! Only English output is understood.

use log::warn;
use thiserror::Error;

use crate::{
    model::facts::{BcdEntry, DeviceRef},
    system::{
        BootStoreReader, CommandDescriptor, CommandExecutor, FetchError, command::run_for_stdout,
    },
};

/// The title of a Windows boot loader section.
const LOADER_SECTION: &str = "windows boot loader";

/// Errors that may result from parsing `bcdedit` output.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BcdParseError {
    /// There was no Windows boot loader section in the output.
    #[error("No Windows Boot Loader entry in bcdedit output")]
    NoLoaderEntry,

    /// The loader section was missing a required element.
    #[error("Boot loader entry missing element \"{0}\"")]
    MissingElement(&'static str),
}

/// [`BootStoreReader`] that shells out to `bcdedit`.
pub struct BcdeditStore<'a, X: CommandExecutor> {
    /// The executor used to run `bcdedit`.
    executor: &'a X,
}

impl<'a, X: CommandExecutor> BcdeditStore<'a, X> {
    /// Creates a new [`BcdeditStore`].
    pub const fn new(executor: &'a X) -> Self {
        Self { executor }
    }
}

impl<X: CommandExecutor> BootStoreReader for BcdeditStore<'_, X> {
    fn read_entry(&self, store_path: &str, entry_id: &str) -> Result<BcdEntry, FetchError> {
        let command = CommandDescriptor::new(
            "bcdedit",
            ["/store", store_path, "/enum", entry_id, "/v"],
        );
        let (ok, text) = run_for_stdout(self.executor, &command)?;
        if !ok {
            return Err(FetchError::BootStore {
                store: store_path.to_owned(),
                reason: text.trim().to_owned(),
            });
        }
        Ok(parse_entry(&text)?)
    }
}

/// Parses the first Windows boot loader section out of `bcdedit /enum /v` output.
///
/// Only the first section is used, since `/enum <entry>` prints exactly one section for a single entry. A
/// section without a title is accepted as a loader section if it is the only one.
///
/// # Errors
///
/// May return an `Error` if there is no loader section, or it has no `device` or `osdevice`.
pub fn parse_entry(text: &str) -> Result<BcdEntry, BcdParseError> {
    let sections = split_sections(text);
    let section = sections
        .iter()
        .find(|(title, _)| title.eq_ignore_ascii_case(LOADER_SECTION))
        .or_else(|| sections.first().filter(|_| sections.len() == 1))
        .ok_or(BcdParseError::NoLoaderEntry)?;

    let mut device = None;
    let mut os_device = None;
    let mut loader_path = None;

    for line in &section.1 {
        let Some((key, value)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let value = value.trim();
        match &*key.to_ascii_lowercase() {
            "device" => device = Some(parse_device(value)),
            "osdevice" => os_device = Some(parse_device(value)),
            "path" => loader_path = Some(value.to_owned()),
            _ => (),
        }
    }

    Ok(BcdEntry {
        device: device.ok_or(BcdParseError::MissingElement("device"))?,
        os_device: os_device.ok_or(BcdParseError::MissingElement("osdevice"))?,
        loader_path,
    })
}

/// Parses a device element such as `partition=C:`, `boot` or `unknown`.
#[must_use = "Has no effect if the result is unused"]
pub fn parse_device(value: &str) -> DeviceRef {
    let value = value.trim();
    if let Some((kind, target)) = value.split_once('=')
        && kind.trim().eq_ignore_ascii_case("partition")
    {
        return DeviceRef::Partition(target.trim().to_owned());
    }
    match &*value.to_ascii_lowercase() {
        "boot" => DeviceRef::Boot,
        "unknown" | "" => DeviceRef::Unknown,
        _ => DeviceRef::Other(value.to_owned()),
    }
}

/// Splits `bcdedit` output into titled sections of non-empty lines.
fn split_sections(text: &str) -> Vec<(String, Vec<String>)> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let underlined = lines
            .get(i + 1)
            .is_some_and(|next| !next.is_empty() && next.chars().all(|x| x == '-'));

        if underlined {
            sections.push((line.trim().to_owned(), Vec::new()));
            i += 2;
            continue;
        }

        if !line.trim().is_empty() {
            if sections.is_empty() {
                warn!("bcdedit output has lines before any section title");
                sections.push((String::new(), Vec::new()));
            }
            if let Some((_, body)) = sections.last_mut() {
                body.push(line.trim().to_owned());
            }
        }
        i += 1;
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const OUTPUT: &str = "
Windows Boot Loader
-------------------
identifier              {current}
device                  partition=C:
path                    \\Windows\\system32\\winload.efi
description             Windows 11
locale                  en-US
osdevice                partition=C:
systemroot              \\Windows
";

    #[test]
    fn test_basic_entry() -> Result<(), BcdParseError> {
        let entry = parse_entry(OUTPUT)?;
        assert_eq!(entry.device, DeviceRef::Partition("C:".to_owned()));
        assert_eq!(entry.os_device, DeviceRef::Partition("C:".to_owned()));
        assert_eq!(
            entry.loader_path.as_deref(),
            Some("\\Windows\\system32\\winload.efi")
        );
        Ok(())
    }

    #[test]
    fn test_skips_boot_manager_section() -> Result<(), BcdParseError> {
        let output = format!(
            "Windows Boot Manager\n--------------------\nidentifier {{bootmgr}}\ndevice partition=S:\npath \\EFI\\Microsoft\\Boot\\bootmgfw.efi\n\n{OUTPUT}"
        );
        let entry = parse_entry(&output)?;
        assert_eq!(
            entry.loader_path.as_deref(),
            Some("\\Windows\\system32\\winload.efi")
        );
        assert_eq!(entry.device, DeviceRef::Partition("C:".to_owned()));
        Ok(())
    }

    #[test]
    fn test_unknown_device() -> Result<(), BcdParseError> {
        let output = OUTPUT.replace("partition=C:", "unknown");
        let entry = parse_entry(&output)?;
        assert_eq!(entry.device, DeviceRef::Unknown);
        assert_eq!(entry.os_device, DeviceRef::Unknown);
        Ok(())
    }

    #[test]
    fn test_missing_osdevice() {
        let output = OUTPUT.replace("osdevice", "somethingelse");
        assert_eq!(
            parse_entry(&output),
            Err(BcdParseError::MissingElement("osdevice"))
        );
    }

    #[test]
    fn test_no_loader() {
        let output = "Windows Boot Manager\n--------------------\ndevice partition=S:\n\nFirmware Boot Manager\n---------------------\nidentifier {fwbootmgr}\n";
        assert_eq!(parse_entry(output), Err(BcdParseError::NoLoaderEntry));
    }

    #[test]
    fn test_parse_device_forms() {
        assert_eq!(parse_device("boot"), DeviceRef::Boot);
        assert_eq!(
            parse_device("partition=\\Device\\HarddiskVolume3"),
            DeviceRef::Partition("\\Device\\HarddiskVolume3".to_owned())
        );
        assert_eq!(
            parse_device("ramdisk=[boot]\\sources\\boot.wim,{7619dcc8-fafe-11d9-b411-000476eba25f}"),
            DeviceRef::Other(
                "ramdisk=[boot]\\sources\\boot.wim,{7619dcc8-fafe-11d9-b411-000476eba25f}"
                    .to_owned()
            )
        );
    }

    proptest! {
        #[test]
        fn doesnt_panic(x in any::<String>()) {
            let _ = parse_entry(&x);
        }
    }
}
