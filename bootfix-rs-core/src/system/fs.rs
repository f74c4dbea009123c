// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! Filesystem helpers over [`std::fs`].
//!
//! These implement [`FileSystemProbe`] for the host. A path that does not exist is reported as a
//! [`FileStat`] with `exists` unset, while a path that could not be inspected (for example, because access
//! was denied) is reported as an `Error`. The probes rely on this distinction.
//!
//! This module also provides [`recheck`], the only retry loop in the core. It re-tests existence a fixed
//! number of times with a fixed backoff, and tags whatever it finds as retried.

use std::{fs, io::ErrorKind, thread, time::Duration};

use log::debug;

use crate::{
    model::facts::FileFact,
    system::{FetchError, FileStat, FileSystemProbe},
};

/// The largest text file that will be read, to keep runaway logs from exhausting memory.
const MAX_TEXT_SIZE: u64 = 64 * 1024 * 1024;

/// [`FileSystemProbe`] over the host filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostFileSystem;

impl FileSystemProbe for HostFileSystem {
    fn stat(&self, path: &str) -> Result<FileStat, FetchError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(FileStat {
                exists: true,
                size_bytes: meta.len(),
                readable: meta.is_file() && fs::File::open(path).is_ok(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileStat::default()),
            Err(source) => Err(FetchError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    fn read_text(&self, path: &str) -> Result<String, FetchError> {
        let io_err = |source| FetchError::Io {
            path: path.to_owned(),
            source,
        };
        let len = fs::metadata(path).map_err(io_err)?.len();
        if len > MAX_TEXT_SIZE {
            return Err(io_err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("file is {len} bytes, refusing to read more than {MAX_TEXT_SIZE}"),
            )));
        }
        let bytes = fs::read(path).map_err(io_err)?;
        Ok(decode_text(&bytes))
    }
}

/// Decodes a text file that may be UTF-16LE with a byte order mark, or UTF-8/ANSI otherwise.
#[must_use = "Has no effect if the result is unused"]
pub fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|x| u16::from_le_bytes([x[0], x[1]]));
            char::decode_utf16(units)
                .map(|x| x.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Inspects a file once, turning the result into a [`FileFact`].
///
/// # Errors
///
/// May return an `Error` if the path could not be inspected.
pub fn inspect(fs: &impl FileSystemProbe, path: &str) -> Result<FileFact, FetchError> {
    let stat = fs.stat(path)?;
    Ok(FileFact {
        path: path.to_owned(),
        exists: stat.exists,
        size_bytes: stat.size_bytes,
        readable: stat.readable,
        retried: false,
    })
}

/// Inspects a file, re-checking up to `attempts` more times with a fixed `backoff` if it is not viable.
///
/// This covers files that show up late after a cache flush, such as boot files right after a repair tool
/// wrote them. The returned fact has `retried` set whenever more than one attempt was made, so a late pass
/// can be told apart from a first-attempt pass. Errors are not retried.
///
/// # Errors
///
/// May return an `Error` if the path could not be inspected.
pub fn recheck(
    fs: &impl FileSystemProbe,
    path: &str,
    attempts: u32,
    backoff: Duration,
) -> Result<FileFact, FetchError> {
    let mut fact = inspect(fs, path)?;
    for attempt in 1..=attempts {
        if fact.is_viable() {
            break;
        }
        debug!("{path} not viable, re-checking ({attempt}/{attempts})");
        thread::sleep(backoff);
        fact = inspect(fs, path)?;
        fact.retried = true;
    }
    Ok(fact)
}
