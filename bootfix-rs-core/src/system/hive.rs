// SPDX-FileCopyrightText: 2025 some100 <ootinnyoo@outlook.com>
// SPDX-License-Identifier: MIT

//! A [`RegistryHiveReader`] over offline hive files.
//!
//! With the `hive` feature, hives are parsed directly with [`nt_hive`], so no hive ever has to be loaded into
//! the registry of the running system. Without it, every read returns [`HiveError::Unsupported`].

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use crate::system::{HiveError, KeyValues, RegistryHiveReader};

/// Returns the name of the control set the offline SYSTEM hive boots with, such as `ControlSet001`.
///
/// # Errors
///
/// May return an `Error` if the `Select` key could not be read, or has no usable `Current` value.
pub fn current_control_set(
    reader: &(impl RegistryHiveReader + ?Sized),
    hive_path: &str,
) -> Result<String, HiveError> {
    let select = reader.read_key(hive_path, "Select")?;
    let current = select
        .get("Current")
        .and_then(crate::system::RegValue::as_dword)
        .filter(|x| (1..=999).contains(x))
        .ok_or_else(|| HiveError::Corrupt(format!("{hive_path}: no usable Select\\Current value")))?;
    Ok(format!("ControlSet{current:03}"))
}

/// [`RegistryHiveReader`] that parses hive files from disk.
///
/// Every hive is read from disk once and kept until [`RegistryHiveReader::forget`] is called.
#[derive(Clone, Debug, Default)]
pub struct HiveFile {
    /// The raw bytes of every hive read so far, by path.
    cache: RefCell<BTreeMap<String, Rc<[u8]>>>,
}

impl HiveFile {
    /// Creates a new [`HiveFile`] with nothing cached.
    #[must_use = "Has no effect if the result is unused"]
    pub const fn new() -> Self {
        Self {
            cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Returns the bytes of a hive, reading it from disk if it is not cached yet.
    #[cfg(feature = "hive")]
    fn bytes(&self, hive_path: &str) -> Result<Rc<[u8]>, HiveError> {
        if let Some(bytes) = self.cache.borrow().get(hive_path) {
            return Ok(Rc::clone(bytes));
        }

        let bytes: Rc<[u8]> = std::fs::read(hive_path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => HiveError::NotFound(hive_path.to_owned()),
                std::io::ErrorKind::PermissionDenied => HiveError::AccessDenied(hive_path.to_owned()),
                _ => HiveError::Corrupt(format!("{hive_path}: {e}")),
            })?
            .into();
        log::debug!("Read hive {hive_path} ({} bytes)", bytes.len());
        self.cache
            .borrow_mut()
            .insert(hive_path.to_owned(), Rc::clone(&bytes));
        Ok(bytes)
    }

    /// Returns how many hives are cached.
    #[cfg(all(test, feature = "hive"))]
    fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(feature = "hive")]
impl RegistryHiveReader for HiveFile {
    fn read_key(&self, hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError> {
        let bytes = self.bytes(hive_path)?;
        parse_key(&bytes, hive_path, key_path)
    }

    fn forget(&self) {
        self.cache.borrow_mut().clear();
    }
}

#[cfg(not(feature = "hive"))]
impl RegistryHiveReader for HiveFile {
    fn read_key(&self, _hive_path: &str, _key_path: &str) -> Result<KeyValues, HiveError> {
        Err(HiveError::Unsupported)
    }

    fn forget(&self) {
        self.cache.borrow_mut().clear();
    }
}

/// Reads the values of a key out of the raw bytes of a hive.
///
/// Malformed hives may make the parser panic, so any panic is caught and reported as a corrupt hive.
///
/// # Errors
///
/// May return an `Error` if the hive is not valid, or the key does not exist.
#[cfg(feature = "hive")]
pub fn parse_key(bytes: &[u8], hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError> {
    let parsed = std::panic::catch_unwind(|| walk_key(bytes, hive_path, key_path));
    parsed.unwrap_or_else(|_| Err(HiveError::Corrupt(hive_path.to_owned())))
}

/// Walks to a key and decodes its values.
#[cfg(feature = "hive")]
fn walk_key(bytes: &[u8], hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError> {
    use nt_hive::{Hive, KeyValueDataType};

    use crate::system::RegValue;

    let corrupt = |e: nt_hive::NtHiveError| HiveError::Corrupt(format!("{hive_path}: {e}"));

    let hive = Hive::new(bytes).map_err(corrupt)?;
    let root = hive.root_key_node().map_err(corrupt)?;
    let key_path = key_path.trim_matches('\\');
    let key = if key_path.is_empty() {
        root
    } else {
        root.subpath(key_path)
            .ok_or_else(|| HiveError::NotFound(format!("{hive_path}\\{key_path}")))?
            .map_err(corrupt)?
    };

    let mut values = KeyValues::new();
    let Some(iter) = key.values() else {
        return Ok(values);
    };

    for value in iter.map_err(corrupt)? {
        let value = value.map_err(corrupt)?;
        let name = value.name().map_err(corrupt)?.to_string_lossy();
        let data = match value.data_type().map_err(corrupt)? {
            KeyValueDataType::RegDWord | KeyValueDataType::RegDWordBigEndian => {
                value.dword_data().map(RegValue::Dword)
            }
            KeyValueDataType::RegQWord => value.qword_data().map(RegValue::Qword),
            KeyValueDataType::RegSZ | KeyValueDataType::RegExpandSZ => {
                value.string_data().map(RegValue::String)
            }
            KeyValueDataType::RegMultiSZ => value
                .multi_string_data()
                .and_then(|strings| strings.collect::<Result<Vec<_>, _>>())
                .map(RegValue::MultiString),
            _ => Ok(RegValue::Other),
        };
        let data = data.unwrap_or_else(|e| {
            log::warn!("Could not decode value \"{name}\" in {hive_path}: {e}");
            RegValue::Other
        });
        values.insert(name, data);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::RegValue;

    /// A hive reader with a single `Select` key.
    struct Select(Option<RegValue>);

    impl RegistryHiveReader for Select {
        fn read_key(&self, _hive_path: &str, key_path: &str) -> Result<KeyValues, HiveError> {
            if key_path != "Select" {
                return Err(HiveError::NotFound(key_path.to_owned()));
            }
            Ok(self.0.iter().map(|x| ("Current".to_owned(), x.clone())).collect())
        }
    }

    #[test]
    fn test_current_control_set() {
        let name = current_control_set(&Select(Some(RegValue::Dword(2))), "SYSTEM").unwrap();
        assert_eq!(name, "ControlSet002");
        assert!(current_control_set(&Select(Some(RegValue::Dword(0))), "SYSTEM").is_err());
        assert!(current_control_set(&Select(None), "SYSTEM").is_err());
    }
}
