//! Named settings lists.
//!
//! An ordered list of uniquely named items, passed explicitly to whatever
//! needs it. Adding an item whose name is taken is resolved by a
//! [ConflictPolicy] chosen by the caller.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};

use crate::errors::{
    PeakScoringError,
    RegistryError,
};
use crate::scoring::PeakScoringModel;

pub trait Named {
    /// What the items are called in messages, e.g. "peak scoring model".
    const KIND: &'static str;

    fn name(&self) -> &str;
}

/// Items written to disk through a record type of their own.
///
/// Reading goes through [Stored::from_record], so a record that parses but
/// does not describe a valid item reports its own error.
pub trait Stored: Named + Sized {
    type Record: Serialize + DeserializeOwned;

    fn to_record(&self) -> Self::Record;
    fn from_record(record: Self::Record) -> Result<Self, PeakScoringError>;
}

/// Items that can be averaged with another item of the same name.
pub trait Mergeable: Sized {
    fn merge(&self, other: &Self) -> Result<Self, RegistryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Reject,
    /// Keep the existing item.
    Skip,
    /// Replace the existing item in place.
    Overwrite,
    /// Replace the existing item with the average of both.
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Skipped,
    Overwritten,
    Averaged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsList<T> {
    items: Vec<T>,
}

impl<T> Default for SettingsList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

pub type PeakScoringModelList = SettingsList<PeakScoringModel>;

impl<T: Named> SettingsList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|x| x.name()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|x| x.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.position(name).map(|i| &self.items[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn conflict(name: &str) -> RegistryError {
        RegistryError::NameConflict {
            kind: T::KIND,
            name: name.to_string(),
        }
    }

    fn not_found(name: &str) -> RegistryError {
        RegistryError::NotFound {
            kind: T::KIND,
            name: name.to_string(),
        }
    }

    pub fn add(&mut self, item: T, policy: ConflictPolicy) -> Result<AddOutcome, RegistryError>
    where
        T: Mergeable,
    {
        let Some(i) = self.position(item.name()) else {
            self.items.push(item);
            return Ok(AddOutcome::Added);
        };
        debug!("Name {} already in the list, policy {:?}", item.name(), policy);
        match policy {
            ConflictPolicy::Reject => Err(Self::conflict(item.name())),
            ConflictPolicy::Skip => Ok(AddOutcome::Skipped),
            ConflictPolicy::Overwrite => {
                self.items[i] = item;
                Ok(AddOutcome::Overwritten)
            }
            ConflictPolicy::Average => {
                self.items[i] = self.items[i].merge(&item)?;
                Ok(AddOutcome::Averaged)
            }
        }
    }

    /// Swap the item called `old_name` for `item`, keeping its position.
    /// `item` may carry a new name as long as no other item uses it.
    pub fn replace(&mut self, old_name: &str, item: T) -> Result<(), RegistryError> {
        let i = self.position(old_name).ok_or_else(|| Self::not_found(old_name))?;
        if let Some(j) = self.position(item.name()) {
            if j != i {
                return Err(Self::conflict(item.name()));
            }
        }
        self.items[i] = item;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<T, RegistryError> {
        let i = self.position(name).ok_or_else(|| Self::not_found(name))?;
        Ok(self.items.remove(i))
    }
}

impl<T: Stored> SettingsList<T> {
    /// Build a list from stored records, refusing repeated names.
    pub fn from_records(records: Vec<T::Record>) -> Result<Self, PeakScoringError> {
        let mut list = Self::default();
        for record in records {
            let item = T::from_record(record)?;
            if list.contains(item.name()) {
                return Err(Self::conflict(item.name()).into());
            }
            list.items.push(item);
        }
        Ok(list)
    }

    pub fn to_records(&self) -> Vec<T::Record> {
        self.items.iter().map(|x| x.to_record()).collect()
    }

    /// Read a list from a JSON file. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self, PeakScoringError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| PeakScoringError::Io {
            source: e,
            path: Some(path.to_path_buf()),
        })?;
        let records: Vec<T::Record> = serde_json::from_str(&contents)?;
        let list = Self::from_records(records)?;
        info!("Loaded {} {}s from {}", list.len(), T::KIND, path.display());
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> Result<(), PeakScoringError> {
        let contents = serde_json::to_string_pretty(&self.to_records())?;
        std::fs::write(path, contents).map_err(|e| PeakScoringError::Io {
            source: e,
            path: Some(path.to_path_buf()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Setting {
        name: String,
        value: f64,
    }

    impl Named for Setting {
        const KIND: &'static str = "setting";

        fn name(&self) -> &str {
            &self.name
        }
    }

    impl Stored for Setting {
        type Record = Self;

        fn to_record(&self) -> Self {
            self.clone()
        }

        fn from_record(record: Self) -> Result<Self, PeakScoringError> {
            Ok(record)
        }
    }

    impl Mergeable for Setting {
        fn merge(&self, other: &Self) -> Result<Self, RegistryError> {
            Ok(Self {
                name: self.name.clone(),
                value: (self.value + other.value) / 2.0,
            })
        }
    }

    fn setting(name: &str, value: f64) -> Setting {
        Setting {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_conflict_policies() {
        let mut list = SettingsList::new();
        assert_eq!(
            list.add(setting("a", 1.0), ConflictPolicy::Reject),
            Ok(AddOutcome::Added)
        );
        list.add(setting("b", 5.0), ConflictPolicy::Reject).unwrap();

        let err = list.add(setting("a", 3.0), ConflictPolicy::Reject).unwrap_err();
        assert_eq!(err.to_string(), "The setting a already exists");

        assert_eq!(
            list.add(setting("a", 3.0), ConflictPolicy::Skip),
            Ok(AddOutcome::Skipped)
        );
        assert_eq!(list.get("a").unwrap().value, 1.0);

        assert_eq!(
            list.add(setting("a", 3.0), ConflictPolicy::Average),
            Ok(AddOutcome::Averaged)
        );
        assert_eq!(list.get("a").unwrap().value, 2.0);

        assert_eq!(
            list.add(setting("a", 7.0), ConflictPolicy::Overwrite),
            Ok(AddOutcome::Overwritten)
        );
        assert_eq!(list.get("a").unwrap().value, 7.0);
        assert_eq!(list.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_replace_and_remove() {
        let mut list = SettingsList::new();
        list.add(setting("a", 1.0), ConflictPolicy::Reject).unwrap();
        list.add(setting("b", 2.0), ConflictPolicy::Reject).unwrap();

        list.replace("a", setting("c", 3.0)).unwrap();
        assert_eq!(list.names(), vec!["c", "b"]);
        assert!(matches!(
            list.replace("c", setting("b", 0.0)),
            Err(RegistryError::NameConflict { .. })
        ));
        assert!(matches!(
            list.replace("zz", setting("zz", 0.0)),
            Err(RegistryError::NotFound { .. })
        ));

        assert_eq!(list.remove("b").unwrap().value, 2.0);
        assert!(!list.contains("b"));
        assert!(list.remove("b").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("peakscore_registry_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");

        let mut list = SettingsList::new();
        list.add(setting("a", 1.5), ConflictPolicy::Reject).unwrap();
        list.save(&path).unwrap();
        let loaded: SettingsList<Setting> = SettingsList::load(&path).unwrap();
        assert_eq!(loaded, list);

        let missing: SettingsList<Setting> = SettingsList::load(&dir.join("missing.json")).unwrap();
        assert!(missing.is_empty());

        let repeated = dir.join("repeated.json");
        std::fs::write(
            &repeated,
            r#"[{"name": "a", "value": 1.0}, {"name": "a", "value": 2.0}]"#,
        )
        .unwrap();
        let err = SettingsList::<Setting>::load(&repeated).unwrap_err();
        assert!(matches!(
            err,
            PeakScoringError::RegistryError(RegistryError::NameConflict { .. })
        ));
        assert_eq!(err.to_string(), "The setting a already exists");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
