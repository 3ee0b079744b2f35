use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::models::customer::{DeliveryAddress, PaymentDetails};

pub const ADDRESS_KEY: &str = "address";
pub const PAYMENT_KEY: &str = "payment";
pub const DISMISSED_NOTICES_KEY: &str = "dismissed_notices";

/// Durable key-value store for customer preferences, one JSON document on disk.
pub struct LocalPreferenceStore {
    path: PathBuf,
    entries: DashMap<String, Value>,
    write_lock: Mutex<()>,
}

impl LocalPreferenceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let entries = DashMap::new();

        if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|err| {
                AppError::Preferences(format!("failed to read {}: {err}", path.display()))
            })?;

            if !raw.trim().is_empty() {
                let parsed: BTreeMap<String, Value> = serde_json::from_str(&raw).map_err(|err| {
                    AppError::Preferences(format!("failed to parse {}: {err}", path.display()))
                })?;
                for (key, value) in parsed {
                    entries.insert(key, value);
                }
            }
        }

        Ok(Self {
            path,
            entries,
            write_lock: Mutex::new(()),
        })
    }

    /// A stored value that no longer matches `T` reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.get(key)?.value().clone();

        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(key, error = %err, "ignoring malformed preference");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)
            .map_err(|err| AppError::Preferences(format!("failed to encode {key}: {err}")))?;

        self.update(|document| {
            document.insert(key.to_string(), value);
            true
        })
    }

    pub fn remove(&self, key: &str) -> Result<(), AppError> {
        self.update(|document| document.remove(key).is_some())
    }

    pub fn address(&self) -> Option<DeliveryAddress> {
        self.get(ADDRESS_KEY)
    }

    pub fn payment(&self) -> Option<PaymentDetails> {
        self.get(PAYMENT_KEY)
    }

    pub fn dismiss_notice(&self, notice_id: &str) -> Result<(), AppError> {
        self.update(|document| {
            let mut dismissed: Vec<String> = document
                .get(DISMISSED_NOTICES_KEY)
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_default();
            if dismissed.iter().any(|id| id == notice_id) {
                return false;
            }

            dismissed.push(notice_id.to_string());
            document.insert(DISMISSED_NOTICES_KEY.to_string(), Value::from(dismissed));
            true
        })
    }

    pub fn is_notice_dismissed(&self, notice_id: &str) -> bool {
        self.get::<Vec<String>>(DISMISSED_NOTICES_KEY)
            .is_some_and(|ids| ids.iter().any(|id| id == notice_id))
    }

    /// Applies `change` to a copy of the stored document under the writer
    /// lock. Memory is only updated once the document is on disk; `change`
    /// returns `false` when there is nothing to write.
    fn update<F>(&self, change: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut BTreeMap<String, Value>) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Preferences("preference writer poisoned".to_string()))?;

        let mut document: BTreeMap<String, Value> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        if !change(&mut document) {
            return Ok(());
        }

        self.write_document(&document)?;

        self.entries.retain(|key, _| document.contains_key(key));
        for (key, value) in document {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    fn write_document(&self, document: &BTreeMap<String, Value>) -> Result<(), AppError> {
        let body = serde_json::to_vec_pretty(document)
            .map_err(|err| AppError::Preferences(format!("failed to encode store: {err}")))?;

        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::Preferences(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|err| {
                AppError::Preferences(format!("failed to create {}: {err}", tmp.display()))
            })?;
            file.write_all(&body)
                .and_then(|()| file.sync_all())
                .map_err(|err| {
                    AppError::Preferences(format!("failed to write {}: {err}", tmp.display()))
                })?;
        }
        fs::rename(&tmp, &self.path).map_err(|err| {
            AppError::Preferences(format!("failed to replace {}: {err}", self.path.display()))
        })?;

        if let Some(Ok(dir)) = parent.map(fs::File::open) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            line1: "1 Main St".to_string(),
            line2: String::new(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip: "62701".to_string(),
        }
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/preferences.json");

        let store = LocalPreferenceStore::open(&path).unwrap();
        assert!(store.address().is_none());
        store.set(ADDRESS_KEY, &address()).unwrap();

        let reopened = LocalPreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.address(), Some(address()));
        assert!(reopened.payment().is_none());
    }

    #[test]
    fn malformed_entry_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, r#"{ "payment": "not an object" }"#).unwrap();

        let store = LocalPreferenceStore::open(&path).unwrap();
        assert!(store.payment().is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "{ nope").unwrap();

        assert!(matches!(
            LocalPreferenceStore::open(&path),
            Err(AppError::Preferences(_))
        ));
    }

    #[test]
    fn dismissed_notices_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPreferenceStore::open(dir.path().join("p.json")).unwrap();

        store.dismiss_notice("broadcast-7").unwrap();
        store.dismiss_notice("broadcast-7").unwrap();

        assert!(store.is_notice_dismissed("broadcast-7"));
        assert!(!store.is_notice_dismissed("broadcast-8"));
        assert_eq!(
            store.get::<Vec<String>>(DISMISSED_NOTICES_KEY).unwrap().len(),
            1
        );

        store.remove(DISMISSED_NOTICES_KEY).unwrap();
        assert!(!store.is_notice_dismissed("broadcast-7"));
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "plain file").unwrap();

        let store = LocalPreferenceStore::open(blocker.join("preferences.json")).unwrap();
        assert!(matches!(
            store.set(ADDRESS_KEY, &address()),
            Err(AppError::Preferences(_))
        ));
        assert!(store.address().is_none());
        assert!(store.dismiss_notice("broadcast-1").is_err());
        assert!(!store.is_notice_dismissed("broadcast-1"));
    }

    #[test]
    fn failed_remove_keeps_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs/preferences.json");
        let store = LocalPreferenceStore::open(&path).unwrap();
        store.set(ADDRESS_KEY, &address()).unwrap();

        // Swap the directory for a plain file so the next write fails.
        fs::remove_dir_all(dir.path().join("prefs")).unwrap();
        fs::write(dir.path().join("prefs"), "plain file").unwrap();

        assert!(store.remove(ADDRESS_KEY).is_err());
        assert_eq!(store.address(), Some(address()));
    }

    #[test]
    fn concurrent_dismissals_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPreferenceStore::open(dir.path().join("p.json")).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for round in 0..10 {
                        store
                            .dismiss_notice(&format!("notice-{worker}-{round}"))
                            .unwrap();
                    }
                });
            }
        });

        let dismissed: Vec<String> = store.get(DISMISSED_NOTICES_KEY).unwrap();
        assert_eq!(dismissed.len(), 80);

        let reopened = LocalPreferenceStore::open(dir.path().join("p.json")).unwrap();
        assert!(reopened.is_notice_dismissed("notice-7-9"));
        assert!(reopened.is_notice_dismissed("notice-0-0"));
    }
}
