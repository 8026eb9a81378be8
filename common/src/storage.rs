//! Device-local key-value storage port.
//!
//! Every store in this crate takes a `KeyValueStore` by injection instead of
//! reaching for ambient global storage. `MemoryStore` is the in-memory
//! implementation used by tests; `FileStore` persists the whole map as one
//! JSON object on disk.
//!
//! Reads through `read_list` never fail: an absent key is an empty list, and
//! corrupt data is logged and treated as empty. Writers go through
//! `StoredList`, which carries entries it cannot parse back to storage
//! untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub const CUSTOM_PRODUCTS_KEY: &str = "apex_custom_products";
pub const CUSTOM_CATEGORIES_KEY: &str = "apex_custom_categories";
pub const ENQUIRIES_KEY: &str = "apex_enquiries";
pub const VISIT_LOG_KEY: &str = "apex_visitor_logs";
pub const VISITOR_ID_KEY: &str = "apex_visitor_id";
pub const VISIT_COUNT_KEY: &str = "apex_visit_count";
pub const VISITOR_SESSION_KEY: &str = "apex_visitor_session";
pub const ADMIN_SESSION_KEY: &str = "apex_admin_session";
pub const ADMIN_EXPIRY_KEY: &str = "apex_admin_expiry";

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing {key}")]
    QuotaExceeded { key: String },
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// String-keyed persistent storage scoped to one device.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-memory store with an optional byte quota on the total stored size.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota_bytes: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            if self.used_bytes_without(key) + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file. The file is re-written on every
/// mutation; a missing file is an empty store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    /// Like `open`, but a corrupt file is logged and read as an empty store.
    /// The file itself is left alone until the next write.
    pub fn open_or_empty(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        match Self::open(path) {
            Err(StorageError::Corrupt(reason)) => {
                warn!("Ignoring unreadable store, starting empty: {reason}");
                Ok(Self {
                    path: path.to_path_buf(),
                    entries: BTreeMap::new(),
                })
            }
            other => other,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            self.restore(key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush() {
            self.restore(key, Some(previous));
            return Err(e);
        }
        Ok(())
    }
}

impl FileStore {
    /// Undo an in-memory change whose flush failed.
    fn restore(&mut self, key: &str, previous: Option<String>) {
        match previous {
            Some(value) => self.entries.insert(key.to_string(), value),
            None => self.entries.remove(key),
        };
    }
}

/// One element of a stored list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum StoredEntry<T> {
    Parsed(T),
    /// Did not parse as `T`; written back exactly as read.
    Unparsed(Value),
}

/// A stored JSON list loaded for read-modify-write.
///
/// Elements that do not parse as `T` stay in their position and are saved
/// back unchanged, so editing one record never loses another. They count
/// towards `len` and `truncate` but are invisible to the item accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredList<T> {
    entries: Vec<StoredEntry<T>>,
}

impl<T> Default for StoredList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: DeserializeOwned> StoredList<T> {
    /// Absent → empty. Backend failure or a payload that is not a JSON
    /// array → logged, empty.
    pub fn load<S>(store: &S, key: &str) -> Self
    where
        S: KeyValueStore + ?Sized,
    {
        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::default(),
            Err(e) => {
                warn!("Error reading {key}: {e}");
                return Self::default();
            }
        };

        let items: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                warn!("Expected a list under {key}, found {}", json_kind(&other));
                return Self::default();
            }
            Err(e) => {
                warn!("Corrupt JSON under {key}: {e}");
                return Self::default();
            }
        };

        let entries = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match T::deserialize(&item) {
                Ok(parsed) => StoredEntry::Parsed(parsed),
                Err(e) => {
                    warn!("Unreadable entry {idx} under {key}: {e}");
                    StoredEntry::Unparsed(item)
                }
            })
            .collect();
        Self { entries }
    }
}

impl<T: Serialize> StoredList<T> {
    pub fn save<S>(&self, store: &mut S, key: &str) -> Result<(), StorageError>
    where
        S: KeyValueStore + ?Sized,
    {
        write_list(store, key, &self.entries)
    }
}

impl<T> StoredList<T> {
    /// Every stored element, parsed or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unparsed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, StoredEntry::Unparsed(_)))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|e| match e {
            StoredEntry::Parsed(item) => Some(item),
            StoredEntry::Unparsed(_) => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().filter_map(|e| match e {
            StoredEntry::Parsed(item) => Some(item),
            StoredEntry::Unparsed(_) => None,
        })
    }

    pub fn push_front(&mut self, item: T) {
        self.entries.insert(0, StoredEntry::Parsed(item));
    }

    pub fn push_back(&mut self, item: T) {
        self.entries.push(StoredEntry::Parsed(item));
    }

    /// Keep the first `len` elements, parsed or not.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Drop parsed items rejected by `keep`. Returns how many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| match e {
            StoredEntry::Parsed(item) => keep(item),
            StoredEntry::Unparsed(_) => true,
        });
        before - self.entries.len()
    }

    pub fn into_parsed(self) -> Vec<T> {
        self.entries
            .into_iter()
            .filter_map(|e| match e {
                StoredEntry::Parsed(item) => Some(item),
                StoredEntry::Unparsed(_) => None,
            })
            .collect()
    }
}

/// Read a JSON list stored under `key`.
///
/// Absent → empty. Backend failure or a non-array payload → logged, empty.
/// Elements that do not parse as `T` are skipped individually.
pub fn read_list<T, S>(store: &S, key: &str) -> Vec<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    StoredList::load(store, key).into_parsed()
}

/// Serialize `items` as a JSON list under `key`.
pub fn write_list<T, S>(store: &mut S, key: &str, items: &[T]) -> Result<(), StorageError>
where
    T: Serialize,
    S: KeyValueStore + ?Sized,
{
    let text = serde_json::to_string(items).map_err(|e| StorageError::Corrupt(e.to_string()))?;
    store.set(key, &text)
}

/// Read a plain string value, logging and ignoring backend errors.
pub fn read_string<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!("Error reading {key}: {e}");
            None
        }
    }
}

/// Offset of the locale timestamps older records carry (Asia/Kolkata).
const LOCALE_TIMESTAMP_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

const LOCALE_TIMESTAMP_FORMATS: &[&str] = &[
    "%d/%m/%Y, %I:%M:%S %p",
    "%d/%m/%Y, %H:%M:%S",
    "%d/%m/%Y %I:%M:%S %p",
];

/// Parse a stored timestamp: RFC 3339, or the `en-IN` locale form
/// (`10/6/2024, 5:30:00 pm`) read as India Standard Time.
pub fn parse_stored_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let upper = raw.to_ascii_uppercase();
    let naive = LOCALE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&upper, fmt).ok())?;
    let offset = FixedOffset::east_opt(LOCALE_TIMESTAMP_OFFSET_SECS)?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
}

/// `deserialize_with` helper for record timestamps; see `parse_stored_timestamp`.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_stored_timestamp(&raw)
        .ok_or_else(|| D::Error::custom(format!("unrecognised timestamp '{raw}'")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
