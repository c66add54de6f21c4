//! Persisted cluster settings.
//!
//! The settings file is a flat JSON object shared with other writers (the UI
//! stores its own keys next to ours), so every write is read-merge-write and
//! unknown keys survive untouched. Keys are decoded one at a time: a single
//! malformed value is reported and skipped without discarding its neighbours.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Settings file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// A key of the settings file owned by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    Suspension,
    Exhaust,
    Odometer,
    Trip,
}

impl SettingsKey {
    pub const ALL: [SettingsKey; 4] = [
        SettingsKey::Suspension,
        SettingsKey::Exhaust,
        SettingsKey::Odometer,
        SettingsKey::Trip,
    ];

    /// Name of the key in the JSON object.
    pub fn name(self) -> &'static str {
        match self {
            SettingsKey::Suspension => "suspension",
            SettingsKey::Exhaust => "exhaust",
            SettingsKey::Odometer => "odometer",
            SettingsKey::Trip => "trip",
        }
    }
}

/// Keys owned by the cluster. A `None` field is absent from the file, or
/// left alone when used as a merge patch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension: Option<[i32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaust: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odometer: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip: Option<f64>,
}

impl PersistedSettings {
    pub fn trip(km: f64) -> Self {
        Self {
            trip: Some(km),
            ..Self::default()
        }
    }

    pub fn odometer(km: f64) -> Self {
        Self {
            odometer: Some(km),
            ..Self::default()
        }
    }

    /// Overwrite every field that `patch` sets.
    pub fn apply(&mut self, patch: &PersistedSettings) {
        if patch.suspension.is_some() {
            self.suspension = patch.suspension;
        }
        if patch.exhaust.is_some() {
            self.exhaust = patch.exhaust;
        }
        if patch.odometer.is_some() {
            self.odometer = patch.odometer;
        }
        if patch.trip.is_some() {
            self.trip = patch.trip;
        }
    }
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadedSettings {
    /// Every key that decoded cleanly.
    pub settings: PersistedSettings,
    /// Keys present in the source whose value could not be used.
    pub rejected: Vec<SettingsKey>,
}

impl LoadedSettings {
    pub fn is_rejected(&self, key: SettingsKey) -> bool {
        self.rejected.contains(&key)
    }
}

impl From<PersistedSettings> for LoadedSettings {
    fn from(settings: PersistedSettings) -> Self {
        Self {
            settings,
            rejected: Vec::new(),
        }
    }
}

/// Storage backend for [`PersistedSettings`].
pub trait SettingsStore: Send + Sync {
    /// Read the stored settings; `Ok(None)` when nothing was ever stored.
    fn load(&self) -> SettingsResult<Option<LoadedSettings>>;

    /// Write the fields `patch` sets, keeping everything else.
    fn merge(&self, patch: &PersistedSettings) -> SettingsResult<()>;
}

/// JSON file on disk.
///
/// Merges through one instance are serialized, and every write goes through
/// its own temporary file in the target directory before an atomic rename.
#[derive(Debug)]
pub struct JsonSettingsFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_object(&self) -> SettingsResult<Option<Map<String, Value>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        let value: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        match value {
            Value::Object(map) => Ok(Some(map)),
            other => Err(SettingsError::Parse {
                path: self.path.clone(),
                source: serde::de::Error::custom(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )),
            }),
        }
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn write_atomically(&self, content: &str) -> SettingsResult<()> {
        let dir = self.directory();
        fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        Ok(())
    }
}

fn decode_key<T: DeserializeOwned>(
    map: &Map<String, Value>,
    key: SettingsKey,
    rejected: &mut Vec<SettingsKey>,
) -> Option<T> {
    let value = map.get(key.name())?;
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(key = key.name(), error = %e, "Ignoring malformed settings value");
            rejected.push(key);
            None
        }
    }
}

fn decode_distance(
    map: &Map<String, Value>,
    key: SettingsKey,
    rejected: &mut Vec<SettingsKey>,
) -> Option<f64> {
    let km = decode_key::<f64>(map, key, rejected)?;
    if km.is_finite() && km >= 0.0 {
        Some(km)
    } else {
        warn!(key = key.name(), km, "Ignoring negative distance in settings");
        rejected.push(key);
        None
    }
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

impl SettingsStore for JsonSettingsFile {
    fn load(&self) -> SettingsResult<Option<LoadedSettings>> {
        let Some(map) = self.read_object()? else {
            return Ok(None);
        };
        let mut rejected = Vec::new();
        let settings = PersistedSettings {
            suspension: decode_key(&map, SettingsKey::Suspension, &mut rejected),
            exhaust: decode_key(&map, SettingsKey::Exhaust, &mut rejected),
            odometer: decode_distance(&map, SettingsKey::Odometer, &mut rejected),
            trip: decode_distance(&map, SettingsKey::Trip, &mut rejected),
        };
        Ok(Some(LoadedSettings { settings, rejected }))
    }

    fn merge(&self, patch: &PersistedSettings) -> SettingsResult<()> {
        let _serialized = self.write_lock.lock();
        let mut root = self.read_object()?.unwrap_or_default();

        if let Value::Object(fields) = serde_json::to_value(patch)? {
            for (key, value) in fields {
                root.insert(key, value);
            }
        }

        let content = serde_json::to_string_pretty(&Value::Object(root))?;
        self.write_atomically(&content)?;

        debug!(path = %self.path.display(), "Settings merged");
        Ok(())
    }
}

/// In-memory settings, for tests and demo runs without a writable disk.
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    stored: Option<PersistedSettings>,
    writes: usize,
    fail_writes: bool,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(settings: PersistedSettings) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                stored: Some(settings),
                ..MemoryInner::default()
            }),
        }
    }

    /// Make subsequent merges fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Number of successful merges so far.
    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    pub fn stored(&self) -> Option<PersistedSettings> {
        self.inner.lock().stored
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self) -> SettingsResult<Option<LoadedSettings>> {
        Ok(self.inner.lock().stored.map(LoadedSettings::from))
    }

    fn merge(&self, patch: &PersistedSettings) -> SettingsResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(SettingsError::Io {
                path: PathBuf::from("<memory>"),
                source: io::Error::other("writes disabled"),
            });
        }
        inner.stored.get_or_insert_with(PersistedSettings::default).apply(patch);
        inner.writes += 1;
        Ok(())
    }
}
