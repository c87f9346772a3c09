use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::Location;

/// Why a single location record was rejected.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LocationError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field 'name' is empty")]
    EmptyName,
    #[error("field '{field}' is not a finite number: {value}")]
    InvalidCoordinate { field: &'static str, value: String },
}

/// File extensions the catalogue reads.
pub const CATALOGUE_EXTENSIONS: [&str; 2] = ["csv", "json"];

/// In-memory location catalogue backed by a directory of catalogue files.
///
/// A `*.json` file holds an array of `{name, details, lat, lon}` records; a
/// `*.csv` file has a header row naming the same columns. Names are unique
/// case-insensitively; the first occurrence wins, with files read in
/// file-name order.
pub struct LocationStore {
    dir: PathBuf,
    locations: Vec<Location>,
    names: HashSet<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl LocationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locations: Vec::new(),
            names: HashSet::new(),
            loaded_at: None,
        }
    }

    /// Create a store and load everything currently in `dir`.
    pub fn load_dir(dir: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(dir);
        store.reload();
        store
    }

    /// Re-read the directory, replacing the in-memory list. Returns the number
    /// of locations loaded.
    pub fn reload(&mut self) -> usize {
        self.locations.clear();
        self.names.clear();
        self.loaded_at = Some(Utc::now());

        if !self.dir.exists() {
            warn!(dir = %self.dir.display(), "locations directory does not exist");
            return 0;
        }

        let files = match catalogue_files(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.dir.display(), "failed to list locations: {e}");
                return 0;
            }
        };

        for path in files {
            self.load_file(&path);
        }

        info!(
            dir = %self.dir.display(),
            count = self.locations.len(),
            "loaded locations from disk"
        );
        self.locations.len()
    }

    fn load_file(&mut self, path: &Path) {
        let records = if has_extension(path, "csv") {
            csv_records(path)
        } else {
            json_records(path)
        };
        let Some(records) = records else {
            return;
        };

        for (index, record) in records.iter().enumerate() {
            match parse_record(record) {
                Ok(location) => {
                    self.insert(location);
                }
                Err(e) => warn!(path = %path.display(), index, "skipping invalid location: {e}"),
            }
        }
    }

    /// Add a location unless one with the same name (ignoring case) exists.
    pub fn insert(&mut self, location: Location) -> bool {
        if !self.names.insert(location.name.to_lowercase()) {
            return false;
        }
        self.locations.push(location);
        true
    }

    /// Clear the catalogue and delete its catalogue files. Returns how many
    /// files were removed.
    pub fn reset(&mut self) -> anyhow::Result<usize> {
        self.locations.clear();
        self.names.clear();
        self.loaded_at = Some(Utc::now());

        if !self.dir.exists() {
            return Ok(0);
        }

        let files = catalogue_files(&self.dir)?;
        for path in &files {
            std::fs::remove_file(path)
                .map_err(|e| anyhow::anyhow!("failed to remove {}: {e}", path.display()))?;
        }
        info!(dir = %self.dir.display(), removed = files.len(), "locations reset");
        Ok(files.len())
    }

    pub fn all(&self) -> &[Location] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Locations ranked by how many query terms appear in their name or
    /// details. Terms are lowercase alphanumeric words of three or more
    /// characters. Locations matching no term are left out; ties keep
    /// catalogue order.
    pub fn relevant(&self, query: &str, top_k: usize) -> Vec<&Location> {
        let terms = query_terms(query);
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Location)> = self
            .locations
            .iter()
            .filter_map(|location| {
                let haystack = format!("{} {}", location.name, location.details).to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score > 0).then_some((score, location))
            })
            .collect();

        // Stable sort keeps catalogue order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(top_k).map(|(_, l)| l).collect()
    }
}

/// Lowercase alphanumeric words of three or more characters, deduplicated.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < 3 {
            continue;
        }
        let word = word.to_lowercase();
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

fn json_records(path: &Path) -> Option<Vec<Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), "failed to read locations file: {e}");
            return None;
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(records)) => Some(records),
        Ok(_) => {
            warn!(path = %path.display(), "locations file is not a JSON array");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), "invalid locations JSON: {e}");
            None
        }
    }
}

/// Each CSV row becomes a JSON object keyed by the header row, so both
/// formats share [`parse_record`]. Unreadable rows are skipped.
fn csv_records(path: &Path) -> Option<Vec<Value>> {
    let mut reader = match csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
    {
        Ok(r) => r,
        Err(e) => {
            warn!(path = %path.display(), "failed to read locations file: {e}");
            return None;
        }
    };

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<HashMap<String, String>>().enumerate() {
        match row {
            Ok(row) => records.push(Value::Object(
                row.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
            )),
            Err(e) => warn!(path = %path.display(), index, "skipping unreadable CSV row: {e}"),
        }
    }
    Some(records)
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// Whether a file name has one of the [`CATALOGUE_EXTENSIONS`].
pub fn is_catalogue_file(path: &Path) -> bool {
    CATALOGUE_EXTENSIONS
        .iter()
        .any(|ext| has_extension(path, ext))
}

fn catalogue_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_catalogue_file(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Parse one record. Coordinates may be numbers or numeric strings, since
/// catalogues are often exported from spreadsheets.
pub fn parse_record(record: &Value) -> Result<Location, LocationError> {
    let object = record.as_object().ok_or(LocationError::NotAnObject)?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or(LocationError::MissingField("name"))?
        .trim();
    if name.is_empty() {
        return Err(LocationError::EmptyName);
    }

    let details = object
        .get("details")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim();

    Ok(Location {
        name: name.to_string(),
        details: details.to_string(),
        lat: coordinate(object.get("lat"), "lat")?,
        lon: coordinate(object.get("lon"), "lon")?,
    })
}

fn coordinate(value: Option<&Value>, field: &'static str) -> Result<f64, LocationError> {
    let value = value.ok_or(LocationError::MissingField(field))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| LocationError::InvalidCoordinate {
            field,
            value: value.to_string(),
        })
}
