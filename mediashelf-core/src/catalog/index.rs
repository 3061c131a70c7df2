//! Persisted collection index (`db.json`) and its record type.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::IndexError;

/// One entry per media file in a collection.
///
/// Durations are serialized as strings for compatibility with existing
/// consumers of `db.json`. Fields this crate does not know about (curated
/// values such as `coverOffset`) are kept in `extra` and written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// On-disk file name; unique within an index.
    pub filename: String,
    /// Display label, curated or defaulted from the file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whole seconds, as a decimal string.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_in_seconds: Option<String>,
    /// `MM:SS` or `HH:MM:SS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_display: Option<String>,
    /// Size in MiB with two decimals.
    #[serde(
        default,
        rename = "sizeMB",
        skip_serializing_if = "Option::is_none"
    )]
    pub size_mb: Option<String>,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssetRecord {
    /// Bare record for a newly discovered file.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            title: None,
            duration_in_seconds: None,
            duration_display: None,
            size_mb: None,
            extra: Map::new(),
        }
    }

    /// A duration counts as known once a positive value was recorded.
    pub fn has_duration(&self) -> bool {
        self.duration_in_seconds
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .is_some_and(|secs| secs > 0)
    }

    /// Record a probed duration, rounding half to even.
    pub fn set_duration(&mut self, seconds: f64) {
        let rounded = seconds.round_ties_even().max(0.0) as u64;
        self.duration_in_seconds = Some(rounded.to_string());
        self.duration_display = Some(format_duration(rounded));
    }

    /// Record the current file size.
    pub fn set_size(&mut self, bytes: u64) {
        self.size_mb = Some(format_size_mb(bytes));
    }
}

/// Hand-edited indexes sometimes carry the duration as a JSON number.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw)),
        Some(Value::Number(num)) => Ok(Some(match num.as_f64() {
            Some(secs) if num.is_f64() => (secs.round_ties_even() as i64).to_string(),
            _ => num.to_string(),
        })),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected duration string, found {other}"
        ))),
    }
}

/// The document persisted per collection variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionIndex {
    /// Fixed description of the field conventions.
    #[serde(default)]
    pub notes: String,
    /// Optional display hint for page authors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<String>,
    /// Records ordered by filename.
    #[serde(default)]
    pub list: Vec<AssetRecord>,
}

impl CollectionIndex {
    /// Lookup of prior records by their natural key.
    ///
    /// A duplicated filename in a hand-edited index resolves to its first
    /// occurrence.
    pub fn by_filename(&self) -> HashMap<&str, &AssetRecord> {
        let mut lookup = HashMap::with_capacity(self.list.len());
        for record in &self.list {
            lookup.entry(record.filename.as_str()).or_insert(record);
        }
        lookup
    }

    /// Two-space indented JSON with non-ASCII text left unescaped.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, IndexError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// How the prior index was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorIndex {
    /// No index existed yet.
    Missing,
    /// Parsed; records that did not fit the model were dropped one by one.
    Loaded,
    /// Unreadable, not JSON, or not an object; treated as empty.
    Discarded,
}

/// Load the index at `path`, degrading to an empty index when it is
/// missing or corrupt.
pub async fn load_index(path: &Path) -> (CollectionIndex, PriorIndex) {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no prior index");
            return (CollectionIndex::default(), PriorIndex::Missing);
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "prior index unreadable; starting from an empty index"
            );
            return (CollectionIndex::default(), PriorIndex::Discarded);
        }
    };

    let document = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(document)) => document,
        Ok(_) => {
            warn!(
                path = %path.display(),
                "prior index is not a JSON object; starting from an empty index"
            );
            return (CollectionIndex::default(), PriorIndex::Discarded);
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "prior index failed to parse; starting from an empty index"
            );
            return (CollectionIndex::default(), PriorIndex::Discarded);
        }
    };

    (index_from_document(path, document), PriorIndex::Loaded)
}

/// Salvage what a parsed document holds, one record at a time.
///
/// A record that does not fit [`AssetRecord`] is dropped on its own; the
/// rest of the list keeps its curated fields.
fn index_from_document(path: &Path, mut document: Map<String, Value>) -> CollectionIndex {
    let notes = match document.remove("notes") {
        Some(Value::String(notes)) => notes,
        _ => String::new(),
    };
    let hints = match document.remove("hints") {
        Some(Value::String(hints)) => Some(hints),
        _ => None,
    };
    let entries = match document.remove("list") {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(
                path = %path.display(),
                found = %other,
                "prior index list is not an array; ignoring it"
            );
            Vec::new()
        }
    };

    let mut list = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<AssetRecord>(entry) {
            Ok(record) => list.push(record),
            Err(err) => warn!(
                path = %path.display(),
                position,
                error = %err,
                "skipping malformed record in prior index"
            ),
        }
    }

    CollectionIndex { notes, hints, list }
}

/// Replace the index at `path` with `index`.
///
/// The document is written to a temporary sibling first and renamed over
/// the target, so readers never observe a partially written file.
pub async fn persist_index(
    path: &Path,
    index: &CollectionIndex,
) -> Result<(), IndexError> {
    let bytes = index.to_pretty_json()?;
    let staging = staging_path(path);

    if let Err(err) = tokio::fs::write(&staging, &bytes).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(err.into());
    }
    if let Err(err) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(err.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// `MM:SS`, or `HH:MM:SS` from one hour up.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Bytes as MiB with two decimals.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn duration_rounds_and_formats() {
        let mut record = AssetRecord::new("a.mp4");
        record.set_duration(90.4);
        assert_eq!(record.duration_in_seconds.as_deref(), Some("90"));
        assert_eq!(record.duration_display.as_deref(), Some("01:30"));

        record.set_duration(90.5);
        assert_eq!(record.duration_in_seconds.as_deref(), Some("90"));

        record.set_duration(91.5);
        assert_eq!(record.duration_in_seconds.as_deref(), Some("92"));

        record.set_duration(0.5);
        assert_eq!(record.duration_in_seconds.as_deref(), Some("0"));

        record.set_duration(59.6);
        assert_eq!(record.duration_in_seconds.as_deref(), Some("60"));
        assert_eq!(record.duration_display.as_deref(), Some("01:00"));
    }

    #[test]
    fn long_durations_include_hours() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(3599), "59:59");
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(3723), "01:02:03");
    }

    #[test]
    fn size_is_reported_in_mebibytes() {
        assert_eq!(format_size_mb(0), "0.00");
        assert_eq!(format_size_mb(1024 * 1024), "1.00");
        assert_eq!(format_size_mb(1_572_864), "1.50");
    }

    #[test]
    fn zero_duration_is_not_known() {
        let mut record = AssetRecord::new("a.mp4");
        assert!(!record.has_duration());
        record.duration_in_seconds = Some("0".into());
        assert!(!record.has_duration());
        record.duration_in_seconds = Some("abc".into());
        assert!(!record.has_duration());
        record.duration_in_seconds = Some("12".into());
        assert!(record.has_duration());
    }

    #[test]
    fn wire_shape_keeps_strings_and_unknown_fields() {
        let raw = json!({
            "notes": "n",
            "list": [{
                "filename": "a.mp4",
                "title": "Custom Title",
                "durationInSeconds": "90",
                "durationDisplay": "01:30",
                "coverOffset": 12
            }]
        });
        let index: CollectionIndex = serde_json::from_value(raw).unwrap();
        let record = &index.list[0];
        assert_eq!(record.title.as_deref(), Some("Custom Title"));
        assert_eq!(record.extra.get("coverOffset"), Some(&json!(12)));

        let value = serde_json::to_value(&index).unwrap();
        assert_eq!(value["list"][0]["durationInSeconds"], json!("90"));
        assert_eq!(value["list"][0]["coverOffset"], json!(12));
        assert!(value.get("hints").is_none());
        assert!(value["list"][0].get("sizeMB").is_none());
    }

    #[test]
    fn numeric_duration_is_accepted() {
        let record: AssetRecord = serde_json::from_value(json!({
            "filename": "a.mp4",
            "durationInSeconds": 90
        }))
        .unwrap();
        assert_eq!(record.duration_in_seconds.as_deref(), Some("90"));
        assert!(record.has_duration());
    }

    #[test]
    fn non_ascii_titles_are_not_escaped() {
        let mut record = AssetRecord::new("lesson.mp4");
        record.title = Some("第一课".into());
        let index = CollectionIndex {
            notes: "n".into(),
            hints: None,
            list: vec![record],
        };
        let text = String::from_utf8(index.to_pretty_json().unwrap()).unwrap();
        assert!(text.contains("第一课"));
        assert!(text.contains("\n  \"list\""));
    }

    #[tokio::test]
    async fn corrupt_index_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let (index, prior) = load_index(&path).await;
        assert_eq!(prior, PriorIndex::Discarded);
        assert!(index.list.is_empty());

        let (_, prior) = load_index(&dir.path().join("absent.json")).await;
        assert_eq!(prior, PriorIndex::Missing);
    }

    #[tokio::test]
    async fn malformed_records_are_dropped_individually() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let raw = json!({
            "notes": "kept",
            "list": [
                { "filename": "a.mp4", "title": "Custom Title", "durationInSeconds": "90" },
                { "filename": "b.mp4", "durationDisplay": 60 },
                { "title": "no filename" },
                { "filename": "c.png", "sizeMB": 1.5 },
                { "filename": "d.mp4", "coverOffset": 3 }
            ]
        });
        tokio::fs::write(&path, serde_json::to_vec(&raw).unwrap())
            .await
            .unwrap();

        let (index, prior) = load_index(&path).await;
        assert_eq!(prior, PriorIndex::Loaded);
        assert_eq!(index.notes, "kept");
        let names: Vec<_> = index.list.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["a.mp4", "d.mp4"]);
        assert_eq!(index.list[0].title.as_deref(), Some("Custom Title"));
    }

    #[tokio::test]
    async fn null_or_foreign_list_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");

        tokio::fs::write(&path, br#"{"notes": "n", "list": null}"#).await.unwrap();
        let (index, prior) = load_index(&path).await;
        assert_eq!(prior, PriorIndex::Loaded);
        assert!(index.list.is_empty());

        tokio::fs::write(&path, b"[1, 2]").await.unwrap();
        let (_, prior) = load_index(&path).await;
        assert_eq!(prior, PriorIndex::Discarded);
    }

    #[test]
    fn numeric_duration_ties_round_to_even() {
        let record: AssetRecord = serde_json::from_value(json!({
            "filename": "a.mp4",
            "durationInSeconds": 90.5
        }))
        .unwrap();
        assert_eq!(record.duration_in_seconds.as_deref(), Some("90"));
    }

    #[tokio::test]
    async fn persist_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        tokio::fs::write(&path, b"stale contents that are longer").await.unwrap();

        let index = CollectionIndex {
            notes: "fresh".into(),
            hints: None,
            list: vec![AssetRecord::new("a.mp4")],
        };
        persist_index(&path, &index).await.unwrap();

        let (loaded, prior) = load_index(&path).await;
        assert_eq!(prior, PriorIndex::Loaded);
        assert_eq!(loaded, index);
        assert!(!dir.path().join("db.json.tmp").exists());
    }
}
