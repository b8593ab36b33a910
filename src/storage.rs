use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::calendar::parse_date_key;
use crate::colors::normalize_color;
use crate::domain::{
	CURRENT_SCHEMA_VERSION, DEFAULT_CHECK_IN_LEVELS, DEFAULT_GOAL_HOURS, DEFAULT_HOURS_PER_CHECK_IN,
	Project, ProjectStore, StoreHeader,
};

const PROJECTS_MARKER: &str = "\n=== PROJECTS ===\n";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to encode TOML header: {0}")]
	TomlEncode(#[from] toml::ser::Error),

	#[error("failed to encode JSONL project: {0}")]
	JsonEncode(#[from] serde_json::Error),

	#[error("store schema version {found} is newer than supported version {supported}")]
	UnsupportedVersion { found: u32, supported: u32 },
}

/// Schema upgrade steps; entry `n` lifts a raw project record from version `n`
/// to `n + 1`.
const UPGRADES: [fn(Value) -> Value; CURRENT_SCHEMA_VERSION as usize] = [upgrade_v0];

/// Loads a store, upgrading older layouts. A file that cannot be parsed at all
/// yields the starter projects; single bad records are skipped. A file written
/// by a newer schema is refused so it is never overwritten.
pub fn load_store(path: &Path, now: DateTime<Utc>) -> Result<ProjectStore, StorageError> {
	let raw = match fs::read_to_string(path) {
		Ok(content) => content,
		Err(err) if err.kind() == ErrorKind::NotFound => {
			info!(path = %path.display(), "store not found, starting with defaults");
			return Ok(ProjectStore::with_defaults(now));
		}
		Err(err) => return Err(StorageError::Io(err)),
	};

	if raw.trim().is_empty() {
		return Ok(ProjectStore::with_defaults(now));
	}

	match decode_store(&raw, now) {
		Ok(store) => Ok(store),
		Err(DecodeError::Unsupported(found)) => Err(StorageError::UnsupportedVersion {
			found,
			supported: CURRENT_SCHEMA_VERSION,
		}),
		Err(DecodeError::Unparsable(reason)) => {
			warn!(path = %path.display(), %reason, "store is unreadable, falling back to defaults");
			Ok(ProjectStore::with_defaults(now))
		}
	}
}

pub fn save_store(path: &Path, store: &ProjectStore) -> Result<(), StorageError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent)?;
		}
	}

	let header = toml::to_string_pretty(&store.header)?;
	let mut file = fs::File::create(path)?;
	file.write_all(header.as_bytes())?;
	file.write_all(PROJECTS_MARKER.as_bytes())?;

	for project in store.projects() {
		let line = serde_json::to_string(project)?;
		file.write_all(line.as_bytes())?;
		file.write_all(b"\n")?;
	}

	debug!(path = %path.display(), projects = store.projects().len(), "saved store");
	Ok(())
}

enum DecodeError {
	Unsupported(u32),
	Unparsable(String),
}

fn decode_store(raw: &str, now: DateTime<Utc>) -> Result<ProjectStore, DecodeError> {
	// Version 0 is the bare JSON array the browser build kept in local storage.
	if raw.trim_start().starts_with('[') {
		let records: Vec<Value> =
			serde_json::from_str(raw).map_err(|err| DecodeError::Unparsable(err.to_string()))?;
		let projects = upgrade_records(records, 0);
		info!(projects = projects.len(), "imported legacy project list");
		return Ok(ProjectStore::from_parts(StoreHeader::new(now), projects, now));
	}

	let (header_blob, projects_blob) = raw
		.split_once(PROJECTS_MARKER)
		.unwrap_or((raw, ""));
	let header: StoreHeader =
		toml::from_str(header_blob).map_err(|err| DecodeError::Unparsable(err.to_string()))?;
	if header.schema_version > CURRENT_SCHEMA_VERSION {
		return Err(DecodeError::Unsupported(header.schema_version));
	}

	let mut records = Vec::new();
	for (index, line) in projects_blob.lines().enumerate() {
		if line.trim().is_empty() {
			continue;
		}
		match serde_json::from_str::<Value>(line) {
			Ok(record) => records.push(record),
			Err(err) => warn!(line = index + 1, %err, "skipping unreadable project line"),
		}
	}

	let projects = upgrade_records(records, header.schema_version);
	Ok(ProjectStore::from_parts(header, projects, now))
}

fn upgrade_records(records: Vec<Value>, from_version: u32) -> Vec<Project> {
	records
		.into_iter()
		.filter_map(|record| {
			let upgraded = UPGRADES[from_version as usize..]
				.iter()
				.fold(record, |record, upgrade| upgrade(record));
			match serde_json::from_value::<Project>(backfill(upgraded)) {
				Ok(project) => Some(project),
				Err(err) => {
					warn!(%err, "skipping undecodable project record");
					None
				}
			}
		})
		.collect()
}

fn upgrade_v0(record: Value) -> Value {
	let Value::Object(mut fields) = record else {
		return record;
	};

	if let Some(Value::Object(logs)) = fields.get_mut("logs") {
		logs.retain(|_, count| count.as_i64().is_some_and(|value| value > 0));
	}
	if let Some(Value::Number(created_at)) = fields.get("createdAt") {
		if created_at.as_i64().is_none() {
			let millis = created_at.as_f64().unwrap_or_default() as i64;
			fields.insert("createdAt".to_string(), json!(millis));
		}
	}
	fields.remove("themeImage");

	Value::Object(fields)
}

fn backfill(record: Value) -> Value {
	let Value::Object(mut fields) = record else {
		return record;
	};

	set_default(&mut fields, "mode", json!("calendar"));
	set_default(&mut fields, "photos", json!([]));
	set_default(&mut fields, "logs", json!({}));
	set_default(&mut fields, "goalHours", json!(DEFAULT_GOAL_HOURS));
	set_default(&mut fields, "hoursPerCheckIn", json!(DEFAULT_HOURS_PER_CHECK_IN));
	set_default(&mut fields, "checkInShape", json!("square"));
	set_default(&mut fields, "photoAspectRatio", json!("1:1"));
	set_default(&mut fields, "createdAt", json!(0));
	set_default(&mut fields, "name", json!("Untitled"));

	if let Some(Value::Object(logs)) = fields.get_mut("logs") {
		logs.retain(|key, count| {
			let usable = parse_date_key(key).is_some() && count.as_u64().is_some_and(|value| value <= u64::from(u32::MAX));
			if !usable {
				warn!(%key, %count, "dropping unusable log entry");
			}
			usable
		});
	}

	let levels_are_valid = fields
		.get("checkInLevels")
		.and_then(Value::as_array)
		.is_some_and(|levels| levels.len() == DEFAULT_CHECK_IN_LEVELS.len() && levels.iter().all(Value::is_u64));
	if !levels_are_valid {
		fields.insert("checkInLevels".to_string(), json!(DEFAULT_CHECK_IN_LEVELS));
	}

	for (key, fallback) in [
		("goalHours", DEFAULT_GOAL_HOURS),
		("hoursPerCheckIn", DEFAULT_HOURS_PER_CHECK_IN),
	] {
		let usable = fields
			.get(key)
			.and_then(Value::as_f64)
			.is_some_and(|value| value.is_finite() && value > 0.0);
		if !usable {
			fields.insert(key.to_string(), json!(fallback));
		}
	}

	let color = fields
		.get("colorBase")
		.and_then(Value::as_str)
		.map(normalize_color)
		.unwrap_or_else(|| normalize_color(""));
	fields.insert("colorBase".to_string(), json!(color));

	if let Some(Value::Number(id)) = fields.get("id") {
		let id = id.to_string();
		fields.insert("id".to_string(), json!(id));
	}

	Value::Object(fields)
}

fn set_default(fields: &mut Map<String, Value>, key: &str, value: Value) {
	match fields.get(key) {
		Some(existing) if !existing.is_null() => {}
		_ => {
			fields.insert(key.to_string(), value);
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::{NaiveDate, TimeZone, Utc};
	use std::fs;
	use std::path::PathBuf;

	use crate::domain::{CheckInShape, ProjectMode, ProjectPatch, ProjectStore};

	use super::{StorageError, load_store, save_store};

	fn day(year: i32, month: u32, day: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
	}

	#[test]
	fn round_trips_toml_and_jsonl() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let mut store = ProjectStore::with_defaults(now);
		let project_id = store
			.create_project(
				ProjectPatch {
					name: Some("Climbing".to_string()),
					check_in_levels: Some([5, 10, 20, 40, 80]),
					check_in_shape: Some(CheckInShape::Circle),
					..ProjectPatch::default()
				},
				now,
			)
			.expect("project should be created")
			.id
			.clone();
		store.set_log_count(&project_id, day(2024, 2, 29), 7).expect("set should work");
		store.add_photo("2", "covers/dune.jpg".to_string()).expect("add should work");

		let path = temp_file("hour_tracker_storage_roundtrip.tracker");
		save_store(&path, &store).expect("save should succeed");
		let loaded = load_store(&path, now).expect("load should succeed");
		let _ = fs::remove_file(&path);

		assert_eq!(loaded.projects(), store.projects());
		assert_eq!(loaded.active_project_id(), Some(project_id.as_str()));
	}

	#[test]
	fn missing_file_starts_with_defaults() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let path = temp_file("hour_tracker_storage_missing.tracker");
		let _ = fs::remove_file(&path);
		let loaded = load_store(&path, now).expect("load should succeed");
		assert_eq!(loaded.projects().len(), 2);
		assert_eq!(loaded.active_project_id(), Some("1"));
	}

	#[test]
	fn garbage_falls_back_to_defaults() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let path = temp_file("hour_tracker_storage_garbage.tracker");
		fs::write(&path, "schema_version = \"oops\n{{{").expect("write should succeed");
		let loaded = load_store(&path, now).expect("garbage must not be fatal");
		let _ = fs::remove_file(&path);
		assert_eq!(loaded.projects().len(), 2);
		assert_eq!(loaded.projects()[0].name, "Be Happy");
	}

	#[test]
	fn upgrades_legacy_json_array() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let path = temp_file("hour_tracker_storage_legacy.tracker");
		let legacy = r##"[
			{"id":"abc","name":"Sketch","colorBase":"blue","goalHours":500,
			 "logs":{"2024-01-02":3,"2024-01-03":0},"createdAt":1700000000000},
			{"id":"def","name":"Album","mode":"gallery","colorBase":"#EC4899",
			 "goalHours":10000,"logs":{},"photos":["a.jpg"],"themeImage":"data:...",
			 "createdAt":1700000000001}
		]"##;
		fs::write(&path, legacy).expect("write should succeed");
		let loaded = load_store(&path, now).expect("load should succeed");
		let _ = fs::remove_file(&path);

		let sketch = loaded.project("abc").expect("legacy project kept");
		assert_eq!(sketch.mode, ProjectMode::Calendar);
		assert_eq!(sketch.color_base, "#3b82f6");
		assert_eq!(sketch.hours_per_check_in, 1.0);
		assert_eq!(sketch.check_in_levels, [1, 2, 3, 4, 5]);
		assert_eq!(sketch.check_in_shape, CheckInShape::Square);
		assert_eq!(sketch.count_on(day(2024, 1, 2)), 3);
		assert!(!sketch.logs.contains_key(&day(2024, 1, 3)));

		let album = loaded.project("def").expect("legacy project kept");
		assert_eq!(album.mode, ProjectMode::Gallery);
		assert_eq!(album.color_base, "#ec4899");
		assert_eq!(album.photos, vec!["a.jpg".to_string()]);
		assert_eq!(loaded.active_project_id(), Some("abc"));
	}

	#[test]
	fn backfills_fields_missing_from_current_records() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let path = temp_file("hour_tracker_storage_backfill.tracker");
		let content = concat!(
			"schema_version = 1\n",
			"created_at = \"2024-01-01T00:00:00Z\"\n",
			"active_project_id = \"gone\"\n",
			"\n=== PROJECTS ===\n",
			r##"{"id":"p1","name":"Run","mode":"calendar","colorBase":"#10b981","goalHours":0,"checkInLevels":[1,2],"logs":{"2024-02-01":2},"createdAt":1}"##,
			"\n",
		);
		fs::write(&path, content).expect("write should succeed");
		let loaded = load_store(&path, now).expect("load should succeed");
		let _ = fs::remove_file(&path);

		let run = loaded.project("p1").expect("record kept");
		assert_eq!(run.goal_hours, 10_000.0);
		assert_eq!(run.check_in_levels, [1, 2, 3, 4, 5]);
		assert!(run.photos.is_empty());
		assert_eq!(loaded.active_project_id(), Some("p1"));
	}

	#[test]
	fn refuses_newer_schema_and_leaves_file_alone() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let path = temp_file("hour_tracker_storage_future.tracker");
		let content = concat!(
			"schema_version = 2\n",
			"created_at = \"2024-01-01T00:00:00Z\"\n",
			"\n=== PROJECTS ===\n",
			r#"{"id":"mine","name":"Mine","logs":{}}"#,
			"\n",
		);
		fs::write(&path, content).expect("write should succeed");
		let result = load_store(&path, now);
		let on_disk = fs::read_to_string(&path).expect("file still readable");
		let _ = fs::remove_file(&path);

		assert!(matches!(
			result,
			Err(StorageError::UnsupportedVersion { found: 2, supported: 1 })
		));
		assert_eq!(on_disk, content);
	}

	#[test]
	fn skips_bad_records_and_keeps_the_rest() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let path = temp_file("hour_tracker_storage_partial.tracker");
		let legacy = r##"[
			{"id":"good","name":"Guitar","colorBase":"#10b981",
			 "logs":{"2023-02-28":2,"2023-02-29":1,"2023-3-1":4},"createdAt":1},
			{"name":"No id","logs":{}},
			"not a project"
		]"##;
		fs::write(&path, legacy).expect("write should succeed");
		let loaded = load_store(&path, now).expect("load should succeed");
		let _ = fs::remove_file(&path);

		assert_eq!(loaded.projects().len(), 1);
		let guitar = loaded.project("good").expect("good record kept");
		assert_eq!(guitar.count_on(day(2023, 2, 28)), 2);
		assert_eq!(guitar.logs.len(), 1);
	}

	#[test]
	fn skips_unreadable_lines_in_current_format() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let path = temp_file("hour_tracker_storage_bad_line.tracker");
		let content = concat!(
			"schema_version = 1\n",
			"created_at = \"2024-01-01T00:00:00Z\"\n",
			"active_project_id = \"p1\"\n",
			"\n=== PROJECTS ===\n",
			"{broken\n",
			r#"{"id":"p1","name":"Run","logs":{"2024-02-01":2},"createdAt":1}"#,
			"\n",
		);
		fs::write(&path, content).expect("write should succeed");
		let loaded = load_store(&path, now).expect("load should succeed");
		let _ = fs::remove_file(&path);

		assert_eq!(loaded.projects().len(), 1);
		assert_eq!(loaded.projects()[0].name, "Run");
	}

	#[test]
	fn read_errors_other_than_missing_are_reported() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let dir = temp_file("hour_tracker_storage_is_dir");
		fs::create_dir_all(&dir).expect("dir should be created");
		let result = load_store(&dir, now);
		let _ = fs::remove_dir_all(&dir);

		assert!(matches!(result, Err(StorageError::Io(_))));
	}

	fn temp_file(name: &str) -> PathBuf {
		let mut path = std::env::temp_dir();
		path.push(format!("{}_{}", name, std::process::id()));
		path
	}
}
