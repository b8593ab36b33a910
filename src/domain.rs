use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::colors::{DEFAULT_COLOR, GRADE_COUNT, Rgb, levels_are_ascending, normalize_color, theme_rgb};

const ID_LEN: usize = 9;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_PROJECT_NAME: &str = "New Hobby";
pub const DEFAULT_GOAL_HOURS: f64 = 10_000.0;
pub const DEFAULT_HOURS_PER_CHECK_IN: f64 = 1.0;
pub const DEFAULT_CHECK_IN_LEVELS: [u32; GRADE_COUNT] = [1, 2, 3, 4, 5];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrackerError {
	#[error("project not found: {0}")]
	ProjectNotFound(String),

	#[error("cannot delete the last remaining project: {0}")]
	LastProject(String),

	#[error("photo index {index} is out of bounds ({len} photos)")]
	PhotoIndexOutOfBounds { index: usize, len: usize },

	#[error("{field} must be {expected}")]
	InvalidField {
		field: &'static str,
		expected: &'static str,
	},
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectMode {
	#[default]
	Calendar,
	Gallery,
}

impl ProjectMode {
	pub fn label(self) -> &'static str {
		match self {
			ProjectMode::Calendar => "calendar",
			ProjectMode::Gallery => "gallery",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckInShape {
	#[default]
	Square,
	Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhotoAspectRatio {
	#[default]
	#[serde(rename = "1:1")]
	Square,
	#[serde(rename = "16:9")]
	Wide,
	#[serde(rename = "9:16")]
	Tall,
	#[serde(rename = "4:3")]
	Classic,
	#[serde(rename = "3:4")]
	Portrait,
}

impl PhotoAspectRatio {
	pub fn label(self) -> &'static str {
		match self {
			PhotoAspectRatio::Square => "1:1",
			PhotoAspectRatio::Wide => "16:9",
			PhotoAspectRatio::Tall => "9:16",
			PhotoAspectRatio::Classic => "4:3",
			PhotoAspectRatio::Portrait => "3:4",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
	pub id: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub mode: ProjectMode,
	pub color_base: String,
	pub goal_hours: f64,
	pub hours_per_check_in: f64,
	pub check_in_levels: [u32; GRADE_COUNT],
	pub check_in_shape: CheckInShape,
	#[serde(with = "date_keys")]
	pub logs: BTreeMap<NaiveDate, u32>,
	pub photos: Vec<String>,
	pub photo_aspect_ratio: PhotoAspectRatio,
	pub created_at: i64,
}

impl Project {
	fn new(id: String, created_at: DateTime<Utc>) -> Self {
		Self {
			id,
			name: DEFAULT_PROJECT_NAME.to_string(),
			description: None,
			mode: ProjectMode::Calendar,
			color_base: DEFAULT_COLOR.to_string(),
			goal_hours: DEFAULT_GOAL_HOURS,
			hours_per_check_in: DEFAULT_HOURS_PER_CHECK_IN,
			check_in_levels: DEFAULT_CHECK_IN_LEVELS,
			check_in_shape: CheckInShape::Square,
			logs: BTreeMap::new(),
			photos: Vec::new(),
			photo_aspect_ratio: PhotoAspectRatio::Square,
			created_at: created_at.timestamp_millis(),
		}
	}

	pub fn count_on(&self, date: NaiveDate) -> u32 {
		self.logs.get(&date).copied().unwrap_or(0)
	}

	pub fn has_activity_on(&self, date: NaiveDate) -> bool {
		self.count_on(date) > 0
	}

	pub fn theme_rgb(&self) -> Rgb {
		theme_rgb(&self.color_base)
	}

	fn apply(&mut self, patch: ProjectPatch) {
		let ProjectPatch {
			name,
			description,
			mode,
			color_base,
			goal_hours,
			hours_per_check_in,
			check_in_levels,
			check_in_shape,
			photo_aspect_ratio,
		} = patch;

		if let Some(name) = name {
			self.name = name.trim().to_string();
		}
		if let Some(description) = description {
			self.description = description.filter(|value| !value.trim().is_empty());
		}
		if let Some(mode) = mode {
			self.mode = mode;
		}
		if let Some(color_base) = color_base {
			self.color_base = normalize_color(&color_base);
		}
		if let Some(goal_hours) = goal_hours {
			self.goal_hours = goal_hours;
		}
		if let Some(hours_per_check_in) = hours_per_check_in {
			self.hours_per_check_in = hours_per_check_in;
		}
		if let Some(check_in_levels) = check_in_levels {
			self.check_in_levels = check_in_levels;
		}
		if let Some(check_in_shape) = check_in_shape {
			self.check_in_shape = check_in_shape;
		}
		if let Some(photo_aspect_ratio) = photo_aspect_ratio {
			self.photo_aspect_ratio = photo_aspect_ratio;
		}
	}
}

/// Field-by-field changes to a project. `None` leaves a field untouched;
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
	pub name: Option<String>,
	pub description: Option<Option<String>>,
	pub mode: Option<ProjectMode>,
	pub color_base: Option<String>,
	pub goal_hours: Option<f64>,
	pub hours_per_check_in: Option<f64>,
	pub check_in_levels: Option<[u32; GRADE_COUNT]>,
	pub check_in_shape: Option<CheckInShape>,
	pub photo_aspect_ratio: Option<PhotoAspectRatio>,
}

impl ProjectPatch {
	pub fn is_empty(&self) -> bool {
		*self == ProjectPatch::default()
	}

	fn validate(&self) -> Result<()> {
		if let Some(name) = &self.name {
			if name.trim().is_empty() {
				return Err(TrackerError::InvalidField {
					field: "name",
					expected: "non-empty",
				});
			}
		}

		if let Some(goal_hours) = self.goal_hours {
			if !(goal_hours.is_finite() && goal_hours > 0.0) {
				return Err(TrackerError::InvalidField {
					field: "goal hours",
					expected: "a positive number",
				});
			}
		}

		if let Some(hours_per_check_in) = self.hours_per_check_in {
			if !(hours_per_check_in.is_finite() && hours_per_check_in > 0.0) {
				return Err(TrackerError::InvalidField {
					field: "hours per check-in",
					expected: "a positive number",
				});
			}
		}

		if let Some(levels) = &self.check_in_levels {
			if !levels_are_ascending(levels) {
				warn!(?levels, "check-in levels are not ascending");
			}
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHeader {
	pub schema_version: u32,
	pub created_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub active_project_id: Option<String>,
}

impl StoreHeader {
	pub fn new(created_at: DateTime<Utc>) -> Self {
		Self {
			schema_version: CURRENT_SCHEMA_VERSION,
			created_at,
			active_project_id: None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
	pub header: StoreHeader,
	projects: Vec<Project>,
}

impl ProjectStore {
	pub fn with_defaults(now: DateTime<Utc>) -> Self {
		let projects = vec![
			Project {
				name: "Be Happy".to_string(),
				description: Some("Track how the day felt".to_string()),
				..Project::new("1".to_string(), now)
			},
			Project {
				name: "Daily Reading".to_string(),
				description: Some("A photo album of what I read".to_string()),
				mode: ProjectMode::Gallery,
				color_base: "#ec4899".to_string(),
				..Project::new("2".to_string(), now)
			},
		];

		let mut store = Self {
			header: StoreHeader::new(now),
			projects,
		};
		store.header.active_project_id = Some("1".to_string());
		store
	}

	pub fn from_parts(header: StoreHeader, projects: Vec<Project>, now: DateTime<Utc>) -> Self {
		if projects.is_empty() {
			warn!("store has no projects, seeding defaults");
			return Self::with_defaults(now);
		}

		let mut store = Self { header, projects };
		store.header.schema_version = CURRENT_SCHEMA_VERSION;
		let active_is_known = store
			.header
			.active_project_id
			.as_deref()
			.is_some_and(|id| store.project(id).is_some());
		if !active_is_known {
			store.header.active_project_id = store.projects.first().map(|project| project.id.clone());
		}
		store
	}

	pub fn projects(&self) -> &[Project] {
		&self.projects
	}

	pub fn project(&self, id: &str) -> Option<&Project> {
		self.projects.iter().find(|project| project.id == id)
	}

	pub fn active_project(&self) -> Option<&Project> {
		self.header
			.active_project_id
			.as_deref()
			.and_then(|id| self.project(id))
			.or_else(|| self.projects.first())
	}

	pub fn active_project_id(&self) -> Option<&str> {
		self.active_project().map(|project| project.id.as_str())
	}

	pub fn set_active(&mut self, id: &str) -> Result<&Project> {
		let index = self.index_of(id)?;
		self.header.active_project_id = Some(id.to_string());
		Ok(&self.projects[index])
	}

	pub fn create_project(&mut self, patch: ProjectPatch, now: DateTime<Utc>) -> Result<&Project> {
		patch.validate()?;

		let id = self.fresh_id();
		let mut project = Project::new(id.clone(), now);
		project.apply(patch);
		info!(project = %id, name = %project.name, mode = project.mode.label(), "created project");

		self.projects.push(project);
		self.header.active_project_id = Some(id);
		Ok(&self.projects[self.projects.len() - 1])
	}

	pub fn update_project(&mut self, id: &str, patch: ProjectPatch) -> Result<&Project> {
		let index = self.index_of(id)?;
		patch.validate()?;
		self.projects[index].apply(patch);
		info!(project = %id, "updated project");
		Ok(&self.projects[index])
	}

	pub fn delete_project(&mut self, id: &str) -> Result<()> {
		let index = self.index_of(id)?;
		if self.projects.len() <= 1 {
			return Err(TrackerError::LastProject(id.to_string()));
		}

		self.projects.remove(index);
		if self.header.active_project_id.as_deref() == Some(id) {
			self.header.active_project_id = self.projects.first().map(|project| project.id.clone());
		}
		info!(project = %id, "deleted project");
		Ok(())
	}

	pub fn log_check_in(&mut self, id: &str, date: NaiveDate) -> Result<&Project> {
		let project = self.project_mut(id)?;
		let count = project.logs.entry(date).or_insert(0);
		*count = count.saturating_add(1);
		debug!(project = %id, %date, count = *count, "logged check-in");
		Ok(project)
	}

	/// Overwrites the count for `date`; a count of zero or less removes the day.
	pub fn set_log_count(&mut self, id: &str, date: NaiveDate, count: i64) -> Result<&Project> {
		let project = self.project_mut(id)?;
		if count <= 0 {
			project.logs.remove(&date);
		} else {
			project
				.logs
				.insert(date, u32::try_from(count).unwrap_or(u32::MAX));
		}
		debug!(project = %id, %date, count, "set log count");
		Ok(project)
	}

	pub fn add_photo(&mut self, id: &str, reference: String) -> Result<&Project> {
		self.add_photos(id, vec![reference])
	}

	pub fn add_photos(&mut self, id: &str, references: Vec<String>) -> Result<&Project> {
		let project = self.project_mut(id)?;
		let added = references.len();
		project.photos.extend(references);
		debug!(project = %id, added, total = project.photos.len(), "added photos");
		Ok(project)
	}

	pub fn replace_photo(&mut self, id: &str, index: usize, reference: String) -> Result<&Project> {
		let project = self.project_mut(id)?;
		let len = project.photos.len();
		let slot = project
			.photos
			.get_mut(index)
			.ok_or(TrackerError::PhotoIndexOutOfBounds { index, len })?;
		*slot = reference;
		debug!(project = %id, index, "replaced photo");
		Ok(project)
	}

	pub fn delete_photo(&mut self, id: &str, index: usize) -> Result<&Project> {
		let project = self.project_mut(id)?;
		let len = project.photos.len();
		if index >= len {
			return Err(TrackerError::PhotoIndexOutOfBounds { index, len });
		}
		project.photos.remove(index);
		debug!(project = %id, index, "deleted photo");
		Ok(project)
	}

	fn index_of(&self, id: &str) -> Result<usize> {
		self.projects
			.iter()
			.position(|project| project.id == id)
			.ok_or_else(|| TrackerError::ProjectNotFound(id.to_string()))
	}

	fn project_mut(&mut self, id: &str) -> Result<&mut Project> {
		self.projects
			.iter_mut()
			.find(|project| project.id == id)
			.ok_or_else(|| TrackerError::ProjectNotFound(id.to_string()))
	}

	fn fresh_id(&self) -> String {
		loop {
			let id = generate_id();
			if self.project(&id).is_none() {
				return id;
			}
		}
	}
}

pub fn generate_id() -> String {
	thread_rng()
		.sample_iter(&Alphanumeric)
		.take(ID_LEN)
		.map(char::from)
		.collect()
}

mod date_keys {
	use std::collections::BTreeMap;

	use chrono::NaiveDate;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use tracing::warn;

	use crate::calendar::{format_date_key, parse_date_key};

	pub fn serialize<S>(logs: &BTreeMap<NaiveDate, u32>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		logs.iter()
			.map(|(date, count)| (format_date_key(*date), *count))
			.collect::<BTreeMap<_, _>>()
			.serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<NaiveDate, u32>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = BTreeMap::<String, u32>::deserialize(deserializer)?;
		let mut logs = BTreeMap::new();
		for (key, count) in raw {
			let Some(date) = parse_date_key(&key) else {
				warn!(%key, "dropping log with invalid date key");
				continue;
			};
			if count > 0 {
				logs.insert(date, count);
			}
		}
		Ok(logs)
	}
}

#[cfg(test)]
mod tests {
	use chrono::{NaiveDate, TimeZone, Utc};

	use super::{
		CheckInShape, ProjectMode, ProjectPatch, ProjectStore, TrackerError, DEFAULT_COLOR,
	};

	fn day(year: i32, month: u32, day: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
	}

	fn store() -> ProjectStore {
		ProjectStore::with_defaults(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
	}

	fn named(name: &str) -> ProjectPatch {
		ProjectPatch {
			name: Some(name.to_string()),
			..ProjectPatch::default()
		}
	}

	#[test]
	fn creates_project_with_defaults_and_activates_it() {
		let mut store = store();
		let now = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
		let project = store
			.create_project(
				ProjectPatch {
					color_base: Some("teal".to_string()),
					..named("Piano")
				},
				now,
			)
			.expect("project should be created")
			.clone();

		assert_eq!(project.id.len(), 9);
		assert_eq!(project.color_base, DEFAULT_COLOR);
		assert_eq!(project.mode, ProjectMode::Calendar);
		assert_eq!(project.check_in_levels, [1, 2, 3, 4, 5]);
		assert_eq!(project.check_in_shape, CheckInShape::Square);
		assert!(project.logs.is_empty());
		assert!(project.photos.is_empty());
		assert_eq!(project.created_at, now.timestamp_millis());
		assert_eq!(store.active_project_id(), Some(project.id.as_str()));
	}

	#[test]
	fn create_without_name_uses_placeholder() {
		let mut store = store();
		let now = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
		let project = store
			.create_project(ProjectPatch::default(), now)
			.expect("project should be created");
		assert_eq!(project.name, "New Hobby");
	}

	#[test]
	fn rejects_invalid_fields() {
		let mut store = store();
		let now = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
		let err = store
			.create_project(
				ProjectPatch {
					goal_hours: Some(0.0),
					..named("Zero")
				},
				now,
			)
			.expect_err("zero goal is invalid");
		assert!(matches!(err, TrackerError::InvalidField { field: "goal hours", .. }));
		assert_eq!(store.projects().len(), 2);

		let err = store
			.update_project("1", named("   "))
			.expect_err("blank name is invalid");
		assert!(matches!(err, TrackerError::InvalidField { field: "name", .. }));
		assert_eq!(store.project("1").map(|p| p.name.as_str()), Some("Be Happy"));
	}

	#[test]
	fn update_merges_only_given_fields() {
		let mut store = store();
		store.log_check_in("1", day(2024, 3, 5)).expect("log should work");
		let updated = store
			.update_project(
				"1",
				ProjectPatch {
					goal_hours: Some(50.0),
					description: Some(None),
					check_in_shape: Some(CheckInShape::Circle),
					..ProjectPatch::default()
				},
			)
			.expect("update should work");

		assert_eq!(updated.name, "Be Happy");
		assert_eq!(updated.goal_hours, 50.0);
		assert_eq!(updated.description, None);
		assert_eq!(updated.check_in_shape, CheckInShape::Circle);
		assert_eq!(updated.count_on(day(2024, 3, 5)), 1);
	}

	#[test]
	fn missing_project_is_reported_and_state_is_unchanged() {
		let mut store = store();
		let before = store.projects().to_vec();
		assert_eq!(
			store.update_project("nope", named("x")).map(|_| ()),
			Err(TrackerError::ProjectNotFound("nope".to_string()))
		);
		assert!(store.log_check_in("nope", day(2024, 1, 1)).is_err());
		assert!(store.set_log_count("nope", day(2024, 1, 1), 3).is_err());
		assert!(store.add_photo("nope", "a.jpg".to_string()).is_err());
		assert!(store.delete_project("nope").is_err());
		assert_eq!(store.projects(), before.as_slice());
	}

	#[test]
	fn accumulates_check_ins() {
		let mut store = store();
		for _ in 0..3 {
			store.log_check_in("1", day(2024, 3, 5)).expect("log should work");
		}
		let project = store.project("1").expect("project exists");
		assert_eq!(project.count_on(day(2024, 3, 5)), 3);
		assert!(project.has_activity_on(day(2024, 3, 5)));
		assert!(!project.has_activity_on(day(2024, 3, 6)));
	}

	#[test]
	fn setting_zero_or_less_removes_the_day() {
		let mut store = store();
		let date = day(2024, 3, 5);
		store.set_log_count("1", date, 4).expect("set should work");
		assert_eq!(store.project("1").map(|p| p.count_on(date)), Some(4));

		store.set_log_count("1", date, 0).expect("set should work");
		assert!(!store.project("1").expect("exists").logs.contains_key(&date));

		store.log_check_in("1", date).expect("log should work");
		store.set_log_count("1", date, -2).expect("set should work");
		assert!(!store.project("1").expect("exists").logs.contains_key(&date));
	}

	#[test]
	fn refuses_to_delete_the_last_project() {
		let mut store = store();
		store.delete_project("2").expect("delete should work");
		assert_eq!(
			store.delete_project("1"),
			Err(TrackerError::LastProject("1".to_string()))
		);
		assert_eq!(store.projects().len(), 1);
		assert_eq!(store.projects()[0].id, "1");
	}

	#[test]
	fn deleting_active_project_moves_pointer_to_first() {
		let mut store = store();
		store.set_active("2").expect("project exists");
		store.delete_project("2").expect("delete should work");
		assert_eq!(store.active_project_id(), Some("1"));

		let now = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
		let third = store
			.create_project(named("Third"), now)
			.expect("created")
			.id
			.clone();
		store.set_active("1").expect("project exists");
		store.delete_project(&third).expect("delete should work");
		assert_eq!(store.active_project_id(), Some("1"));
	}

	#[test]
	fn photo_operations_keep_order_and_check_bounds() {
		let mut store = store();
		store.add_photo("2", "a.jpg".to_string()).expect("add should work");
		store
			.add_photos("2", vec!["b.jpg".to_string(), "a.jpg".to_string()])
			.expect("add should work");
		store
			.replace_photo("2", 1, "c.jpg".to_string())
			.expect("replace should work");
		assert_eq!(
			store.project("2").map(|p| p.photos.clone()),
			Some(vec!["a.jpg".to_string(), "c.jpg".to_string(), "a.jpg".to_string()])
		);

		store.delete_photo("2", 0).expect("delete should work");
		assert_eq!(
			store.project("2").map(|p| p.photos.clone()),
			Some(vec!["c.jpg".to_string(), "a.jpg".to_string()])
		);

		assert_eq!(
			store.replace_photo("2", 2, "d.jpg".to_string()).map(|_| ()),
			Err(TrackerError::PhotoIndexOutOfBounds { index: 2, len: 2 })
		);
		assert_eq!(
			store.delete_photo("2", 5).map(|_| ()),
			Err(TrackerError::PhotoIndexOutOfBounds { index: 5, len: 2 })
		);
		assert_eq!(store.project("2").map(|p| p.photos.len()), Some(2));
	}

	#[test]
	fn log_keys_serialize_with_canonical_format() {
		let mut store = store();
		store.set_log_count("1", day(2024, 3, 5), 2).expect("set should work");
		let json = serde_json::to_value(store.project("1").expect("exists")).expect("encodes");
		assert_eq!(json["logs"]["2024-03-05"], 2);
		assert_eq!(json["colorBase"], "#3b82f6");
		assert_eq!(json["photoAspectRatio"], "1:1");
	}
}
