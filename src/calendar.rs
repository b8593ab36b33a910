use chrono::{Datelike, Duration, NaiveDate};

use crate::colors::grade_for_count;
use crate::domain::Project;

pub const MONTH_COLUMNS: u32 = 12;
pub const DAY_ROWS: u32 = 31;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub fn is_valid_date(year: i32, month: u32, day: u32) -> bool {
	NaiveDate::from_ymd_opt(year, month, day).is_some_and(|date| date.month() == month)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
	let first_of_next = if month >= 12 {
		NaiveDate::from_ymd_opt(year + 1, 1, 1)
	} else {
		NaiveDate::from_ymd_opt(year, month + 1, 1)
	};
	first_of_next
		.map(|date| (date - Duration::days(1)).day())
		.unwrap_or(0)
}

pub fn date_key(year: i32, month: u32, day: u32) -> String {
	format!("{year:04}-{month:02}-{day:02}")
}

pub fn format_date_key(date: NaiveDate) -> String {
	date_key(date.year(), date.month(), date.day())
}

/// Only the zero-padded form is accepted, so every day has exactly one key.
pub fn parse_date_key(raw: &str) -> Option<NaiveDate> {
	let raw = raw.trim();
	NaiveDate::parse_from_str(raw, DATE_KEY_FORMAT)
		.ok()
		.filter(|date| format_date_key(*date) == raw)
}

pub fn short_label(date: NaiveDate) -> String {
	format!("{:02}/{:02}", date.month(), date.day())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSlot {
	Padding,
	Day(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearGrid {
	pub year: i32,
}

impl YearGrid {
	pub fn new(year: i32) -> Self {
		Self { year }
	}

	pub fn slot(&self, month: u32, day: u32) -> GridSlot {
		if !is_valid_date(self.year, month, day) {
			return GridSlot::Padding;
		}

		NaiveDate::from_ymd_opt(self.year, month, day).map_or(GridSlot::Padding, GridSlot::Day)
	}

	pub fn step(&self, from: NaiveDate, delta_months: i32, delta_days: i32) -> NaiveDate {
		let mut month = from.month() as i32;
		let mut day = from.day() as i32;

		if delta_months != 0 {
			month = (month + delta_months).clamp(1, MONTH_COLUMNS as i32);
			day = day.min(days_in_month(self.year, month as u32) as i32);
		}

		if delta_days != 0 {
			let last = days_in_month(self.year, month as u32) as i32;
			day = (day + delta_days).clamp(1, last);
		}

		match self.slot(month as u32, day as u32) {
			GridSlot::Day(date) => date,
			GridSlot::Padding => from,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatCell {
	pub date: NaiveDate,
	pub count: u32,
	pub grade: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct YearHeatmap {
	columns: Vec<Vec<Option<HeatCell>>>,
}

impl YearHeatmap {
	pub fn build(year: i32, project: &Project) -> Self {
		let grid = YearGrid::new(year);
		let columns = (1..=MONTH_COLUMNS)
			.map(|month| {
				(1..=DAY_ROWS)
					.map(|day| match grid.slot(month, day) {
						GridSlot::Padding => None,
						GridSlot::Day(date) => {
							let count = project.count_on(date);
							Some(HeatCell {
								date,
								count,
								grade: grade_for_count(count, &project.check_in_levels),
							})
						}
					})
					.collect()
			})
			.collect();

		Self { columns }
	}

	pub fn cell(&self, month: u32, day: u32) -> Option<HeatCell> {
		let column = self.columns.get(month.checked_sub(1)? as usize)?;
		column.get(day.checked_sub(1)? as usize).copied().flatten()
	}

	pub fn active_days(&self) -> usize {
		self.columns
			.iter()
			.flatten()
			.flatten()
			.filter(|cell| cell.count > 0)
			.count()
	}

	pub fn total_check_ins(&self) -> u64 {
		self.columns
			.iter()
			.flatten()
			.flatten()
			.map(|cell| u64::from(cell.count))
			.sum()
	}
}

#[cfg(test)]
mod tests {
	use chrono::{NaiveDate, TimeZone, Utc};

	use crate::domain::{ProjectPatch, ProjectStore};

	use super::{
		GridSlot, YearGrid, YearHeatmap, date_key, days_in_month, format_date_key,
		is_valid_date, parse_date_key,
	};

	fn day(year: i32, month: u32, day: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
	}

	#[test]
	fn validates_leap_years_and_short_months() {
		assert!(is_valid_date(2024, 2, 29));
		assert!(!is_valid_date(2023, 2, 29));
		assert!(!is_valid_date(2023, 4, 31));
		assert!(is_valid_date(2023, 12, 31));
		assert!(!is_valid_date(1900, 2, 29));
		assert!(is_valid_date(2000, 2, 29));
		assert!(!is_valid_date(2023, 13, 1));
		assert!(!is_valid_date(2023, 1, 0));
	}

	#[test]
	fn counts_days_per_month() {
		assert_eq!(days_in_month(2024, 2), 29);
		assert_eq!(days_in_month(2023, 2), 28);
		assert_eq!(days_in_month(2023, 4), 30);
		assert_eq!(days_in_month(2023, 12), 31);
	}

	#[test]
	fn date_keys_are_zero_padded_and_stable() {
		assert_eq!(date_key(2024, 3, 5), "2024-03-05");
		assert_eq!(format_date_key(day(2024, 3, 5)), date_key(2024, 3, 5));
		assert_eq!(parse_date_key("2024-03-05"), Some(day(2024, 3, 5)));
		assert_eq!(parse_date_key("2024-3-5x"), None);
		assert_eq!(parse_date_key("2024-3-5"), None);
		assert_eq!(parse_date_key(" 2024-03-05 "), Some(day(2024, 3, 5)));
	}

	#[test]
	fn invalid_slots_are_padding() {
		let grid = YearGrid::new(2023);
		assert_eq!(grid.slot(2, 29), GridSlot::Padding);
		assert_eq!(grid.slot(4, 31), GridSlot::Padding);
		assert_eq!(grid.slot(4, 30), GridSlot::Day(day(2023, 4, 30)));
	}

	#[test]
	fn steps_within_the_grid() {
		let grid = YearGrid::new(2023);
		assert_eq!(grid.step(day(2023, 1, 31), 1, 0), day(2023, 2, 28));
		assert_eq!(grid.step(day(2023, 3, 31), 0, 1), day(2023, 3, 31));
		assert_eq!(grid.step(day(2023, 12, 5), 1, 0), day(2023, 12, 5));
		assert_eq!(grid.step(day(2023, 6, 1), 0, -1), day(2023, 6, 1));
		assert_eq!(grid.step(day(2023, 6, 10), -2, 3), day(2023, 4, 13));
	}

	#[test]
	fn heatmap_uses_log_keys_and_thresholds() {
		let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
		let mut store = ProjectStore::with_defaults(now);
		let id = store
			.create_project(
				ProjectPatch {
					name: Some("Guitar".to_string()),
					check_in_levels: Some([2, 4, 6, 8, 10]),
					..ProjectPatch::default()
				},
				now,
			)
			.expect("project should be created")
			.id
			.clone();
		store
			.set_log_count(&id, day(2024, 2, 29), 5)
			.expect("log should be set");
		store
			.set_log_count(&id, day(2024, 3, 1), 1)
			.expect("log should be set");
		store
			.set_log_count(&id, day(2025, 1, 1), 9)
			.expect("log should be set");

		let project = store.project(&id).expect("project exists");
		let heatmap = YearHeatmap::build(2024, project);
		let leap_day = heatmap.cell(2, 29).expect("leap day exists in 2024");
		assert_eq!(leap_day.count, 5);
		assert_eq!(leap_day.grade, Some(1));
		assert_eq!(heatmap.cell(3, 1).and_then(|cell| cell.grade), None);
		assert!(heatmap.cell(2, 30).is_none());
		assert_eq!(heatmap.active_days(), 2);
		assert_eq!(heatmap.total_check_ins(), 6);
	}
}
