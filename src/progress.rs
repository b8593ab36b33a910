use crate::domain::{Project, ProjectMode, ProjectStore};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
	Calendar(CalendarProgress),
	Gallery { photo_count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarProgress {
	pub total_check_ins: u64,
	pub total_hours: f64,
	pub goal_hours: f64,
	pub percent: f64,
}

impl CalendarProgress {
	pub fn new(total_check_ins: u64, hours_per_check_in: f64, goal_hours: f64) -> Self {
		let total_hours = total_check_ins as f64 * hours_per_check_in;
		Self {
			total_check_ins,
			total_hours,
			goal_hours,
			percent: percent_of_goal(total_hours, goal_hours),
		}
	}

	pub fn is_mastered(&self) -> bool {
		goal_is_valid(self.goal_hours) && self.total_hours >= self.goal_hours
	}

	pub fn remaining_hours(&self) -> f64 {
		if goal_is_valid(self.goal_hours) {
			(self.goal_hours - self.total_hours).max(0.0)
		} else {
			0.0
		}
	}
}

pub fn project_progress(project: &Project) -> Progress {
	match project.mode {
		ProjectMode::Gallery => Progress::Gallery {
			photo_count: project.photos.len(),
		},
		ProjectMode::Calendar => {
			let total_check_ins = project.logs.values().map(|count| u64::from(*count)).sum();
			Progress::Calendar(CalendarProgress::new(
				total_check_ins,
				project.hours_per_check_in,
				project.goal_hours,
			))
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverallSummary {
	pub projects: usize,
	pub total_check_ins: u64,
	pub total_hours: f64,
	pub mastered: usize,
	pub photos: usize,
}

pub fn overall_summary(store: &ProjectStore) -> OverallSummary {
	store
		.projects()
		.iter()
		.fold(OverallSummary::default(), |mut summary, project| {
			summary.projects += 1;
			match project_progress(project) {
				Progress::Calendar(progress) => {
					summary.total_check_ins += progress.total_check_ins;
					summary.total_hours += progress.total_hours;
					if progress.is_mastered() {
						summary.mastered += 1;
					}
				}
				Progress::Gallery { photo_count } => summary.photos += photo_count,
			}
			summary
		})
}

pub fn percent_of_goal(total: f64, goal: f64) -> f64 {
	if !goal_is_valid(goal) || !total.is_finite() {
		return 0.0;
	}
	(total / goal * 100.0).clamp(0.0, 100.0)
}

pub fn progress_bar(percent: f64, width: usize) -> String {
	let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
	let filled = filled.min(width);
	format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn format_hours(hours: f64) -> String {
	if (hours - hours.round()).abs() < f64::EPSILON {
		format!("{hours:.0}h")
	} else {
		format!("{hours:.1}h")
	}
}

fn goal_is_valid(goal: f64) -> bool {
	goal.is_finite() && goal > 0.0
}
