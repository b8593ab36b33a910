mod calendar;
mod colors;
mod config;
mod domain;
mod interaction;
mod progress;
mod storage;
mod ui;

use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::calendar::{DAY_ROWS, MONTH_COLUMNS, YearHeatmap, parse_date_key};
use crate::colors::{GRADE_COUNT, generate_color_levels};
use crate::config::{Settings, load_settings, report_settings_warning, resolve_store_path, state_dir};
use crate::domain::{CheckInShape, PhotoAspectRatio, ProjectMode, ProjectPatch, ProjectStore};
use crate::progress::{Progress, format_hours, overall_summary, progress_bar, project_progress};
use crate::storage::{load_store, save_store};
use crate::ui::run_dashboard;

const LOG_FILE: &str = "hour_tracker.log";
const DEFAULT_LOG_FILTER: &str = "hour_tracker=info";

#[derive(Debug, Parser)]
#[command(name = "hour-tracker", about = "Habit tracker with a check-in heat-map")]
struct Cli {
	#[arg(long, global = true)]
	store: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Dashboard,
	Projects,
	Use {
		#[arg(long)]
		project: String,
	},
	AddProject {
		#[command(flatten)]
		fields: ProjectFields,
	},
	EditProject {
		#[arg(long)]
		project: String,
		#[command(flatten)]
		fields: ProjectFields,
		#[arg(long, conflicts_with = "description")]
		clear_description: bool,
	},
	DeleteProject {
		#[arg(long)]
		project: String,
	},
	CheckIn {
		#[arg(long)]
		project: Option<String>,
		#[arg(long)]
		date: Option<String>,
	},
	SetCount {
		#[arg(long)]
		project: Option<String>,
		#[arg(long)]
		date: String,
		#[arg(long, allow_negative_numbers = true)]
		count: i64,
	},
	AddPhoto {
		#[arg(long)]
		project: Option<String>,
		#[arg(long = "photo", required = true)]
		photos: Vec<String>,
	},
	ReplacePhoto {
		#[arg(long)]
		project: Option<String>,
		#[arg(long)]
		index: usize,
		#[arg(long)]
		photo: String,
	},
	DeletePhoto {
		#[arg(long)]
		project: Option<String>,
		#[arg(long)]
		index: usize,
	},
	Progress,
	Calendar {
		#[arg(long)]
		project: Option<String>,
		#[arg(long)]
		year: Option<i32>,
	},
}

#[derive(Debug, Args)]
struct ProjectFields {
	#[arg(long)]
	name: Option<String>,
	#[arg(long)]
	description: Option<String>,
	#[arg(long, value_enum)]
	mode: Option<ModeArg>,
	#[arg(long)]
	color: Option<String>,
	#[arg(long)]
	goal_hours: Option<f64>,
	#[arg(long)]
	hours_per_check_in: Option<f64>,
	/// Five comma-separated check-in thresholds, e.g. 1,2,3,4,5
	#[arg(long, value_delimiter = ',')]
	levels: Option<Vec<u32>>,
	#[arg(long, value_enum)]
	shape: Option<ShapeArg>,
	#[arg(long, value_enum)]
	aspect_ratio: Option<AspectArg>,
}

impl ProjectFields {
	fn into_patch(self) -> Result<ProjectPatch, Box<dyn Error>> {
		let check_in_levels = match self.levels {
			Some(levels) => Some(
				<[u32; GRADE_COUNT]>::try_from(levels.as_slice())
					.map_err(|_| format!("--levels needs exactly {GRADE_COUNT} values"))?,
			),
			None => None,
		};

		Ok(ProjectPatch {
			name: self.name,
			description: self.description.map(Some),
			mode: self.mode.map(Into::into),
			color_base: self.color,
			goal_hours: self.goal_hours,
			hours_per_check_in: self.hours_per_check_in,
			check_in_levels,
			check_in_shape: self.shape.map(Into::into),
			photo_aspect_ratio: self.aspect_ratio.map(Into::into),
		})
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
	Calendar,
	Gallery,
}

impl From<ModeArg> for ProjectMode {
	fn from(value: ModeArg) -> Self {
		match value {
			ModeArg::Calendar => ProjectMode::Calendar,
			ModeArg::Gallery => ProjectMode::Gallery,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
	Square,
	Circle,
}

impl From<ShapeArg> for CheckInShape {
	fn from(value: ShapeArg) -> Self {
		match value {
			ShapeArg::Square => CheckInShape::Square,
			ShapeArg::Circle => CheckInShape::Circle,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectArg {
	#[value(name = "1:1")]
	Square,
	#[value(name = "16:9")]
	Wide,
	#[value(name = "9:16")]
	Tall,
	#[value(name = "4:3")]
	Classic,
	#[value(name = "3:4")]
	Portrait,
}

impl From<AspectArg> for PhotoAspectRatio {
	fn from(value: AspectArg) -> Self {
		match value {
			AspectArg::Square => PhotoAspectRatio::Square,
			AspectArg::Wide => PhotoAspectRatio::Wide,
			AspectArg::Tall => PhotoAspectRatio::Tall,
			AspectArg::Classic => PhotoAspectRatio::Classic,
			AspectArg::Portrait => PhotoAspectRatio::Portrait,
		}
	}
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let (settings, settings_warning) = load_settings(&state_dir());
	init_tracing(&settings);
	report_settings_warning(settings_warning);

	let store_path = resolve_store_path(cli.store, &settings);
	let mut store = load_store(&store_path, Utc::now())?;

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Init => {
			save_store(&store_path, &store)?;
			println!("initialized store at {}", store_path.display());
		}
		Command::Dashboard => {
			run_dashboard(&mut store, &store_path, &settings)?;
		}
		Command::Projects => {
			print_projects(&store);
		}
		Command::Use { project } => {
			let name = store.set_active(&project)?.name.clone();
			save_store(&store_path, &store)?;
			println!("active project: {name}");
		}
		Command::AddProject { fields } => {
			let mut patch = fields.into_patch()?;
			patch.color_base.get_or_insert_with(|| settings.default_color());
			patch.goal_hours.get_or_insert(settings.default_goal_hours());
			let project_id = store.create_project(patch, Utc::now())?.id.clone();
			save_store(&store_path, &store)?;
			println!("created project {project_id}");
		}
		Command::EditProject {
			project,
			fields,
			clear_description,
		} => {
			let mut patch = fields.into_patch()?;
			if clear_description {
				patch.description = Some(None);
			}
			if patch.is_empty() {
				return Err("nothing to change: pass at least one field".into());
			}
			store.update_project(&project, patch)?;
			save_store(&store_path, &store)?;
			println!("updated project {project}");
		}
		Command::DeleteProject { project } => {
			store.delete_project(&project)?;
			save_store(&store_path, &store)?;
			println!("deleted project {project}");
		}
		Command::CheckIn { project, date } => {
			let project_id = target_project(&store, project)?;
			let date = parse_day(date.as_deref())?;
			let count = store.log_check_in(&project_id, date)?.count_on(date);
			save_store(&store_path, &store)?;
			println!("{date}: {count} check-ins");
		}
		Command::SetCount {
			project,
			date,
			count,
		} => {
			let project_id = target_project(&store, project)?;
			let date = parse_day(Some(&date))?;
			let stored = store.set_log_count(&project_id, date, count)?.count_on(date);
			save_store(&store_path, &store)?;
			if stored == 0 {
				println!("{date}: cleared");
			} else {
				println!("{date}: {stored} check-ins");
			}
		}
		Command::AddPhoto { project, photos } => {
			let project_id = target_project(&store, project)?;
			let total = store.add_photos(&project_id, photos)?.photos.len();
			save_store(&store_path, &store)?;
			println!("project now has {total} photos");
		}
		Command::ReplacePhoto {
			project,
			index,
			photo,
		} => {
			let project_id = target_project(&store, project)?;
			store.replace_photo(&project_id, index, photo)?;
			save_store(&store_path, &store)?;
			println!("replaced photo {index}");
		}
		Command::DeletePhoto { project, index } => {
			let project_id = target_project(&store, project)?;
			let total = store.delete_photo(&project_id, index)?.photos.len();
			save_store(&store_path, &store)?;
			println!("deleted photo {index}, {total} remaining");
		}
		Command::Progress => {
			print_progress(&store);
		}
		Command::Calendar { project, year } => {
			let project_id = target_project(&store, project)?;
			let year = year.unwrap_or_else(|| Local::now().year());
			print_calendar(&store, &project_id, year)?;
		}
	}

	Ok(())
}

fn init_tracing(settings: &Settings) {
	let filter = EnvFilter::try_from_env("HOUR_TRACKER_LOG")
		.or_else(|_| EnvFilter::try_new(settings.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)))
		.unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

	// the dashboard owns the terminal, so logs go to a file
	let dir = state_dir();
	let file = fs::create_dir_all(&dir).and_then(|_| {
		OpenOptions::new()
			.create(true)
			.append(true)
			.open(dir.join(LOG_FILE))
	});

	match file {
		Ok(file) => tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_ansi(false)
			.with_writer(Mutex::new(file))
			.init(),
		Err(err) => {
			tracing_subscriber::fmt()
				.with_env_filter(filter)
				.with_writer(std::io::stderr)
				.init();
			tracing::warn!(%err, "cannot open log file, logging to stderr");
		}
	}
}

fn target_project(store: &ProjectStore, project: Option<String>) -> Result<String, Box<dyn Error>> {
	match project {
		Some(id) => {
			store
				.project(&id)
				.ok_or_else(|| format!("project not found: {id}"))?;
			Ok(id)
		}
		None => store
			.active_project_id()
			.map(str::to_string)
			.ok_or_else(|| "no active project".into()),
	}
}

fn parse_day(input: Option<&str>) -> Result<NaiveDate, Box<dyn Error>> {
	match input {
		Some(raw) => parse_date_key(raw).ok_or_else(|| format!("invalid date (expected YYYY-MM-DD): {raw}").into()),
		None => Ok(Local::now().date_naive()),
	}
}

fn print_projects(store: &ProjectStore) {
	let active = store.active_project_id();
	for project in store.projects() {
		let marker = if Some(project.id.as_str()) == active { "*" } else { " " };
		println!(
			"{marker} {} | {} | {} | {}",
			project.id,
			project.name,
			project.mode.label(),
			project.color_base
		);
	}
}

fn print_progress(store: &ProjectStore) {
	for project in store.projects() {
		match project_progress(project) {
			Progress::Calendar(progress) => {
				println!(
					"{} | {} {:>3.0}% | {} / {}{}",
					project.name,
					progress_bar(progress.percent, 20),
					progress.percent,
					format_hours(progress.total_hours),
					format_hours(progress.goal_hours),
					if progress.is_mastered() { " | mastered" } else { "" }
				);
			}
			Progress::Gallery { photo_count } => {
				println!("{} | {photo_count} photos", project.name);
			}
		}
	}

	let summary = overall_summary(store);
	println!(
		"\n{} projects | {} check-ins | {} logged | {} mastered | {} photos",
		summary.projects,
		summary.total_check_ins,
		format_hours(summary.total_hours),
		summary.mastered,
		summary.photos
	);
}

fn print_calendar(store: &ProjectStore, project_id: &str, year: i32) -> Result<(), Box<dyn Error>> {
	let project = store
		.project(project_id)
		.ok_or_else(|| format!("project not found: {project_id}"))?;
	let heatmap = YearHeatmap::build(year, project);

	println!("{} {year}", project.name);
	let header = (1..=MONTH_COLUMNS).map(|month| format!("{month:>3}")).collect::<String>();
	println!("   {header}");
	for day in 1..=DAY_ROWS {
		let row = (1..=MONTH_COLUMNS)
			.map(|month| match heatmap.cell(month, day) {
				None => "   ".to_string(),
				Some(cell) => match cell.grade {
					None => "  .".to_string(),
					Some(grade) => format!("{:>3}", grade + 1),
				},
			})
			.collect::<String>();
		println!("{day:>2} {row}");
	}

	let palette = generate_color_levels(&project.color_base);
	let legend = palette
		.iter()
		.zip(project.check_in_levels.iter())
		.enumerate()
		.map(|(grade, (color, threshold))| format!("{}={color} (>={threshold})", grade + 1))
		.collect::<Vec<_>>()
		.join("  ");
	println!("\n{legend}");
	println!(
		"{} active days, {} check-ins",
		heatmap.active_days(),
		heatmap.total_check_ins()
	);

	Ok(())
}
