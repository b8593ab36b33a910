use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::colors::{DEFAULT_COLOR, normalize_color};
use crate::domain::DEFAULT_GOAL_HOURS;
use crate::interaction::{DEFAULT_DOUBLE_TAP, DEFAULT_LONG_PRESS};

pub const SETTINGS_FILE: &str = "settings.toml";
const APP_DIR: &str = "hour_tracker";
const DEFAULT_STORE_FILE: &str = "projects.tracker";
const STATE_DIR_ENV: &str = "HOUR_TRACKER_STATE_DIR";
const STORE_ENV: &str = "HOUR_TRACKER_STORE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub long_press_ms: u64,
	pub double_tap_ms: u64,
	pub default_color: String,
	pub default_goal_hours: f64,
	pub log_filter: Option<String>,
	// relative paths are taken from the state directory
	pub store_path: Option<PathBuf>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			long_press_ms: DEFAULT_LONG_PRESS.as_millis() as u64,
			double_tap_ms: DEFAULT_DOUBLE_TAP.as_millis() as u64,
			default_color: DEFAULT_COLOR.to_string(),
			default_goal_hours: DEFAULT_GOAL_HOURS,
			log_filter: None,
			store_path: None,
		}
	}
}

impl Settings {
	pub fn long_press(&self) -> Duration {
		Duration::from_millis(self.long_press_ms.max(1))
	}

	pub fn double_tap(&self) -> Duration {
		Duration::from_millis(self.double_tap_ms)
	}

	pub fn default_color(&self) -> String {
		normalize_color(&self.default_color)
	}

	pub fn default_goal_hours(&self) -> f64 {
		if self.default_goal_hours.is_finite() && self.default_goal_hours > 0.0 {
			self.default_goal_hours
		} else {
			DEFAULT_GOAL_HOURS
		}
	}
}

pub fn load_settings(dir: &Path) -> (Settings, Option<String>) {
	let path = dir.join(SETTINGS_FILE);
	let raw = match fs::read_to_string(&path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return (Settings::default(), None),
		Err(err) => {
			return (
				Settings::default(),
				Some(format!("failed to read {}: {err}", path.display())),
			);
		}
	};

	match toml::from_str(&raw) {
		Ok(settings) => (settings, None),
		Err(err) => (
			Settings::default(),
			Some(format!("ignoring invalid {}: {err}", path.display())),
		),
	}
}

pub fn report_settings_warning(warning: Option<String>) {
	if let Some(message) = warning {
		warn!("{message}");
	}
}

pub fn state_dir() -> PathBuf {
	if let Some(dir) = env_path(STATE_DIR_ENV) {
		return dir;
	}

	env_path("XDG_STATE_HOME")
		.or_else(|| env_path("HOME").map(|home| home.join(".local").join("state")))
		.unwrap_or_else(|| PathBuf::from("."))
		.join(APP_DIR)
}

pub fn resolve_store_path(cli_path: Option<PathBuf>, settings: &Settings) -> PathBuf {
	let cwd = env::current_dir().unwrap_or_default();
	pick_store_path(cli_path, env_path(STORE_ENV), settings, &state_dir(), &cwd)
}

/// `--store`, then `HOUR_TRACKER_STORE`, then `store_path` from settings, then
/// the default file in the state directory.
fn pick_store_path(
	cli_path: Option<PathBuf>,
	env_store: Option<PathBuf>,
	settings: &Settings,
	state_dir: &Path,
	cwd: &Path,
) -> PathBuf {
	if let Some(path) = cli_path.or(env_store) {
		return cwd.join(path);
	}

	match &settings.store_path {
		Some(path) => state_dir.join(path),
		None => state_dir.join(DEFAULT_STORE_FILE),
	}
}

fn env_path(key: &str) -> Option<PathBuf> {
	env::var_os(key).filter(|value| !value.is_empty()).map(PathBuf::from)
}
