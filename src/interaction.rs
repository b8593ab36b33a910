use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::calendar::short_label;

pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(400);
pub const DEFAULT_DOUBLE_TAP: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction<T> {
	ToggleSelection(T),
	OpenEditor(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState<T> {
	Idle,
	Pressed { target: T, deadline: Instant },
	Held { target: T },
}

/// Tells a short tap on a cell apart from a long press or a double tap.
///
/// The long-press timer is a deadline owned by this value: `tick` fires it,
/// `release`/`cancel` clear it, and `dispose` tears it down so no action is
/// produced after the owner goes away.
#[derive(Debug)]
pub struct CellGesture<T> {
	long_press: Duration,
	double_tap: Duration,
	state: PressState<T>,
	last_tap: Option<(T, Instant)>,
}

impl<T: Copy + PartialEq> CellGesture<T> {
	pub fn new(long_press: Duration, double_tap: Duration) -> Self {
		Self {
			long_press,
			double_tap,
			state: PressState::Idle,
			last_tap: None,
		}
	}

	pub fn press(&mut self, target: T, now: Instant) {
		self.state = PressState::Pressed {
			target,
			deadline: now + self.long_press,
		};
	}

	pub fn tick(&mut self, now: Instant) -> Option<GestureAction<T>> {
		match self.state {
			PressState::Pressed { target, deadline } if now >= deadline => {
				self.state = PressState::Held { target };
				self.last_tap = None;
				Some(GestureAction::OpenEditor(target))
			}
			_ => None,
		}
	}

	pub fn release(&mut self, now: Instant) -> Option<GestureAction<T>> {
		match std::mem::replace(&mut self.state, PressState::Idle) {
			PressState::Idle => None,
			// the editor already opened; swallow the tap
			PressState::Held { .. } => None,
			PressState::Pressed { target, deadline } if now >= deadline => {
				self.last_tap = None;
				Some(GestureAction::OpenEditor(target))
			}
			PressState::Pressed { target, .. } => {
				let is_double = self.last_tap.is_some_and(|(previous, at)| {
					previous == target && now.saturating_duration_since(at) <= self.double_tap
				});
				if is_double {
					self.last_tap = None;
					Some(GestureAction::OpenEditor(target))
				} else {
					self.last_tap = Some((target, now));
					Some(GestureAction::ToggleSelection(target))
				}
			}
		}
	}

	pub fn double_activate(&mut self, target: T) -> GestureAction<T> {
		self.state = PressState::Idle;
		self.last_tap = None;
		GestureAction::OpenEditor(target)
	}

	pub fn cancel(&mut self) {
		self.state = PressState::Idle;
	}

	pub fn dispose(&mut self) {
		self.state = PressState::Idle;
		self.last_tap = None;
	}

	pub fn pressed_target(&self) -> Option<T> {
		match self.state {
			PressState::Idle => None,
			PressState::Pressed { target, .. } | PressState::Held { target } => Some(target),
		}
	}

	pub fn is_timer_pending(&self) -> bool {
		matches!(self.state, PressState::Pressed { .. })
	}
}

impl<T: Copy + PartialEq> Default for CellGesture<T> {
	fn default() -> Self {
		Self::new(DEFAULT_LONG_PRESS, DEFAULT_DOUBLE_TAP)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateSelection {
	selected: Option<NaiveDate>,
}

impl DateSelection {
	pub fn new(selected: Option<NaiveDate>) -> Self {
		Self { selected }
	}

	pub fn selected(&self) -> Option<NaiveDate> {
		self.selected
	}

	pub fn select(&mut self, date: NaiveDate) {
		self.selected = Some(date);
	}

	pub fn toggle(&mut self, date: NaiveDate) {
		if self.selected == Some(date) {
			self.selected = None;
		} else {
			self.selected = Some(date);
		}
	}

	pub fn target_or(&self, today: NaiveDate) -> NaiveDate {
		self.selected.unwrap_or(today)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDialog {
	date: NaiveDate,
	original: u32,
	working: u32,
}

impl EditDialog {
	pub fn open(date: NaiveDate, stored: u32) -> Self {
		Self {
			date,
			original: stored,
			working: stored,
		}
	}

	pub fn date(&self) -> NaiveDate {
		self.date
	}

	pub fn count(&self) -> u32 {
		self.working
	}

	pub fn is_dirty(&self) -> bool {
		self.working != self.original
	}

	pub fn increment(&mut self) {
		self.working = self.working.saturating_add(1);
	}

	pub fn decrement(&mut self) {
		self.working = self.working.saturating_sub(1);
	}

	pub fn title(&self) -> String {
		format!("Edit {} check-ins", short_label(self.date))
	}

	pub fn commit(self) -> (NaiveDate, i64) {
		(self.date, i64::from(self.working))
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, Instant};

	use chrono::{NaiveDate, TimeZone, Utc};

	use crate::domain::ProjectStore;

	use super::{CellGesture, DateSelection, EditDialog, GestureAction};

	fn day(month: u32, day: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(2024, month, day).expect("valid date")
	}

	fn ms(value: u64) -> Duration {
		Duration::from_millis(value)
	}

	#[test]
	fn short_tap_toggles_selection() {
		let start = Instant::now();
		let mut gesture = CellGesture::default();
		gesture.press(day(3, 5), start);
		assert_eq!(gesture.tick(start + ms(100)), None);
		assert_eq!(
			gesture.release(start + ms(120)),
			Some(GestureAction::ToggleSelection(day(3, 5)))
		);
		assert!(!gesture.is_timer_pending());
	}

	#[test]
	fn long_press_opens_editor_and_swallows_the_tap() {
		let start = Instant::now();
		let mut gesture = CellGesture::default();
		gesture.press(day(3, 5), start);
		assert!(gesture.is_timer_pending());
		assert_eq!(
			gesture.tick(start + ms(450)),
			Some(GestureAction::OpenEditor(day(3, 5)))
		);
		assert_eq!(gesture.tick(start + ms(500)), None);
		assert_eq!(gesture.release(start + ms(600)), None);
	}

	#[test]
	fn late_release_without_tick_still_counts_as_long_press() {
		let start = Instant::now();
		let mut gesture = CellGesture::default();
		let mut selection = DateSelection::new(None);
		gesture.press(day(3, 5), start);

		let action = gesture.release(start + ms(600));
		assert_eq!(action, Some(GestureAction::OpenEditor(day(3, 5))));
		if let Some(GestureAction::ToggleSelection(date)) = action {
			selection.toggle(date);
		}
		assert_eq!(selection.selected(), None);
	}

	#[test]
	fn second_quick_tap_opens_editor() {
		let start = Instant::now();
		let mut gesture = CellGesture::default();
		gesture.press(day(3, 5), start);
		assert_eq!(
			gesture.release(start + ms(50)),
			Some(GestureAction::ToggleSelection(day(3, 5)))
		);
		gesture.press(day(3, 5), start + ms(150));
		assert_eq!(
			gesture.release(start + ms(200)),
			Some(GestureAction::OpenEditor(day(3, 5)))
		);
	}

	#[test]
	fn taps_on_different_cells_are_not_a_double_tap() {
		let start = Instant::now();
		let mut gesture = CellGesture::default();
		gesture.press(day(3, 5), start);
		gesture.release(start + ms(50));
		gesture.press(day(3, 6), start + ms(100));
		assert_eq!(
			gesture.release(start + ms(150)),
			Some(GestureAction::ToggleSelection(day(3, 6)))
		);
	}

	#[test]
	fn cancel_and_dispose_clear_the_timer() {
		let start = Instant::now();
		let mut gesture = CellGesture::new(ms(400), ms(300));
		gesture.press(day(3, 5), start);
		gesture.cancel();
		assert_eq!(gesture.tick(start + ms(1_000)), None);
		assert_eq!(gesture.release(start + ms(1_000)), None);

		gesture.press(day(3, 5), start);
		gesture.dispose();
		assert_eq!(gesture.pressed_target(), None);
		assert_eq!(gesture.tick(start + ms(1_000)), None);
	}

	#[test]
	fn double_activation_opens_editor_directly() {
		let mut gesture = CellGesture::default();
		assert_eq!(
			gesture.double_activate(day(1, 1)),
			GestureAction::OpenEditor(day(1, 1))
		);
	}

	#[test]
	fn selection_toggles_and_falls_back_to_today() {
		let mut selection = DateSelection::new(Some(day(3, 5)));
		selection.toggle(day(3, 5));
		assert_eq!(selection.selected(), None);
		assert_eq!(selection.target_or(day(3, 9)), day(3, 9));
		selection.toggle(day(3, 6));
		assert_eq!(selection.target_or(day(3, 9)), day(3, 6));
	}

	#[test]
	fn edit_dialog_commits_working_copy_only() {
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let mut store = ProjectStore::with_defaults(now);
		store.set_log_count("1", day(3, 5), 2).expect("set should work");

		let mut dialog = EditDialog::open(day(3, 5), store.project("1").expect("exists").count_on(day(3, 5)));
		dialog.increment();
		dialog.increment();
		assert_eq!(dialog.count(), 4);
		assert!(dialog.is_dirty());
		assert_eq!(store.project("1").map(|p| p.count_on(day(3, 5))), Some(2));

		for _ in 0..10 {
			dialog.decrement();
		}
		assert_eq!(dialog.count(), 0);

		let (date, count) = dialog.commit();
		store.set_log_count("1", date, count).expect("set should work");
		assert!(!store.project("1").expect("exists").logs.contains_key(&day(3, 5)));
	}

	#[test]
	fn editor_opens_for_days_without_activity() {
		let dialog = EditDialog::open(day(7, 4), 0);
		assert_eq!(dialog.count(), 0);
		assert_eq!(dialog.title(), "Edit 07/04 check-ins");
	}
}
