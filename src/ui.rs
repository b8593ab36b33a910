use std::error::Error;
use std::io;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Datelike, Local, NaiveDate};
use crossterm::event::{
	self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEventKind, MouseButton,
	MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::{error, info};

use crate::calendar::{days_in_month, short_label, GridSlot, YearGrid, YearHeatmap, DAY_ROWS, MONTH_COLUMNS};
use crate::colors::{color_for_count, generate_color_levels, normalize_color, Rgb};
use crate::config::Settings;
use crate::domain::{CheckInShape, Project, ProjectMode, ProjectPatch, ProjectStore};
use crate::interaction::{CellGesture, DateSelection, EditDialog, GestureAction};
use crate::progress::{format_hours, overall_summary, progress_bar, project_progress, OverallSummary, Progress};
use crate::storage::save_store;

const THEME_PRESETS: [(&str, &str); 7] = [
	("Blue", "#3b82f6"),
	("Pink", "#ec4899"),
	("Amber", "#f59e0b"),
	("Emerald", "#10b981"),
	("Rose", "#f43f5e"),
	("Violet", "#8b5cf6"),
	("Slate", "#64748b"),
];
const POLL_INTERVAL: StdDuration = StdDuration::from_millis(50);
const IDLE_POLL_INTERVAL: StdDuration = StdDuration::from_millis(250);
const LABEL_WIDTH: u16 = 3;
const CELL_WIDTH: u16 = 3;
const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const EMPTY_CELL_COLOR: Color = Color::Rgb(70, 70, 70);

pub fn run_dashboard(store: &mut ProjectStore, store_path: &Path, settings: &Settings) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, store, store_path, settings);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	store: &mut ProjectStore,
	store_path: &Path,
	settings: &Settings,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::new(Local::now().date_naive(), settings);
	info!(store = %store_path.display(), "dashboard opened");

	loop {
		let today = Local::now().date_naive();
		terminal.draw(|frame| draw_dashboard(frame, &mut app, store, today))?;

		if let Some(action) = app.gesture.tick(Instant::now()) {
			apply_gesture(&mut app, store, action);
			continue;
		}

		let timeout = if app.gesture.is_timer_pending() {
			POLL_INTERVAL
		} else {
			IDLE_POLL_INTERVAL
		};
		if !event::poll(timeout)? {
			continue;
		}

		match event::read()? {
			CEvent::Key(key) if key.kind == KeyEventKind::Press => {
				let should_quit = match &app.mode {
					InputMode::Normal => handle_normal_key(&mut app, key.code, store, store_path, today),
					InputMode::Edit(_) => handle_edit_key(&mut app, key.code, store, store_path),
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, store, store_path),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, store, store_path),
				};

				if should_quit {
					break;
				}
			}
			CEvent::Mouse(mouse) => handle_mouse(&mut app, mouse, store),
			_ => {}
		}
	}

	app.gesture.dispose();
	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &mut App, store: &ProjectStore, today: NaiveDate) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(12), Constraint::Length(4)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Length(LABEL_WIDTH + CELL_WIDTH * MONTH_COLUMNS as u16 + 2), Constraint::Min(30)])
		.split(layout[1]);

	render_project_tabs(frame, layout[0], store);

	app.grid_area = None;
	if let Some(project) = store.active_project() {
		match project.mode {
			ProjectMode::Calendar => render_heatmap_panel(frame, body[0], app, project, today),
			ProjectMode::Gallery => render_gallery_panel(frame, body[0], app, project),
		}
		render_summary_panel(frame, body[1], app, project, &overall_summary(store), today);
	}
	render_footer(frame, layout[2], app, store.active_project().map(|project| project.mode));

	match &app.mode {
		InputMode::Edit(dialog) => {
			let accent = store
				.active_project()
				.map(|project| rgb_color(project.theme_rgb()))
				.unwrap_or(Color::White);
			render_edit_popup(frame, dialog, accent);
		}
		InputMode::Select(select) => render_select_popup(frame, select),
		InputMode::Normal | InputMode::Prompt(_) => {}
	}
}

fn render_project_tabs(frame: &mut Frame, area: Rect, store: &ProjectStore) {
	let active = store.active_project_id();
	let mut spans = Vec::new();
	for project in store.projects() {
		let icon = match project.mode {
			ProjectMode::Calendar => "#",
			ProjectMode::Gallery => "@",
		};
		let label = format!(" {icon} {} ", project.name);
		let style = if Some(project.id.as_str()) == active {
			let theme = project.theme_rgb();
			let text = if theme.luminance() > 0.4 { Color::Black } else { Color::White };
			Style::default()
				.fg(text)
				.bg(rgb_color(theme))
				.add_modifier(Modifier::BOLD)
		} else {
			Style::default().fg(Color::Gray)
		};
		spans.push(Span::styled(label, style));
		spans.push(Span::raw(" "));
	}

	let tabs = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title("Projects"));
	frame.render_widget(tabs, area);
}

fn render_heatmap_panel(frame: &mut Frame, area: Rect, app: &mut App, project: &Project, today: NaiveDate) {
	let heatmap = YearHeatmap::build(app.year, project);
	let palette = generate_color_levels(&project.color_base);
	let selected = app.selection.selected();

	let mut lines = Vec::new();
	let mut header = vec![Span::raw(" ".repeat(LABEL_WIDTH as usize))];
	for month in 1..=MONTH_COLUMNS {
		header.push(Span::styled(format!("{month:>2} "), Style::default().fg(Color::DarkGray)));
	}
	lines.push(Line::from(header));

	for day in 1..=DAY_ROWS {
		let label = if day == 1 || day % 5 == 0 { format!("{day:>2} ") } else { "   ".to_string() };
		let mut spans = vec![Span::styled(label, Style::default().fg(Color::DarkGray))];
		for month in 1..=MONTH_COLUMNS {
			let Some(cell) = heatmap.cell(month, day) else {
				spans.push(Span::raw(" ".repeat(CELL_WIDTH as usize)));
				continue;
			};

			let color = color_for_count(cell.count, &project.check_in_levels, &palette);
			let glyph = match (color, project.check_in_shape) {
				(None, _) => " · ",
				(Some(_), CheckInShape::Square) => "██ ",
				(Some(_), CheckInShape::Circle) => " ● ",
			};
			let mut style = match color {
				Some(color) => Style::default().fg(rgb_color(color)),
				None => Style::default().fg(EMPTY_CELL_COLOR),
			};
			if cell.date == app.cursor {
				style = style.bg(HIGHLIGHT_BACKGROUND_COLOR);
			}
			if Some(cell.date) == selected {
				style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
			}
			if cell.date == today {
				style = style.add_modifier(Modifier::UNDERLINED);
			}
			spans.push(Span::styled(glyph, style));
		}
		lines.push(Line::from(spans));
	}

	let title = format!(
		"{} {} | {} active days",
		project.name,
		app.year,
		heatmap.active_days()
	);
	let block = Block::default()
		.borders(Borders::ALL)
		.title(title)
		.border_style(Style::default().fg(rgb_color(project.theme_rgb())));
	let inner = block.inner(area);
	app.grid_area = Some(inner);
	frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_gallery_panel(frame: &mut Frame, area: Rect, app: &App, project: &Project) {
	let items = if project.photos.is_empty() {
		vec![ListItem::new("(no photos yet, press a to add one)")]
	} else {
		project
			.photos
			.iter()
			.enumerate()
			.map(|(index, photo)| ListItem::new(format!("{:>3}. {photo}", index + 1)))
			.collect::<Vec<_>>()
	};

	let mut state = ListState::default();
	if !project.photos.is_empty() {
		state.select(Some(app.photo_index.min(project.photos.len() - 1)));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title(format!(
			"{} | {} photos | {}",
			project.name,
			project.photos.len(),
			project.photo_aspect_ratio.label()
		))
		.border_style(Style::default().fg(rgb_color(project.theme_rgb())));
	let list = List::new(items)
		.block(block)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));
	frame.render_stateful_widget(list, area, &mut state);
}

fn render_summary_panel(
	frame: &mut Frame,
	area: Rect,
	app: &App,
	project: &Project,
	overall: &OverallSummary,
	today: NaiveDate,
) {
	let theme = project.theme_rgb();
	let mut lines = Vec::new();
	lines.push(Line::from(Span::styled(
		project.name.clone(),
		Style::default().fg(rgb_color(theme)).add_modifier(Modifier::BOLD),
	)));
	if let Some(description) = &project.description {
		lines.push(Line::from(description.clone()));
	}
	lines.push(Line::from(format!("Mode: {} | Theme: {}", project.mode.label(), project.color_base)));
	lines.push(Line::from(""));

	match project_progress(project) {
		Progress::Calendar(progress) => {
			let target = app.selection.target_or(today);
			let count = project.count_on(target);
			let target_label = if app.selection.selected().is_some() {
				short_label(target)
			} else {
				format!("Today {}", short_label(target))
			};
			lines.push(Line::from(format!("{target_label}: {count} check-ins")));
			lines.push(Line::from(if project.has_activity_on(today) {
				"Checked in today"
			} else {
				"Not checked in today"
			}));
			lines.push(Line::from(""));
			lines.push(Line::from(format!(
				"{} / {} ({:.0}%)",
				format_hours(progress.total_hours),
				format_hours(progress.goal_hours),
				progress.percent
			)));
			lines.push(Line::from(Span::styled(
				progress_bar(progress.percent, 24),
				Style::default().fg(rgb_color(theme)),
			)));
			if progress.is_mastered() {
				lines.push(Line::from("Mastered!"));
			} else {
				lines.push(Line::from(format!("{} to go", format_hours(progress.remaining_hours()))));
			}
			lines.push(Line::from(""));
			lines.push(Line::from("Levels"));
			lines.push(legend_line(project));
		}
		Progress::Gallery { photo_count } => {
			lines.push(Line::from(format!("{photo_count} photos collected")));
			if let Some(photo) = project.photos.get(app.photo_index) {
				lines.push(Line::from(format!("Selected #{}: {photo}", app.photo_index + 1)));
			}
		}
	}

	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled("All projects", Style::default().add_modifier(Modifier::BOLD))));
	lines.push(Line::from(format!(
		"{} check-ins | {} | {} of {} mastered",
		overall.total_check_ins,
		format_hours(overall.total_hours),
		overall.mastered,
		overall.projects
	)));

	let panel = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title("Progress")
			.border_style(Style::default().fg(Color::DarkGray)),
	);
	frame.render_widget(panel, area);
}

fn legend_line(project: &Project) -> Line<'static> {
	let palette = generate_color_levels(&project.color_base);
	let mut spans = Vec::new();
	for (color, threshold) in palette.iter().zip(project.check_in_levels.iter()) {
		spans.push(Span::styled("██", Style::default().fg(rgb_color(*color))));
		spans.push(Span::raw(format!(" {threshold}+  ")));
	}
	Line::from(spans)
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, mode: Option<ProjectMode>) {
	let footer_lines = match &app.mode {
		InputMode::Normal => {
			let keys = match mode {
				Some(ProjectMode::Gallery) => {
					"j/k move | a add photo | r replace | d delete photo"
				}
				_ => "arrows/hjkl move | Enter select | space +1 | e edit count | </> year",
			};
			vec![
				Line::from(format!("{keys} | [ ] project | n new | g goal | c color | x delete project | q quit")),
				Line::from(app.status.clone()),
			]
		}
		InputMode::Edit(_) => vec![
			Line::from("+/- or up/down change | Enter save | Esc cancel"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(format!("{} > {}", prompt.title, prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_edit_popup(frame: &mut Frame, dialog: &EditDialog, accent: Color) {
	let area = centered_rect(40, 30, frame.area());
	frame.render_widget(Clear, area);

	let lines = vec![
		Line::from(dialog.date().format("%A, %B %-d %Y").to_string()),
		Line::from(""),
		Line::from(vec![
			Span::raw("   -   "),
			Span::styled(
				format!("{:^6}", dialog.count()),
				Style::default().fg(accent).add_modifier(Modifier::BOLD),
			),
			Span::raw("   +"),
		]),
		Line::from(""),
		Line::from(if dialog.is_dirty() { "unsaved change" } else { "" }),
	];
	let popup = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title(dialog.title())
			.border_style(Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)),
	);
	frame.render_widget(popup, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(50, 50, frame.area());
	frame.render_widget(Clear, area);

	let items = select
		.options
		.iter()
		.map(|option| ListItem::new(option.label.clone()).style(option.style))
		.collect::<Vec<_>>();
	let list = List::new(items)
		.block(Block::default().borders(Borders::ALL).title(select.title.clone()))
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len() - 1)));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_normal_key(
	app: &mut App,
	code: KeyCode,
	store: &mut ProjectStore,
	store_path: &Path,
	today: NaiveDate,
) -> bool {
	let Some(project) = store.active_project() else {
		return matches!(code, KeyCode::Char('q'));
	};
	let project_id = project.id.clone();
	let mode = project.mode;

	match code {
		KeyCode::Char('q') => return true,
		KeyCode::Char('[') => switch_project(app, store, store_path, -1),
		KeyCode::Char(']') => switch_project(app, store, store_path, 1),
		KeyCode::Char('n') => {
			app.mode = InputMode::Prompt(PromptState::new("New project name", PromptKind::NewProjectName));
		}
		KeyCode::Char('g') => {
			app.mode = InputMode::Prompt(PromptState::new(
				"Goal hours",
				PromptKind::GoalHours { project_id },
			));
		}
		KeyCode::Char('c') => {
			app.mode = InputMode::Select(build_color_select(ColorTarget::Existing { project_id }));
		}
		KeyCode::Char('x') => {
			app.mode = InputMode::Select(build_delete_confirm(project));
		}
		_ if mode == ProjectMode::Gallery => handle_gallery_key(app, code, store, store_path, &project_id),
		_ => handle_calendar_key(app, code, store, store_path, &project_id, today),
	}

	false
}

fn handle_calendar_key(
	app: &mut App,
	code: KeyCode,
	store: &mut ProjectStore,
	store_path: &Path,
	project_id: &str,
	today: NaiveDate,
) {
	let grid = YearGrid::new(app.year);
	match code {
		KeyCode::Left | KeyCode::Char('h') => app.move_cursor(grid.step(app.cursor, -1, 0)),
		KeyCode::Right | KeyCode::Char('l') => app.move_cursor(grid.step(app.cursor, 1, 0)),
		KeyCode::Up | KeyCode::Char('k') => app.move_cursor(grid.step(app.cursor, 0, -1)),
		KeyCode::Down | KeyCode::Char('j') => app.move_cursor(grid.step(app.cursor, 0, 1)),
		KeyCode::Char('<') => app.shift_year(-1),
		KeyCode::Char('>') => app.shift_year(1),
		KeyCode::Enter => {
			app.selection.toggle(app.cursor);
			app.status = match app.selection.selected() {
				Some(date) => format!("selected {}", short_label(date)),
				None => "selection cleared, check-ins go to today".to_string(),
			};
		}
		KeyCode::Char(' ') => {
			let date = app.selection.target_or(today);
			let result = store
				.log_check_in(project_id, date)
				.map(|project| project.count_on(date));
			app.status = match result {
				Ok(count) => persisted(store_path, store, format!("{} +1 ({count} total)", short_label(date))),
				Err(err) => format!("error: {err}"),
			};
		}
		KeyCode::Char('e') => {
			let action = app.gesture.double_activate(app.cursor);
			apply_gesture(app, store, action);
		}
		_ => {}
	}
}

fn handle_gallery_key(app: &mut App, code: KeyCode, store: &mut ProjectStore, store_path: &Path, project_id: &str) {
	let photo_count = store.project(project_id).map(|project| project.photos.len()).unwrap_or(0);
	match code {
		KeyCode::Up | KeyCode::Char('k') => app.photo_index = app.photo_index.saturating_sub(1),
		KeyCode::Down | KeyCode::Char('j') => {
			app.photo_index = (app.photo_index + 1).min(photo_count.saturating_sub(1));
		}
		KeyCode::Char('a') => {
			app.mode = InputMode::Prompt(PromptState::new(
				"Photo path or URL",
				PromptKind::AddPhoto {
					project_id: project_id.to_string(),
				},
			));
		}
		KeyCode::Char('r') => {
			app.mode = InputMode::Prompt(PromptState::new(
				format!("Replace photo #{}", app.photo_index + 1),
				PromptKind::ReplacePhoto {
					project_id: project_id.to_string(),
					index: app.photo_index,
				},
			));
		}
		KeyCode::Char('d') => {
			let index = app.photo_index;
			app.status = match store.delete_photo(project_id, index) {
				Ok(project) => {
					app.photo_index = app.photo_index.min(project.photos.len().saturating_sub(1));
					persisted(store_path, store, format!("deleted photo #{}", index + 1))
				}
				Err(err) => format!("error: {err}"),
			};
		}
		_ => {}
	}
}

fn handle_edit_key(app: &mut App, code: KeyCode, store: &mut ProjectStore, store_path: &Path) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "edit cancelled".to_string();
		}
		KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up | KeyCode::Right => {
			if let InputMode::Edit(dialog) = &mut app.mode {
				dialog.increment();
			}
		}
		KeyCode::Char('-') | KeyCode::Down | KeyCode::Left => {
			if let InputMode::Edit(dialog) = &mut app.mode {
				dialog.decrement();
			}
		}
		KeyCode::Enter => {
			let InputMode::Edit(dialog) = std::mem::replace(&mut app.mode, InputMode::Normal) else {
				return false;
			};
			let Some(project_id) = store.active_project_id().map(str::to_string) else {
				return false;
			};

			let (date, count) = dialog.commit();
			app.status = match store.set_log_count(&project_id, date, count) {
				Ok(_) => persisted(store_path, store, format!("{}: {count} check-ins", short_label(date))),
				Err(err) => format!("error: {err}"),
			};
		}
		_ => {}
	}

	false
}

fn handle_mouse(app: &mut App, mouse: MouseEvent, store: &ProjectStore) {
	if !matches!(app.mode, InputMode::Normal) {
		return;
	}

	let now = Instant::now();
	let hit = app.cell_at(mouse.column, mouse.row);
	match mouse.kind {
		MouseEventKind::Down(MouseButton::Left) => {
			if let Some(date) = hit {
				app.cursor = date;
				app.gesture.press(date, now);
			}
		}
		MouseEventKind::Drag(MouseButton::Left) => {
			if hit != app.gesture.pressed_target() {
				app.gesture.cancel();
			}
		}
		MouseEventKind::Up(MouseButton::Left) => {
			if let Some(action) = app.gesture.release(now) {
				apply_gesture(app, store, action);
			}
		}
		_ => {}
	}
}

fn apply_gesture(app: &mut App, store: &ProjectStore, action: GestureAction<NaiveDate>) {
	match action {
		GestureAction::ToggleSelection(date) => {
			app.cursor = date;
			app.selection.toggle(date);
			app.status = match app.selection.selected() {
				Some(date) => format!("selected {}", short_label(date)),
				None => "selection cleared".to_string(),
			};
		}
		GestureAction::OpenEditor(date) => {
			if !matches!(app.mode, InputMode::Normal) {
				return;
			}
			let stored = store.active_project().map(|project| project.count_on(date)).unwrap_or(0);
			app.cursor = date;
			app.mode = InputMode::Edit(EditDialog::open(date, stored));
		}
	}
}

fn switch_project(app: &mut App, store: &mut ProjectStore, store_path: &Path, delta: i32) {
	let ids = store
		.projects()
		.iter()
		.map(|project| project.id.clone())
		.collect::<Vec<_>>();
	let Some(current) = store
		.active_project_id()
		.and_then(|id| ids.iter().position(|candidate| candidate == id))
	else {
		return;
	};

	let next = (current as i32 + delta).rem_euclid(ids.len() as i32) as usize;
	app.status = match store.set_active(&ids[next]) {
		Ok(project) => {
			let message = format!("switched to {}", project.name);
			app.photo_index = 0;
			app.gesture.dispose();
			persisted(store_path, store, message)
		}
		Err(err) => format!("error: {err}"),
	};
}

fn handle_prompt_key(app: &mut App, code: KeyCode, store: &mut ProjectStore, store_path: &Path) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let InputMode::Prompt(prompt) = std::mem::replace(&mut app.mode, InputMode::Normal) else {
				return false;
			};

			match submit_prompt(prompt.clone(), app, store, store_path) {
				Ok(Outcome::Select(select)) => app.mode = InputMode::Select(select),
				Ok(Outcome::Prompt(next)) => app.mode = InputMode::Prompt(next),
				Ok(Outcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key(app: &mut App, code: KeyCode, store: &mut ProjectStore, store_path: &Path) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let InputMode::Select(select) = std::mem::replace(&mut app.mode, InputMode::Normal) else {
				return false;
			};

			match submit_select(select.clone(), store, store_path, app.default_goal_hours) {
				Ok(Outcome::Select(next)) => app.mode = InputMode::Select(next),
				Ok(Outcome::Prompt(prompt)) => app.mode = InputMode::Prompt(prompt),
				Ok(Outcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(
	prompt: PromptState,
	app: &mut App,
	store: &mut ProjectStore,
	store_path: &Path,
) -> Result<Outcome, String> {
	match prompt.kind {
		PromptKind::NewProjectName => {
			let name = required_text(&prompt.input, "project name")?;
			Ok(Outcome::Select(build_mode_select(name)))
		}
		PromptKind::CustomColor { target } => {
			let raw = required_text(&prompt.input, "color")?;
			let color = normalize_color(&raw);
			apply_color(target, color, store, store_path, app.default_goal_hours)
		}
		PromptKind::GoalHours { project_id } => {
			let goal_hours = required_text(&prompt.input, "goal hours")?
				.parse::<f64>()
				.map_err(|_| "goal hours must be a number".to_string())?;
			let project = store
				.update_project(
					&project_id,
					ProjectPatch {
						goal_hours: Some(goal_hours),
						..ProjectPatch::default()
					},
				)
				.map_err(|err| err.to_string())?;
			let message = format!("goal for {} set to {}", project.name, format_hours(goal_hours));
			Ok(Outcome::Done(persisted(store_path, store, message)))
		}
		PromptKind::AddPhoto { project_id } => {
			let reference = required_text(&prompt.input, "photo")?;
			let total = store
				.add_photo(&project_id, reference)
				.map_err(|err| err.to_string())?
				.photos
				.len();
			app.photo_index = total - 1;
			Ok(Outcome::Done(persisted(store_path, store, format!("added photo #{total}"))))
		}
		PromptKind::ReplacePhoto { project_id, index } => {
			let reference = required_text(&prompt.input, "photo")?;
			store
				.replace_photo(&project_id, index, reference)
				.map_err(|err| err.to_string())?;
			Ok(Outcome::Done(persisted(store_path, store, format!("replaced photo #{}", index + 1))))
		}
	}
}

fn submit_select(
	select: SelectState,
	store: &mut ProjectStore,
	store_path: &Path,
	default_goal_hours: f64,
) -> Result<Outcome, String> {
	let value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::NewProjectMode { name } => {
			let mode = if value == ProjectMode::Gallery.label() {
				ProjectMode::Gallery
			} else {
				ProjectMode::Calendar
			};
			Ok(Outcome::Select(build_color_select(ColorTarget::New { name, mode })))
		}
		SelectKind::Color { target } => {
			if value == CUSTOM_COLOR {
				return Ok(Outcome::Prompt(PromptState::new(
					"Hex color (#rrggbb)",
					PromptKind::CustomColor { target },
				)));
			}
			apply_color(target, value, store, store_path, default_goal_hours)
		}
		SelectKind::DeleteProject { project_id, name } => {
			if value != "delete" {
				return Ok(Outcome::Done("Delete cancelled".to_string()));
			}
			store.delete_project(&project_id).map_err(|err| err.to_string())?;
			Ok(Outcome::Done(persisted(store_path, store, format!("deleted project: {name}"))))
		}
	}
}

fn apply_color(
	target: ColorTarget,
	color: String,
	store: &mut ProjectStore,
	store_path: &Path,
	default_goal_hours: f64,
) -> Result<Outcome, String> {
	match target {
		ColorTarget::New { name, mode } => {
			let project = store
				.create_project(
					ProjectPatch {
						name: Some(name),
						mode: Some(mode),
						color_base: Some(color),
						goal_hours: Some(default_goal_hours),
						..ProjectPatch::default()
					},
					chrono::Utc::now(),
				)
				.map_err(|err| err.to_string())?;
			let message = format!("created project: {}", project.name);
			Ok(Outcome::Done(persisted(store_path, store, message)))
		}
		ColorTarget::Existing { project_id } => {
			let project = store
				.update_project(
					&project_id,
					ProjectPatch {
						color_base: Some(color),
						..ProjectPatch::default()
					},
				)
				.map_err(|err| err.to_string())?;
			let message = format!("{} now uses {}", project.name, project.color_base);
			Ok(Outcome::Done(persisted(store_path, store, message)))
		}
	}
}

fn build_mode_select(name: String) -> SelectState {
	let options = vec![
		SelectOption::new("Calendar (daily check-ins)", ProjectMode::Calendar.label(), Style::default()),
		SelectOption::new("Gallery (photo journal)", ProjectMode::Gallery.label(), Style::default()),
	];
	SelectState::new(format!("How should \"{name}\" be tracked?"), SelectKind::NewProjectMode { name }, options)
}

fn build_color_select(target: ColorTarget) -> SelectState {
	let mut options = THEME_PRESETS
		.iter()
		.map(|(label, hex)| {
			let color = Rgb::parse_hex(hex).map(rgb_color).unwrap_or(Color::White);
			SelectOption::new(format!("████ {label} {hex}"), *hex, Style::default().fg(color))
		})
		.collect::<Vec<_>>();
	options.push(SelectOption::new("Custom hex...", CUSTOM_COLOR, Style::default().fg(Color::Gray)));
	SelectState::new("Select theme color", SelectKind::Color { target }, options)
}

fn build_delete_confirm(project: &Project) -> SelectState {
	let options = vec![
		SelectOption::new("Keep project", "keep", Style::default()),
		SelectOption::new(
			format!("Delete \"{}\" and its history", project.name),
			"delete",
			Style::default().fg(Color::LightRed),
		),
	];
	SelectState::new(
		"Delete project?",
		SelectKind::DeleteProject {
			project_id: project.id.clone(),
			name: project.name.clone(),
		},
		options,
	)
}

fn persisted(path: &Path, store: &ProjectStore, message: String) -> String {
	match save_store(path, store) {
		Ok(()) => message,
		Err(err) => {
			error!(%err, path = %path.display(), "failed to save store");
			format!("{message} (not saved: {err})")
		}
	}
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let value = input.trim();
	if value.is_empty() {
		Err(format!("{field_name} is required"))
	} else {
		Ok(value.to_string())
	}
}

fn rgb_color(rgb: Rgb) -> Color {
	Color::Rgb(rgb.r, rgb.g, rgb.b)
}

const CUSTOM_COLOR: &str = "custom";

#[derive(Debug, Clone)]
enum Outcome {
	Prompt(PromptState),
	Select(SelectState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
			kind,
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	NewProjectName,
	CustomColor { target: ColorTarget },
	GoalHours { project_id: String },
	AddPhoto { project_id: String },
	ReplacePhoto { project_id: String, index: usize },
}

#[derive(Debug, Clone)]
enum ColorTarget {
	New { name: String, mode: ProjectMode },
	Existing { project_id: String },
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: String,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: impl Into<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value: value.into(),
			style,
		}
	}
}

#[derive(Debug, Clone)]
enum SelectKind {
	NewProjectMode { name: String },
	Color { target: ColorTarget },
	DeleteProject { project_id: String, name: String },
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Edit(EditDialog),
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Debug)]
struct App {
	year: i32,
	cursor: NaiveDate,
	selection: DateSelection,
	gesture: CellGesture<NaiveDate>,
	photo_index: usize,
	mode: InputMode,
	status: String,
	grid_area: Option<Rect>,
	default_goal_hours: f64,
}

impl App {
	fn new(today: NaiveDate, settings: &Settings) -> Self {
		Self {
			year: today.year(),
			cursor: today,
			selection: DateSelection::new(Some(today)),
			gesture: CellGesture::new(settings.long_press(), settings.double_tap()),
			photo_index: 0,
			mode: InputMode::Normal,
			status: "Ready".to_string(),
			grid_area: None,
			default_goal_hours: settings.default_goal_hours(),
		}
	}

	fn move_cursor(&mut self, date: NaiveDate) {
		self.cursor = date;
		self.selection.select(date);
	}

	fn shift_year(&mut self, delta: i32) {
		self.year += delta;
		let month = self.cursor.month();
		let day = self.cursor.day().min(days_in_month(self.year, month));
		if let Some(date) = NaiveDate::from_ymd_opt(self.year, month, day) {
			self.cursor = date;
		}
		self.gesture.dispose();
		self.status = format!("showing {}", self.year);
	}

	fn cell_at(&self, column: u16, row: u16) -> Option<NaiveDate> {
		let area = self.grid_area?;
		let x = column.checked_sub(area.x + LABEL_WIDTH)?;
		let y = row.checked_sub(area.y + 1)?;
		if y >= area.height.saturating_sub(1) {
			return None;
		}

		let month = u32::from(x / CELL_WIDTH) + 1;
		let day = u32::from(y) + 1;
		match YearGrid::new(self.year).slot(month, day) {
			GridSlot::Day(date) => Some(date),
			GridSlot::Padding => None,
		}
	}
}
