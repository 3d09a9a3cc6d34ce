use crate::{
    catalog::Catalog,
    config::{base_data_dir, AppConfig},
    game::{Game, Manifest},
    manifest::{fetch_manifest, FetchError, ManifestLocation},
    view::{Filter, SortField},
};
use anyhow::{Context, Result};
use arboard::Clipboard;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
    time::{Duration, Instant},
};

const SEARCH_DEBOUNCE_MS: u64 = 250;
const LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search {
        buffer: String,
        previous: String,
        last_edit_at: Instant,
    },
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub expires_at: Instant,
}

enum FetchMessage {
    Completed {
        request: u64,
        location: ManifestLocation,
        result: Result<Manifest, FetchError>,
    },
}

pub struct App {
    pub app_config: AppConfig,
    pub catalog: Catalog,
    pub location: ManifestLocation,
    pub status: String,
    pub selected: usize,
    pub input_mode: InputMode,
    pub detail_open: bool,
    pub help_open: bool,
    pub should_quit: bool,
    pub logs: Vec<LogEntry>,
    pub log_scroll: usize,
    pub toast: Option<Toast>,
    pub list_view_height: usize,
    log_path: Option<PathBuf>,
    clipboard: Option<Clipboard>,
    fetch_tx: Sender<FetchMessage>,
    fetch_rx: Receiver<FetchMessage>,
    fetch_requests: u64,
    fetches_in_flight: usize,
}

impl App {
    pub fn initialize(manifest_override: Option<&str>) -> Result<Self> {
        let app_config = AppConfig::load_or_create()?;
        let data_dir = base_data_dir()?;
        fs::create_dir_all(&data_dir).context("create app data dir")?;
        let location = app_config.manifest_location(manifest_override);
        let mut app = App::new(app_config, location, Some(data_dir.join("ludoteca.log")));
        app.log_info(format!("Ludoteca v{} started", env!("CARGO_PKG_VERSION")));
        app.request_fetch();
        Ok(app)
    }

    pub fn new(app_config: AppConfig, location: ManifestLocation, log_path: Option<PathBuf>) -> Self {
        let catalog = Catalog::with_selection(app_config.default_selection());
        let (fetch_tx, fetch_rx) = mpsc::channel();
        Self {
            app_config,
            catalog,
            location,
            status: "Ready".to_string(),
            selected: 0,
            input_mode: InputMode::Normal,
            detail_open: false,
            help_open: false,
            should_quit: false,
            logs: Vec::new(),
            log_scroll: 0,
            toast: None,
            list_view_height: 0,
            log_path,
            clipboard: None,
            fetch_tx,
            fetch_rx,
            fetch_requests: 0,
            fetches_in_flight: 0,
        }
    }

    pub fn tick(&mut self) {
        if let Some(toast) = &self.toast {
            if toast.expires_at <= Instant::now() {
                self.toast = None;
            }
        }
        self.maybe_apply_search();
        self.poll_fetch();
        self.clamp_selection();
    }

    /// Starts a manifest fetch on a worker thread. A second request does
    /// not cancel the first; whichever completes last is applied.
    pub fn request_fetch(&mut self) {
        self.fetch_requests += 1;
        self.fetches_in_flight += 1;
        self.catalog.begin_fetch();
        let request = self.fetch_requests;
        let location = self.location.clone();
        let tx = self.fetch_tx.clone();
        self.status = format!("Loading {location}");
        self.log_info(format!("Fetching manifest #{request} from {location}"));
        thread::spawn(move || {
            let result = fetch_manifest(&location);
            let _ = tx.send(FetchMessage::Completed {
                request,
                location,
                result,
            });
        });
    }

    pub fn poll_fetch(&mut self) {
        loop {
            match self.fetch_rx.try_recv() {
                Ok(FetchMessage::Completed {
                    request,
                    location,
                    result,
                }) => {
                    self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
                    self.apply_fetch_result(request, &location, result);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply_fetch_result(
        &mut self,
        request: u64,
        location: &ManifestLocation,
        result: Result<Manifest, FetchError>,
    ) {
        let failed = result.is_err();
        self.catalog.finish_fetch(result);
        if self.fetches_in_flight > 0 {
            self.catalog.begin_fetch();
        }
        if failed {
            let error = self.catalog.error().unwrap_or("unknown error").to_string();
            self.status = format!("Load failed: {error}");
            self.log_error(format!("Manifest #{request} from {location} failed: {error}"));
            self.set_toast(&format!("Load failed: {error}"), ToastLevel::Error, Duration::from_secs(4));
            return;
        }

        let total = self.catalog.total_games_count();
        let sources = self.catalog.known_sources().len();
        self.status = format!("Loaded {total} games from {sources} sources");
        self.log_info(format!(
            "Manifest #{request} loaded: {total} games, {sources} sources"
        ));
        if let Some(updated) = self.catalog.last_updated() {
            let updated = updated.to_string();
            self.log_info(format!("Manifest last updated {updated}"));
        }
        match self.catalog.selected_game_index() {
            Some(index) => self.reselect_game(Some(index)),
            None => self.clamp_selection(),
        }
        self.sync_detail();
    }

    pub fn fetch_pending(&self) -> bool {
        self.fetches_in_flight > 0
    }

    pub fn selected_game_index(&self) -> Option<usize> {
        self.catalog.view().rows.get(self.selected).map(|row| row.index)
    }

    pub fn selected_game(&self) -> Option<&Game> {
        self.selected_game_index()
            .and_then(|index| self.catalog.games().get(index))
    }

    pub fn clamp_selection(&mut self) {
        let len = self.catalog.view().rows.len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.sync_detail();
    }

    pub fn move_down(&mut self) {
        self.selected = self.selected.saturating_add(1);
        self.clamp_selection();
        self.sync_detail();
    }

    pub fn page_up(&mut self) {
        let page = self.list_view_height.saturating_sub(1).max(1);
        self.selected = self.selected.saturating_sub(page);
        self.sync_detail();
    }

    pub fn page_down(&mut self) {
        let page = self.list_view_height.saturating_sub(1).max(1);
        self.selected = self.selected.saturating_add(page);
        self.clamp_selection();
        self.sync_detail();
    }

    pub fn jump_to_start(&mut self) {
        self.selected = 0;
        self.sync_detail();
    }

    pub fn jump_to_end(&mut self) {
        self.selected = usize::MAX;
        self.clamp_selection();
        self.sync_detail();
    }

    pub fn toggle_detail(&mut self) {
        if self.detail_open {
            self.close_detail();
        } else {
            self.open_detail();
        }
    }

    pub fn open_detail(&mut self) {
        match self.selected_game_index() {
            Some(index) => {
                self.catalog.set_selected_game(index);
                self.detail_open = true;
            }
            None => {
                self.status = "No game selected".to_string();
            }
        }
    }

    pub fn close_detail(&mut self) {
        self.catalog.clear_selected_game();
        self.detail_open = false;
    }

    fn sync_detail(&mut self) {
        if !self.detail_open {
            return;
        }
        match self.selected_game_index() {
            Some(index) => self.catalog.set_selected_game(index),
            None => self.close_detail(),
        }
    }

    pub fn cycle_platform(&mut self, direction: i32) {
        let options = self.catalog.known_platforms();
        let next = next_filter(&self.catalog.selection().platform, &options, direction);
        self.catalog.set_selected_platform(next);
        self.status = format!("Platform: {}", self.catalog.selection().platform);
    }

    pub fn cycle_source(&mut self, direction: i32) {
        let options = self.catalog.known_sources();
        let next = next_filter(&self.catalog.selection().source, &options, direction);
        self.catalog.set_selected_source(next);
        // The detail view is keyed by per-source rank and was cleared.
        self.detail_open = false;
        self.selected = 0;
        self.status = format!("Source: {}", self.catalog.selection().source);
    }

    pub fn cycle_sort_field(&mut self, direction: i32) {
        let next = self.catalog.selection().sort_by.next(direction);
        self.select_sort_field(next);
    }

    pub fn select_sort_field(&mut self, field: SortField) {
        let current_id = self.selected_game_index();
        self.catalog.set_sort_by(field);
        self.reselect_game(current_id);
        self.status = self.sort_status();
    }

    pub fn toggle_sort_direction(&mut self) {
        let field = self.catalog.selection().sort_by;
        self.select_sort_field(field);
    }

    fn sort_status(&self) -> String {
        let selection = self.catalog.selection();
        format!(
            "Sort: {} ({})",
            selection.sort_by.label(),
            selection.sort_direction.label()
        )
    }

    fn reselect_game(&mut self, index: Option<usize>) {
        self.selected = 0;
        if let Some(index) = index {
            if let Some(pos) = self
                .catalog
                .view()
                .rows
                .iter()
                .position(|row| row.index == index)
            {
                self.selected = pos;
            }
        }
        self.clamp_selection();
    }

    pub fn enter_search_mode(&mut self) {
        let current = self.catalog.selection().search_query.clone();
        self.input_mode = InputMode::Search {
            buffer: current.clone(),
            previous: current,
            last_edit_at: Instant::now(),
        };
    }

    pub fn search_push(&mut self, ch: char) {
        if let InputMode::Search {
            buffer,
            last_edit_at,
            ..
        } = &mut self.input_mode
        {
            buffer.push(ch);
            *last_edit_at = Instant::now();
        }
    }

    pub fn search_pop(&mut self) {
        if let InputMode::Search {
            buffer,
            last_edit_at,
            ..
        } = &mut self.input_mode
        {
            buffer.pop();
            *last_edit_at = Instant::now();
        }
    }

    pub fn submit_search(&mut self) {
        let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);
        if let InputMode::Search { buffer, .. } = mode {
            self.apply_search(buffer);
        }
    }

    pub fn cancel_search(&mut self) {
        let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);
        if let InputMode::Search { previous, .. } = mode {
            self.apply_search(previous);
            self.set_toast("Search cancelled", ToastLevel::Warn, Duration::from_secs(2));
        }
    }

    pub fn clear_search(&mut self) {
        self.apply_search(String::new());
    }

    /// Applies the query being typed once input pauses.
    fn maybe_apply_search(&mut self) {
        let value = match &self.input_mode {
            InputMode::Search {
                buffer,
                last_edit_at,
                ..
            } if last_edit_at.elapsed() >= Duration::from_millis(SEARCH_DEBOUNCE_MS) => {
                buffer.clone()
            }
            _ => return,
        };
        if value != self.catalog.selection().search_query {
            self.apply_search(value);
        }
    }

    fn apply_search(&mut self, query: String) {
        if query == self.catalog.selection().search_query {
            return;
        }
        self.catalog.set_search_query(query);
        self.selected = 0;
        self.sync_detail();
        let view = self.catalog.view();
        let (shown, total) = (view.rows.len(), view.total_count);
        let query = self.catalog.selection().search_query.clone();
        self.status = if query.is_empty() {
            format!("Search cleared ({total} games)")
        } else {
            format!("Search \"{query}\": {shown} of {total}")
        };
    }

    pub fn save_preferences(&mut self) -> Result<()> {
        let selection = self.catalog.selection().clone();
        self.app_config.remember_selection(&selection);
        self.app_config.save()?;
        self.status = format!("Saved defaults: {}", selection.summary());
        self.log_info(format!("Saved default selection: {}", selection.summary()));
        Ok(())
    }

    pub fn copy_selected_title(&mut self) {
        let Some(title) = self.selected_game().map(|game| game.title.clone()) else {
            self.status = "No game selected".to_string();
            return;
        };
        let Some(clipboard) = self.clipboard_mut() else {
            return;
        };
        match clipboard.set_text(title.clone()) {
            Ok(()) => {
                self.status = format!("Copied \"{title}\"");
                self.set_toast("Title copied", ToastLevel::Info, Duration::from_secs(2));
            }
            Err(err) => {
                self.status = format!("Copy failed: {err}");
                self.log_warn(format!("Copy failed: {err}"));
            }
        }
    }

    fn clipboard_mut(&mut self) -> Option<&mut Clipboard> {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => {
                    self.clipboard = Some(clipboard);
                }
                Err(err) => {
                    self.status = format!("Clipboard unavailable: {err}");
                    self.log_warn(format!("Clipboard unavailable: {err}"));
                    return None;
                }
            }
        }
        self.clipboard.as_mut()
    }

    pub fn set_toast(&mut self, message: &str, level: ToastLevel, duration: Duration) {
        self.toast = Some(Toast {
            message: message.to_string(),
            level,
            expires_at: Instant::now() + duration,
        });
    }

    pub fn toggle_help(&mut self) {
        self.help_open = !self.help_open;
    }

    pub fn scroll_log_up(&mut self, lines: usize) {
        let max = self.logs.len().saturating_sub(1);
        self.log_scroll = self.log_scroll.saturating_add(lines).min(max);
    }

    pub fn scroll_log_down(&mut self, lines: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    pub fn log_info(&mut self, message: String) {
        self.push_log(LogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: String) {
        self.push_log(LogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: String) {
        self.push_log(LogLevel::Error, message);
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        if self.log_scroll > 0 {
            self.log_scroll = self.log_scroll.saturating_add(1);
        }

        if let Some(path) = &self.log_path {
            let _ = append_log_file(path, level, &message);
        }

        self.logs.push(LogEntry { level, message });

        if self.logs.len() > LOG_CAPACITY {
            let overflow = self.logs.len() - LOG_CAPACITY;
            self.logs.drain(0..overflow);
            self.log_scroll = self.log_scroll.saturating_sub(overflow);
        }
    }
}

/// `all` comes first, then the known ids. An id not in the list (set from
/// config or the command line) restarts the cycle.
fn next_filter(current: &Filter, options: &[String], direction: i32) -> Filter {
    let mut cycle = vec![Filter::All];
    cycle.extend(options.iter().map(|id| Filter::Only(id.clone())));
    let total = cycle.len() as i32;
    let index = cycle.iter().position(|filter| filter == current);
    let step = if direction >= 0 { 1 } else { -1 };
    let next = match index {
        Some(index) => (index as i32 + step).rem_euclid(total) as usize,
        None => 0,
    };
    cycle.get(next).cloned().unwrap_or_default()
}

pub fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> std::io::Result<()> {
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "[{label}] {message}")
}
