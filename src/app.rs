//! Application state management for cumbre
//!
//! This module contains the main application state and keyboard handling.
//! The state machine never touches the network: key presses that need data
//! return a [`Command`] for the event loop to hand to the loader, and load
//! results come back through [`App::apply`].

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::debug;

use crate::cache::MUNICIPALITIES_TTL;
use crate::cli::StartupConfig;
use crate::data::locations::{
    filter_locations, DEFAULT_MUNICIPALITY_ID, DEFAULT_MUNICIPALITY_NAME, MENU_RESULT_LIMIT,
};
use crate::data::{all_zones, get_zone_by_id, FetchError, LocationItem, Report, ViewMode};
use crate::loader::LoadMessage;

/// Work the event loop must start on behalf of the app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load the report for a location, from cache when fresh
    Load { mode: ViewMode, location_id: String },
    /// Drop the cached report and load it again
    Refetch { mode: ViewMode, location_id: String },
    /// Load the municipality master list, from cache when fresh
    LoadMunicipalities,
}

/// What the report area currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// Waiting for the report of the current selection
    Loading,
    /// Report of the current selection
    Ready(Arc<Report>),
    /// The load failed; `r` retries
    Failed(String),
}

/// Loading state of the municipality master list
#[derive(Debug, Clone, PartialEq)]
pub enum MunicipalityList {
    Loading,
    Loaded(Arc<Vec<LocationItem>>),
    Failed(String),
}

/// Location picker state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationMenu {
    /// Search box contents
    pub query: String,
    /// Index of the highlighted entry
    pub cursor: usize,
}

/// Main application struct managing state and data
pub struct App {
    /// Active tab
    pub mode: ViewMode,
    /// Selected location id for the active tab
    pub location_id: String,
    /// Report area state
    pub view: ViewState,
    /// Municipality master list
    pub municipalities: MunicipalityList,
    /// When the municipality list was received
    pub municipalities_loaded_at: Option<Instant>,
    /// Open location picker, if any
    pub menu: Option<LocationMenu>,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// When the shown report was received
    pub last_refresh: Option<DateTime<Local>>,
    /// Scroll offset of the report area
    pub scroll_offset: u16,
}

impl Default for App {
    fn default() -> Self {
        Self::new(ViewMode::Locality, ViewMode::Locality.default_location_id())
    }
}

impl App {
    /// Creates an app showing the given location
    pub fn new(mode: ViewMode, location_id: impl Into<String>) -> Self {
        Self {
            mode,
            location_id: location_id.into(),
            view: ViewState::Loading,
            municipalities: MunicipalityList::Loading,
            municipalities_loaded_at: None,
            menu: None,
            should_quit: false,
            show_help: false,
            last_refresh: None,
            scroll_offset: 0,
        }
    }

    /// Creates an app from the startup configuration
    pub fn with_startup_config(config: &StartupConfig) -> Self {
        Self::new(config.mode, config.location_id.clone())
    }

    /// Load for the current selection
    pub fn load_command(&self) -> Command {
        Command::Load {
            mode: self.mode,
            location_id: self.location_id.clone(),
        }
    }

    /// Whether a report load for the current selection is outstanding
    pub fn is_loading(&self) -> bool {
        matches!(self.view, ViewState::Loading)
    }

    /// Shows another location; the report area resets to loading
    pub fn select(&mut self, mode: ViewMode, location_id: impl Into<String>) -> Command {
        self.mode = mode;
        self.location_id = location_id.into();
        self.view = ViewState::Loading;
        self.scroll_offset = 0;
        self.load_command()
    }

    /// Switches tab and resets the selection to the tab's default location
    pub fn switch_tab(&mut self) -> Command {
        let mode = self.mode.toggle();
        self.select(mode, mode.default_location_id())
    }

    /// Display name of the current selection
    pub fn active_name(&self) -> String {
        match self.mode {
            ViewMode::Zone => get_zone_by_id(&self.location_id)
                .map(|zone| zone.name.to_string())
                .unwrap_or_default(),
            ViewMode::Locality => self
                .municipality_name(&self.location_id)
                .or_else(|| self.forecast_name())
                .unwrap_or_else(|| {
                    if self.location_id == DEFAULT_MUNICIPALITY_ID {
                        DEFAULT_MUNICIPALITY_NAME.to_string()
                    } else {
                        self.location_id.clone()
                    }
                }),
        }
    }

    fn municipality_name(&self, id: &str) -> Option<String> {
        match &self.municipalities {
            MunicipalityList::Loaded(list) => {
                list.iter().find(|m| m.id == id).map(|m| m.name.clone())
            }
            _ => None,
        }
    }

    fn forecast_name(&self) -> Option<String> {
        match &self.view {
            ViewState::Ready(report) => match report.as_ref() {
                Report::Locality(Some(forecast)) => forecast.name.clone(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Entries listed in the location menu
    ///
    /// With an empty search box the mountain zones come first, followed by
    /// the first municipalities. A search lists matching municipalities only.
    pub fn menu_items(&self) -> Vec<LocationItem> {
        let Some(menu) = &self.menu else {
            return Vec::new();
        };

        let mut items: Vec<LocationItem> = if menu.query.trim().is_empty() {
            all_zones().iter().map(|zone| zone.to_location()).collect()
        } else {
            Vec::new()
        };

        if let MunicipalityList::Loaded(list) = &self.municipalities {
            items.extend(
                filter_locations(list, &menu.query, MENU_RESULT_LIMIT)
                    .into_iter()
                    .cloned(),
            );
        }
        items
    }

    /// Applies a finished load
    ///
    /// Report results for anything but the current selection are stale and
    /// are dropped.
    pub fn apply(&mut self, message: LoadMessage) {
        match message {
            LoadMessage::ReportLoaded {
                mode,
                location_id,
                result,
            } => {
                if mode != self.mode || location_id != self.location_id {
                    debug!("dropping stale result for {:?} {}", mode, location_id);
                    return;
                }
                self.view = match result {
                    Ok(report) => {
                        self.last_refresh = Some(Local::now());
                        ViewState::Ready(report)
                    }
                    Err(e) => ViewState::Failed(error_message(&e)),
                };
            }
            LoadMessage::MunicipalitiesLoaded(result) => {
                self.municipalities = match result {
                    Ok(list) => {
                        self.municipalities_loaded_at = Some(Instant::now());
                        MunicipalityList::Loaded(list)
                    }
                    Err(e) => MunicipalityList::Failed(error_message(&e)),
                };
            }
        }
    }

    /// Handles keyboard input and updates state accordingly
    ///
    /// # Key Bindings
    /// - `q`: Quit the application
    /// - `Tab`: Switch between locality and mountain tabs
    /// - `m` or `/`: Open the location menu
    /// - `r`: Reload the current report, bypassing the cache
    /// - `j`/`k`: Scroll the report
    /// - `?`: Toggle help
    pub fn handle_key(&mut self, key_event: KeyEvent) -> Option<Command> {
        if key_event.code == KeyCode::Char('c') && key_event.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }

        // Help overlay intercepts all keys when shown
        if self.show_help {
            if matches!(
                key_event.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return None;
        }

        if self.menu.is_some() {
            return self.handle_menu_key(key_event);
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Tab | KeyCode::BackTab => Some(self.switch_tab()),
            KeyCode::Char('m') | KeyCode::Char('/') => {
                self.menu = Some(LocationMenu::default());
                self.reload_municipalities_if_needed()
            }
            KeyCode::Char('r') => {
                self.view = ViewState::Loading;
                self.scroll_offset = 0;
                Some(Command::Refetch {
                    mode: self.mode,
                    location_id: self.location_id.clone(),
                })
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.scroll_offset = self.scroll_offset.saturating_add(1);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
                None
            }
            KeyCode::Char('g') => {
                self.scroll_offset = 0;
                None
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                None
            }
            _ => None,
        }
    }

    /// Whether the municipality list failed or is older than its freshness window
    pub fn municipalities_need_reload(&self) -> bool {
        match &self.municipalities {
            MunicipalityList::Loading => false,
            MunicipalityList::Failed(_) => true,
            MunicipalityList::Loaded(_) => self
                .municipalities_loaded_at
                .map_or(true, |at| at.elapsed() >= MUNICIPALITIES_TTL),
        }
    }

    /// Asks for the municipality list again when it failed or went stale
    ///
    /// A stale list stays usable while the reload runs.
    fn reload_municipalities_if_needed(&mut self) -> Option<Command> {
        if !self.municipalities_need_reload() {
            return None;
        }
        if matches!(self.municipalities, MunicipalityList::Failed(_)) {
            self.municipalities = MunicipalityList::Loading;
        }
        debug!("reloading municipality list");
        Some(Command::LoadMunicipalities)
    }

    fn handle_menu_key(&mut self, key_event: KeyEvent) -> Option<Command> {
        let item_count = self.menu_items().len();
        let menu = self.menu.as_mut()?;

        match key_event.code {
            KeyCode::Esc => {
                self.menu = None;
                None
            }
            KeyCode::Up => {
                menu.cursor = menu.cursor.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if menu.cursor + 1 < item_count {
                    menu.cursor += 1;
                }
                None
            }
            KeyCode::Backspace => {
                menu.query.pop();
                menu.cursor = 0;
                None
            }
            KeyCode::Char(c) => {
                menu.query.push(c);
                menu.cursor = 0;
                None
            }
            KeyCode::Enter => {
                let cursor = menu.cursor;
                let item = self.menu_items().into_iter().nth(cursor)?;
                self.menu = None;
                Some(self.select(ViewMode::for_kind(item.kind), item.id))
            }
            _ => None,
        }
    }
}

/// User-facing text for a failed load
pub fn error_message(error: &FetchError) -> String {
    match error {
        FetchError::Network(_) => "Error al conectar con AEMET".to_string(),
        other => other.to_string(),
    }
}
