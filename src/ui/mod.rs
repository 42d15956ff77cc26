//! UI rendering module for cumbre
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components. Report views are built as
//! lists of lines so the same content can be printed as plain text.

pub mod forecast_view;
pub mod help_overlay;
pub mod location_menu;
pub mod mountain_view;

use chrono::NaiveDateTime;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, ViewState};
use crate::data::{Report, ViewMode};

/// Color scheme shared by the views
pub mod colors {
    use ratatui::style::Color;

    /// Section headers
    pub const HEADER: Color = Color::Cyan;
    /// Primary text
    pub const PRIMARY: Color = Color::White;
    /// Secondary/dimmed text
    pub const SECONDARY: Color = Color::Gray;
    /// Unknown/unavailable values
    pub const UNKNOWN: Color = Color::DarkGray;
    /// Currently selected location
    pub const SELECTED: Color = Color::Yellow;
    /// Danger levels 4 and 5
    pub const DANGER_HIGH: Color = Color::Red;
    /// Danger level 3
    pub const DANGER_CONSIDERABLE: Color = Color::Rgb(255, 140, 0);
    /// Danger level 2
    pub const DANGER_MODERATE: Color = Color::Yellow;
    /// Danger level 1 and unknown
    pub const DANGER_LOW: Color = Color::Green;
}

/// Tab order in the header
const TABS: [ViewMode; 2] = [ViewMode::Locality, ViewMode::Zone];

/// Renders the whole screen
///
/// # Arguments
/// * `frame` - The ratatui frame to render into
/// * `app` - The application state
/// * `now` - Local wall-clock time used to pick the current forecast hour
pub fn render(frame: &mut Frame, app: &App, now: NaiveDateTime) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with tabs
            Constraint::Min(0),    // Report
            Constraint::Length(1), // Key hints
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);
    render_body(frame, chunks[1], app, now);
    render_footer(frame, chunks[2]);

    if app.menu.is_some() {
        location_menu::render(frame, app);
    }
    if app.show_help {
        help_overlay::render(frame);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::HEADER))
        .title(Span::styled(
            " El tiempo en la montaña · AEMET ",
            Style::default()
                .fg(colors::PRIMARY)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(24)])
        .split(inner);

    let selected = TABS.iter().position(|m| *m == app.mode).unwrap_or(0);
    let tabs = Tabs::new(TABS.iter().map(|m| m.label()).collect::<Vec<_>>())
        .select(selected)
        .style(Style::default().fg(colors::SECONDARY))
        .highlight_style(
            Style::default()
                .fg(colors::SELECTED)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, halves[0]);

    let status = if app.is_loading() {
        Span::styled("Cargando...", Style::default().fg(colors::HEADER))
    } else if let Some(at) = app.last_refresh {
        Span::styled(
            format!("Actualizado {}", at.format("%H:%M")),
            Style::default().fg(colors::UNKNOWN),
        )
    } else {
        Span::raw("")
    };
    frame.render_widget(
        Paragraph::new(Line::from(status)).alignment(Alignment::Right),
        halves[1],
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &App, now: NaiveDateTime) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::UNKNOWN))
        .title(Span::styled(
            format!(" {} ", app.active_name()),
            Style::default()
                .fg(colors::PRIMARY)
                .add_modifier(Modifier::BOLD),
        ));

    match &app.view {
        ViewState::Loading => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Percentage(45),
                    Constraint::Length(1),
                    Constraint::Percentage(45),
                ])
                .split(inner);
            let loading = Paragraph::new("Consultando AEMET...")
                .style(Style::default().fg(colors::HEADER))
                .alignment(Alignment::Center);
            frame.render_widget(loading, rows[1]);
        }
        ViewState::Failed(message) => {
            let lines = vec![
                Line::from(Span::styled(
                    message.clone(),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Pulsa r para reintentar",
                    Style::default().fg(colors::SECONDARY),
                )),
            ];
            frame.render_widget(
                Paragraph::new(lines)
                    .block(block)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true }),
                area,
            );
        }
        ViewState::Ready(report) => {
            let paragraph = Paragraph::new(report_lines(report, now))
                .block(block)
                .wrap(Wrap { trim: false })
                .scroll((app.scroll_offset, 0));
            frame.render_widget(paragraph, area);
        }
    }
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let hints = Line::from(vec![
        Span::styled(" Tab", Style::default().fg(colors::SELECTED)),
        Span::raw(" vista  "),
        Span::styled("m", Style::default().fg(colors::SELECTED)),
        Span::raw(" ubicación  "),
        Span::styled("r", Style::default().fg(colors::SELECTED)),
        Span::raw(" recargar  "),
        Span::styled("?", Style::default().fg(colors::SELECTED)),
        Span::raw(" ayuda  "),
        Span::styled("q", Style::default().fg(colors::SELECTED)),
        Span::raw(" salir"),
    ]);
    frame.render_widget(
        Paragraph::new(hints).style(Style::default().fg(colors::UNKNOWN)),
        area,
    );
}

/// Lines of a report view
pub fn report_lines(report: &Report, now: NaiveDateTime) -> Vec<Line<'static>> {
    match report {
        Report::Locality(forecast) => forecast_view::build_lines(forecast.as_ref(), now),
        Report::Zone(bulletin) => mountain_view::build_lines(bulletin),
    }
}

/// Flattens styled lines to plain text, one line per row
pub fn plain_text(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Helper function to create a centered rect
pub(crate) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Length((area.height.saturating_sub(height)) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((area.width.saturating_sub(width)) / 2),
            Constraint::Length(width),
            Constraint::Length((area.width.saturating_sub(width)) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
