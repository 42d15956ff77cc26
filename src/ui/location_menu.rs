//! Location picker overlay
//!
//! Renders a centered modal with a search box and the matching locations.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::{centered_rect, colors};
use crate::app::{App, MunicipalityList};
use crate::data::{LocationItem, LocationKind};

/// Renders the location menu on top of the current view
pub fn render(frame: &mut Frame, app: &App) {
    let Some(menu) = &app.menu else {
        return;
    };

    let area = centered_rect(56, 22, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Ubicaciones ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::HEADER));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let items = app.menu_items();
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Buscar: ", Style::default().fg(colors::SECONDARY)),
            Span::styled(
                format!("{}_", menu.query),
                Style::default().fg(colors::PRIMARY),
            ),
        ]),
        Line::from(""),
    ];

    // Rows left for items after the search box and the status line
    let visible = inner.height.saturating_sub(3).max(1) as usize;
    let first = menu.cursor.saturating_sub(visible - 1);

    for (index, item) in items.iter().enumerate().skip(first).take(visible) {
        lines.push(item_line(item, index == menu.cursor, item.id == app.location_id));
    }

    if let Some(status) = status_line(app, &menu.query, items.is_empty()) {
        lines.push(status);
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn item_line(item: &LocationItem, highlighted: bool, active: bool) -> Line<'static> {
    let marker = match item.kind {
        LocationKind::MountainZone => "▲",
        LocationKind::Municipality => "·",
    };

    let mut style = Style::default().fg(if active { colors::SELECTED } else { colors::PRIMARY });
    if highlighted {
        style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
    }

    Line::from(Span::styled(format!(" {} {} ", marker, item.name), style))
}

fn status_line(app: &App, query: &str, no_items: bool) -> Option<Line<'static>> {
    let (text, color) = match &app.municipalities {
        MunicipalityList::Loading => ("Cargando municipios...".to_string(), colors::SECONDARY),
        MunicipalityList::Failed(_) => (
            "Error al cargar municipios (reabre para reintentar)".to_string(),
            Color::Red,
        ),
        MunicipalityList::Loaded(_) if no_items && !query.trim().is_empty() => {
            ("No se encontraron resultados".to_string(), colors::UNKNOWN)
        }
        MunicipalityList::Loaded(list) if query.trim().is_empty() => {
            (format!("{} municipios disponibles", list.len()), colors::UNKNOWN)
        }
        MunicipalityList::Loaded(_) => return None,
    };
    Some(Line::from(Span::styled(text, Style::default().fg(color))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadMessage;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn render_to_string(app: &App) -> String {
        let backend = TestBackend::new(80, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn open_menu(app: &mut App) {
        app.handle_key(KeyEvent::new(KeyCode::Char('m'), KeyModifiers::NONE));
    }

    #[test]
    fn test_menu_lists_zones_while_municipalities_load() {
        let mut app = App::default();
        open_menu(&mut app);

        let content = render_to_string(&app);
        assert!(content.contains("Ubicaciones"));
        assert!(content.contains("Pirineo Catal"));
        assert!(content.contains("Cargando municipios"));
    }

    #[test]
    fn test_menu_search_without_results() {
        let mut app = App::default();
        app.apply(LoadMessage::MunicipalitiesLoaded(Ok(Arc::new(vec![LocationItem {
            id: "22130".to_string(),
            name: "Jaca".to_string(),
            kind: LocationKind::Municipality,
        }]))));
        open_menu(&mut app);
        for c in "xyz".chars() {
            app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }

        let content = render_to_string(&app);
        assert!(content.contains("Buscar: xyz_"));
        assert!(content.contains("No se encontraron resultados"));
    }

    #[test]
    fn test_failed_list_offers_retry() {
        let mut app = App::default();
        open_menu(&mut app);
        app.apply(LoadMessage::MunicipalitiesLoaded(Err(
            crate::data::FetchError::Server(503),
        )));

        let content = render_to_string(&app);
        assert!(content.contains("reabre para reintentar"));
    }

    #[test]
    fn test_closed_menu_renders_nothing() {
        let app = App::default();
        let content = render_to_string(&app);
        assert!(!content.contains("Ubicaciones"));
    }
}
