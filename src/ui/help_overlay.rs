//! Help overlay showing all keybindings
//!
//! Renders a centered modal overlay with keyboard shortcuts.

use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::centered_rect;

/// Renders the help overlay on top of the current view
pub fn render(frame: &mut Frame) {
    let overlay_area = centered_rect(50, 20, frame.area());

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let lines = vec![
        Line::from(Span::styled(
            "Atajos de teclado",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        section("Navegación"),
        help_line("Tab", "Localidad / Montaña"),
        help_line("m, /", "Elegir ubicación"),
        help_line("↑/k, ↓/j", "Desplazar el informe"),
        help_line("g", "Volver al principio"),
        help_line("q", "Salir"),
        Line::from(""),
        section("Menú de ubicaciones"),
        help_line("texto", "Buscar municipio"),
        help_line("↑, ↓", "Mover la selección"),
        help_line("Enter", "Abrir ubicación"),
        help_line("Esc", "Cerrar el menú"),
        Line::from(""),
        help_line("r", "Recargar desde AEMET"),
        help_line("?", "Mostrar/ocultar esta ayuda"),
    ];

    let block = Block::default()
        .title(" Ayuda ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Left);

    frame.render_widget(paragraph, overlay_area);
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

/// Creates a help line with key and description
fn help_line(key: &str, description: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", key), Style::default().fg(Color::Yellow)),
        Span::raw(description.to_string()),
    ])
}
