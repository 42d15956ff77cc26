//! Mountain zone bulletin rendering
//!
//! Free-text bulletins get a danger level summary above the raw text;
//! structured bulletins are rendered section by section.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use super::colors;
use crate::data::bulletin::{danger_label, danger_severity, DangerSeverity, UNKNOWN_LEVEL};
use crate::data::{DangerAreaEstimate, MountainReport, NivoBulletin};

/// Builds the lines of the zone report
pub fn build_lines(bulletin: &NivoBulletin) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        "SEGURIDAD EN MONTAÑA · BOLETÍN NIVOLÓGICO",
        Style::default().fg(colors::SECONDARY),
    ))];
    lines.push(Line::from(""));

    match bulletin {
        NivoBulletin::Text { body, estimates } => {
            if let Some(estimates) = estimates.as_deref().filter(|e| !e.is_empty()) {
                lines.push(section_header("NIVEL DE PELIGRO"));
                for estimate in estimates {
                    lines.extend(build_estimate_lines(estimate));
                }
                lines.push(Line::from(""));
            }
            lines.push(section_header("BOLETÍN"));
            lines.extend(text_lines(body));
        }
        NivoBulletin::Report(report) if !report.is_empty() => {
            lines.extend(build_report_lines(report));
        }
        _ => lines.push(Line::from(Span::styled(
            "Sin información disponible para esta zona",
            Style::default().fg(colors::UNKNOWN),
        ))),
    }

    lines
}

fn build_estimate_lines(estimate: &DangerAreaEstimate) -> Vec<Line<'static>> {
    let level = estimate.max_level();
    let mut header = vec![Span::styled(
        format!(" {} ", level_badge(level)),
        Style::default()
            .fg(Color::Black)
            .bg(danger_color(level))
            .add_modifier(Modifier::BOLD),
    )];
    header.push(Span::styled(
        format!(" {}", estimate.area),
        Style::default()
            .fg(colors::PRIMARY)
            .add_modifier(Modifier::BOLD),
    ));
    if level != UNKNOWN_LEVEL {
        header.push(Span::styled(
            format!(" · {}", danger_label(level)),
            Style::default().fg(danger_color(level)),
        ));
    }

    let levels = estimate
        .levels
        .iter()
        .map(|l| level_badge(*l))
        .collect::<Vec<_>>()
        .join(" ");

    vec![
        Line::from(header),
        Line::from(vec![
            Span::styled(
                format!("    niveles {}  ", levels),
                Style::default().fg(colors::SECONDARY),
            ),
            Span::raw(estimate.description.clone()),
        ]),
    ]
}

fn build_report_lines(report: &MountainReport) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for section in &report.sections {
        lines.push(section_header(&section.name.to_uppercase()));
        for paragraph in &section.paragraphs {
            lines.extend(text_lines(paragraph));
        }
        lines.push(Line::from(""));
    }

    if let Some(text) = &report.text {
        lines.push(section_header("PREDICCIÓN"));
        lines.extend(text_lines(text));
    }

    lines
}

/// Level shown in badges; unknown levels are shown as "?"
fn level_badge(level: u8) -> String {
    if level == UNKNOWN_LEVEL {
        "?".to_string()
    } else {
        level.to_string()
    }
}

/// Color for a danger level
pub fn danger_color(level: u8) -> Color {
    match danger_severity(level) {
        DangerSeverity::High => colors::DANGER_HIGH,
        DangerSeverity::Considerable => colors::DANGER_CONSIDERABLE,
        DangerSeverity::Moderate => colors::DANGER_MODERATE,
        DangerSeverity::Low => colors::DANGER_LOW,
    }
}

fn section_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default()
            .fg(colors::HEADER)
            .add_modifier(Modifier::BOLD),
    ))
}

fn text_lines(text: &str) -> Vec<Line<'static>> {
    text.lines()
        .map(|line| Line::from(Span::raw(line.trim_end().to_string())))
        .collect()
}
