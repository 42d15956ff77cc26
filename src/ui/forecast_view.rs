//! Locality forecast rendering
//!
//! Shows the current hour in detail followed by the 12-hour outlook.

use chrono::NaiveDateTime;
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use super::colors;
use crate::data::forecast::{is_night_icon, sky_condition};
use crate::data::{HourlyObservation, LocalityForecast};

/// Builds the lines of the locality report
///
/// # Arguments
/// * `forecast` - The forecast, or `None` when AEMET has no data for the locality
/// * `now` - Local wall-clock time used to pick the current hour
pub fn build_lines(forecast: Option<&LocalityForecast>, now: NaiveDateTime) -> Vec<Line<'static>> {
    let Some(forecast) = forecast else {
        return vec![no_data_line("No hay datos disponibles para esta localidad")];
    };

    let timeline = forecast.timeline(now);
    let Some(current) = timeline.current() else {
        return vec![no_data_line("Sin previsión horaria")];
    };

    let mut lines = Vec::new();
    if let Some(province) = &forecast.province {
        lines.push(Line::from(Span::styled(
            province.to_uppercase(),
            Style::default().fg(colors::SECONDARY),
        )));
        lines.push(Line::from(""));
    }

    lines.extend(build_current_lines(current));
    lines.push(Line::from(""));
    lines.push(section_header("PRÓXIMAS 12 HORAS"));
    lines.extend(timeline.next_12_hours().iter().map(build_hourly_line));
    lines
}

fn build_current_lines(hour: &HourlyObservation) -> Vec<Line<'static>> {
    let icon = sky_icon(hour);
    let description = hour.sky_description.clone().unwrap_or_default();

    vec![
        section_header(&format!("AHORA · {}", hour.time.format("%d/%m %H:00"))),
        Line::from(vec![
            Span::raw(format!("{}  ", icon)),
            Span::styled(
                format_degrees(hour.temperature),
                Style::default()
                    .fg(temperature_color(hour.temperature))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", description), Style::default().fg(colors::PRIMARY)),
        ]),
        detail_line(&[
            ("Sensación", format_degrees(hour.apparent_temperature)),
            ("Humedad", format_optional(hour.humidity, "%")),
        ]),
        detail_line(&[
            ("Viento", format_wind(hour)),
            ("Racha máx.", format_optional(hour.wind_gust, " km/h")),
        ]),
        detail_line(&[
            ("Precipitación", format!("{} mm", hour.precipitation)),
            ("Probabilidad", format!("{}%", hour.precipitation_probability)),
        ]),
        detail_line(&[
            ("Orto", hour.sunrise.clone().unwrap_or_else(|| "--".to_string())),
            ("Ocaso", hour.sunset.clone().unwrap_or_else(|| "--".to_string())),
        ]),
    ]
}

/// Builds a single line of the hourly outlook
fn build_hourly_line(hour: &HourlyObservation) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{:<7}", hour.time.format("%H:00")),
            Style::default().fg(colors::PRIMARY),
        ),
        Span::raw(format!("{:<4}", sky_icon(hour))),
        Span::styled(
            format!("{:<7}", format_degrees(hour.temperature)),
            Style::default().fg(temperature_color(hour.temperature)),
        ),
        Span::styled(
            format!("{:<10}", format!("{} mm", hour.precipitation)),
            Style::default().fg(colors::SECONDARY),
        ),
        Span::styled(format_wind(hour), Style::default().fg(colors::SECONDARY)),
    ])
}

fn sky_icon(hour: &HourlyObservation) -> &'static str {
    sky_condition(hour.sky_description.as_deref()).glyph(is_night_icon(hour.sky_icon.as_deref()))
}

fn section_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default()
            .fg(colors::HEADER)
            .add_modifier(Modifier::BOLD),
    ))
}

fn detail_line(pairs: &[(&str, String)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (label, value) in pairs {
        spans.push(Span::styled(
            format!("{}: ", label),
            Style::default().fg(colors::SECONDARY),
        ));
        spans.push(Span::styled(
            format!("{:<14}", value),
            Style::default().fg(colors::PRIMARY),
        ));
    }
    Line::from(spans)
}

fn no_data_line(message: &str) -> Line<'static> {
    Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(colors::UNKNOWN),
    ))
}

fn format_degrees(value: Option<i32>) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{}\u{00B0}C", v))
}

fn format_optional<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{}{}", v, unit))
}

fn format_wind(hour: &HourlyObservation) -> String {
    match (&hour.wind_direction, hour.wind_speed) {
        (Some(direction), Some(speed)) => format!("{} {} km/h", direction, speed),
        (None, Some(speed)) => format!("{} km/h", speed),
        _ => "--".to_string(),
    }
}

/// Returns the color for a temperature value
fn temperature_color(temp: Option<i32>) -> Color {
    match temp {
        Some(t) if t >= 25 => Color::Red,
        Some(t) if t >= 15 => Color::Yellow,
        Some(t) if t >= 5 => Color::Green,
        Some(t) if t >= 0 => Color::Cyan,
        Some(_) => Color::Blue,
        None => colors::UNKNOWN,
    }
}
