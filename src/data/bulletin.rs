//! Nivological bulletin parsing
//!
//! AEMET publishes the avalanche bulletin either as free text or as a
//! structured document of titled sections. For free text, the danger
//! estimate section is scraped for `Area: description (N)` lines. The
//! scraper only ever degrades to "no estimate"; it never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::http::{FetchError, Payload};

/// Heading that introduces the danger estimate section
pub const DANGER_SECTION_MARKER: &str = "1.- Estimación del nivel de peligro:";

/// Heading of the section that follows the danger estimate
pub const SNOWPACK_SECTION_MARKER: &str = "2.- Estado del manto";

/// Lines skipped after the marker: the heading itself and the label line below it
const HEADER_LINES: usize = 2;

/// Level reported when an area mentions no danger level at all
pub const UNKNOWN_LEVEL: u8 = 0;

/// A single digit in parentheses, e.g. "(3)"
static LEVEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d)\)").expect("level pattern is valid"));

/// Danger estimate for one massif
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DangerAreaEstimate {
    /// Area label before the colon
    pub area: String,
    /// Free text after the colon, including continuation lines
    pub description: String,
    /// Distinct levels found in the description, highest first; `[0]` if none
    pub levels: Vec<u8>,
}

impl DangerAreaEstimate {
    /// Highest danger level reported for the area
    pub fn max_level(&self) -> u8 {
        self.levels.first().copied().unwrap_or(UNKNOWN_LEVEL)
    }
}

/// Extracts per-area danger levels from a free-text bulletin
///
/// # Returns
/// * `Some(estimates)` - Areas in the order they appear (may be empty)
/// * `None` - The bulletin has no danger estimate section
pub fn parse_danger_levels(text: &str) -> Option<Vec<DangerAreaEstimate>> {
    let start = text.find(DANGER_SECTION_MARKER)?;
    let section = &text[start..];
    let section = match section.find(SNOWPACK_SECTION_MARKER) {
        Some(end) => &section[..end],
        None => section,
    };

    let mut estimates: Vec<DangerAreaEstimate> = Vec::new();

    for line in section.split('\n').skip(HEADER_LINES) {
        if let Some((area, description)) = line.split_once(':') {
            let description = description.trim();
            estimates.push(DangerAreaEstimate {
                area: area.trim().to_string(),
                description: description.to_string(),
                levels: extract_levels(description),
            });
        } else if let Some(current) = estimates.last_mut() {
            let continuation = line.trim();
            if continuation.is_empty() {
                continue;
            }
            current.description.push(' ');
            current.description.push_str(continuation);
            current.levels.extend(extract_levels(continuation));
        }
    }

    Some(
        estimates
            .into_iter()
            .filter(|estimate| !estimate.area.is_empty())
            .map(|mut estimate| {
                estimate.levels = normalize_levels(estimate.levels);
                estimate
            })
            .collect(),
    )
}

/// Finds every parenthesized danger level in a line
fn extract_levels(line: &str) -> Vec<u8> {
    LEVEL_PATTERN
        .captures_iter(line)
        .filter_map(|caps| caps[1].parse::<u8>().ok())
        .filter(|level| (1..=5).contains(level))
        .collect()
}

/// Deduplicates and sorts levels descending, substituting the unknown level for none
fn normalize_levels(mut levels: Vec<u8>) -> Vec<u8> {
    levels.sort_unstable_by(|a, b| b.cmp(a));
    levels.dedup();
    if levels.is_empty() {
        levels.push(UNKNOWN_LEVEL);
    }
    levels
}

/// Label of a danger level on the European avalanche danger scale
pub fn danger_label(level: u8) -> &'static str {
    match level {
        1 => "Bajo",
        2 => "Limitado",
        3 => "Marcado",
        4 => "Fuerte",
        5 => "Muy fuerte",
        _ => "Desconocido",
    }
}

/// Severity band used to colour a danger level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerSeverity {
    Low,
    Moderate,
    Considerable,
    High,
}

/// Maps a danger level to its severity band
pub fn danger_severity(level: u8) -> DangerSeverity {
    match level {
        4..=u8::MAX => DangerSeverity::High,
        3 => DangerSeverity::Considerable,
        2 => DangerSeverity::Moderate,
        _ => DangerSeverity::Low,
    }
}

/// A titled section of a structured bulletin
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    /// Section title with underscores replaced by spaces
    pub name: String,
    /// Non-empty paragraphs in order
    pub paragraphs: Vec<String>,
}

/// A structured mountain bulletin
#[derive(Debug, Clone, PartialEq)]
pub struct MountainReport {
    /// Area name, when the document carries one
    pub name: Option<String>,
    /// Titled sections
    pub sections: Vec<ReportSection>,
    /// Free-form forecast text, when the document has no sections
    pub text: Option<String>,
}

impl MountainReport {
    /// Whether there is nothing to display
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

/// The nivological bulletin in whichever form AEMET returned it
#[derive(Debug, Clone, PartialEq)]
pub enum NivoBulletin {
    /// Free-text bulletin with its parsed danger estimates
    Text {
        body: String,
        estimates: Option<Vec<DangerAreaEstimate>>,
    },
    /// Structured document rendered section by section
    Report(MountainReport),
    /// AEMET returned nothing usable
    Empty,
}

impl NivoBulletin {
    /// Builds a bulletin from a free-text body
    pub fn from_text(body: String) -> Self {
        let estimates = parse_danger_levels(&body);
        NivoBulletin::Text { body, estimates }
    }

    /// Interprets the second-hop payload of the nivological endpoint
    pub fn from_payload(payload: Payload) -> Result<Self, FetchError> {
        match payload {
            Payload::Text(body) => Ok(Self::from_text(body)),
            Payload::Json(value) => Self::from_value(value),
        }
    }

    fn from_value(value: Value) -> Result<Self, FetchError> {
        match value {
            Value::Array(items) => match items.into_iter().next() {
                Some(first) => Self::from_value(first),
                None => Ok(NivoBulletin::Empty),
            },
            Value::String(body) => Ok(Self::from_text(body)),
            Value::Null => Ok(NivoBulletin::Empty),
            Value::Object(map) => {
                let document: NivoDocument = serde_json::from_value(Value::Object(map))
                    .map_err(|e| FetchError::Decode(e.to_string()))?;
                Ok(NivoBulletin::Report(document.into_report()))
            }
            other => Err(FetchError::Decode(format!(
                "unexpected nivological payload: {}",
                other
            ))),
        }
    }

    /// Parsed danger estimates, if the bulletin is free text with an estimate section
    pub fn estimates(&self) -> Option<&[DangerAreaEstimate]> {
        match self {
            NivoBulletin::Text {
                estimates: Some(estimates),
                ..
            } => Some(estimates),
            _ => None,
        }
    }
}

/// Structured nivological document as published by AEMET
#[derive(Debug, Deserialize)]
struct NivoDocument {
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    seccion: Vec<SourceSection>,
    #[serde(default)]
    texto: Option<OwnText>,
    #[serde(default)]
    prediccion: Option<SourcePrediction>,
}

#[derive(Debug, Deserialize)]
struct SourceSection {
    #[serde(default)]
    nombre: String,
    #[serde(default)]
    parrafo: Vec<SourceParagraph>,
}

#[derive(Debug, Deserialize)]
struct SourceParagraph {
    #[serde(default)]
    texto: String,
}

#[derive(Debug, Deserialize)]
struct OwnText {
    #[serde(default)]
    propia: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourcePrediction {
    #[serde(default)]
    texto: Option<OwnText>,
}

impl NivoDocument {
    fn into_report(self) -> MountainReport {
        let sections = self
            .seccion
            .into_iter()
            .map(|section| ReportSection {
                name: section.nombre.replace('_', " "),
                paragraphs: section
                    .parrafo
                    .into_iter()
                    .map(|p| p.texto)
                    .filter(|t| !t.trim().is_empty())
                    .collect(),
            })
            .collect();

        let text = self
            .prediccion
            .and_then(|p| p.texto)
            .and_then(|t| t.propia)
            .or_else(|| self.texto.and_then(|t| t.propia));

        MountainReport {
            name: self.nombre,
            sections,
            text,
        }
    }
}
