//! Core data models for the AEMET client
//!
//! This module contains the fetch primitive, the AEMET protocol client and
//! the parsers that turn AEMET payloads into forecast and bulletin models.

pub mod aemet;
pub mod bulletin;
pub mod forecast;
pub mod http;
pub mod locations;

pub use aemet::{AemetClient, DataUrlRouting, AEMET_BASE_URL};
pub use bulletin::{parse_danger_levels, DangerAreaEstimate, MountainReport, NivoBulletin};
pub use forecast::{HourlyObservation, HourlyTimeline, LocalityForecast};
pub use http::{FetchError, HttpFetcher, Payload, RetryPolicy};
pub use locations::{all_zones, get_zone_by_id, LocationItem, LocationKind};

/// Which kind of report is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// Hourly forecast for a municipality
    Locality,
    /// Nivological bulletin for a mountain zone
    Zone,
}

impl ViewMode {
    /// Tab title
    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Locality => "Localidad",
            ViewMode::Zone => "Montaña",
        }
    }

    /// Location selected when switching to this mode
    pub fn default_location_id(&self) -> &'static str {
        match self {
            ViewMode::Locality => locations::DEFAULT_MUNICIPALITY_ID,
            ViewMode::Zone => locations::MOUNTAIN_ZONES[0].id,
        }
    }

    /// The other mode
    pub fn toggle(&self) -> Self {
        match self {
            ViewMode::Locality => ViewMode::Zone,
            ViewMode::Zone => ViewMode::Locality,
        }
    }

    /// View mode that displays a location of the given kind
    pub fn for_kind(kind: LocationKind) -> Self {
        match kind {
            LocationKind::Municipality => ViewMode::Locality,
            LocationKind::MountainZone => ViewMode::Zone,
        }
    }
}

/// A fetched report, ready for display
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// Locality forecast; `None` when AEMET has no data for the locality
    Locality(Option<LocalityForecast>),
    /// Mountain zone bulletin
    Zone(NivoBulletin),
}

/// Sky conditions derived from AEMET sky descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkyCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Overcast,
    Rain,
    Snow,
    Storm,
}

impl SkyCondition {
    /// Terminal glyph for the condition; clear skies differ at night
    pub fn glyph(&self, night: bool) -> &'static str {
        match (self, night) {
            (SkyCondition::Clear, false) => "☀",
            (SkyCondition::Clear, true) => "☾",
            (SkyCondition::PartlyCloudy, false) => "⛅",
            (SkyCondition::PartlyCloudy, true) => "☁☾",
            (SkyCondition::Cloudy, _) => "☁",
            (SkyCondition::Overcast, _) => "▒",
            (SkyCondition::Rain, _) => "☂",
            (SkyCondition::Snow, _) => "❄",
            (SkyCondition::Storm, _) => "⚡",
        }
    }
}
