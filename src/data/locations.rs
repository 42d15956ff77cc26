//! Selectable locations
//!
//! Mountain zones come from a static list of AEMET nivological areas.
//! Localities come from the AEMET municipality master list, which is
//! normalized here: the `"id"` prefix is stripped from identifiers and the
//! list is sorted with Spanish collation.

use std::cmp::Ordering;

use serde::Deserialize;

/// INE code of the locality shown when nothing else is selected
pub const DEFAULT_MUNICIPALITY_ID: &str = "22170";

/// Display name used for the default locality before the master list loads
pub const DEFAULT_MUNICIPALITY_NAME: &str = "Panticosa";

/// Maximum number of municipalities listed in the location menu
pub const MENU_RESULT_LIMIT: usize = 50;

/// What kind of place a location is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    /// Ordinary locality with an hourly forecast
    Municipality,
    /// Mountain zone with a nivological bulletin
    MountainZone,
}

/// A selectable place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationItem {
    /// Identifier passed to the AEMET endpoint
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Locality or mountain zone
    pub kind: LocationKind,
}

/// A nivological area published by AEMET
#[derive(Debug, Clone, Copy)]
pub struct MountainZone {
    /// Area code used by the nivological endpoint
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
}

impl MountainZone {
    /// Converts the zone into a selectable location
    pub fn to_location(&self) -> LocationItem {
        LocationItem {
            id: self.id.to_string(),
            name: self.name.to_string(),
            kind: LocationKind::MountainZone,
        }
    }
}

/// Nivological areas with a published avalanche bulletin
pub static MOUNTAIN_ZONES: [MountainZone; 2] = [
    MountainZone {
        id: "0",
        name: "Pirineo Catalán",
    },
    MountainZone {
        id: "1",
        name: "Pirineo Navarro y Aragonés",
    },
];

/// Get all mountain zones
pub fn all_zones() -> &'static [MountainZone] {
    &MOUNTAIN_ZONES
}

/// Get a mountain zone by its area code
pub fn get_zone_by_id(id: &str) -> Option<&'static MountainZone> {
    MOUNTAIN_ZONES.iter().find(|zone| zone.id == id)
}

/// One record of the AEMET municipality master list
#[derive(Debug, Clone, Deserialize)]
pub struct MunicipalityRecord {
    /// Identifier in the form `"id"` + INE code
    pub id: String,
    /// Municipality name
    #[serde(rename = "nombre")]
    pub name: String,
}

/// Converts master list records into locations sorted by name
pub fn municipalities_from_records(records: Vec<MunicipalityRecord>) -> Vec<LocationItem> {
    let mut items: Vec<LocationItem> = records
        .into_iter()
        .map(|record| LocationItem {
            id: record
                .id
                .strip_prefix("id")
                .unwrap_or(&record.id)
                .to_string(),
            name: record.name,
            kind: LocationKind::Municipality,
        })
        .collect();

    items.sort_by(|a, b| compare_spanish(&a.name, &b.name));
    items
}

/// Compares two names the way a Spanish reader orders them
///
/// Case and accents only break ties, and `ñ` sorts as its own letter after `n`.
pub fn compare_spanish(a: &str, b: &str) -> Ordering {
    spanish_collation_key(a)
        .cmp(&spanish_collation_key(b))
        .then_with(|| a.cmp(b))
}

/// Builds the primary collation key for a name
fn spanish_collation_key(s: &str) -> String {
    let mut key = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match c {
            'á' | 'à' | 'â' | 'ä' => key.push('a'),
            'é' | 'è' | 'ê' | 'ë' => key.push('e'),
            'í' | 'ì' | 'î' | 'ï' => key.push('i'),
            'ó' | 'ò' | 'ô' | 'ö' => key.push('o'),
            'ú' | 'ù' | 'û' | 'ü' => key.push('u'),
            'ç' => key.push('c'),
            // '~' sorts after every ASCII letter
            'ñ' => key.push_str("n~"),
            other => key.push(other),
        }
    }
    key
}

/// Filters municipalities by a case-insensitive substring of their name
///
/// An empty query returns the first `limit` items.
pub fn filter_locations<'a>(items: &'a [LocationItem], query: &str, limit: usize) -> Vec<&'a LocationItem> {
    let query = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| query.is_empty() || item.name.to_lowercase().contains(&query))
        .take(limit)
        .collect()
}
