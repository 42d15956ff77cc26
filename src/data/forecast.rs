//! Hourly forecast normalization
//!
//! The AEMET hourly forecast groups each day into parallel per-metric arrays
//! whose entries carry an hour-of-day `periodo` tag. The arrays are not
//! aligned by index, so every metric is joined to the temperature array by
//! tag. The result is a single chronological list of hours.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::SkyCondition;

/// Number of hours in the outlook strip
pub const OUTLOOK_HOURS: usize = 12;

/// One hour's forecast sample
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyObservation {
    /// Local date and hour of the sample
    pub time: NaiveDateTime,
    /// Temperature in Celsius
    pub temperature: Option<i32>,
    /// Sky state description, e.g. "Poco nuboso"
    pub sky_description: Option<String>,
    /// AEMET sky icon code; a trailing `n` marks night
    pub sky_icon: Option<String>,
    /// Precipitation in mm as published ("Ip" means trace)
    pub precipitation: String,
    /// Probability of precipitation for the day's first period, in percent
    pub precipitation_probability: u8,
    /// Relative humidity in percent
    pub humidity: Option<u8>,
    /// Apparent temperature in Celsius
    pub apparent_temperature: Option<i32>,
    /// Wind speed in km/h
    pub wind_speed: Option<u32>,
    /// Wind direction, e.g. "NO"
    pub wind_direction: Option<String>,
    /// Maximum gust in km/h
    pub wind_gust: Option<u32>,
    /// Sunrise time of the day, "HH:MM"
    pub sunrise: Option<String>,
    /// Sunset time of the day, "HH:MM"
    pub sunset: Option<String>,
}

/// Hourly forecast document, the first element of the endpoint's array
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastDocument {
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
    #[serde(rename = "provincia", default)]
    pub province: Option<String>,
    #[serde(rename = "prediccion", default)]
    pub prediction: Option<Prediction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    #[serde(rename = "dia", default)]
    pub days: Vec<DailyForecast>,
}

/// One day of the hourly forecast as published
#[derive(Debug, Clone, Deserialize)]
pub struct DailyForecast {
    /// Day in the form "2026-01-15T00:00:00"
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "orto", default)]
    pub sunrise: Option<String>,
    #[serde(rename = "ocaso", default)]
    pub sunset: Option<String>,
    #[serde(rename = "estadoCielo", default)]
    pub sky: Vec<SkyEntry>,
    #[serde(rename = "precipitacion", default)]
    pub precipitation: Vec<PeriodValue>,
    #[serde(rename = "probPrecipitacion", default)]
    pub precipitation_probability: Vec<PeriodValue>,
    #[serde(rename = "temperatura", default)]
    pub temperature: Vec<PeriodValue>,
    #[serde(rename = "sensTermica", default)]
    pub apparent_temperature: Vec<PeriodValue>,
    #[serde(rename = "humedadRelativa", default)]
    pub humidity: Vec<PeriodValue>,
    #[serde(rename = "vientoAndRachaMax", default)]
    pub wind: Vec<WindEntry>,
}

/// A value tagged with its period
#[derive(Debug, Clone, Deserialize)]
pub struct PeriodValue {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: Option<String>,
    #[serde(rename = "periodo", default)]
    pub period: String,
}

/// Sky state entry: icon code in `value` plus a description
#[derive(Debug, Clone, Deserialize)]
pub struct SkyEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: Option<String>,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "periodo", default)]
    pub period: String,
}

/// Wind array entry
///
/// Speed/direction records populate `velocidad` and `direccion`; gust
/// records populate only `value`. Both kinds share the same period tag.
#[derive(Debug, Clone, Deserialize)]
pub struct WindEntry {
    #[serde(rename = "direccion", default)]
    pub direction: Vec<String>,
    #[serde(rename = "velocidad", default)]
    pub speed: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: Option<String>,
    #[serde(rename = "periodo", default)]
    pub period: String,
}

impl WindEntry {
    fn is_speed_record(&self) -> bool {
        !self.speed.is_empty()
    }

    fn is_gust_record(&self) -> bool {
        self.value.is_some()
    }
}

/// Accepts either a JSON string or number as a string value
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Flattens day bundles into one chronological list of hours
///
/// The temperature array of each day is authoritative for which hours exist.
/// Other metrics are looked up by period tag; a missing tag leaves that
/// metric empty for the hour. Duplicate timestamps keep their first entry.
pub fn normalize_days(days: &[DailyForecast]) -> Vec<HourlyObservation> {
    let mut hours: Vec<HourlyObservation> = days.iter().flat_map(normalize_day).collect();
    hours.sort_by_key(|h| h.time);
    hours.dedup_by_key(|h| h.time);
    hours
}

fn normalize_day(day: &DailyForecast) -> Vec<HourlyObservation> {
    let Some(date) = parse_forecast_date(&day.date) else {
        warn!("skipping forecast day with unparseable date {:?}", day.date);
        return Vec::new();
    };

    let precipitation_probability = day
        .precipitation_probability
        .first()
        .and_then(|p| p.value.as_deref())
        .and_then(parse_number::<u8>)
        .unwrap_or(0);

    let mut hours = Vec::with_capacity(day.temperature.len());

    for temperature in &day.temperature {
        let tag = temperature.period.as_str();
        let Some(time) = parse_period_hour(tag).and_then(|hour| date.and_hms_opt(hour, 0, 0))
        else {
            warn!("skipping forecast hour with invalid period {:?}", tag);
            continue;
        };

        let sky = day.sky.iter().find(|s| s.period == tag);
        let precipitation = find_value(&day.precipitation, tag);
        let humidity = find_value(&day.humidity, tag);
        let apparent = find_value(&day.apparent_temperature, tag);

        let wind_entries: Vec<&WindEntry> = day.wind.iter().filter(|w| w.period == tag).collect();
        let wind = wind_entries.iter().find(|w| w.is_speed_record());
        let gust = wind_entries.iter().find(|w| w.is_gust_record());

        hours.push(HourlyObservation {
            time,
            temperature: temperature.value.as_deref().and_then(parse_degrees),
            sky_description: sky.and_then(|s| s.description.clone()),
            sky_icon: sky.and_then(|s| s.value.clone()),
            precipitation: precipitation
                .filter(|p| !p.trim().is_empty())
                .unwrap_or("0")
                .to_string(),
            precipitation_probability,
            humidity: humidity.and_then(parse_number::<u8>),
            apparent_temperature: apparent.and_then(parse_degrees),
            wind_speed: wind
                .and_then(|w| w.speed.first())
                .and_then(|s| parse_number::<u32>(s)),
            wind_direction: wind.and_then(|w| w.direction.first().cloned()),
            wind_gust: gust
                .and_then(|g| g.value.as_deref())
                .and_then(parse_number::<u32>),
            sunrise: day.sunrise.clone(),
            sunset: day.sunset.clone(),
        });
    }

    hours
}

fn find_value<'a>(values: &'a [PeriodValue], tag: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|v| v.period == tag)
        .and_then(|v| v.value.as_deref())
}

/// Takes the date part of "2026-01-15T00:00:00"
fn parse_forecast_date(date: &str) -> Option<NaiveDate> {
    let day = date.split('T').next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parses an hour-of-day period tag such as "07"
fn parse_period_hour(tag: &str) -> Option<u32> {
    tag.trim().parse::<u32>().ok().filter(|h| *h < 24)
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

/// Parses a temperature, rounding decimal values
fn parse_degrees(value: &str) -> Option<i32> {
    let value = value.trim();
    value
        .parse::<i32>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|v| v.round() as i32))
}

/// Normalized hours with the "current" hour resolved against a clock
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyTimeline<'a> {
    hours: &'a [HourlyObservation],
    current: Option<usize>,
}

impl<'a> HourlyTimeline<'a> {
    /// Resolves the current hour for `now`
    ///
    /// The current hour is the earliest sample not before the start of the
    /// clock hour containing `now`. When every sample is in the past, the
    /// first one is used.
    pub fn new(hours: &'a [HourlyObservation], now: NaiveDateTime) -> Self {
        let start_of_hour = now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);

        let current = if hours.is_empty() {
            None
        } else {
            Some(
                hours
                    .iter()
                    .position(|h| h.time >= start_of_hour)
                    .unwrap_or(0),
            )
        };

        Self { hours, current }
    }

    /// All hours in chronological order
    pub fn hours(&self) -> &'a [HourlyObservation] {
        self.hours
    }

    /// Index of the current hour
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// The current hour
    pub fn current(&self) -> Option<&'a HourlyObservation> {
        self.current.map(|i| &self.hours[i])
    }

    /// Up to `count` hours starting at the current one
    pub fn upcoming(&self, count: usize) -> &'a [HourlyObservation] {
        match self.current {
            Some(start) => {
                let end = (start + count).min(self.hours.len());
                &self.hours[start..end]
            }
            None => &[],
        }
    }

    /// The 12-hour outlook starting at the current hour
    pub fn next_12_hours(&self) -> &'a [HourlyObservation] {
        self.upcoming(OUTLOOK_HOURS)
    }
}

/// Locality report built from a forecast document
#[derive(Debug, Clone, PartialEq)]
pub struct LocalityForecast {
    /// Municipality name
    pub name: Option<String>,
    /// Province name
    pub province: Option<String>,
    /// Normalized hours
    pub hours: Vec<HourlyObservation>,
}

impl LocalityForecast {
    /// Normalizes a forecast document
    pub fn from_document(document: ForecastDocument) -> Self {
        let hours = document
            .prediction
            .map(|p| normalize_days(&p.days))
            .unwrap_or_default();
        Self {
            name: document.name,
            province: document.province,
            hours,
        }
    }

    /// Resolves the current hour and outlook for `now`
    pub fn timeline(&self, now: NaiveDateTime) -> HourlyTimeline<'_> {
        HourlyTimeline::new(&self.hours, now)
    }
}

/// Maps an AEMET sky description to a condition
///
/// Descriptions are Spanish free text, so the mapping is keyword based.
/// Storms win over snow, snow over rain.
pub fn sky_condition(description: Option<&str>) -> SkyCondition {
    let description = description.unwrap_or_default().to_lowercase();

    if description.contains("tormenta") {
        SkyCondition::Storm
    } else if description.contains("nieve") {
        SkyCondition::Snow
    } else if description.contains("lluvia") {
        SkyCondition::Rain
    } else if description.contains("despejado") || description.contains("sol") {
        SkyCondition::Clear
    } else if description.contains("nubes") || description.contains("nuboso") {
        SkyCondition::PartlyCloudy
    } else if description.contains("cubierto") {
        SkyCondition::Overcast
    } else {
        SkyCondition::Cloudy
    }
}

/// Whether an AEMET sky icon code denotes night, e.g. "12n"
pub fn is_night_icon(icon: Option<&str>) -> bool {
    icon.is_some_and(|i| i.ends_with('n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two days, with the second day listed first and misaligned arrays
    const FORECAST: &str = r#"[{
        "nombre": "Panticosa",
        "provincia": "Huesca",
        "prediccion": {
            "dia": [
                {
                    "fecha": "2026-01-16T00:00:00",
                    "orto": "08:32",
                    "ocaso": "17:48",
                    "estadoCielo": [{"value": "11", "periodo": "00", "descripcion": "Despejado"}],
                    "precipitacion": [],
                    "probPrecipitacion": [{"value": "10", "periodo": "0006"}],
                    "temperatura": [{"value": "-4", "periodo": "00"}, {"value": "-5", "periodo": "01"}],
                    "sensTermica": [{"value": "-9", "periodo": "00"}],
                    "humedadRelativa": [{"value": "80", "periodo": "01"}],
                    "vientoAndRachaMax": []
                },
                {
                    "fecha": "2026-01-15T00:00:00",
                    "orto": "08:33",
                    "ocaso": "17:47",
                    "estadoCielo": [
                        {"value": "12n", "periodo": "23", "descripcion": "Poco nuboso"},
                        {"value": "15", "periodo": "22", "descripcion": "Muy nuboso"}
                    ],
                    "precipitacion": [{"value": "Ip", "periodo": "22"}],
                    "probPrecipitacion": [{"value": "25", "periodo": "2002"}],
                    "temperatura": [{"value": "-1", "periodo": "22"}, {"value": -2, "periodo": "23"}],
                    "sensTermica": [{"value": "-5", "periodo": "22"}, {"value": "-6", "periodo": "23"}],
                    "humedadRelativa": [{"value": "70", "periodo": "22"}],
                    "vientoAndRachaMax": [
                        {"value": "35", "periodo": "22"},
                        {"direccion": ["NO"], "velocidad": ["15"], "periodo": "22"},
                        {"direccion": ["N"], "velocidad": ["10"], "periodo": "23"}
                    ]
                }
            ]
        }
    }]"#;

    fn sample() -> LocalityForecast {
        let documents: Vec<ForecastDocument> =
            serde_json::from_str(FORECAST).expect("Failed to parse forecast");
        LocalityForecast::from_document(documents.into_iter().next().unwrap())
    }

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn observation(time: &str) -> HourlyObservation {
        HourlyObservation {
            time: at(time),
            temperature: None,
            sky_description: None,
            sky_icon: None,
            precipitation: "0".to_string(),
            precipitation_probability: 0,
            humidity: None,
            apparent_temperature: None,
            wind_speed: None,
            wind_direction: None,
            wind_gust: None,
            sunrise: None,
            sunset: None,
        }
    }

    #[test]
    fn test_hours_sorted_across_days() {
        let forecast = sample();
        let times: Vec<NaiveDateTime> = forecast.hours.iter().map(|h| h.time).collect();
        assert_eq!(
            times,
            vec![
                at("2026-01-15T22:00"),
                at("2026-01-15T23:00"),
                at("2026-01-16T00:00"),
                at("2026-01-16T01:00"),
            ]
        );
        assert_eq!(forecast.name.as_deref(), Some("Panticosa"));
        assert_eq!(forecast.province.as_deref(), Some("Huesca"));
    }

    #[test]
    fn test_metrics_joined_by_period_tag() {
        let forecast = sample();
        let h22 = &forecast.hours[0];
        assert_eq!(h22.temperature, Some(-1));
        assert_eq!(h22.sky_description.as_deref(), Some("Muy nuboso"));
        assert_eq!(h22.sky_icon.as_deref(), Some("15"));
        assert_eq!(h22.precipitation, "Ip");
        assert_eq!(h22.humidity, Some(70));
        assert_eq!(h22.apparent_temperature, Some(-5));

        let h23 = &forecast.hours[1];
        assert_eq!(h23.temperature, Some(-2));
        assert_eq!(h23.sky_icon.as_deref(), Some("12n"));
        assert_eq!(h23.humidity, None);
        assert_eq!(h23.precipitation, "0");
    }

    #[test]
    fn test_wind_and_gust_disambiguated() {
        let forecast = sample();
        let h22 = &forecast.hours[0];
        assert_eq!(h22.wind_speed, Some(15));
        assert_eq!(h22.wind_direction.as_deref(), Some("NO"));
        assert_eq!(h22.wind_gust, Some(35));

        let h23 = &forecast.hours[1];
        assert_eq!(h23.wind_speed, Some(10));
        assert_eq!(h23.wind_gust, None);
    }

    #[test]
    fn test_day_fields_carried_to_each_hour() {
        let forecast = sample();
        assert!(forecast.hours[..2]
            .iter()
            .all(|h| h.precipitation_probability == 25 && h.sunrise.as_deref() == Some("08:33")));
        assert!(forecast.hours[2..]
            .iter()
            .all(|h| h.precipitation_probability == 10 && h.sunset.as_deref() == Some("17:48")));
    }

    #[test]
    fn test_one_entry_per_temperature_period() {
        let day: DailyForecast = serde_json::from_str(
            r#"{
                "fecha": "2026-01-15T00:00:00",
                "temperatura": [
                    {"value": "1", "periodo": "08"},
                    {"value": "2", "periodo": "08"},
                    {"value": "3", "periodo": "09"},
                    {"value": "4", "periodo": "xx"}
                ]
            }"#,
        )
        .unwrap();

        let hours = normalize_days(&[day]);
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].temperature, Some(1));
        assert!(hours.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_unparseable_day_is_skipped() {
        let day: DailyForecast = serde_json::from_str(
            r#"{"fecha": "mañana", "temperatura": [{"value": "1", "periodo": "08"}]}"#,
        )
        .unwrap();
        assert!(normalize_days(&[day]).is_empty());
    }

    #[test]
    fn test_current_hour_is_start_of_clock_hour() {
        let forecast = sample();
        let timeline = forecast.timeline(at("2026-01-15T23:40"));
        assert_eq!(timeline.current_index(), Some(1));
        assert_eq!(timeline.current().unwrap().time, at("2026-01-15T23:00"));
    }

    #[test]
    fn test_current_hour_before_forecast_start() {
        let forecast = sample();
        let timeline = forecast.timeline(at("2026-01-15T08:15"));
        assert_eq!(timeline.current_index(), Some(0));
    }

    #[test]
    fn test_current_hour_falls_back_to_first_when_all_past() {
        let forecast = sample();
        let timeline = forecast.timeline(at("2026-01-20T12:00"));
        assert_eq!(timeline.current_index(), Some(0));
    }

    #[test]
    fn test_next_12_hours_window() {
        let hours: Vec<HourlyObservation> = (0..20)
            .map(|h| observation(&format!("2026-01-15T{:02}:00", h)))
            .collect();

        let timeline = HourlyTimeline::new(&hours, at("2026-01-15T05:30"));
        let outlook = timeline.next_12_hours();
        assert_eq!(outlook.len(), 12);
        assert_eq!(outlook[0].time, at("2026-01-15T05:00"));
        assert_eq!(outlook[11].time, at("2026-01-15T16:00"));

        let late = HourlyTimeline::new(&hours, at("2026-01-15T15:10"));
        assert_eq!(late.next_12_hours().len(), 5);
        let current = late.current().unwrap().time;
        assert!(late.next_12_hours().iter().all(|h| h.time >= current));
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = HourlyTimeline::new(&[], at("2026-01-15T05:30"));
        assert!(timeline.current().is_none());
        assert!(timeline.next_12_hours().is_empty());
    }

    #[test]
    fn test_document_without_prediction() {
        let forecast = LocalityForecast::from_document(ForecastDocument {
            name: Some("Jaca".to_string()),
            province: None,
            prediction: None,
        });
        assert!(forecast.hours.is_empty());
    }

    #[test]
    fn test_sky_condition_mapping() {
        assert_eq!(sky_condition(Some("Nuboso con tormenta")), SkyCondition::Storm);
        assert_eq!(sky_condition(Some("Cubierto con nieve")), SkyCondition::Snow);
        assert_eq!(sky_condition(Some("Muy nuboso con lluvia")), SkyCondition::Rain);
        assert_eq!(sky_condition(Some("Despejado")), SkyCondition::Clear);
        assert_eq!(sky_condition(Some("Poco nuboso")), SkyCondition::PartlyCloudy);
        assert_eq!(sky_condition(Some("Intervalos nubosos")), SkyCondition::PartlyCloudy);
        assert_eq!(sky_condition(Some("Cubierto")), SkyCondition::Overcast);
        assert_eq!(sky_condition(Some("Niebla")), SkyCondition::Cloudy);
        assert_eq!(sky_condition(None), SkyCondition::Cloudy);
    }

    #[test]
    fn test_night_icon() {
        assert!(is_night_icon(Some("12n")));
        assert!(!is_night_icon(Some("12")));
        assert!(!is_night_icon(None));
    }
}
