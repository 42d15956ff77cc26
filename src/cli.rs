//! Command-line interface parsing for cumbre
//!
//! This module handles parsing of CLI arguments using clap and validates
//! them into the configuration the application starts with.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::data::aemet::{DataUrlRouting, AEMET_BASE_URL};
use crate::data::http::RetryPolicy;
use crate::data::locations::{all_zones, get_zone_by_id, DEFAULT_MUNICIPALITY_ID};
use crate::data::ViewMode;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The zone code is not a known nivological area
    #[error("Unknown mountain zone: '{0}'. Valid zones: {1}")]
    UnknownZone(String, String),

    /// The municipality code is not a 5-digit INE code
    #[error("Invalid municipality code: '{0}'. Expected a 5-digit INE code such as 22170")]
    InvalidMunicipio(String),

    /// No API key was given on the command line or in the environment
    #[error("Missing AEMET API key: pass --api-key or set AEMET_API_KEY")]
    MissingApiKey,
}

/// cumbre - AEMET mountain weather and avalanche bulletins in the terminal
#[derive(Parser, Debug)]
#[command(name = "cumbre")]
#[command(about = "AEMET mountain weather forecasts and avalanche bulletins")]
#[command(version)]
pub struct Cli {
    /// AEMET OpenData API key
    #[arg(long, env = "AEMET_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Start on the hourly forecast of a municipality (INE code)
    #[arg(long, value_name = "ID", conflicts_with = "zona")]
    pub municipio: Option<String>,

    /// Start on the avalanche bulletin of a mountain zone
    ///
    /// Valid zones: 0 (Pirineo Catalán), 1 (Pirineo Navarro y Aragonés)
    #[arg(long, value_name = "ID")]
    pub zona: Option<String>,

    /// AEMET OpenData API base URL
    #[arg(long, value_name = "URL", default_value = AEMET_BASE_URL)]
    pub base_url: String,

    /// Request the envelope's data URL as-is instead of through the API origin
    #[arg(long)]
    pub direct_data_url: bool,

    /// Retries per request after the first attempt
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub retries: u32,

    /// Wait before the first retry, doubled on every retry
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub backoff_ms: u64,

    /// Overall deadline for loading one report
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub deadline_secs: u64,

    /// Print the selected report as plain text and exit
    #[arg(long)]
    pub print: bool,
}

/// Settings for talking to AEMET
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub routing: DataUrlRouting,
    pub retry: RetryPolicy,
    /// Overall deadline per report load, including retries
    pub deadline: Duration,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// View shown first
    pub mode: ViewMode,
    /// Location shown first
    pub location_id: String,
    /// Whether to print once instead of starting the TUI
    pub print: bool,
    pub client: ClientConfig,
}

/// Checks that a municipality code looks like an INE code
pub fn parse_municipio_arg(s: &str) -> Result<String, CliError> {
    let s = s.trim();
    if s.len() == 5 && s.chars().all(|c| c.is_ascii_digit()) {
        Ok(s.to_string())
    } else {
        Err(CliError::InvalidMunicipio(s.to_string()))
    }
}

/// Checks that a zone code is one of the known mountain zones
pub fn parse_zona_arg(s: &str) -> Result<String, CliError> {
    match get_zone_by_id(s.trim()) {
        Some(zone) => Ok(zone.id.to_string()),
        None => {
            let valid = all_zones()
                .iter()
                .map(|z| format!("{} ({})", z.id, z.name))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::UnknownZone(s.to_string(), valid))
        }
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// The location is validated before the API key, so a bad location is
    /// reported even when no key is configured.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if a location is invalid or the API key is missing
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let (mode, location_id) = match (&cli.zona, &cli.municipio) {
            (Some(zona), _) => (ViewMode::Zone, parse_zona_arg(zona)?),
            (None, Some(municipio)) => (ViewMode::Locality, parse_municipio_arg(municipio)?),
            (None, None) => (ViewMode::Locality, DEFAULT_MUNICIPALITY_ID.to_string()),
        };

        let api_key = cli
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(CliError::MissingApiKey)?
            .to_string();

        let routing = if cli.direct_data_url {
            DataUrlRouting::Direct
        } else {
            DataUrlRouting::SameOrigin
        };

        Ok(StartupConfig {
            mode,
            location_id,
            print: cli.print,
            client: ClientConfig {
                api_key,
                base_url: cli.base_url.clone(),
                routing,
                retry: RetryPolicy {
                    retries: cli.retries,
                    initial_backoff: Duration::from_millis(cli.backoff_ms),
                },
                deadline: Duration::from_secs(cli.deadline_secs),
            },
        })
    }
}
