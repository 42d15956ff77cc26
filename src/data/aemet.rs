//! AEMET OpenData client
//!
//! Every AEMET endpoint answers with a small metadata envelope whose `datos`
//! field points at the real payload. The client resolves that indirection:
//! one authenticated request for the envelope, then a plain request for the
//! data URL.

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::Deserialize;

use super::bulletin::NivoBulletin;
use super::forecast::{ForecastDocument, LocalityForecast};
use super::http::{FetchError, HttpFetcher, Payload};
use super::locations::{municipalities_from_records, LocationItem, MunicipalityRecord};

/// Base URL for the AEMET OpenData API
pub const AEMET_BASE_URL: &str = "https://opendata.aemet.es/opendata/api";

/// Status the envelope reports on success
const ENVELOPE_OK: i64 = 200;

/// Message used when a failed envelope carries no description
const GENERIC_UPSTREAM_ERROR: &str = "Invalid response from AEMET";

/// First-hop metadata envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "estado", default)]
    pub status: i64,
    #[serde(rename = "datos", default)]
    pub data_url: Option<String>,
    #[serde(rename = "metadatos", default)]
    pub metadata_url: Option<String>,
}

impl Envelope {
    /// Returns the data URL of a successful envelope
    pub fn into_data_url(self) -> Result<String, FetchError> {
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| GENERIC_UPSTREAM_ERROR.to_string());

        if self.status != ENVELOPE_OK {
            return Err(FetchError::Upstream(description));
        }

        self.data_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(FetchError::Upstream(description))
    }
}

/// How the second-hop data URL is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataUrlRouting {
    /// Re-root the data URL's path and query onto the API base origin
    #[default]
    SameOrigin,
    /// Request the data URL exactly as the envelope gives it
    Direct,
}

/// Client for the AEMET OpenData API
#[derive(Debug, Clone)]
pub struct AemetClient {
    fetcher: HttpFetcher,
    base_url: String,
    api_key: String,
    routing: DataUrlRouting,
}

impl AemetClient {
    /// Create a new client against the public API
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_fetcher(HttpFetcher::new(), api_key)
    }

    /// Create a new client with a custom fetcher
    pub fn with_fetcher(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: AEMET_BASE_URL.to_string(),
            api_key: api_key.into(),
            routing: DataUrlRouting::default(),
        }
    }

    /// Use a different API base, e.g. a local proxy or a mock server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Choose how data URLs are requested
    pub fn with_routing(mut self, routing: DataUrlRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a logical endpoint to its final payload
    ///
    /// # Arguments
    /// * `endpoint` - Path below the API base, e.g. `maestro/municipios`
    ///
    /// # Returns
    /// * `Ok(Payload)` - The decoded second-hop body
    /// * `Err(FetchError)` - Either hop failed, or the envelope reported an error
    pub async fn get(&self, endpoint: &str) -> Result<Payload, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!("requesting envelope {}", url);

        let envelope: Envelope = self.fetcher.fetch(&url, self.envelope_headers()?).await?.deserialize()?;
        let data_url = self.route_data_url(&envelope.into_data_url()?)?;

        debug!("requesting data {}", data_url);
        self.fetcher.fetch(&data_url, HeaderMap::new()).await
    }

    fn envelope_headers(&self) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key).map_err(|_| FetchError::InvalidApiKey)?;
        headers.insert("api_key", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Maps the envelope's data URL to the URL actually requested
    ///
    /// Relative data URLs are resolved against the API base in both modes.
    pub fn route_data_url(&self, data_url: &str) -> Result<String, FetchError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Decode(format!("invalid base URL {}: {}", self.base_url, e)))?;
        let target = base
            .join(data_url)
            .map_err(|e| FetchError::Decode(format!("invalid data URL {}: {}", data_url, e)))?;

        match self.routing {
            DataUrlRouting::Direct => Ok(target.to_string()),
            DataUrlRouting::SameOrigin => {
                let mut routed = base;
                routed.set_path(target.path());
                routed.set_query(target.query());
                routed.set_fragment(None);
                Ok(routed.to_string())
            }
        }
    }

    /// Fetch the hourly forecast document of a municipality
    ///
    /// # Returns
    /// * `Ok(None)` - AEMET returned an empty array for the locality
    pub async fn fetch_hourly_forecast(
        &self,
        municipality_id: &str,
    ) -> Result<Option<ForecastDocument>, FetchError> {
        let documents: Vec<ForecastDocument> = self
            .get(&format!("prediccion/especifica/municipio/horaria/{}", municipality_id))
            .await?
            .deserialize()?;
        Ok(documents.into_iter().next())
    }

    /// Fetch and normalize the hourly forecast of a municipality
    pub async fn fetch_locality_forecast(
        &self,
        municipality_id: &str,
    ) -> Result<Option<LocalityForecast>, FetchError> {
        Ok(self
            .fetch_hourly_forecast(municipality_id)
            .await?
            .map(LocalityForecast::from_document))
    }

    /// Fetch the nivological bulletin of a mountain zone
    pub async fn fetch_nivological_bulletin(&self, zone_id: &str) -> Result<NivoBulletin, FetchError> {
        let payload = self
            .get(&format!("prediccion/especifica/nivologica/{}", zone_id))
            .await?;
        NivoBulletin::from_payload(payload)
    }

    /// Fetch the municipality master list, sorted by name
    pub async fn fetch_municipalities(&self) -> Result<Vec<LocationItem>, FetchError> {
        let records: Vec<MunicipalityRecord> = self.get("maestro/municipios").await?.deserialize()?;
        Ok(municipalities_from_records(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::http::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AemetClient {
        let fetcher = HttpFetcher::new().with_policy(RetryPolicy {
            retries: 0,
            initial_backoff: Duration::from_millis(1),
        });
        AemetClient::with_fetcher(fetcher, "test-key").with_base_url(server.uri())
    }

    fn envelope(datos: &str) -> serde_json::Value {
        json!({
            "descripcion": "exito",
            "estado": 200,
            "datos": datos,
            "metadatos": "https://opendata.aemet.es/opendata/sh/meta"
        })
    }

    async fn mount_envelope(server: &MockServer, endpoint: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(header("api_key", "test-key"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_envelope_error_uses_description() {
        let envelope: Envelope = serde_json::from_value(json!({
            "descripcion": "No hay datos que satisfagan esos criterios",
            "estado": 404
        }))
        .unwrap();

        match envelope.into_data_url() {
            Err(FetchError::Upstream(msg)) => {
                assert_eq!(msg, "No hay datos que satisfagan esos criterios")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_envelope_error_without_description() {
        let envelope: Envelope = serde_json::from_value(json!({"estado": 401})).unwrap();
        match envelope.into_data_url() {
            Err(FetchError::Upstream(msg)) => assert_eq!(msg, GENERIC_UPSTREAM_ERROR),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_envelope_without_data_url_fails() {
        let envelope: Envelope = serde_json::from_value(json!({"estado": 200})).unwrap();
        assert!(matches!(envelope.into_data_url(), Err(FetchError::Upstream(_))));
    }

    #[test]
    fn test_same_origin_routing() {
        let client = AemetClient::new("k").with_base_url("http://localhost:8080/opendata/api/");
        assert_eq!(
            client.route_data_url("https://upstream/x?a=1").unwrap(),
            "http://localhost:8080/x?a=1"
        );
        assert_eq!(
            client.route_data_url("/opendata/sh/abc").unwrap(),
            "http://localhost:8080/opendata/sh/abc"
        );
    }

    #[test]
    fn test_direct_routing() {
        let client = AemetClient::new("k")
            .with_base_url("http://localhost:8080")
            .with_routing(DataUrlRouting::Direct);
        assert_eq!(
            client.route_data_url("https://upstream/x").unwrap(),
            "https://upstream/x"
        );
    }

    #[test]
    fn test_invalid_api_key_header() {
        let client = AemetClient::new("bad\nkey");
        assert!(matches!(client.envelope_headers(), Err(FetchError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_data_url_rerooted_onto_base_origin() {
        let server = MockServer::start().await;
        mount_envelope(&server, "/maestro/municipios", envelope("https://upstream/x")).await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "id22170", "nombre": "Panticosa"},
                {"id": "id08019", "nombre": "Barcelona"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let municipalities = client_for(&server).fetch_municipalities().await.unwrap();

        let names: Vec<&str> = municipalities.iter().map(|m| m.name.as_str()).collect();
        let ids: Vec<&str> = municipalities.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(names, ["Barcelona", "Panticosa"]);
        assert_eq!(ids, ["08019", "22170"]);
    }

    #[tokio::test]
    async fn test_upstream_error_skips_second_hop() {
        let server = MockServer::start().await;
        mount_envelope(
            &server,
            "/prediccion/especifica/nivologica/1",
            json!({"descripcion": "API key invalido", "estado": 401}),
        )
        .await;

        let result = client_for(&server).fetch_nivological_bulletin("1").await;
        match result {
            Err(FetchError::Upstream(msg)) => assert_eq!(msg, "API key invalido"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hourly_forecast_first_document() {
        let server = MockServer::start().await;
        mount_envelope(
            &server,
            "/prediccion/especifica/municipio/horaria/22170",
            envelope(&format!("{}/sh/forecast", server.uri())),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/sh/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "nombre": "Panticosa",
                "provincia": "Huesca",
                "prediccion": {"dia": [{
                    "fecha": "2026-01-15T00:00:00",
                    "temperatura": [{"value": "-3", "periodo": "07"}]
                }]}
            }])))
            .mount(&server)
            .await;

        let forecast = client_for(&server)
            .fetch_locality_forecast("22170")
            .await
            .unwrap()
            .expect("document present");

        assert_eq!(forecast.name.as_deref(), Some("Panticosa"));
        assert_eq!(forecast.hours.len(), 1);
        assert_eq!(forecast.hours[0].temperature, Some(-3));
    }

    #[tokio::test]
    async fn test_hourly_forecast_empty_array() {
        let server = MockServer::start().await;
        mount_envelope(
            &server,
            "/prediccion/especifica/municipio/horaria/99999",
            envelope("/sh/empty"),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/sh/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let forecast = client_for(&server).fetch_locality_forecast("99999").await.unwrap();
        assert!(forecast.is_none());
    }

    #[tokio::test]
    async fn test_nivological_latin1_text() {
        let server = MockServer::start().await;
        mount_envelope(&server, "/prediccion/especifica/nivologica/0", envelope("/sh/nivo")).await;
        let body: &[u8] = b"1.- Estimaci\xf3n del nivel de peligro:\n\nAran: marcado (3)\n2.- Estado del manto";
        Mock::given(method("GET"))
            .and(path("/sh/nivo"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), "text/plain"))
            .mount(&server)
            .await;

        let bulletin = client_for(&server).fetch_nivological_bulletin("0").await.unwrap();

        let estimates = bulletin.estimates().expect("estimate section parsed");
        assert_eq!(estimates.len(), 1);
        assert_eq!(estimates[0].area, "Aran");
        assert_eq!(estimates[0].levels, vec![3]);
    }

    #[tokio::test]
    async fn test_second_hop_failure_propagates() {
        let server = MockServer::start().await;
        mount_envelope(&server, "/maestro/municipios", envelope("/sh/gone")).await;
        Mock::given(method("GET"))
            .and(path("/sh/gone"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_municipalities().await;
        assert!(matches!(result, Err(FetchError::Server(500))));
    }
}
