//! Report loading service
//!
//! Wires the AEMET client to the query cache and bounds every logical load
//! with an overall deadline, so a long backoff chain cannot hang the UI.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::cache::{QueryCache, QueryKey};
use crate::cli::ClientConfig;
use crate::data::{AemetClient, FetchError, HttpFetcher, LocationItem, Report, ViewMode};

/// Default overall deadline per report load
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Loads reports and the municipality list through the cache
#[derive(Debug)]
pub struct WeatherService {
    client: AemetClient,
    reports: QueryCache<Report>,
    municipalities: QueryCache<Vec<LocationItem>>,
    deadline: Duration,
}

impl WeatherService {
    pub fn new(client: AemetClient) -> Self {
        Self {
            client,
            reports: QueryCache::new(),
            municipalities: QueryCache::new(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Builds the client and service from startup configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let fetcher = HttpFetcher::new().with_policy(config.retry);
        let client = AemetClient::with_fetcher(fetcher, config.api_key.clone())
            .with_base_url(config.base_url.clone())
            .with_routing(config.routing);
        Self::new(client).with_deadline(config.deadline)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Report for a location in the given view mode
    ///
    /// # Returns
    /// * `Ok(Arc<Report>)` - Cached while fresh, loaded otherwise
    /// * `Err(FetchError::Timeout)` - The deadline elapsed; the load is cancelled
    pub async fn report(&self, mode: ViewMode, location_id: &str) -> Result<Arc<Report>, FetchError> {
        let key = QueryKey::report(mode, location_id);
        let client = self.client.clone();
        let id = location_id.to_string();

        let load = self.reports.get_or_fetch(key.clone(), move || async move {
            match mode {
                ViewMode::Locality => client.fetch_locality_forecast(&id).await.map(Report::Locality),
                ViewMode::Zone => client.fetch_nivological_bulletin(&id).await.map(Report::Zone),
            }
        });

        within_deadline(self.deadline, &self.reports, &key, load).await
    }

    /// Municipality master list, sorted by name
    pub async fn municipalities(&self) -> Result<Arc<Vec<LocationItem>>, FetchError> {
        let client = self.client.clone();
        let load = self
            .municipalities
            .get_or_fetch(QueryKey::Municipalities, move || async move {
                client.fetch_municipalities().await
            });

        within_deadline(self.deadline, &self.municipalities, &QueryKey::Municipalities, load).await
    }

    /// Municipality list if it is already cached
    pub fn cached_municipalities(&self) -> Option<Arc<Vec<LocationItem>>> {
        self.municipalities
            .read(&QueryKey::Municipalities)
            .map(|cached| cached.data)
    }

    /// Drops a cached report so the next request refetches it
    pub fn invalidate(&self, mode: ViewMode, location_id: &str) {
        let key = QueryKey::report(mode, location_id);
        self.reports.cancel(&key);
        self.reports.invalidate(&key);
    }

    /// Abandons an in-flight report load
    pub fn cancel(&self, mode: ViewMode, location_id: &str) {
        self.reports.cancel(&QueryKey::report(mode, location_id));
    }

    /// Whether a report load for the location is in flight
    pub fn is_loading(&self, mode: ViewMode, location_id: &str) -> bool {
        self.reports.is_in_flight(&QueryKey::report(mode, location_id))
    }
}

async fn within_deadline<T, Fut>(
    deadline: Duration,
    cache: &QueryCache<T>,
    key: &QueryKey,
    load: Fut,
) -> Result<Arc<T>, FetchError>
where
    T: Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<T>, FetchError>>,
{
    match tokio::time::timeout(deadline, load).await {
        Ok(result) => result,
        Err(_) => {
            warn!("load for {:?} timed out after {:?}", key, deadline);
            cache.cancel(key);
            Err(FetchError::Timeout(deadline))
        }
    }
}
