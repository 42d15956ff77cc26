//! Background report loading
//!
//! Loads run as tokio tasks and report back over a channel, so the UI loop
//! never waits on the network. Only one report load is pending at a time:
//! asking for a different location aborts the previous task, which also
//! drops any backoff wait it was sleeping on.

use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::data::{FetchError, LocationItem, Report, ViewMode};
use crate::service::WeatherService;

/// Messages sent from background loads to the main app
#[derive(Debug, Clone)]
pub enum LoadMessage {
    /// A report load finished
    ReportLoaded {
        mode: ViewMode,
        location_id: String,
        result: Result<Arc<Report>, FetchError>,
    },
    /// The municipality list load finished
    MunicipalitiesLoaded(Result<Arc<Vec<LocationItem>>, FetchError>),
}

struct PendingLoad {
    mode: ViewMode,
    location_id: String,
    handle: JoinHandle<()>,
}

impl PendingLoad {
    fn is_for(&self, mode: ViewMode, location_id: &str) -> bool {
        self.mode == mode && self.location_id == location_id
    }
}

/// Spawns loads and collects their results
pub struct Loader {
    service: Arc<WeatherService>,
    sender: mpsc::Sender<LoadMessage>,
    receiver: mpsc::Receiver<LoadMessage>,
    pending: Option<PendingLoad>,
}

impl Loader {
    pub fn new(service: Arc<WeatherService>) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        Self {
            service,
            sender,
            receiver,
            pending: None,
        }
    }

    pub fn service(&self) -> &Arc<WeatherService> {
        &self.service
    }

    /// Starts loading a report, replacing any other pending report load
    ///
    /// A request for the location that is already loading is a no-op.
    pub fn request(&mut self, mode: ViewMode, location_id: &str) {
        if let Some(pending) = &self.pending {
            if pending.is_for(mode, location_id) && !pending.handle.is_finished() {
                debug!("load for {:?} {} already pending", mode, location_id);
                return;
            }
        }
        self.abort_pending();

        let service = Arc::clone(&self.service);
        let sender = self.sender.clone();
        let id = location_id.to_string();

        let handle = tokio::spawn(async move {
            let result = service.report(mode, &id).await;
            let _ = sender
                .send(LoadMessage::ReportLoaded {
                    mode,
                    location_id: id,
                    result,
                })
                .await;
        });

        self.pending = Some(PendingLoad {
            mode,
            location_id: location_id.to_string(),
            handle,
        });
    }

    /// Drops the cached report and loads it again
    pub fn refetch(&mut self, mode: ViewMode, location_id: &str) {
        self.abort_pending();
        self.service.invalidate(mode, location_id);
        self.request(mode, location_id);
    }

    /// Starts loading the municipality list in the background
    pub fn request_municipalities(&self) {
        let service = Arc::clone(&self.service);
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let result = service.municipalities().await;
            let _ = sender.send(LoadMessage::MunicipalitiesLoaded(result)).await;
        });
    }

    /// Aborts the pending report load, if it has not finished
    pub fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            if !pending.handle.is_finished() {
                debug!("aborting load for {:?} {}", pending.mode, pending.location_id);
                pending.handle.abort();
                self.service.cancel(pending.mode, &pending.location_id);
            }
        }
    }

    /// Checks for a finished load without blocking
    ///
    /// # Returns
    /// * `Some(LoadMessage)` if a message was available
    /// * `None` if no messages are pending
    pub fn try_recv(&mut self) -> Option<LoadMessage> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the next finished load
    pub async fn recv(&mut self) -> Option<LoadMessage> {
        self.receiver.recv().await
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
