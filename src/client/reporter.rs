//! Fire-and-forget click reporting.
//!
//! `report` schedules a detached send and returns at once. Nothing flows back
//! to the caller: no result, no error, no cancellation path.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use super::page::PageContext;
use super::storage::KeyValueStorage;
use crate::widget::EngagementEvent;

/// Session-storage key of the session identifier.
pub const SESSION_KEY: &str = "wa_session_id";

/// Namespace prefix for generated session identifiers.
pub const SESSION_PREFIX: &str = "wa_";

/// Upper bound on a single telemetry POST, connect through body.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Events waiting for a delivery slot; further beacons are refused.
pub const BEACON_QUEUE_CAPACITY: usize = 256;

/// Deliveries allowed in flight at once.
pub const BEACON_MAX_IN_FLIGHT: usize = 8;

/// HTTP client for telemetry. Every request is bounded by
/// [`DELIVERY_TIMEOUT`] so a hung origin cannot pin a delivery slot.
pub fn delivery_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DELIVERY_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            debug!("telemetry client builder failed, using defaults: {e}");
            reqwest::Client::new()
        })
}

// ============================================================================
// Session Identity
// ============================================================================

/// The browsing-session identifier: read from session storage, or generated
/// once and written back. Stable for the lifetime of this value even when
/// the storage is unusable.
pub struct SessionIdentity {
    storage: Arc<dyn KeyValueStorage>,
    id: OnceCell<String>,
}

impl SessionIdentity {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            id: OnceCell::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.id.get_or_init(|| {
            match self.storage.get(SESSION_KEY) {
                Ok(Some(existing)) if !existing.trim().is_empty() => return existing,
                Ok(_) => {}
                Err(e) => debug!("session storage unreadable: {e}"),
            }
            let generated = format!("{SESSION_PREFIX}{}", uuid::Uuid::new_v4().simple());
            if let Err(e) = self.storage.set(SESSION_KEY, &generated) {
                debug!("session id not persisted: {e}");
            }
            generated
        })
    }
}

// ============================================================================
// Beacon
// ============================================================================

/// A send primitive that queues a payload and survives the caller going away.
/// Returns `false` when the payload was not accepted.
pub trait BeaconTransport: Send + Sync {
    fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool;
}

/// Beacon backed by a bounded queue and a dispatcher task that hands each
/// event to its own delivery task. A slow endpoint holds one slot, not the
/// whole queue.
#[derive(Clone)]
pub struct BeaconQueue {
    tx: mpsc::Sender<(String, Vec<u8>)>,
}

impl BeaconQueue {
    /// Spawn the dispatcher on the current runtime with the default limits.
    pub fn spawn(client: reqwest::Client) -> Self {
        Self::spawn_with_limits(client, BEACON_QUEUE_CAPACITY, BEACON_MAX_IN_FLIGHT)
    }

    /// The dispatcher exits once every queue handle is dropped and the
    /// backlog is handed off.
    pub fn spawn_with_limits(client: reqwest::Client, capacity: usize, max_in_flight: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<(String, Vec<u8>)>(capacity.max(1));
        let slots = Arc::new(Semaphore::new(max_in_flight.max(1)));
        tokio::spawn(async move {
            loop {
                let Ok(permit) = slots.clone().acquire_owned().await else {
                    break;
                };
                let Some((url, body)) = rx.recv().await else {
                    break;
                };
                let client = client.clone();
                tokio::spawn(async move {
                    if let Err(e) = post_json(&client, &url, body).await {
                        debug!("beacon delivery failed: {e}");
                    }
                    drop(permit);
                });
            }
        });
        Self { tx }
    }
}

impl BeaconTransport for BeaconQueue {
    /// Refuses when the queue is full or the dispatcher is gone.
    fn send_beacon(&self, url: &str, body: Vec<u8>) -> bool {
        match self.tx.try_send((url.to_string(), body)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("beacon queue full, event refused");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

async fn post_json(client: &reqwest::Client, url: &str, body: Vec<u8>) -> reqwest::Result<()> {
    client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

// ============================================================================
// Reporter
// ============================================================================

struct ReporterInner {
    track_url: String,
    config_id: String,
    page: PageContext,
    session: Arc<SessionIdentity>,
    beacon: Option<Arc<dyn BeaconTransport>>,
    client: reqwest::Client,
}

/// Click reporter bound to one resolved configuration and one page.
#[derive(Clone)]
pub struct EngagementReporter {
    inner: Arc<ReporterInner>,
}

impl EngagementReporter {
    pub fn new(
        track_url: impl Into<String>,
        config_id: impl Into<String>,
        page: PageContext,
        session: Arc<SessionIdentity>,
    ) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                track_url: track_url.into(),
                config_id: config_id.into(),
                page,
                session,
                beacon: None,
                client: delivery_client(),
            }),
        }
    }

    pub fn with_beacon(self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.rebuild(|inner| inner.beacon = Some(beacon))
    }

    pub fn with_client(self, client: reqwest::Client) -> Self {
        self.rebuild(|inner| inner.client = client)
    }

    fn rebuild(self, edit: impl FnOnce(&mut ReporterInner)) -> Self {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => ReporterInner {
                track_url: shared.track_url.clone(),
                config_id: shared.config_id.clone(),
                page: shared.page.clone(),
                session: shared.session.clone(),
                beacon: shared.beacon.clone(),
                client: shared.client.clone(),
            },
        };
        edit(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn event_for(&self, agent_id: Option<&str>) -> EngagementEvent {
        let inner = &self.inner;
        EngagementEvent {
            config_id: inner.config_id.clone(),
            agent_id: agent_id.map(str::to_string),
            page_url: inner.page.url.clone(),
            referrer: inner.page.referrer.clone(),
            device_class: inner.page.device_class(),
            session_id: inner.session.id().to_string(),
        }
    }

    /// Record a click. Never blocks, never fails.
    pub fn report(&self, agent_id: Option<&str>) {
        let event = self.event_for(agent_id);
        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(e) => {
                debug!("engagement event not encodable: {e}");
                return;
            }
        };

        if let Some(beacon) = &self.inner.beacon {
            if beacon.send_beacon(&self.inner.track_url, body.clone()) {
                return;
            }
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime available, engagement event dropped");
            return;
        };
        let client = self.inner.client.clone();
        let url = self.inner.track_url.clone();
        runtime.spawn(async move {
            if let Err(e) = post_json(&client, &url, body).await {
                debug!("engagement event dropped: {e}");
            }
        });
    }
}
