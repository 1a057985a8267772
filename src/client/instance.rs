use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::cache::{LocalConfigCache, SystemClock};
use super::page::PageContext;
use super::render::{MountTarget, WidgetHandle, WidgetRenderer};
use super::reporter::{
    delivery_client, BeaconQueue, BeaconTransport, EngagementReporter, SessionIdentity,
};
use super::resolver::{ConfigResolver, HttpConfigSource};
use super::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use super::visibility::{HiddenReason, Visibility, VisibilityPolicy};
use crate::config::ClientConfig;
use crate::widget::WidgetConfiguration;

/// Result of booting the widget on one page.
pub enum BootOutcome {
    /// Policy kept the widget off this page.
    Hidden {
        config: WidgetConfiguration,
        reason: HiddenReason,
    },
    /// The widget will appear once its show delay elapses.
    Scheduled(WidgetHandle),
}

impl BootOutcome {
    pub fn handle(&self) -> Option<&WidgetHandle> {
        match self {
            BootOutcome::Scheduled(handle) => Some(handle),
            BootOutcome::Hidden { .. } => None,
        }
    }
}

/// One embedded widget: owns its resolver, session identity and transport,
/// and drives resolve → visibility → mount for a page.
pub struct WidgetInstance {
    resolver: ConfigResolver,
    track_url: String,
    session: Arc<SessionIdentity>,
    beacon: Option<Arc<dyn BeaconTransport>>,
    client: reqwest::Client,
}

impl WidgetInstance {
    pub fn new(resolver: ConfigResolver, track_url: impl Into<String>, session: Arc<SessionIdentity>) -> Self {
        Self {
            resolver,
            track_url: track_url.into(),
            session,
            beacon: None,
            client: delivery_client(),
        }
    }

    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Wire an instance from configuration: HTTP source, file-backed cache
    /// when a storage directory is set (in-memory otherwise), in-memory
    /// session scope and a beacon queue. Must be called inside a runtime.
    pub fn from_config(config: &ClientConfig) -> Self {
        let cache_storage: Arc<dyn KeyValueStorage> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStorage::new(dir.clone())),
            None => Arc::new(MemoryStorage::new()),
        };
        let cache = LocalConfigCache::new(
            cache_storage,
            Arc::new(SystemClock),
            Duration::from_millis(config.cache_ttl_ms),
        );
        let client = delivery_client();
        let source = HttpConfigSource::with_client(
            client.clone(),
            config.config_url.clone(),
            Duration::from_millis(config.fetch_timeout_ms),
        );

        let mut instance = Self::new(
            ConfigResolver::new(cache, Arc::new(source)),
            config.track_url.clone(),
            Arc::new(SessionIdentity::new(Arc::new(MemoryStorage::new()))),
        );
        instance.client = client.clone();
        instance.with_beacon(Arc::new(BeaconQueue::spawn(client)))
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn session(&self) -> &SessionIdentity {
        &self.session
    }

    /// Resolve and run the visibility policy without mounting.
    pub async fn evaluate(&self, page: &PageContext) -> (WidgetConfiguration, Visibility) {
        let config = self.resolver.resolve().await;
        let visibility = VisibilityPolicy::evaluate(&config, &page.route(), page.device_class());
        (config, visibility)
    }

    pub fn reporter_for(&self, config: &WidgetConfiguration, page: &PageContext) -> EngagementReporter {
        let reporter = EngagementReporter::new(
            self.track_url.clone(),
            config.id.clone(),
            page.clone(),
            self.session.clone(),
        )
        .with_client(self.client.clone());
        match &self.beacon {
            Some(beacon) => reporter.with_beacon(beacon.clone()),
            None => reporter,
        }
    }

    pub async fn boot(&self, page: &PageContext, target: Arc<dyn MountTarget>) -> BootOutcome {
        let (config, visibility) = self.evaluate(page).await;
        if let Visibility::Hidden(reason) = visibility {
            debug!(?reason, route = %page.route(), "widget hidden");
            return BootOutcome::Hidden { config, reason };
        }

        let reporter = self.reporter_for(&config, page);
        match WidgetRenderer::mount(config.clone(), target, reporter) {
            Some(handle) => BootOutcome::Scheduled(handle),
            None => BootOutcome::Hidden {
                config,
                reason: HiddenReason::NothingToRender,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cache::ManualClock;
    use crate::client::render::MemoryTarget;
    use crate::client::resolver::{ConfigSource, ResolveError};
    use crate::widget::defaults::default_payload;
    use crate::widget::ConfigPayload;
    use async_trait::async_trait;

    struct FixedSource(ConfigPayload);

    #[async_trait]
    impl ConfigSource for FixedSource {
        async fn fetch(&self) -> Result<ConfigPayload, ResolveError> {
            Ok(self.0.clone())
        }
    }

    fn instance(payload: ConfigPayload) -> WidgetInstance {
        let cache = LocalConfigCache::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(ManualClock::new(0)),
            Duration::from_secs(30),
        );
        WidgetInstance::new(
            ConfigResolver::new(cache, Arc::new(FixedSource(payload))),
            "http://127.0.0.1:9/whatsapp/track",
            Arc::new(SessionIdentity::new(Arc::new(MemoryStorage::new()))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn boot_schedules_visible_widget() {
        let mut payload = default_payload();
        payload.id = "cfg-9".into();
        payload.show_delay_ms = 100;
        let target = Arc::new(MemoryTarget::new());

        let outcome = instance(payload)
            .boot(&PageContext::new("https://example.com/"), target.clone())
            .await;
        let handle = outcome.handle().expect("widget scheduled");
        assert_eq!(handle.config().id, "cfg-9");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.is_mounted());
        assert!(target.markup().is_some());
    }

    #[tokio::test]
    async fn boot_respects_hidden_routes() {
        let outcome = instance(default_payload())
            .boot(
                &PageContext::new("https://example.com/admin/pages"),
                Arc::new(MemoryTarget::new()),
            )
            .await;
        match outcome {
            BootOutcome::Hidden { reason, .. } => assert_eq!(
                reason,
                HiddenReason::RouteHidden {
                    pattern: "/admin".into()
                }
            ),
            BootOutcome::Scheduled(_) => panic!("widget should be hidden on admin routes"),
        }
    }

    #[tokio::test]
    async fn reporter_is_bound_to_resolved_config() {
        let mut payload = default_payload();
        payload.id = "cfg-77".into();
        let instance = instance(payload);
        let page = PageContext::new("https://example.com/x");

        let (config, _) = instance.evaluate(&page).await;
        let event = instance.reporter_for(&config, &page).event_for(None);
        assert_eq!(event.config_id, "cfg-77");
        assert_eq!(event.session_id, instance.session().id());
    }
}
