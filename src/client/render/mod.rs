//! Mounting the widget into a host container.
//!
//! All deferred work (the show delay, tooltip auto-show and auto-hide) runs
//! as detached timers guarded by one [`AbortHandle`]. A timer firing after
//! unmount, or after the host removed the container, does nothing.

mod markup;

pub use markup::{render as render_markup, ViewState};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::reporter::EngagementReporter;
use crate::infra::abort_signal::{sleep_unless_aborted, AbortHandle};
use crate::widget::{deep_link, ConfigMode, WidgetConfiguration};

/// Delay before the tooltip shows itself once.
pub const TOOLTIP_SHOW_DELAY: Duration = Duration::from_millis(500);

/// How long the auto-shown tooltip stays up.
pub const TOOLTIP_HIDE_AFTER: Duration = Duration::from_secs(5);

// ============================================================================
// Mount Target
// ============================================================================

/// The host page's container for the widget.
pub trait MountTarget: Send + Sync {
    /// Whether the container still exists in the page.
    fn is_attached(&self) -> bool;
    /// Replace the container's content with `markup`.
    fn render(&self, markup: &str);
    /// Remove the widget from the container.
    fn clear(&self);
}

/// In-memory container, for previews and tests.
#[derive(Default)]
pub struct MemoryTarget {
    inner: Mutex<MemoryTargetState>,
}

#[derive(Default)]
struct MemoryTargetState {
    detached: bool,
    markup: Option<String>,
    renders: usize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the host removing the container.
    pub fn detach(&self) {
        let mut state = self.inner.lock();
        state.detached = true;
        state.markup = None;
    }

    pub fn markup(&self) -> Option<String> {
        self.inner.lock().markup.clone()
    }

    pub fn render_count(&self) -> usize {
        self.inner.lock().renders
    }
}

impl MountTarget for MemoryTarget {
    fn is_attached(&self) -> bool {
        !self.inner.lock().detached
    }

    fn render(&self, markup: &str) {
        let mut state = self.inner.lock();
        state.markup = Some(markup.to_string());
        state.renders += 1;
    }

    fn clear(&self) {
        self.inner.lock().markup = None;
    }
}

// ============================================================================
// Widget Handle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPhase {
    /// Waiting for the show delay.
    Pending,
    Mounted,
    Unmounted,
}

/// What a click on the floating button did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonClick {
    /// Open the deep link; the click has already been reported.
    Navigate(String),
    /// The agent directory was toggled to the given open state.
    Popup { open: bool },
    /// The widget is not mounted.
    Ignored,
}

struct WidgetInner {
    config: WidgetConfiguration,
    target: Arc<dyn MountTarget>,
    reporter: EngagementReporter,
    abort: AbortHandle,
    phase: Mutex<MountPhase>,
    view: Mutex<ViewState>,
}

/// A widget scheduled for, or already in, a host container.
#[derive(Clone)]
pub struct WidgetHandle {
    inner: Arc<WidgetInner>,
}

impl WidgetHandle {
    pub fn phase(&self) -> MountPhase {
        *self.inner.phase.lock()
    }

    pub fn is_mounted(&self) -> bool {
        self.phase() == MountPhase::Mounted
    }

    pub fn view(&self) -> ViewState {
        self.inner.view.lock().clone()
    }

    pub fn config(&self) -> &WidgetConfiguration {
        &self.inner.config
    }

    pub fn hover(&self) {
        if self.tooltip_applies() {
            self.set_tooltip(true);
        }
    }

    pub fn unhover(&self) {
        if self.tooltip_applies() {
            self.set_tooltip(false);
        }
    }

    /// Single contact: report and return the deep link. Multi agent: toggle
    /// the directory.
    pub fn click_button(&self) -> ButtonClick {
        if !self.is_mounted() {
            return ButtonClick::Ignored;
        }
        match &self.inner.config.mode {
            Some(ConfigMode::Single { contact }) => {
                self.inner.reporter.report(None);
                ButtonClick::Navigate(deep_link(contact, &self.inner.config.default_message))
            }
            Some(ConfigMode::Multi { .. }) => {
                let open = {
                    let mut view = self.inner.view.lock();
                    view.popup_open = !view.popup_open;
                    view.popup_open
                };
                self.refresh();
                ButtonClick::Popup { open }
            }
            None => ButtonClick::Ignored,
        }
    }

    /// Report the click and return the agent's deep link.
    pub fn click_agent(&self, agent_id: &str) -> Option<String> {
        if !self.is_mounted() || !self.inner.view.lock().popup_open {
            return None;
        }
        let agent = self
            .inner
            .config
            .agents()
            .iter()
            .find(|a| a.id == agent_id)?;
        self.inner.reporter.report(Some(&agent.id));
        Some(deep_link(&agent.phone_number, &self.inner.config.default_message))
    }

    /// A click anywhere outside the directory closes it.
    pub fn click_outside(&self) {
        let changed = {
            let mut view = self.inner.view.lock();
            std::mem::replace(&mut view.popup_open, false)
        };
        if changed {
            self.refresh();
        }
    }

    /// The host failed to load an agent's avatar; show the placeholder.
    pub fn avatar_failed(&self, agent_id: &str) {
        let inserted = self
            .inner
            .view
            .lock()
            .failed_avatars
            .insert(agent_id.to_string());
        if inserted {
            self.refresh();
        }
    }

    /// Cancel pending timers and remove the widget. Idempotent.
    pub fn unmount(&self) {
        self.inner.abort.abort();
        let was = std::mem::replace(&mut *self.inner.phase.lock(), MountPhase::Unmounted);
        if was == MountPhase::Mounted && self.inner.target.is_attached() {
            self.inner.target.clear();
        }
    }

    fn tooltip_applies(&self) -> bool {
        self.inner.config.tooltip.enabled
            && matches!(self.inner.config.mode, Some(ConfigMode::Single { .. }))
            && self.is_mounted()
    }

    fn set_tooltip(&self, visible: bool) {
        let changed = {
            let mut view = self.inner.view.lock();
            std::mem::replace(&mut view.tooltip_visible, visible) != visible
        };
        if changed {
            self.refresh();
        }
    }

    /// Re-render into the target, or unmount if the host dropped it.
    fn refresh(&self) {
        if !self.is_mounted() {
            return;
        }
        if !self.inner.target.is_attached() {
            debug!("widget container gone, unmounting");
            self.unmount();
            return;
        }
        let view = self.view();
        if let Some(html) = markup::render(&self.inner.config, &view) {
            self.inner.target.render(&html);
        }
    }

    fn try_mount(&self) -> bool {
        {
            let mut phase = self.inner.phase.lock();
            if *phase != MountPhase::Pending || self.inner.abort.is_aborted() {
                return false;
            }
            if !self.inner.target.is_attached() {
                debug!("widget container gone before mount");
                *phase = MountPhase::Unmounted;
                return false;
            }
            *phase = MountPhase::Mounted;
        }
        self.refresh();
        true
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Mounts an admitted configuration after its show delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct WidgetRenderer;

impl WidgetRenderer {
    /// Schedule the mount. Returns `None` when the configuration has no
    /// render mode. Must be called inside a Tokio runtime.
    pub fn mount(
        config: WidgetConfiguration,
        target: Arc<dyn MountTarget>,
        reporter: EngagementReporter,
    ) -> Option<WidgetHandle> {
        config.mode.as_ref()?;

        let handle = WidgetHandle {
            inner: Arc::new(WidgetInner {
                config,
                target,
                reporter,
                abort: AbortHandle::new(),
                phase: Mutex::new(MountPhase::Pending),
                view: Mutex::new(ViewState::default()),
            }),
        };

        let task = handle.clone();
        tokio::spawn(async move {
            let abort = task.inner.abort.clone();
            if !sleep_unless_aborted(task.inner.config.show_delay, &abort).await {
                return;
            }
            if !task.try_mount() {
                return;
            }
            if task.tooltip_applies() {
                run_tooltip_timers(task, abort).await;
            }
        });

        Some(handle)
    }
}

/// Show the tooltip once, then hide it again.
async fn run_tooltip_timers(handle: WidgetHandle, abort: AbortHandle) {
    if !sleep_unless_aborted(TOOLTIP_SHOW_DELAY, &abort).await {
        return;
    }
    if handle.tooltip_applies() {
        handle.set_tooltip(true);
    }
    if !sleep_unless_aborted(TOOLTIP_HIDE_AFTER, &abort).await {
        return;
    }
    if handle.tooltip_applies() {
        handle.set_tooltip(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::page::PageContext;
    use crate::client::reporter::{BeaconTransport, SessionIdentity};
    use crate::client::storage::MemoryStorage;
    use crate::widget::defaults::default_payload;
    use crate::widget::{AgentPayload, ConfigPayload};

    #[derive(Default)]
    struct CountingBeacon {
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    impl BeaconTransport for CountingBeacon {
        fn send_beacon(&self, _url: &str, body: Vec<u8>) -> bool {
            self.bodies.lock().push(serde_json::from_slice(&body).unwrap());
            true
        }
    }

    fn reporter(beacon: Arc<CountingBeacon>) -> EngagementReporter {
        EngagementReporter::new(
            "http://origin/whatsapp/track",
            "cfg-1",
            PageContext::new("https://example.com/"),
            Arc::new(SessionIdentity::new(Arc::new(MemoryStorage::new()))),
        )
        .with_beacon(beacon)
    }

    fn config(edit: impl FnOnce(&mut ConfigPayload)) -> WidgetConfiguration {
        let mut payload = default_payload();
        edit(&mut payload);
        WidgetConfiguration::from(&payload)
    }

    fn multi(edit: impl FnOnce(&mut ConfigPayload)) -> WidgetConfiguration {
        config(|p| {
            p.agents = vec![
                AgentPayload {
                    id: "a1".into(),
                    display_name: "Ana".into(),
                    title: None,
                    phone_number: "351912345678".into(),
                    avatar_url: Some("https://cdn.example/ana.png".into()),
                    is_always_online: true,
                },
                AgentPayload {
                    id: "a2".into(),
                    display_name: "Bruno".into(),
                    title: None,
                    phone_number: "351934000111".into(),
                    avatar_url: None,
                    is_always_online: false,
                },
            ];
            edit(p);
        })
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn mounts_only_after_show_delay() {
        let target = Arc::new(MemoryTarget::new());
        let handle = WidgetRenderer::mount(
            config(|p| p.show_delay_ms = 2000),
            target.clone(),
            reporter(Arc::default()),
        )
        .unwrap();

        advance(1999).await;
        assert_eq!(handle.phase(), MountPhase::Pending);
        assert!(target.markup().is_none());

        advance(2).await;
        assert!(handle.is_mounted());
        assert!(target.markup().unwrap().contains("wa-button"));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_target_turns_mount_into_noop() {
        let target = Arc::new(MemoryTarget::new());
        let handle = WidgetRenderer::mount(
            config(|p| p.show_delay_ms = 1000),
            target.clone(),
            reporter(Arc::default()),
        )
        .unwrap();

        target.detach();
        advance(1500).await;
        assert_eq!(handle.phase(), MountPhase::Unmounted);
        assert_eq!(target.render_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_before_delay_cancels_everything() {
        let target = Arc::new(MemoryTarget::new());
        let handle = WidgetRenderer::mount(config(|_| {}), target.clone(), reporter(Arc::default())).unwrap();

        handle.unmount();
        advance(10_000).await;
        assert_eq!(handle.phase(), MountPhase::Unmounted);
        assert_eq!(target.render_count(), 0);
        handle.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn tooltip_auto_shows_then_hides() {
        let target = Arc::new(MemoryTarget::new());
        let handle = WidgetRenderer::mount(
            config(|p| p.show_delay_ms = 0),
            target.clone(),
            reporter(Arc::default()),
        )
        .unwrap();

        advance(10).await;
        assert!(!handle.view().tooltip_visible);
        advance(500).await;
        assert!(handle.view().tooltip_visible);
        assert!(target.markup().unwrap().contains("wa-tooltip"));
        advance(5000).await;
        assert!(!handle.view().tooltip_visible);
        assert!(!target.markup().unwrap().contains("wa-tooltip"));
    }

    #[tokio::test(start_paused = true)]
    async fn tooltip_follows_hover() {
        let handle = WidgetRenderer::mount(
            config(|p| p.show_delay_ms = 0),
            Arc::new(MemoryTarget::new()),
            reporter(Arc::default()),
        )
        .unwrap();

        // Hover before mount does nothing.
        handle.hover();
        assert!(!handle.view().tooltip_visible);

        advance(10).await;
        handle.hover();
        assert!(handle.view().tooltip_visible);
        handle.unhover();
        assert!(!handle.view().tooltip_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_tooltip_never_shows() {
        let handle = WidgetRenderer::mount(
            config(|p| {
                p.show_delay_ms = 0;
                p.show_tooltip = false;
            }),
            Arc::new(MemoryTarget::new()),
            reporter(Arc::default()),
        )
        .unwrap();

        advance(1000).await;
        handle.hover();
        assert!(!handle.view().tooltip_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn tooltip_timers_after_unmount_are_noops() {
        let target = Arc::new(MemoryTarget::new());
        let handle = WidgetRenderer::mount(
            config(|p| p.show_delay_ms = 0),
            target.clone(),
            reporter(Arc::default()),
        )
        .unwrap();

        advance(10).await;
        handle.unmount();
        let renders = target.render_count();
        advance(10_000).await;
        assert_eq!(target.render_count(), renders);
        assert!(target.markup().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn single_click_reports_and_navigates() {
        let beacon = Arc::new(CountingBeacon::default());
        let handle = WidgetRenderer::mount(
            config(|p| p.show_delay_ms = 0),
            Arc::new(MemoryTarget::new()),
            reporter(beacon.clone()),
        )
        .unwrap();

        assert_eq!(handle.click_button(), ButtonClick::Ignored);
        advance(1).await;

        match handle.click_button() {
            ButtonClick::Navigate(link) => assert!(link.starts_with("https://wa.me/15555550100")),
            other => panic!("unexpected {other:?}"),
        }
        let bodies = beacon.bodies.lock();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0]["agentId"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn multi_agent_popup_toggles_and_reports_agent() {
        let beacon = Arc::new(CountingBeacon::default());
        let target = Arc::new(MemoryTarget::new());
        let handle = WidgetRenderer::mount(
            multi(|p| p.show_delay_ms = 0),
            target.clone(),
            reporter(beacon.clone()),
        )
        .unwrap();
        advance(1).await;

        // Agent links are unreachable while the directory is closed.
        assert!(handle.click_agent("a1").is_none());

        assert_eq!(handle.click_button(), ButtonClick::Popup { open: true });
        assert!(target.markup().unwrap().contains("wa-popup"));

        assert_eq!(
            handle.click_agent("a2").as_deref(),
            Some("https://wa.me/351934000111?text=Hello%21%20I%20would%20like%20more%20information.")
        );
        assert!(handle.click_agent("missing").is_none());
        assert_eq!(beacon.bodies.lock()[0]["agentId"], "a2");

        assert_eq!(handle.click_button(), ButtonClick::Popup { open: false });
        assert!(!target.markup().unwrap().contains("wa-popup"));

        handle.click_button();
        handle.click_outside();
        assert!(!handle.view().popup_open);
    }

    #[tokio::test(start_paused = true)]
    async fn multi_mode_has_no_tooltip() {
        let handle = WidgetRenderer::mount(
            multi(|p| p.show_delay_ms = 0),
            Arc::new(MemoryTarget::new()),
            reporter(Arc::default()),
        )
        .unwrap();

        advance(1000).await;
        handle.hover();
        assert!(!handle.view().tooltip_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_avatar_switches_to_placeholder() {
        let target = Arc::new(MemoryTarget::new());
        let handle = WidgetRenderer::mount(
            multi(|p| p.show_delay_ms = 0),
            target.clone(),
            reporter(Arc::default()),
        )
        .unwrap();
        advance(1).await;
        handle.click_button();
        assert!(target.markup().unwrap().contains("ana.png"));

        handle.avatar_failed("a1");
        assert!(!target.markup().unwrap().contains("ana.png"));
        assert!(handle.view().failed_avatars.contains("a1"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_agent_list_without_contact_mounts_nothing() {
        let target: Arc<dyn MountTarget> = Arc::new(MemoryTarget::new());
        let cfg = config(|p| {
            p.agents = vec![];
            p.phone_number = String::new();
        });
        assert!(WidgetRenderer::mount(cfg, target, reporter(Arc::default())).is_none());
    }
}
