//! The embeddable widget's client pipeline: resolve configuration, decide
//! visibility, mount, report clicks.

pub mod cache;
mod instance;
pub mod page;
pub mod render;
pub mod reporter;
pub mod resolver;
pub mod storage;
pub mod visibility;

pub use cache::{LocalConfigCache, CACHE_KEY, DEFAULT_CACHE_TTL};
pub use instance::{BootOutcome, WidgetInstance};
pub use page::PageContext;
pub use render::{render_markup, ButtonClick, MemoryTarget, MountPhase, MountTarget, ViewState, WidgetHandle, WidgetRenderer};
pub use reporter::{BeaconQueue, BeaconTransport, EngagementReporter, SessionIdentity};
pub use resolver::{ConfigResolver, ConfigSource, HttpConfigSource, Resolution, ResolutionSource, ResolveError};
pub use visibility::{HiddenReason, Visibility, VisibilityPolicy};
