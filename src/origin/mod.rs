//! The origin: serves the widget configuration and ingests click events.

pub mod routes;
mod schema;
pub mod server;
pub mod store;

pub use routes::build_routes;
pub use server::{OriginServer, OriginState};
pub use store::{ClickRecord, ClickStats, ConfigRecord, ConfigStore, SqliteStore, StoreError, TrackingSink};
