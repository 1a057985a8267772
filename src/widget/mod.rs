//! Widget domain model shared by the client pipeline and the origin.

pub mod defaults;
mod link;
mod route;
mod types;

pub use link::deep_link;
pub use route::RoutePattern;
pub use types::*;
