pub mod cli;
pub mod client;
pub mod config;
pub mod infra;
pub mod logging;
pub mod origin;
pub mod widget;
