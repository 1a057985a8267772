use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatwidget", version, about = "Embeddable chat widget origin and client toolkit")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the origin serving config and ingesting clicks.
    Serve(ServeOpts),
    Config(ConfigOpts),
    /// Manage the stored widget configuration.
    Store(StoreOpts),
    /// Click counts by agent and device class.
    Stats(StatsOpts),
    /// Resolve the widget for a page and print the decision and markup.
    Preview(PreviewOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ServeOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(short, long)]
    pub port: Option<u16>,
    #[arg(short, long)]
    pub bind: Option<String>,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}

#[derive(clap::Args)]
pub struct StoreOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: StoreAction,
}

#[derive(Subcommand)]
pub enum StoreAction {
    /// Provision the default configuration if none exists.
    Seed,
    /// Replace the configuration and agents from a JSON file.
    Import { file: PathBuf },
    /// Print the payload served on the config endpoint.
    Show,
}

#[derive(clap::Args)]
pub struct StatsOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(short, long, default_value_t = 7)]
    pub days: u32,
}

#[derive(clap::Args)]
pub struct PreviewOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(long)]
    pub url: String,
    #[arg(long, env = "CHATWIDGET_USER_AGENT")]
    pub user_agent: Option<String>,
}
