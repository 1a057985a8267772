use anyhow::Context;
use clap::Parser;
use chatwidget::cli::{Cli, Commands, ConfigAction, StoreAction};
use chatwidget::client::{render_markup, PageContext, ViewState, Visibility, VisibilityPolicy, WidgetInstance};
use chatwidget::config::{validate_config_object, Config};
use chatwidget::logging;
use chatwidget::origin::{ConfigStore, OriginServer, SqliteStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(opts) => {
            let config = load(opts.config.as_deref())?;
            validate_config_object(&config)?;
            info!("Starting chatwidget origin server");
            let server = OriginServer::start(config, opts).await?;
            server.run_until_shutdown().await?;
        }
        Commands::Config(opts) => {
            let config = load(opts.config.as_deref())?;
            match opts.action {
                ConfigAction::Show => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Validate => {
                    validate_config_object(&config)?;
                    println!("Configuration is valid");
                }
                ConfigAction::Init => {
                    let path = opts.config.as_deref().unwrap_or("chatwidget.json");
                    Config::write_default(path)?;
                    println!("Configuration file created: {path}");
                }
            }
        }
        Commands::Store(opts) => {
            let config = load(opts.config.as_deref())?;
            let store = open_store(&config)?;
            match opts.action {
                StoreAction::Seed => {
                    if store.seed_default().await? {
                        println!("Default widget configuration provisioned");
                    } else {
                        println!("Widget configuration already present");
                    }
                }
                StoreAction::Import { file } => {
                    let record = store.import(&file).await?;
                    println!(
                        "Imported configuration '{}' with {} agents",
                        record.config.id,
                        record.agents.len()
                    );
                }
                StoreAction::Show => match store.current().await? {
                    Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                    None => println!("No widget configuration stored; run `chatwidget store seed`"),
                },
            }
        }
        Commands::Stats(opts) => {
            let config = load(opts.config.as_deref())?;
            let store = open_store(&config)?;
            let stats = store.recent_stats(opts.days).await?;
            println!("Clicks in the last {} days: {}", opts.days, stats.total);
            println!("By agent:");
            for (agent, count) in &stats.by_agent {
                println!("  {:<24} {}", agent.as_deref().unwrap_or("(single contact)"), count);
            }
            println!("By device:");
            for (device, count) in &stats.by_device {
                let device = if device.is_empty() { "(unknown)" } else { device.as_str() };
                println!("  {:<24} {}", device, count);
            }
        }
        Commands::Preview(opts) => {
            let config = load(opts.config.as_deref())?;
            let instance = WidgetInstance::from_config(&config.client);
            let mut page = PageContext::new(opts.url);
            if let Some(ua) = opts.user_agent {
                page = page.with_user_agent(ua);
            }

            let resolution = instance.resolver().resolve_detailed().await;
            println!("Config: {} (from {:?})", resolution.config.id, resolution.source);
            if let Some(failure) = &resolution.failure {
                println!("Note: {failure}");
            }
            println!("Route: {}  Device: {}", page.route(), page.device_class());

            match VisibilityPolicy::evaluate(&resolution.config, &page.route(), page.device_class()) {
                Visibility::Visible => {
                    println!("Decision: visible after {:?}", resolution.config.show_delay);
                    if let Some(html) = render_markup(&resolution.config, &ViewState::default()) {
                        println!("{html}");
                    }
                }
                Visibility::Hidden(reason) => println!("Decision: hidden ({reason:?})"),
            }
        }
        Commands::Version => {
            println!("chatwidget {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn load(path: Option<&str>) -> anyhow::Result<Config> {
    let config = Config::load(path)?;
    logging::init(&config.logging);
    Ok(config)
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.db_path();
    SqliteStore::open(&path).with_context(|| format!("Failed to open store at {}", path.display()))
}
