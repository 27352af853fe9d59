use anyhow::Result;
use nearby_session::cli::{Args, Commands, ConfigDiscovery, ReplayScript, replay_until};
use nearby_session::{LoggingEventSink, ServiceConfig, SessionEventHandler};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose {
        "nearby_session=debug"
    } else {
        "nearby_session=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Replay {
            script,
            config,
            root,
        } => run_replay(script, config, root).await,
        Commands::ShowConfig { config } => {
            ConfigDiscovery::show_discovery_info();
            let config = ConfigDiscovery::load(config.as_deref())?;
            println!();
            println!("Effective configuration:");
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
    }
}

async fn run_replay(
    script_path: PathBuf,
    config_override: Option<PathBuf>,
    root_override: Option<PathBuf>,
) -> Result<()> {
    let mut config: ServiceConfig = ConfigDiscovery::load(config_override.as_deref())?;
    if let Some(root) = root_override {
        config.storage.storage_root = root;
    }
    info!("Using storage root {:?}", config.storage.storage_root);

    let script = ReplayScript::from_file(&script_path)?;
    let mut handler = SessionEventHandler::new(&config);
    handler.add_event_sink(Box::new(LoggingEventSink));

    let removed = handler.prepare_storage().await?;
    if removed > 0 {
        warn!("Removed {} partial files left by an earlier run", removed);
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let events = replay_until(&handler, script, ctrl_c).await?;

    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }

    if handler.is_shut_down() {
        anyhow::bail!("Replay interrupted");
    }
    Ok(())
}
