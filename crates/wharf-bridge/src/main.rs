use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wharf_bridge::server::BridgeServer;
use wharf_engine::config::{BridgeSettings, SettingsLoader};
use wharf_engine::dispatcher::Dispatcher;
use wharf_engine::effects::BroadcastSink;
use wharf_engine::store::FileStore;

/// Pending effects per surface before slow readers start missing them.
const EFFECT_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "wharf-bridge", version, about = "Talent Wharf capture bridge")]
struct Args {
    /// WebSocket port (overrides the settings file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Settings file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// State document holding config and capture history
    #[arg(long)]
    state: Option<PathBuf>,
}

async fn load_settings(args: &Args) -> anyhow::Result<BridgeSettings> {
    let settings = match &args.config {
        Some(path) => SettingsLoader::load_from(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => SettingsLoader::load_default().await?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args).await?;

    // Logs go to stderr; RUST_LOG wins over the settings file.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| settings.resolve_state_path());
    let store = FileStore::new(state_path);
    let fresh = store.is_fresh();
    info!("State document: {}", store.path().display());

    let effects = BroadcastSink::new(EFFECT_CAPACITY);
    let dispatcher = Dispatcher::builder(Arc::new(store))
        .effects(Arc::new(effects.clone()))
        .default_api_url(settings.default_api_url.clone())
        .build();

    let refresh = dispatcher
        .stats()
        .spawn_refresh(Duration::from_secs(settings.badge_refresh_secs.max(1)));

    let port = args.port.unwrap_or(settings.port);
    let mut server = BridgeServer::new(port, dispatcher, effects)
        .with_allowed_origins(settings.allowed_origins.clone());
    if fresh {
        info!("No saved state found; treating this start as a first install");
        server = server.with_install_notice();
    }
    let handle = server
        .start()
        .await
        .with_context(|| format!("binding port {}", port))?;
    info!(
        "Connect surfaces to ws://localhost:{} (Ctrl-C to stop)",
        handle.port()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown();
    refresh.abort();
    Ok(())
}
