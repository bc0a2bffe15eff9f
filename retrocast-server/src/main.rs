//! retrocast-server entry point.
//!
//! ```text
//! retrocast-server                    Run with ./retrocast-server.toml
//! retrocast-server --config <path>    Load a custom config TOML
//! retrocast-server --bind <addr>      Override network.bind
//! retrocast-server --cartridge <rom>  Override emulator.cartridge
//! retrocast-server --gen-config       Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use retrocast_server::app::App;
use retrocast_server::config::ServerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "retrocast-server", about = "Stream an emulated console to WebSocket viewers")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "retrocast-server.toml")]
    config: PathBuf,

    /// Listen address, e.g. 127.0.0.1:8080.
    #[arg(long)]
    bind: Option<String>,

    /// Cartridge image to load at startup.
    #[arg(long)]
    cartridge: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then apply CLI overrides.
    let mut config = ServerConfig::load(&cli.config);
    if let Some(bind) = cli.bind {
        config.network.bind = bind;
    }
    if let Some(cartridge) = cli.cartridge {
        config.emulator.cartridge = cartridge;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("retrocast-server v{}", env!("CARGO_PKG_VERSION"));

    // Fail fast: nothing is served until every resource is ready.
    let shutdown = CancellationToken::new();
    let app = App::start(&config, shutdown.clone())?;
    let listener = TcpListener::bind(&config.network.bind).await?;
    info!("listening on {}", listener.local_addr()?);

    // Ctrl-C handler.
    let stop = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    app.serve(listener).await?;
    Ok(())
}
