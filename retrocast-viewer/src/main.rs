//! retrocast-viewer entry point.
//!
//! ```text
//! retrocast-viewer                       Connect with defaults
//! retrocast-viewer --url <ws-url>        Override network.url
//! retrocast-viewer --snapshot <out.ppm>  Save the last frame on exit
//! retrocast-viewer --config <path>       Use custom config TOML
//! retrocast-viewer --gen-config          Dump default config and exit
//! ```
//!
//! Key events are read from stdin, one per line: `start down`, `A up`.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use retrocast_core::client::{ReconnectingClient, WsConnector};

use retrocast_viewer::config::ViewerConfig;
use retrocast_viewer::decoder::ViewerSink;
use retrocast_viewer::display::write_ppm;
use retrocast_viewer::input::parse_line;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "retrocast-viewer", about = "Headless retrocast stream viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "retrocast-viewer.toml")]
    config: PathBuf,

    /// Server endpoint (overrides config). Example: ws://10.0.0.5:8080/stream
    #[arg(short, long)]
    url: Option<String>,

    /// Write the last decoded frame to this PPM file on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(url) = cli.url {
        config.network.url = url;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("retrocast-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("server: {}", config.network.url);

    // ── 1. Client ───────────────────────────────────────────────

    let geometry = config.geometry();
    let (sink, decoded) = ViewerSink::new(geometry);
    let (client, mut handle) = ReconnectingClient::new(
        WsConnector::new(config.network.url.clone()),
        sink,
        config.client_options(),
    )?;

    let cancel = CancellationToken::new();
    let client_task = tokio::spawn(client.run(cancel.clone()));

    // ── 2. Stdin → key events ───────────────────────────────────

    let input = handle.input.clone();
    let stdin_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = stdin_cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => match parse_line(&line) {
                    Ok(Some(event)) => {
                        if input.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{e}"),
                },
                // EOF: keep streaming, just stop reading.
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin error: {e}");
                    break;
                }
            }
        }
    });

    // Ctrl-C handler.
    let stop = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    // ── 3. Stats loop ───────────────────────────────────────────

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = handle.stats.changed() => {
                if changed.is_err() {
                    break;
                }
                let stats = handle.stats.borrow_and_update().clone();
                let totals = decoded.borrow().clone();
                info!(
                    status = %stats.status,
                    fps = format_args!("{:.1}", stats.fps),
                    rtt_ms = ?stats.rtt_ms,
                    worst_gap = ?stats.worst_frame_gap,
                    frames = totals.frames,
                    samples = totals.samples,
                    "stats"
                );
            }
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    client_task.await?;
    if let Some(path) = cli.snapshot {
        match decoded.borrow().frame.clone() {
            Some(frame) => {
                write_ppm(&path, geometry, &frame)?;
                info!("snapshot written to {}", path.display());
            }
            None => warn!("no frame decoded; snapshot skipped"),
        }
    }
    Ok(())
}
