//! Wiring: build the streaming context from config and run it.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use retrocast_core::codec::{DeltaEncoder, VideoConfig, VideoEncoder};
use retrocast_core::error::StreamError;
use retrocast_core::hub::Hub;
use retrocast_core::pipeline::FramePipeline;
use retrocast_core::session::StreamChannels;
use retrocast_core::source::FrameSource;

use crate::config::ServerConfig;
use crate::emulator::{Cartridge, TestPattern};
use crate::host::StreamHost;
use crate::producer::{run_encoder, run_producer};
use crate::routes;

/// Background tasks of a running server.
pub struct App {
    pub host: Arc<StreamHost>,
    tasks: JoinSet<Result<(), StreamError>>,
}

impl App {
    /// Load resources and start the producer, encoder and hub tasks.
    ///
    /// Fails before anything is spawned if the cartridge or encoder
    /// cannot be set up.
    pub fn start(config: &ServerConfig, shutdown: CancellationToken) -> Result<Self, StreamError> {
        let cartridge = if config.emulator.cartridge.as_os_str().is_empty() {
            None
        } else {
            let cart = Cartridge::load(&config.emulator.cartridge)?;
            info!(
                path = %cart.path().display(),
                size = cart.size(),
                blake3 = %cart.fingerprint(),
                "cartridge loaded"
            );
            Some(cart)
        };

        let source = build_source(config, cartridge.as_ref());
        let geometry = source.geometry();

        let mut encoder = DeltaEncoder::new(config.encoder.compression_level);
        encoder.configure(VideoConfig {
            geometry,
            ..config.video_config()
        })?;

        let channels = Arc::new(StreamChannels::new(
            Hub::new(config.hub.ingress_capacity)?,
            Hub::new(config.hub.ingress_capacity)?,
            encoder.codec_id(),
            config.stream_settings(),
        ));
        let host = Arc::new(StreamHost::new(Arc::clone(&channels), shutdown.clone()));

        channels.screen.spawn_dispatch(shutdown.clone());
        channels.sound.spawn_dispatch(shutdown.clone());

        let (producer, consumer) = FramePipeline::new(geometry);
        let mut tasks = JoinSet::new();
        tasks.spawn(run_producer(
            source,
            producer,
            Arc::clone(&channels),
            config.fps(),
            shutdown.clone(),
        ));
        tasks.spawn(run_encoder(
            encoder,
            consumer,
            Arc::clone(&host),
            shutdown.clone(),
        ));

        info!(
            width = geometry.width,
            height = geometry.height,
            fps = config.fps(),
            "stream started"
        );
        Ok(Self { host, tasks })
    }

    /// Serve HTTP on `listener` until shutdown, then wait for the
    /// background tasks.
    pub async fn serve(mut self, listener: TcpListener) -> Result<(), StreamError> {
        let shutdown = self.host.shutdown().clone();
        let app = routes::router(Arc::clone(&self.host));

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await;
        // The listener may fail on its own; take the rest down with it.
        shutdown.cancel();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("background task failed: {e}"),
                Err(e) => error!("background task panicked: {e}"),
            }
        }
        served.map_err(StreamError::from)
    }
}

/// Frame source sized by the clamped geometry, never the raw config.
fn build_source(config: &ServerConfig, cartridge: Option<&Cartridge>) -> TestPattern {
    let geometry = config.geometry();
    TestPattern::new(
        geometry.width,
        geometry.height,
        config.fps(),
        config.emulator.sample_rate,
        cartridge,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn missing_cartridge_fails_fast() {
        let mut config = ServerConfig::default();
        config.emulator.cartridge = PathBuf::from("/nonexistent/game.gba");
        let err = App::start(&config, CancellationToken::new()).err().unwrap();
        assert!(matches!(err, StreamError::Startup(_)));
    }

    #[tokio::test]
    async fn zero_ingress_capacity_is_rejected() {
        let mut config = ServerConfig::default();
        config.hub.ingress_capacity = 0;
        let err = App::start(&config, CancellationToken::new()).err().unwrap();
        assert!(matches!(err, StreamError::InvalidCapacity));
    }

    #[test]
    fn oversized_screen_is_clamped() {
        let mut config = ServerConfig::default();
        config.emulator.width = 100_000;
        config.emulator.height = 4_000;
        let source = build_source(&config, None);
        assert_eq!(source.geometry(), config.geometry());
        assert_eq!((source.geometry().width, source.geometry().height), (1024, 1024));
        assert_eq!(source.current_framebuffer().len(), 1024 * 1024 * 2);
    }
}
