//! Audio Server Application
//!
//! Owns the audio output device and plays whatever the active client
//! streams. Usually started by a client; `prok-server [port]`.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prok::{
    audio::{list_output_devices, AudioSink, CpalSink, MemorySink},
    config::{AppConfig, OutputKind},
    server::{Server, ServerExit},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load_default()?;
    let mut server_config = config.server;

    if let Some(arg) = std::env::args().nth(1) {
        server_config.port = arg
            .parse()
            .with_context(|| format!("Invalid port: {}", arg))?;
    }

    let sink: Box<dyn AudioSink> = match server_config.output {
        OutputKind::Default => {
            tracing::debug!("Output devices: {:?}", list_output_devices());
            Box::new(CpalSink::with_device(server_config.device.clone()))
        }
        OutputKind::Null => {
            tracing::info!("Discarding audio into memory");
            Box::new(MemorySink::new())
        }
    };

    let port = server_config.port;
    match Server::new(server_config, sink).run().await {
        Ok(ServerExit::Stopped) => {
            tracing::info!("Server on port {} stopped", port);
            // Control and data tasks may still hold sockets; leave now
            std::process::exit(0);
        }
        Err(e) => Err(e).with_context(|| format!("Server on port {} failed", port)),
    }
}
