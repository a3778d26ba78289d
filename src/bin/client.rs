//! Audio Client Application
//!
//! Plays a short tune through the shared server, starting one if needed.
//! `prok-client [--stop] [port]`; Ctrl+C ends the session cleanly, `--stop`
//! shuts the server down instead of playing.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prok::{
    client::{stop_server, ClientSession, ProcessLauncher},
    config::AppConfig,
    framer::{reference_tune, render},
};

/// Beeps before the closing tone
const BEEPS: u32 = 5;

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
    let mut client_config = config.client;

    let mut stop = false;
    for arg in std::env::args().skip(1) {
        if arg == "--stop" {
            stop = true;
        } else {
            client_config.port = arg
                .parse()
                .with_context(|| format!("Invalid port: {}", arg))?;
        }
    }

    if stop {
        stop_server(client_config.port, client_config.io_timeout())
            .await
            .with_context(|| format!("No audio server on port {}", client_config.port))?;
        return Ok(());
    }

    let launcher = ProcessLauncher::with_program(client_config.server_program.clone());
    let session = ClientSession::connect(&client_config, &launcher)
        .await
        .with_context(|| format!("No audio server on port {}", client_config.port))?;

    let info = session.info();
    let tune = reference_tune(&session.context(), BEEPS);
    let tune_bytes = tune.len().saturating_mul(info.frame_bytes() as i64);

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, finishing session");
                cancelled.store(true, Ordering::SeqCst);
            }
        });
    }

    // The server's position counts from its own start; the tune counts from
    // the first request of this session
    let mut origin = None;
    session
        .stream(|position, len| {
            if cancelled.load(Ordering::SeqCst) {
                return None;
            }
            let origin = *origin.get_or_insert(position);
            let offset = position.wrapping_sub(origin) as i64;
            if offset >= tune_bytes {
                return None;
            }
            let len = (len.max(0) as i64).min(tune_bytes - offset) as usize;
            Some(render(&info, offset, len, std::slice::from_ref(&tune)))
        })
        .await?;

    tracing::info!("Done");
    Ok(())
}
