//! Client side: finding or starting a server, then streaming to it
//!
//! A client never assumes a server is running. [`ensure_server_reachable`]
//! pings the control port and, when nothing answers, launches a server and
//! polls until it does. Two clients cold-starting at once may both launch;
//! the later server fails to bind and exits, and both clients end up talking
//! to the winner.

pub mod launcher;
pub mod session;

pub use launcher::{ProcessLauncher, ServerLauncher, SERVER_PROGRAM};
pub use session::ClientSession;

use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{Error, Result, WireError};
use crate::protocol::{Command, Communicator};

/// Check that a server answers PING on `port`
pub async fn ping(port: u16, io_timeout: Duration) -> Result<()> {
    let mut c = Communicator::connect(port, io_timeout).await?;
    c.write_command(Command::Ping).await?;
    match c.read_int().await? {
        1 => Ok(()),
        other => Err(WireError::UnexpectedReply(other).into()),
    }
}

/// Ask the server on `port` to shut down. Returns once the command is sent.
pub async fn stop_server(port: u16, io_timeout: Duration) -> Result<()> {
    let mut c = Communicator::connect(port, io_timeout).await?;
    c.write_command(Command::Stop).await?;
    tracing::info!("Sent STOP to server on port {}", port);
    Ok(())
}

/// Make sure a server answers on the configured port, launching one if
/// nothing is listening.
///
/// Fails with [`Error::ServerUnreachable`] when no server answers within
/// `spawn_attempts` polls. A launch that fails outright still polls, since
/// another client may be starting a server on the same port.
pub async fn ensure_server_reachable(
    config: &ClientConfig,
    launcher: &dyn ServerLauncher,
) -> Result<()> {
    config.validate()?;
    let port = config.port;
    let io_timeout = config.io_timeout();

    match ping(port, io_timeout).await {
        Ok(()) => return Ok(()),
        Err(Error::Wire(WireError::Connect(e))) => {
            tracing::info!("No server on port {} ({}), starting one", port, e);
        }
        Err(e) => return Err(e),
    }

    if let Err(e) = launcher.launch(port) {
        tracing::warn!("Failed to launch a server on port {}: {}", port, e);
    }

    for attempt in 1..=config.spawn_attempts {
        tokio::time::sleep(config.spawn_interval()).await;
        match ping(port, io_timeout).await {
            Ok(()) => {
                tracing::debug!("Server on port {} answered after {} polls", port, attempt);
                return Ok(());
            }
            Err(e) => tracing::trace!("Poll {} on port {}: {}", attempt, port, e),
        }
    }

    Err(Error::ServerUnreachable {
        port,
        attempts: config.spawn_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts launches without starting anything
    #[derive(Default)]
    struct NoopLauncher {
        launches: AtomicUsize,
    }

    impl ServerLauncher for NoopLauncher {
        fn launch(&self, _port: u16) -> Result<()> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn unused_port() -> u16 {
        let probe = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_unreachable_after_budget() {
        let config = ClientConfig {
            spawn_attempts: 3,
            spawn_interval_ms: 1,
            ..ClientConfig::with_port(unused_port())
        };
        let launcher = NoopLauncher::default();

        let result = ensure_server_reachable(&config, &launcher).await;
        assert!(matches!(
            result,
            Err(Error::ServerUnreachable { attempts: 3, .. })
        ));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    struct BrokenLauncher;

    impl ServerLauncher for BrokenLauncher {
        fn launch(&self, _port: u16) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such program").into())
        }
    }

    #[tokio::test]
    async fn test_launch_failure_is_unreachable() {
        let config = ClientConfig {
            spawn_attempts: 2,
            spawn_interval_ms: 1,
            ..ClientConfig::with_port(unused_port())
        };

        let result = ensure_server_reachable(&config, &BrokenLauncher).await;
        assert!(matches!(
            result,
            Err(Error::ServerUnreachable { attempts: 2, .. })
        ));
    }

    /// Fails to start its own server while a competing one comes up
    struct LosingLauncher;

    impl ServerLauncher for LosingLauncher {
        fn launch(&self, port: u16) -> Result<()> {
            let listener = crate::server::bind_loopback(port)?;
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let mut c = Communicator::new(stream, Duration::from_millis(500));
                    if let Ok(Command::Ping) = c.read_command().await {
                        let _ = c.write_int(1).await;
                    }
                }
            });
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such program").into())
        }
    }

    #[tokio::test]
    async fn test_launch_failure_still_polls() {
        let config = ClientConfig {
            spawn_attempts: 10,
            spawn_interval_ms: 5,
            ..ClientConfig::with_port(unused_port())
        };
        ensure_server_reachable(&config, &LosingLauncher).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_server_sends_stop() {
        let listener = crate::server::bind_loopback(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut c = Communicator::new(stream, Duration::from_millis(500));
            c.read_command().await.unwrap()
        });

        stop_server(port, Duration::from_millis(500)).await.unwrap();
        assert_eq!(received.await.unwrap(), Command::Stop);
    }

    #[tokio::test]
    async fn test_ping_refused() {
        let result = ping(unused_port(), Duration::from_millis(200)).await;
        assert!(matches!(result, Err(Error::Wire(WireError::Connect(_)))));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = ClientConfig {
            spawn_attempts: 0,
            ..ClientConfig::default()
        };
        let launcher = NoopLauncher::default();
        assert!(matches!(
            ensure_server_reachable(&config, &launcher).await,
            Err(Error::Config(_))
        ));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }
}
