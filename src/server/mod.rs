//! Audio server owning the output device
//!
//! Two sequential loops run side by side. The control loop answers one
//! command per connection on port `P`; the data loop serves one streaming
//! session at a time on port `P + 1`. They share only [`SessionState`].

mod control;
mod data;

pub use data::SessionEnd;

use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::audio::AudioSink;
use crate::config::ServerConfig;
use crate::error::{Error, NetworkError, Result};
use crate::protocol::{Command, Communicator, ServerInfo};

/// Pending connections kept by each listener
const LISTEN_BACKLOG: i32 = 16;

/// Bind attempts after asking a previous server to stop
const REBIND_ATTEMPTS: u32 = 20;
const REBIND_INTERVAL: Duration = Duration::from_millis(50);

/// State shared between the control loop and the data loop
#[derive(Debug, Default)]
pub struct SessionState {
    /// Bytes written to the device since server start
    position: AtomicI32,
    /// Set by CONNECT, cleared when a data session starts
    interrupt: AtomicBool,
    sessions_started: AtomicU64,
    sessions_ended: AtomicU64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative write position
    pub fn position(&self) -> i32 {
        self.position.load(Ordering::SeqCst)
    }

    pub fn advance(&self, bytes: i32) {
        self.position.fetch_add(bytes, Ordering::SeqCst);
    }

    /// Ask the active session to end at its next tick
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    fn begin_session(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
    }

    fn end_session(&self) {
        self.sessions_ended.fetch_add(1, Ordering::SeqCst);
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::SeqCst)
    }

    /// Sessions that left their loop, however they ended
    pub fn sessions_ended(&self) -> u64 {
        self.sessions_ended.load(Ordering::SeqCst)
    }
}

/// Why [`Server::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    /// A client sent STOP
    Stopped,
}

/// Server owning one audio sink
pub struct Server<S: AudioSink> {
    config: ServerConfig,
    sink: S,
    state: Arc<SessionState>,
}

impl<S: AudioSink> Server<S> {
    pub fn new(config: ServerConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            state: Arc::new(SessionState::new()),
        }
    }

    /// Handle on the shared session state
    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    pub fn info(&self) -> ServerInfo {
        self.config.info()
    }

    /// Bind both ports, open the device and serve until STOP.
    ///
    /// Fails without touching the device when a port is taken, and fails
    /// entirely when the device cannot be opened.
    pub async fn run(mut self) -> Result<ServerExit> {
        self.config.validate()?;
        let info = self.config.info();
        let port = self.config.port;
        let data_port = self.config.data_port()?;
        let io_timeout = self.config.io_timeout();

        let (control_listener, data_listener) = if self.config.replace_existing {
            stop_existing(port, io_timeout).await;
            bind_pair_with_retry(port, data_port).await?
        } else {
            (bind_loopback(port)?, bind_loopback(data_port)?)
        };

        self.sink.open(&info)?;
        self.sink.start()?;
        tracing::info!("Start on port {}, {}", port, info);

        let (stop_tx, stop_rx) = oneshot::channel();
        let control_task = tokio::spawn(control::serve(
            control_listener,
            info,
            self.state.clone(),
            io_timeout,
            stop_tx,
        ));

        let exit = tokio::select! {
            result = data::serve(
                data_listener,
                &mut self.sink,
                &self.state,
                info,
                io_timeout,
                self.config.poll_interval(),
            ) => match result {
                Err(e) => Err(e),
                Ok(never) => match never {},
            },
            _ = stop_rx => Ok(ServerExit::Stopped),
        };

        control_task.abort();
        self.sink.stop();
        self.sink.close();

        if let Err(e) = &exit {
            tracing::error!("Server failed: {}", e);
        }
        exit
    }
}

/// Listener on a loopback port
pub(crate) fn bind_loopback(port: u16) -> Result<TcpListener> {
    let bind_failed = |e: std::io::Error| -> Error {
        NetworkError::BindFailed {
            port,
            reason: e.to_string(),
        }
        .into()
    };

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let socket =
        Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(bind_failed)?;

    // Lets a replacement server bind while old connections sit in TIME_WAIT
    #[cfg(unix)]
    socket.set_reuse_address(true).map_err(bind_failed)?;

    socket.set_nonblocking(true).map_err(bind_failed)?;
    socket.bind(&addr.into()).map_err(bind_failed)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_failed)?;

    TcpListener::from_std(socket.into()).map_err(bind_failed)
}

async fn bind_pair_with_retry(port: u16, data_port: u16) -> Result<(TcpListener, TcpListener)> {
    let mut attempt = 1;
    loop {
        let bound = bind_loopback(port).and_then(|c| Ok((c, bind_loopback(data_port)?)));
        match bound {
            Ok(pair) => return Ok(pair),
            Err(e) if attempt >= REBIND_ATTEMPTS => return Err(e),
            Err(e) => {
                tracing::debug!("Bind attempt {} failed: {}", attempt, e);
                attempt += 1;
                tokio::time::sleep(REBIND_INTERVAL).await;
            }
        }
    }
}

/// Ask whatever owns `port` to shut down
async fn stop_existing(port: u16, io_timeout: Duration) {
    match Communicator::connect(port, io_timeout).await {
        Ok(mut c) => {
            tracing::info!("Replacing server on port {}", port);
            if let Err(e) = c.write_command(Command::Stop).await {
                tracing::warn!("Failed to stop previous server: {}", e);
            }
        }
        Err(e) => tracing::debug!("No previous server on port {}: {}", port, e),
    }
}

/// Completes only on error
pub(crate) type Forever = Result<Infallible>;
