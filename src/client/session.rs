//! One client's streaming session

use bytes::Bytes;
use tokio::net::TcpStream;

use crate::client::{ensure_server_reachable, ServerLauncher};
use crate::config::ClientConfig;
use crate::error::{Result, WireError};
use crate::framer::Synth;
use crate::protocol::{Command, Communicator, ServerInfo};

/// Handshaken connection to the data channel of a running server
pub struct ClientSession {
    info: ServerInfo,
    data: Communicator<TcpStream>,
}

impl ClientSession {
    /// Reach or start a server, CONNECT to it and open the data channel.
    ///
    /// The CONNECT ends whatever session another client had open.
    pub async fn connect(config: &ClientConfig, launcher: &dyn ServerLauncher) -> Result<Self> {
        ensure_server_reachable(config, launcher).await?;
        let io_timeout = config.io_timeout();

        let mut control = Communicator::connect(config.port, io_timeout).await?;
        control.write_command(Command::Connect).await?;
        let info = control.read_info().await?;
        if let Err(e) = control.close().await {
            tracing::debug!("Control connection close: {}", e);
        }

        let data = Communicator::connect(config.data_port()?, io_timeout).await?;
        tracing::info!("Connected to server on port {}, {}", config.port, info);

        Ok(Self { info, data })
    }

    /// Format negotiated during CONNECT
    pub fn info(&self) -> ServerInfo {
        self.info
    }

    /// Framer builder for the negotiated sample rate
    pub fn context(&self) -> Synth {
        Synth::from_info(&self.info)
    }

    /// Answer the server's requests until either side ends the session.
    ///
    /// `generator(position, len)` is asked for `len` bytes starting at the
    /// server's byte `position`. At most `len` of the returned bytes are sent;
    /// a shorter buffer is announced with its own length. Returning `None`
    /// ends the session cleanly. The server hanging up, for instance because
    /// another client took over, is a normal end as well.
    pub async fn stream<F>(mut self, mut generator: F) -> Result<()>
    where
        F: FnMut(i32, i32) -> Option<Bytes>,
    {
        loop {
            let request = async {
                let position = self.data.read_int().await?;
                let len = self.data.read_int().await?;
                Ok::<_, WireError>((position, len))
            };
            let (position, len) = match request.await {
                Ok(pair) => pair,
                Err(WireError::StreamClosed) => {
                    tracing::info!("Server closed the session");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let Some(buf) = generator(position, len) else {
                break;
            };
            let send = buf.len().min(len.max(0) as usize);
            if send == 0 {
                break;
            }

            let sent = async {
                self.data.write_int(send as i32).await?;
                self.data.write(&buf[..send]).await
            };
            match sent.await {
                Ok(()) => {}
                Err(WireError::StreamClosed) => {
                    tracing::info!("Server closed the session");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.finish().await
    }

    /// Send the end-of-session marker and close
    async fn finish(mut self) -> Result<()> {
        match self.data.write_int(0).await {
            Ok(()) => {}
            Err(WireError::StreamClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = self.data.close().await {
            tracing::debug!("Data connection close: {}", e);
        }
        tracing::info!("Session finished");
        Ok(())
    }
}
