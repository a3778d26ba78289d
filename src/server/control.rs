//! Control channel: one command per connection

use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::error::WireError;
use crate::protocol::{Command, Communicator, ServerInfo};
use crate::server::SessionState;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Answer control commands until a client sends STOP
pub(crate) async fn serve(
    listener: TcpListener,
    info: ServerInfo,
    state: Arc<SessionState>,
    io_timeout: Duration,
    stop_tx: oneshot::Sender<()>,
) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!("Control accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let mut comm = Communicator::new(stream, io_timeout);
        match handle(&mut comm, info, &state).await {
            Ok(Command::Stop) => {
                tracing::info!("Goodbye");
                let _ = stop_tx.send(());
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Control connection dropped: {}", e),
        }
    }
}

async fn handle(
    comm: &mut Communicator<TcpStream>,
    info: ServerInfo,
    state: &SessionState,
) -> Result<Command, WireError> {
    let command = comm.read_command().await?;
    match command {
        Command::Ping => {
            tracing::info!("Ping");
            comm.write_int(1).await?;
        }
        Command::Connect => {
            tracing::info!("Connect");
            // raised before replying so the caller's data session cannot start first
            state.interrupt();
            comm.write_info(&info).await?;
        }
        Command::Stop => {}
    }
    Ok(command)
}
