//! Data channel: pull-based streaming into the audio sink

use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;
use uuid::Uuid;

use crate::audio::AudioSink;
use crate::error::{Error, WireError};
use crate::protocol::{Communicator, ServerInfo};
use crate::server::{Forever, SessionState};

/// How a data session left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent a zero length
    Finished,
    /// Another client connected
    Interrupted,
}

/// Accept and serve data sessions one at a time.
///
/// Only device errors escape; anything a client does wrong ends that
/// client's session and the loop moves on.
pub(crate) async fn serve<S: AudioSink>(
    listener: TcpListener,
    sink: &mut S,
    state: &SessionState,
    info: ServerInfo,
    io_timeout: Duration,
    poll_interval: Duration,
) -> Forever {
    let mut buf = Vec::with_capacity(info.bytes_per_second());

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Data accept failed: {}", e);
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let id = Uuid::new_v4();
        let span = tracing::info_span!("session", %id, %peer);
        let mut comm = Communicator::new(stream, io_timeout);

        state.begin_session();
        let result = run_session(&mut comm, sink, state, info, poll_interval, &mut buf)
            .instrument(span)
            .await;
        state.end_session();

        let position = state.position();
        match result {
            Ok(end) => tracing::info!(%id, "Disconnect ({:?}) at position {}", end, position),
            Err(Error::Audio(e)) => return Err(Error::Audio(e)),
            Err(e) if e.is_stream_closed() || e.is_timeout() => {
                tracing::info!(%id, "Session abandoned by client at position {}", position)
            }
            Err(e) => tracing::warn!(%id, "Session dropped: {}", e),
        }
    }
}

async fn run_session<S: AudioSink>(
    comm: &mut Communicator<TcpStream>,
    sink: &mut S,
    state: &SessionState,
    info: ServerInfo,
    poll_interval: Duration,
    buf: &mut Vec<u8>,
) -> Result<SessionEnd, Error> {
    tracing::info!("Receive");

    while !state.is_interrupted() {
        if let Some(e) = sink.check_errors() {
            tracing::warn!("Output device reported: {}", e);
        }

        // whole frames only; zero would read back as the end-of-session marker
        let available = sink.available();
        let available = available - available % info.frame_bytes().max(1);
        if available == 0 {
            tokio::time::sleep(poll_interval).await;
            continue;
        }
        let announced = available.min(i32::MAX as usize) as i32;
        comm.write_pair(state.position(), announced).await?;

        let requested = comm.read_int().await?;
        if requested == 0 {
            return Ok(SessionEnd::Finished);
        }
        let limit = available.max(info.bytes_per_second());
        if requested < 0 || requested as usize > limit {
            return Err(WireError::InvalidLength(requested).into());
        }

        buf.resize(requested as usize, 0);
        comm.read_full(buf).await?;
        let accepted = sink.write(buf)?;
        if accepted < buf.len() {
            tracing::debug!("Device accepted {} of {} bytes", accepted, buf.len());
        }
        state.advance(requested);

        tokio::time::sleep(poll_interval).await;
    }

    Ok(SessionEnd::Interrupted)
}
