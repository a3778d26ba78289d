//! Fixed-width integer and command codec over a byte stream
//!
//! Every operation is bounded by the communicator's timeout. A peer that
//! hangs up surfaces as [`WireError::StreamClosed`], a silent peer as
//! [`WireError::Timeout`].

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::WireError;
use crate::protocol::{Command, ServerInfo};

/// Framed access to one connection
pub struct Communicator<S> {
    stream: S,
    timeout: Duration,
}

impl Communicator<TcpStream> {
    /// Connect to a loopback port, giving up after `io_timeout`
    pub async fn connect(port: u16, io_timeout: Duration) -> Result<Self, WireError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let stream = match timeout(io_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(WireError::Connect(e)),
            Err(_) => return Err(WireError::Timeout),
        };
        stream.set_nodelay(true).map_err(WireError::Io)?;
        Ok(Self::new(stream, io_timeout))
    }
}

impl<S> Communicator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self { stream, timeout }
    }

    pub async fn write_command(&mut self, command: Command) -> Result<(), WireError> {
        self.write_all(&[command.as_byte()]).await
    }

    pub async fn read_command(&mut self) -> Result<Command, WireError> {
        let byte = self.read_byte().await?;
        Command::try_from(byte)
    }

    pub async fn write_int(&mut self, value: i32) -> Result<(), WireError> {
        self.write_all(&value.to_be_bytes()).await
    }

    pub async fn read_int(&mut self) -> Result<i32, WireError> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw).await?;
        Ok(i32::from_be_bytes(raw))
    }

    /// Write two integers in a single segment
    pub async fn write_pair(&mut self, first: i32, second: i32) -> Result<(), WireError> {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_i32(first);
        buf.put_i32(second);
        self.write_all(&buf).await
    }

    pub async fn write_info(&mut self, info: &ServerInfo) -> Result<(), WireError> {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_i32(info.sample_rate);
        buf.put_i32(info.sample_size);
        buf.put_i32(info.channels);
        self.write_all(&buf).await
    }

    pub async fn read_info(&mut self) -> Result<ServerInfo, WireError> {
        let sample_rate = self.read_int().await?;
        let sample_size = self.read_int().await?;
        let channels = self.read_int().await?;
        Ok(ServerInfo::new(sample_rate, sample_size, channels))
    }

    /// Write `buf` completely
    pub async fn write(&mut self, buf: &[u8]) -> Result<(), WireError> {
        self.write_all(buf).await
    }

    /// Single read of at most `buf.len()` bytes.
    ///
    /// May return fewer bytes than requested; the returned count is
    /// authoritative. End of stream is reported as `StreamClosed`.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, WireError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = deadline(self.timeout, self.stream.read(buf)).await?;
        if n == 0 {
            return Err(WireError::StreamClosed);
        }
        Ok(n)
    }

    /// Read until `buf` is full or the stream closes.
    ///
    /// The deadline applies to each underlying read, not to the whole buffer.
    pub async fn read_full(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..]).await?;
        }
        Ok(())
    }

    /// Flush and shut down the write half
    pub async fn close(mut self) -> Result<(), WireError> {
        self.flush().await?;
        deadline(self.timeout, self.stream.shutdown()).await
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn read_byte(&mut self) -> Result<u8, WireError> {
        let mut raw = [0u8; 1];
        self.read_exact(&mut raw).await?;
        Ok(raw[0])
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        deadline(self.timeout, self.stream.read_exact(buf)).await?;
        Ok(())
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), WireError> {
        deadline(self.timeout, self.stream.write_all(buf)).await?;
        self.flush().await
    }

    async fn flush(&mut self) -> Result<(), WireError> {
        deadline(self.timeout, self.stream.flush()).await
    }
}

/// Run one I/O step under a deadline
async fn deadline<T, F>(limit: Duration, op: F) -> Result<T, WireError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(limit, op).await {
        Ok(result) => result.map_err(WireError::from),
        Err(_) => Err(WireError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::{duplex, DuplexStream};

    const TEST_TIMEOUT: Duration = Duration::from_millis(100);

    fn pair() -> (Communicator<DuplexStream>, Communicator<DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        (
            Communicator::new(a, TEST_TIMEOUT),
            Communicator::new(b, TEST_TIMEOUT),
        )
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_int_encoding_is_big_endian() {
        let (mut a, b) = pair();
        a.write_int(0x0102_0304).await.unwrap();
        let mut raw = b.into_inner();
        let mut buf = [0u8; 4];
        raw.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let (mut a, mut b) = pair();
        for command in Command::ALL {
            a.write_command(command).await.unwrap();
            assert_eq!(b.read_command().await.unwrap(), command);
        }
    }

    #[tokio::test]
    async fn test_invalid_command() {
        let (a, mut b) = pair();
        let mut raw = a.into_inner();
        raw.write_all(&[7]).await.unwrap();
        assert!(matches!(
            b.read_command().await,
            Err(WireError::InvalidCommand(7))
        ));
    }

    #[tokio::test]
    async fn test_info_round_trip() {
        let (mut a, mut b) = pair();
        let info = ServerInfo::new(40960, 8, 1);
        a.write_info(&info).await.unwrap();
        assert_eq!(b.read_info().await.unwrap(), info);
    }

    #[tokio::test]
    async fn test_pair_matches_two_ints() {
        let (mut a, mut b) = pair();
        a.write_pair(896, -1).await.unwrap();
        assert_eq!(b.read_int().await.unwrap(), 896);
        assert_eq!(b.read_int().await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_read_times_out_on_idle_peer() {
        let (_a, mut b) = pair();
        assert!(matches!(b.read_int().await, Err(WireError::Timeout)));
    }

    #[tokio::test]
    async fn test_read_reports_closed_stream() {
        let (a, mut b) = pair();
        drop(a);
        assert!(matches!(b.read_int().await, Err(WireError::StreamClosed)));
        let mut buf = [0u8; 16];
        assert!(matches!(b.read(&mut buf).await, Err(WireError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_partial_int_then_close() {
        let (a, mut b) = pair();
        let mut raw = a.into_inner();
        raw.write_all(&[0, 0]).await.unwrap();
        drop(raw);
        assert!(matches!(b.read_int().await, Err(WireError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_short_read_and_full_read() {
        let (mut a, mut b) = pair();
        a.write(&[1, 2, 3]).await.unwrap();

        let mut buf = [0u8; 8];
        let n = b.read(&mut buf).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..n], &[1, 2, 3]);

        let writer = tokio::spawn(async move {
            a.write(&[4, 5]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            a.write(&[6, 7]).await.unwrap();
            a
        });
        let mut full = [0u8; 4];
        b.read_full(&mut full).await.unwrap();
        assert_eq!(full, [4, 5, 6, 7]);
        writer.await.unwrap();
    }

    proptest! {
        #[test]
        fn prop_int_round_trip(value in any::<i32>()) {
            let decoded = runtime().block_on(async {
                let (mut a, mut b) = pair();
                a.write_int(value).await.unwrap();
                b.read_int().await.unwrap()
            });
            prop_assert_eq!(decoded, value);
        }
    }
}
