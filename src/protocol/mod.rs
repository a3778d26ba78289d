//! Protocol definitions shared by server and clients
//!
//! Two loopback TCP channels are used. The control channel on port `P`
//! carries one command per connection:
//!
//! ```text
//! client -> server   [cmd: u8]
//! PING    <- [1: i32]
//! CONNECT <- [sample_rate: i32][sample_size: i32][channels: i32]
//! STOP    <- (nothing, the server exits)
//! ```
//!
//! The data channel on port `P + 1` runs the pull loop of one session:
//!
//! ```text
//! server -> client   [position: i32][available: i32]
//! client -> server   [length: i32][length raw sample bytes]
//! ```
//!
//! A length of `0` ends the session. All integers are big-endian.

pub mod wire;

pub use wire::Communicator;

use std::fmt;

use crate::error::WireError;

/// Commands accepted on the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Connect,
    Stop,
}

impl Command {
    /// All commands in wire order
    pub const ALL: [Command; 3] = [Command::Ping, Command::Connect, Command::Stop];

    /// Wire representation, the ordinal of the command
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Ping => 0,
            Command::Connect => 1,
            Command::Stop => 2,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = WireError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_byte() == byte)
            .ok_or(WireError::InvalidCommand(byte))
    }
}

/// Output format owned by the server, handed to clients on CONNECT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerInfo {
    /// Frames per second
    pub sample_rate: i32,
    /// Bits per sample, 8 or 16
    pub sample_size: i32,
    /// 1 (mono) or 2 (stereo)
    pub channels: i32,
}

impl ServerInfo {
    pub fn new(sample_rate: i32, sample_size: i32, channels: i32) -> Self {
        Self {
            sample_rate,
            sample_size,
            channels,
        }
    }

    /// Bytes in one sample of one channel
    pub fn sample_bytes(&self) -> usize {
        (self.sample_size.max(8) as usize).div_ceil(8)
    }

    /// Bytes in one frame (one sample for every channel)
    pub fn frame_bytes(&self) -> usize {
        self.sample_bytes() * self.channels.max(1) as usize
    }

    /// Bytes consumed by the device per second of playback
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate.max(0) as usize * self.frame_bytes()
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        use crate::constants::*;
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_SAMPLE_SIZE, DEFAULT_CHANNELS)
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = if self.channels == 1 { "mono" } else { "stereo" };
        write!(
            f,
            "{} bits / {} kHz {}",
            self.sample_size,
            self.sample_rate / 1000,
            channels
        )
    }
}
