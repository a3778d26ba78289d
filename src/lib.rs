//! # Prok
//!
//! A shared audio output server for short-lived clients, plus a small
//! algebra for synthesizing what they play.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────┐            ┌───────────────────────────────────┐
//! │         CLIENT PROCESS        │            │           SERVER PROCESS          │
//! │                               │  spawn if  │                                   │
//! │  ensure_server_reachable ─────┼──absent───▶│  prok-server <port>               │
//! │         │                     │            │                                   │
//! │         ▼                     │   port P   │  ┌─────────────────────────────┐  │
//! │  ClientSession::connect ──────┼───────────▶│  │ control loop                │  │
//! │         │   PING / CONNECT /  │            │  │  PING → 1                   │  │
//! │         │   STOP              │◀───────────┼──│  CONNECT → ServerInfo,      │  │
//! │         │                     │ ServerInfo │  │            interrupt flag   │  │
//! │         ▼                     │            │  └──────────────┬──────────────┘  │
//! │  ClientSession::stream        │  port P+1  │                 │ SessionState    │
//! │   ┌─────────────────────┐     │            │  ┌──────────────▼──────────────┐  │
//! │   │ generator(pos, len) │◀────┼────────────┼──│ data loop                   │  │
//! │   │  Framer algebra     │     │(pos, space)│  │  announce, read, write      │  │
//! │   │  mix / render       │─────┼────────────┼─▶│  every poll interval        │  │
//! │   └─────────────────────┘     │ len, bytes │  └──────────────┬──────────────┘  │
//! │                               │            │                 ▼                 │
//! └───────────────────────────────┘            │  AudioSink (cpal ring / memory)   │
//!                                              └───────────────────────────────────┘
//! ```

pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod framer;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default control port; the data channel listens one above it
    pub const DEFAULT_PORT: u16 = 10345;

    /// Default sample rate in Hz
    pub const DEFAULT_SAMPLE_RATE: i32 = 40960;

    /// Default bits per sample
    pub const DEFAULT_SAMPLE_SIZE: i32 = 8;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: i32 = 1;

    /// Deadline for every single socket operation
    pub const IO_TIMEOUT_MS: u64 = 500;

    /// Pause between two flow-control ticks of a data session
    pub const POLL_INTERVAL_MS: u64 = 50;

    /// PING attempts after launching a server
    pub const SPAWN_ATTEMPTS: u32 = 50;

    /// Pause between two of those attempts
    pub const SPAWN_INTERVAL_MS: u64 = 20;
}
