//! Playback through the system output device
//!
//! The cpal stream is owned by a dedicated thread because streams cannot
//! move between threads. The data loop only touches the shared byte ring.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::buffer::{create_shared_ring, SharedByteRing};
use crate::audio::device::{get_output_device, AudioDevice, AudioSink};
use crate::error::AudioError;
use crate::protocol::ServerInfo;

/// How long `start` waits for the stream thread to report back
const STREAM_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on waiting for queued audio when closing
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Audio sink writing to a cpal output device
pub struct CpalSink {
    /// Device name, `None` for the host default
    device_name: Option<String>,

    /// Format and device resolved by `open`
    opened: Option<(ServerInfo, AudioDevice, StreamConfig, SampleFormat)>,

    /// Bytes waiting for the device callback
    ring: Option<SharedByteRing>,

    /// Whether the stream thread should keep running
    running: Arc<AtomicBool>,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,

    /// Channel for stream errors
    error_rx: Option<Receiver<AudioError>>,
}

impl CpalSink {
    /// Sink for the default output device
    pub fn new() -> Self {
        Self::with_device(None)
    }

    /// Sink for a named output device
    pub fn with_device(device_name: Option<String>) -> Self {
        Self {
            device_name,
            opened: None,
            ring: None,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            error_rx: None,
        }
    }

    /// Check if the stream thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until queued audio has been played or the timeout passes
    pub fn drain(&self, timeout: Duration) {
        let Some(ring) = &self.ring else {
            return;
        };
        let deadline = Instant::now() + timeout;
        while self.is_running() && !ring.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn spawn_stream(
        &mut self,
        info: ServerInfo,
        device: cpal::Device,
        config: StreamConfig,
        format: SampleFormat,
        ring: SharedByteRing,
    ) -> Result<(), AudioError> {
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);
        let sample_bytes = info.sample_bytes();

        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match format {
                    SampleFormat::F32 => build_stream::<f32>(
                        &device, &config, ring, sample_bytes, running.clone(), error_tx,
                    ),
                    SampleFormat::I16 => build_stream::<i16>(
                        &device, &config, ring, sample_bytes, running.clone(), error_tx,
                    ),
                    SampleFormat::U16 => build_stream::<u16>(
                        &device, &config, ring, sample_bytes, running.clone(), error_tx,
                    ),
                    other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
                };

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        running.store(false, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    running.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream is dropped here, stopping playback
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);

        match ready_rx.recv_timeout(STREAM_READY_TIMEOUT) {
            Ok(result) => result,
            Err(_) => Err(AudioError::StreamError(
                "Output stream did not start in time".to_string(),
            )),
        }
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for CpalSink {
    fn open(&mut self, info: &ServerInfo) -> Result<(), AudioError> {
        let device = get_output_device(self.device_name.as_deref())?;
        let default_config = device.default_output_config()?;

        let config = StreamConfig {
            channels: info.channels as u16,
            sample_rate: cpal::SampleRate(info.sample_rate as u32),
            buffer_size: cpal::BufferSize::Default,
        };
        let format = device.output_format_for(
            config.channels,
            config.sample_rate.0,
            default_config.sample_format(),
        )?;

        tracing::info!("Opened output device {} ({:?}, {})", device.name, format, info);

        self.ring = Some(create_shared_ring(info.bytes_per_second()));
        self.opened = Some((*info, device, config, format));
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.is_running() {
            return Ok(());
        }
        let (info, device, config, format) = self.opened.take().ok_or(AudioError::NotOpen)?;
        let ring = self.ring.clone().ok_or(AudioError::NotOpen)?;
        self.spawn_stream(info, device.into_inner(), config, format, ring)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, AudioError> {
        let ring = self.ring.as_ref().ok_or(AudioError::NotOpen)?;
        Ok(ring.push_slice(bytes))
    }

    fn available(&self) -> usize {
        self.ring.as_ref().map_or(0, |ring| ring.available())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn close(&mut self) {
        self.drain(DRAIN_TIMEOUT);
        self.stop();
        if let Some(ring) = self.ring.take() {
            tracing::debug!(
                "Closed output device ({} bytes overflowed, {} underruns)",
                ring.overflow_count(),
                ring.underrun_count()
            );
        }
        self.opened = None;
        self.error_rx = None;
    }

    fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    ring: SharedByteRing,
    sample_bytes: usize,
    running: Arc<AtomicBool>,
    error_tx: Sender<AudioError>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    data.fill(T::EQUILIBRIUM);
                    return;
                }
                for slot in data.iter_mut() {
                    *slot = T::from_sample(ring.next_sample(sample_bytes));
                }
            },
            move |err| {
                let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}
