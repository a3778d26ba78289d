//! Output device capability and cpal device lookup

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;
use crate::protocol::ServerInfo;

/// Capability the server needs from an audio output.
///
/// The server's data loop is the only writer. `available` reports free
/// space in bytes, which equals frames for 8-bit mono.
pub trait AudioSink: Send {
    /// Prepare the device for the given format
    fn open(&mut self, info: &ServerInfo) -> Result<(), AudioError>;

    /// Begin playback
    fn start(&mut self) -> Result<(), AudioError>;

    /// Queue sample bytes, returning how many were accepted
    fn write(&mut self, bytes: &[u8]) -> Result<usize, AudioError>;

    /// Free buffer space in bytes
    fn available(&self) -> usize;

    /// Halt playback; queued audio is kept
    fn stop(&mut self);

    /// Release the device
    fn close(&mut self);

    /// Asynchronous device error reported since the last call, if any
    fn check_errors(&self) -> Option<AudioError> {
        None
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn open(&mut self, info: &ServerInfo) -> Result<(), AudioError> {
        (**self).open(info)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        (**self).start()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, AudioError> {
        (**self).write(bytes)
    }

    fn available(&self) -> usize {
        (**self).available()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn check_errors(&self) -> Option<AudioError> {
        (**self).check_errors()
    }
}

/// Wrapper around a cpal output device
pub struct AudioDevice {
    inner: cpal::Device,
    pub name: String,
}

impl AudioDevice {
    pub fn from_cpal(device: cpal::Device) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            inner: device,
            name,
        }
    }

    pub fn inner(&self) -> &cpal::Device {
        &self.inner
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    /// Get default output config
    pub fn default_output_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        self.inner
            .default_output_config()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))
    }

    /// Sample format of a supported output configuration matching `channels`
    /// and `sample_rate`, preferring `preferred` when several match.
    ///
    /// Fails with [`AudioError::UnsupportedFormat`] listing what the device
    /// does offer.
    pub fn output_format_for(
        &self,
        channels: u16,
        sample_rate: u32,
        preferred: cpal::SampleFormat,
    ) -> Result<cpal::SampleFormat, AudioError> {
        let ranges: Vec<_> = self
            .inner
            .supported_output_configs()
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?
            .collect();

        let matching: Vec<cpal::SampleFormat> = ranges
            .iter()
            .filter(|r| {
                r.channels() == channels
                    && r.min_sample_rate().0 <= sample_rate
                    && sample_rate <= r.max_sample_rate().0
            })
            .map(|r| r.sample_format())
            .collect();

        if matching.contains(&preferred) {
            return Ok(preferred);
        }
        if let Some(&format) = matching.first() {
            return Ok(format);
        }

        let offered: Vec<String> = ranges
            .iter()
            .map(|r| {
                format!(
                    "{} ch {}-{} Hz",
                    r.channels(),
                    r.min_sample_rate().0,
                    r.max_sample_rate().0
                )
            })
            .collect();
        Err(AudioError::UnsupportedFormat(format!(
            "{} does not play {} Hz with {} channel(s); supported: {}",
            self.name,
            sample_rate,
            channels,
            offered.join(", ")
        )))
    }
}

/// Names of all output devices on the default host
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate output devices: {}", e);
            Vec::new()
        }
    }
}

/// Get an output device by name, or the default one when `name` is `None`
pub fn get_output_device(name: Option<&str>) -> Result<AudioDevice, AudioError> {
    let host = cpal::default_host();

    let Some(name) = name else {
        return host
            .default_output_device()
            .map(AudioDevice::from_cpal)
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()));
    };

    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    for device in devices {
        if device.name().is_ok_and(|n| n == name) {
            return Ok(AudioDevice::from_cpal(device));
        }
    }

    Err(AudioError::DeviceNotFound(name.to_string()))
}
