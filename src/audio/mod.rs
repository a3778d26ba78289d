//! Audio output subsystem

pub mod buffer;
pub mod device;
pub mod memory;
pub mod playback;

pub use buffer::ByteRing;
pub use device::{get_output_device, list_output_devices, AudioDevice, AudioSink};
pub use memory::MemorySink;
pub use playback::CpalSink;
