//! Time-based construction of framers for a fixed sample rate

use std::time::Duration;

use crate::framer::{Envelope, Frame, Framer, Waveform};
use crate::protocol::ServerInfo;

/// ADSR envelope described in wall-clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: Duration,
    pub decay: Duration,
    pub sustain: Duration,
    pub release: Duration,
    pub sustain_level: f64,
}

impl Adsr {
    /// Envelope holding full level for `sustain`, with no ramps
    pub fn new(sustain: Duration) -> Self {
        Self {
            attack: Duration::ZERO,
            decay: Duration::ZERO,
            sustain,
            release: Duration::ZERO,
            sustain_level: 1.0,
        }
    }

    pub fn attack(mut self, attack: Duration) -> Self {
        self.attack = attack;
        self
    }

    pub fn decay(mut self, decay: Duration) -> Self {
        self.decay = decay;
        self
    }

    pub fn release(mut self, release: Duration) -> Self {
        self.release = release;
        self
    }

    pub fn sustain_level(mut self, level: f64) -> Self {
        self.sustain_level = level;
        self
    }
}

/// Builds framers from durations and frequencies at one sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synth {
    sample_rate: i32,
}

impl Synth {
    pub fn new(sample_rate: i32) -> Self {
        Self { sample_rate }
    }

    pub fn from_info(info: &ServerInfo) -> Self {
        Self::new(info.sample_rate)
    }

    pub fn sample_rate(&self) -> i32 {
        self.sample_rate
    }

    /// Whole frames elapsed in `duration`, truncated
    pub fn frames(&self, duration: Duration) -> Frame {
        (duration.as_secs_f64() * self.sample_rate as f64) as Frame
    }

    /// Frames per period of `frequency`
    pub fn period(&self, frequency: f64) -> f64 {
        self.sample_rate as f64 / frequency
    }

    /// Unbounded oscillator at `frequency` Hz
    pub fn tone(&self, waveform: Waveform, frequency: f64) -> Framer {
        Framer::oscillator(waveform, self.period(frequency))
    }

    pub fn adsr(&self, adsr: &Adsr) -> Framer {
        Framer::envelope(Envelope::new(
            self.frames(adsr.attack),
            self.frames(adsr.decay),
            self.frames(adsr.sustain),
            self.frames(adsr.release),
            adsr.sustain_level,
        ))
    }

    /// Silent gap lasting `duration`
    pub fn pause(&self, duration: Duration) -> Framer {
        Framer::silence(self.frames(duration))
    }

    /// Repeat `framer` with a silent `delay` after each repetition
    pub fn repeat(&self, framer: Framer, times: u32, delay: Duration) -> Framer {
        framer.repeat(times, self.frames(delay))
    }
}

/// Short beeps at 880 Hz followed by one longer 440 Hz tone
pub fn reference_tune(synth: &Synth, beeps: u32) -> Framer {
    let shape = Adsr::new(Duration::from_millis(500))
        .attack(Duration::from_millis(100))
        .decay(Duration::from_millis(100));

    let high = synth.tone(Waveform::Sine, 880.0) * 0.3 * synth.adsr(&shape);
    let low = synth.tone(Waveform::Sine, 440.0) * 0.5 * synth.adsr(&shape);

    Framer::seq([
        synth.repeat(high, beeps, Duration::from_millis(200)),
        low,
    ])
}
