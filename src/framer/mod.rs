//! Composable waveform generators
//!
//! A [`Framer`] maps an absolute frame index to an amplitude and carries a
//! length in frames. Periodic oscillators are unbounded ([`UNBOUNDED`]);
//! envelopes, sequences and repeats are finite. Framers are immutable trees:
//! combining two of them builds a new node that shares its operands.
//!
//! A finite framer evaluates to `0.0` outside `[0, len)`, and every
//! combinator preserves that at its boundaries.
//!
//! ```
//! use prok::framer::{Envelope, Framer, Waveform};
//!
//! let beep = Framer::tone(Waveform::Sine, 880.0, 40960)
//!     * 0.3
//!     * Framer::envelope(Envelope::new(4096, 4096, 20480, 0, 0.5));
//! let tune = Framer::seq([beep.clone().repeat(3, 8192), beep]);
//! assert_eq!(tune.len(), (28672 + 8192) * 3 + 28672);
//! ```

pub mod mix;
pub mod synth;
pub mod waveform;

pub use mix::{mix, mix_looped, render, to_clamped_byte};
pub use synth::{reference_tune, Adsr, Synth};
pub use waveform::Waveform;

use std::ops::{Add, Mul};
use std::sync::Arc;

/// Absolute frame index
pub type Frame = i64;

/// Length of framers that never end
pub const UNBOUNDED: Frame = Frame::MAX;

/// Piecewise-linear ADSR amplitude, with all durations in frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: Frame,
    pub decay: Frame,
    pub sustain: Frame,
    pub release: Frame,
    /// Level held during sustain, within `[0, 1]`
    pub level: f64,
}

impl Envelope {
    pub fn new(attack: Frame, decay: Frame, sustain: Frame, release: Frame, level: f64) -> Self {
        Self {
            attack: attack.max(0),
            decay: decay.max(0),
            sustain: sustain.max(0),
            release: release.max(0),
            level: level.clamp(0.0, 1.0),
        }
    }

    /// Full-level hold for `frames`
    pub fn hold(frames: Frame) -> Self {
        Self::new(0, 0, frames, 0, 1.0)
    }

    pub fn len(&self) -> Frame {
        self.attack
            .saturating_add(self.decay)
            .saturating_add(self.sustain)
            .saturating_add(self.release)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at(&self, pos: Frame) -> f64 {
        let decay_start = self.attack;
        let sustain_start = decay_start.saturating_add(self.decay);
        let release_start = sustain_start.saturating_add(self.sustain);
        let end = release_start.saturating_add(self.release);

        if pos < 0 {
            0.0
        } else if pos < decay_start {
            pos as f64 / self.attack as f64
        } else if pos < sustain_start {
            1.0 - (pos - decay_start) as f64 / self.decay as f64 * (1.0 - self.level)
        } else if pos < release_start {
            self.level
        } else if pos < end {
            self.level * (1.0 - (pos - release_start) as f64 / self.release as f64)
        } else {
            0.0
        }
    }
}

/// Waveform generator tree
#[derive(Debug, Clone)]
pub enum Framer {
    /// Unbounded periodic waveform; `period` is in frames
    Oscillator { waveform: Waveform, period: f64 },
    Envelope(Envelope),
    Gain { inner: Arc<Framer>, gain: f64 },
    Product(Arc<Framer>, Arc<Framer>),
    Sum(Arc<Framer>, Arc<Framer>),
    /// Parts played back to back; `ends[i]` is the cumulative end of part `i`
    Sequence { parts: Arc<[Framer]>, ends: Arc<[Frame]> },
    Repeat {
        inner: Arc<Framer>,
        inner_len: Frame,
        times: u32,
        delay: Frame,
    },
    Silence(Frame),
}

impl Framer {
    /// Oscillator repeating every `period` frames
    pub fn oscillator(waveform: Waveform, period: f64) -> Self {
        Framer::Oscillator { waveform, period }
    }

    /// Oscillator at `frequency` Hz for the given sample rate
    pub fn tone(waveform: Waveform, frequency: f64, sample_rate: i32) -> Self {
        Self::oscillator(waveform, sample_rate as f64 / frequency)
    }

    pub fn envelope(envelope: Envelope) -> Self {
        Framer::Envelope(envelope)
    }

    /// Explicit pause of `frames`
    pub fn silence(frames: Frame) -> Self {
        Framer::Silence(frames.max(0))
    }

    /// Scale every value by `gain`
    pub fn gain(self, gain: f64) -> Self {
        Framer::Gain {
            inner: Arc::new(self),
            gain,
        }
    }

    /// Elementwise product, as long as the shorter operand
    pub fn product(self, other: Framer) -> Self {
        Framer::Product(Arc::new(self), Arc::new(other))
    }

    /// Elementwise sum, as long as the longer operand.
    ///
    /// Values are not renormalized; clamping happens at mix time.
    pub fn sum(self, other: Framer) -> Self {
        Framer::Sum(Arc::new(self), Arc::new(other))
    }

    /// Play `framers` back to back
    pub fn seq(framers: impl IntoIterator<Item = Framer>) -> Self {
        let parts: Vec<Framer> = framers.into_iter().collect();
        let mut end: Frame = 0;
        let ends: Vec<Frame> = parts
            .iter()
            .map(|part| {
                end = end.saturating_add(part.len());
                end
            })
            .collect();
        Framer::Sequence {
            parts: parts.into(),
            ends: ends.into(),
        }
    }

    /// Play this framer `times` times with `delay` silent frames after each
    pub fn repeat(self, times: u32, delay: Frame) -> Self {
        let inner_len = self.len();
        Framer::Repeat {
            inner: Arc::new(self),
            inner_len,
            times,
            delay: delay.max(0),
        }
    }

    /// Length in frames, [`UNBOUNDED`] for periodic framers
    pub fn len(&self) -> Frame {
        match self {
            Framer::Oscillator { .. } => UNBOUNDED,
            Framer::Envelope(envelope) => envelope.len(),
            Framer::Gain { inner, .. } => inner.len(),
            Framer::Product(a, b) => a.len().min(b.len()),
            Framer::Sum(a, b) => a.len().max(b.len()),
            Framer::Sequence { ends, .. } => ends.last().copied().unwrap_or(0),
            Framer::Repeat {
                inner_len,
                times,
                delay,
                ..
            } => inner_len
                .saturating_add(*delay)
                .saturating_mul(*times as Frame),
            Framer::Silence(frames) => *frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finite(&self) -> bool {
        self.len() != UNBOUNDED
    }

    /// Amplitude at absolute frame `pos`
    pub fn at(&self, pos: Frame) -> f64 {
        if pos < 0 {
            return 0.0;
        }
        match self {
            Framer::Oscillator { waveform, period } => {
                waveform.eval((pos as f64 / period).rem_euclid(1.0))
            }
            Framer::Envelope(envelope) => envelope.at(pos),
            Framer::Gain { inner, gain } => inner.at(pos) * gain,
            Framer::Product(a, b) => a.at(pos) * b.at(pos),
            Framer::Sum(a, b) => a.at(pos) + b.at(pos),
            Framer::Sequence { parts, ends } => {
                let index = ends.partition_point(|&end| end <= pos);
                match parts.get(index) {
                    Some(part) => {
                        let start = if index == 0 { 0 } else { ends[index - 1] };
                        part.at(pos - start)
                    }
                    None => 0.0,
                }
            }
            Framer::Repeat {
                inner,
                inner_len,
                times,
                delay,
            } => {
                let period = inner_len.saturating_add(*delay);
                if period == 0 || pos / period >= *times as Frame {
                    return 0.0;
                }
                let offset = pos % period;
                if offset >= *inner_len {
                    return 0.0;
                }
                inner.at(offset)
            }
            Framer::Silence(_) => 0.0,
        }
    }
}

impl Mul<f64> for Framer {
    type Output = Framer;

    fn mul(self, gain: f64) -> Framer {
        self.gain(gain)
    }
}

impl Mul for Framer {
    type Output = Framer;

    fn mul(self, other: Framer) -> Framer {
        self.product(other)
    }
}

impl Add for Framer {
    type Output = Framer;

    fn add(self, other: Framer) -> Framer {
        self.sum(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp(frames: Frame) -> Framer {
        Framer::envelope(Envelope::new(frames, 0, 0, 0, 1.0))
    }

    #[test]
    fn test_envelope_phases() {
        let env = Envelope::new(10, 10, 10, 10, 0.5);
        assert_eq!(env.len(), 40);
        assert_eq!(env.at(-1), 0.0);
        assert_eq!(env.at(0), 0.0);
        assert_eq!(env.at(5), 0.5);
        assert_eq!(env.at(10), 1.0);
        assert_eq!(env.at(15), 0.75);
        assert_eq!(env.at(20), 0.5);
        assert_eq!(env.at(29), 0.5);
        assert_eq!(env.at(30), 0.5);
        assert_eq!(env.at(35), 0.25);
        assert_eq!(env.at(40), 0.0);
        assert_eq!(env.at(1000), 0.0);
    }

    #[test]
    fn test_envelope_without_ramps() {
        let env = Envelope::hold(4);
        assert_eq!(env.at(0), 1.0);
        assert_eq!(env.at(3), 1.0);
        assert_eq!(env.at(4), 0.0);
        assert!(Envelope::new(0, 0, 0, 0, 1.0).is_empty());
    }

    #[test]
    fn test_oscillator_is_periodic() {
        let osc = Framer::oscillator(Waveform::Sawtooth, 8.0);
        assert_eq!(osc.len(), UNBOUNDED);
        assert!(!osc.is_finite());
        assert_eq!(osc.at(0), 0.0);
        assert_eq!(osc.at(2), 0.5);
        assert_eq!(osc.at(10), 0.5);
        assert_eq!(osc.at(-2), 0.0);
    }

    #[test]
    fn test_tone_period() {
        let tone = Framer::tone(Waveform::Triangle, 1024.0, 40960);
        match tone {
            Framer::Oscillator { period, .. } => assert_eq!(period, 40.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_gain_keeps_length() {
        let loud = ramp(10) * 2.0;
        assert_eq!(loud.len(), 10);
        assert_eq!(loud.at(5), 1.0);
    }

    #[test]
    fn test_product_and_sum_lengths() {
        let short = Framer::envelope(Envelope::hold(10));
        let long = Framer::envelope(Envelope::hold(20));
        let osc = Framer::oscillator(Waveform::Rectangle, 30.0);

        assert_eq!((short.clone() * long.clone()).len(), 10);
        assert_eq!((short.clone() + long.clone()).len(), 20);
        assert_eq!((osc.clone() * short.clone()).len(), 10);
        assert_eq!((osc.clone() + short.clone()).len(), UNBOUNDED);

        let product = osc * short.clone();
        assert_eq!(product.at(0), 1.0);
        assert_eq!(product.at(10), 0.0);

        let sum = short + long;
        assert_eq!(sum.at(5), 2.0);
        assert_eq!(sum.at(15), 1.0);
        assert_eq!(sum.at(20), 0.0);
    }

    #[test]
    fn test_seq_dispatch() {
        let a = Framer::envelope(Envelope::hold(3)) * 0.5;
        let b = Framer::envelope(Envelope::hold(2)) * -0.25;
        let s = Framer::seq([a, b]);
        assert_eq!(s.len(), 5);
        assert_eq!(s.at(0), 0.5);
        assert_eq!(s.at(2), 0.5);
        assert_eq!(s.at(3), -0.25);
        assert_eq!(s.at(4), -0.25);
        assert_eq!(s.at(5), 0.0);
        assert_eq!(s.at(-1), 0.0);
    }

    #[test]
    fn test_seq_skips_empty_parts() {
        let s = Framer::seq([
            Framer::silence(0),
            Framer::envelope(Envelope::hold(2)),
            Framer::silence(0),
            Framer::envelope(Envelope::hold(2)) * 0.5,
        ]);
        assert_eq!(s.len(), 4);
        assert_eq!(s.at(1), 1.0);
        assert_eq!(s.at(2), 0.5);
        assert_eq!(Framer::seq(Vec::new()).len(), 0);
    }

    #[test]
    fn test_repeat_with_gaps() {
        let r = Framer::envelope(Envelope::hold(3)).repeat(2, 2);
        assert_eq!(r.len(), 10);
        let values: Vec<f64> = (0..12).map(|p| r.at(p)).collect();
        assert_eq!(
            values,
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_repeat_of_empty() {
        let r = Framer::silence(0).repeat(5, 0);
        assert_eq!(r.len(), 0);
        assert_eq!(r.at(0), 0.0);
    }

    #[test]
    fn test_silence() {
        let pause = Framer::silence(100);
        assert_eq!(pause.len(), 100);
        assert_eq!(pause.at(50), 0.0);
    }

    fn finite_framer() -> impl Strategy<Value = Framer> {
        let leaf = (0i64..40, 0i64..40, 0i64..40, 0i64..40, 0.0f64..=1.0)
            .prop_map(|(a, d, s, r, l)| Framer::envelope(Envelope::new(a, d, s, r, l)));
        leaf.prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                (inner.clone(), -2.0f64..2.0).prop_map(|(f, k)| f * k),
                (inner.clone(), 1.0f64..50.0).prop_map(|(f, p)| {
                    Framer::oscillator(Waveform::Sine, p) * f
                }),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| a * b),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| a + b),
                prop::collection::vec(inner.clone(), 0..4).prop_map(|parts| Framer::seq(parts)),
                (inner, 0u32..4, 0i64..20).prop_map(|(f, n, d)| f.repeat(n, d)),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_finite_framer_zero_outside(f in finite_framer(), offset in 0i64..200) {
            let len = f.len();
            prop_assert!(f.is_finite());
            prop_assert_eq!(f.at(-1 - offset), 0.0);
            prop_assert_eq!(f.at(len + offset), 0.0);
        }

        #[test]
        fn prop_repeat_length_and_gaps(
            hold in 1i64..30,
            times in 0u32..5,
            delay in 0i64..30,
        ) {
            let inner = Framer::envelope(Envelope::hold(hold));
            let r = inner.repeat(times, delay);
            let period = hold + delay;
            prop_assert_eq!(r.len(), period * times as i64);
            for pos in 0..(period * (times as i64 + 1)) {
                let in_gap = pos % period >= hold;
                let past_end = pos / period >= times as i64;
                let expected = if in_gap || past_end { 0.0 } else { 1.0 };
                prop_assert_eq!(r.at(pos), expected);
            }
        }

        #[test]
        fn prop_seq_concatenates(a in finite_framer(), b in finite_framer()) {
            let s = Framer::seq([a.clone(), b.clone()]);
            prop_assert_eq!(s.len(), a.len() + b.len());
            for pos in 0..s.len().min(400) {
                let expected = if pos < a.len() { a.at(pos) } else { b.at(pos - a.len()) };
                prop_assert_eq!(s.at(pos), expected);
            }
        }
    }
}
