//! Normalized periodic waveforms
//!
//! A waveform maps a phase in `[0, 1)` to an amplitude in `[-1, 1]`.

use std::f64::consts::TAU;

/// Shape of one oscillator period
#[derive(Debug, Clone, Copy)]
pub enum Waveform {
    Sine,
    /// Three-level pulse: high, zero, low for a third of the period each
    Rectangle,
    Triangle,
    Sawtooth,
    /// Caller-supplied shape
    Custom(fn(f64) -> f64),
}

impl Waveform {
    /// Amplitude at `phase`, which must lie in `[0, 1)`
    pub fn eval(&self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => sine(phase),
            Waveform::Rectangle => rectangle(phase),
            Waveform::Triangle => triangle(phase),
            Waveform::Sawtooth => sawtooth(phase),
            Waveform::Custom(f) => f(phase),
        }
    }
}

pub fn sine(phase: f64) -> f64 {
    (phase * TAU).sin()
}

pub fn rectangle(phase: f64) -> f64 {
    if phase < 1.0 / 3.0 {
        1.0
    } else if phase < 2.0 / 3.0 {
        0.0
    } else {
        -1.0
    }
}

pub fn triangle(phase: f64) -> f64 {
    if phase < 0.25 {
        phase * 4.0
    } else if phase < 0.75 {
        1.0 - (phase - 0.25) * 4.0
    } else {
        (phase - 0.75) * 4.0 - 1.0
    }
}

pub fn sawtooth(phase: f64) -> f64 {
    if phase < 0.5 {
        phase * 2.0
    } else {
        phase * 2.0 - 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_sine_quarters() {
        assert!(sine(0.0).abs() < EPS);
        assert!((sine(0.25) - 1.0).abs() < EPS);
        assert!(sine(0.5).abs() < EPS);
        assert!((sine(0.75) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_triangle_shape() {
        assert_eq!(triangle(0.0), 0.0);
        assert_eq!(triangle(0.25), 1.0);
        assert_eq!(triangle(0.5), 0.0);
        assert_eq!(triangle(0.75), -1.0);
    }

    #[test]
    fn test_sawtooth_shape() {
        assert_eq!(sawtooth(0.0), 0.0);
        assert_eq!(sawtooth(0.25), 0.5);
        assert_eq!(sawtooth(0.5), -1.0);
        assert_eq!(sawtooth(0.75), -0.5);
    }

    #[test]
    fn test_rectangle_levels() {
        assert_eq!(rectangle(0.1), 1.0);
        assert_eq!(rectangle(0.5), 0.0);
        assert_eq!(rectangle(0.9), -1.0);
    }

    #[test]
    fn test_all_shapes_in_range() {
        let shapes = [
            Waveform::Sine,
            Waveform::Rectangle,
            Waveform::Triangle,
            Waveform::Sawtooth,
            Waveform::Custom(|p| 1.0 - 2.0 * p),
        ];
        for shape in shapes {
            for step in 0..1000 {
                let value = shape.eval(step as f64 / 1000.0);
                assert!((-1.0..=1.0).contains(&value), "{:?} out of range", shape);
            }
        }
    }
}
