//! Pure synthesis math with no audio-graph dependencies.
//!
//! These components are allocation-free and side-effect-free, so they can be
//! evaluated from the control loop at any cadence. They intentionally stay
//! focused on timing and waveform math; the `synth` and `engine` layers deal
//! with node graphs and orchestration.

/// Attack/decay/sustain/release envelope parameters.
pub mod envelope;
/// Low frequency oscillator with sync, delay, fade-in, and one-shot state.
pub mod lfo;

pub use envelope::Adsr;
pub use lfo::{Lfo, ModTarget, SyncDivision};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Oscillator and LFO waveform shapes.
///
/// The same four shapes serve both audio-rate oscillators (where the shape
/// is only a tag handed to the rendering backend) and LFOs (where
/// [`Waveform::value_at`] is evaluated directly at control rate).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// Evaluate the waveform at cycle position `t` in [0, 1), mapped to [-1, 1].
    ///
    /// Triangle peaks at +1 at t=0.25 and -1 at t=0.75. Square is +1 on the
    /// first half-cycle. Sawtooth rises from -1 to +1 over the cycle.
    pub fn value_at(self, t: f64) -> f64 {
        match self {
            Waveform::Sine => (t * std::f64::consts::TAU).sin(),
            Waveform::Triangle => {
                if t < 0.25 {
                    t * 4.0
                } else if t < 0.75 {
                    1.0 - (t - 0.25) * 4.0
                } else {
                    -1.0 + (t - 0.75) * 4.0
                }
            }
            Waveform::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * t - 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn triangle_hits_peaks_and_zero_crossings() {
        assert_relative_eq!(Waveform::Triangle.value_at(0.0), 0.0);
        assert_relative_eq!(Waveform::Triangle.value_at(0.25), 1.0);
        assert_relative_eq!(Waveform::Triangle.value_at(0.5), 0.0);
        assert_relative_eq!(Waveform::Triangle.value_at(0.75), -1.0);
    }

    #[test]
    fn square_switches_at_half_cycle() {
        assert_relative_eq!(Waveform::Square.value_at(0.49), 1.0);
        assert_relative_eq!(Waveform::Square.value_at(0.51), -1.0);
    }

    #[test]
    fn sawtooth_spans_full_range() {
        assert_relative_eq!(Waveform::Sawtooth.value_at(0.0), -1.0);
        assert!(Waveform::Sawtooth.value_at(0.999_999) > 0.999);
    }

    #[test]
    fn sine_matches_reference() {
        assert_relative_eq!(Waveform::Sine.value_at(0.25), 1.0, epsilon = 1e-12);
        assert_relative_eq!(Waveform::Sine.value_at(0.5), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn all_shapes_stay_in_range() {
        for shape in [
            Waveform::Sine,
            Waveform::Triangle,
            Waveform::Square,
            Waveform::Sawtooth,
        ] {
            for i in 0..1000 {
                let v = shape.value_at(i as f64 / 1000.0);
                assert!((-1.0..=1.0).contains(&v), "{shape:?} out of range at {i}");
            }
        }
    }
}
