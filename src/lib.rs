pub mod dsp;
pub mod engine; // Engine orchestration and the per-frame modulation combiner
pub mod graph; // Audio-graph nodes and scheduled parameter automation
pub mod patch; // Serializable presets / explicit base-parameter store
pub mod synth; // Voice management and polyphony

/// Oscillator voices in the default dual-oscillator layout.
pub const DEFAULT_VOICES: usize = 2;
/// LFO slots per voice in the default layout.
pub const LFO_SLOTS: usize = 4;

/// Grace period (seconds) after a release ramp completes before a note's
/// audio resources are torn down. Long enough for the ramp to finish,
/// short enough not to leak nodes.
pub(crate) const TEARDOWN_GRACE: f64 = 0.1;
