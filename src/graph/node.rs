use thiserror::Error;

use crate::{dsp::Waveform, graph::param::RampParam};

/// Lifecycle errors on audio-node handles.
///
/// These come from teardown races: a reap tick or a rapid retrigger may try
/// to stop a node a faster-than-expected earlier event already stopped.
/// Callers on the teardown path swallow them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("oscillator was never started")]
    NotStarted,
    #[error("oscillator already started")]
    AlreadyStarted,
    #[error("oscillator already stopped")]
    AlreadyStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OscState {
    Created,
    Started,
    Stopped,
}

/// A single sub-oscillator's control handle: waveform tag plus automatable
/// frequency (Hz) and detune (cents). The renderer consumes the schedules;
/// the core only writes them.
#[derive(Debug)]
pub struct OscNode {
    pub waveform: Waveform,
    pub frequency: RampParam,
    pub detune: RampParam,
    state: OscState,
    connected: bool,
}

impl OscNode {
    pub fn new(waveform: Waveform, frequency_hz: f32, detune_cents: f32) -> Self {
        Self {
            waveform,
            frequency: RampParam::new(frequency_hz),
            detune: RampParam::new(detune_cents),
            state: OscState::Created,
            connected: true,
        }
    }

    /// Begin producing sound at `now`. Starting twice is a race on the
    /// caller's side and reported as such.
    pub fn start(&mut self, _now: f64) -> Result<(), NodeError> {
        match self.state {
            OscState::Created => {
                self.state = OscState::Started;
                Ok(())
            }
            OscState::Started | OscState::Stopped => Err(NodeError::AlreadyStarted),
        }
    }

    /// Stop the oscillator. Idempotent failures surface as `NodeError` so
    /// teardown sites can swallow them explicitly.
    pub fn stop(&mut self) -> Result<(), NodeError> {
        match self.state {
            OscState::Created => Err(NodeError::NotStarted),
            OscState::Started => {
                self.state = OscState::Stopped;
                Ok(())
            }
            OscState::Stopped => Err(NodeError::AlreadyStopped),
        }
    }

    /// Detach from the graph. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_running(&self) -> bool {
        self.state == OscState::Started
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Stereo pan control handle, -1 (left) to +1 (right).
#[derive(Debug)]
pub struct PanNode {
    pub pan: RampParam,
    connected: bool,
}

impl PanNode {
    pub fn new(pan: f32) -> Self {
        Self {
            pan: RampParam::new(pan.clamp(-1.0, 1.0)),
            connected: true,
        }
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Biquad-style filter responses supported by the voice filter.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Filter control handle: response type, cutoff frequency (Hz), resonance Q.
#[derive(Debug)]
pub struct FilterNode {
    pub filter_type: FilterType,
    pub frequency: RampParam,
    pub q: RampParam,
    connected: bool,
}

impl FilterNode {
    pub fn new(filter_type: FilterType, cutoff_hz: f32, q: f32) -> Self {
        Self {
            filter_type,
            frequency: RampParam::new(cutoff_hz),
            q: RampParam::new(q),
            connected: true,
        }
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Gain control handle. The per-note envelope lives entirely on this node's
/// `gain` schedule.
#[derive(Debug)]
pub struct GainNode {
    pub gain: RampParam,
    connected: bool,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: RampParam::new(gain),
            connected: true,
        }
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}
