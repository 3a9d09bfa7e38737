use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::Waveform;

/*
Low Frequency Oscillator
========================

An LFO is an oscillator running at sub-audio rate (~0.01-20 Hz) whose
output modulates another parameter instead of producing sound. This one is
evaluated at control rate from the per-frame combiner, not rendered into
buffers.

Lifecycle state machine:

    Uninitialized ──first value()──→ Running ──one full cycle──→ Stopped
                                        ↑        (one_shot only)
                                        └──────── reset() ──────────┘

`start_time` is latched lazily on the first evaluation after construction
or reset(). A one-shot LFO plays exactly one cycle and then hard-drops to
zero - a deliberate cliff, not a fade. reset() re-arms it.

Evaluation order matters and is observable:

  1. latch start_time on first call
  2. stopped        → 0
  3. elapsed < delay → 0 (pre-delay silence)
  4. effective rate  = bpm-synced or free-running
  5. cycle position  = frac(active_time * rate + phase/360)
  6. one-shot cliff  = active_time * rate >= 1 → stop, return 0
  7. fade-in ramps the amplitude linearly over the first fade_in seconds
  8. waveform mapped to [-1, 1], scaled by depth and fade
*/

/// Tempo-sync division: how much musical time one LFO cycle spans.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDivision {
    #[cfg_attr(feature = "serde", serde(rename = "1/1"))]
    Whole,
    #[cfg_attr(feature = "serde", serde(rename = "1/2"))]
    Half,
    #[cfg_attr(feature = "serde", serde(rename = "1/4"))]
    Quarter,
    #[cfg_attr(feature = "serde", serde(rename = "1/8"))]
    Eighth,
    #[cfg_attr(feature = "serde", serde(rename = "1/16"))]
    Sixteenth,
}

impl SyncDivision {
    /// Beats per LFO cycle, assuming a 4/4 bar for the whole note.
    pub fn beats_per_cycle(self) -> f64 {
        match self {
            SyncDivision::Whole => 4.0,
            SyncDivision::Half => 2.0,
            SyncDivision::Quarter => 1.0,
            SyncDivision::Eighth => 0.5,
            SyncDivision::Sixteenth => 0.25,
        }
    }
}

/// A parameter an LFO's output can be routed to.
///
/// `Filter` and `MasterVolume` are the classic dual-oscillator routings;
/// the per-voice targets extend the same combiner mechanism.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModTarget {
    Filter,
    MasterVolume,
    OscVolume,
    Detune,
    UnisonDetune,
    UnisonSpread,
}

/// Control-rate modulation oscillator.
///
/// The configuration fields are public because the UI layer writes them
/// directly as the user drags controls; only the transient run state is
/// private. Changing fields mid-flight is safe - the next `value()` call
/// simply evaluates with the new settings.
pub struct Lfo {
    pub waveform: Waveform,
    /// Free-running rate in Hz. Ignored while `bpm_sync` is set.
    pub rate: f64,
    pub bpm_sync: bool,
    pub bpm: f64,
    pub sync_division: SyncDivision,
    /// Phase offset in degrees (0-360).
    pub phase_deg: f64,
    /// Seconds of silence before the LFO starts outputting.
    pub delay: f64,
    /// Seconds over which the output amplitude ramps up from zero.
    pub fade_in: f64,
    pub one_shot: bool,
    /// Output scale, 0-1.
    pub depth: f64,
    targets: HashSet<ModTarget>,
    start_time: Option<f64>,
    stopped: bool,
}

impl Lfo {
    pub fn new() -> Self {
        Self {
            waveform: Waveform::Sine,
            rate: 1.0,
            bpm_sync: false,
            bpm: 120.0,
            sync_division: SyncDivision::Quarter,
            phase_deg: 0.0,
            delay: 0.0,
            fade_in: 0.0,
            one_shot: false,
            depth: 0.5,
            targets: HashSet::new(),
            start_time: None,
            stopped: false,
        }
    }

    /// Cycles per second after accounting for tempo sync.
    pub fn effective_rate(&self) -> f64 {
        if self.bpm_sync {
            (self.bpm / 60.0) / self.sync_division.beats_per_cycle()
        } else {
            self.rate
        }
    }

    /// Evaluate the LFO at `now` (seconds on the caller's monotonic clock).
    ///
    /// The first call latches the start time; subsequent calls measure
    /// elapsed time against it. See the module comment for the exact
    /// evaluation order.
    pub fn value(&mut self, now: f64) -> f64 {
        let start = *self.start_time.get_or_insert(now);

        if self.stopped {
            return 0.0;
        }

        let elapsed = now - start;
        if elapsed < self.delay {
            return 0.0;
        }

        let active_time = elapsed - self.delay;
        let rate = self.effective_rate();
        let cycle_pos = (active_time * rate + self.phase_deg / 360.0).rem_euclid(1.0);

        if self.one_shot && active_time * rate >= 1.0 {
            self.stopped = true;
            return 0.0;
        }

        let fade = if self.fade_in > 0.0 && active_time < self.fade_in {
            active_time / self.fade_in
        } else {
            1.0
        };

        self.waveform.value_at(cycle_pos) * self.depth * fade
    }

    /// Clear the transient run state so the cycle restarts on the next
    /// `value()` call. Re-arms one-shot playback. Called on every note-on
    /// of the associated voice and whenever a new target is routed.
    pub fn reset(&mut self) {
        self.start_time = None;
        self.stopped = false;
    }

    /// Route this LFO to `target`. Resets the cycle so newly-routed
    /// modulation begins from phase zero instead of jumping in mid-cycle.
    pub fn add_target(&mut self, target: ModTarget) {
        self.targets.insert(target);
        self.reset();
    }

    pub fn remove_target(&mut self, target: ModTarget) {
        self.targets.remove(&target);
    }

    pub fn has_target(&self, target: ModTarget) -> bool {
        self.targets.contains(&target)
    }

    pub fn targets(&self) -> impl Iterator<Item = ModTarget> + '_ {
        self.targets.iter().copied()
    }

    pub fn clear_targets(&mut self) {
        self.targets.clear();
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}
