/*
ADSR Envelope Parameters
========================

This synthesizer schedules its envelopes as linear ramps on the audio
graph's gain parameter (see `synth::voice`), so the envelope itself is pure
data: four numbers describing the shape.

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
        Attack Decay  Sustain  Release
         (A)   (D)      (S)      (R)

Attack, decay and release are durations in seconds; sustain is a level in
[0, 1]. The durations come from continuously-dragged UI controls that can
transiently pass through invalid values, so they are clamped rather than
rejected. The floors matter: a zero-duration ramp is rejected by some audio
back-ends and produces an audible click on the rest.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum attack/decay duration (5 ms).
pub const MIN_STAGE_TIME: f32 = 0.005;
/// Minimum release duration (10 ms).
pub const MIN_RELEASE_TIME: f32 = 0.01;

/// ADSR envelope shape. Valid by construction: every constructor and setter
/// clamps, so a `Adsr` can always be scheduled as-is.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
}

impl Adsr {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.max(MIN_STAGE_TIME),
            decay: decay.max(MIN_STAGE_TIME),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(MIN_RELEASE_TIME),
        }
    }

    /// Attack duration in seconds.
    pub fn attack(&self) -> f32 {
        self.attack
    }

    /// Decay duration in seconds.
    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Sustain level in [0, 1].
    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// Release duration in seconds.
    pub fn release(&self) -> f32 {
        self.release
    }

    pub fn set_attack(&mut self, seconds: f32) {
        self.attack = seconds.max(MIN_STAGE_TIME);
    }

    pub fn set_decay(&mut self, seconds: f32) {
        self.decay = seconds.max(MIN_STAGE_TIME);
    }

    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level.clamp(0.0, 1.0);
    }

    pub fn set_release(&mut self, seconds: f32) {
        self.release = seconds.max(MIN_RELEASE_TIME);
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new(0.05, 0.12, 0.7, 0.3)
    }
}
