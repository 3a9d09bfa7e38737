//! Whole-synth parameter snapshots.
//!
//! A [`Patch`] is the explicit base-parameter store: the UI and preset
//! layers read and write patches, the engine applies them through the
//! normal clamping setters. This keeps "what the user set" (the patch /
//! voice base values) strictly separate from "what is currently audible"
//! (the live, possibly modulated parameters) - the combiner only ever
//! writes the latter.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    dsp::{Adsr, ModTarget, SyncDivision, Waveform},
    engine::SynthEngine,
    graph::FilterType,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch has {found} voice layers, engine has {expected}")]
    VoiceCountMismatch { expected: usize, found: usize },
    #[error("patch has {found} LFO slots for voice {voice}, engine has {expected}")]
    LfoSlotMismatch {
        voice: usize,
        expected: usize,
        found: usize,
    },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Patch {
    pub name: String,
    pub master_volume: f32,
    pub voices: Vec<VoicePatch>,
    /// One bank of LFO slots per voice, same shape as the engine layout.
    pub lfos: Vec<Vec<LfoPatch>>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct VoicePatch {
    pub enabled: bool,
    pub waveform: Waveform,
    pub volume: f32,
    pub detune: f32,
    pub adsr: Adsr,
    pub filter_type: FilterType,
    pub filter_enabled: bool,
    pub cutoff: f32,
    pub resonance: f32,
    pub unison_count: usize,
    pub unison_detune: f32,
    pub unison_spread: f32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct LfoPatch {
    pub waveform: Waveform,
    pub rate: f64,
    pub bpm_sync: bool,
    pub bpm: f64,
    pub sync_division: SyncDivision,
    pub phase_deg: f64,
    pub delay: f64,
    pub fade_in: f64,
    pub one_shot: bool,
    pub depth: f64,
    pub targets: Vec<ModTarget>,
}

impl Patch {
    /// Snapshot the engine's current base parameters.
    pub fn capture(name: impl Into<String>, engine: &SynthEngine) -> Self {
        let voices = engine
            .voices()
            .iter()
            .map(|v| VoicePatch {
                enabled: v.enabled(),
                waveform: v.waveform(),
                volume: v.volume(),
                detune: v.detune(),
                adsr: v.adsr(),
                filter_type: v.filter_type(),
                filter_enabled: v.filter_enabled(),
                cutoff: v.cutoff(),
                resonance: v.resonance(),
                unison_count: v.unison_count(),
                unison_detune: v.unison_detune(),
                unison_spread: v.unison_spread(),
            })
            .collect();
        let lfos = engine
            .lfo_banks()
            .iter()
            .map(|bank| {
                bank.iter()
                    .map(|lfo| LfoPatch {
                        waveform: lfo.waveform,
                        rate: lfo.rate,
                        bpm_sync: lfo.bpm_sync,
                        bpm: lfo.bpm,
                        sync_division: lfo.sync_division,
                        phase_deg: lfo.phase_deg,
                        delay: lfo.delay,
                        fade_in: lfo.fade_in,
                        one_shot: lfo.one_shot,
                        depth: lfo.depth,
                        targets: lfo.targets().collect(),
                    })
                    .collect()
            })
            .collect();
        Self {
            name: name.into(),
            master_volume: engine.master_volume(),
            voices,
            lfos,
        }
    }

    /// Apply every parameter to the engine through its clamping setters, so
    /// live notes pick the values up without retriggering. The patch shape
    /// must match the engine layout.
    pub fn apply(&self, engine: &mut SynthEngine, now: f64) -> Result<(), PatchError> {
        if self.voices.len() != engine.voices().len() {
            return Err(PatchError::VoiceCountMismatch {
                expected: engine.voices().len(),
                found: self.voices.len(),
            });
        }
        for (i, bank) in self.lfos.iter().enumerate() {
            let expected = engine.lfo_banks().get(i).map_or(0, Vec::len);
            if bank.len() != expected {
                return Err(PatchError::LfoSlotMismatch {
                    voice: i,
                    expected,
                    found: bank.len(),
                });
            }
        }

        engine.set_master_volume(self.master_volume, now);

        for (i, vp) in self.voices.iter().enumerate() {
            let Some(voice) = engine.voice_mut(i) else {
                continue;
            };
            voice.set_enabled(vp.enabled, now);
            voice.set_waveform(vp.waveform);
            voice.set_volume(vp.volume, now);
            voice.set_detune(vp.detune, now);
            voice.set_adsr(vp.adsr);
            voice.set_filter_type(vp.filter_type);
            voice.set_filter_enabled(vp.filter_enabled, now);
            voice.set_filter_cutoff(vp.cutoff, now);
            voice.set_filter_resonance(vp.resonance, now);
            voice.set_unison_detune(vp.unison_detune, now);
            voice.set_unison_spread(vp.unison_spread, now);
            if vp.unison_count != voice.unison_count() {
                voice.set_unison_count(vp.unison_count, now);
            }
        }

        for (i, bank) in self.lfos.iter().enumerate() {
            for (j, lp) in bank.iter().enumerate() {
                let Some(lfo) = engine.lfo_mut(i, j) else {
                    continue;
                };
                lfo.waveform = lp.waveform;
                lfo.rate = lp.rate;
                lfo.bpm_sync = lp.bpm_sync;
                lfo.bpm = lp.bpm;
                lfo.sync_division = lp.sync_division;
                lfo.phase_deg = lp.phase_deg;
                lfo.delay = lp.delay;
                lfo.fade_in = lp.fade_in;
                lfo.one_shot = lp.one_shot;
                lfo.depth = lp.depth;
                lfo.clear_targets();
                for &target in &lp.targets {
                    lfo.add_target(target);
                }
            }
        }
        Ok(())
    }
}
