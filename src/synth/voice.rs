use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    dsp::{Adsr, Waveform},
    graph::{FilterNode, FilterType, GainNode, OscNode, PanNode, RampParam},
    synth::note::{
        scaled_volume, unison_detune_offset, unison_pan, ActiveNote, NoteId, NoteStage, Routing,
        UnisonUnit,
    },
    TEARDOWN_GRACE,
};

pub const MIN_CUTOFF_HZ: f32 = 10.0;
pub const MAX_CUTOFF_HZ: f32 = 20_000.0;
pub const MIN_RESONANCE: f32 = 0.0001;
pub const MAX_RESONANCE: f32 = 30.0;
pub const MAX_DETUNE_CENTS: f32 = 4_800.0;
pub const MAX_UNISON_DETUNE_CENTS: f32 = 1_200.0;
pub const MAX_UNISON: usize = 16;

/*
Oscillator Voice
================

One Voice is one oscillator section of the synth: a set of base parameters
the UI owns, plus the live notes currently sounding through it. Each note
carries its own unison oscillator stack, shared filter, and gain node; the
envelope is scheduled onto the gain node as linear ramps at note-on/off.

Two classes of writer touch the live nodes:

  setters              update the stored base value AND push it to every
                       sounding note, without retriggering envelopes
  apply_modulated_*    write live parameters ONLY, leaving the base alone,
                       so per-frame modulation can never drift the base

Notes are keyed by monotonic NoteId. A separate sounding-frequency index
enforces at-most-one-note-per-pitch: retriggering a sounding frequency
releases the old note (which keeps ringing through its release tail) and
attacks a fresh one. Released notes are torn down by the reap tick once
their release deadline plus a grace period has passed - never by timers.
*/

pub struct Voice {
    enabled: bool,
    waveform: Waveform,
    volume: f32,
    detune: f32,
    adsr: Adsr,
    filter_type: FilterType,
    filter_enabled: bool,
    cutoff: f32,
    resonance: f32,
    unison_count: usize,
    unison_detune: f32,
    unison_spread: f32,

    notes: Vec<ActiveNote>,
    /// freq bits → sounding note id. Removed on note-off, so a rapid
    /// retrigger of the same pitch is free to allocate a new note while the
    /// old one rings out.
    sounding: HashMap<u32, NoteId>,
    next_note_id: u64,

    /// Invoked after every successful note-on; the engine uses it to re-arm
    /// one-shot LFOs routed to this voice.
    pub on_note_on: Option<Box<dyn FnMut(f32) + Send>>,
}

impl Voice {
    pub fn new() -> Self {
        Self {
            enabled: true,
            waveform: Waveform::Sawtooth,
            volume: 0.5,
            detune: 0.0,
            adsr: Adsr::default(),
            filter_type: FilterType::Lowpass,
            filter_enabled: true,
            cutoff: 2_000.0,
            resonance: 1.0,
            unison_count: 1,
            unison_detune: 20.0,
            unison_spread: 0.5,
            notes: Vec::new(),
            sounding: HashMap::new(),
            next_note_id: 0,
            on_note_on: None,
        }
    }

    // --- base-value reads (consumed by draw routines and the combiner) ---

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn detune(&self) -> f32 {
        self.detune
    }

    pub fn adsr(&self) -> Adsr {
        self.adsr
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    pub fn unison_count(&self) -> usize {
        self.unison_count
    }

    pub fn unison_detune(&self) -> f32 {
        self.unison_detune
    }

    pub fn unison_spread(&self) -> f32 {
        self.unison_spread
    }

    /// Live notes, including ones still ringing out their release.
    pub fn active_notes(&self) -> &[ActiveNote] {
        &self.notes
    }

    pub fn is_sounding(&self, freq: f32) -> bool {
        self.sounding.contains_key(&freq.to_bits())
    }

    // --- base-value setters: update base + push to live notes ---

    pub fn set_enabled(&mut self, enabled: bool, now: f64) {
        self.enabled = enabled;
        if !enabled {
            for note in &mut self.notes {
                note.gain.gain.set_value_at(0.0, now);
            }
        }
    }

    pub fn set_adsr(&mut self, adsr: Adsr) {
        self.adsr = adsr;
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
        for note in &mut self.notes {
            for unit in &mut note.units {
                unit.osc.waveform = waveform;
            }
        }
    }

    pub fn set_detune(&mut self, cents: f32, now: f64) {
        let cents = cents.clamp(-MAX_DETUNE_CENTS, MAX_DETUNE_CENTS);
        self.detune = cents;
        for note in &mut self.notes {
            let n = note.units.len();
            for (i, unit) in note.units.iter_mut().enumerate() {
                let offset = unison_detune_offset(self.unison_detune, i, n);
                unit.osc.detune.set_value_at(cents + offset, now);
            }
        }
    }

    /// Change the voice volume without retriggering or jumping the envelope:
    /// the note's position within the envelope is captured as
    /// `current_gain / old_scaled` and reapplied against the new volume.
    pub fn set_volume(&mut self, volume: f32, now: f64) {
        let volume = volume.clamp(0.0, 1.0);
        let old = self.volume;
        self.volume = volume;
        for note in &mut self.notes {
            let n = note.units.len();
            let old_scaled = scaled_volume(old, n);
            let new_scaled = scaled_volume(volume, n);
            let current = note.gain.gain.value_at(now);
            note.gain.gain.cancel_scheduled(now);
            if old_scaled > 0.0 {
                note.env_ratio = current / old_scaled;
            }
            note.gain.gain.set_value_at(new_scaled * note.env_ratio, now);
        }
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
        for note in &mut self.notes {
            note.filter.filter_type = filter_type;
        }
    }

    /// Rewire every note's signal path. Atomic from the caller's
    /// perspective: routing is a single field flip per note, the envelope
    /// keeps running.
    pub fn set_filter_enabled(&mut self, enabled: bool, now: f64) {
        self.filter_enabled = enabled;
        let routing = if enabled {
            Routing::ThroughFilter
        } else {
            Routing::Bypass
        };
        for note in &mut self.notes {
            note.routing = routing;
            if enabled {
                // The filter may have drifted while bypassed; restore base
                // parameters as it re-enters the path.
                note.filter.frequency.set_value_at(self.cutoff, now);
                note.filter.q.set_value_at(self.resonance, now);
            }
        }
    }

    pub fn set_filter_cutoff(&mut self, cutoff_hz: f32, now: f64) {
        let hz = cutoff_hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);
        self.cutoff = hz;
        for note in &mut self.notes {
            note.filter.frequency.set_value_at(hz, now);
        }
    }

    pub fn set_filter_resonance(&mut self, q: f32, now: f64) {
        let q = q.clamp(MIN_RESONANCE, MAX_RESONANCE);
        self.resonance = q;
        for note in &mut self.notes {
            note.filter.q.set_value_at(q, now);
        }
    }

    pub fn set_unison_detune(&mut self, cents: f32, now: f64) {
        let cents = cents.clamp(0.0, MAX_UNISON_DETUNE_CENTS);
        self.unison_detune = cents;
        for note in &mut self.notes {
            let n = note.units.len();
            for (i, unit) in note.units.iter_mut().enumerate() {
                let offset = unison_detune_offset(cents, i, n);
                unit.osc.detune.set_value_at(self.detune + offset, now);
            }
        }
    }

    pub fn set_unison_spread(&mut self, spread: f32, now: f64) {
        let spread = spread.clamp(0.0, 1.0);
        self.unison_spread = spread;
        for note in &mut self.notes {
            let n = note.units.len();
            for (i, unit) in note.units.iter_mut().enumerate() {
                unit.pan.pan.set_value_at(unison_pan(spread, i, n), now);
            }
        }
    }

    /// Unison units cannot be added or removed live; every sounding note is
    /// rebuilt with fresh oscillators. The filter and gain node are reused
    /// and the gain rescaled by `new_scaled / old_scaled` (via the captured
    /// envelope ratio) so apparent loudness is continuous through the
    /// count change.
    pub fn set_unison_count(&mut self, count: usize, now: f64) {
        let count = count.clamp(1, MAX_UNISON);
        self.unison_count = count;

        let waveform = self.waveform;
        let detune = self.detune;
        let unison_detune = self.unison_detune;
        let unison_spread = self.unison_spread;
        let volume = self.volume;
        let filter_type = self.filter_type;
        let cutoff = self.cutoff;
        let resonance = self.resonance;
        let routing = if self.filter_enabled {
            Routing::ThroughFilter
        } else {
            Routing::Bypass
        };

        for note in &mut self.notes {
            let old_n = note.units.len();
            let current = note.gain.gain.value_at(now);
            let old_scaled = scaled_volume(volume, old_n);
            let ratio = if old_scaled > 0.0 {
                current / old_scaled
            } else {
                0.0
            };

            for unit in &mut note.units {
                if let Err(err) = unit.osc.stop() {
                    trace!(?err, "stale oscillator during unison rebuild");
                }
                unit.osc.disconnect();
                unit.pan.disconnect();
            }

            note.filter.filter_type = filter_type;
            note.filter.frequency.set_value_at(cutoff, now);
            note.filter.q.set_value_at(resonance, now);

            note.gain.gain.cancel_scheduled(now);
            note.gain
                .gain
                .set_value_at(scaled_volume(volume, count) * ratio, now);
            note.env_ratio = ratio;

            note.units = build_units(
                waveform,
                note.freq,
                detune,
                unison_detune,
                unison_spread,
                count,
                now,
            );
            note.routing = routing;
            debug!(note = note.id.0, old_n, new_n = count, "rebuilt unison stack");
        }
    }

    // --- note events ---

    /// Start a note at `freq` Hz. If the frequency is already sounding it is
    /// released first (implicit release-then-attack). Returns whether a note
    /// was actually triggered; a disabled voice no-ops.
    pub fn note_on(&mut self, freq: f32, now: f64) -> bool {
        if !self.enabled {
            return false;
        }
        if self.sounding.contains_key(&freq.to_bits()) {
            self.note_off(freq, now);
        }

        let n = self.unison_count;
        let id = NoteId(self.next_note_id);
        self.next_note_id += 1;

        let filter = FilterNode::new(self.filter_type, self.cutoff, self.resonance);
        let mut gain = GainNode::new(0.0);
        let scaled = scaled_volume(self.volume, n);
        let attack = self.adsr.attack() as f64;
        let decay = self.adsr.decay() as f64;
        let sustain = self.adsr.sustain();

        gain.gain.set_value_at(0.0, now);
        gain.gain.linear_ramp_to(scaled, now + attack);
        gain.gain.linear_ramp_to(scaled * sustain, now + attack + decay);

        // Normalized shadow of the same schedule; tracks envelope position
        // independently of volume and unison edits.
        let mut envelope = RampParam::new(0.0);
        envelope.set_value_at(0.0, now);
        envelope.linear_ramp_to(1.0, now + attack);
        envelope.linear_ramp_to(sustain, now + attack + decay);

        let units = build_units(
            self.waveform,
            freq,
            self.detune,
            self.unison_detune,
            self.unison_spread,
            n,
            now,
        );

        self.notes.push(ActiveNote {
            id,
            freq,
            units,
            filter,
            gain,
            envelope,
            routing: if self.filter_enabled {
                Routing::ThroughFilter
            } else {
                Routing::Bypass
            },
            stage: NoteStage::Attacking,
            sustain_at: now + attack + decay,
            release_deadline: None,
            env_ratio: 1.0,
        });
        self.sounding.insert(freq.to_bits(), id);
        debug!(note = id.0, freq, unison = n, "note on");

        if let Some(cb) = self.on_note_on.as_mut() {
            cb(freq);
        }
        true
    }

    /// Release the note at `freq`. Unknown frequencies are a no-op -
    /// duplicate releases from overlapping input devices are expected.
    pub fn note_off(&mut self, freq: f32, now: f64) {
        let Some(id) = self.sounding.remove(&freq.to_bits()) else {
            return;
        };
        let release = if self.enabled {
            self.adsr.release() as f64
        } else {
            0.0
        };
        if let Some(note) = self.notes.iter_mut().find(|n| n.id == id) {
            // Cancel pending attack/decay points before scheduling the
            // release, or the ramps stack and glitch.
            note.gain.gain.cancel_scheduled(now);
            note.gain.gain.linear_ramp_to(0.0, now + release);
            note.envelope.cancel_scheduled(now);
            note.envelope.linear_ramp_to(0.0, now + release);
            note.stage = NoteStage::Releasing;
            note.release_deadline = Some(now + release + TEARDOWN_GRACE);
            debug!(note = id.0, freq, release, "note off");
        }
    }

    // --- per-frame modulation writes: live parameters only, never base ---

    /// Write a modulated cutoff to every live filter. The stored base cutoff
    /// is untouched, so repeated per-frame calls can never drift it.
    pub fn apply_modulated_cutoff(&mut self, cutoff_hz: f32, now: f64) {
        let hz = cutoff_hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);
        for note in &mut self.notes {
            note.filter.frequency.set_value_at(hz, now);
        }
    }

    /// Write a modulated voice volume. The live gain is recomputed from the
    /// normalized envelope shadow, not from the previous live gain, so
    /// frame-over-frame application cannot compound.
    pub fn apply_modulated_volume(&mut self, volume: f32, now: f64) {
        let volume = volume.clamp(0.0, 1.0);
        for note in &mut self.notes {
            let n = note.units.len();
            let env = note.envelope.value_at(now);
            note.gain
                .gain
                .set_value_at(scaled_volume(volume, n) * env, now);
        }
    }

    /// Write modulated voice detune and unison detune together. Both land on
    /// the same per-oscillator detune parameter, so they are combined here
    /// rather than fighting over the last write.
    pub fn apply_modulated_detune(
        &mut self,
        detune_cents: f32,
        unison_detune_cents: f32,
        now: f64,
    ) {
        let det = detune_cents.clamp(-MAX_DETUNE_CENTS, MAX_DETUNE_CENTS);
        let uni = unison_detune_cents.clamp(0.0, MAX_UNISON_DETUNE_CENTS);
        for note in &mut self.notes {
            let n = note.units.len();
            for (i, unit) in note.units.iter_mut().enumerate() {
                let offset = unison_detune_offset(uni, i, n);
                unit.osc.detune.set_value_at(det + offset, now);
            }
        }
    }

    /// Write a modulated stereo spread to every live pan stage.
    pub fn apply_modulated_spread(&mut self, spread: f32, now: f64) {
        let spread = spread.clamp(0.0, 1.0);
        for note in &mut self.notes {
            let n = note.units.len();
            for (i, unit) in note.units.iter_mut().enumerate() {
                unit.pan.pan.set_value_at(unison_pan(spread, i, n), now);
            }
        }
    }

    // --- lifecycle tick ---

    /// Advance note stages and reap notes whose release deadline has passed.
    /// Teardown tolerates nodes an earlier event already stopped.
    pub fn advance(&mut self, now: f64) {
        for note in &mut self.notes {
            if note.stage == NoteStage::Attacking && now >= note.sustain_at {
                note.stage = NoteStage::Sustaining;
            }
        }
        self.notes.retain_mut(|note| match note.release_deadline {
            Some(deadline) if now >= deadline => {
                for unit in &mut note.units {
                    if let Err(err) = unit.osc.stop() {
                        trace!(?err, "stale oscillator during reap");
                    }
                    unit.osc.disconnect();
                    unit.pan.disconnect();
                }
                note.filter.disconnect();
                note.gain.disconnect();
                note.stage = NoteStage::Freed;
                debug!(note = note.id.0, "reaped released note");
                false
            }
            _ => true,
        });
    }

    /// Compact parameter histories older than `horizon`.
    pub fn gc_params(&mut self, horizon: f64) {
        for note in &mut self.notes {
            note.gain.gain.gc(horizon);
            note.envelope.gc(horizon);
            note.filter.frequency.gc(horizon);
            note.filter.q.gc(horizon);
            for unit in &mut note.units {
                unit.osc.frequency.gc(horizon);
                unit.osc.detune.gc(horizon);
                unit.pan.pan.gc(horizon);
            }
        }
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}

fn build_units(
    waveform: Waveform,
    freq: f32,
    detune: f32,
    unison_detune: f32,
    unison_spread: f32,
    count: usize,
    now: f64,
) -> Vec<UnisonUnit> {
    (0..count)
        .map(|i| {
            let offset = unison_detune_offset(unison_detune, i, count);
            let pan = unison_pan(unison_spread, i, count);
            let mut osc = OscNode::new(waveform, freq, detune + offset);
            // A fresh node cannot already be started; safe by construction.
            let _ = osc.start(now);
            UnisonUnit {
                osc,
                pan: PanNode::new(pan),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sustained_voice(volume: f32, unison: usize, now: f64) -> Voice {
        let mut voice = Voice::new();
        voice.set_volume(volume, 0.0);
        voice.set_unison_count(unison, 0.0);
        assert!(voice.note_on(440.0, now));
        voice
    }

    #[test]
    fn note_on_schedules_attack_and_decay() {
        let mut voice = Voice::new();
        voice.set_adsr(Adsr::new(0.1, 0.2, 0.5, 0.3));
        voice.set_volume(0.8, 0.0);
        voice.note_on(440.0, 0.0);

        let note = &voice.active_notes()[0];
        assert_eq!(note.stage, NoteStage::Attacking);
        assert_relative_eq!(note.gain.gain.value_at(0.0), 0.0);
        assert_relative_eq!(note.gain.gain.value_at(0.05), 0.4, epsilon = 1e-6);
        assert_relative_eq!(note.gain.gain.value_at(0.1), 0.8, epsilon = 1e-6);
        // Decay toward sustain: 0.8 → 0.4 over 0.2s
        assert_relative_eq!(note.gain.gain.value_at(0.3), 0.4, epsilon = 1e-6);
        assert_relative_eq!(note.gain.gain.value_at(1.0), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn volume_setter_preserves_envelope_position() {
        // Default ADSR sustains at 0.7; by t=1.0 the note is fully sustained.
        let mut voice = sustained_voice(0.5, 1, 0.0);
        assert_relative_eq!(
            voice.active_notes()[0].gain.gain.value_at(1.0),
            0.5 * 0.7,
            epsilon = 1e-6
        );

        voice.set_volume(0.4, 1.0);
        // Live gain = new volume * sustain, not reset to the new volume.
        assert_relative_eq!(
            voice.active_notes()[0].gain.gain.value_at(1.0),
            0.4 * 0.7,
            epsilon = 1e-6
        );
    }

    #[test]
    fn unison_rebuild_preserves_loudness() {
        let mut voice = sustained_voice(0.8, 1, 0.0);
        let before = voice.active_notes()[0].gain.gain.value_at(1.0);

        voice.set_unison_count(4, 1.0);
        let note = &voice.active_notes()[0];
        assert_eq!(note.units.len(), 4);
        let after = note.gain.gain.value_at(1.0);
        // Equal-power: gain * √N is the apparent level.
        assert_relative_eq!(after * 2.0, before, epsilon = 1e-5);
    }

    #[test]
    fn unison_rebuild_recomputes_detune_and_pan() {
        let mut voice = Voice::new();
        voice.set_unison_detune(30.0, 0.0);
        voice.set_unison_spread(1.0, 0.0);
        voice.note_on(440.0, 0.0);
        voice.set_unison_count(3, 0.5);

        let note = &voice.active_notes()[0];
        assert_relative_eq!(note.units[0].osc.detune.value_at(0.5), -30.0);
        assert_relative_eq!(note.units[1].osc.detune.value_at(0.5), 0.0);
        assert_relative_eq!(note.units[2].osc.detune.value_at(0.5), 30.0);
        assert_relative_eq!(note.units[0].pan.pan.value_at(0.5), -1.0);
        assert_relative_eq!(note.units[2].pan.pan.value_at(0.5), 1.0);
    }

    #[test]
    fn retrigger_releases_old_note_and_attacks_fresh() {
        let mut voice = sustained_voice(0.8, 2, 0.0);
        assert_eq!(voice.active_notes().len(), 1);
        let old_id = voice.active_notes()[0].id;

        voice.note_on(440.0, 1.0);
        // Old note rings out its release while the new one attacks from 0.
        assert_eq!(voice.active_notes().len(), 2);
        let old = voice.active_notes().iter().find(|n| n.id == old_id).unwrap();
        assert_eq!(old.stage, NoteStage::Releasing);
        let new = voice.active_notes().iter().find(|n| n.id != old_id).unwrap();
        assert_eq!(new.stage, NoteStage::Attacking);
        assert_relative_eq!(new.gain.gain.value_at(1.0), 0.0);

        // Reaped once release (0.3 default) plus grace has elapsed.
        voice.advance(1.0 + 0.3 + 0.05);
        assert_eq!(voice.active_notes().len(), 2);
        voice.advance(1.0 + 0.3 + 0.11);
        assert_eq!(voice.active_notes().len(), 1);
        assert!(voice.is_sounding(440.0));
    }

    #[test]
    fn note_off_for_untracked_frequency_is_a_noop() {
        let mut voice = Voice::new();
        voice.note_off(123.0, 0.0);
        voice.note_on(440.0, 0.0);
        voice.note_off(441.0, 1.0);
        assert!(voice.is_sounding(440.0));
        // Duplicate release of an already-released note is also fine.
        voice.note_off(440.0, 1.0);
        voice.note_off(440.0, 1.1);
    }

    #[test]
    fn disabled_voice_ignores_note_on_and_silences_live_notes() {
        let mut voice = Voice::new();
        voice.note_on(440.0, 0.0);
        voice.set_enabled(false, 1.0);
        assert_relative_eq!(voice.active_notes()[0].gain.gain.value_at(1.0), 0.0);
        assert!(!voice.note_on(880.0, 1.0));
        assert_eq!(voice.active_notes().len(), 1);
    }

    #[test]
    fn setters_push_to_live_notes_without_retrigger() {
        let mut voice = sustained_voice(0.5, 2, 0.0);
        voice.set_filter_cutoff(900.0, 1.0);
        voice.set_filter_resonance(4.0, 1.0);
        voice.set_detune(10.0, 1.0);
        voice.set_waveform(Waveform::Square);

        let note = &voice.active_notes()[0];
        assert_relative_eq!(note.filter.frequency.value_at(1.0), 900.0);
        assert_relative_eq!(note.filter.q.value_at(1.0), 4.0);
        // detune + unison offset (±20 cents default at N=2)
        assert_relative_eq!(note.units[0].osc.detune.value_at(1.0), -10.0);
        assert_relative_eq!(note.units[1].osc.detune.value_at(1.0), 30.0);
        assert_eq!(note.units[0].osc.waveform, Waveform::Square);
        // No retrigger: still sitting at sustain.
        assert_eq!(note.stage, NoteStage::Attacking); // advanced lazily
    }

    #[test]
    fn filter_rewire_keeps_envelope_running() {
        let mut voice = sustained_voice(0.5, 1, 0.0);
        let before = voice.active_notes()[0].gain.gain.value_at(1.0);
        voice.set_filter_enabled(false, 1.0);
        assert_eq!(voice.active_notes()[0].routing, Routing::Bypass);
        assert_relative_eq!(voice.active_notes()[0].gain.gain.value_at(1.0), before);
        voice.set_filter_enabled(true, 1.5);
        assert_eq!(voice.active_notes()[0].routing, Routing::ThroughFilter);
    }

    #[test]
    fn modulated_cutoff_leaves_base_untouched() {
        let mut voice = sustained_voice(0.5, 1, 0.0);
        voice.set_filter_cutoff(2_000.0, 0.5);
        voice.apply_modulated_cutoff(4_000.0, 1.0);
        assert_eq!(voice.cutoff(), 2_000.0);
        assert_relative_eq!(
            voice.active_notes()[0].filter.frequency.value_at(1.0),
            4_000.0
        );
    }

    #[test]
    fn modulated_volume_recomputes_from_envelope_shadow() {
        let mut voice = sustained_voice(0.5, 1, 0.0);
        // Apply the same modulated volume many frames in a row; the result
        // must not compound.
        for frame in 0..100 {
            voice.apply_modulated_volume(0.6, 1.0 + frame as f64 / 60.0);
        }
        assert_relative_eq!(
            voice.active_notes()[0].gain.gain.value_at(3.0),
            0.6 * 0.7,
            epsilon = 1e-6
        );
    }

    #[test]
    fn stage_advances_to_sustaining() {
        let mut voice = Voice::new();
        voice.set_adsr(Adsr::new(0.05, 0.1, 0.6, 0.2));
        voice.note_on(440.0, 0.0);
        voice.advance(0.1);
        assert_eq!(voice.active_notes()[0].stage, NoteStage::Attacking);
        voice.advance(0.2);
        assert_eq!(voice.active_notes()[0].stage, NoteStage::Sustaining);
    }

    #[test]
    fn note_on_callback_fires_with_frequency() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut voice = Voice::new();
        voice.on_note_on = Some(Box::new(move |freq| sink.lock().unwrap().push(freq)));
        voice.note_on(440.0, 0.0);
        voice.note_on(660.0, 0.5);
        assert_eq!(*seen.lock().unwrap(), vec![440.0, 660.0]);
    }

    #[test]
    fn clamps_protect_against_transient_ui_values() {
        let mut voice = Voice::new();
        voice.set_filter_cutoff(-50.0, 0.0);
        assert_eq!(voice.cutoff(), MIN_CUTOFF_HZ);
        voice.set_filter_cutoff(1e9, 0.0);
        assert_eq!(voice.cutoff(), MAX_CUTOFF_HZ);
        voice.set_volume(1.5, 0.0);
        assert_eq!(voice.volume(), 1.0);
        voice.set_unison_count(0, 0.0);
        assert_eq!(voice.unison_count(), 1);
        voice.set_unison_count(99, 0.0);
        assert_eq!(voice.unison_count(), MAX_UNISON);
    }
}
