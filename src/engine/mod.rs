//! Engine orchestration: voices, LFO banks, master gain, and the per-frame
//! modulation tick.
//!
//! Everything here runs on a single cooperative control thread driven by a
//! display-refresh callback (~60 Hz). The platform audio thread consumes
//! the parameter schedules asynchronously; nothing in this module blocks.

mod combiner;

use tracing::debug;

use crate::{
    dsp::Lfo,
    graph::GainNode,
    synth::{MessageReceiver, SynthMessage, Voice},
    DEFAULT_VOICES, LFO_SLOTS,
};

pub use combiner::{DETUNE_MOD_CENTS, FILTER_MOD_OCTAVES};

/// How often parameter histories are compacted, in seconds.
const GC_INTERVAL: f64 = 1.0;
/// How much schedule history to retain behind `now` when compacting.
const GC_HORIZON: f64 = 2.0;

/// The synthesizer core: N oscillator voices (2 in the default layout),
/// a bank of LFO slots per voice, and a master gain stage.
pub struct SynthEngine {
    voices: Vec<Voice>,
    lfo_banks: Vec<Vec<Lfo>>,
    master: GainNode,
    master_volume: f32,
    modulated_master: f32,
    last_gc: f64,
}

impl SynthEngine {
    /// Dual-oscillator layout: 2 voices × 4 LFO slots.
    pub fn new() -> Self {
        Self::with_layout(DEFAULT_VOICES, LFO_SLOTS)
    }

    pub fn with_layout(voice_count: usize, lfo_slots: usize) -> Self {
        let voices = (0..voice_count).map(|_| Voice::new()).collect();
        let lfo_banks = (0..voice_count)
            .map(|_| (0..lfo_slots).map(|_| Lfo::new()).collect())
            .collect();
        Self {
            voices,
            lfo_banks,
            master: GainNode::new(0.7),
            master_volume: 0.7,
            modulated_master: 0.7,
            last_gc: 0.0,
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn voice_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.voices.get_mut(index)
    }

    pub fn lfo(&self, voice: usize, slot: usize) -> Option<&Lfo> {
        self.lfo_banks.get(voice)?.get(slot)
    }

    pub fn lfo_mut(&mut self, voice: usize, slot: usize) -> Option<&mut Lfo> {
        self.lfo_banks.get_mut(voice)?.get_mut(slot)
    }

    pub fn lfo_banks(&self) -> &[Vec<Lfo>] {
        &self.lfo_banks
    }

    /// The user-set base master volume.
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f32, now: f64) {
        self.master_volume = volume.clamp(0.0, 1.0);
        self.master.gain.set_value_at(self.master_volume, now);
    }

    /// The master volume after modulation, recomputed by the last `tick` -
    /// this is what a master-volume knob should display.
    pub fn modulated_master_volume(&self) -> f32 {
        self.modulated_master
    }

    pub fn master_gain(&self) -> &GainNode {
        &self.master
    }

    /// Fan a note-on out to every voice. Voices that actually trigger get
    /// their one-shot LFOs re-armed so the cliff plays again per note.
    pub fn note_on(&mut self, freq: f32, now: f64) {
        for (voice, bank) in self.voices.iter_mut().zip(self.lfo_banks.iter_mut()) {
            if voice.note_on(freq, now) {
                for lfo in bank.iter_mut() {
                    if lfo.one_shot {
                        lfo.reset();
                    }
                }
            }
        }
    }

    pub fn note_off(&mut self, freq: f32, now: f64) {
        for voice in &mut self.voices {
            voice.note_off(freq, now);
        }
    }

    pub fn all_notes_off(&mut self, now: f64) {
        let released: Vec<(usize, f32)> = self
            .voices
            .iter()
            .enumerate()
            .flat_map(|(i, v)| {
                v.active_notes()
                    .iter()
                    .filter(|n| v.is_sounding(n.freq))
                    .map(move |n| (i, n.freq))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (i, freq) in released {
            self.voices[i].note_off(freq, now);
        }
        debug!("all notes off");
    }

    /// Drain pending note events from an input queue. Called once per frame
    /// before `tick`.
    pub fn drain_messages<R: MessageReceiver>(&mut self, rx: &mut R, now: f64) {
        while let Some(msg) = rx.pop() {
            match msg {
                SynthMessage::NoteOn { freq } => self.note_on(freq, now),
                SynthMessage::NoteOff { freq } => self.note_off(freq, now),
                SynthMessage::AllNotesOff => self.all_notes_off(now),
            }
        }
    }

    /// One control frame: combine LFO modulation into live parameters,
    /// write the modulated master volume, advance note lifecycles, and
    /// periodically compact parameter histories.
    pub fn tick(&mut self, now: f64) {
        self.modulated_master = combiner::run_frame(
            now,
            &mut self.voices,
            &mut self.lfo_banks,
            self.master_volume,
        );
        self.master.gain.set_value_at(self.modulated_master, now);

        for voice in &mut self.voices {
            voice.advance(now);
        }

        if now - self.last_gc >= GC_INTERVAL {
            let horizon = now - GC_HORIZON;
            for voice in &mut self.voices {
                voice.gc_params(horizon);
            }
            self.master.gain.gc(horizon);
            self.last_gc = now;
        }
    }
}

impl Default for SynthEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{ModTarget, Waveform};
    use approx::assert_relative_eq;
    use std::collections::VecDeque;

    const FRAME: f64 = 1.0 / 60.0;

    #[test]
    fn default_layout_is_two_voices_four_slots() {
        let engine = SynthEngine::new();
        assert_eq!(engine.voices().len(), 2);
        assert_eq!(engine.lfo_banks()[0].len(), 4);
        assert_eq!(engine.lfo_banks()[1].len(), 4);
    }

    #[test]
    fn note_events_fan_out_to_all_voices() {
        let mut engine = SynthEngine::new();
        engine.note_on(440.0, 0.0);
        assert!(engine.voice(0).unwrap().is_sounding(440.0));
        assert!(engine.voice(1).unwrap().is_sounding(440.0));
        engine.note_off(440.0, 1.0);
        assert!(!engine.voice(0).unwrap().is_sounding(440.0));
        assert!(!engine.voice(1).unwrap().is_sounding(440.0));
    }

    #[test]
    fn disabled_voice_does_not_retrigger_its_one_shots() {
        let mut engine = SynthEngine::new();
        engine.voice_mut(1).unwrap().set_enabled(false, 0.0);
        for voice in 0..2 {
            let lfo = engine.lfo_mut(voice, 0).unwrap();
            lfo.one_shot = true;
            lfo.waveform = Waveform::Square;
            lfo.depth = 1.0;
            lfo.rate = 1.0;
            // Exhaust the one-shot cycle.
            let _ = lfo.value(0.0);
            let _ = lfo.value(2.0);
        }

        engine.note_on(440.0, 3.0);
        // Voice 0 triggered → its LFO was re-armed and runs again.
        assert!(engine.lfo_mut(0, 0).unwrap().value(3.0).abs() > 0.0);
        // Voice 1 is disabled → its LFO stays in the stopped state.
        assert_eq!(engine.lfo_mut(1, 0).unwrap().value(3.0), 0.0);
    }

    #[test]
    fn tick_mirrors_modulated_master_volume() {
        let mut engine = SynthEngine::new();
        engine.set_master_volume(0.5, 0.0);
        let lfo = engine.lfo_mut(0, 0).unwrap();
        lfo.waveform = Waveform::Square;
        lfo.depth = 0.5;
        lfo.rate = 0.25;
        lfo.add_target(ModTarget::MasterVolume);

        engine.tick(0.0);
        // Square at +1, depth 0.5 → 0.5 * 1.5
        assert_relative_eq!(engine.modulated_master_volume(), 0.75);
        assert_relative_eq!(engine.master_gain().gain.value_at(0.0), 0.75);
        // Base is never touched.
        assert_relative_eq!(engine.master_volume(), 0.5);
    }

    #[test]
    fn modulation_lets_go_when_target_removed() {
        let mut engine = SynthEngine::new();
        engine.note_on(440.0, 0.0);
        let lfo = engine.lfo_mut(0, 0).unwrap();
        lfo.waveform = Waveform::Square;
        lfo.depth = 1.0;
        lfo.rate = 0.25;
        lfo.add_target(ModTarget::Filter);

        engine.tick(0.0);
        let live = engine.voice(0).unwrap().active_notes()[0]
            .filter
            .frequency
            .value_at(0.0);
        assert!(live > 2_000.0);

        engine.lfo_mut(0, 0).unwrap().remove_target(ModTarget::Filter);
        engine.tick(FRAME);
        let live = engine.voice(0).unwrap().active_notes()[0]
            .filter
            .frequency
            .value_at(FRAME);
        assert_relative_eq!(live, 2_000.0);
    }

    #[test]
    fn tick_does_not_reamplify_disabled_voice() {
        let mut engine = SynthEngine::new();
        engine.note_on(440.0, 0.0);
        engine.tick(1.0);

        engine.voice_mut(0).unwrap().set_enabled(false, 1.0);
        let gain_at = |engine: &SynthEngine, t: f64| {
            engine.voice(0).unwrap().active_notes()[0].gain.gain.value_at(t)
        };
        assert_relative_eq!(gain_at(&engine, 1.0), 0.0);

        // Held notes must stay silent through subsequent frames.
        for i in 1..=10 {
            let now = 1.0 + i as f64 * FRAME;
            engine.tick(now);
            assert_relative_eq!(gain_at(&engine, now), 0.0);
        }
    }

    #[test]
    fn tick_reaps_released_notes() {
        let mut engine = SynthEngine::new();
        engine.note_on(440.0, 0.0);
        engine.note_off(440.0, 1.0);
        // Default release 0.3 + 0.1 grace.
        engine.tick(1.3);
        assert_eq!(engine.voice(0).unwrap().active_notes().len(), 1);
        engine.tick(1.45);
        assert_eq!(engine.voice(0).unwrap().active_notes().len(), 0);
        assert_eq!(engine.voice(1).unwrap().active_notes().len(), 0);
    }

    #[test]
    fn drain_messages_processes_note_events() {
        let mut engine = SynthEngine::new();
        let mut queue: VecDeque<SynthMessage> = VecDeque::new();
        queue.push_back(SynthMessage::NoteOn { freq: 440.0 });
        queue.push_back(SynthMessage::NoteOn { freq: 660.0 });
        queue.push_back(SynthMessage::NoteOff { freq: 440.0 });

        engine.drain_messages(&mut queue, 0.0);
        assert!(!engine.voice(0).unwrap().is_sounding(440.0));
        assert!(engine.voice(0).unwrap().is_sounding(660.0));

        queue.push_back(SynthMessage::AllNotesOff);
        engine.drain_messages(&mut queue, 1.0);
        assert!(!engine.voice(0).unwrap().is_sounding(660.0));
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn drain_messages_from_ring_buffer() {
        let (mut tx, mut rx) = rtrb::RingBuffer::<SynthMessage>::new(16);
        tx.push(SynthMessage::NoteOn { freq: 440.0 }).unwrap();

        let mut engine = SynthEngine::new();
        engine.drain_messages(&mut rx, 0.0);
        assert!(engine.voice(0).unwrap().is_sounding(440.0));
    }

    #[test]
    fn long_session_gc_keeps_modulation_exact() {
        let mut engine = SynthEngine::new();
        engine.note_on(440.0, 0.0);
        let lfo = engine.lfo_mut(0, 0).unwrap();
        lfo.depth = 1.0;
        lfo.rate = 2.0;
        lfo.add_target(ModTarget::Filter);

        // Run a minute of frames; gc fires along the way.
        let mut now = 0.0;
        for _ in 0..3_600 {
            now += FRAME;
            engine.tick(now);
        }
        // Modulated cutoff still bounded by base * 2^±3.
        let live = engine.voice(0).unwrap().active_notes()[0]
            .filter
            .frequency
            .value_at(now);
        assert!(live >= 2_000.0 / 8.0 - 1.0 && live <= 2_000.0 * 8.0 + 1.0);
    }
}
