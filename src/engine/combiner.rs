use crate::{
    dsp::{Lfo, ModTarget},
    synth::Voice,
};

/*
Modulation Combiner
===================

Runs once per display frame (~60 Hz), the control-loop cadence, not audio
rate. For each voice it evaluates every LFO in the voice's bank exactly
once, sums the outputs per modulation target, and recomputes each targeted
parameter FROM ITS STORED BASE VALUE before writing the result to the live
audio parameters.

The central correctness invariant lives here: modulation is never added to
a stored base value. Every frame re-reads the base, recomputes, and writes
only the live parameter, so a ±1-depth LFO held for an hour produces the
same peak deviation on frame one and frame N - no drift, no compounding.
The flip side of the same rule: when the last LFO is un-routed from a
target, the base value is reapplied on the very next frame, so modulation
"lets go" instantly.

Master volume is the one cross-voice target: every voice's LFOs accumulate
into a single sum applied to the master gain.
*/

/// Filter modulation span: ±3 octaves at modulation ±1.
pub const FILTER_MOD_OCTAVES: f64 = 3.0;
/// Detune modulation span in cents at modulation ±1.
pub const DETUNE_MOD_CENTS: f64 = 100.0;

#[derive(Debug, Default, Clone, Copy)]
struct TargetSum {
    total: f64,
    routed: bool,
}

impl TargetSum {
    fn add(&mut self, value: f64) {
        self.total += value;
        self.routed = true;
    }
}

/// Evaluate one voice's LFO bank and apply the per-voice targets. Returns
/// this voice's contribution to the master-volume sum.
fn combine_voice(now: f64, voice: &mut Voice, bank: &mut [Lfo]) -> f64 {
    let mut filter = TargetSum::default();
    let mut osc_volume = TargetSum::default();
    let mut detune = TargetSum::default();
    let mut unison_detune = TargetSum::default();
    let mut spread = TargetSum::default();
    let mut master = 0.0;

    for lfo in bank.iter_mut() {
        // One evaluation per LFO per frame, shared by all its targets.
        let value = lfo.value(now);
        if lfo.has_target(ModTarget::Filter) {
            filter.add(value);
        }
        if lfo.has_target(ModTarget::MasterVolume) {
            master += value;
        }
        if lfo.has_target(ModTarget::OscVolume) {
            osc_volume.add(value);
        }
        if lfo.has_target(ModTarget::Detune) {
            detune.add(value);
        }
        if lfo.has_target(ModTarget::UnisonDetune) {
            unison_detune.add(value);
        }
        if lfo.has_target(ModTarget::UnisonSpread) {
            spread.add(value);
        }
    }

    // A disabled voice's notes were silenced by set_enabled; writing the
    // recomputed gain would bring them back. Its LFOs keep running so
    // master-volume routing stays live.
    if !voice.enabled() {
        return master;
    }

    // Recompute every target fresh from its base value and reapply - the
    // unmodulated base when nothing is routed.
    let base_cutoff = voice.cutoff() as f64;
    let cutoff = if filter.routed {
        base_cutoff * (filter.total * FILTER_MOD_OCTAVES).exp2()
    } else {
        base_cutoff
    };
    voice.apply_modulated_cutoff(cutoff as f32, now);

    let base_volume = voice.volume() as f64;
    let volume = if osc_volume.routed {
        (base_volume * (1.0 + osc_volume.total)).clamp(0.0, 1.0)
    } else {
        base_volume
    };
    voice.apply_modulated_volume(volume as f32, now);

    // Voice detune and unison detune share the per-oscillator detune
    // parameter, so they are combined into one write.
    let base_detune = voice.detune() as f64;
    let det = if detune.routed {
        base_detune + detune.total * DETUNE_MOD_CENTS
    } else {
        base_detune
    };
    let base_unison = voice.unison_detune() as f64;
    let uni = if unison_detune.routed {
        (base_unison * (1.0 + unison_detune.total)).max(0.0)
    } else {
        base_unison
    };
    voice.apply_modulated_detune(det as f32, uni as f32, now);

    let base_spread = voice.unison_spread() as f64;
    let sp = if spread.routed {
        (base_spread + spread.total).clamp(0.0, 1.0)
    } else {
        base_spread
    };
    voice.apply_modulated_spread(sp as f32, now);

    master
}

/// Run one combiner frame over all voices. Returns the modulated master
/// volume, `clamp01(base * (1 + Σ master-targeted LFOs))`.
pub(crate) fn run_frame(
    now: f64,
    voices: &mut [Voice],
    banks: &mut [Vec<Lfo>],
    master_base: f32,
) -> f32 {
    let mut master_sum = 0.0;
    for (voice, bank) in voices.iter_mut().zip(banks.iter_mut()) {
        master_sum += combine_voice(now, voice, bank);
    }
    (master_base as f64 * (1.0 + master_sum)).clamp(0.0, 1.0) as f32
}
