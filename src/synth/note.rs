use crate::graph::{FilterNode, GainNode, OscNode, PanNode, RampParam};

/// Monotonic identifier for one sounding note instance. Frequencies are not
/// unique over a note's whole lifetime (a retrigger allocates a new note at
/// the same pitch while the old one is still releasing), so ids key the live
/// collection instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId(pub u64);

/// Lifecycle of an [`ActiveNote`].
///
/// Transitions: `Attacking → Sustaining` when the scheduled attack+decay
/// completes, any stage `→ Releasing` on note-off, `Releasing → Freed` when
/// the reap tick tears the node graph down after the release deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStage {
    Attacking,
    Sustaining,
    Releasing,
    Freed,
}

/// One unison sub-oscillator and its pan stage.
#[derive(Debug)]
pub struct UnisonUnit {
    pub osc: OscNode,
    pub pan: PanNode,
}

/// Signal routing for one note: through the shared filter, or bypassing it
/// straight into the gain stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    ThroughFilter,
    Bypass,
}

/// Live audio-graph resources for one sounding note: N unison units, one
/// shared filter, one shared gain node carrying the envelope schedule.
///
/// `envelope` is a normalized 0→1→sustain→0 shadow of the gain schedule.
/// The gain schedule bakes in `volume/√N`, which changes under volume and
/// unison edits; the shadow only ever tracks envelope *position*, which is
/// what stage advancement and drift-free volume modulation need.
pub struct ActiveNote {
    pub id: NoteId,
    pub freq: f32,
    pub units: Vec<UnisonUnit>,
    pub filter: FilterNode,
    pub gain: GainNode,
    pub envelope: RampParam,
    pub routing: Routing,
    pub stage: NoteStage,
    /// Time the scheduled attack+decay completes and sustain begins.
    pub sustain_at: f64,
    /// Set on note-off: when the release ramp plus teardown grace elapses.
    pub release_deadline: Option<f64>,
    /// Envelope position captured on volume edits, `current_gain / old_scaled`.
    pub env_ratio: f32,
}

/// Per-unit detune offset in cents: spreads N units symmetrically across
/// `±unison_detune`. Zero when N = 1 (the N > 1 guard also keeps the
/// divide-by-(N-1) structurally safe; unison count is clamped to ≥ 1).
pub fn unison_detune_offset(unison_detune: f32, index: usize, count: usize) -> f32 {
    if count > 1 {
        unison_detune * (2.0 * index as f32 / (count as f32 - 1.0) - 1.0)
    } else {
        0.0
    }
}

/// Per-unit stereo pan: spreads N units across `±unison_spread`.
pub fn unison_pan(unison_spread: f32, index: usize, count: usize) -> f32 {
    if count > 1 {
        unison_spread * (2.0 * index as f32 / (count as f32 - 1.0) - 1.0)
    } else {
        0.0
    }
}

/// Equal-power unison gain scaling: `volume / √N` keeps apparent loudness
/// independent of unison count.
pub fn scaled_volume(volume: f32, count: usize) -> f32 {
    volume / (count as f32).sqrt()
}
