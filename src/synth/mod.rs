// Purpose: voice management and polyphony.
// This layer owns the live note state; the engine layer above wires voices
// to LFO banks and the per-frame modulation combiner.

pub mod message;
pub mod note;
pub mod voice;

pub use message::{MessageReceiver, SynthMessage};
pub use note::{ActiveNote, NoteId, NoteStage};
pub use voice::Voice;
