#[cfg(feature = "rtrb")]
use rtrb::Consumer;

/// Note events arriving from keyboard/UI input. Notes are keyed by
/// frequency in Hz - the input layer owns the key-to-pitch mapping.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn { freq: f32 },
    NoteOff { freq: f32 },
    AllNotesOff,
}

/// Source of control messages the engine drains once per frame. Backed by
/// an rtrb ring buffer in the default configuration so an input thread can
/// feed the control loop without locking.
pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}

impl MessageReceiver for std::collections::VecDeque<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        self.pop_front()
    }
}
