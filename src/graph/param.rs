/*
Scheduled Parameter Automation
==============================

An automatable node field is a timeline of two event kinds:

  set     value jumps to `v` at time `t` and holds
  ramp    value moves linearly to `v`, arriving at time `t`, starting from
          the previous event's value and time

This mirrors how audio back-ends expose parameters (set-value-at-time and
linear-ramp-to-value-at-time): the control thread appends future changes,
the audio thread evaluates them. Envelope attack/decay/release are expressed
entirely as ramps on a gain parameter.

Cancellation is cancel-AND-HOLD: `cancel_scheduled(t)` evaluates the
timeline at `t`, drops every event at or after `t`, and anchors the held
value there. A fresh note-on or note-off must cancel previously scheduled
ramp points before scheduling new ones; failing to do so stacks conflicting
ramps and produces audible glitches.

The per-frame modulation combiner appends a `set` event every display frame
(~60 Hz), so the timeline would grow without bound over a long session.
`gc(horizon)` collapses everything older than the horizon into a single
anchor; the engine calls it from its reap tick.
*/

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Set { time: f64, value: f32 },
    Ramp { time: f64, value: f32 },
}

impl Event {
    fn time(&self) -> f64 {
        match self {
            Event::Set { time, .. } | Event::Ramp { time, .. } => *time,
        }
    }

    fn value(&self) -> f32 {
        match self {
            Event::Set { value, .. } | Event::Ramp { value, .. } => *value,
        }
    }
}

/// An automatable parameter: an initial value plus a time-ordered event
/// timeline. All mutation is append/truncate; evaluation is pure.
#[derive(Debug, Clone)]
pub struct RampParam {
    initial: f32,
    events: Vec<Event>,
}

impl RampParam {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    /// Schedule an instantaneous jump to `value` at `time`.
    ///
    /// Events at equal times keep insertion order, so a later write at the
    /// same timestamp wins - the behavior per-frame modulation relies on.
    pub fn set_value_at(&mut self, value: f32, time: f64) {
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, Event::Set { time, value });
    }

    /// Schedule a linear ramp arriving at `value` at `time`, starting from
    /// the previous event (or the current value if none).
    pub fn linear_ramp_to(&mut self, value: f32, time: f64) {
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, Event::Ramp { time, value });
    }

    /// Cancel-and-hold: drop every event at or after `time` and anchor the
    /// value the timeline had at that instant.
    pub fn cancel_scheduled(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.retain(|e| e.time() < time);
        self.events.push(Event::Set { time, value: held });
    }

    /// Evaluate the timeline at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        let mut prev_time = f64::NEG_INFINITY;
        let mut prev_value = self.initial;

        for event in &self.events {
            if event.time() <= time {
                prev_time = event.time();
                prev_value = event.value();
                continue;
            }
            // First future event: only a ramp affects the present.
            if let Event::Ramp { time: t1, value: v1 } = *event {
                if prev_time.is_finite() && t1 > prev_time {
                    let frac = ((time - prev_time) / (t1 - prev_time)) as f32;
                    return prev_value + (v1 - prev_value) * frac;
                }
                return v1;
            }
            break;
        }

        prev_value
    }

    /// Collapse history older than `horizon` into a single anchor, bounding
    /// timeline growth from per-frame writes.
    pub fn gc(&mut self, horizon: f64) {
        let mut stale = self.events.partition_point(|e| e.time() <= horizon);
        // An in-flight ramp interpolates from the event before it; keep that
        // anchor so collapsing history cannot bend the ramp.
        if matches!(self.events.get(stale), Some(Event::Ramp { .. })) {
            stale = stale.saturating_sub(1);
        }
        // The newest pre-horizon event is the anchor every later query
        // resolves through; events older than it are unreachable.
        if stale > 1 {
            self.events.drain(..stale - 1);
        }
    }

    #[cfg(test)]
    fn event_count(&self) -> usize {
        self.events.len()
    }
}
