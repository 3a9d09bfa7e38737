//! The audio-graph boundary of the core.
//!
//! The real signal path runs on a platform-owned realtime audio thread that
//! this crate never touches directly. What the core does own is the *control
//! surface* of that graph: node handles whose automatable fields are
//! [`param::RampParam`] schedules of future value changes. The renderer
//! consumes those schedules asynchronously; the core only ever appends to
//! them or truncates them, which is what keeps note on/off, setters, and the
//! per-frame combiner non-blocking.

/// Node handles: oscillators, panners, filters, gains.
pub mod node;
/// Scheduled parameter automation (set-value / linear-ramp timelines).
pub mod param;

pub use node::{FilterNode, FilterType, GainNode, NodeError, OscNode, PanNode};
pub use param::RampParam;
