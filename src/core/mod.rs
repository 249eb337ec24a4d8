//! Polling pipeline: trigger, overlap guard, emitter and lifecycle

pub mod emitter;
pub mod pipeline;
pub mod poller_state;
pub mod runner;
pub mod trigger;

pub use emitter::MessageEmitter;
pub use pipeline::{FileError, Pipeline, PollReport};
pub use poller_state::PollerState;
pub use runner::{FileSource, PollStats, RunningSource};
pub use trigger::Trigger;
