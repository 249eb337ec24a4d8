//! Output channels for emitted messages.
//!
//! This module provides the [`OutputChannel`] trait and its implementations:
//! - [`StdoutChannel`] - JSON Lines on stdout, for piping into other tools
//! - [`JsonLinesFileChannel`] - JSON Lines appended to a file
//! - [`MemoryChannel`] - collects messages in memory

mod jsonl_file;
mod memory;
mod stdout;

pub use jsonl_file::JsonLinesFileChannel;
pub use memory::MemoryChannel;
pub use stdout::StdoutChannel;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::message::OutboundMessage;

/// The single channel every poll publishes to.
///
/// Ownership of a message ends once `send` returns successfully.
pub trait OutputChannel: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<()>;

    /// Flush any buffered output.
    ///
    /// Called at the end of every poll.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn description(&self) -> String;
}

/// Open the configured channel: a JSON Lines file, or stdout when no path is given.
pub fn open(path: Option<&Path>) -> Result<Arc<dyn OutputChannel>> {
    Ok(match path {
        Some(path) => Arc::new(JsonLinesFileChannel::open(path)?),
        None => Arc::new(StdoutChannel::new()),
    })
}
