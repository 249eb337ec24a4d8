use std::io::{self, Write};

use super::OutputChannel;
use crate::error::{Result, SourceError};
use crate::message::OutboundMessage;

/// Writes one JSON object per line to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutChannel;

impl StdoutChannel {
    pub fn new() -> Self {
        Self
    }
}

impl OutputChannel for StdoutChannel {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        let line = serde_json::to_string(message)
            .map_err(|e| SourceError::Output(format!("Failed to serialize message: {e}")))?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", line)
            .map_err(|e| SourceError::Output(format!("Failed to write to stdout: {e}")))
    }

    fn flush(&self) -> Result<()> {
        io::stdout()
            .flush()
            .map_err(|e| SourceError::Output(format!("Failed to flush stdout: {e}")))
    }

    fn description(&self) -> String {
        "stdout".to_string()
    }
}
