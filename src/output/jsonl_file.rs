//! JSON Lines file output

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::OutputChannel;
use crate::error::{Result, SourceError};
use crate::message::OutboundMessage;

/// Lines sent since the last flush
#[derive(Debug)]
struct Batch {
    file: File,
    buffer: Vec<u8>,
}

/// Appends messages to a file, one JSON object per line
///
/// Messages are buffered until [`flush`](OutputChannel::flush). A failed
/// flush drops the buffered lines, so a retried file is never written twice.
#[derive(Debug)]
pub struct JsonLinesFileChannel {
    path: PathBuf,
    batch: Mutex<Batch>,
}

impl JsonLinesFileChannel {
    /// Open a file for appending
    ///
    /// # Arguments
    /// * `path` - Output file; created if missing, never truncated
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                SourceError::Config(format!("cannot open output {}: {}", path.display(), e))
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            batch: Mutex::new(Batch {
                file,
                buffer: Vec::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn output_err(&self, e: impl std::fmt::Display) -> SourceError {
        SourceError::Output(format!("{}: {}", self.path.display(), e))
    }
}

impl OutputChannel for JsonLinesFileChannel {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        let line = serde_json::to_vec(message).map_err(|e| self.output_err(e))?;
        let mut batch = self.batch.lock().map_err(|e| self.output_err(e))?;
        batch.buffer.extend_from_slice(&line);
        batch.buffer.push(b'\n');
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut batch = self.batch.lock().map_err(|e| self.output_err(e))?;
        let Batch { file, buffer } = &mut *batch;
        let written = file.write_all(buffer).and_then(|()| file.flush());
        buffer.clear();
        written.map_err(|e| self.output_err(e))
    }

    fn description(&self) -> String {
        format!("jsonl({})", self.path.display())
    }
}

impl Drop for JsonLinesFileChannel {
    fn drop(&mut self) {
        if let Ok(batch) = self.batch.get_mut() {
            let _ = batch.file.write_all(&batch.buffer);
        }
    }
}
