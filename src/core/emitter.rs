//! Conversion of accepted files into outbound messages

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::ReadingMode;
use crate::error::{Result, SourceError};
use crate::message::{FileMarker, Mark, MessageHeaders, OutboundMessage, Payload};
use crate::scanner::FileCandidate;

/// Turns a file into messages according to the reading mode
#[derive(Debug, Clone, Copy)]
pub struct MessageEmitter {
    mode: ReadingMode,
    with_markers: bool,
}

impl MessageEmitter {
    pub fn new(mode: ReadingMode) -> Self {
        Self {
            mode,
            with_markers: false,
        }
    }

    /// Surround line messages with start/end markers (`lines` mode only)
    pub fn with_markers(mut self, with_markers: bool) -> Self {
        self.with_markers = with_markers;
        self
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    /// Build every message for one file
    ///
    /// # Arguments
    /// * `candidate` - Accepted file
    ///
    /// # Returns
    /// One message in `ref` and `contents` mode, one per line (plus optional
    /// markers) in `lines` mode. Fails if the file cannot be read.
    pub fn messages(&self, candidate: &FileCandidate) -> Result<Vec<OutboundMessage>> {
        let headers = MessageHeaders::for_file(candidate);

        match self.mode {
            ReadingMode::Ref => {
                // The file must still exist for a reference to be useful
                if !candidate.path.is_file() {
                    return Err(SourceError::Read {
                        path: candidate.path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "file no longer exists",
                        ),
                    });
                }
                Ok(vec![OutboundMessage::new(
                    headers,
                    Payload::Reference(candidate.path.clone()),
                )])
            }
            ReadingMode::Contents => {
                let bytes = fs::read(&candidate.path).map_err(|source| SourceError::Read {
                    path: candidate.path.clone(),
                    source,
                })?;
                Ok(vec![OutboundMessage::new(headers, Payload::Contents(bytes))])
            }
            ReadingMode::Lines => self.line_messages(candidate, headers),
        }
    }

    fn line_messages(
        &self,
        candidate: &FileCandidate,
        headers: MessageHeaders,
    ) -> Result<Vec<OutboundMessage>> {
        let lines = read_lines(&candidate.path)?;
        let line_count = lines.len() as u64;
        let mut messages = Vec::with_capacity(lines.len() + 2);

        if self.with_markers {
            messages.push(OutboundMessage::new(
                headers.clone(),
                Payload::Marker(FileMarker {
                    mark: Mark::Start,
                    file_path: candidate.path.clone(),
                    line_count: 0,
                }),
            ));
        }

        for (idx, line) in lines.into_iter().enumerate() {
            let mut line_headers = headers.clone();
            line_headers.sequence_number = Some(idx as u64 + 1);
            messages.push(OutboundMessage::new(line_headers, Payload::Line(line)));
        }

        if self.with_markers {
            let mut end_headers = headers;
            end_headers.line_count = Some(line_count);
            messages.push(OutboundMessage::new(
                end_headers,
                Payload::Marker(FileMarker {
                    mark: Mark::End,
                    file_path: candidate.path.clone(),
                    line_count,
                }),
            ));
        }

        Ok(messages)
    }
}

/// Read a file as text lines, stripping `\n` and `\r\n` terminators
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let read_err = |source: std::io::Error| SourceError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        let bytes_read = reader.read_until(b'\n', &mut buffer).map_err(read_err)?;
        if bytes_read == 0 {
            break;
        }
        if buffer.last() == Some(&b'\n') {
            buffer.pop();
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
        }
        lines.push(String::from_utf8_lossy(&buffer).into_owned());
    }

    Ok(lines)
}
