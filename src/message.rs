//! Outbound messages handed to the output channel

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::scanner::FileCandidate;

/// Which end of a file a marker denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Start,
    End,
}

/// Start/end marker emitted around the lines of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMarker {
    pub mark: Mark,
    pub file_path: PathBuf,
    pub line_count: u64,
}

/// Message body, shaped by the reading mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// Absolute path of the file
    Reference(PathBuf),
    /// Whole file content
    Contents(#[serde(serialize_with = "serialize_contents")] Vec<u8>),
    /// One line of text, without its terminator
    Line(String),
    Marker(FileMarker),
}

/// Text when the bytes are UTF-8, a byte array otherwise
fn serialize_contents<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    match std::str::from_utf8(bytes) {
        Ok(text) => serializer.serialize_str(text),
        Err(_) => serializer.collect_seq(bytes),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageHeaders {
    pub file_name: String,
    pub original_file: PathBuf,
    pub relative_path: PathBuf,
    /// 1-based position of a line message within its file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    /// Total lines, set on end markers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u64>,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl MessageHeaders {
    pub fn for_file(candidate: &FileCandidate) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            file_name: candidate.file_name().into_owned(),
            original_file: candidate.path.clone(),
            relative_path: candidate.relative_path.clone(),
            sequence_number: None,
            line_count: None,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub headers: MessageHeaders,
    pub payload: Payload,
}

impl OutboundMessage {
    pub fn new(headers: MessageHeaders, payload: Payload) -> Self {
        Self { headers, payload }
    }

    /// The line text, for line messages
    pub fn as_line(&self) -> Option<&str> {
        match &self.payload {
            Payload::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.payload, Payload::Marker(_))
    }
}
