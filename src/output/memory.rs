use std::sync::Mutex;

use super::OutputChannel;
use crate::error::{Result, SourceError};
use crate::message::OutboundMessage;

/// Keeps every sent message in memory
#[derive(Debug, Default)]
pub struct MemoryChannel {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every message sent so far
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Remove and return every message sent so far
    pub fn take(&self) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputChannel for MemoryChannel {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        self.messages
            .lock()
            .map_err(|_| SourceError::Output("memory channel lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }

    fn description(&self) -> String {
        "memory".to_string()
    }
}
