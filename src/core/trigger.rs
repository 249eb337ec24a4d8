use std::time::Duration;

use crate::config::TriggerSettings;

/// When polls run and how much each one may emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Wait before the first poll
    pub initial_delay: Duration,
    /// Wait between the end of a poll and the start of the next
    pub fixed_delay: Duration,
    /// Maximum files emitted per poll; `None` is unlimited
    pub max_messages: Option<usize>,
}

impl Trigger {
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            fixed_delay: delay,
            max_messages: None,
        }
    }

    pub fn from_settings(settings: &TriggerSettings) -> Self {
        Self {
            initial_delay: settings.initial_delay(),
            fixed_delay: settings.fixed_delay(),
            max_messages: settings.max_messages_per_poll(),
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_messages(mut self, max_messages: Option<usize>) -> Self {
        self.max_messages = max_messages;
        self
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::from_settings(&TriggerSettings::default())
    }
}
