//! Layered configuration for the file source.
//!
//! Settings are resolved in this order, later layers winning:
//! - Built-in defaults
//! - An optional TOML configuration file
//! - Environment variables prefixed with `FILE_SOURCE_`
//! - CLI flags (applied by the binary after extraction)
//!
//! Nested keys use a double underscore in environment variables:
//! - `FILE_SOURCE_DIRECTORY=/data/in` sets `directory`
//! - `FILE_SOURCE_TRIGGER__FIXED_DELAY=5` sets `trigger.fixed_delay`
//! - `FILE_SOURCE_METADATA__URL=file:/var/lib/fs/seen.json` sets `metadata.url`

use clap::ValueEnum;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SourceError};
use crate::scanner::fingerprint::IdentifierKind;

/// How an accepted file is turned into outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    /// One message carrying the file path
    #[default]
    Ref,
    /// One message carrying the file bytes
    Contents,
    /// One message per text line
    Lines,
}

/// Unit applied to the trigger delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
}

impl TimeUnit {
    pub fn duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerSettings {
    /// Delay between the end of one poll and the start of the next
    #[serde(default = "default_fixed_delay")]
    pub fixed_delay: u64,

    /// Delay before the first poll
    #[serde(default)]
    pub initial_delay: u64,

    #[serde(default)]
    pub time_unit: TimeUnit,

    /// Maximum files emitted per poll, -1 for unlimited
    #[serde(default = "default_max_messages")]
    pub max_messages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataSettings {
    /// Store location: `memory:`, `file:<path>` or a bare path
    #[serde(default = "default_metadata_url")]
    pub url: String,

    /// Logical collection the seen-file records live in
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Prefix prepended to every file identifier
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory to poll (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Glob matched against file names; empty or absent accepts all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_pattern: Option<String>,

    #[serde(default)]
    pub mode: ReadingMode,

    /// Wrap `lines` output with start/end marker messages
    #[serde(default)]
    pub with_markers: bool,

    /// What identifies a file in the metadata store
    #[serde(default)]
    pub identifier: IdentifierKind,

    /// Emit a seen file again when its modification time changes
    #[serde(default)]
    pub reaccept_modified: bool,

    #[serde(default)]
    pub trigger: TriggerSettings,

    #[serde(default)]
    pub metadata: MetadataSettings,

    /// JSON Lines output file; stdout when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

// Default value functions
fn default_fixed_delay() -> u64 {
    1
}

fn default_max_messages() -> i64 {
    -1
}

fn default_metadata_url() -> String {
    "file:.file-source/metadata.jsonl".to_string()
}

fn default_collection() -> String {
    "integrationMetadataStore".to_string()
}

fn default_key_prefix() -> String {
    "seen-files".to_string()
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            fixed_delay: default_fixed_delay(),
            initial_delay: 0,
            time_unit: TimeUnit::default(),
            max_messages: default_max_messages(),
        }
    }
}

impl TriggerSettings {
    pub fn fixed_delay(&self) -> Duration {
        self.time_unit.duration(self.fixed_delay)
    }

    pub fn initial_delay(&self) -> Duration {
        self.time_unit.duration(self.initial_delay)
    }

    /// Per-poll file cap, `None` when unlimited.
    pub fn max_messages_per_poll(&self) -> Option<usize> {
        if self.max_messages < 0 {
            None
        } else {
            Some(self.max_messages as usize)
        }
    }
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            url: default_metadata_url(),
            collection: default_collection(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory: None,
            filename_pattern: None,
            mode: ReadingMode::default(),
            with_markers: false,
            identifier: IdentifierKind::default(),
            reaccept_modified: false,
            trigger: TriggerSettings::default(),
            metadata: MetadataSettings::default(),
            output: None,
        }
    }
}

impl Settings {
    /// Build the layered figment: defaults, optional TOML file, environment.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("FILE_SOURCE_").split("__"))
    }

    /// Load configuration from all sources
    pub fn load(config_file: Option<&Path>) -> std::result::Result<Self, Box<figment::Error>> {
        Self::figment(config_file).extract().map_err(Box::new)
    }

    /// Load configuration from a TOML string layered over the defaults.
    pub fn from_toml_str(toml: &str) -> std::result::Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::string(toml))
            .extract()
            .map_err(Box::new)
    }

    /// The configured filename pattern, ignoring blank values.
    pub fn filename_pattern(&self) -> Option<&str> {
        self.filename_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Check the rules that must hold before the source may start.
    pub fn validate(&self) -> Result<()> {
        match &self.directory {
            None => {
                return Err(SourceError::Config("directory is required".to_string()));
            }
            Some(dir) if dir.as_os_str().is_empty() => {
                return Err(SourceError::Config("directory must not be empty".to_string()));
            }
            Some(_) => {}
        }

        if let Some(pattern) = self.filename_pattern() {
            glob::Pattern::new(pattern).map_err(|e| {
                SourceError::Config(format!("Invalid filename pattern '{pattern}': {e}"))
            })?;
        }

        if self.trigger.fixed_delay == 0 {
            return Err(SourceError::Config(
                "trigger.fixed_delay must be greater than zero".to_string(),
            ));
        }

        if self.trigger.max_messages == 0 || self.trigger.max_messages < -1 {
            return Err(SourceError::Config(format!(
                "trigger.max_messages must be positive or -1 (unlimited), got {}",
                self.trigger.max_messages
            )));
        }

        if self.metadata.url.trim().is_empty() {
            return Err(SourceError::Config("metadata.url must not be empty".to_string()));
        }

        if self.metadata.collection.trim().is_empty() {
            return Err(SourceError::Config(
                "metadata.collection must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_settings() -> Settings {
        Settings {
            directory: Some(PathBuf::from("/data/in")),
            ..Settings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mode, ReadingMode::Ref);
        assert_eq!(settings.trigger.fixed_delay(), Duration::from_secs(1));
        assert_eq!(settings.trigger.initial_delay(), Duration::ZERO);
        assert_eq!(settings.trigger.max_messages_per_poll(), None);
        assert_eq!(settings.metadata.collection, "integrationMetadataStore");
        assert_eq!(settings.metadata.key_prefix, "seen-files");
        assert!(!settings.with_markers);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
directory = "/srv/incoming"
filename_pattern = "*.txt"
mode = "lines"
with_markers = true
identifier = "content-hash"

[trigger]
fixed_delay = 250
time_unit = "milliseconds"
max_messages = 10

[metadata]
url = "memory:"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.directory, Some(PathBuf::from("/srv/incoming")));
        assert_eq!(settings.filename_pattern(), Some("*.txt"));
        assert_eq!(settings.mode, ReadingMode::Lines);
        assert!(settings.with_markers);
        assert_eq!(settings.identifier, IdentifierKind::ContentHash);
        assert_eq!(settings.trigger.fixed_delay(), Duration::from_millis(250));
        assert_eq!(settings.trigger.max_messages_per_poll(), Some(10));
        assert_eq!(settings.metadata.url, "memory:");
        // Untouched nested keys keep their defaults
        assert_eq!(settings.metadata.key_prefix, "seen-files");
    }

    #[test]
    fn test_blank_pattern_is_ignored() {
        let settings = Settings {
            filename_pattern: Some("   ".to_string()),
            ..valid_settings()
        };
        assert_eq!(settings.filename_pattern(), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_directory() {
        let err = Settings::default().validate().unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));

        let settings = Settings {
            directory: Some(PathBuf::new()),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let settings = Settings {
            filename_pattern: Some("[invalid".to_string()),
            ..valid_settings()
        };
        assert!(settings.validate().is_err());

        let mut settings = valid_settings();
        settings.trigger.max_messages = 0;
        assert!(settings.validate().is_err());

        let mut settings = valid_settings();
        settings.trigger.fixed_delay = 0;
        assert!(settings.validate().is_err());

        let mut settings = valid_settings();
        settings.metadata.collection = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_time_unit_minutes() {
        assert_eq!(TimeUnit::Minutes.duration(2), Duration::from_secs(120));
    }
}
