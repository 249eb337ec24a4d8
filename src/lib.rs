//! File Source Library
//!
//! Polls a directory tree and publishes every new file to an output channel,
//! remembering emitted files in a persistent metadata store so each one is
//! emitted at most once across restarts.

pub mod config;
pub mod core;
pub mod error;
pub mod filter;
pub mod message;
pub mod metadata;
pub mod output;
pub mod scanner;

pub use crate::core::{FileSource, Pipeline, PollReport, PollStats, RunningSource};
pub use crate::error::{Result, SourceError, StoreError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ReadingMode, Settings, TimeUnit, TriggerSettings};
    pub use crate::core::{
        FileSource, MessageEmitter, Pipeline, PollReport, PollStats, RunningSource, Trigger,
    };
    pub use crate::error::{Result, SourceError, StoreError};
    pub use crate::filter::{
        FileFilter, FilterChain, HiddenFileFilter, PatternFilter, PersistentAcceptOnceFilter,
    };
    pub use crate::message::{OutboundMessage, Payload};
    pub use crate::metadata::{InMemoryMetadataStore, JsonJournalStore, MetadataStore};
    pub use crate::output::{JsonLinesFileChannel, MemoryChannel, OutputChannel, StdoutChannel};
    pub use crate::scanner::{DirectoryScanner, FileCandidate, IdentifierKind};
}
