//! File filters applied to every scanned candidate.
//!
//! A candidate is emitted only if every filter of the [`FilterChain`] accepts
//! it. The standard chain is, in order:
//! - [`HiddenFileFilter`] - drops hidden files
//! - [`PatternFilter`] - keeps names matching a glob, when one is configured
//! - [`PersistentAcceptOnceFilter`] - drops files already recorded in the
//!   metadata store and records the ones it lets through

mod accept_once;
mod chain;
mod hidden;
mod pattern;

pub use accept_once::PersistentAcceptOnceFilter;
pub use chain::FilterChain;
pub use hidden::HiddenFileFilter;
pub use pattern::PatternFilter;

use crate::error::Result;
use crate::scanner::FileCandidate;

/// A predicate over scanned files.
pub trait FileFilter: Send + Sync {
    /// Decide whether the candidate may be emitted.
    ///
    /// Filters with side effects record their decision here; errors mean no
    /// decision could be made.
    fn accept(&self, candidate: &FileCandidate) -> Result<bool>;

    /// Undo whatever [`accept`](Self::accept) recorded for a candidate whose
    /// emission did not happen.
    fn rollback(&self, _candidate: &FileCandidate) -> Result<()> {
        Ok(())
    }

    fn description(&self) -> String;
}
