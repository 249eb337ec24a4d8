//! One poll: scan, filter, emit

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::emitter::MessageEmitter;
use super::poller_state::PollerState;
use crate::error::{Result, SourceError};
use crate::filter::{FileFilter, FilterChain};
use crate::output::OutputChannel;
use crate::scanner::{DirectoryScanner, FileCandidate};

/// A file that was accepted but could not be emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

impl FileError {
    fn new(path: &std::path::Path, err: &SourceError) -> Self {
        Self {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// What one poll did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Another poll was running, so this one did nothing
    pub skipped: bool,
    /// Regular files handed to the filter chain
    pub files_scanned: usize,
    /// Files rejected by a filter
    pub files_filtered: usize,
    pub files_emitted: usize,
    pub messages_emitted: usize,
    /// The per-poll cap stopped the scan early
    pub reached_limit: bool,
    pub file_errors: Vec<FileError>,
    /// Directories or files the walk could not read
    pub scan_errors: Vec<String>,
}

impl PollReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.file_errors.is_empty() || !self.scan_errors.is_empty()
    }
}

/// Scanner, filter chain, emitter and output wired together
///
/// Polls never overlap: a call to [`poll`](Self::poll) made while another
/// is running returns a skipped report.
pub struct Pipeline {
    scanner: DirectoryScanner,
    filters: FilterChain,
    emitter: MessageEmitter,
    output: Arc<dyn OutputChannel>,
    max_messages: Option<usize>,
    state: PollerState,
    /// Files whose store record could not be rolled back yet
    pending_rollback: Mutex<Vec<FileCandidate>>,
}

impl Pipeline {
    pub fn new(
        scanner: DirectoryScanner,
        filters: FilterChain,
        emitter: MessageEmitter,
        output: Arc<dyn OutputChannel>,
    ) -> Self {
        Self {
            scanner,
            filters,
            emitter,
            output,
            max_messages: None,
            state: PollerState::new(),
            pending_rollback: Mutex::new(Vec::new()),
        }
    }

    /// Cap the number of files emitted per poll
    pub fn with_max_messages(mut self, max_messages: Option<usize>) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn scanner(&self) -> &DirectoryScanner {
        &self.scanner
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    /// Number of files still waiting for their store record to be removed
    pub fn pending_rollbacks(&self) -> usize {
        self.pending().len()
    }

    /// Refuse further polls; a running poll completes
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Run one complete poll
    ///
    /// # Returns
    /// A report of the poll. Fails without emitting anything when the scan
    /// root becomes unreadable or the metadata store fails; in that case every
    /// file recorded earlier in the poll is rolled back. Rollbacks the store
    /// refused are retried before the next scan, and that poll fails while
    /// any of them is still refused.
    pub fn poll(&self) -> Result<PollReport> {
        let Some(_guard) = self.state.begin() else {
            debug!("Poll skipped, state is {}", self.state.state_name());
            return Ok(PollReport::skipped());
        };

        self.retry_pending_rollbacks()?;

        let started = Instant::now();
        let mut report = PollReport::default();

        let accepted = self.select(&mut report)?;
        for candidate in &accepted {
            self.emit(candidate, &mut report);
        }

        if report.files_emitted > 0 || report.has_errors() {
            info!(
                "Poll emitted {} file(s) as {} message(s) in {:.1?} ({} scanned, {} filtered, {} file error(s), {} scan error(s))",
                report.files_emitted,
                report.messages_emitted,
                started.elapsed(),
                report.files_scanned,
                report.files_filtered,
                report.file_errors.len(),
                report.scan_errors.len()
            );
        } else {
            debug!(
                "Poll found nothing new ({} scanned, {} filtered)",
                report.files_scanned, report.files_filtered
            );
        }

        Ok(report)
    }

    /// Walk the root and run the filter chain until the cap is reached
    fn select(&self, report: &mut PollReport) -> Result<Vec<FileCandidate>> {
        let mut accepted = Vec::new();

        for item in self.scanner.scan() {
            let candidate = match item {
                Ok(candidate) => candidate,
                Err(e) if e.at_root => {
                    self.rollback_all(&accepted);
                    return Err(SourceError::Scan(e.message));
                }
                Err(e) => {
                    report.scan_errors.push(e.message);
                    continue;
                }
            };

            report.files_scanned += 1;
            match self.filters.accept(&candidate) {
                Ok(true) => {
                    accepted.push(candidate);
                    if self.max_messages.is_some_and(|max| accepted.len() >= max) {
                        report.reached_limit = true;
                        break;
                    }
                }
                Ok(false) => report.files_filtered += 1,
                Err(e) if e.is_store_error() => {
                    self.rollback_all(&accepted);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", candidate.path.display(), e);
                    report.file_errors.push(FileError::new(&candidate.path, &e));
                }
            }
        }

        Ok(accepted)
    }

    fn emit(&self, candidate: &FileCandidate, report: &mut PollReport) {
        let messages = match self.emitter.messages(candidate) {
            Ok(messages) => messages,
            Err(e) => {
                self.fail_file(candidate, e, report);
                return;
            }
        };

        for message in &messages {
            if let Err(e) = self.output.send(message) {
                self.fail_file(candidate, e, report);
                return;
            }
        }

        // Buffered channels only deliver on flush
        if let Err(e) = self.output.flush() {
            self.fail_file(candidate, e, report);
            return;
        }

        report.messages_emitted += messages.len();

        debug!(
            "Emitted {} as {} message(s)",
            candidate.path.display(),
            messages.len()
        );
        report.files_emitted += 1;
    }

    /// Record a per-file failure and forget the file so a later poll retries it
    fn fail_file(&self, candidate: &FileCandidate, err: SourceError, report: &mut PollReport) {
        warn!("Failed to emit {}: {}", candidate.path.display(), err);
        self.rollback(candidate);
        report.file_errors.push(FileError::new(&candidate.path, &err));
    }

    fn rollback_all(&self, accepted: &[FileCandidate]) {
        for candidate in accepted.iter().rev() {
            self.rollback(candidate);
        }
    }

    /// Forget a file, queueing it for a later attempt if the store refuses
    fn rollback(&self, candidate: &FileCandidate) {
        match self.filters.rollback(candidate) {
            Ok(()) => {}
            Err(e) if e.is_store_error() => {
                warn!(
                    "Failed to roll back {}, retrying next poll: {}",
                    candidate.path.display(),
                    e
                );
                self.pending().push(candidate.clone());
            }
            Err(e) => warn!("Failed to roll back {}: {}", candidate.path.display(), e),
        }
    }

    fn retry_pending_rollbacks(&self) -> Result<()> {
        let mut pending = self.pending();
        if pending.is_empty() {
            return Ok(());
        }

        let mut refused = Vec::new();
        let mut first_err = None;
        for candidate in pending.drain(..) {
            match self.filters.rollback(&candidate) {
                Ok(()) => debug!("Rolled back {}", candidate.path.display()),
                Err(e) if e.is_store_error() => {
                    first_err.get_or_insert(e);
                    refused.push(candidate);
                }
                Err(e) => warn!("Dropping rollback of {}: {}", candidate.path.display(), e),
            }
        }
        *pending = refused;

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Vec<FileCandidate>> {
        self.pending_rollback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("root", &self.scanner.root())
            .field("filters", &self.filters)
            .field("mode", &self.emitter.mode())
            .field("output", &self.output.description())
            .field("max_messages", &self.max_messages)
            .field("state", &self.state.state_name())
            .field("pending_rollbacks", &self.pending_rollbacks())
            .finish()
    }
}
