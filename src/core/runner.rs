//! Explicit wiring and the start/stop lifecycle of the poll thread

use serde::Serialize;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

use super::emitter::MessageEmitter;
use super::pipeline::{Pipeline, PollReport};
use super::trigger::Trigger;
use crate::config::Settings;
use crate::error::{Result, SourceError};
use crate::filter::FilterChain;
use crate::metadata;
use crate::output::OutputChannel;
use crate::scanner::DirectoryScanner;

/// Totals across every poll of a running source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub polls: u64,
    pub polls_skipped: u64,
    pub polls_failed: u64,
    pub files_emitted: u64,
    pub messages_emitted: u64,
    pub file_errors: u64,
    pub scan_errors: u64,
}

impl PollStats {
    /// Fold one poll's outcome into the totals
    pub fn record(&mut self, outcome: &Result<PollReport>) {
        self.polls += 1;
        match outcome {
            Ok(report) if report.skipped => self.polls_skipped += 1,
            Ok(report) => {
                self.files_emitted += report.files_emitted as u64;
                self.messages_emitted += report.messages_emitted as u64;
                self.file_errors += report.file_errors.len() as u64;
                self.scan_errors += report.scan_errors.len() as u64;
            }
            Err(_) => self.polls_failed += 1,
        }
    }
}

/// A fully wired file source that has not started polling yet
#[derive(Debug)]
pub struct FileSource {
    pipeline: Arc<Pipeline>,
    trigger: Trigger,
}

impl FileSource {
    pub fn new(pipeline: Pipeline, trigger: Trigger) -> Self {
        let pipeline = pipeline.with_max_messages(trigger.max_messages);
        Self {
            pipeline: Arc::new(pipeline),
            trigger,
        }
    }

    /// Build scanner, metadata store, filter chain, emitter and trigger from settings
    ///
    /// # Arguments
    /// * `settings` - Validated here; any violation is returned as a configuration error
    /// * `output` - Channel every message is published to
    ///
    /// # Returns
    /// A source ready to [`start`](Self::start). Fails if the root directory
    /// is unusable or the metadata store cannot be opened.
    pub fn from_settings(settings: &Settings, output: Arc<dyn OutputChannel>) -> Result<Self> {
        settings.validate()?;

        let directory = settings
            .directory
            .as_deref()
            .ok_or_else(|| SourceError::Config("directory is required".to_string()))?;
        let scanner = DirectoryScanner::new(directory)?;

        let store = metadata::connect(&settings.metadata)?;
        let filters = FilterChain::standard(
            settings.filename_pattern(),
            store,
            &settings.metadata.key_prefix,
            settings.identifier,
            settings.reaccept_modified,
        )?;

        let emitter = MessageEmitter::new(settings.mode).with_markers(settings.with_markers);
        let trigger = Trigger::from_settings(&settings.trigger);

        info!(
            "Polling {} every {:?} (mode {:?}, output {})",
            scanner.root().display(),
            trigger.fixed_delay,
            settings.mode,
            output.description()
        );

        let pipeline = Pipeline::new(scanner, filters, emitter, output);
        Ok(Self::new(pipeline, trigger))
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Run a single poll on the calling thread
    pub fn poll_once(&self) -> Result<PollReport> {
        self.pipeline.poll()
    }

    /// Spawn the poll thread
    pub fn start(self) -> Result<RunningSource> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let pipeline = Arc::clone(&self.pipeline);
        let trigger = self.trigger.clone();

        let handle = thread::Builder::new()
            .name("file-source-poller".to_string())
            .spawn(move || run_loop(&pipeline, &trigger, &stop_rx))?;

        Ok(RunningSource {
            pipeline: self.pipeline,
            stop_tx,
            handle,
        })
    }
}

/// Handle to a source whose poll thread is running
pub struct RunningSource {
    pipeline: Arc<Pipeline>,
    stop_tx: Sender<()>,
    handle: JoinHandle<PollStats>,
}

impl RunningSource {
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Whether the poll thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop polling and wait for the poll thread
    ///
    /// A poll in progress runs to completion first.
    pub fn stop(self) -> PollStats {
        self.pipeline.stop();
        let _ = self.stop_tx.send(());

        match self.handle.join() {
            Ok(stats) => stats,
            Err(_) => {
                error!("Poll thread panicked");
                PollStats::default()
            }
        }
    }
}

/// IDLE -> POLLING -> IDLE until stopped
fn run_loop(pipeline: &Pipeline, trigger: &Trigger, stop_rx: &Receiver<()>) -> PollStats {
    let mut stats = PollStats::default();

    if wait_for_stop(stop_rx, trigger.initial_delay) {
        return stats;
    }

    loop {
        let outcome = pipeline.poll();
        if let Err(e) = &outcome {
            error!("Poll failed, retrying at next trigger: {}", e);
        }
        stats.record(&outcome);

        if pipeline.state().is_stopped() || wait_for_stop(stop_rx, trigger.fixed_delay) {
            break;
        }
    }

    info!(
        "Stopped after {} poll(s): {} file(s), {} message(s) emitted",
        stats.polls, stats.files_emitted, stats.messages_emitted
    );
    stats
}

/// Sleep for `delay`, returning true early if a stop was requested
fn wait_for_stop(stop_rx: &Receiver<()>, delay: Duration) -> bool {
    match stop_rx.recv_timeout(delay) {
        Err(RecvTimeoutError::Timeout) => false,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetadataSettings, TriggerSettings, TimeUnit};
    use crate::output::MemoryChannel;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn memory_settings(dir: &std::path::Path) -> Settings {
        Settings {
            directory: Some(dir.to_path_buf()),
            trigger: TriggerSettings {
                fixed_delay: 20,
                time_unit: TimeUnit::Milliseconds,
                ..TriggerSettings::default()
            },
            metadata: MetadataSettings {
                url: "memory:".to_string(),
                ..MetadataSettings::default()
            },
            ..Settings::default()
        }
    }

    #[test]
    fn test_stats_record() {
        let mut stats = PollStats::default();
        stats.record(&Ok(PollReport {
            files_emitted: 2,
            messages_emitted: 5,
            ..PollReport::default()
        }));
        stats.record(&Ok(PollReport::skipped()));
        stats.record(&Err(SourceError::Scan("gone".to_string())));

        assert_eq!(stats.polls, 3);
        assert_eq!(stats.polls_skipped, 1);
        assert_eq!(stats.polls_failed, 1);
        assert_eq!(stats.files_emitted, 2);
        assert_eq!(stats.messages_emitted, 5);
    }

    #[test]
    fn test_from_settings_rejects_invalid_config() {
        let settings = Settings::default();
        let output = Arc::new(MemoryChannel::new());

        let err = FileSource::from_settings(&settings, output).unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[test]
    fn test_from_settings_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let settings = memory_settings(&temp_dir.path().join("missing"));
        let output = Arc::new(MemoryChannel::new());

        assert!(FileSource::from_settings(&settings, output).is_err());
    }

    #[test]
    fn test_start_polls_until_stopped() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();

        let output = Arc::new(MemoryChannel::new());
        let source =
            FileSource::from_settings(&memory_settings(temp_dir.path()), output.clone()).unwrap();
        let running = source.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while output.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        fs::write(temp_dir.path().join("b.txt"), b"b").unwrap();
        while output.len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let stats = running.stop();
        assert_eq!(output.len(), 2);
        assert_eq!(stats.files_emitted, 2);
        assert!(stats.polls >= 2);
    }

    #[test]
    fn test_stop_interrupts_initial_delay() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = memory_settings(temp_dir.path());
        settings.trigger.initial_delay = 60_000;

        let output = Arc::new(MemoryChannel::new());
        let running = FileSource::from_settings(&settings, output)
            .unwrap()
            .start()
            .unwrap();

        let started = Instant::now();
        let stats = running.stop();
        assert_eq!(stats.polls, 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
