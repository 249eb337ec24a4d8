//! Integration tests for the configured file source
//!
//! Tests wiring from settings through to a JSON Lines output file, with the
//! metadata journal shared across restarts.

use file_source_rs::config::MetadataSettings;
use file_source_rs::output;
use file_source_rs::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn settings_for(input: &Path, state: &Path) -> Settings {
    Settings {
        directory: Some(input.to_path_buf()),
        filename_pattern: Some("*.csv".to_string()),
        mode: ReadingMode::Lines,
        metadata: MetadataSettings {
            url: format!("file:{}", state.join("metadata.jsonl").display()),
            ..MetadataSettings::default()
        },
        output: Some(state.join("out.jsonl")),
        ..Settings::default()
    }
}

fn output_lines(state: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(state.join("out.jsonl"))
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Test a full poll written to a JSON Lines file
#[test]
fn test_poll_once_writes_json_lines() {
    let input = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    fs::write(input.path().join("rows.csv"), "id,name\n1,alpha\n").unwrap();
    fs::write(input.path().join("notes.md"), "ignored").unwrap();

    let settings = settings_for(input.path(), state.path());
    let channel = output::open(settings.output.as_deref()).unwrap();
    let source = FileSource::from_settings(&settings, channel).unwrap();

    let report = source.poll_once().unwrap();
    assert_eq!(report.files_emitted, 1);
    assert_eq!(report.messages_emitted, 2);

    let lines = output_lines(state.path());
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["payload"]["type"], "line");
    assert_eq!(lines[0]["payload"]["value"], "id,name");
    assert_eq!(lines[1]["payload"]["value"], "1,alpha");
    assert_eq!(lines[1]["headers"]["file_name"], "rows.csv");
    assert_eq!(lines[1]["headers"]["sequence_number"], 2);
}

/// Test that a restarted source does not emit files again
#[test]
fn test_restart_does_not_duplicate() {
    let input = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    fs::write(input.path().join("a.csv"), "1\n").unwrap();

    let settings = settings_for(input.path(), state.path());
    {
        let channel = output::open(settings.output.as_deref()).unwrap();
        let source = FileSource::from_settings(&settings, channel).unwrap();
        source.poll_once().unwrap();
    }

    fs::write(input.path().join("b.csv"), "2\n").unwrap();
    let channel = output::open(settings.output.as_deref()).unwrap();
    let source = FileSource::from_settings(&settings, channel).unwrap();
    let report = source.poll_once().unwrap();
    assert_eq!(report.files_emitted, 1);

    let values: Vec<_> = output_lines(state.path())
        .iter()
        .map(|line| line["payload"]["value"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["1", "2"]);
}

/// Test that settings loaded from TOML drive the source
#[test]
fn test_settings_from_toml() {
    let input = TempDir::new().unwrap();
    fs::write(input.path().join("a.txt"), "x").unwrap();

    let toml = format!(
        r#"
directory = "{}"
mode = "contents"

[trigger]
max_messages = 1

[metadata]
url = "memory:"
"#,
        input.path().display()
    );
    let settings = Settings::from_toml_str(&toml).unwrap();
    let channel = std::sync::Arc::new(MemoryChannel::new());
    let source = FileSource::from_settings(&settings, channel.clone()).unwrap();

    assert_eq!(source.trigger().max_messages, Some(1));
    source.poll_once().unwrap();
    assert_eq!(
        channel.messages()[0].payload,
        Payload::Contents(b"x".to_vec())
    );
}
