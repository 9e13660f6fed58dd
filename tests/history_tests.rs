use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use linechat::app::{Renderer, SessionConfig, SharedOutput};
use linechat::input::{ChannelSource, RawInput};
use linechat::runtime::{ProcessRequest, Processor};
use linechat::state::history::{escape_entry, HISTORY_COOKIE};
use linechat::state::{HistoryStore, LoadStatus};
use linechat::{InteractiveSession, ProcessError};
use tokio_util::sync::CancellationToken;

fn quiet_processor() -> Arc<dyn Processor> {
    Arc::new(|request: ProcessRequest| async move {
        request.sink.add_response_part("ok");
        Ok::<(), ProcessError>(())
    })
}

fn session_with_history(
    path: std::path::PathBuf,
    limit: usize,
) -> (mpsc::Sender<RawInput>, InteractiveSession) {
    let (tx, source) = ChannelSource::pair();
    let renderer = Renderer::new(
        Box::new(SharedOutput::new()),
        Box::new(SharedOutput::new()),
    );
    let config = SessionConfig {
        show_prompts: false,
        history_file: Some(path),
        history_limit: limit,
        processor: Some(quiet_processor()),
        ..SessionConfig::default()
    };
    (tx, InteractiveSession::new(config, Box::new(source), renderer))
}

fn submit(tx: &mpsc::Sender<RawInput>, text: &str) {
    tx.send(RawInput::Line(text.to_string())).expect("input");
    tx.send(RawInput::Line(String::new())).expect("input");
}

#[test]
fn test_history_file_round_trip_preserves_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history");
    let entries = [
        "plain",
        "two words",
        "first line\nsecond line",
        "tab\there",
        "naïve café",
        "back\\slash",
    ];
    let store = HistoryStore::with_entries(entries.iter().map(|e| e.to_string()), 100);
    store.save_file(&path).expect("save");

    let raw = std::fs::read_to_string(&path).expect("read");
    let mut lines = raw.lines();
    assert_eq!(lines.next(), Some(HISTORY_COOKIE));
    assert_eq!(lines.next(), Some("plain"));
    assert_eq!(lines.next(), Some("two\\040words"));
    assert_eq!(raw.lines().count(), entries.len() + 1);

    let mut loaded = HistoryStore::new(100);
    assert_eq!(
        loaded.load_file(&path).expect("load"),
        LoadStatus::Loaded(entries.len())
    );
    assert_eq!(loaded.entries(), entries);
}

#[test]
fn test_load_applies_limit_to_file_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history");
    let mut contents = format!("{HISTORY_COOKIE}\n");
    for entry in ["one", "two", "three", "four"] {
        contents.push_str(&escape_entry(entry));
        contents.push('\n');
    }
    std::fs::write(&path, contents).expect("write");

    let mut store = HistoryStore::new(2);
    assert_eq!(store.load_file(&path).expect("load"), LoadStatus::Loaded(4));
    assert_eq!(store.entries(), ["three", "four"]);
}

#[tokio::test]
async fn test_session_loads_and_saves_history_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history");
    HistoryStore::with_entries(["earlier".to_string()], 10)
        .save_file(&path)
        .expect("seed history");

    let (tx, mut session) = session_with_history(path.clone(), 10);
    submit(&tx, "hello there");
    submit(&tx, "hello there");
    drop(tx);
    tokio::time::timeout(Duration::from_secs(10), session.run(CancellationToken::new()))
        .await
        .expect("session should finish")
        .expect("clean exit");

    assert_eq!(session.history().entries(), ["earlier", "hello there"]);

    let mut reloaded = HistoryStore::new(10);
    reloaded.load_file(&path).expect("reload");
    assert_eq!(reloaded.entries(), ["earlier", "hello there"]);
}

#[tokio::test]
async fn test_session_ignores_foreign_history_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history");
    std::fs::write(&path, "# some other tool\nentry\n").expect("write");

    let (tx, mut session) = session_with_history(path.clone(), 10);
    submit(&tx, "fresh");
    drop(tx);
    tokio::time::timeout(Duration::from_secs(10), session.run(CancellationToken::new()))
        .await
        .expect("session should finish")
        .expect("clean exit");

    assert_eq!(session.history().entries(), ["fresh"]);
}
