//! Integration tests for the queue driver: queue in, report log out.

use std::sync::Arc;
use std::time::Duration;

use fetchbot_core::download::{
    BackoffPolicy, DownloadEngine, DownloadState, EngineConfig, EngineError,
};
use fetchbot_core::driver::{
    Driver, DriverError, ProgressObserver, ReportLog, ReportOutcome, RunSummary,
};
use fetchbot_core::queue::{QueuePaths, WorkQueue};
use tempfile::TempDir;

mod support;
use support::site::{PageReply, ScriptedTransport, TICKET_URL, landing_page, message_page};

const OK_LINK: &str = "http://host.example/files/1/first.zip";
const DELETED_LINK: &str = "http://host.example/files/2/gone.zip";
const BROKEN_LINK: &str = "http://host.example/files/3/broken.zip";
const STAGED_LINK: &str = "http://host.example/files/4/late.zip";

#[derive(Debug, Default)]
struct RecordingObserver {
    events: Vec<String>,
}

impl ProgressObserver for RecordingObserver {
    fn on_start(&mut self, url: &str) {
        self.events.push(format!("start {url}"));
    }

    fn on_progress(&mut self, snapshot: &DownloadState) {
        assert!(!snapshot.status.is_terminal());
    }

    fn on_finish(&mut self, outcome: ReportOutcome, snapshot: &DownloadState) {
        assert!(snapshot.status.is_terminal());
        self.events.push(format!("finish {outcome} {}", snapshot.url));
    }

    fn on_invalid(&mut self, url: &str) {
        self.events.push(format!("invalid {url}"));
    }
}

async fn build_driver(dir: &TempDir, transport: Arc<ScriptedTransport>) -> Driver {
    let config = EngineConfig::new(dir.path().join("d"), dir.path().join("s"))
        .with_backoff(BackoffPolicy::immediate());
    let engine = DownloadEngine::start(config, transport).await.unwrap();
    let queue = WorkQueue::open(QueuePaths::in_dir(dir.path())).await.unwrap();
    Driver::new(engine, queue, ReportLog::new(dir.path().join("raports.queue")))
        .with_poll_interval(Duration::from_millis(5))
}

#[tokio::test]
async fn test_driver_drains_queue_and_reports_every_outcome() {
    let dir = TempDir::new().unwrap();
    let paths = QueuePaths::in_dir(dir.path());
    std::fs::write(
        &paths.primary,
        format!("{OK_LINK}\njunk\n{DELETED_LINK}\n{BROKEN_LINK}\n"),
    )
    .unwrap();
    std::fs::write(&paths.extends, format!("{STAGED_LINK}\n")).unwrap();

    let transport = Arc::new(ScriptedTransport::default());
    transport.push_landing(PageReply::ok(landing_page(TICKET_URL)));
    transport.push_landing(PageReply::ok(message_page(
        "This file has been deleted by the uploader.",
    )));
    for _ in 0..5 {
        transport.push_landing(PageReply::ok(message_page("maintenance")));
    }

    let mut driver = build_driver(&dir, transport.clone()).await;
    let mut observer = RecordingObserver::default();
    let summary = driver.run(&mut observer).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            ok: 2,
            canceled: 1,
            not_found: 1,
            invalid: 1,
        }
    );
    assert_eq!(summary.total(), 5);

    let report = std::fs::read_to_string(dir.path().join("raports.queue")).unwrap();
    assert_eq!(
        report,
        format!(
            "OK {OK_LINK}\nINVALID junk\nNOTFOUND {DELETED_LINK}\nCANCEL {BROKEN_LINK}\nOK {STAGED_LINK}\n"
        )
    );

    assert!(driver.queue().is_empty());
    assert_eq!(std::fs::read_to_string(&paths.primary).unwrap(), "");
    assert!(!paths.tempora.exists());

    assert_eq!(
        observer.events,
        vec![
            format!("start {OK_LINK}"),
            format!("finish OK {OK_LINK}"),
            "invalid junk".to_string(),
            format!("start {DELETED_LINK}"),
            format!("finish NOTFOUND {DELETED_LINK}"),
            format!("start {BROKEN_LINK}"),
            format!("finish CANCEL {BROKEN_LINK}"),
            format!("start {STAGED_LINK}"),
            format!("finish OK {STAGED_LINK}"),
        ]
    );

    assert!(dir.path().join("d").join("first.zip").exists());
    assert!(dir.path().join("d").join("late.zip").exists());
}

#[tokio::test]
async fn test_driver_with_empty_queue_returns_immediately() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::default());

    let mut driver = build_driver(&dir, transport.clone()).await;
    let summary = driver.run(&mut RecordingObserver::default()).await.unwrap();

    assert_eq!(summary, RunSummary::default());
    assert!(transport.requests().is_empty());
    assert!(!dir.path().join("raports.queue").exists());
}

#[tokio::test]
async fn test_report_log_appends_to_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("raports.queue");
    std::fs::write(&path, "OK http://host.example/files/9/old.zip\n").unwrap();

    let log = ReportLog::new(&path);
    log.append(ReportOutcome::Cancel, BROKEN_LINK).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        format!("OK http://host.example/files/9/old.zip\nCANCEL {BROKEN_LINK}\n")
    );
}

#[tokio::test]
async fn test_driver_stops_when_worker_dies() {
    let dir = TempDir::new().unwrap();
    let paths = QueuePaths::in_dir(dir.path());
    std::fs::write(&paths.primary, format!("{OK_LINK}\n{STAGED_LINK}\n")).unwrap();
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_landing(PageReply::Panic);

    let mut driver = build_driver(&dir, transport).await;
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        driver.run(&mut RecordingObserver::default()),
    )
    .await
    .expect("driver must not poll a dead worker forever");

    assert!(
        matches!(result, Err(DriverError::Engine(EngineError::WorkerStopped))),
        "{result:?}"
    );
    // The link in flight stays queued for the next run.
    assert_eq!(driver.queue().len(), 2);
    assert!(!dir.path().join("raports.queue").exists());
}
