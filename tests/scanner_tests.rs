mod common;

use std::sync::Arc;
use std::time::Duration;

use log::Level;
use tokio::sync::mpsc;

use common::{CaptureLog, FakeProvider, Reply};
use mc_scan_rs::{CoreKind, ScanError, ScanLog, ScanProgress, ScanRequest, ScanSession};

const HOST: &str = "10.0.0.1";

fn drain(rx: &mut mpsc::UnboundedReceiver<ScanProgress>) -> Vec<f64> {
    let mut seen = Vec::new();
    while let Ok(p) = rx.try_recv() {
        seen.push(p.percent);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn never_exceeds_concurrency_limit() {
    for limit in [1usize, 3, 8] {
        let provider = Arc::new(
            FakeProvider::new()
                .with_delay(Duration::from_millis(50))
                .online(HOST, 25570, "Paper 1.20.1", 2, 12.0),
        );
        let session = ScanSession::new(provider.clone(), ScanLog::global());
        let request = ScanRequest::new(HOST, 25560, 25589)
            .unwrap()
            .with_concurrency(limit)
            .with_timeout(Duration::from_secs(1));

        let report = session.run(&request, None).await.unwrap();
        assert_eq!(report.scanned_done, 30);
        assert_eq!(report.found, 1);
        assert!(
            provider.max_in_flight() <= limit,
            "limit {limit} exceeded: {}",
            provider.max_in_flight()
        );
        assert_eq!(provider.max_in_flight(), limit);
    }
}

#[tokio::test(start_paused = true)]
async fn wide_range_keeps_live_tasks_at_the_limit() {
    let provider = Arc::new(FakeProvider::new().with_delay(Duration::from_millis(20)));
    let session = ScanSession::new(provider.clone(), ScanLog::global());
    let request = ScanRequest::new(HOST, 20000, 20499)
        .unwrap()
        .with_concurrency(4)
        .with_retries(1);

    let report = session.run(&request, None).await.unwrap();

    assert_eq!(report.scanned_done, 500);
    assert_eq!(provider.queries(), 500);
    assert!(
        provider.max_live_tasks() <= 4,
        "{} tasks alive at once",
        provider.max_live_tasks()
    );
}

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic_and_ends_at_100() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_delay(Duration::from_millis(5))
            .online(HOST, 25566, "1.20.4", 0, 30.0)
            .online(HOST, 25569, "Spigot 1.8.8", 1, 80.0),
    );
    let session = ScanSession::new(provider, ScanLog::global());
    let request = ScanRequest::new(HOST, 25565, 25571).unwrap().with_concurrency(3);
    let (tx, mut rx) = mpsc::unbounded_channel();

    session.run(&request, Some(tx)).await.unwrap();

    let seen = drain(&mut rx);
    assert_eq!(seen.len(), 8, "start event plus one per port");
    assert_eq!(seen[0], 0.0);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert_eq!(*seen.last().unwrap(), 100.0);
    assert!(rx.recv().await.is_none(), "sender released when the session ends");
}

#[tokio::test(start_paused = true)]
async fn unreachable_range_yields_empty_result() {
    let provider = Arc::new(
        FakeProvider::new()
            .reply(HOST, 25565, Reply::Hang)
            .reply(HOST, 25566, Reply::Hang)
            .reply(HOST, 25567, Reply::Hang),
    );
    let session = ScanSession::new(provider.clone(), ScanLog::global());
    let request = ScanRequest::new(HOST, 25565, 25567)
        .unwrap()
        .with_timeout(Duration::from_millis(200))
        .with_retries(2);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = session.run(&request, Some(tx)).await.unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(report.scanned_done, 3);
    assert_eq!(report.abandoned, 0);
    assert_eq!(provider.queries(), 6, "two attempts per port");
    assert_eq!(drain(&mut rx).last(), Some(&100.0));
}

#[tokio::test]
async fn results_are_typed_and_sorted() {
    let provider = Arc::new(
        FakeProvider::new()
            .online(HOST, 25567, "Forge 1.20.1 Paper-compat", 5, 40.0)
            .online(HOST, 25565, "Paper 1.20.1", 1, 20.0),
    );
    let session = ScanSession::new(provider, ScanLog::global());
    let request = ScanRequest::new(HOST, 25565, 25567).unwrap();

    let report = session.run(&request, None).await.unwrap();

    let ports: Vec<u16> = report.entries.iter().map(|r| r.target.port).collect();
    assert_eq!(ports, vec![25565, 25567]);
    assert!(report.entries.iter().all(|r| r.core_kind == CoreKind::Paper));
    assert_eq!(report.entries[1].players_online, 5);
    assert!(report.entries[0].favicon.is_present());
}

#[tokio::test]
async fn protocol_errors_abandon_only_their_target() {
    let capture = Arc::new(CaptureLog::default());
    let provider = Arc::new(
        FakeProvider::new()
            .reply(HOST, 25565, Reply::Malformed)
            .online(HOST, 25566, "1.20.4", 0, 10.0),
    );
    let session = ScanSession::new(provider.clone(), ScanLog::new(capture.clone()));
    let request = ScanRequest::new(HOST, 25565, 25566).unwrap().with_retries(3);

    let report = session.run(&request, None).await.unwrap();

    assert_eq!(report.found, 1);
    assert_eq!(report.abandoned, 1);
    assert_eq!(provider.queries(), 2, "malformed reply is not retried");
    assert!(capture.contains(Level::Error, "10.0.0.1:25565"));
    assert!(capture.contains(Level::Info, "scan completed: 1 servers, 2 ports"));
}

#[tokio::test]
async fn invalid_request_dispatches_nothing() {
    let provider = Arc::new(FakeProvider::new());
    let session = ScanSession::new(provider.clone(), ScanLog::global());
    let request = ScanRequest {
        host: HOST.into(),
        start_port: 25600,
        end_port: 25565,
        timeout: Duration::from_secs(1),
        concurrency: 10,
        retries: 2,
    };

    let err = session.run(&request, None).await.unwrap_err();
    assert!(matches!(err, ScanError::Config(_)));
    assert_eq!(provider.queries(), 0);
}

#[tokio::test]
async fn faulting_probe_task_aborts_the_session() {
    let capture = Arc::new(CaptureLog::default());
    let provider = Arc::new(FakeProvider::new().reply(HOST, 25566, Reply::Panic));
    let session = ScanSession::new(provider, ScanLog::new(capture.clone()));
    let request = ScanRequest::new(HOST, 25565, 25567).unwrap();

    let err = session.run(&request, None).await.unwrap_err();
    assert!(matches!(err, ScanError::Session(_)));
    assert!(capture.contains(Level::Error, "aborted"));
}
