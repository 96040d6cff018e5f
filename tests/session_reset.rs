mod common;

use common::{Call, FakeTransport, Gate, RecordingScheduler, done};
use pii_check::{
    config::Polling,
    job::JobStatus,
    poller::{JobPoller, PollOutcome},
    resolver::{Resolution, ResultResolver},
    schedule::TokioScheduler,
    session::{Session, SessionManager},
    transport::Transport,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn reply_landing_after_reset_is_discarded() {
    let gate = Gate::default();
    let fake = Arc::new(
        FakeTransport::new()
            .with_statuses(vec![Ok(done("doc1"))])
            .with_gate(gate.clone()),
    );
    let transport: Arc<dyn Transport> = fake.clone();
    let poller = JobPoller::new(&Polling::default(), transport.clone(), Arc::new(RecordingScheduler::new()));

    let sessions = SessionManager::new();
    let mut session = sessions.begin("old");

    let task = tokio::spawn(async move {
        let outcome = poller.poll(&mut session).await;
        (session, outcome)
    });

    gate.entered.notified().await;
    sessions.reset();
    gate.release.notify_one();

    let (mut session, outcome) = task.await.unwrap();
    assert_eq!(outcome.unwrap(), PollOutcome::Cancelled);
    assert_eq!(session.job().status(), JobStatus::Pending);

    let resolver = ResultResolver::new(transport);
    let resolution = resolver
        .resolve(&mut session, &PollOutcome::Done { document_id: Some("doc1".into()) })
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::Cancelled);
    assert_eq!(fake.count(|c| matches!(c, Call::Report(_))), 0);
}

#[tokio::test]
async fn new_upload_supersedes_the_old_session() {
    let sessions = SessionManager::new();
    let first = sessions.begin("job-1");
    assert!(first.is_live());

    let second = sessions.begin("job-2");
    assert!(!first.is_live());
    assert!(second.is_live());
    assert_eq!(second.job_id(), "job-2");
    assert!(sessions.has_live_session());

    sessions.reset();
    assert!(!second.is_live());
    assert!(!sessions.has_live_session());
}

#[tokio::test]
async fn cancelled_session_issues_no_requests() {
    let fake = Arc::new(FakeTransport::new());
    let poller = JobPoller::new(&Polling::default(), fake.clone(), Arc::new(RecordingScheduler::new()));
    let mut session = Session::new("abc");
    session.cancel();

    let outcome = poller.poll(&mut session).await.unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn cancel_interrupts_the_backoff_wait() {
    let fake = Arc::new(FakeTransport::new());
    let policy = Polling {
        baseline_delay_ms: 60_000,
        ..Polling::default()
    };
    let poller = JobPoller::new(&policy, fake.clone(), Arc::new(TokioScheduler));
    let sessions = SessionManager::new();
    let mut session = sessions.begin("abc");
    let shutdown = sessions.shutdown_token();

    let task = tokio::spawn(async move { poller.poll(&mut session).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("poller stops promptly")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn reset_does_not_poison_later_sessions() {
    let sessions = SessionManager::new();
    let first = sessions.begin("job-1");
    sessions.reset();
    assert!(!first.is_live());

    let second = sessions.begin("job-2");
    assert!(second.is_live());
    assert!(!sessions.is_shut_down());

    sessions.shutdown_token().cancel();
    assert!(!second.is_live());
    assert!(!sessions.begin("job-3").is_live());
}
