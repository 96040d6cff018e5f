mod common;

use common::{Call, FakeTransport, RecordingScheduler, done, net_err, report, status};
use pii_check::{
    config::Polling,
    error::{ClientError, TransportError},
    job::JobStatus,
    poller::{JobPoller, PollOutcome},
    resolver::{Resolution, ResultResolver},
    session::Session,
    transport::{StatusOut, Transport},
};
use std::sync::Arc;

async fn poll_and_resolve(fake: &Arc<FakeTransport>, session: &mut Session) -> (PollOutcome, Result<Resolution, ClientError>) {
    let transport: Arc<dyn Transport> = fake.clone();
    let poller = JobPoller::new(
        &Polling::default(),
        transport.clone(),
        Arc::new(RecordingScheduler::new()),
    );
    let resolver = ResultResolver::new(transport);
    let outcome = poller.poll(session).await.unwrap();
    let resolution = resolver.resolve(session, &outcome).await;
    (outcome, resolution)
}

#[tokio::test]
async fn one_report_fetch_after_the_done_poll() {
    let fake = Arc::new(
        FakeTransport::new()
            .with_statuses(vec![
                Ok(status("pending")),
                Ok(status("pending")),
                Ok(done("doc1")),
            ])
            .with_report(Ok(report(serde_json::json!({
                "detections": [{"type": "PAN", "value": "ABCDE1234F", "score": 0.95}]
            })))),
    );
    let mut session = Session::new("abc");

    let (_, resolution) = poll_and_resolve(&fake, &mut session).await;

    assert!(matches!(resolution.unwrap(), Resolution::Delivered(_)));
    assert_eq!(
        fake.calls(),
        vec![
            Call::Status("abc".into()),
            Call::Status("abc".into()),
            Call::Status("abc".into()),
            Call::Report("doc1".into()),
        ]
    );
    assert_eq!(session.document_id(), Some("doc1"));
}

#[tokio::test]
async fn transient_error_does_not_double_trigger() {
    let fake = Arc::new(FakeTransport::new().with_statuses(vec![
        Ok(status("pending")),
        Err(net_err()),
        Ok(done("doc1")),
    ]));
    let mut session = Session::new("abc");

    let (_, resolution) = poll_and_resolve(&fake, &mut session).await;

    assert!(resolution.is_ok());
    assert_eq!(fake.count(|c| matches!(c, Call::Report(_))), 1);
}

#[tokio::test]
async fn second_resolve_is_refused() {
    let fake = Arc::new(FakeTransport::new().with_statuses(vec![Ok(done("doc1"))]));
    let mut session = Session::new("abc");
    let (outcome, first) = poll_and_resolve(&fake, &mut session).await;
    assert!(first.is_ok());

    let resolver = ResultResolver::new(fake.clone());
    let second = resolver.resolve(&mut session, &outcome).await.unwrap();

    assert_eq!(second, Resolution::AlreadyResolved);
    assert_eq!(fake.count(|c| matches!(c, Call::Report(_))), 1);
}

#[tokio::test]
async fn done_without_document_skips_report() {
    let fake = Arc::new(FakeTransport::new().with_statuses(vec![Ok(status("done"))]));
    let mut session = Session::new("abc");

    let (outcome, resolution) = poll_and_resolve(&fake, &mut session).await;

    assert_eq!(outcome, PollOutcome::Done { document_id: None });
    assert_eq!(resolution.unwrap(), Resolution::NoDocument);
    assert_eq!(fake.count(|c| matches!(c, Call::Report(_))), 0);
    assert_eq!(session.job().status(), JobStatus::Done);
}

#[tokio::test]
async fn report_failure_is_surfaced_once_and_job_stays_done() {
    let fake = Arc::new(
        FakeTransport::new()
            .with_statuses(vec![Ok(done("doc1"))])
            .with_report(Err(TransportError::Status {
                status: 500,
                body: "boom".into(),
            })),
    );
    let mut session = Session::new("abc");

    let (outcome, resolution) = poll_and_resolve(&fake, &mut session).await;

    let err = resolution.unwrap_err();
    assert!(matches!(err, ClientError::ReportFetch { .. }));
    assert_eq!(err.http_status(), Some(500));
    assert_eq!(session.job().status(), JobStatus::Done);

    let resolver = ResultResolver::new(fake.clone());
    let again = resolver.resolve(&mut session, &outcome).await.unwrap();
    assert_eq!(again, Resolution::AlreadyResolved);
    assert_eq!(fake.count(|c| matches!(c, Call::Report(_))), 1);
}

#[tokio::test]
async fn error_job_is_not_resolved() {
    let failed: StatusOut = serde_json::from_value(serde_json::json!({"status": "error"})).unwrap();
    let fake = Arc::new(FakeTransport::new().with_statuses(vec![Ok(failed)]));
    let mut session = Session::new("abc");

    let (_, resolution) = poll_and_resolve(&fake, &mut session).await;

    assert_eq!(resolution.unwrap(), Resolution::NotDone);
    assert_eq!(fake.count(|c| matches!(c, Call::Report(_))), 0);
}

#[tokio::test]
async fn detection_order_and_fields_are_preserved() {
    let detections = serde_json::json!([
        {"type": "EMAIL", "value": "x@y.z", "score": 0.5, "start": 40, "end": 45},
        {"type": "PAN", "value": "ABCDE1234F", "score": 0.95, "start": 3, "end": 13},
        {"type": "PHONE", "value": "9876543210", "score": null}
    ]);
    let fake = Arc::new(
        FakeTransport::new()
            .with_statuses(vec![Ok(done("doc1"))])
            .with_report(Ok(report(serde_json::json!({ "detections": detections.clone() })))),
    );
    let mut session = Session::new("abc");

    let (_, resolution) = poll_and_resolve(&fake, &mut session).await;

    let Resolution::Delivered(rep) = resolution.unwrap() else {
        panic!("expected a delivered report");
    };
    assert_eq!(rep.document_id, "doc1");
    assert_eq!(serde_json::to_value(&rep.detections).unwrap(), detections);
}
