#![allow(dead_code)]

use async_trait::async_trait;
use pii_check::{
    error::TransportError,
    export::ExportFormat,
    schedule::Scheduler,
    transport::{ReportOut, StatusOut, SubmitOut, Transport, UploadPayload},
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Submit(String),
    Status(String),
    Report(String),
    Export(ExportFormat, String),
    Feedback(String),
}

/// Scripted in-memory server. Status replies are consumed in order; once the
/// script runs out every poll answers `pending`.
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    submit: Mutex<Option<Result<SubmitOut, TransportError>>>,
    statuses: Mutex<VecDeque<Result<StatusOut, TransportError>>>,
    report: Mutex<Option<Result<ReportOut, TransportError>>>,
    export: Mutex<Option<Result<Vec<u8>, TransportError>>>,
    gate: Option<Gate>,
}

/// Holds each status request open until the test releases it.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_id(self, job_id: &str) -> Self {
        *self.submit.lock().unwrap() = Some(Ok(SubmitOut {
            job_id: Some(job_id.to_string()),
            detail: None,
        }));
        self
    }

    pub fn with_submit(self, reply: Result<SubmitOut, TransportError>) -> Self {
        *self.submit.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_statuses(self, replies: Vec<Result<StatusOut, TransportError>>) -> Self {
        self.statuses.lock().unwrap().extend(replies);
        self
    }

    pub fn with_report(self, reply: Result<ReportOut, TransportError>) -> Self {
        *self.report.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_export(self, reply: Result<Vec<u8>, TransportError>) -> Self {
        *self.export.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn submit(&self, upload: &UploadPayload) -> Result<SubmitOut, TransportError> {
        self.record(Call::Submit(upload.filename.clone()));
        self.submit
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(SubmitOut::default()))
    }

    async fn status(&self, job_id: &str) -> Result<StatusOut, TransportError> {
        self.record(Call::Status(job_id.to_string()));
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(status("pending")))
    }

    async fn report(&self, document_id: &str) -> Result<ReportOut, TransportError> {
        self.record(Call::Report(document_id.to_string()));
        self.report
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(ReportOut::default()))
    }

    async fn export(
        &self,
        format: ExportFormat,
        document_id: &str,
    ) -> Result<Vec<u8>, TransportError> {
        self.record(Call::Export(format, document_id.to_string()));
        self.export
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn feedback(&self, text: &str) -> Result<serde_json::Value, TransportError> {
        self.record(Call::Feedback(text.to_string()));
        Ok(serde_json::json!({"status": "ok"}))
    }
}

/// Returns immediately and records every requested delay on a virtual clock.
pub struct RecordingScheduler {
    base: Instant,
    delays: Mutex<Vec<Duration>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            delays: Mutex::new(Vec::new()),
        }
    }

    pub fn delays_ms(&self) -> Vec<u128> {
        self.delays
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_millis())
            .collect()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }

    fn now(&self) -> Instant {
        let elapsed: Duration = self.delays.lock().unwrap().iter().sum();
        self.base + elapsed
    }
}

pub fn status(s: &str) -> StatusOut {
    serde_json::from_value(serde_json::json!({ "status": s })).unwrap()
}

pub fn done(document_id: &str) -> StatusOut {
    serde_json::from_value(serde_json::json!({
        "status": "done",
        "result": { "document_id": document_id }
    }))
    .unwrap()
}

pub fn report(json: serde_json::Value) -> ReportOut {
    serde_json::from_value(json).unwrap()
}

pub fn net_err() -> TransportError {
    TransportError::network("connection refused")
}

pub fn payload(name: &str, bytes: &[u8]) -> UploadPayload {
    UploadPayload {
        filename: name.to_string(),
        bytes: bytes.to_vec(),
        content_type: None,
    }
}
