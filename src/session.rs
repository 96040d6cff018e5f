//! Per-upload session context.
//!
//! A `Session` owns the job it tracks along with the cancellation token guarding
//! every write to it. Starting a new upload never reuses a session: the
//! `SessionManager` cancels the old token and hands out a fresh `Session`, so
//! continuations still holding the old one stop at their next liveness check.

use crate::{
    job::{JobStatus, UploadJob},
    poller::PollOutcome,
};
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Session {
    job: UploadJob,
    token: CancellationToken,
    outcome: Option<PollOutcome>,
    resolved: bool,
}

impl Session {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self::with_token(job_id, CancellationToken::new())
    }

    pub fn with_token(job_id: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            job: UploadJob::new(job_id),
            token,
            outcome: None,
            resolved: false,
        }
    }

    pub fn job(&self) -> &UploadJob {
        &self.job
    }

    pub fn job_id(&self) -> &str {
        self.job.id()
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Clone of the liveness token, for whoever may need to cancel this session.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn document_id(&self) -> Option<&str> {
        self.job.result_ref().map(|r| r.document_id.as_str())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Outcome the job settled with, once a terminal status was applied.
    pub fn outcome(&self) -> Option<&PollOutcome> {
        self.outcome.as_ref()
    }

    pub(crate) fn record_outcome(&mut self, outcome: &PollOutcome) {
        if self.outcome.is_none() && self.job.status().is_terminal() {
            self.outcome = Some(outcome.clone());
        }
    }

    /// Applies a status if the session is still live. Returns whether it was applied.
    pub(crate) fn apply_status(&mut self, status: JobStatus) -> bool {
        if !self.is_live() {
            debug!("job_id={} discarding status {status}: session cancelled", self.job.id());
            return false;
        }
        let before = self.job.status();
        let applied = self.job.advance(status);
        if !applied {
            debug!(
                "job_id={} refusing status {status} after {before}",
                self.job.id()
            );
        } else if before != status {
            info!("job_id={} status {before} -> {status}", self.job.id());
        }
        applied
    }

    /// Marks resolution as started. Returns false if it already happened.
    pub(crate) fn begin_resolution(&mut self) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        true
    }

    pub(crate) fn attach_result(&mut self, document_id: &str) -> bool {
        self.is_live() && self.job.attach_result(document_id)
    }
}

/// Tracks which session is current and cancels the rest.
///
/// Every session token is a child of the manager's root token, so cancelling
/// `shutdown_token()` reaches whichever session is running. The current slot
/// sits behind a lock: `reset` takes `&self` and can run while another task is
/// driving the session.
#[derive(Debug, Default)]
pub struct SessionManager {
    root: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session for `job_id`, invalidating the previous one.
    pub fn begin(&self, job_id: impl Into<String>) -> Session {
        let session = Session::with_token(job_id, self.root.child_token());
        let previous = self.slot().replace(session.token());
        if let Some(token) = previous {
            token.cancel();
        }
        session
    }

    /// Cancels the current session, if any. Later sessions are unaffected.
    pub fn reset(&self) {
        if let Some(token) = self.slot().take() {
            token.cancel();
        }
    }

    /// Token that cancels every session started from this manager, including
    /// ones begun after it fired.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn has_live_session(&self) -> bool {
        self.slot().as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        // The slot only ever holds a token, so a poisoned guard is still usable.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
