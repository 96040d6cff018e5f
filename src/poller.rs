use crate::{
    config::Polling,
    error::{ClientError, ClientResult},
    job::JobStatus,
    schedule::Scheduler,
    session::Session,
    transport::{StatusOut, Transport},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Done { document_id: Option<String> },
    Failed { message: Option<String> },
    Cancelled,
}

/// Polls one session's job until it reaches a terminal status.
///
/// Exactly one status request is outstanding at a time; the next one is
/// scheduled only after the previous reply (or failure) has been handled.
/// Every write to the session is preceded by a liveness check, so a reply
/// that lands after the session was cancelled is dropped.
pub struct JobPoller {
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    policy: Polling,
}

impl JobPoller {
    pub fn new(policy: &Polling, transport: Arc<dyn Transport>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            transport,
            scheduler,
            policy: policy.clone(),
        }
    }

    pub async fn poll(&self, session: &mut Session) -> ClientResult<PollOutcome> {
        if session.job().status().is_terminal() {
            return Ok(session
                .outcome()
                .cloned()
                .unwrap_or_else(|| settled(session, None)));
        }

        let token = session.token();
        let started = self.scheduler.now();
        let mut polls: u32 = 0;
        let mut consecutive_errors: u32 = 0;

        loop {
            if !session.is_live() {
                return Ok(PollOutcome::Cancelled);
            }

            polls += 1;
            let reply = self.transport.status(session.job_id()).await;

            if !session.is_live() {
                info!(
                    "job_id={} dropping status reply: session cancelled",
                    session.job_id()
                );
                return Ok(PollOutcome::Cancelled);
            }

            let delay = match reply {
                Ok(out) => {
                    consecutive_errors = 0;
                    if let Some(outcome) = self.apply(session, &out)? {
                        info!("job_id={} settled after {polls} polls", session.job_id());
                        return Ok(outcome);
                    }
                    self.policy.baseline_delay()
                }
                Err(err) => {
                    consecutive_errors += 1;
                    warn!(
                        "job_id={} status poll failed ({consecutive_errors} in a row): {err}",
                        session.job_id()
                    );
                    let max = self.policy.max_consecutive_transport_errors;
                    if max > 0 && consecutive_errors >= max {
                        return Err(ClientError::PollAbandoned {
                            job_id: session.job_id().to_string(),
                            attempts: consecutive_errors,
                            reason: err.to_string(),
                        });
                    }
                    self.policy.retry_delay()
                }
            };

            if let Some(deadline) = self.policy.deadline() {
                let elapsed = self.scheduler.now().saturating_duration_since(started);
                if elapsed + delay > deadline {
                    return Err(ClientError::PollAbandoned {
                        job_id: session.job_id().to_string(),
                        attempts: polls,
                        reason: format!("deadline of {}s exceeded", deadline.as_secs()),
                    });
                }
            }

            if !self.wait(session, &token, delay).await {
                return Ok(PollOutcome::Cancelled);
            }
        }
    }

    /// Returns the terminal outcome if this reply settled the job.
    fn apply(&self, session: &mut Session, out: &StatusOut) -> ClientResult<Option<PollOutcome>> {
        let Some(wire) = out.status else {
            return Err(ClientError::JobNotFound {
                job_id: session.job_id().to_string(),
            });
        };
        let Some(status) = wire.job_status() else {
            warn!(
                "job_id={} unrecognised status; keeping {}",
                session.job_id(),
                session.job().status()
            );
            return Ok(None);
        };

        session.apply_status(status);
        if session.job().status().is_terminal() {
            let outcome = settled(session, Some(out));
            session.record_outcome(&outcome);
            return Ok(Some(outcome));
        }
        Ok(None)
    }

    async fn wait(
        &self,
        session: &Session,
        token: &tokio_util::sync::CancellationToken,
        delay: Duration,
    ) -> bool {
        if !session.is_live() {
            return false;
        }
        debug!("job_id={} next poll in {:?}", session.job_id(), delay);
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = self.scheduler.sleep(delay) => session.is_live(),
        }
    }
}

fn settled(session: &Session, out: Option<&StatusOut>) -> PollOutcome {
    match session.job().status() {
        JobStatus::Done => PollOutcome::Done {
            document_id: out
                .and_then(|o| o.document_id())
                .or(session.document_id())
                .map(str::to_string),
        },
        _ => PollOutcome::Failed {
            message: out.and_then(|o| o.error.clone()),
        },
    }
}
