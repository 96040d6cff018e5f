use crate::{
    config::Config,
    error::{ClientError, ClientResult},
    job::UploadJob,
    poller::{JobPoller, PollOutcome},
    resolver::{Resolution, ResultResolver},
    schedule::Scheduler,
    session::{Session, SessionManager},
    submit::UploadSubmitter,
    transport::{Transport, UploadPayload},
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Submit -> poll -> resolve for one upload at a time.
///
/// Every method takes `&self`, so a shared `Pipeline` can be reset from one
/// task while another is inside `run_upload`.
pub struct Pipeline {
    submitter: UploadSubmitter,
    poller: JobPoller,
    resolver: ResultResolver,
    sessions: SessionManager,
}

pub struct JobOutput {
    pub job: UploadJob,
    pub poll: PollOutcome,
    pub resolution: Option<Resolution>,
    /// Report fetch failure. The job itself stays `done`.
    pub report_error: Option<ClientError>,
    pub elapsed_ms: u128,
}

impl JobOutput {
    pub fn document_id(&self) -> Option<&str> {
        self.job.result_ref().map(|r| r.document_id.as_str())
    }

    /// Why this run did not end with a usable result, if it didn't.
    pub fn failure(&self) -> Option<String> {
        match &self.poll {
            PollOutcome::Failed { message } => Some(format!(
                "job {} failed: {}",
                self.job.id(),
                message.as_deref().unwrap_or("no error message")
            )),
            PollOutcome::Cancelled => Some(format!("job {} was cancelled", self.job.id())),
            PollOutcome::Done { .. } => self.report_error.as_ref().map(|err| err.to_string()),
        }
    }
}

impl Pipeline {
    pub fn new(cfg: &Config, transport: Arc<dyn Transport>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            submitter: UploadSubmitter::new(cfg, transport.clone()),
            poller: JobPoller::new(&cfg.polling, transport.clone(), scheduler),
            resolver: ResultResolver::new(transport),
            sessions: SessionManager::new(),
        }
    }

    /// Cancels the running session and every later one. Use `reset` to
    /// abandon only the current upload.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.sessions.shutdown_token()
    }

    /// Abandons the current session. The next `run_upload` starts clean.
    pub fn reset(&self) {
        self.sessions.reset();
    }

    /// Starts a fresh session for a job id obtained elsewhere.
    pub fn attach(&self, job_id: &str) -> Session {
        self.sessions.begin(job_id)
    }

    pub async fn run_upload(&self, upload: &UploadPayload) -> ClientResult<JobOutput> {
        if self.sessions.is_shut_down() {
            return Err(ClientError::ShutDown);
        }
        let started = Instant::now();
        let job_id = self.submitter.submit(upload).await?;
        let mut session = self.sessions.begin(job_id);
        self.drive(&mut session, started).await
    }

    /// Polls and resolves an already-started session.
    pub async fn drive(&self, session: &mut Session, started: Instant) -> ClientResult<JobOutput> {
        let poll = self.poller.poll(session).await?;

        let (resolution, report_error) = match self.resolver.resolve(session, &poll).await {
            Ok(resolution) => (Some(resolution), None),
            Err(err) => {
                warn!("job_id={} {err}", session.job_id());
                (None, Some(err))
            }
        };

        if let Some(Resolution::Delivered(report)) = &resolution {
            info!(
                "job_id={} types={:?} max_score={:?}",
                session.job_id(),
                report.count_by_type(),
                report.max_score()
            );
        }

        Ok(JobOutput {
            job: session.job().clone(),
            poll,
            resolution,
            report_error,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}
