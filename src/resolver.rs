use crate::{
    error::{ClientError, ClientResult},
    poller::PollOutcome,
    report::Report,
    session::Session,
    transport::Transport,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Delivered(Report),
    /// The job finished but the server named no document.
    NoDocument,
    /// The job did not finish successfully; there is nothing to resolve.
    NotDone,
    Cancelled,
    AlreadyResolved,
}

/// Turns a `done` job into its detection report. Fires at most once per session.
pub struct ResultResolver {
    transport: Arc<dyn Transport>,
}

impl ResultResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// A failed report fetch is returned as an error but leaves the job `done`;
    /// it is not retried, and a second call reports `AlreadyResolved`.
    pub async fn resolve(
        &self,
        session: &mut Session,
        outcome: &PollOutcome,
    ) -> ClientResult<Resolution> {
        let document_id = match outcome {
            PollOutcome::Done { document_id } => document_id.clone(),
            PollOutcome::Cancelled => return Ok(Resolution::Cancelled),
            PollOutcome::Failed { .. } => return Ok(Resolution::NotDone),
        };

        if !session.is_live() {
            return Ok(Resolution::Cancelled);
        }
        if !session.begin_resolution() {
            return Ok(Resolution::AlreadyResolved);
        }

        let Some(document_id) = document_id else {
            info!("job_id={} done without a document id", session.job_id());
            return Ok(Resolution::NoDocument);
        };
        if !session.attach_result(&document_id) {
            warn!(
                "job_id={} cannot attach document {document_id} in status {}",
                session.job_id(),
                session.job().status()
            );
            return Ok(Resolution::NotDone);
        }

        let out = self
            .transport
            .report(&document_id)
            .await
            .map_err(|source| ClientError::ReportFetch {
                document_id: document_id.clone(),
                source,
            })?;

        if !session.is_live() {
            info!(
                "job_id={} dropping report for {document_id}: session cancelled",
                session.job_id()
            );
            return Ok(Resolution::Cancelled);
        }

        info!(
            "job_id={} document_id={document_id} detections={}",
            session.job_id(),
            out.detections.len()
        );
        Ok(Resolution::Delivered(Report {
            document_id,
            detections: out.detections,
        }))
    }
}
