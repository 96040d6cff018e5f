use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Done | JobStatus::Error => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRef {
    pub document_id: String,
}

/// A server-side job as the client tracks it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    id: String,
    status: JobStatus,
    result_ref: Option<ResultRef>,
}

impl UploadJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            result_ref: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result_ref(&self) -> Option<&ResultRef> {
        self.result_ref.as_ref()
    }

    /// Moves the job forward. Returns false when `next` would go backward or
    /// leave a terminal state, in which case nothing changes.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() {
            return next == self.status;
        }
        if next.rank() < self.status.rank() {
            return false;
        }
        self.status = next;
        true
    }

    /// Only a `done` job can carry a result reference.
    pub fn attach_result(&mut self, document_id: impl Into<String>) -> bool {
        if self.status != JobStatus::Done {
            return false;
        }
        self.result_ref = Some(ResultRef {
            document_id: document_id.into(),
        });
        true
    }
}
