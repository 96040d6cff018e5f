//! Error types for the scan client.

use thiserror::Error;

/// Failure at the wire level, before any lifecycle meaning is attached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {message}")]
    Decode { message: String },
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Lifecycle errors surfaced to the caller. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("upload rejected: {reason}")]
    UploadRejected { reason: String },

    #[error("client is shutting down; nothing was submitted")]
    ShutDown,

    #[error("upload failed: {0}")]
    SubmitNetwork(#[source] TransportError),

    #[error("polling abandoned for job {job_id} after {attempts} failed attempts: {reason}")]
    PollAbandoned {
        job_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("report fetch failed for document {document_id}: {source}")]
    ReportFetch {
        document_id: String,
        #[source]
        source: TransportError,
    },

    #[error("export not ready: no document has been resolved")]
    ExportNotReady,

    #[error("export failed for document {document_id} (status {status})")]
    ExportFetch { document_id: String, status: u16 },

    #[error("export request failed for document {document_id}: {source}")]
    ExportTransport {
        document_id: String,
        #[source]
        source: TransportError,
    },

    #[error("feedback failed: {0}")]
    Feedback(#[source] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// HTTP status carried by the failure, when the server produced one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::ExportFetch { status, .. } => Some(*status),
            Self::ReportFetch { source, .. }
            | Self::ExportTransport { source, .. }
            | Self::SubmitNetwork(source)
            | Self::Feedback(source) => source.status_code(),
            _ => None,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
