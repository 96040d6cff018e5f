pub mod http;
pub mod types;

use crate::{error::TransportError, export::ExportFormat};
use async_trait::async_trait;

pub use http::HttpTransport;
pub use types::{ReportOut, ResultRefOut, StatusOut, SubmitOut, UploadPayload, WireStatus};

/// Everything the client needs from the scan server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, upload: &UploadPayload) -> Result<SubmitOut, TransportError>;
    async fn status(&self, job_id: &str) -> Result<StatusOut, TransportError>;
    async fn report(&self, document_id: &str) -> Result<ReportOut, TransportError>;
    async fn export(
        &self,
        format: ExportFormat,
        document_id: &str,
    ) -> Result<Vec<u8>, TransportError>;
    async fn feedback(&self, text: &str) -> Result<serde_json::Value, TransportError>;
}
