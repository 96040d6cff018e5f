use crate::{
    config::Config,
    error::{ClientError, ClientResult, TransportError},
    transport::{Transport, UploadPayload},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub struct UploadSubmitter {
    transport: Arc<dyn Transport>,
    require_non_empty: bool,
}

impl UploadSubmitter {
    pub fn new(cfg: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            require_non_empty: cfg.upload.require_non_empty,
        }
    }

    /// Sends the payload and returns the queued job id. No retries.
    pub async fn submit(&self, upload: &UploadPayload) -> ClientResult<String> {
        if self.require_non_empty && upload.bytes.is_empty() {
            warn!("refusing to upload empty file {}", upload.filename);
            return Err(ClientError::validation(format!(
                "file is empty: {}",
                upload.filename
            )));
        }

        let out = match self.transport.submit(upload).await {
            Ok(out) => out,
            Err(TransportError::Network { message }) => {
                return Err(ClientError::SubmitNetwork(TransportError::Network { message }));
            }
            Err(err) => {
                return Err(ClientError::UploadRejected {
                    reason: err.to_string(),
                });
            }
        };

        match out.job_id.filter(|id| !id.trim().is_empty()) {
            Some(job_id) => {
                info!("upload queued job_id={job_id} filename={}", upload.filename);
                Ok(job_id)
            }
            None => Err(ClientError::UploadRejected {
                reason: out
                    .detail
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "response has no job_id".to_string()),
            }),
        }
    }
}

/// Reads a local file into an upload payload.
pub async fn payload_from_path(path: &Path) -> ClientResult<UploadPayload> {
    if !path.is_file() {
        return Err(ClientError::validation(format!(
            "no such file: {}",
            path.display()
        )));
    }
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let content_type = guess_content_type(&filename).map(str::to_string);
    Ok(UploadPayload {
        filename,
        bytes,
        content_type,
    })
}

fn guess_content_type(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())?
        .to_ascii_lowercase();
    Some(match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => return None,
    })
}
