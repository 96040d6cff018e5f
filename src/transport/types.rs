use crate::job::JobStatus;
use serde::{Deserialize, Deserializer, Serialize};

/// File content handed to the submit endpoint.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitOut {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

/// Status string as the server sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Pending,
    #[serde(alias = "running")]
    Processing,
    Done,
    Error,
    #[serde(other)]
    Unknown,
}

impl WireStatus {
    pub fn job_status(self) -> Option<JobStatus> {
        match self {
            WireStatus::Pending => Some(JobStatus::Pending),
            WireStatus::Processing => Some(JobStatus::Processing),
            WireStatus::Done => Some(JobStatus::Done),
            WireStatus::Error => Some(JobStatus::Error),
            WireStatus::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusOut {
    #[serde(default)]
    pub status: Option<WireStatus>,
    #[serde(default)]
    pub result: Option<ResultRefOut>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusOut {
    pub fn document_id(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.document_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultRefOut {
    #[serde(default, deserialize_with = "opaque_id")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub detections_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportOut {
    #[serde(default, deserialize_with = "opaque_id")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub detections: Vec<crate::report::DetectionRecord>,
}

/// Document ids come back as strings or integers depending on the backend.
fn opaque_id<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Str(String),
        Int(i64),
    }

    Ok(match Option::<Repr>::deserialize(de)? {
        Some(Repr::Str(s)) if !s.is_empty() => Some(s),
        Some(Repr::Int(n)) => Some(n.to_string()),
        _ => None,
    })
}
