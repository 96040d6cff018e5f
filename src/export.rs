use crate::{
    error::{ClientError, ClientResult, TransportError},
    transport::Transport,
    util::sha256_hex,
};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Redacted PDF.
    Redacted,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn filename(self, document_id: &str) -> String {
        let id = safe_component(document_id);
        match self {
            ExportFormat::Redacted => format!("redacted_{id}.pdf"),
            ExportFormat::Json => format!("detections_{id}.json"),
            ExportFormat::Csv => format!("detections_{id}.csv"),
        }
    }
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"));
static DIGEST_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[0-9a-f]{8}$").expect("static regex"));

/// Ids that are already safe pass through. Anything rewritten gets a short
/// digest of the raw id appended, and so does a safe id that already ends in
/// something digest-shaped, so two distinct ids never share a filename.
fn safe_component(id: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(id, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned == id && !cleaned.is_empty() && !DIGEST_SUFFIX.is_match(id) {
        return cleaned.to_string();
    }
    let digest = sha256_hex(id.as_bytes());
    let stem = if cleaned.is_empty() { "document" } else { cleaned };
    format!("{stem}-{}", &digest[..8])
}

#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub document_id: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Local save capability for fetched artifacts.
pub trait FileSaver: Send + Sync {
    fn save(&self, artifact: &ExportArtifact) -> ClientResult<SavedArtifact>;
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Saves artifacts under a fixed directory using their suggested filename.
#[derive(Debug, Clone)]
pub struct DirSaver {
    dir: PathBuf,
}

impl DirSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSaver for DirSaver {
    fn save(&self, artifact: &ExportArtifact) -> ClientResult<SavedArtifact> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.filename);
        std::fs::write(&path, &artifact.bytes)?;
        Ok(SavedArtifact {
            path,
            bytes: artifact.bytes.len() as u64,
            sha256: sha256_hex(&artifact.bytes),
        })
    }
}

pub struct ExportRequester {
    transport: Arc<dyn Transport>,
}

impl ExportRequester {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetches an artifact for a resolved document. Without a document id this
    /// returns `ExportNotReady` and makes no request. Failures are not retried.
    pub async fn fetch(
        &self,
        document_id: Option<&str>,
        format: ExportFormat,
    ) -> ClientResult<ExportArtifact> {
        let Some(document_id) = document_id.filter(|id| !id.is_empty()) else {
            return Err(ClientError::ExportNotReady);
        };

        let bytes = self
            .transport
            .export(format, document_id)
            .await
            .map_err(|err| match err {
                TransportError::Status { status, .. } => ClientError::ExportFetch {
                    document_id: document_id.to_string(),
                    status,
                },
                source => ClientError::ExportTransport {
                    document_id: document_id.to_string(),
                    source,
                },
            })?;

        info!(
            "export document_id={document_id} format={format:?} bytes={}",
            bytes.len()
        );
        Ok(ExportArtifact {
            document_id: document_id.to_string(),
            format,
            filename: format.filename(document_id),
            bytes,
        })
    }

    pub async fn fetch_and_save(
        &self,
        document_id: Option<&str>,
        format: ExportFormat,
        saver: &dyn FileSaver,
    ) -> ClientResult<SavedArtifact> {
        let artifact = self.fetch(document_id, format).await?;
        let saved = saver.save(&artifact)?;
        info!("saved {} ({} bytes)", saved.path.display(), saved.bytes);
        Ok(saved)
    }
}
