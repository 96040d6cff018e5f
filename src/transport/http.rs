use super::{ReportOut, StatusOut, SubmitOut, Transport, UploadPayload};
use crate::{config::Config, error::TransportError, export::ExportFormat};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, multipart};
use std::time::Duration;
use tracing::debug;

/// `Transport` over HTTP, with routes taken from `[server]` and `[routes]`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    cfg: Config,
}

impl HttpTransport {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.server.request_timeout_seconds))
            .user_agent(&cfg.server.user_agent)
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self {
            client,
            cfg: cfg.clone(),
        })
    }

    fn with_document(&self, route: &str, document_id: &str) -> String {
        format!(
            "{}?document_id={}",
            self.cfg.url(route),
            urlencoding::encode(document_id)
        )
    }

    fn export_route(&self, format: ExportFormat) -> &str {
        match format {
            ExportFormat::Redacted => &self.cfg.routes.export_redacted,
            ExportFormat::Json => &self.cfg.routes.export_json,
            ExportFormat::Csv => &self.cfg.routes.export_csv,
        }
    }
}

async fn ok_or_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(TransportError::Status {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, upload: &UploadPayload) -> Result<SubmitOut, TransportError> {
        let url = self.cfg.url(&self.cfg.routes.submit);
        debug!("POST {url} filename={} bytes={}", upload.filename, upload.bytes.len());

        let mut part = multipart::Part::bytes(upload.bytes.clone()).file_name(upload.filename.clone());
        if let Some(mime) = upload.content_type.as_deref() {
            part = part.mime_str(mime)?;
        }
        let form = multipart::Form::new().part(self.cfg.upload.field_name.clone(), part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let response = ok_or_status(response).await?;
        Ok(response.json().await?)
    }

    async fn status(&self, job_id: &str) -> Result<StatusOut, TransportError> {
        let url = format!(
            "{}/{}",
            self.cfg.url(&self.cfg.routes.status).trim_end_matches('/'),
            urlencoding::encode(job_id)
        );
        debug!("GET {url}");
        let response = ok_or_status(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn report(&self, document_id: &str) -> Result<ReportOut, TransportError> {
        let url = self.with_document(&self.cfg.routes.report, document_id);
        debug!("GET {url}");
        let response = ok_or_status(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn export(
        &self,
        format: ExportFormat,
        document_id: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let url = self.with_document(self.export_route(format), document_id);
        debug!("GET {url}");
        let response = ok_or_status(self.client.get(&url).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn feedback(&self, text: &str) -> Result<serde_json::Value, TransportError> {
        let url = self.cfg.url(&self.cfg.routes.feedback);
        debug!("POST {url} chars={}", text.chars().count());
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "feedback": text }))
            .send()
            .await?;
        let response = ok_or_status(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| TransportError::Decode {
            message: e.to_string(),
        })
    }
}
