//! The analysis boundary: the external inference service behind one
//! multipart POST, consumed through a trait so tests and embedders can
//! substitute their own transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart;
use shared::{
    error::{AnalysisFailure, FailureKind, GENERIC_FAILURE_MESSAGE},
    protocol::{AnalyzeResponse, ErrorBody, HealthResponse},
};
use tracing::warn;

/// One outbound analysis request: the selected image plus the prompt.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub filename: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
    pub prompt: String,
    /// Appended as an extra form part when set; the boundary applies its
    /// own default otherwise.
    pub max_new_tokens: Option<u32>,
}

#[async_trait]
pub trait AnalysisBoundary: Send + Sync {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeResponse, AnalysisFailure>;
    async fn health(&self) -> Result<HealthResponse, AnalysisFailure>;
}

/// Placeholder wired in when no boundary has been configured.
pub struct MissingAnalysisBoundary;

#[async_trait]
impl AnalysisBoundary for MissingAnalysisBoundary {
    async fn analyze(&self, _request: AnalyzeRequest) -> Result<AnalyzeResponse, AnalysisFailure> {
        Err(AnalysisFailure::new(
            FailureKind::Network,
            "analysis boundary is unavailable",
        ))
    }

    async fn health(&self) -> Result<HealthResponse, AnalysisFailure> {
        Err(AnalysisFailure::new(
            FailureKind::Network,
            "analysis boundary is unavailable",
        ))
    }
}

/// The real boundary client. Every failure mode collapses into an
/// `AnalysisFailure`; nothing here panics or retries.
pub struct HttpAnalysisBoundary {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisBoundary {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Uses a caller-built client, e.g. one carrying a request timeout.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn form_for(request: &AnalyzeRequest) -> Result<multipart::Form, AnalysisFailure> {
        let image_part = multipart::Part::bytes(request.bytes.to_vec())
            .file_name(request.filename.clone())
            .mime_str(&request.media_type)
            .map_err(|err| {
                warn!(media_type = %request.media_type, "analysis: invalid media type: {err}");
                AnalysisFailure::new(FailureKind::Validation, GENERIC_FAILURE_MESSAGE)
            })?;

        let mut form = multipart::Form::new()
            .part("image", image_part)
            .text("prompt", request.prompt.clone());
        if let Some(max_new_tokens) = request.max_new_tokens {
            form = form.text("max_new_tokens", max_new_tokens.to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl AnalysisBoundary for HttpAnalysisBoundary {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeResponse, AnalysisFailure> {
        let form = Self::form_for(&request)?;

        let response = self
            .http
            .post(format!("{}/analyze", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                warn!("analysis: request did not reach the boundary: {err}");
                AnalysisFailure::network()
            })?;

        let status = response.status();
        if status.is_success() {
            response.json::<AnalyzeResponse>().await.map_err(|err| {
                warn!(status = status.as_u16(), "analysis: unparseable success body: {err}");
                AnalysisFailure::unexpected_response()
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.message().map(str::to_string))
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            warn!(status = status.as_u16(), %message, "analysis: boundary returned an error");
            Err(AnalysisFailure::server(message))
        }
    }

    async fn health(&self) -> Result<HealthResponse, AnalysisFailure> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|err| {
                warn!("analysis: health probe did not reach the boundary: {err}");
                AnalysisFailure::network()
            })?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<HealthResponse>()
                .await
                .map_err(|_| AnalysisFailure::unexpected_response())
        } else {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.message().map(str::to_string))
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            Err(AnalysisFailure::server(message))
        }
    }
}
