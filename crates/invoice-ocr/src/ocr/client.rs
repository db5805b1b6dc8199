use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::Instrument;

use crate::config::OcrSettings;
use crate::error::OcrError;
use crate::sanitize::redact_url;

/// Maximum length of an error body kept in `OcrError::Status`.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Connect timeout for OCR requests. The overall request timeout comes from settings.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Multipart field name the OCR webhook reads the upload from.
const FILE_FIELD: &str = "file";

/// A document read fresh from disk for one OCR attempt.
#[derive(Debug, Clone)]
pub struct OcrDocument {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// One attempt against one OCR endpoint.
#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn extract(&self, endpoint: &str, document: OcrDocument) -> Result<Value, OcrError>;
}

/// `OcrClient` that uploads the document as multipart form data with a bearer token.
#[derive(Clone)]
pub struct HttpOcrClient {
    inner: Arc<HttpOcrClientInner>,
}

struct HttpOcrClientInner {
    client: Client,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl HttpOcrClient {
    pub fn new(settings: &OcrSettings) -> Result<Self, OcrError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| OcrError::ClientBuild(e.to_string()))?;

        let api_key = settings
            .api_key
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_string()));

        Ok(Self {
            inner: Arc::new(HttpOcrClientInner {
                client,
                api_key,
                timeout: settings.request_timeout,
            }),
        })
    }

    fn map_send_error(&self, endpoint: &str, err: reqwest::Error) -> OcrError {
        if err.is_timeout() {
            OcrError::Timeout {
                endpoint: redact_url(endpoint),
                timeout_secs: self.inner.timeout.as_secs(),
            }
        } else {
            OcrError::Transport {
                endpoint: redact_url(endpoint),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn extract(&self, endpoint: &str, document: OcrDocument) -> Result<Value, OcrError> {
        let span = tracing::info_span!("ocr.request", endpoint = %redact_url(endpoint));
        self.send_document(endpoint, document).instrument(span).await
    }
}

impl HttpOcrClient {
    async fn send_document(
        &self,
        endpoint: &str,
        document: OcrDocument,
    ) -> Result<Value, OcrError> {
        debug!(
            "Uploading {} ({} bytes, {}) to {}",
            document.filename,
            document.bytes.len(),
            document.mime_type,
            redact_url(endpoint)
        );

        let part = Part::bytes(document.bytes)
            .file_name(document.filename)
            .mime_str(&document.mime_type)
            .map_err(|e| OcrError::Transport {
                endpoint: redact_url(endpoint),
                message: format!("invalid media type: {}", e),
            })?;
        let form = Form::new().part(FILE_FIELD, part);

        let mut request = self.inner.client.post(endpoint).multipart(form);
        if let Some(ref key) = self.inner.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Status {
                endpoint: redact_url(endpoint),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(endpoint, e))?;

        serde_json::from_slice(&bytes).map_err(|e| OcrError::InvalidResponse {
            endpoint: redact_url(endpoint),
            message: e.to_string(),
        })
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}
