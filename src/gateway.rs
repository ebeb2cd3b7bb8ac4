//! Remote gateway for the PhyLab backend REST API
//!
//! Wraps every backend call behind one base-URL resolver: the configured
//! primary URL plus ordered fallbacks, tried in sequence under a uniform
//! per-attempt timeout. Transport and HTTP failures never escape as errors;
//! they are folded into a structured [`FetchOutcome`] the caller branches on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};

/// Structured result of a gateway call.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub ok: bool,
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: None,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Typed view over the JSON payload. Shape mismatches degrade to `None`
    /// rather than erroring; models default their own fields.
    pub fn parse<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// One file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Multipart form payload: text fields plus at most one file part.
#[derive(Debug, Clone, Default)]
pub struct FormPayload {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

impl FormPayload {
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.file = Some(part);
        self
    }
}

/// The seam between the services and the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Issue a JSON request against the candidate URL ring.
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> FetchOutcome;

    /// Issue a multipart POST against the candidate URL ring.
    async fn send_form(&self, path: &str, form: FormPayload) -> FetchOutcome;

    /// Download a binary document (e.g. the inventory spreadsheet export).
    async fn download(&self, path: &str) -> AppResult<Vec<u8>>;
}

/// Production gateway backed by `reqwest`.
pub struct RemoteGateway {
    client: Client,
    candidates: Vec<String>,
    max_attempts: u32,
    auth_token: Option<String>,
}

impl RemoteGateway {
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        let mut candidates = vec![config.base_url.clone()];
        for url in &config.fallback_urls {
            if !candidates.contains(url) {
                candidates.push(url.clone());
            }
        }

        Ok(Self {
            client,
            candidates,
            max_attempts: config.max_attempts.max(1),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Replace the session token (e.g. after login).
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    fn join(base: &str, path: &str) -> String {
        let base = base.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.header("Authorization", format!("Token {token}")),
            // No token: the cookie store supplies session credentials.
            None => builder,
        }
    }

    fn build_form(payload: &FormPayload) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &payload.fields {
            form = form.text(name.clone(), value.clone());
        }
        if let Some(file) = &payload.file {
            let mut part =
                reqwest::multipart::Part::bytes(file.data.clone()).file_name(file.filename.clone());
            if let Ok(typed) = part.mime_str(&file.content_type) {
                part = typed;
            } else {
                part = reqwest::multipart::Part::bytes(file.data.clone())
                    .file_name(file.filename.clone());
            }
            form = form.part(file.field.clone(), part);
        }
        form
    }
}

#[async_trait]
impl BackendClient for RemoteGateway {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> FetchOutcome {
        let mut last_error = None;
        let mut attempts = 0u32;

        for base in &self.candidates {
            if attempts >= self.max_attempts {
                break;
            }
            attempts += 1;

            let url = Self::join(base, path);
            let mut builder = self.apply_auth(self.client.request(method.clone(), &url));
            if let Some(ref body) = body {
                if method != Method::GET {
                    builder = builder.json(body);
                }
            }

            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let data = resp.json::<Value>().await.ok();
                        tracing::debug!(%method, %url, %status, "backend call succeeded");
                        return FetchOutcome {
                            ok: true,
                            status: Some(status.as_u16()),
                            data,
                            error: None,
                        };
                    }
                    let body_text = resp.text().await.unwrap_or_default();
                    tracing::warn!(%method, %url, %status, body = %body_text, "backend call failed");
                    last_error = Some(format!("{url} returned {status}"));
                }
                Err(e) => {
                    tracing::warn!(%method, %url, error = %e, "backend call network error");
                    last_error = Some(e.to_string());
                }
            }
        }

        FetchOutcome::failure(last_error.unwrap_or_else(|| "all candidate URLs failed".into()))
    }

    async fn send_form(&self, path: &str, form: FormPayload) -> FetchOutcome {
        let mut last_error = None;
        let mut attempts = 0u32;

        for base in &self.candidates {
            if attempts >= self.max_attempts {
                break;
            }
            attempts += 1;

            let url = Self::join(base, path);
            let builder = self
                .apply_auth(self.client.post(&url))
                .multipart(Self::build_form(&form));

            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let data = resp.json::<Value>().await.ok();
                        tracing::debug!(%url, %status, "multipart upload succeeded");
                        return FetchOutcome {
                            ok: true,
                            status: Some(status.as_u16()),
                            data,
                            error: None,
                        };
                    }
                    let body_text = resp.text().await.unwrap_or_default();
                    tracing::warn!(%url, %status, body = %body_text, "multipart upload failed");
                    last_error = Some(format!("{url} returned {status}"));
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "multipart upload network error");
                    last_error = Some(e.to_string());
                }
            }
        }

        FetchOutcome::failure(last_error.unwrap_or_else(|| "all candidate URLs failed".into()))
    }

    async fn download(&self, path: &str) -> AppResult<Vec<u8>> {
        let mut last_error = String::from("all candidate URLs failed");
        let mut attempts = 0u32;

        for base in &self.candidates {
            if attempts >= self.max_attempts {
                break;
            }
            attempts += 1;

            let url = Self::join(base, path);
            match self.apply_auth(self.client.get(&url)).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| AppError::Gateway(format!("download read failed: {e}")))?;
                    return Ok(bytes.to_vec());
                }
                Ok(resp) => {
                    tracing::warn!(%url, status = %resp.status(), "download failed");
                    last_error = format!("{url} returned {}", resp.status());
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "download network error");
                    last_error = e.to_string();
                }
            }
        }

        Err(AppError::Gateway(last_error))
    }
}
