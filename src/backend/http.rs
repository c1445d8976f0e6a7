//! HTTP implementation of [`Backend`] on top of `reqwest`.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::auth::{Authority, StaticToken};
use super::{AnalysisRequest, Backend, BackendError};
use crate::model::{AnalysisResult, Confirmation, ConfirmationReceipt, ResultId, UserProfile};

const USER_PATH: &str = "users/me";
const START_PREVIEW_PATH: &str = "api/results/camera/start-preview";
const STOP_PREVIEW_PATH: &str = "api/results/camera/stop-preview";
const PREVIEW_FRAME_PATH: &str = "api/results/camera/preview-frame";
const ANALYZE_PATH: &str = "api/results/analyze";

/// Talks to the render/analysis service over HTTP.
pub struct HttpBackend<A = StaticToken> {
    client: reqwest::Client,
    base: Url,
    authority: A,
}

impl<A: Authority> HttpBackend<A> {
    /// Creates a backend rooted at `base`. A trailing slash is added when
    /// missing so endpoint paths resolve beneath it.
    pub fn new(mut base: Url, authority: A) -> Result<Self, BackendError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("smearscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| BackendError::Transport(source.to_string()))?;
        Ok(Self {
            client,
            base,
            authority,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|source| BackendError::Transport(format!("bad endpoint '{path}': {source}")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.authority.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.send(request).await?;
        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|source| BackendError::Decode(source.to_string()))
    }
}

// Deadlines are enforced by the caller, so a reqwest error is always a
// transport problem.
fn transport_error(source: reqwest::Error) -> BackendError {
    BackendError::Transport(source.to_string())
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Value,
}

/// Extracts a readable message from a `{"detail": ...}` error body.
fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        Value::String(text) if !text.trim().is_empty() => Some(text),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("msg").and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        detail: error_detail(&body),
    })
}

fn analyze_form(request: AnalysisRequest) -> Result<Form, BackendError> {
    let image = Part::bytes(request.image.bytes().to_vec())
        .file_name(request.image.file_name().to_string())
        .mime_str(request.image.mime_type())
        .map_err(|source| BackendError::Transport(source.to_string()))?;

    let mut form = Form::new()
        .part("image", image)
        .text("patient_id", request.patient_id)
        .text("clinic_id", request.clinic_id);
    if let Some(symptoms) = request.symptoms {
        form = form.text("symptoms", symptoms);
    }
    if let Some(notes) = request.notes {
        form = form.text("notes", notes);
    }
    Ok(form)
}

impl<A: Authority> Backend for HttpBackend<A> {
    async fn current_user(&self) -> Result<UserProfile, BackendError> {
        let url = self.endpoint(USER_PATH)?;
        self.send_json(self.client.get(url)).await
    }

    async fn start_preview(&self) -> Result<(), BackendError> {
        let url = self.endpoint(START_PREVIEW_PATH)?;
        self.send(self.client.post(url)).await.map(drop)
    }

    async fn stop_preview(&self) -> Result<(), BackendError> {
        let url = self.endpoint(STOP_PREVIEW_PATH)?;
        self.send(self.client.post(url)).await.map(drop)
    }

    async fn preview_frame(&self) -> Result<Bytes, BackendError> {
        let url = self.endpoint(PREVIEW_FRAME_PATH)?;
        let response = self.send(self.client.get(url)).await?;
        response.bytes().await.map_err(transport_error)
    }

    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, BackendError> {
        let url = self.endpoint(ANALYZE_PATH)?;
        tracing::info!(
            patient_id = %request.patient_id,
            file_name = request.image.file_name(),
            bytes = request.image.byte_size(),
            "submitting image for analysis"
        );
        let form = analyze_form(request)?;
        self.send_json(self.client.post(url).multipart(form)).await
    }

    async fn confirm(
        &self,
        result_id: ResultId,
        confirmation: Confirmation,
    ) -> Result<ConfirmationReceipt, BackendError> {
        let url = self.endpoint(&format!("api/results/{}/confirm", result_id))?;
        self.send_json(self.client.post(url).json(&confirmation)).await
    }
}
