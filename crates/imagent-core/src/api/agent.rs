//! Client for the agent image-edit endpoint.
//!
//! One submission is one multipart POST whose streaming response body is
//! handed to the `EventReader`. There is no client-side timeout on the
//! stream; transport failures surface through the reader.

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use super::stream::EventReader;
use super::{ApiError, ApiResult, USER_AGENT, classify_reqwest_error};

/// Event stream over a live response body.
pub type EditStream = EventReader<BoxStream<'static, reqwest::Result<Bytes>>>;

/// Client for `/api/agent/image_process`.
pub struct AgentClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            http: reqwest::Client::new(),
        }
    }

    /// Attaches the session token sent as a bearer header.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Submits a prompt + image and returns the stream of agent events.
    ///
    /// # Errors
    /// Returns a transport error for connect failures and non-2xx statuses,
    /// a validation error for an unusable MIME type.
    pub async fn image_process(
        &self,
        prompt: &str,
        file_name: &str,
        mime: &str,
        image: Vec<u8>,
    ) -> ApiResult<EditStream> {
        let part = reqwest::multipart::Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|_| ApiError::validation(format!("unusable image type: {mime}")))?;
        let form = reqwest::multipart::Form::new()
            .text("prompt", prompt.to_string())
            .part("file", part);

        let mut builder = self
            .http
            .post(format!("{}/api/agent/image_process", self.base_url))
            .header("user-agent", USER_AGENT)
            .header("accept", "text/event-stream");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &error_body));
        }

        Ok(EventReader::new(response.bytes_stream().boxed()))
    }
}
