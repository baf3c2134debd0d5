//! One agent submission and its projected state.
//!
//! `AgentRun` is the view-side counterpart of the streaming endpoint: it
//! issues the request, consumes the event reader sequentially, and keeps the
//! ordered step log plus the latest output image. State is reset wholesale
//! at the start of each submission, so nothing leaks between runs; dropping
//! the `submit` future mid-stream releases the connection.

use base64::Engine as _;
use futures_util::StreamExt;

use crate::api::agent::AgentClient;
use crate::api::events::AgentEvent;
use crate::api::{ApiError, ApiErrorKind, ApiResult};
use crate::images::ImageInput;

/// Where a submission currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Done,
    Failed,
}

/// Kinds of entries in the step log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Thought,
    Observation,
    FinalOutput,
    Error,
}

impl StepKind {
    /// Short label for display.
    pub fn label(self) -> &'static str {
        match self {
            StepKind::Thought => "thought",
            StepKind::Observation => "observation",
            StepKind::FinalOutput => "answer",
            StepKind::Error => "error",
        }
    }
}

/// One entry in the step log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub content: String,
}

/// The edited image as reported by a `final_image` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputImage {
    /// MIME-like format tag (e.g. "image/png").
    pub format: String,
    /// Base64-encoded image bytes.
    pub content: String,
}

impl OutputImage {
    /// Decodes the base64 payload.
    ///
    /// # Errors
    /// Returns a parse-kind error if the payload is not valid base64.
    pub fn decode_bytes(&self) -> ApiResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.content)
            .map_err(|err| ApiError::parse(format!("undecodable image payload: {err}")))
    }
}

/// Per-submission state machine over the agent endpoint.
pub struct AgentRun {
    client: AgentClient,
    steps: Vec<Step>,
    output_image: Option<OutputImage>,
    status: RunStatus,
}

impl AgentRun {
    pub fn new(client: AgentClient) -> Self {
        Self {
            client,
            steps: Vec::new(),
            output_image: None,
            status: RunStatus::Idle,
        }
    }

    /// Ordered step log of the current (or last) submission. Excludes
    /// `final_image` events, which land in [`Self::output_image`].
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Latest edited image; later `final_image` events overwrite earlier ones.
    pub fn output_image(&self) -> Option<&OutputImage> {
        self.output_image.as_ref()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Submits a prompt + image and consumes the event stream to completion.
    ///
    /// A no-op while a submission is running. Transport failures do not
    /// return an error: they set [`RunStatus::Failed`] and append one
    /// synthetic error step, mirroring how they are shown to the user.
    ///
    /// # Errors
    /// Returns a validation error (before any network call) for an empty
    /// prompt or a missing image.
    pub async fn submit(&mut self, prompt: &str, image: Option<&ImageInput>) -> ApiResult<()> {
        self.submit_with(prompt, image, |_| {}).await
    }

    /// Like [`Self::submit`], invoking `on_step` for every appended step in
    /// arrival order.
    ///
    /// # Errors
    /// Returns a validation error (before any network call) for an empty
    /// prompt or a missing image.
    pub async fn submit_with(
        &mut self,
        prompt: &str,
        image: Option<&ImageInput>,
        mut on_step: impl FnMut(&Step),
    ) -> ApiResult<()> {
        if self.status == RunStatus::Running {
            tracing::warn!("submission already in flight; ignoring");
            return Ok(());
        }
        if prompt.trim().is_empty() {
            return Err(ApiError::validation("prompt must not be empty"));
        }
        let Some(image) = image else {
            return Err(ApiError::validation("an input image is required"));
        };

        self.steps.clear();
        self.output_image = None;
        self.status = RunStatus::Running;

        let mut stream = match self
            .client
            .image_process(prompt, &image.file_name, &image.mime, image.bytes.clone())
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                self.fail(&err, &mut on_step);
                return Ok(());
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if self.route(event, &mut on_step) {
                        break;
                    }
                }
                Err(err) if err.kind == ApiErrorKind::Parse => {
                    tracing::warn!(error = %err, "skipping malformed record");
                }
                Err(err) => {
                    self.fail(&err, &mut on_step);
                    return Ok(());
                }
            }
        }

        // Stream end without an explicit terminal record still resolves.
        if self.status == RunStatus::Running {
            self.status = RunStatus::Done;
        }
        Ok(())
    }

    /// Applies one event to the state. Returns true for the terminal event.
    fn route(&mut self, event: AgentEvent, on_step: &mut impl FnMut(&Step)) -> bool {
        match event {
            AgentEvent::Thought { content } => self.push_step(StepKind::Thought, content, on_step),
            AgentEvent::Observation { content } => {
                self.push_step(StepKind::Observation, content, on_step);
            }
            AgentEvent::FinalOutput { content } => {
                self.push_step(StepKind::FinalOutput, content, on_step);
            }
            AgentEvent::Error { content } => self.push_step(StepKind::Error, content, on_step),
            AgentEvent::FinalImage { format, content } => {
                self.output_image = Some(OutputImage { format, content });
            }
            AgentEvent::End => {
                self.status = RunStatus::Done;
                return true;
            }
        }
        false
    }

    fn push_step(&mut self, kind: StepKind, content: String, on_step: &mut impl FnMut(&Step)) {
        let step = Step { kind, content };
        on_step(&step);
        self.steps.push(step);
    }

    fn fail(&mut self, err: &ApiError, on_step: &mut impl FnMut(&Step)) {
        self.status = RunStatus::Failed;
        self.push_step(
            StepKind::Error,
            format!("request failed: {err}"),
            on_step,
        );
    }
}
