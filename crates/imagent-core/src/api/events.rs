//! Agent event types and record parsing for the streaming edit endpoint.
//!
//! The endpoint's response body is a sequence of blank-line-delimited
//! records of the form `data:<JSON>` where the JSON is
//! `{type, content, format?}`. `format` is only meaningful for
//! `final_image`, whose `content` is base64-encoded image bytes; every
//! other kind carries free text.

use serde::Deserialize;

use super::{ApiError, ApiResult};

/// Fixed prefix every data record starts with.
pub const DATA_PREFIX: &str = "data:";

/// One event reported by the agent while it works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// The agent's reasoning about the next action.
    Thought { content: String },
    /// What the agent observed after acting.
    Observation { content: String },
    /// The agent's final textual answer.
    FinalOutput { content: String },
    /// The edited image: MIME-like format tag + base64 payload.
    FinalImage { format: String, content: String },
    /// An error the agent reported mid-run.
    Error { content: String },
    /// Terminal event: nothing further will arrive.
    End,
}

impl AgentEvent {
    /// The wire tag for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Thought { .. } => "thought",
            AgentEvent::Observation { .. } => "observation",
            AgentEvent::FinalOutput { .. } => "final_output",
            AgentEvent::FinalImage { .. } => "final_image",
            AgentEvent::Error { .. } => "error",
            AgentEvent::End => "end",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: String,
    content: String,
    #[serde(default)]
    format: Option<String>,
}

/// Parses one complete record (prefix + JSON body) into an event.
///
/// # Errors
/// Returns a parse-kind error for a missing prefix, unparsable JSON, an
/// unknown `type`, or a `final_image` without `format`. These are local to
/// the record; the stream continues past them.
pub fn parse_record(record: &str) -> ApiResult<AgentEvent> {
    let text = record.trim();
    let Some(body) = text.strip_prefix(DATA_PREFIX) else {
        return Err(ApiError::parse(format!(
            "record without data prefix: {}",
            snippet(text)
        )));
    };

    let raw: RawRecord = serde_json::from_str(body)
        .map_err(|err| ApiError::parse(format!("unparsable record body: {err}")))?;

    match raw.kind.as_str() {
        "thought" => Ok(AgentEvent::Thought {
            content: raw.content,
        }),
        "observation" => Ok(AgentEvent::Observation {
            content: raw.content,
        }),
        "final_output" => Ok(AgentEvent::FinalOutput {
            content: raw.content,
        }),
        "error" => Ok(AgentEvent::Error {
            content: raw.content,
        }),
        "end" => Ok(AgentEvent::End),
        "final_image" => match raw.format {
            Some(format) => Ok(AgentEvent::FinalImage {
                format,
                content: raw.content,
            }),
            None => Err(ApiError::parse("final_image record without format")),
        },
        other => Err(ApiError::parse(format!("unknown event type: {other}"))),
    }
}

/// First few characters of a record, for error messages.
fn snippet(text: &str) -> String {
    const MAX: usize = 40;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}…")
    }
}
