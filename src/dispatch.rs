//! Sends request payloads to the completion endpoint and interprets replies.

use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::request::RequestPayload;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";

/// Shown in place of a reply whenever a turn cannot produce one.
pub const FALLBACK_REPLY: &str = "माफ़ कीजिए, अभी जवाब नहीं ला पाए। कृपया बाद में कोशिश करें।";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    RemoteError,
    TransportError,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("remote error: {message}")]
    Remote { message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::Remote { .. } => DispatchErrorKind::RemoteError,
            DispatchError::Transport(_) => DispatchErrorKind::TransportError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub text: String,
    /// True when the response carried no usable message and `text` is [`FALLBACK_REPLY`].
    pub fallback: bool,
}

/// Status and raw body of an HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Authenticated JSON POST. Errors only for failures below HTTP
/// (connect, timeout, unreadable body); error statuses come back as replies.
pub trait Transport {
    fn post_json(&self, url: &str, bearer: &str, body: &str) -> Result<HttpReply>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// `timeout` of `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl Transport for UreqTransport {
    fn post_json(&self, url: &str, bearer: &str, body: &str) -> Result<HttpReply> {
        let result = self
            .agent
            .post(url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {bearer}"))
            .send_string(body);

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                anyhow::bail!("request to completion endpoint failed: {err}");
            }
        };

        let status = response.status();
        let body = response
            .into_string()
            .context("failed to read completion response")?;
        Ok(HttpReply { status, body })
    }
}

pub struct Dispatcher<T> {
    endpoint: String,
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(endpoint: impl Into<String>, transport: T) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn dispatch(
        &self,
        payload: &RequestPayload,
        credential: &str,
    ) -> Result<AssistantReply, DispatchError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| DispatchError::Transport(format!("failed to encode request: {e}")))?;
        log::debug!(
            "posting {} input messages ({} bytes) to {}",
            payload.input.len(),
            body.len(),
            self.endpoint
        );

        let reply = self
            .transport
            .post_json(&self.endpoint, credential, &body)
            .map_err(|e| DispatchError::Transport(format!("{e:#}")))?;

        parse_reply(&reply)
    }
}

/// Interpret an endpoint reply. A structured `error` wins over the status code.
/// Only the first `message` item of `output` is inspected; other items may
/// have any shape.
pub fn parse_reply(reply: &HttpReply) -> Result<AssistantReply, DispatchError> {
    let parsed: Value = serde_json::from_str(&reply.body).map_err(|e| {
        DispatchError::Transport(format!("HTTP {}: malformed response body: {e}", reply.status))
    })?;

    if let Some(error) = parsed.get("error").filter(|e| is_truthy(e)) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(DispatchError::Remote { message });
    }

    if reply.status >= 400 {
        return Err(DispatchError::Transport(format!("HTTP {}", reply.status)));
    }

    let output = parsed
        .get("output")
        .and_then(Value::as_array)
        .ok_or_else(|| DispatchError::Transport("response has no output".to_string()))?;

    let text = output
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .and_then(|item| item.get("content"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|p| p.get("text").and_then(Value::as_str).unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if text.is_empty() {
        log::debug!("response carried no message text, using fallback");
        return Ok(AssistantReply {
            text: FALLBACK_REPLY.to_string(),
            fallback: true,
        });
    }

    Ok(AssistantReply {
        text,
        fallback: false,
    })
}

/// `null`, `false`, `0`, and `""` do not count as an error.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
