//! Request payloads for the responses endpoint.

use serde::Serialize;

use crate::config::Config;
use crate::history::{ConversationHistory, Message};

pub const DEFAULT_MODEL: &str = "gpt-5-mini-2025-08-07";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;
pub const DEFAULT_REASONING_EFFORT: &str = "minimal";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

pub const REASONING_EFFORTS: [&str; 4] = ["minimal", "low", "medium", "high"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Reasoning {
    pub effort: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RequestPayload {
    pub model: String,
    pub input: Vec<Message>,
    pub max_output_tokens: u32,
    pub reasoning: Reasoning,
}

/// Persona and formatting rules sent ahead of every request.
pub fn system_prompt(organization: &str) -> String {
    format!(
        "You are the AI Support Assistant by {organization}.
- Always answer briefly
- Use Markdown for formatting
- Prefer bold or bullet points or numbered lists only if returning steps or lists in responses
- Be professional, avoid long paragraphs
- Always Answer in Hindi, उत्तर हिंदी में दें "
    )
}

/// Model, limits and window applied when building payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBuilder {
    pub model: String,
    pub max_output_tokens: u32,
    pub reasoning_effort: String,
    pub window_size: usize,
}

impl RequestBuilder {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            reasoning_effort: config.reasoning_effort.clone(),
            window_size: config.history_window,
        }
    }

    pub fn with_window(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn build(&self, history: &ConversationHistory, organization: &str) -> RequestPayload {
        let recent = history.recent_window(self.window_size);
        let mut input = Vec::with_capacity(recent.len() + 1);
        input.push(Message::system(system_prompt(organization)));
        input.extend_from_slice(recent);

        RequestPayload {
            model: self.model.clone(),
            input,
            max_output_tokens: self.max_output_tokens,
            reasoning: Reasoning {
                effort: self.reasoning_effort.clone(),
            },
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            reasoning_effort: DEFAULT_REASONING_EFFORT.to_string(),
            window_size: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// System prompt plus the last `window_size` messages, default model and limits.
pub fn build_request(
    history: &ConversationHistory,
    organization: &str,
    window_size: usize,
) -> RequestPayload {
    RequestBuilder::default()
        .with_window(window_size)
        .build(history, organization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Role;

    fn history_of(n: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for i in 0..n {
            history.append(Message::user(format!("q{i}")));
        }
        history
    }

    #[test]
    fn input_length_is_window_plus_system() {
        for len in [0, 1, 9, 10, 11, 25] {
            let payload = build_request(&history_of(len), "Acme", 10);
            assert_eq!(payload.input.len(), len.min(10) + 1, "history {len}");
            assert_eq!(payload.input[0].role, Role::System);
        }
    }

    #[test]
    fn window_keeps_most_recent_in_order() {
        let payload = build_request(&history_of(12), "Acme", 3);
        let contents: Vec<_> = payload.input[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["q9", "q10", "q11"]);
    }

    #[test]
    fn system_prompt_names_organization() {
        let prompt = system_prompt("Gramin Bank");
        assert!(prompt.starts_with("You are the AI Support Assistant by Gramin Bank.\n"));
        assert!(prompt.ends_with("उत्तर हिंदी में दें "));
        assert_eq!(prompt.lines().count(), 6);
    }

    #[test]
    fn payload_json_shape() {
        let mut history = ConversationHistory::new();
        history.append(Message::user("Hello"));
        let payload = build_request(&history, "Acme", 10);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["model"], "gpt-5-mini-2025-08-07");
        assert_eq!(json["max_output_tokens"], 500);
        assert_eq!(json["reasoning"]["effort"], "minimal");
        assert_eq!(json["input"][0]["role"], "system");
        assert_eq!(json["input"][1]["role"], "user");
        assert_eq!(json["input"][1]["content"], "Hello");
    }

    #[test]
    fn build_is_deterministic() {
        let history = history_of(4);
        assert_eq!(
            build_request(&history, "Acme", 10),
            build_request(&history, "Acme", 10)
        );
    }

    #[test]
    fn builder_follows_config() {
        let config = Config {
            model: "gpt-test".to_string(),
            max_output_tokens: 42,
            reasoning_effort: "low".to_string(),
            history_window: 2,
            ..Config::default()
        };
        let payload = RequestBuilder::from_config(&config).build(&history_of(5), "Acme");
        assert_eq!(payload.model, "gpt-test");
        assert_eq!(payload.max_output_tokens, 42);
        assert_eq!(payload.reasoning.effort, "low");
        assert_eq!(payload.input.len(), 3);
    }
}
