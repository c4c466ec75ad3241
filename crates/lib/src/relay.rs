//! Relay endpoint client: one POST of the inbound event, one optional reply.

use crate::config::RelayMode;
use crate::inbound::InboundEvent;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest response-body slice kept for /debug and error text.
pub(crate) const DEBUG_SNIPPET_LEN: usize = 100;

/// JSON body sent to the relay endpoint per message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRequest {
    pub room: String,
    pub sender: String,
    pub msg: String,
}

impl RelayRequest {
    pub fn from_event(event: &InboundEvent) -> Self {
        Self {
            room: event.room.clone(),
            sender: event.sender.clone(),
            msg: event.message.clone(),
        }
    }
}

/// Parsed relay response. A reply is only actioned when `is_reply` is true
/// and `reply_msg` is non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayResponse {
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub reply_msg: Option<String>,
}

impl RelayResponse {
    /// Reply text when the response actually carries one.
    pub fn reply_text(&self) -> Option<&str> {
        if !self.is_reply {
            return None;
        }
        self.reply_msg.as_deref().filter(|s| !s.is_empty())
    }
}

/// Diagnostic deployments nest the response under `test_response`.
#[derive(Debug, Deserialize)]
struct DiagnosticEnvelope {
    #[serde(default)]
    test_response: Option<RelayResponse>,
}

/// Status and body snippet of the most recent relay call, kept for /debug.
#[derive(Debug, Clone)]
pub struct RelayExchange {
    pub status: StatusCode,
    pub snippet: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http error: {status}: {snippet}")]
    Status { status: StatusCode, snippet: String },
    #[error("json parse error: {0}")]
    Parse(String),
}

/// Client for the relay endpoint.
#[derive(Clone)]
pub struct RelayClient {
    url: String,
    timeout: Duration,
    mode: RelayMode,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(url: String, timeout: Duration, mode: RelayMode) -> Self {
        Self {
            url,
            timeout,
            mode,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    /// POST the event to the relay endpoint. Returns the parsed response and
    /// the raw exchange (for /debug), or the error plus whatever exchange was
    /// observed before the failure.
    pub async fn relay(
        &self,
        request: &RelayRequest,
    ) -> (Result<RelayResponse, RelayError>, Option<RelayExchange>) {
        let res = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await;
        let res = match res {
            Ok(r) => r,
            Err(e) => return (Err(RelayError::Transport(e)), None),
        };

        let status = res.status();
        let body = match res.text().await {
            Ok(b) => b,
            Err(e) => return (Err(RelayError::Transport(e)), None),
        };
        let exchange = RelayExchange {
            status,
            snippet: truncate(&body, DEBUG_SNIPPET_LEN),
        };

        if !status.is_success() {
            let err = RelayError::Status {
                status,
                snippet: exchange.snippet.clone(),
            };
            return (Err(err), Some(exchange));
        }

        let parsed = self.parse_body(&body);
        (parsed, Some(exchange))
    }

    fn parse_body(&self, body: &str) -> Result<RelayResponse, RelayError> {
        match self.mode {
            RelayMode::Production => {
                serde_json::from_str(body).map_err(|e| RelayError::Parse(e.to_string()))
            }
            RelayMode::Diagnostic => {
                let envelope: DiagnosticEnvelope =
                    serde_json::from_str(body).map_err(|e| RelayError::Parse(e.to_string()))?;
                envelope
                    .test_response
                    .ok_or_else(|| RelayError::Parse("missing test_response".to_string()))
            }
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::InboundEvent;

    #[test]
    fn request_serializes_to_room_sender_msg() {
        let event = InboundEvent {
            room: "dev".to_string(),
            sender: "jin".to_string(),
            message: "hello".to_string(),
            is_group_chat: true,
        };
        let body = serde_json::to_value(RelayRequest::from_event(&event)).expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({"room": "dev", "sender": "jin", "msg": "hello"})
        );
    }

    #[test]
    fn reply_text_requires_is_reply_and_nonempty_msg() {
        let r: RelayResponse =
            serde_json::from_str(r#"{"is_reply": true, "reply_msg": "hi"}"#).expect("parse");
        assert_eq!(r.reply_text(), Some("hi"));

        let r: RelayResponse =
            serde_json::from_str(r#"{"is_reply": false, "reply_msg": "hi"}"#).expect("parse");
        assert_eq!(r.reply_text(), None);

        let r: RelayResponse =
            serde_json::from_str(r#"{"is_reply": true, "reply_msg": ""}"#).expect("parse");
        assert_eq!(r.reply_text(), None);

        let r: RelayResponse = serde_json::from_str(r#"{"is_reply": true}"#).expect("parse");
        assert_eq!(r.reply_text(), None);
    }

    #[test]
    fn missing_fields_default() {
        let r: RelayResponse = serde_json::from_str("{}").expect("parse");
        assert!(!r.is_reply);
        assert!(r.reply_msg.is_none());
    }

    #[test]
    fn truncate_keeps_char_boundaries() {
        assert_eq!(truncate("short", 100), "short");
        let long = "a".repeat(150);
        let t = truncate(&long, 100);
        assert_eq!(t.len(), 103);
        assert!(t.ends_with("..."));
        // multi-byte content near the cut point must not split a char
        let hangul = "방".repeat(60);
        let t = truncate(&hangul, 100);
        assert!(t.ends_with("..."));
    }
}
