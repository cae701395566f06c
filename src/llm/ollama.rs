//! Ollama backend: blocking `POST /api/generate` with `stream: false`.
//!
//! Availability is checked once at startup with `GET /api/tags`; see
//! [`OllamaGenerator::probe`].

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{GenerationError, TextGenerator};
use crate::config::LlmConfig;

/// Generator backed by an Ollama server.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    agent: ureq::Agent,
    probe_timeout: Duration,
}

/// State of the Ollama endpoint after probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Endpoint responds. `model_found` is false when the configured model
    /// is not among `models`; generation is still attempted.
    Available {
        models: Vec<String>,
        model_found: bool,
        latency_ms: u64,
    },
    /// Connection refused or host unreachable.
    NotRunning,
    /// No response within the probe timeout.
    Timeout,
    /// Endpoint responded with an HTTP error status.
    Unhealthy { status_code: u16 },
    /// Endpoint responded but the payload is not an Ollama tag list.
    IncompatibleResponse { detail: String },
}

impl ProbeStatus {
    /// Whether generation can be attempted.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available {
                models, latency_ms, ..
            } => write!(f, "available ({latency_ms}ms, {} model(s))", models.len()),
            Self::NotRunning => write!(f, "not running (connection refused)"),
            Self::Timeout => write!(f, "timeout (no response)"),
            Self::Unhealthy { status_code } => write!(f, "unhealthy (HTTP {status_code})"),
            Self::IncompatibleResponse { detail } => write!(f, "incompatible response: {detail}"),
        }
    }
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout()).build();
        Self {
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            agent,
            probe_timeout: Duration::from_secs(config.probe_timeout_secs.max(1)),
        }
    }

    /// Model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the server answers and whether the configured model is installed.
    pub fn probe(&self) -> ProbeStatus {
        let url = format!("{}/api/tags", self.base_url);
        let started = Instant::now();
        let response = match self.agent.get(&url).timeout(self.probe_timeout).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status_code, _)) => {
                return ProbeStatus::Unhealthy { status_code };
            }
            Err(ureq::Error::Transport(t)) => {
                return match classify_transport(&t) {
                    GenerationError::Timeout => ProbeStatus::Timeout,
                    _ => ProbeStatus::NotRunning,
                };
            }
        };
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let body = match response.into_string() {
            Ok(body) => body,
            Err(e) => {
                return ProbeStatus::IncompatibleResponse {
                    detail: e.to_string(),
                };
            }
        };
        let Some(models) = parse_tags_response(&body) else {
            return ProbeStatus::IncompatibleResponse {
                detail: "expected {\"models\": [...]}".to_owned(),
            };
        };

        let model_found = models.iter().any(|name| name.contains(&self.model));
        if model_found {
            info!(model = %self.model, latency_ms, "Ollama available");
        } else {
            warn!(model = %self.model, available = ?models, "configured model not installed");
        }
        ProbeStatus::Available {
            models,
            model_found,
            latency_ms,
        }
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&self, context: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": context,
            "stream": false,
        });

        debug!(chars = context.len(), "requesting completion");
        let started = Instant::now();
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => GenerationError::Status(code),
                ureq::Error::Transport(t) => classify_transport(&t),
            })?;

        let text = response.into_string().map_err(|e| classify_io(&e))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let reply = json
            .get("response")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GenerationError::Malformed("missing `response` field".to_owned()))?;

        debug!(elapsed_ms = started.elapsed().as_millis(), "completion received");
        Ok(reply.to_owned())
    }
}

fn classify_transport(t: &ureq::Transport) -> GenerationError {
    let message = t.to_string();
    if is_timeout_message(&message) {
        GenerationError::Timeout
    } else {
        GenerationError::Connection(message)
    }
}

fn classify_io(e: &std::io::Error) -> GenerationError {
    if e.kind() == std::io::ErrorKind::TimedOut
        || e.kind() == std::io::ErrorKind::WouldBlock
        || is_timeout_message(&e.to_string())
    {
        GenerationError::Timeout
    } else {
        GenerationError::Connection(e.to_string())
    }
}

fn is_timeout_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("timed out") || lower.contains("timeout")
}

/// Parse `{"models": [{"name": "llama3:8b", ...}, ...]}`.
fn parse_tags_response(body: &str) -> Option<Vec<String>> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let models = json.get("models")?.as_array()?;
    Some(
        models
            .iter()
            .filter_map(|entry| entry.get("name")?.as_str().map(str::to_owned))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parse_tags_lists_model_names() {
        let body = r#"{"models": [{"name": "llama3.2:3b"}, {"name": "qwen2.5:7b"}, {"size": 1}]}"#;
        assert_eq!(
            parse_tags_response(body),
            Some(vec!["llama3.2:3b".to_owned(), "qwen2.5:7b".to_owned()])
        );
        assert_eq!(parse_tags_response(r#"{"data": []}"#), None);
        assert_eq!(parse_tags_response("not json"), None);
    }

    #[test]
    fn timeout_messages_are_recognised() {
        assert!(is_timeout_message("Network Error: timed out reading response"));
        assert!(is_timeout_message("Connection Timeout"));
        assert!(!is_timeout_message("Connection Failed: connection refused"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = LlmConfig {
            api_url: "http://localhost:11434/".to_owned(),
            ..LlmConfig::default()
        };
        let generator = OllamaGenerator::new(&config);
        assert_eq!(generator.base_url, "http://localhost:11434");
        assert_eq!(generator.model(), config.model);
    }

    #[test]
    fn probe_status_display() {
        assert_eq!(
            ProbeStatus::Unhealthy { status_code: 500 }.to_string(),
            "unhealthy (HTTP 500)"
        );
        assert!(!ProbeStatus::NotRunning.is_available());
    }
}
