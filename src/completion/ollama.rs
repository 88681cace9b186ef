use serde::{Deserialize, Serialize};

use super::{CompletionClient, CompletionError};
use crate::config::OllamaConfig;

/// System prompt sent with every assessment completion.
pub const ASSESSMENT_SYSTEM_PROMPT: &str = "You are a careful medical intake assistant. \
You help gather symptom information and summarize it for a clinician. \
You do not diagnose. Follow the requested output format exactly.";

/// Ollama HTTP client for local LLM inference.
pub struct OllamaCompletionClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaCompletionClient {
    pub fn new(config: &OllamaConfig) -> Result<Self, CompletionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::NetworkError(format!("HTTP client setup: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Client configured from `CAREPATH_OLLAMA_URL` / `CAREPATH_MODEL`.
    pub fn from_env() -> Result<Self, CompletionError> {
        Self::new(&OllamaConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_send_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_connect() {
            CompletionError::NetworkError(format!("Ollama is not running at {}", self.base_url))
        } else if e.is_timeout() {
            CompletionError::NetworkError(format!(
                "Request timed out after {}s",
                self.timeout_secs
            ))
        } else {
            CompletionError::NetworkError(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Map a non-success HTTP status to the completion error taxonomy.
fn status_error(status: u16, body: String) -> CompletionError {
    match status {
        429 => CompletionError::RateLimited(body),
        401 | 403 => CompletionError::AuthFailed(body),
        500..=599 => CompletionError::NetworkError(format!("status {status}: {body}")),
        _ => CompletionError::InvalidResponse(format!("status {status}: {body}")),
    }
}

impl CompletionClient for OllamaCompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            system: ASSESSMENT_SYSTEM_PROMPT,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        tracing::debug!(model = %self.model, chars = parsed.response.len(), "Ollama completion received");
        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> OllamaConfig {
        OllamaConfig {
            base_url: url.to_string(),
            model: "medgemma:4b".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn constructor_keeps_settings() {
        let client = OllamaCompletionClient::new(&config("http://localhost:11434")).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), "medgemma:4b");
        assert_eq!(client.timeout_secs, 30);
    }

    #[test]
    fn trims_trailing_slash() {
        let client = OllamaCompletionClient::new(&config("http://localhost:11434/")).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error(429, "slow down".into()), CompletionError::RateLimited(_)));
        assert!(matches!(status_error(401, String::new()), CompletionError::AuthFailed(_)));
        assert!(matches!(status_error(403, String::new()), CompletionError::AuthFailed(_)));
        assert!(matches!(status_error(503, String::new()), CompletionError::NetworkError(_)));
        assert!(matches!(status_error(404, String::new()), CompletionError::InvalidResponse(_)));
    }

    /// Serve one canned HTTP response on an ephemeral local port.
    /// `None` closes the connection without answering.
    fn serve_once(response: Option<&'static str>) -> (String, std::thread::JoinHandle<String>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let Some(response) = response else {
                return String::new();
            };

            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (url, handle)
    }

    #[test]
    fn generate_returns_response_text() {
        let (url, server) = serve_once(Some(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 38\r\n\
             Connection: close\r\n\r\n{\"response\":\"ENOUGH_INFO\",\"done\":true}",
        ));
        let client = OllamaCompletionClient::new(&config(&url)).unwrap();
        assert_eq!(client.complete("What next?").unwrap(), "ENOUGH_INFO");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/generate"));
        assert!(request.contains("\"model\":\"medgemma:4b\""));
        assert!(request.contains("\"stream\":false"));
        assert!(request.contains("What next?"));
    }

    #[test]
    fn rate_limited_status_is_retryable() {
        let (url, server) = serve_once(Some(
            "HTTP/1.1 429 Too Many Requests\r\nContent-Length: 9\r\n\
             Connection: close\r\n\r\nslow down",
        ));
        let client = OllamaCompletionClient::new(&config(&url)).unwrap();
        let err = client.complete("hello").unwrap_err();
        assert!(matches!(err, CompletionError::RateLimited(ref body) if body == "slow down"));
        assert!(err.is_retryable());
        server.join().unwrap();
    }

    #[test]
    fn dropped_connection_is_network_error() {
        let (url, server) = serve_once(None);
        let client = OllamaCompletionClient::new(&config(&url)).unwrap();
        let err = client.complete("hello").unwrap_err();
        assert!(matches!(err, CompletionError::NetworkError(_)));
        assert!(err.is_retryable());
        server.join().unwrap();
    }
}
