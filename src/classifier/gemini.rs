//! Gemini HTTP backend for the remote classifier.

use serde::{Deserialize, Serialize};

use super::{ClassifierError, LlmBackend};

/// Default generateContent endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";

/// Transport timeout. A hang here surfaces as a delayed categorization, so
/// the window is kept short.
const TIMEOUT_SECS: u64 = 30;

/// Gemini generateContent client.
pub struct GeminiClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Create a client. `api_key: None` yields an unconfigured backend that
    /// reports itself as such without touching the network.
    pub fn new(api_key: Option<String>, endpoint: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
            client,
            timeout_secs: TIMEOUT_SECS,
        }
    }
}

/// Request body for generateContent.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Near-deterministic decoding: classification wants one short token, not
/// creativity.
#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 1,
            top_p: 0.1,
            max_output_tokens: 50,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

impl LlmBackend for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, ClassifierError> {
        let api_key = self.api_key.as_ref().ok_or(ClassifierError::MissingApiKey)?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
        };

        let url = format!("{}?key={}", self.endpoint, api_key);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Http(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    ClassifierError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ClassifierError::Http(format!("response parsing: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ClassifierError::Http("empty candidate list in response".to_string()))?;

        Ok(text.trim().to_string())
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyless_client_is_unconfigured() {
        let client = GeminiClient::new(None, None);
        assert!(!client.is_configured());
        assert!(matches!(
            client.generate("prompt"),
            Err(ClassifierError::MissingApiKey)
        ));
    }

    #[test]
    fn keyed_client_is_configured() {
        let client = GeminiClient::new(Some("k".to_string()), None);
        assert!(client.is_configured());
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn endpoint_override_respected() {
        let client = GeminiClient::new(Some("k".into()), Some("http://localhost:9/x".into()));
        assert_eq!(client.endpoint, "http://localhost:9/x");
    }

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig::default(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["topK"], 1);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 50);
    }

    #[test]
    fn response_parses_first_candidate() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"development\n"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "development\n");
    }

    #[test]
    fn empty_response_parses_to_no_candidates() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
