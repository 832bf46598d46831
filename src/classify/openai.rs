// OpenAI-compatible classifier client.
//
// Implements both classifier traits over one HTTP client:
// - `POST {base}/moderations` for the per-category moderation call
// - `POST {base}/chat/completions` for the nuanced prompt-completion call
//
// Any endpoint that speaks the same wire format (a proxy, a self-hosted
// gateway) works by pointing `base_url` at it.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{CompletionClient, ModerationClient, ModerationResult, TierFailure};
use crate::output::truncate_chars;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODERATION_MODEL: &str = "omni-moderation-latest";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// HTTP client for the moderation and chat-completion endpoints.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    moderation_model: String,
    request_timeout: Duration,
}

impl OpenAiClient {
    /// Create a client for the given API key and endpoint.
    ///
    /// `request_timeout` bounds the HTTP exchange itself; the pipeline applies
    /// its own per-tier budget on top. The chat model is chosen per call.
    pub fn new(
        api_key: String,
        base_url: &str,
        moderation_model: String,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("modwarden/0.1")
            .timeout(request_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            moderation_model,
            request_timeout,
        })
    }

    async fn post<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, TierFailure> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TierFailure::Timeout(self.request_timeout.as_millis() as u64)
                } else {
                    TierFailure::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TierFailure::Status {
                status,
                body: truncate_chars(&body, 200),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| TierFailure::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ModerationClient for OpenAiClient {
    async fn moderate(&self, text: &str) -> Result<ModerationResult, TierFailure> {
        let request = ModerationRequest {
            model: &self.moderation_model,
            input: text,
        };

        let response: ModerationResponse = self.post("moderations", &request).await?;
        let result = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| TierFailure::Malformed("moderation response had no results".into()))?;

        debug!(
            flagged = result.flagged,
            text_preview = %truncate_chars(text, 50),
            "Moderation call complete"
        );

        Ok(ModerationResult {
            flagged: result.flagged,
            categories: result.categories,
            category_scores: result.category_scores,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, TierFailure> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: 200,
            temperature: 0.1,
        };

        let response: ChatResponse = self.post("chat/completions", &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| TierFailure::Malformed("completion response had no content".into()))
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct ModerationRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResultWire>,
}

#[derive(Deserialize)]
struct ModerationResultWire {
    flagged: bool,
    #[serde(default)]
    categories: HashMap<String, bool>,
    #[serde(default)]
    category_scores: HashMap<String, f64>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_response_deserializes_with_slash_categories() {
        let json = r#"{
            "id": "modr-1",
            "model": "omni-moderation-latest",
            "results": [{
                "flagged": true,
                "categories": {"harassment/threatening": true, "self-harm": false},
                "category_scores": {"harassment/threatening": 0.93, "self-harm": 0.01}
            }]
        }"#;
        let resp: ModerationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.results.len(), 1);
        assert!(resp.results[0].flagged);
        assert_eq!(
            resp.results[0].categories.get("harassment/threatening"),
            Some(&true)
        );
    }

    #[test]
    fn chat_response_tolerates_null_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }

    #[test]
    fn chat_request_serializes_expected_shape() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 200,
            temperature: 0.1,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 200);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::new(
            "key".to_string(),
            "https://example.test/v1/",
            DEFAULT_MODERATION_MODEL.to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://example.test/v1");
    }
}
