// SPDX-License-Identifier: MIT

//! Chat-completions client for OpenAI and compatible endpoints

use super::{Content, GenerationConfig, Model, Part};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: NamedSchema<'a>,
}

#[derive(Debug, Serialize)]
struct NamedSchema<'a> {
    name: &'static str,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Model served through a chat-completions endpoint
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    /// Reads `OPENAI_API_KEY`, and `OPENAI_BASE_URL` for compatible endpoints
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("OpenAI".to_string()))?;
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::with_base_url(api_key, model_name, &base_url))
    }

    pub fn with_base_url(api_key: String, model_name: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn message(content: &Content) -> ChatMessage {
        let role = match content.role.as_str() {
            "system" => "system",
            "model" | "assistant" => "assistant",
            _ => "user",
        };
        ChatMessage {
            role,
            content: content.text(),
        }
    }

    fn request<'a>(
        &'a self,
        history: &[Content],
        config: Option<&'a GenerationConfig>,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model_name,
            messages: history.iter().map(Self::message).collect(),
            temperature: config.and_then(|c| c.temperature),
            max_tokens: config.and_then(|c| c.max_output_tokens),
            top_p: config.and_then(|c| c.top_p),
            response_format: config
                .and_then(|c| c.response_schema.as_ref())
                .map(|schema| ResponseFormat {
                    kind: "json_schema",
                    json_schema: NamedSchema {
                        name: "response",
                        schema,
                    },
                }),
        }
    }

    fn reply(response: ChatResponse) -> Result<Content, ModelError> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ModelError::InvalidResponse("no choices in chat completion".to_string())
        })?;
        let parts = choice
            .message
            .content
            .filter(|text| !text.is_empty())
            .map(Part::Text)
            .into_iter()
            .collect();
        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        let request = self.request(history, config);
        log::debug!(
            "Chat completion request to {} with {} messages",
            self.model_name,
            request.messages.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ModelError::api("OpenAI", format!("HTTP {}: {}", status, body)));
        }

        Self::reply(response.json::<ChatResponse>().await?)
    }
}
