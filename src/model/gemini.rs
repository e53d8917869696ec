// SPDX-License-Identifier: MIT

//! Gemini Model - Google's Gemini API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl GeminiModel {
    /// Create a new GeminiModel
    ///
    /// Requires `GOOGLE_API_KEY` (or `GEMINI_API_KEY`) environment variable to be set.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("GOOGLE_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .map_err(|_| ModelError::ApiKeyMissing("Gemini".to_string()))?;
        Ok(Self::with_base_url(model_name, api_key, DEFAULT_BASE_URL))
    }

    /// Create a GeminiModel against a custom endpoint
    pub fn with_base_url(model_name: String, api_key: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the generateContent request body
    ///
    /// System messages become `systemInstruction`; everything else is sent as
    /// conversation turns.
    fn build_request(history: &[Content], config: Option<&GenerationConfig>) -> Value {
        let system_text: Vec<String> = history
            .iter()
            .filter(|c| c.role == "system")
            .map(|c| c.text())
            .collect();

        let contents: Vec<Value> = history
            .iter()
            .filter(|c| c.role != "system")
            .map(|c| {
                let role = if c.role == "model" || c.role == "assistant" {
                    "model"
                } else {
                    "user"
                };
                let parts: Vec<Value> = c.parts.iter().filter_map(part_to_gemini_json).collect();
                json!({ "role": role, "parts": parts })
            })
            .collect();

        let mut body = json!({ "contents": contents });

        if !system_text.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_text.join("\n\n") }] });
        }

        if let Some(cfg) = config {
            let mut generation = json!({});
            if let Some(temp) = cfg.temperature {
                generation["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                generation["maxOutputTokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                generation["topP"] = json!(top_p);
            }
            if let Some(top_k) = cfg.top_k {
                generation["topK"] = json!(top_k);
            }
            if let Some(schema) = &cfg.response_schema {
                generation["responseMimeType"] = json!("application/json");
                generation["responseSchema"] = schema.clone();
            }
            body["generationConfig"] = generation;
        }

        body
    }

    /// Extract the first candidate's content from a response
    fn parse_response(resp_json: &Value) -> Result<Content, ModelError> {
        let candidate = resp_json["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("No candidates in response".to_string()))?;

        if let Some(finish_reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            log::debug!("Gemini finish reason: {}", finish_reason);
            if finish_reason == "SAFETY" {
                return Err(ModelError::InvalidResponse(
                    "Gemini blocked response due to safety filters.".to_string(),
                ));
            }
        }

        let parts_json = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                log::error!("No parts in candidate. Full response: {}", resp_json);
                ModelError::InvalidResponse(format!("No content in Gemini response: {}", candidate))
            })?;

        Ok(Content {
            role: "model".to_string(),
            parts: parts_json.iter().flat_map(parse_gemini_part).collect(),
        })
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model_name, self.api_key
        );

        let body = Self::build_request(history, config);

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api("Gemini", text));
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}

/// Serialize a Part to Gemini API JSON format
/// Returns None for parts that shouldn't be sent (e.g., Thinking)
pub fn part_to_gemini_json(part: &Part) -> Option<Value> {
    match part {
        Part::Text(t) => Some(json!({ "text": t })),
        Part::Thinking(_) => None,
    }
}

/// Parse a Gemini API JSON part into Parts
///
/// Thinking models flag reasoning parts with `"thought": true`.
pub fn parse_gemini_part(p: &Value) -> Vec<Part> {
    let mut parts = Vec::new();
    let is_thought = p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false);

    if let Some(text) = p["text"].as_str() {
        if is_thought {
            parts.push(Part::Thinking(text.to_string()));
        } else {
            parts.push(Part::Text(text.to_string()));
        }
    }

    parts
}
