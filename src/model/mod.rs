// SPDX-License-Identifier: MIT

//! Model module - defines the LLM model trait and implementations
//!
//! This module provides the core Model trait and shared types.
//! Model implementations are in their own submodules:
//! - [gemini] - Google's Gemini API
//! - [openai] - OpenAI's ChatGPT API

pub mod gemini;
pub mod openai;

pub use gemini::GeminiModel;
pub use openai::OpenAIModel;

use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    /// JSON schema the response must follow; the model is asked for JSON output
    pub response_schema: Option<serde_json::Value>,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Parts of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Thinking/reasoning content from thinking models (e.g., Gemini's thinking mode)
    Thinking(String),
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text parts; thinking parts are left out
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Thinking(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError>;
}

/// Build a model for the configured provider
///
/// An empty provider is inferred from the model name prefix.
pub fn create_model(provider: &str, model_name: &str) -> Result<Arc<dyn Model>, ModelError> {
    let provider = if provider.is_empty() {
        if model_name.starts_with("gpt") {
            "openai"
        } else {
            "gemini"
        }
    } else {
        provider
    };

    log::info!("Using provider: {} with model: {}", provider, model_name);

    match provider.to_lowercase().as_str() {
        "gemini" | "google" => Ok(Arc::new(GeminiModel::new(model_name.to_string())?)),
        "openai" => Ok(Arc::new(OpenAIModel::new(model_name.to_string())?)),
        other => Err(ModelError::UnsupportedProvider(other.to_string())),
    }
}
