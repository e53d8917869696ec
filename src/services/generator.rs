// SPDX-License-Identifier: MIT

//! Text generation backed by a chat model

use super::{strip_code_fences, with_timeout, TextGenerator};
use crate::error::ServiceError;
use crate::model::{Content, GenerationConfig, Model};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "text generation";

/// Schema keywords understood by structured-output endpoints
const SCHEMA_KEYS: [&str; 6] = [
    "type",
    "properties",
    "required",
    "items",
    "enum",
    "description",
];

pub struct ModelGenerator {
    model: Arc<dyn Model>,
    timeout: Duration,
    config: GenerationConfig,
}

impl ModelGenerator {
    pub fn new(model: Arc<dyn Model>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            config: GenerationConfig {
                temperature: Some(0.1),
                ..Default::default()
            },
        }
    }

    async fn complete(
        &self,
        instructions: &str,
        content: &str,
        config: &GenerationConfig,
    ) -> Result<String, ServiceError> {
        let history = [Content::system(instructions), Content::user(content)];
        let reply = with_timeout(SERVICE, self.timeout, async {
            Ok(self.model.generate_content(&history, Some(config)).await?)
        })
        .await?;

        let text = reply.text();
        if text.trim().is_empty() {
            return Err(ServiceError::InvalidResponse(
                "model returned no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for ModelGenerator {
    async fn generate(&self, instructions: &str, content: &str) -> Result<String, ServiceError> {
        self.complete(instructions, content, &self.config).await
    }

    async fn generate_structured(
        &self,
        instructions: &str,
        content: &str,
        schema: &Value,
    ) -> Result<Value, ServiceError> {
        let config = GenerationConfig {
            response_schema: Some(sanitize_schema(schema)),
            ..self.config.clone()
        };
        let text = self.complete(instructions, content, &config).await?;
        Ok(serde_json::from_str(strip_code_fences(&text))?)
    }
}

/// Stand-in used when no model is configured; every call fails
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _instructions: &str, _content: &str) -> Result<String, ServiceError> {
        Err(ServiceError::NotConfigured(SERVICE.to_string()))
    }

    async fn generate_structured(
        &self,
        _instructions: &str,
        _content: &str,
        _schema: &Value,
    ) -> Result<Value, ServiceError> {
        Err(ServiceError::NotConfigured(SERVICE.to_string()))
    }
}

/// JSON schema for `T`, reduced to the keywords structured-output endpoints accept
pub fn response_schema<T: JsonSchema>() -> Result<Value, ServiceError> {
    let schema = serde_json::to_value(schemars::schema_for!(T))?;
    Ok(sanitize_schema(&schema))
}

/// Keep only supported keywords; `["string", "null"]` types become `nullable`
pub fn sanitize_schema(schema: &Value) -> Value {
    let Value::Object(obj) = schema else {
        return schema.clone();
    };

    let mut out = Map::new();
    for (key, value) in obj {
        match key.as_str() {
            "type" => match value {
                Value::Array(types) => {
                    let concrete: Vec<&Value> =
                        types.iter().filter(|t| t.as_str() != Some("null")).collect();
                    if let Some(first) = concrete.first() {
                        out.insert("type".to_string(), (*first).clone());
                    }
                    if concrete.len() < types.len() {
                        out.insert("nullable".to_string(), Value::Bool(true));
                    }
                }
                other => {
                    out.insert("type".to_string(), other.clone());
                }
            },
            "properties" => {
                let props = value
                    .as_object()
                    .map(|p| {
                        p.iter()
                            .map(|(name, prop)| (name.clone(), sanitize_schema(prop)))
                            .collect::<Map<_, _>>()
                    })
                    .unwrap_or_default();
                out.insert(key.clone(), Value::Object(props));
            }
            "items" => {
                out.insert(key.clone(), sanitize_schema(value));
            }
            k if SCHEMA_KEYS.contains(&k) => {
                out.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::Part;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with a fixed text and records the config it was called with
    struct ScriptedModel {
        reply: String,
        delay: Duration,
        seen: Mutex<Option<GenerationConfig>>,
    }

    impl ScriptedModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                delay: Duration::ZERO,
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        async fn generate_content(
            &self,
            history: &[Content],
            config: Option<&GenerationConfig>,
        ) -> Result<Content, ModelError> {
            assert_eq!(history[0].role, "system");
            *self.seen.lock().unwrap() = config.cloned();
            tokio::time::sleep(self.delay).await;
            Ok(Content {
                role: "model".to_string(),
                parts: vec![Part::Text(self.reply.clone())],
            })
        }
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Insight {
        /// Short summary
        summary: String,
        blog_url: Option<String>,
        tags: Vec<String>,
    }

    #[test]
    fn test_response_schema_is_sanitized() {
        let schema = response_schema::<Insight>().unwrap();

        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["summary"]["description"], "Short summary");
        assert_eq!(schema["properties"]["blog_url"]["type"], "string");
        assert_eq!(schema["properties"]["blog_url"]["nullable"], true);
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["summary", "tags"]));
    }

    #[tokio::test]
    async fn test_generate_returns_text() {
        let model = ScriptedModel::new("A summary.");
        let generator = ModelGenerator::new(model.clone(), Duration::from_secs(5));

        let text = generator.generate("Summarize", "content").await.unwrap();

        assert_eq!(text, "A summary.");
        let seen = model.seen.lock().unwrap().clone().unwrap();
        assert!(seen.response_schema.is_none());
    }

    #[tokio::test]
    async fn test_generate_structured_strips_fences() {
        let model = ScriptedModel::new("```json\n{\"summary\": \"ok\"}\n```");
        let generator = ModelGenerator::new(model.clone(), Duration::from_secs(5));

        let value = generator
            .generate_structured("Extract", "content", &json!({"type": "object", "title": "X"}))
            .await
            .unwrap();

        assert_eq!(value["summary"], "ok");
        let seen = model.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.response_schema, Some(json!({"type": "object"})));
    }

    #[tokio::test]
    async fn test_generate_structured_rejects_prose() {
        let generator = ModelGenerator::new(ScriptedModel::new("no json here"), Duration::from_secs(5));
        let err = generator
            .generate_structured("Extract", "content", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Json(_)));
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let model = Arc::new(ScriptedModel {
            reply: "late".to_string(),
            delay: Duration::from_millis(200),
            seen: Mutex::new(None),
        });
        let generator = ModelGenerator::new(model, Duration::from_millis(10));

        let err = generator.generate("Summarize", "content").await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_empty_reply_is_invalid() {
        let generator = ModelGenerator::new(ScriptedModel::new("  "), Duration::from_secs(5));
        let err = generator.generate("Summarize", "content").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_generator_reports_missing_model() {
        let err = UnconfiguredGenerator.generate("Summarize", "content").await.unwrap_err();
        assert_eq!(err.to_string(), "text generation is not configured");
        assert!(matches!(
            UnconfiguredGenerator
                .generate_structured("Extract", "content", &json!({}))
                .await,
            Err(ServiceError::NotConfigured(_))
        ));
    }
}
