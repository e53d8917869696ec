// SPDX-License-Identifier: MIT

//! Runtime settings
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! environment variables. The binary loads `.env` before calling [`Settings::load`].

use crate::error::LeadflowError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Settings for collaborators and the text-generation model
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// "gemini" or "openai"
    pub model_provider: String,
    pub model_name: String,
    pub serper_api_key: Option<String>,
    pub rapidapi_key: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
    /// Timeout for every HTTP collaborator call
    pub request_timeout_secs: u64,
    /// Timeout for a single text-generation call
    pub llm_timeout_secs: u64,
    /// Scraped page text is truncated past this many characters
    pub max_page_chars: usize,
    pub news_results: u32,
    pub news_days_back: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_provider: "gemini".to_string(),
            model_name: "gemini-2.5-flash".to_string(),
            serper_api_key: None,
            rapidapi_key: None,
            supabase_url: None,
            supabase_service_key: None,
            request_timeout_secs: 30,
            llm_timeout_secs: 120,
            max_page_chars: 15_000,
            news_results: 5,
            news_days_back: 30,
        }
    }
}

impl Settings {
    /// Load settings from an optional YAML file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, LeadflowError> {
        let mut settings = match path {
            Some(p) => Self::parse_yaml(&fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Parse settings from a YAML string; missing keys keep their defaults
    pub fn parse_yaml(content: &str) -> Result<Self, LeadflowError> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    ///
    /// Blank values are ignored. A timeout that is not a whole number of
    /// seconds is a [`LeadflowError::Config`] error.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), LeadflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("MODEL_PROVIDER") {
            self.model_provider = v.to_lowercase();
        }
        if let Some(v) = non_empty("MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = non_empty("SERPER_API_KEY") {
            self.serper_api_key = Some(v);
        }
        if let Some(v) = non_empty("RAPIDAPI_KEY") {
            self.rapidapi_key = Some(v);
        }
        if let Some(v) = non_empty("SUPABASE_URL") {
            self.supabase_url = Some(v);
        }
        if let Some(v) = non_empty("SUPABASE_SERVICE_KEY") {
            self.supabase_service_key = Some(v);
        }
        if let Some(v) = non_empty("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_secs("REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = non_empty("LLM_TIMEOUT_SECS") {
            self.llm_timeout_secs = parse_secs("LLM_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, LeadflowError> {
    value.trim().parse().map_err(|e| {
        LeadflowError::config(format!("{} must be whole seconds, got {:?}: {}", key, value, e))
    })
}
