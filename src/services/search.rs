// SPDX-License-Identifier: MIT

//! Serper web and news search

use super::{with_timeout, WebSearch};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const SERPER_BASE_URL: &str = "https://google.serper.dev";
const SERVICE: &str = "serper";

/// One organic search result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// One news result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsItem {
    pub title: String,
    pub snippet: String,
    pub date: String,
    pub link: String,
}

/// Serper recency filter for a window in days
///
/// Serper only knows day, week, month and year ranges; the window is rounded up.
pub fn days_back_to_tbs(days_back: u32) -> &'static str {
    match days_back {
        0..=1 => "qdr:d",
        2..=7 => "qdr:w",
        8..=31 => "qdr:m",
        _ => "qdr:y",
    }
}

pub struct SerperSearch {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl SerperSearch {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self::with_base_url(api_key, SERPER_BASE_URL, timeout)
    }

    /// Search against a custom endpoint
    pub fn with_base_url(api_key: Option<String>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("Serper API key".to_string()))?;
        let url = format!("{}/{}", self.base_url, endpoint);

        log::debug!("Serper request to {}: {}", url, body);

        with_timeout(SERVICE, self.timeout, async {
            let resp = self
                .client
                .post(&url)
                .header("X-API-KEY", api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let text = resp.text().await?;
                return Err(ServiceError::status(SERVICE, status, text));
            }

            Ok(resp.json::<Value>().await?)
        })
        .await
    }
}

/// Deserialize the array under `key`, treating a missing key as no results
fn results<T: DeserializeOwned>(body: &Value, key: &str) -> Result<Vec<T>, ServiceError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => Ok(serde_json::from_value(items.clone())?),
    }
}

#[async_trait]
impl WebSearch for SerperSearch {
    async fn search(&self, query: &str, count: u32) -> Result<Vec<SearchHit>, ServiceError> {
        let body = self
            .post("search", json!({ "q": query, "num": count }))
            .await?;
        results(&body, "organic")
    }

    async fn recent_news(
        &self,
        subject: &str,
        count: u32,
        days_back: u32,
    ) -> Result<Vec<NewsItem>, ServiceError> {
        let body = self
            .post(
                "news",
                json!({ "q": subject, "num": count, "tbs": days_back_to_tbs(days_back) }),
            )
            .await?;
        results(&body, "news")
    }
}
