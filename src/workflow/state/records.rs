// SPDX-License-Identifier: MIT

//! Record types carried inside the work state

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Caller-supplied seed for one run
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Seed {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub company_name: String,
    pub company_website: String,
    #[serde(alias = "linkedin_url")]
    pub profile_url: String,
    #[serde(alias = "company_linkedin_url")]
    pub company_profile_url: String,
}

/// Identity of the contact being researched; fixed for the whole run
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub company_name: String,
    pub company_site: String,
    pub profile_url: String,
    pub company_profile_url: String,
}

impl From<Seed> for Subject {
    fn from(seed: Seed) -> Self {
        Self {
            id: seed.id,
            name: seed.name.trim().to_string(),
            email: seed.email,
            phone: seed.phone,
            address: seed.address,
            company_name: seed.company_name.trim().to_string(),
            company_site: seed.company_website.trim().to_string(),
            profile_url: seed.profile_url.trim().to_string(),
            company_profile_url: seed.company_profile_url.trim().to_string(),
        }
    }
}

/// Social profiles discovered for an organization
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SocialLinks {
    pub blog: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub youtube: Option<String>,
}

impl SocialLinks {
    /// Non-blog profiles in a fixed platform order
    pub fn profiles(&self) -> Vec<(&'static str, &str)> {
        [
            ("Facebook", &self.facebook),
            ("Twitter", &self.twitter),
            ("YouTube", &self.youtube),
        ]
        .into_iter()
        .filter_map(|(platform, url)| url.as_deref().map(|u| (platform, u)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.blog.is_none() && self.profiles().is_empty()
    }
}

/// The subject's affiliated organization
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub name: String,
    pub description: String,
    pub site: String,
    pub profile_url: String,
    pub social: SocialLinks,
    /// Raw payloads keyed by source (e.g. "profile")
    pub raw: BTreeMap<String, Value>,
}

/// A generated document; immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    kind: String,
    title: String,
    content: String,
    is_markup: bool,
    metadata: BTreeMap<String, Value>,
    created_at: DateTime<Utc>,
}

impl Document {
    /// A markdown document
    pub fn markdown(
        kind: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            content: content.into(),
            is_markup: true,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_markup(&self) -> bool {
        self.is_markup
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Outreach material; each piece is written by a different node
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutreachArtifacts {
    pub report: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub script: Option<String>,
}

impl OutreachArtifacts {
    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    pub fn with_email(mut self, subject: impl Into<String>, body: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self.body = Some(body.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.report.is_none() && self.subject.is_none() && self.body.is_none() && self.script.is_none()
    }
}

fn default_overall() -> f64 {
    5.0
}

/// Number from a JSON number or numeric string; anything else is `None`
fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(loose_number(&Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_overall<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(loose_number(&Value::deserialize(deserializer)?).unwrap_or_else(default_overall))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Structured qualification judgment returned by the scoring collaborator
///
/// Fields are read leniently: a null, a numeric string or a missing value
/// never rejects the whole judgment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ScoreDetail {
    #[serde(default, deserialize_with = "lenient_score")]
    #[schemars(with = "f64")]
    pub digital_presence_score: f64,
    #[serde(default, deserialize_with = "lenient_score")]
    #[schemars(with = "f64")]
    pub industry_fit_score: f64,
    #[serde(default, deserialize_with = "lenient_score")]
    #[schemars(with = "f64")]
    pub company_scale_score: f64,
    #[serde(default, deserialize_with = "lenient_score")]
    #[schemars(with = "f64")]
    pub pain_point_score: f64,
    #[serde(default, deserialize_with = "lenient_score")]
    #[schemars(with = "f64")]
    pub decision_maker_score: f64,
    #[serde(default = "default_overall", deserialize_with = "lenient_overall")]
    #[schemars(with = "f64")]
    pub overall_score: f64,
    #[serde(default, deserialize_with = "lenient_text")]
    #[schemars(with = "String")]
    pub qualification_status: String,
    #[serde(default, deserialize_with = "lenient_text")]
    #[schemars(with = "String")]
    pub reasoning: String,
}

impl ScoreDetail {
    /// Judgment used when the collaborator's output cannot be parsed
    pub fn fallback() -> Self {
        Self {
            digital_presence_score: 0.0,
            industry_fit_score: 0.0,
            company_scale_score: 0.0,
            pain_point_score: 0.0,
            decision_maker_score: 0.0,
            overall_score: 5.0,
            qualification_status: "needs_review".to_string(),
            reasoning: "could not parse response".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seed_accepts_source_field_names() {
        let seed: Seed = serde_json::from_value(json!({
            "name": "Jane Doe",
            "company_name": "Acme",
            "linkedin_url": "https://www.linkedin.com/in/jane",
            "unknown_column": 42
        }))
        .unwrap();
        assert_eq!(seed.profile_url, "https://www.linkedin.com/in/jane");
        assert!(seed.company_website.is_empty());
    }

    #[test]
    fn test_social_profiles_skip_blog_and_missing() {
        let links = SocialLinks {
            blog: Some("https://acme.test/blog".to_string()),
            twitter: Some("https://x.com/acme".to_string()),
            ..Default::default()
        };
        assert_eq!(links.profiles(), vec![("Twitter", "https://x.com/acme")]);
        assert!(!links.is_empty());
        assert!(SocialLinks::default().is_empty());
    }

    #[test]
    fn test_outreach_builders_keep_siblings() {
        let artifacts = OutreachArtifacts::default()
            .with_report("report")
            .with_email("Hi", "Body")
            .with_script("script");
        assert_eq!(artifacts.report.as_deref(), Some("report"));
        assert_eq!(artifacts.subject.as_deref(), Some("Hi"));
        assert_eq!(artifacts.script.as_deref(), Some("script"));
    }

    #[test]
    fn test_score_detail_reads_loose_values() {
        let detail: ScoreDetail = serde_json::from_value(json!({
            "overall_score": "7.2",
            "industry_fit_score": "8",
            "pain_point_score": null,
            "reasoning": null,
            "qualification_status": "qualified"
        }))
        .unwrap();
        assert_eq!(detail.overall_score, 7.2);
        assert_eq!(detail.industry_fit_score, 8.0);
        assert_eq!(detail.pain_point_score, 0.0);
        assert_eq!(detail.reasoning, "");

        let detail: ScoreDetail =
            serde_json::from_value(json!({"overall_score": null, "reasoning": ["a"]})).unwrap();
        assert_eq!(detail.overall_score, 5.0);
        assert_eq!(detail.reasoning, "[\"a\"]");
    }

    #[test]
    fn test_score_detail_missing_overall_defaults() {
        let detail: ScoreDetail =
            serde_json::from_value(json!({"industry_fit_score": 8, "reasoning": "ok"})).unwrap();
        assert_eq!(detail.overall_score, 5.0);
        assert_eq!(detail.industry_fit_score, 8.0);
    }
}
