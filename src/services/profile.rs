// SPDX-License-Identifier: MIT

//! Professional profile lookup
//!
//! Profiles are located with a site-restricted web search and fetched from
//! the RapidAPI profile enrichment endpoint.

use super::{with_timeout, ProfileLookup, WebSearch};
use crate::error::ServiceError;
use crate::workflow::state::Organization;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const RAPIDAPI_HOST: &str = "fresh-linkedin-profile-data.p.rapidapi.com";
const SERVICE: &str = "profile enrichment";

pub struct LinkedInProfiles {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    search: Arc<dyn WebSearch>,
    timeout: Duration,
}

impl LinkedInProfiles {
    pub fn new(api_key: Option<String>, search: Arc<dyn WebSearch>, timeout: Duration) -> Self {
        Self::with_base_url(api_key, &format!("https://{}", RAPIDAPI_HOST), search, timeout)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        base_url: &str,
        search: Arc<dyn WebSearch>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            search,
            timeout,
        }
    }
}

#[async_trait]
impl ProfileLookup for LinkedInProfiles {
    async fn find(&self, name: &str, organization: &str) -> Result<Option<String>, ServiceError> {
        let query = format!("site:linkedin.com/in \"{}\" \"{}\"", name, organization);
        let hits = self.search.search(&query, 5).await?;
        Ok(hits
            .into_iter()
            .map(|h| h.link)
            .find(|link| link.contains("linkedin.com/in/")))
    }

    async fn fetch(&self, url: &str) -> Result<Value, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("RapidAPI key".to_string()))?;
        let endpoint = format!("{}/enrich-lead", self.base_url);

        log::debug!("Fetching profile {}", url);

        let body: Value = with_timeout(SERVICE, self.timeout, async {
            let resp = self
                .client
                .get(&endpoint)
                .query(&[("linkedin_url", url)])
                .header("x-rapidapi-key", api_key)
                .header("x-rapidapi-host", RAPIDAPI_HOST)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let text = resp.text().await?;
                return Err(ServiceError::status(SERVICE, status, text));
            }

            Ok(resp.json::<Value>().await?)
        })
        .await?;

        match body.get("data") {
            Some(data @ Value::Object(_)) => Ok(data.clone()),
            Some(Value::Null) | None => Ok(Value::Object(Map::new())),
            Some(other) => Err(ServiceError::InvalidResponse(format!(
                "profile data is not an object: {}",
                other
            ))),
        }
    }
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Render a fetched profile payload as markdown
pub fn format_profile(profile: &Value) -> String {
    let name = match text(profile, "full_name") {
        "" => "Unknown",
        n => n,
    };
    let mut lines = vec![format!("# {}", name)];

    let headline = text(profile, "headline");
    if !headline.is_empty() {
        lines.push(format!("**{}**", headline));
    }
    let location = text(profile, "location");
    if !location.is_empty() {
        lines.push(format!("Location: {}", location));
    }

    lines.push(String::new());
    lines.push("## About".to_string());
    lines.push(match text(profile, "about") {
        "" => "No about section available.".to_string(),
        about => about.to_string(),
    });

    lines.push(String::new());
    lines.push("## Current Position".to_string());
    let company = text(profile, "company");
    lines.push(if company.is_empty() {
        "Not specified".to_string()
    } else {
        format!("**{}** at **{}**", text(profile, "job_title"), company)
    });

    lines.push(String::new());
    lines.push("## Experience".to_string());
    for exp in items(profile, "experiences") {
        let title = match text(exp, "title") {
            "" => "Unknown",
            t => t,
        };
        let company = match text(exp, "company") {
            "" => "Unknown Company",
            c => c,
        };
        lines.push(format!(
            "- **{}** at {} ({})",
            title,
            company,
            text(exp, "date_range")
        ));
    }

    let educations = items(profile, "educations");
    if !educations.is_empty() {
        lines.push(String::new());
        lines.push("## Education".to_string());
        for edu in educations.iter().take(3) {
            lines.push(format!(
                "- {} {} - {}",
                text(edu, "degree"),
                text(edu, "field_of_study"),
                text(edu, "school")
            ));
        }
    }

    let skills: Vec<&str> = items(profile, "skills")
        .iter()
        .filter_map(Value::as_str)
        .take(10)
        .collect();
    if !skills.is_empty() {
        lines.push(String::new());
        lines.push("## Skills".to_string());
        lines.push(skills.join(", "));
    }

    lines.join("\n")
}

/// Company profile URL named by a person's profile, if any
pub fn company_profile_url(profile: &Value) -> Option<&str> {
    Some(text(profile, "company_linkedin_url")).filter(|u| !u.is_empty())
}

/// Build an organization from a fetched company profile
///
/// `fallback_site` is used when the company profile names no website.
pub fn organization_from_company(company: &Value, profile_url: &str, fallback_site: &str) -> Organization {
    let site = match text(company, "website") {
        "" => fallback_site,
        s => s,
    };
    let summary = json!({
        "name": text(company, "company_name"),
        "description": text(company, "description"),
        "website": site,
        "industries": company.get("industries").cloned().unwrap_or(Value::Null),
        "employee_count": company.get("employee_count").cloned().unwrap_or(Value::Null),
        "locations": company.get("locations").cloned().unwrap_or(Value::Null),
        "year_founded": company.get("year_founded").cloned().unwrap_or(Value::Null),
        "specialties": company.get("specialties").cloned().unwrap_or(Value::Null),
    });

    let mut organization = Organization {
        name: text(company, "company_name").to_string(),
        description: text(company, "description").to_string(),
        site: site.to_string(),
        profile_url: profile_url.to_string(),
        ..Default::default()
    };
    organization.raw.insert("profile".to_string(), summary);
    organization
}
