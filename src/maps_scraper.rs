//! Free direct fallback for the maps source.
//!
//! Fetches the Google Maps search page and digs business records out of the
//! JSON blob embedded in the HTML; a last-resort HTML pass only recovers
//! names. Less reliable than the paid API and only meant for `--no-serpapi`
//! runs.

use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{FetchResult, Lead, SearchQuery};
use crate::website::normalize_br_phone;

pub struct DirectMapsScraper {
    client: Client,
    location: String,
    city: String,
}

impl DirectMapsScraper {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            location: config.search_location.clone(),
            city: config.search_city.clone(),
        })
    }

    /// Fetch the maps search page for one query and extract what it can.
    pub async fn search(&self, query: &SearchQuery) -> Result<FetchResult, AppError> {
        let search_text = format!("{} {}", query.query, query.location);
        let encoded = search_text.replace(' ', "+");
        let url = format!("https://www.google.com/maps/search/{}", encoded);

        tracing::info!("Direct maps scrape: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::SourceUnavailable(format!("Maps page request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "Maps page returned status {}",
                response.status()
            )));
        }

        let html = response.text().await.map_err(|e| {
            AppError::SourceUnavailable(format!("Failed to read maps page: {}", e))
        })?;

        let mut leads = extract_from_embedded_json(&html, &query.category, &self.city);
        if leads.is_empty() {
            leads = extract_from_markup(&html, &query.category, &self.city);
        }
        leads.truncate(query.limit);

        tracing::info!("Direct scrape '{}': {} leads", query.query, leads.len());

        Ok(FetchResult {
            total_found: leads.len(),
            leads,
            errors: Vec::new(),
        })
    }

    /// Fetch every category, deduplicating by natural key across batches.
    pub async fn search_all_categories(
        &self,
        categories: &[String],
        limit_per_category: usize,
    ) -> Vec<Lead> {
        let mut all = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for category in categories {
            let query = SearchQuery {
                query: category.clone(),
                location: self.location.clone(),
                category: category.clone(),
                limit: limit_per_category,
            };

            match self.search(&query).await {
                Ok(result) => {
                    for lead in result.leads {
                        if seen.insert(lead.natural_key()) {
                            all.push(lead);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Category '{}' skipped: {}", category, e);
                }
            }
        }

        all
    }
}

/// Google embeds result data as JSON inside the page. Try the known carrier
/// patterns and walk whatever parses.
fn extract_from_embedded_json(html: &str, category: &str, city: &str) -> Vec<Lead> {
    let patterns = [
        r"(?s)window\.APP_INITIALIZATION_STATE=(\[.*?\]);",
        r#"(?s)"features":(\[.*?\]),"#,
    ];

    for pattern in patterns {
        let re = Regex::new(pattern).unwrap();
        if let Some(caps) = re.captures(html) {
            if let Ok(data) = serde_json::from_str::<Value>(&caps[1]) {
                let mut leads = Vec::new();
                walk_for_businesses(&data, category, city, &mut leads);
                if !leads.is_empty() {
                    return leads;
                }
            }
        }
    }

    Vec::new()
}

/// Recursively look for objects that resemble business records.
fn walk_for_businesses(value: &Value, category: &str, city: &str, leads: &mut Vec<Lead>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk_for_businesses(item, category, city, leads);
            }
        }
        Value::Object(map) => {
            let name = map
                .get("title")
                .or_else(|| map.get("name"))
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty());

            if let Some(name) = name {
                let mut lead = Lead::new(name, category, city);
                lead.source = "google_maps_direct".to_string();
                lead.phone = map
                    .get("phone")
                    .and_then(|v| v.as_str())
                    .map(|p| normalize_br_phone(p).unwrap_or_else(|| p.to_string()));
                lead.address = map
                    .get("address")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                lead.site_https = map
                    .get("website")
                    .and_then(|v| v.as_str())
                    .is_some_and(|s| s.starts_with("https://"));
                lead.website = map
                    .get("website")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                lead.maps.rating = map
                    .get("rating")
                    .and_then(|v| v.as_f64())
                    .filter(|r| (0.0..=5.0).contains(r));
                lead.maps.review_count = map
                    .get("reviews")
                    .and_then(|v| v.as_i64())
                    .filter(|n| *n >= 0)
                    .map(|n| n as u32);
                leads.push(lead);
            }

            for nested in map.values() {
                walk_for_businesses(nested, category, city, leads);
            }
        }
        _ => {}
    }
}

/// Markup fallback. Selectors rot quickly here; treat anything found as a
/// name-only record.
fn extract_from_markup(html: &str, category: &str, city: &str) -> Vec<Lead> {
    let document = Html::parse_document(html);
    let selectors = ["div[role='article']", "div.Nv2PK", "a[href*='/maps/place/']"];

    for selector in selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        let leads: Vec<Lead> = document
            .select(&selector)
            .filter_map(|element| {
                let text: String = element.text().collect::<String>().trim().to_string();
                if text.is_empty() {
                    return None;
                }
                let name: String = text.chars().take(100).collect();
                let mut lead = Lead::new(name, category, city);
                lead.source = "google_maps_direct".to_string();
                Some(lead)
            })
            .collect();

        if !leads.is_empty() {
            return leads;
        }
    }

    Vec::new()
}
