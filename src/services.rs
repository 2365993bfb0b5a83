//! External service clients: the SerpAPI maps/search engines and Hunter.io.
//!
//! Thin request/response wrappers; retries and backoff are intentionally left
//! to the HTTP client's own timeout policy.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{FetchResult, Lead, SearchQuery};
use crate::website::normalize_br_phone;

// ============ Maps Search (SerpAPI) ============

/// Lead source backed by SerpAPI's `google_maps` engine.
pub struct MapsSearchService {
    client: Client,
    base_url: String,
    api_key: String,
    location: String,
    city: String,
    language: String,
    country: String,
}

impl MapsSearchService {
    /// Fails when no SerpAPI key is configured.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .serpapi_key
            .clone()
            .ok_or_else(|| AppError::BadRequest("SERPAPI_KEY is not configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.serpapi_base_url.clone(),
            api_key,
            location: config.search_location.clone(),
            city: config.search_city.clone(),
            language: config.search_language.clone(),
            country: config.search_country.clone(),
        })
    }

    /// Fetch raw leads for one query. Source failure is fatal for the batch,
    /// a malformed individual result is skipped and reported.
    pub async fn search(&self, query: &SearchQuery) -> Result<FetchResult, AppError> {
        let search_text = format!("{} em {}", query.query, query.location);
        tracing::info!("Maps search: {}", search_text);

        let url = reqwest::Url::parse_with_params(
            &format!("{}/search.json", self.base_url),
            &[
                ("engine", "google_maps"),
                ("q", search_text.as_str()),
                ("type", "search"),
                ("hl", self.language.as_str()),
                ("gl", self.country.as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("Maps search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::SourceUnavailable(format!(
                "Maps search returned {}: {}",
                status, error_text
            )));
        }

        let payload: MapsSearchResponse = response.json().await.map_err(|e| {
            AppError::SourceUnavailable(format!("Failed to parse maps response: {}", e))
        })?;

        let mut result = FetchResult {
            total_found: payload.local_results.len(),
            ..Default::default()
        };
        for item in payload.local_results.into_iter().take(query.limit) {
            match item.into_lead(&query.category, &self.city) {
                Some(lead) => result.leads.push(lead),
                None => result.errors.push("result without a name".to_string()),
            }
        }

        tracing::info!(
            "Maps search '{}': {} results, {} kept",
            query.query,
            result.total_found,
            result.leads.len()
        );

        Ok(result)
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

#[derive(Debug, Deserialize)]
struct MapsSearchResponse {
    #[serde(default)]
    local_results: Vec<SerpLocalResult>,
}

/// One `local_results` entry as SerpAPI returns it.
#[derive(Debug, Deserialize)]
struct SerpLocalResult {
    title: Option<String>,
    place_id: Option<String>,
    rating: Option<f64>,
    reviews: Option<i64>,
    price: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    phone: Option<String>,
    address: Option<String>,
    website: Option<String>,
    hours: Option<serde_json::Value>,
    operating_hours: Option<serde_json::Value>,
}

impl SerpLocalResult {
    /// Ingestion boundary: out-of-range numeric signals become absent here so
    /// the scorer never sees them.
    fn into_lead(self, category: &str, city: &str) -> Option<Lead> {
        let name = self.title.filter(|t| !t.trim().is_empty())?;

        let mut lead = Lead::new(name, category, city);
        lead.source = "serpapi_google_maps".to_string();
        lead.address = self.address;
        lead.phone = self
            .phone
            .map(|p| normalize_br_phone(&p).unwrap_or(p));
        lead.site_https = self
            .website
            .as_deref()
            .is_some_and(|s| s.starts_with("https://"));
        lead.website = self.website;
        lead.maps.place_id = self.place_id;
        lead.maps.rating = self.rating.filter(|r| (0.0..=5.0).contains(r));
        lead.maps.review_count = self.reviews.filter(|n| *n >= 0).map(|n| n as u32);
        lead.maps.price_level = self.price;
        lead.maps.has_hours = self.hours.is_some() || self.operating_hours.is_some();
        lead.maps.types = self.types;

        Some(lead)
    }
}

// ============ Google Organic Search (SerpAPI) ============

/// SerpAPI's plain `google` engine, used by the Instagram finder.
pub struct GoogleSearchService {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
    country: String,
}

/// One organic search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganicHit {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct GoogleSearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicHit>,
}

impl GoogleSearchService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .serpapi_key
            .clone()
            .ok_or_else(|| AppError::BadRequest("SERPAPI_KEY is not configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.serpapi_base_url.clone(),
            api_key,
            language: config.search_language.clone(),
            country: config.search_country.clone(),
        })
    }

    /// Top organic results for a query.
    pub async fn organic_results(
        &self,
        query: &str,
        num: usize,
    ) -> Result<Vec<OrganicHit>, AppError> {
        let num = num.to_string();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search.json", self.base_url),
            &[
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("hl", self.language.as_str()),
                ("gl", self.country.as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build URL: {}", e)))?;

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Google search returned status {}",
                response.status()
            )));
        }

        let payload: GoogleSearchResponse = response.json().await.map_err(|e| {
            AppError::ExternalApi(format!("Failed to parse search response: {}", e))
        })?;

        Ok(payload.organic_results)
    }
}

// ============ Hunter.io Enrichment ============

/// Optional secondary lookup: corporate emails and social links by domain.
///
/// Free-tier quotas are small, so the pipeline checks `available_searches`
/// before burning through a batch.
pub struct HunterService {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Subset of Hunter's domain-search payload the pipeline consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct HunterDomainData {
    #[serde(default)]
    pub emails: Vec<HunterEmail>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HunterEmail {
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HunterEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct HunterAccountData {
    requests: Option<HunterRequests>,
}

#[derive(Debug, Deserialize)]
struct HunterRequests {
    searches: Option<HunterQuota>,
}

#[derive(Debug, Deserialize)]
struct HunterQuota {
    available: Option<u64>,
}

/// Email prefixes preferred when picking one out of a domain search.
const GENERIC_EMAIL_PREFIXES: [&str; 4] = ["contato", "comercial", "info", "atendimento"];

impl HunterService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .hunter_api_key
            .clone()
            .ok_or_else(|| AppError::BadRequest("HUNTER_API_KEY is not configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.hunter_base_url.clone(),
            api_key,
        })
    }

    /// Look up a domain. `Ok(None)` covers both "nothing known" and the
    /// documented soft failures (401/429), which must not abort the batch.
    pub async fn domain_search(&self, domain: &str) -> Result<Option<HunterDomainData>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/domain-search", self.base_url),
            &[("domain", domain), ("api_key", self.api_key.as_str())],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build URL: {}", e)))?;

        let response = self.client.get(url).send().await?;

        match response.status().as_u16() {
            200 => {
                let envelope: HunterEnvelope<HunterDomainData> =
                    response.json().await.map_err(|e| {
                        AppError::ExternalApi(format!("Failed to parse Hunter response: {}", e))
                    })?;
                Ok(envelope.data)
            }
            401 => {
                tracing::error!("Hunter.io: invalid API key");
                Ok(None)
            }
            429 => {
                tracing::warn!("Hunter.io: rate limit reached");
                Ok(None)
            }
            status => {
                tracing::warn!("Hunter.io: status {}", status);
                Ok(None)
            }
        }
    }

    /// Remaining domain searches on the account, when the API reports them.
    pub async fn available_searches(&self) -> Option<u64> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/account", self.base_url),
            &[("api_key", self.api_key.as_str())],
        )
        .ok()?;

        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }

        let envelope: HunterEnvelope<HunterAccountData> = response.json().await.ok()?;
        envelope.data?.requests?.searches?.available
    }

    /// Fill missing contact and social fields from a domain search. Fields
    /// already present are never overwritten.
    pub async fn enrich(&self, lead: &mut Lead) -> Result<(), AppError> {
        let Some(domain) = lead.domain() else {
            return Ok(());
        };

        tracing::info!("Hunter.io enrichment for {} ({})", lead.name, domain);
        let Some(data) = self.domain_search(&domain).await? else {
            return Ok(());
        };

        if lead.email.is_none() {
            lead.email = pick_email(&data.emails);
        }
        if lead.social.linkedin.is_none() {
            if let Some(linkedin) = data.linkedin.filter(|s| !s.is_empty()) {
                lead.social.linkedin_company = linkedin.to_lowercase().contains("/company/");
                lead.social.linkedin = Some(linkedin);
            }
        }
        if lead.social.twitter.is_none() {
            if let Some(handle) = data.twitter.filter(|s| !s.is_empty()) {
                lead.social.twitter = Some(if handle.starts_with("http") {
                    handle
                } else {
                    format!("https://twitter.com/{}", handle)
                });
            }
        }
        if lead.social.facebook.is_none() {
            lead.social.facebook = data.facebook.filter(|s| !s.is_empty());
        }

        Ok(())
    }
}

/// Prefer generic mailboxes (contato@, comercial@, ...) over personal ones.
fn pick_email(emails: &[HunterEmail]) -> Option<String> {
    let values: Vec<&String> = emails.iter().filter_map(|e| e.value.as_ref()).collect();

    for email in &values {
        let lower = email.to_lowercase();
        if GENERIC_EMAIL_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return Some((*email).clone());
        }
    }

    values.first().map(|e| (*e).clone())
}
