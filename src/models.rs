use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============ Lead Qualification ============

/// Qualification tier, a deterministic band of the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadTier {
    /// Score 80-100.
    Hot,
    /// Score 60-79.
    Warm,
    /// Score 40-59.
    Cold,
    /// Score 0-39.
    Low,
}

impl LeadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadTier::Hot => "hot",
            LeadTier::Warm => "warm",
            LeadTier::Cold => "cold",
            LeadTier::Low => "low",
        }
    }
}

/// Human follow-up state. Initialized to `New`; only external processes move
/// it afterwards, never the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }
}

// ============ Lead Record ============

/// Social profiles discovered for a lead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialProfiles {
    /// Instagram profile URL.
    pub instagram: Option<String>,
    /// Recent-activity signal for the Instagram profile. `None` means the
    /// signal was never observed, which is distinct from "inactive".
    pub instagram_active: Option<bool>,
    /// LinkedIn profile or company page URL.
    pub linkedin: Option<String>,
    /// Whether the LinkedIn URL is a company page rather than a personal
    /// profile.
    pub linkedin_company: bool,
    /// Facebook page URL.
    pub facebook: Option<String>,
    /// Twitter/X profile URL.
    pub twitter: Option<String>,
    /// YouTube channel URL.
    pub youtube: Option<String>,
}

/// Quality signals captured from the maps source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapsData {
    /// Place identifier from the source.
    pub place_id: Option<String>,
    /// Average rating, 0.0-5.0. Out-of-range values are dropped at ingestion.
    pub rating: Option<f64>,
    /// Review count. Negative values are dropped at ingestion.
    pub review_count: Option<u32>,
    /// Price level indicator.
    pub price_level: Option<String>,
    /// Whether the listing publishes business hours.
    pub has_hours: bool,
    /// Place types reported by the source.
    #[serde(default)]
    pub types: Vec<String>,
}

/// A captured business record subject to scoring.
///
/// Identity fields (`name`, `category`, `address`, `city`) are immutable once
/// captured; everything else may be filled in by later stages or overwritten
/// on re-capture. `score`, `tier` and `scored_at` are written only by the
/// scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// Record id assigned by the sink, once persisted.
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    /// Phone number, E.164 when it came through validation.
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: String,
    pub state: String,
    /// Website URL. Updated to the final URL after redirects.
    pub website: Option<String>,
    /// Whether the website answered 200 on the audit visit.
    pub site_reachable: bool,
    /// Whether the final website URL uses HTTPS.
    pub site_https: bool,
    #[serde(default)]
    pub social: SocialProfiles,
    #[serde(default)]
    pub maps: MapsData,
    /// Qualification score, 0-100. Derived, see `scoring`.
    pub score: u8,
    /// Qualification tier. Derived, see `scoring`.
    pub tier: LeadTier,
    pub status: LeadStatus,
    pub captured_at: DateTime<Utc>,
    /// When the scorer last ran for this record.
    pub scored_at: Option<DateTime<Utc>>,
    /// Which source produced the record.
    pub source: String,
    pub notes: Option<String>,
    /// Set once the social extraction stage has run.
    pub social_enriched: bool,
    /// Set once the sink accepted the record.
    pub synced: bool,
}

impl Lead {
    /// A fresh record as the source hands it over, before any enrichment.
    pub fn new(name: impl Into<String>, category: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            category: category.into(),
            phone: None,
            email: None,
            address: None,
            city: city.into(),
            state: "MG".to_string(),
            website: None,
            site_reachable: false,
            site_https: false,
            social: SocialProfiles::default(),
            maps: MapsData::default(),
            score: 0,
            tier: LeadTier::Low,
            status: LeadStatus::New,
            captured_at: Utc::now(),
            scored_at: None,
            source: "maps".to_string(),
            notes: None,
            social_enriched: false,
            synced: false,
        }
    }

    /// Natural key used for dedup and upsert: normalized (name, address).
    pub fn natural_key(&self) -> String {
        format!(
            "{}|{}",
            normalize_key_part(&self.name),
            normalize_key_part(self.address.as_deref().unwrap_or(""))
        )
    }

    /// Domain of the website, if any (`https://www.acme.com.br/x` -> `acme.com.br`).
    pub fn domain(&self) -> Option<String> {
        let site = self.website.as_deref()?;
        let without_scheme = site
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let host = without_scheme.split('/').next()?.trim_start_matches("www.");
        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }
}

/// Lowercase and collapse internal whitespace so formatting differences do not
/// split the natural key.
pub fn normalize_key_part(part: &str) -> String {
    part.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============ Source Contracts ============

/// Parameters for one maps query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search text, usually the category itself.
    pub query: String,
    /// Location appended to the search.
    pub location: String,
    /// Category the results are captured under.
    pub category: String,
    /// Maximum leads to keep.
    pub limit: usize,
}

/// Outcome of one source fetch.
#[derive(Debug, Default)]
pub struct FetchResult {
    pub leads: Vec<Lead>,
    pub errors: Vec<String>,
    pub total_found: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_ignores_case_and_spacing() {
        let mut a = Lead::new("Clinica  Vida", "clinica medica", "Belo Horizonte");
        a.address = Some("Rua A, 100".to_string());
        let mut b = Lead::new("clinica vida", "clinica medica", "Belo Horizonte");
        b.address = Some("rua a, 100".to_string());

        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn natural_key_differs_by_address() {
        let mut a = Lead::new("Clinica Vida", "clinica medica", "Belo Horizonte");
        a.address = Some("Rua A, 100".to_string());
        let b = Lead::new("Clinica Vida", "clinica medica", "Belo Horizonte");

        assert_ne!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn domain_strips_scheme_www_and_path() {
        let mut lead = Lead::new("Acme", "pet shop", "Belo Horizonte");
        lead.website = Some("https://www.acme.com.br/contato".to_string());
        assert_eq!(lead.domain(), Some("acme.com.br".to_string()));

        lead.website = Some("acme.com.br".to_string());
        assert_eq!(lead.domain(), Some("acme.com.br".to_string()));

        lead.website = None;
        assert_eq!(lead.domain(), None);
    }
}
